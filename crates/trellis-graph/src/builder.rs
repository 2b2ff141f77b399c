use std::collections::{HashMap, HashSet};

use trellis_core::error::{Result, TrellisError};

use crate::edge::EdgeRule;
use crate::plan::CompiledGraph;
use crate::stage::{RouterFn, Stage, StageFn};
use crate::state::StateSchema;

/// Assembles stages and edge rules, then validates them into a
/// `CompiledGraph`.
///
/// All registration errors fail fast: a duplicate stage name, an edge
/// endpoint that isn't registered, or an empty routing map is rejected at
/// the call site. `compile()` then performs the whole-graph checks, so a
/// plan is either fully valid or never produced.
pub struct GraphBuilder {
    schema: StateSchema,
    stages: HashMap<String, Stage>,
    /// Registration order, for deterministic validation.
    order: Vec<String>,
    /// Outgoing rules per stage. Compile enforces exactly one per
    /// non-terminal stage.
    rules: HashMap<String, Vec<EdgeRule>>,
    entry: Option<String>,
    terminals: HashSet<String>,
}

impl GraphBuilder {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema,
            stages: HashMap::new(),
            order: Vec::new(),
            rules: HashMap::new(),
            entry: None,
            terminals: HashSet::new(),
        }
    }

    /// Register a stage under a unique name.
    pub fn register(&mut self, name: impl Into<String>, func: StageFn) -> Result<()> {
        let name = name.into();
        if self.stages.contains_key(&name) {
            return Err(TrellisError::DuplicateStage(name));
        }
        self.order.push(name.clone());
        self.stages.insert(name.clone(), Stage::new(name, func));
        Ok(())
    }

    /// Add an unconditional edge.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<()> {
        self.require_stage(from)?;
        self.require_stage(to)?;
        self.rules
            .entry(from.to_string())
            .or_default()
            .push(EdgeRule::Direct(to.to_string()));
        Ok(())
    }

    /// Add a conditional edge: `router` derives a label from the state, and
    /// the label selects the successor from `targets`.
    pub fn add_conditional_edge(
        &mut self,
        from: &str,
        router: RouterFn,
        targets: HashMap<String, String>,
    ) -> Result<()> {
        self.require_stage(from)?;
        if targets.is_empty() {
            return Err(TrellisError::EmptyRoutingMap(from.to_string()));
        }
        for target in targets.values() {
            self.require_stage(target)?;
        }
        self.rules
            .entry(from.to_string())
            .or_default()
            .push(EdgeRule::Conditional { router, targets });
        Ok(())
    }

    /// Designate the entry stage.
    pub fn set_entry(&mut self, name: &str) -> Result<()> {
        self.require_stage(name)?;
        self.entry = Some(name.to_string());
        Ok(())
    }

    /// Mark a stage as terminal: it runs, its update is merged, and the run
    /// ends. Terminal stages must have no outgoing edges.
    pub fn mark_terminal(&mut self, name: &str) -> Result<()> {
        self.require_stage(name)?;
        self.terminals.insert(name.to_string());
        Ok(())
    }

    /// Validate the graph and freeze it into an immutable execution plan.
    ///
    /// Checks, in registration order: the entry stage is set; every
    /// non-terminal stage has exactly one outgoing edge rule; terminal
    /// stages have none; every edge target is registered. The first
    /// violation aborts compilation.
    pub fn compile(self) -> Result<CompiledGraph> {
        let entry = self
            .entry
            .clone()
            .ok_or_else(|| TrellisError::GraphValidation("entry stage is not set".to_string()))?;

        let mut rules = HashMap::new();
        for name in &self.order {
            let outgoing = self.rules.get(name).map(Vec::len).unwrap_or(0);
            if self.terminals.contains(name) {
                if outgoing != 0 {
                    return Err(TrellisError::GraphValidation(format!(
                        "terminal stage '{}' has an outgoing edge",
                        name
                    )));
                }
                continue;
            }
            match outgoing {
                1 => {}
                0 => {
                    return Err(TrellisError::GraphValidation(format!(
                        "stage '{}' has no outgoing edge rule",
                        name
                    )));
                }
                n => {
                    return Err(TrellisError::GraphValidation(format!(
                        "stage '{}' has {} outgoing edge rules, expected exactly one",
                        name, n
                    )));
                }
            }
        }

        // Move rules out now that the counts are known to be valid.
        for (name, mut stage_rules) in self.rules {
            let rule = match stage_rules.pop() {
                Some(r) => r,
                None => continue,
            };
            for target in rule.targets() {
                if !self.stages.contains_key(target) {
                    return Err(TrellisError::GraphValidation(format!(
                        "edge from '{}' references unregistered stage '{}'",
                        name, target
                    )));
                }
            }
            rules.insert(name, rule);
        }

        Ok(CompiledGraph::new(
            self.schema,
            self.stages,
            rules,
            entry,
            self.terminals,
        ))
    }

    fn require_stage(&self, name: &str) -> Result<()> {
        if self.stages.contains_key(name) {
            Ok(())
        } else {
            Err(TrellisError::UnknownStage(name.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{StateRecord, StateUpdate};

    fn noop() -> StageFn {
        Box::new(|_: &StateRecord| Ok(StateUpdate::none()))
    }

    fn linear_builder() -> GraphBuilder {
        let mut b = GraphBuilder::new(StateSchema::new());
        b.register("a", noop()).unwrap();
        b.register("b", noop()).unwrap();
        b.add_edge("a", "b").unwrap();
        b.set_entry("a").unwrap();
        b.mark_terminal("b").unwrap();
        b
    }

    #[test]
    fn test_valid_graph_compiles() {
        assert!(linear_builder().compile().is_ok());
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let mut b = GraphBuilder::new(StateSchema::new());
        b.register("a", noop()).unwrap();
        let err = b.register("a", noop()).unwrap_err();
        assert!(matches!(err, TrellisError::DuplicateStage(name) if name == "a"));
    }

    #[test]
    fn test_edge_to_unregistered_stage_rejected() {
        let mut b = GraphBuilder::new(StateSchema::new());
        b.register("a", noop()).unwrap();
        let err = b.add_edge("a", "ghost").unwrap_err();
        assert!(matches!(err, TrellisError::UnknownStage(name) if name == "ghost"));
    }

    #[test]
    fn test_edge_from_unregistered_stage_rejected() {
        let mut b = GraphBuilder::new(StateSchema::new());
        b.register("a", noop()).unwrap();
        let err = b.add_edge("ghost", "a").unwrap_err();
        assert!(matches!(err, TrellisError::UnknownStage(_)));
    }

    #[test]
    fn test_empty_routing_map_rejected() {
        let mut b = GraphBuilder::new(StateSchema::new());
        b.register("a", noop()).unwrap();
        let err = b
            .add_conditional_edge("a", Box::new(|_| Ok("x".into())), HashMap::new())
            .unwrap_err();
        assert!(matches!(err, TrellisError::EmptyRoutingMap(name) if name == "a"));
    }

    #[test]
    fn test_conditional_edge_validates_targets() {
        let mut b = GraphBuilder::new(StateSchema::new());
        b.register("a", noop()).unwrap();
        let mut targets = HashMap::new();
        targets.insert("yes".to_string(), "ghost".to_string());
        let err = b
            .add_conditional_edge("a", Box::new(|_| Ok("yes".into())), targets)
            .unwrap_err();
        assert!(matches!(err, TrellisError::UnknownStage(name) if name == "ghost"));
    }

    #[test]
    fn test_missing_entry_fails_compile() {
        let mut b = GraphBuilder::new(StateSchema::new());
        b.register("a", noop()).unwrap();
        b.mark_terminal("a").unwrap();
        let err = b.compile().unwrap_err();
        assert!(matches!(err, TrellisError::GraphValidation(_)));
    }

    #[test]
    fn test_missing_edge_rule_fails_compile() {
        let mut b = GraphBuilder::new(StateSchema::new());
        b.register("a", noop()).unwrap();
        b.register("b", noop()).unwrap();
        b.set_entry("a").unwrap();
        b.mark_terminal("b").unwrap();
        // "a" is non-terminal but has no outgoing edge
        let err = b.compile().unwrap_err();
        match err {
            TrellisError::GraphValidation(msg) => assert!(msg.contains("'a'")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_second_edge_rule_fails_compile() {
        let mut b = linear_builder();
        b.register("c", noop()).unwrap();
        b.mark_terminal("c").unwrap();
        b.add_edge("a", "c").unwrap();
        let err = b.compile().unwrap_err();
        match err {
            TrellisError::GraphValidation(msg) => {
                assert!(msg.contains("'a'"));
                assert!(msg.contains("2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_terminal_with_outgoing_edge_fails_compile() {
        let mut b = linear_builder();
        b.register("c", noop()).unwrap();
        b.mark_terminal("c").unwrap();
        // "b" is terminal; give it an edge anyway
        b.add_edge("b", "c").unwrap();
        let err = b.compile().unwrap_err();
        match err {
            TrellisError::GraphValidation(msg) => assert!(msg.contains("terminal")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_order_is_registration_order() {
        // Both "a" and "b" lack edge rules; the first registered wins.
        let mut b = GraphBuilder::new(StateSchema::new());
        b.register("a", noop()).unwrap();
        b.register("b", noop()).unwrap();
        b.set_entry("a").unwrap();
        let err = b.compile().unwrap_err();
        match err {
            TrellisError::GraphValidation(msg) => assert!(msg.contains("'a'")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
