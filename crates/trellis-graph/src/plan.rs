use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, info};

use trellis_core::error::{Result, TrellisError};
use trellis_core::types::RunId;

use crate::edge::EdgeRule;
use crate::stage::Stage;
use crate::state::{StateRecord, StateSchema};

/// The validated, immutable, reusable form of a graph.
///
/// A compiled plan never changes after `compile()`. Runs borrow it
/// immutably, so any number of runs with independent initial states may
/// execute concurrently on separate threads.
pub struct CompiledGraph {
    schema: StateSchema,
    stages: HashMap<String, Stage>,
    rules: HashMap<String, EdgeRule>,
    entry: String,
    terminals: HashSet<String>,
}

impl CompiledGraph {
    pub(crate) fn new(
        schema: StateSchema,
        stages: HashMap<String, Stage>,
        rules: HashMap<String, EdgeRule>,
        entry: String,
        terminals: HashSet<String>,
    ) -> Self {
        Self {
            schema,
            stages,
            rules,
            entry,
            terminals,
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn is_terminal(&self, stage: &str) -> bool {
        self.terminals.contains(stage)
    }

    /// Execute the graph: a single synchronous walk from the entry stage.
    ///
    /// Each iteration invokes the current stage, merges its update into the
    /// state, and either ends the run (terminal stage) or asks the router
    /// for the successor. Any error from a stage or router function aborts
    /// the run immediately; no partial state is returned. Termination is the
    /// graph author's responsibility: cycles are allowed and not bounded
    /// here.
    pub fn run(&self, initial: StateRecord) -> Result<StateRecord> {
        let run_id = RunId::new();
        let start = Instant::now();
        let mut state = initial;
        let mut current = self.entry.clone();

        loop {
            let stage = self.stages.get(&current).ok_or_else(|| {
                TrellisError::GraphValidation(format!("stage '{}' not found in plan", current))
            })?;

            info!(run_id = %run_id, stage = %current, "executing stage");
            let stage_start = Instant::now();
            let update = stage.invoke(&state)?;
            state.apply(update, &self.schema)?;
            debug!(
                stage = %current,
                elapsed_ms = stage_start.elapsed().as_millis() as u64,
                "stage complete"
            );

            if self.terminals.contains(&current) {
                break;
            }
            current = self.resolve_next(&current, &state)?;
        }

        debug!(
            run_id = %run_id,
            total_elapsed_ms = start.elapsed().as_millis() as u64,
            "run complete"
        );
        Ok(state)
    }

    /// Determine the successor of `current` given the state.
    ///
    /// Unconditional edges return their fixed target. Conditional edges
    /// invoke the router function and look its label up in the routing map;
    /// a label outside the map is a run-time error, since a router's output
    /// space cannot be enumerated at compile time.
    pub fn resolve_next(&self, current: &str, state: &StateRecord) -> Result<String> {
        let rule = self.rules.get(current).ok_or_else(|| {
            TrellisError::GraphValidation(format!("stage '{}' has no outgoing edge rule", current))
        })?;

        match rule {
            EdgeRule::Direct(to) => Ok(to.clone()),
            EdgeRule::Conditional { router, targets } => {
                let label = router(state)?;
                match targets.get(&label) {
                    Some(to) => {
                        debug!(stage = %current, label = %label, next = %to, "routed");
                        Ok(to.clone())
                    }
                    None => Err(TrellisError::UnmappedRoutingLabel {
                        stage: current.to_string(),
                        label,
                    }),
                }
            }
        }
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("entry", &self.entry)
            .field("stages", &self.stages.len())
            .field("terminals", &self.terminals)
            .finish()
    }
}
