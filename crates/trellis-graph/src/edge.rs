use std::collections::HashMap;

use crate::stage::RouterFn;

/// Outgoing edge rule for a stage.
///
/// A non-terminal stage has exactly one rule: either a fixed successor or a
/// router function whose string label selects the successor from a fixed map.
pub enum EdgeRule {
    /// Always proceed to the named stage.
    Direct(String),
    /// Evaluate `router` against the state and look the label up in `targets`.
    Conditional {
        router: RouterFn,
        targets: HashMap<String, String>,
    },
}

impl EdgeRule {
    /// Stage names this rule can route to.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            EdgeRule::Direct(to) => vec![to.as_str()],
            EdgeRule::Conditional { targets, .. } => {
                targets.values().map(String::as_str).collect()
            }
        }
    }
}

impl std::fmt::Debug for EdgeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeRule::Direct(to) => f.debug_tuple("Direct").field(to).finish(),
            EdgeRule::Conditional { targets, .. } => f
                .debug_struct("Conditional")
                .field("targets", targets)
                .finish(),
        }
    }
}
