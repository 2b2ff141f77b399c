use trellis_core::error::Result;

use crate::state::{StateRecord, StateUpdate};

/// A stage's work function: reads the current state, returns the fields it
/// changes. Stages hold no state of their own across invocations.
pub type StageFn = Box<dyn Fn(&StateRecord) -> Result<StateUpdate> + Send + Sync>;

/// A routing function for conditional edges: derives a label from the
/// current state. The label is looked up in the edge's routing map.
pub type RouterFn = Box<dyn Fn(&StateRecord) -> Result<String> + Send + Sync>;

/// A named unit of work in the routing graph.
pub struct Stage {
    name: String,
    func: StageFn,
}

impl Stage {
    pub(crate) fn new(name: impl Into<String>, func: StageFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the stage function against the current state.
    pub fn invoke(&self, state: &StateRecord) -> Result<StateUpdate> {
        (self.func)(state)
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage").field("name", &self.name).finish()
    }
}
