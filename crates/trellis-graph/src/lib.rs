//! Stage routing graphs: short automation pipelines as directed graphs.
//!
//! A pipeline is a set of named `Stage`s connected by edge rules: either a
//! fixed successor or a conditional rule that routes on the label a router
//! function derives from the current `StateRecord`.
//!
//! Graphs are assembled with a `GraphBuilder`, validated by `compile()`, and
//! the resulting `CompiledGraph` is an immutable plan that can be run any
//! number of times with fresh initial state. Nothing executes at build time;
//! a run happens only on an explicit `CompiledGraph::run` call.

pub mod builder;
pub mod edge;
pub mod plan;
pub mod stage;
pub mod state;

pub use builder::GraphBuilder;
pub use edge::EdgeRule;
pub use plan::CompiledGraph;
pub use stage::{RouterFn, Stage, StageFn};
pub use state::{MergePolicy, StateRecord, StateSchema, StateUpdate};
