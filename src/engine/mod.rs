//! Execution machinery: the stage machine, routing, checkpointing, and the
//! engine that drives them.

mod checkpoint;
mod machine;
mod router;
mod runner;

pub use checkpoint::{
    Checkpoint, CheckpointError, Checkpointer, InMemoryCheckpointer, thread_key,
};
pub use machine::{
    DecisionPoint, MachineError, StageKind, Transition, successor, transition_table, validate,
};
pub use router::{RouteDecision, decide};
pub use runner::{
    EngineError, ExecutionResult, ResumeError, WorkflowEngine, WorkflowEngineBuilder,
};
