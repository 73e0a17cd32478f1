//! The pipeline stages.
//!
//! Each stage is a unit of work over `&mut PipelineState`. Stages absorb
//! collaborator failures themselves (recording them in `state.errors` and
//! degrading per their contract); a returned [`StageError`] is reserved for
//! pipeline defects such as a missing upstream product, and aborts the
//! execution.

mod context;
mod fetch;
mod planning;
mod postprocess;
mod search;
mod summarize;
mod synthesis;

pub use context::ContextSummarization;
pub use fetch::ContentFetching;
pub use planning::Planning;
pub use postprocess::{Cleanup, PostProcessing};
pub use search::Search;
pub use summarize::SourceSummarization;
pub use synthesis::{Synthesis, collect_references, confidence_score};

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::engine::StageKind;
use crate::events::{EventEmitter, PipelineEvent};
use crate::state::PipelineState;

/// Per-invocation context handed to a stage alongside the state.
#[derive(Clone, Debug)]
pub struct StageContext {
    pub trace_id: String,
    pub stage: StageKind,
    emitter: EventEmitter,
}

impl StageContext {
    #[must_use]
    pub fn new(trace_id: String, stage: StageKind, emitter: EventEmitter) -> Self {
        Self {
            trace_id,
            stage,
            emitter,
        }
    }

    /// Emit a progress event attributed to this stage. Never blocks or fails.
    pub fn emit(&self, scope: impl Into<String>, message: impl Into<String>) {
        self.emitter.emit(PipelineEvent::stage_message(
            self.trace_id.clone(),
            self.stage.encode(),
            scope,
            message,
        ));
    }
}

/// One stage of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn run(&self, state: &mut PipelineState, ctx: &StageContext) -> Result<(), StageError>;
}

/// Defects that abort an execution. Collaborator failures never surface here;
/// stages degrade through `state.errors` instead.
#[derive(Debug, Error, Diagnostic)]
pub enum StageError {
    #[error("required input missing: {what}")]
    #[diagnostic(
        code(briefweave::stage::missing_input),
        help("An upstream stage was skipped or its product was discarded before this stage ran.")
    )]
    MissingInput { what: &'static str },

    #[error("no stage registered for `{stage}`")]
    #[diagnostic(code(briefweave::stage::unregistered))]
    Unregistered { stage: StageKind },
}
