//! The workflow engine: builds the stage machine and drives executions.

use std::sync::Arc;
use std::time::Instant;

use miette::Diagnostic;
use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::checkpoint::{Checkpoint, CheckpointError, Checkpointer, InMemoryCheckpointer};
use super::machine::{self, MachineError, StageKind, Transition};
use super::router::{RouteDecision, decide};
use crate::config::EngineConfig;
use crate::events::{EventBus, PipelineEvent};
use crate::models::{ResearchBrief, ResearchRequest};
use crate::services::{ContextStore, GenerationService, SearchService};
use crate::stages::{
    Cleanup, ContentFetching, ContextSummarization, PostProcessing, Planning, Search,
    SourceSummarization, Stage, StageContext, StageError, Synthesis,
};
use crate::state::PipelineState;

/// Outcome of one execution, completed or resumed.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// A brief was produced (the degraded placeholder brief counts).
    pub success: bool,
    pub brief: Option<ResearchBrief>,
    /// Top-level abort message; set only when a defect escaped a stage.
    pub error: Option<String>,
    pub trace_id: String,
    pub processing_time_seconds: f64,
    /// Every recoverable failure recorded along the way.
    pub errors: Vec<String>,
}

impl ExecutionResult {
    fn from_state(state: PipelineState) -> Self {
        Self {
            success: state.brief.is_some(),
            error: None,
            processing_time_seconds: state
                .brief
                .as_ref()
                .map_or_else(|| state.elapsed_seconds(), |b| b.processing_time_seconds),
            trace_id: state.trace_id,
            brief: state.brief,
            errors: state.errors,
        }
    }

    fn aborted(state: PipelineState, error: &StageError) -> Self {
        Self {
            success: false,
            brief: None,
            error: Some(error.to_string()),
            processing_time_seconds: state.elapsed_seconds(),
            trace_id: state.trace_id,
            errors: state.errors,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("engine builder is missing a collaborator: {what}")]
    #[diagnostic(
        code(briefweave::engine::missing_collaborator),
        help("Provide generation, search, and store services before calling build().")
    )]
    MissingCollaborator { what: &'static str },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Machine(#[from] MachineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Debug, Error, Diagnostic)]
pub enum ResumeError {
    #[error("no checkpoint found for trace id `{trace_id}`")]
    #[diagnostic(
        code(briefweave::engine::checkpoint_not_found),
        help("Executions only leave checkpoints when autosave is enabled.")
    )]
    NotFound { trace_id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

/// Drives [`PipelineState`] through the stage machine.
///
/// Construct one via [`WorkflowEngine::builder`]; an engine is immutable and
/// can serve any number of executions.
pub struct WorkflowEngine {
    stages: Vec<(StageKind, Box<dyn Stage>)>,
    table: Vec<Transition>,
    checkpointer: Arc<dyn Checkpointer>,
    config: EngineConfig,
    event_bus: EventBus,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("stages", &self.stages.iter().map(|(kind, _)| kind).collect::<Vec<_>>())
            .field("table", &self.table)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    #[must_use]
    pub fn builder() -> WorkflowEngineBuilder {
        WorkflowEngineBuilder::default()
    }

    /// Progress event stream for this engine's executions.
    #[must_use]
    pub fn subscribe(&self) -> flume::Receiver<PipelineEvent> {
        self.event_bus.subscribe()
    }

    /// Run a fresh execution end to end.
    pub async fn execute(&self, request: ResearchRequest) -> Result<ExecutionResult, EngineError> {
        let trace_id = Uuid::new_v4().to_string();
        let state = PipelineState::new(request, trace_id.clone());
        self.event_bus.emitter().emit(PipelineEvent::engine_message(
            trace_id,
            "run",
            "execution started",
        ));
        self.drive(StageKind::ContextSummarization, state).await
    }

    /// Resume an interrupted execution from its latest checkpoint.
    ///
    /// A checkpoint of a completed execution returns the stored result
    /// immediately; no stage re-runs, no collaborator is called.
    pub async fn resume_execution(&self, trace_id: &str) -> Result<ExecutionResult, ResumeError> {
        let checkpoint = self
            .checkpointer
            .load_latest(trace_id)
            .await
            .map_err(EngineError::from)?
            .ok_or_else(|| ResumeError::NotFound {
                trace_id: trace_id.to_string(),
            })?;

        if checkpoint.state.completed {
            info!(trace_id, "resume of completed execution, returning stored result");
            return Ok(ExecutionResult::from_state(checkpoint.state));
        }

        let mut state = checkpoint.state;
        let Some(next) = self.next_after(checkpoint.stage, &mut state) else {
            // Checkpointed at the terminal stage without the completed flag;
            // nothing left to run.
            return Ok(ExecutionResult::from_state(state));
        };
        info!(trace_id, resume_at = %next, "resuming execution");
        self.event_bus.emitter().emit(PipelineEvent::engine_message(
            trace_id,
            "run",
            format!("execution resumed at {next}"),
        ));
        Ok(self.drive(next, state).await?)
    }

    async fn drive(
        &self,
        entry: StageKind,
        mut state: PipelineState,
    ) -> Result<ExecutionResult, EngineError> {
        let mut current = entry;
        loop {
            // A StageError is a defect, not an expected partial failure; it
            // aborts the whole execution. Expected failures never reach here.
            if let Err(err) = self.run_instrumented(current, &mut state).await {
                self.event_bus.emitter().emit(PipelineEvent::engine_message(
                    state.trace_id.clone(),
                    "run",
                    format!("execution aborted: {err}"),
                ));
                return Ok(ExecutionResult::aborted(state, &err));
            }
            if self.config.autosave {
                self.checkpointer
                    .save(Checkpoint::capture(current, &state))
                    .await?;
            }
            match self.next_after(current, &mut state) {
                Some(next) => current = next,
                None => break,
            }
        }
        self.event_bus.emitter().emit(PipelineEvent::engine_message(
            state.trace_id.clone(),
            "run",
            "execution finished",
        ));
        Ok(ExecutionResult::from_state(state))
    }

    /// The stage to schedule after `completed`, routing at guarded edges.
    /// `None` ends the execution.
    fn next_after(&self, completed: StageKind, state: &mut PipelineState) -> Option<StageKind> {
        let transition = machine::successor(&self.table, completed)?;
        let Some(point) = transition.guard else {
            return Some(transition.to);
        };
        match decide(point, state) {
            RouteDecision::Continue => Some(transition.to),
            RouteDecision::Retry => Some(completed),
            RouteDecision::Skip => Some(StageKind::Synthesis),
        }
    }

    async fn run_instrumented(
        &self,
        kind: StageKind,
        state: &mut PipelineState,
    ) -> Result<(), StageError> {
        let stage = self
            .stages
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, stage)| stage.as_ref())
            .ok_or(StageError::Unregistered { stage: kind })?;

        let ctx = StageContext::new(state.trace_id.clone(), kind, self.event_bus.emitter());
        let span = info_span!("stage", stage = %kind, trace_id = %state.trace_id);
        let started = Instant::now();
        let outcome = stage.run(state, &ctx).instrument(span).await;
        let elapsed_ms = started.elapsed().as_millis();
        match &outcome {
            Ok(()) => info!(stage = %kind, elapsed_ms, "stage completed"),
            Err(err) => warn!(stage = %kind, elapsed_ms, error = %err, "stage failed"),
        }
        outcome
    }
}

/// Assembles a [`WorkflowEngine`], validating the machine at build time.
#[derive(Default)]
pub struct WorkflowEngineBuilder {
    generation: Option<Arc<dyn GenerationService>>,
    search: Option<Arc<dyn SearchService>>,
    store: Option<Arc<dyn ContextStore>>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    config: Option<EngineConfig>,
}

impl WorkflowEngineBuilder {
    #[must_use]
    pub fn generation(mut self, generation: Arc<dyn GenerationService>) -> Self {
        self.generation = Some(generation);
        self
    }

    #[must_use]
    pub fn search(mut self, search: Arc<dyn SearchService>) -> Self {
        self.search = Some(search);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn ContextStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`InMemoryCheckpointer`] when not supplied.
    #[must_use]
    pub fn checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<WorkflowEngine, EngineError> {
        let generation = self
            .generation
            .ok_or(EngineError::MissingCollaborator { what: "generation" })?;
        let search = self
            .search
            .ok_or(EngineError::MissingCollaborator { what: "search" })?;
        let store = self
            .store
            .ok_or(EngineError::MissingCollaborator { what: "store" })?;
        let checkpointer = self
            .checkpointer
            .unwrap_or_else(|| Arc::new(InMemoryCheckpointer::new()));
        let config = self.config.unwrap_or_default();

        let table = machine::transition_table();
        machine::validate(&table)?;

        let stages: Vec<(StageKind, Box<dyn Stage>)> = vec![
            (
                StageKind::ContextSummarization,
                Box::new(ContextSummarization::new(
                    Arc::clone(&generation),
                    Arc::clone(&store),
                    config.clone(),
                )),
            ),
            (
                StageKind::Planning,
                Box::new(Planning::new(Arc::clone(&generation), config.clone())),
            ),
            (
                StageKind::Search,
                Box::new(Search::new(Arc::clone(&search), config.clone())),
            ),
            (
                StageKind::ContentFetching,
                Box::new(ContentFetching::new(Arc::clone(&search), config.clone())),
            ),
            (
                StageKind::SourceSummarization,
                Box::new(SourceSummarization::new(
                    Arc::clone(&generation),
                    config.clone(),
                )),
            ),
            (
                StageKind::Synthesis,
                Box::new(Synthesis::new(Arc::clone(&generation))),
            ),
            (
                StageKind::PostProcessing,
                Box::new(PostProcessing::new(Arc::clone(&store))),
            ),
            (StageKind::Cleanup, Box::new(Cleanup)),
        ];

        Ok(WorkflowEngine {
            stages,
            table,
            checkpointer,
            config,
            event_bus: EventBus::default(),
        })
    }
}
