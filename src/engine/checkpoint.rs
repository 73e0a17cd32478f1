//! Checkpointing: durable snapshots of the pipeline state.
//!
//! A checkpoint is taken after every completed stage (when autosave is on),
//! keyed by the execution's trace id. [`Checkpoint::stage`] records the stage
//! that just finished; resume re-enters the machine at its successor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use super::machine::StageKind;
use crate::state::PipelineState;

/// One durable snapshot of an execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub trace_id: String,
    /// Stable conversation key: `user_{user_id}_{start_unix_ts}`.
    pub thread_key: String,
    /// The stage that had just completed when this snapshot was taken.
    pub stage: StageKind,
    pub state: PipelineState,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    #[must_use]
    pub fn capture(stage: StageKind, state: &PipelineState) -> Self {
        Self {
            trace_id: state.trace_id.clone(),
            thread_key: thread_key(state),
            stage,
            state: state.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Conversation key for a state's execution.
#[must_use]
pub fn thread_key(state: &PipelineState) -> String {
    format!("user_{}_{}", state.request.user_id, state.started_at.timestamp())
}

#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointError {
    #[error("checkpoint backend unavailable: {message}")]
    #[diagnostic(code(briefweave::checkpoint::unavailable))]
    Unavailable { message: String },

    #[error("checkpoint serialization failed: {0}")]
    #[diagnostic(code(briefweave::checkpoint::serde))]
    Serde(#[from] serde_json::Error),
}

impl CheckpointError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Checkpoint persistence backend.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError>;

    /// Most recent checkpoint for an execution, if any.
    async fn load_latest(&self, trace_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;
}

/// Default backend: snapshots held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointer {
    // trace_id -> snapshots in save order
    snapshots: RwLock<FxHashMap<String, Vec<Checkpoint>>>,
}

impl InMemoryCheckpointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots stored for an execution. Test observability.
    pub async fn snapshot_count(&self, trace_id: &str) -> usize {
        self.snapshots
            .read()
            .await
            .get(trace_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        self.snapshots
            .write()
            .await
            .entry(checkpoint.trace_id.clone())
            .or_default()
            .push(checkpoint);
        Ok(())
    }

    async fn load_latest(&self, trace_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(trace_id)
            .and_then(|snapshots| snapshots.last().cloned()))
    }
}
