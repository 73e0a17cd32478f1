//! The pipeline state record.
//!
//! [`PipelineState`] is the single aggregate threaded through every stage.
//! It is exclusively owned by one in-flight execution: stages take it by
//! `&mut`, so single-writer discipline holds without any locking. The whole
//! record is serde-serializable so checkpoints can persist it verbatim.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::models::{
    ContextSummary, ResearchBrief, ResearchPlan, ResearchRequest, SearchResult, SourceSummary,
};

/// Shared retry budget for the two retry-capable decision points.
///
/// One counter serves both routers: a retry spent after Search reduces the
/// budget left for SourceSummarization. This cross-stage coupling is
/// intentional and load-bearing for the combined ≤2-retries guarantee.
pub const MAX_STAGE_RETRIES: u32 = 2;

/// Orchestration-owned state for one pipeline execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineState {
    pub request: ResearchRequest,
    pub context_summary: Option<ContextSummary>,
    pub plan: Option<ResearchPlan>,
    pub search_results: Vec<SearchResult>,
    /// Transient url -> fetched text (or failure sentinel); discarded by
    /// PostProcessing so checkpoints past that stage stay small.
    pub fetched_content: FxHashMap<String, String>,
    pub source_summaries: Vec<SourceSummary>,
    pub brief: Option<ResearchBrief>,
    /// Human-readable log of every recoverable failure encountered.
    pub errors: Vec<String>,
    pub retry_count: u32,
    pub started_at: DateTime<Utc>,
    pub trace_id: String,
    pub token_usage: FxHashMap<String, u64>,
    pub completed: bool,
}

impl PipelineState {
    #[must_use]
    pub fn new(request: ResearchRequest, trace_id: String) -> Self {
        Self {
            request,
            context_summary: None,
            plan: None,
            search_results: Vec::new(),
            fetched_content: FxHashMap::default(),
            source_summaries: Vec::new(),
            brief: None,
            errors: Vec::new(),
            retry_count: 0,
            started_at: Utc::now(),
            trace_id,
            token_usage: FxHashMap::default(),
            completed: false,
        }
    }

    /// Record a recoverable failure without interrupting the pipeline.
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Wall-clock seconds since the execution started.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        let elapsed = Utc::now() - self.started_at;
        (elapsed.num_milliseconds() as f64 / 1000.0).max(0.0)
    }

    /// Whether the shared retry budget still allows a retry.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.retry_count < MAX_STAGE_RETRIES
    }
}
