//! PostProcessing and Cleanup, the tail of the pipeline.
//!
//! PostProcessing persists the brief and discards the bulky fetched-content
//! map; Cleanup stamps the execution completed. Both absorb their own
//! failures: a run that produced a brief still finishes even when the store
//! is down.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{Stage, StageContext, StageError};
use crate::services::ContextStore;
use crate::state::PipelineState;

pub struct PostProcessing {
    store: Arc<dyn ContextStore>,
}

impl PostProcessing {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for PostProcessing {
    #[instrument(skip_all, fields(trace_id = %ctx.trace_id))]
    async fn run(&self, state: &mut PipelineState, ctx: &StageContext) -> Result<(), StageError> {
        // Accumulated usage is stamped onto the brief before it is persisted.
        let token_usage = state.token_usage.clone();
        let elapsed = state.elapsed_seconds();
        if let Some(brief) = state.brief.as_mut() {
            brief.token_usage = token_usage;
            brief.processing_time_seconds = elapsed;
        }

        if let Some(brief) = state.brief.clone() {
            if let Err(err) = self.store.save_brief(&state.request.user_id, &brief).await {
                state.push_error(format!("Post-processing failed: {err}"));
            }
        }

        state.fetched_content.clear();
        ctx.emit("save", "Research brief completed and saved");
        Ok(())
    }
}

/// Terminal stage. Reaching and running it ends the execution.
#[derive(Default)]
pub struct Cleanup;

#[async_trait]
impl Stage for Cleanup {
    #[instrument(skip_all, fields(trace_id = %ctx.trace_id))]
    async fn run(&self, state: &mut PipelineState, ctx: &StageContext) -> Result<(), StageError> {
        if let Some(brief) = &state.brief {
            let message = format!(
                "Research completed in {:.2}s with {} sources",
                brief.processing_time_seconds,
                brief.references.len()
            );
            info!(
                processing_time_seconds = brief.processing_time_seconds,
                references = brief.references.len(),
                "research completed"
            );
            ctx.emit("done", message);
        }
        state.completed = true;
        Ok(())
    }
}
