//! SourceSummarization: per-source structured analysis, run in sequential
//! batches over the summarizable subset of fetched sources.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{Stage, StageContext, StageError};
use crate::concurrency::ConcurrencyController;
use crate::config::EngineConfig;
use crate::models::{SNIPPET_MAX_CHARS, SourceSummary};
use crate::services::{GenerationService, StructuredRequest, generate_typed, sentinel};
use crate::state::PipelineState;
use crate::utils::{truncate_chars, word_count};

pub struct SourceSummarization {
    generation: Arc<dyn GenerationService>,
    config: EngineConfig,
}

struct SourceInput {
    url: String,
    title: String,
    content: String,
}

impl SourceSummarization {
    pub fn new(generation: Arc<dyn GenerationService>, config: EngineConfig) -> Self {
        Self { generation, config }
    }

    /// Summarize one source. Failure degrades to a neutral-scored summary and
    /// reports the cause alongside it; every input yields exactly one summary.
    async fn summarize_one(&self, input: SourceInput) -> (SourceSummary, Option<String>) {
        let prompt = format!(
            "Source: {}\nURL: {}\nContent: {}\n\n\
             Analyze this source and extract:\n\
             1. Key points relevant to the research topic\n\
             2. Important insights or findings\n\
             3. Credibility indicators (author expertise, publication quality, etc.)\n\
             4. How this source contributes to understanding the topic",
            input.title,
            input.url,
            truncate_chars(&input.content, self.config.summarize_prompt_budget),
        );
        let request = StructuredRequest::new(prompt).with_system_message(
            "You are analyzing a source for research purposes. Extract key information, \
             assess credibility, and determine relevance to the research topic. \
             Be concise but comprehensive in your analysis.",
        );

        match generate_typed::<SourceSummary>(self.generation.as_ref(), request).await {
            Ok(mut summary) => {
                // The model does not get to rewrite identity fields.
                summary.url = input.url;
                summary.title = input.title;
                summary.word_count = word_count(&input.content);
                summary.normalize();
                (summary, None)
            }
            Err(err) => {
                let degraded = SourceSummary {
                    url: input.url,
                    title: input.title,
                    content_snippet: truncate_chars(&input.content, SNIPPET_MAX_CHARS),
                    key_points: vec!["Content analysis failed".to_string()],
                    relevance_score: 0.5,
                    credibility_score: 0.5,
                    word_count: word_count(&input.content),
                    processed_at: chrono::Utc::now(),
                };
                (degraded, Some(format!("Source summarization error: {err}")))
            }
        }
    }
}

#[async_trait]
impl Stage for SourceSummarization {
    #[instrument(skip_all, fields(trace_id = %ctx.trace_id))]
    async fn run(&self, state: &mut PipelineState, ctx: &StageContext) -> Result<(), StageError> {
        let inputs: Vec<SourceInput> = state
            .search_results
            .iter()
            .filter_map(|result| {
                let content = state.fetched_content.get(&result.url)?;
                if sentinel::is_failure(content)
                    || content.chars().count() <= self.config.min_summarizable_chars
                {
                    return None;
                }
                Some(SourceInput {
                    url: result.url.clone(),
                    title: result.title.clone(),
                    content: content.clone(),
                })
            })
            .collect();

        let controller = ConcurrencyController::new(self.config.summarize_batch_size);
        let outcomes = controller
            .scatter_batched(inputs, |input| self.summarize_one(input))
            .await;

        let mut summaries = Vec::with_capacity(outcomes.len());
        for (summary, failure) in outcomes {
            if let Some(message) = failure {
                state.push_error(message);
            }
            summaries.push(summary);
        }

        info!(summaries = summaries.len(), "sources summarized");
        ctx.emit("summaries", format!("Summarized {} sources", summaries.len()));
        state.source_summaries = summaries;
        Ok(())
    }
}
