//! Synthesis: merge every source summary into the final research brief.
//!
//! This stage never leaves the state without a brief: any failure path
//! produces the deterministic placeholder brief with a zero confidence score.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{Stage, StageContext, StageError};
use crate::models::{Reference, ResearchBrief, SourceSummary};
use crate::services::{GenerationService, StructuredRequest, generate_typed};
use crate::state::PipelineState;

/// Relevance threshold for a summary to earn a citation.
const REFERENCE_RELEVANCE_FLOOR: f64 = 0.6;
/// Citation cap on the final brief.
const MAX_REFERENCES: usize = 10;

pub struct Synthesis {
    generation: Arc<dyn GenerationService>,
}

impl Synthesis {
    pub fn new(generation: Arc<dyn GenerationService>) -> Self {
        Self { generation }
    }

    fn build_prompt(state: &PipelineState) -> String {
        let mut sources_text = String::new();
        for (i, summary) in state.source_summaries.iter().enumerate() {
            let _ = write!(
                sources_text,
                "Source {}: {}\nKey Points: {}\nRelevance: {:.2}\nSnippet: {}\n\n",
                i + 1,
                summary.title,
                summary.key_points.join(", "),
                summary.relevance_score,
                summary.content_snippet,
            );
        }

        let mut prompt = format!(
            "Research Topic: {}\n\n\
             Source Summaries:\n{sources_text}\n\
             Create a comprehensive research brief that:\n\
             1. Provides a clear summary of the topic\n\
             2. Identifies key findings from the research\n\
             3. Offers detailed analysis and insights\n\
             4. Maintains high confidence in the conclusions\n\
             5. Properly references all sources\n\n\
             Ensure the brief is well-structured, informative, and actionable.",
            state.request.topic,
        );
        if let Some(context) = &state.context_summary {
            let keep = context.previous_topics.len().saturating_sub(3);
            let _ = write!(
                prompt,
                "\n\nUser Context: This user has previously researched: {}\n\
                 Consider building upon their existing knowledge while avoiding redundancy.",
                context.previous_topics[keep..].join(", "),
            );
        }
        prompt
    }
}

/// Mean of per-source `(relevance + credibility) / 2`, clamped to [0, 1].
/// Zero when there are no summaries.
#[must_use]
pub fn confidence_score(summaries: &[SourceSummary]) -> f64 {
    if summaries.is_empty() {
        return 0.0;
    }
    let total: f64 = summaries
        .iter()
        .map(|s| (s.relevance_score + s.credibility_score) / 2.0)
        .sum();
    (total / summaries.len() as f64).clamp(0.0, 1.0)
}

/// Citations for summaries above the relevance floor, in summary order,
/// capped at [`MAX_REFERENCES`].
#[must_use]
pub fn collect_references(summaries: &[SourceSummary]) -> Vec<Reference> {
    summaries
        .iter()
        .filter(|s| s.relevance_score > REFERENCE_RELEVANCE_FLOOR)
        .take(MAX_REFERENCES)
        .map(Reference::from_summary)
        .collect()
}

#[async_trait]
impl Stage for Synthesis {
    #[instrument(skip_all, fields(trace_id = %ctx.trace_id))]
    async fn run(&self, state: &mut PipelineState, ctx: &StageContext) -> Result<(), StageError> {
        let topic = state.request.topic.clone();

        if state.source_summaries.is_empty() {
            state.push_error(
                "Synthesis failed: No source summaries available for synthesis".to_string(),
            );
            state.brief = Some(ResearchBrief::placeholder(
                &topic,
                state.elapsed_seconds(),
                state.token_usage.clone(),
            ));
            return Ok(());
        }

        let request = StructuredRequest::new(Self::build_prompt(state))
            .with_system_message(
                "You are an expert research analyst creating comprehensive research briefs. \
                 Synthesize information from multiple sources into coherent, actionable \
                 insights. Maintain objectivity while highlighting the most important \
                 findings. Ensure all claims are supported by the source material.",
            )
            .with_primary_model(true);

        let brief = match generate_typed::<ResearchBrief>(self.generation.as_ref(), request).await
        {
            Ok(mut brief) => match brief.validate() {
                Ok(()) => {
                    brief.topic = topic.clone();
                    brief.processing_time_seconds = state.elapsed_seconds();
                    brief.references = collect_references(&state.source_summaries);
                    brief.confidence_score = confidence_score(&state.source_summaries);
                    brief
                }
                Err(violation) => {
                    state.push_error(format!("Synthesis failed: {violation}"));
                    ResearchBrief::placeholder(
                        &topic,
                        state.elapsed_seconds(),
                        state.token_usage.clone(),
                    )
                }
            },
            Err(err) => {
                state.push_error(format!("Synthesis failed: {err}"));
                ResearchBrief::placeholder(&topic, state.elapsed_seconds(), state.token_usage.clone())
            }
        };

        info!(
            references = brief.references.len(),
            confidence = brief.confidence_score,
            "brief synthesized"
        );
        ctx.emit(
            "brief",
            format!(
                "Research brief synthesized with {} references",
                brief.references.len()
            ),
        );
        state.brief = Some(brief);
        Ok(())
    }
}
