//! Planning: turn the topic (plus any context summary) into a research plan.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use super::{Stage, StageContext, StageError};
use crate::config::EngineConfig;
use crate::models::{ContextSummary, ResearchPlan};
use crate::services::{GenerationService, StructuredRequest, generate_typed};
use crate::state::PipelineState;

pub struct Planning {
    generation: Arc<dyn GenerationService>,
    config: EngineConfig,
}

impl Planning {
    pub fn new(generation: Arc<dyn GenerationService>, config: EngineConfig) -> Self {
        Self { generation, config }
    }

    /// Secondary generation call: strategic guidance from the user's history,
    /// appended to the planning prompt. Failure here is absorbed; the plan is
    /// simply produced without guidance.
    async fn context_guidance(&self, topic: &str, context: &ContextSummary) -> Option<String> {
        let recent_topics: Vec<&str> = context
            .previous_topics
            .iter()
            .rev()
            .take(5)
            .rev()
            .map(String::as_str)
            .collect();
        let recent_insights: Vec<&str> = context
            .key_insights
            .iter()
            .rev()
            .take(10)
            .rev()
            .map(String::as_str)
            .collect();
        let prompt = format!(
            "Current Research Topic: {topic}\n\n\
             User's Research Context:\n\
             - Previous Topics: {}\n\
             - Recurring Themes: {}\n\
             - Key Insights: {}\n\
             - Total Past Research Sessions: {}\n\n\
             Based on this context, how should we approach researching \"{topic}\"?\n\
             Consider:\n\
             1. Connections to previous research\n\
             2. Avoiding redundancy with past findings\n\
             3. Building upon established knowledge\n\
             4. Exploring new angles or deeper aspects",
            recent_topics.join(", "),
            context.recurring_themes.join(", "),
            recent_insights.join(", "),
            context.total_interactions,
        );
        match self
            .generation
            .generate_text(
                &prompt,
                Some(
                    "You are helping to plan research that builds upon a user's previous work. \
                     Provide strategic guidance on how to approach the new topic given their \
                     research history. Focus on making connections and avoiding redundancy \
                     while ensuring comprehensive coverage.",
                ),
                Some(self.config.context_guidance_max_tokens),
            )
            .await
        {
            Ok(guidance) => Some(guidance),
            Err(err) => {
                warn!(error = %err, "context guidance generation failed");
                None
            }
        }
    }
}

#[async_trait]
impl Stage for Planning {
    #[instrument(skip_all, fields(trace_id = %ctx.trace_id))]
    async fn run(&self, state: &mut PipelineState, ctx: &StageContext) -> Result<(), StageError> {
        let topic = state.request.topic.clone();
        let depth = state.request.depth;

        let mut prompt = format!(
            "Research Topic: {topic}\n\
             Research Depth: {depth}\n\n\
             Create a comprehensive research plan that includes:\n\
             1. Specific search queries to find relevant information\n\
             2. Expected number of sources to analyze\n\
             3. Key focus areas to investigate\n\
             4. Estimated duration for the research"
        );
        if let Some(context) = state.context_summary.clone() {
            if let Some(guidance) = self.context_guidance(&topic, &context).await {
                prompt.push_str("\n\nContext Guidance:\n");
                prompt.push_str(&guidance);
            }
        }

        let request = StructuredRequest::new(prompt).with_system_message(
            "You are a research planning expert. Create detailed, actionable research plans \
             that will lead to comprehensive and well-sourced research briefs. \
             Consider the research depth level when determining scope and thoroughness.",
        );

        let plan = match generate_typed::<ResearchPlan>(self.generation.as_ref(), request).await {
            Ok(mut plan) => match plan.validate() {
                Ok(()) => {
                    plan.query = topic.clone();
                    plan
                }
                Err(violation) => {
                    state.push_error(format!("Planning failed: {violation}"));
                    ResearchPlan::fallback(&topic)
                }
            },
            Err(err) => {
                state.push_error(format!("Planning failed: {err}"));
                ResearchPlan::fallback(&topic)
            }
        };

        info!(queries = plan.search_queries.len(), "research plan ready");
        ctx.emit(
            "plan",
            format!(
                "Research plan created with {} search queries",
                plan.search_queries.len()
            ),
        );
        state.plan = Some(plan);
        Ok(())
    }
}
