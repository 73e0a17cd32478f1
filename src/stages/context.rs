//! ContextSummarization: derive a summary of the user's recent research
//! history for follow-up requests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{info, instrument, warn};

use super::{Stage, StageContext, StageError};
use crate::config::EngineConfig;
use crate::models::{ContextSummary, UserHistory};
use crate::services::{ContextStore, GenerationService, StructuredRequest, generate_typed};
use crate::state::PipelineState;

pub struct ContextSummarization {
    generation: Arc<dyn GenerationService>,
    store: Arc<dyn ContextStore>,
    config: EngineConfig,
}

impl ContextSummarization {
    pub fn new(
        generation: Arc<dyn GenerationService>,
        store: Arc<dyn ContextStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            generation,
            store,
            config,
        }
    }

    async fn summarize_history(
        &self,
        user_id: &str,
        history: &UserHistory,
    ) -> Option<ContextSummary> {
        let window = ChronoDuration::from_std(self.config.history_window).ok()?;
        let cutoff = Utc::now() - window;
        let recent: Vec<_> = history
            .briefs
            .iter()
            .filter(|b| b.generated_at >= cutoff)
            .collect();
        if recent.is_empty() {
            return None;
        }

        let topics: Vec<String> = recent.iter().map(|b| b.topic.clone()).collect();
        let findings: Vec<String> = recent
            .iter()
            .flat_map(|b| b.key_findings.iter().cloned())
            .take(20)
            .collect();
        let last_interaction = recent
            .iter()
            .map(|b| b.generated_at)
            .max()
            .unwrap_or_else(Utc::now);

        let prompt = format!(
            "Analyze the user's research history and generate a context summary.\n\n\
             Recent Topics: {topics:?}\n\n\
             Key Findings from Previous Research: {findings:?}\n\n\
             Identify:\n\
             1. Recurring themes across topics\n\
             2. Key insights that might be relevant for future research\n\
             3. Areas of expertise or interest"
        );
        let request = StructuredRequest::new(prompt).with_system_message(
            "You are analyzing a user's research history to create a context summary. \
             Focus on identifying patterns, themes, and insights that could inform future \
             research. Be concise but comprehensive.",
        );

        match generate_typed::<ContextSummary>(self.generation.as_ref(), request).await {
            Ok(mut summary) => {
                summary.user_id = user_id.to_string();
                summary.previous_topics = topics;
                summary.last_interaction = last_interaction;
                summary.total_interactions = history.briefs.len();
                Some(summary)
            }
            Err(err) => {
                // Degrade to a bare summary built from the history itself.
                warn!(error = %err, "context summary generation failed, using bare summary");
                let keep = topics.len().saturating_sub(5);
                Some(ContextSummary {
                    user_id: user_id.to_string(),
                    previous_topics: topics[keep..].to_vec(),
                    key_insights: Vec::new(),
                    recurring_themes: Vec::new(),
                    last_interaction,
                    total_interactions: history.briefs.len(),
                })
            }
        }
    }
}

#[async_trait]
impl Stage for ContextSummarization {
    #[instrument(skip_all, fields(trace_id = %ctx.trace_id))]
    async fn run(&self, state: &mut PipelineState, ctx: &StageContext) -> Result<(), StageError> {
        if !state.request.follow_up {
            state.context_summary = None;
            return Ok(());
        }

        let user_id = state.request.user_id.clone();
        match self.store.get_user_history(&user_id).await {
            Ok(Some(history)) if !history.briefs.is_empty() => {
                state.context_summary = self.summarize_history(&user_id, &history).await;
                if state.context_summary.is_some() {
                    info!(user_id = %user_id, "context summary generated");
                    ctx.emit("context", format!("Context summary generated for user {user_id}"));
                }
            }
            Ok(_) => {
                state.context_summary = None;
            }
            Err(err) => {
                state.push_error(format!("Context summarization failed: {err}"));
                state.context_summary = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResearchBrief, ResearchDepth, ResearchRequest};
    use crate::services::{GenerationError, InMemoryContextStore};
    use rustc_hash::FxHashMap;
    use serde_json::Value;

    struct NoGeneration;

    #[async_trait]
    impl GenerationService for NoGeneration {
        async fn generate_structured(
            &self,
            _request: StructuredRequest,
        ) -> Result<Value, GenerationError> {
            Err(GenerationError::provider("unavailable"))
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _system_message: Option<&str>,
            _max_tokens: Option<u32>,
        ) -> Result<String, GenerationError> {
            Err(GenerationError::provider("unavailable"))
        }
    }

    fn ctx() -> StageContext {
        StageContext::new(
            "t".to_string(),
            crate::engine::StageKind::ContextSummarization,
            crate::events::EventBus::default().emitter(),
        )
    }

    #[tokio::test]
    async fn non_follow_up_skips_history_lookup() {
        let stage = ContextSummarization::new(
            Arc::new(NoGeneration),
            Arc::new(InMemoryContextStore::new()),
            EngineConfig::default(),
        );
        let request =
            ResearchRequest::new("a topic long enough", ResearchDepth::Medium, false, "u1")
                .unwrap();
        let mut state = PipelineState::new(request, "t".to_string());
        stage.run(&mut state, &ctx()).await.unwrap();
        assert!(state.context_summary.is_none());
        assert!(state.errors.is_empty());
    }

    #[tokio::test]
    async fn follow_up_with_no_history_yields_no_summary() {
        let stage = ContextSummarization::new(
            Arc::new(NoGeneration),
            Arc::new(InMemoryContextStore::new()),
            EngineConfig::default(),
        );
        let request =
            ResearchRequest::new("a topic long enough", ResearchDepth::Medium, true, "u1")
                .unwrap();
        let mut state = PipelineState::new(request, "t".to_string());
        stage.run(&mut state, &ctx()).await.unwrap();
        assert!(state.context_summary.is_none());
        assert!(state.errors.is_empty());
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_bare_summary() {
        let store = Arc::new(InMemoryContextStore::new());
        let brief = ResearchBrief::placeholder("earlier topic", 1.0, FxHashMap::default());
        store.save_brief("u1", &brief).await.unwrap();

        let stage =
            ContextSummarization::new(Arc::new(NoGeneration), store, EngineConfig::default());
        let request =
            ResearchRequest::new("a topic long enough", ResearchDepth::Medium, true, "u1")
                .unwrap();
        let mut state = PipelineState::new(request, "t".to_string());
        stage.run(&mut state, &ctx()).await.unwrap();

        let summary = state.context_summary.expect("bare summary");
        assert_eq!(summary.user_id, "u1");
        assert_eq!(summary.previous_topics, vec!["earlier topic".to_string()]);
        assert!(summary.key_insights.is_empty());
        assert_eq!(summary.total_interactions, 1);
    }
}
