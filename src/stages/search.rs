//! Search: fan the plan's queries out to the search collaborator, then merge,
//! dedupe, and rank the hits.

use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashSet;
use tracing::{info, instrument};

use super::{Stage, StageContext, StageError};
use crate::concurrency::ConcurrencyController;
use crate::config::EngineConfig;
use crate::models::SearchResult;
use crate::services::SearchService;
use crate::state::PipelineState;

/// Hard cap on merged results regardless of what the plan asks for.
const MAX_MERGED_RESULTS: usize = 15;

pub struct Search {
    search: Arc<dyn SearchService>,
    config: EngineConfig,
}

impl Search {
    pub fn new(search: Arc<dyn SearchService>, config: EngineConfig) -> Self {
        Self { search, config }
    }
}

#[async_trait]
impl Stage for Search {
    #[instrument(skip_all, fields(trace_id = %ctx.trace_id))]
    async fn run(&self, state: &mut PipelineState, ctx: &StageContext) -> Result<(), StageError> {
        let plan = state
            .plan
            .as_ref()
            .ok_or(StageError::MissingInput {
                what: "research plan",
            })?
            .clone();

        let queries: Vec<String> = plan
            .search_queries
            .iter()
            .take(self.config.max_search_queries)
            .cloned()
            .collect();

        let controller = ConcurrencyController::new(self.config.search_concurrency);
        let per_query = self.config.per_query_results;
        let search = Arc::clone(&self.search);
        let outcomes = controller
            .scatter(queries, |query| {
                let search = Arc::clone(&search);
                async move { search.search_web(&query, per_query).await }
            })
            .await;

        let mut merged: Vec<SearchResult> = Vec::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        for (i, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(results) => {
                    // First occurrence of a URL wins; earlier queries outrank
                    // later ones on ties.
                    for result in results {
                        if seen.insert(result.url.clone()) {
                            merged.push(result);
                        }
                    }
                }
                Err(err) => {
                    state.push_error(format!("Search {} failed: {err}", i + 1));
                }
            }
        }

        merged.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        merged.truncate(plan.expected_sources.min(MAX_MERGED_RESULTS));

        info!(results = merged.len(), "search merged");
        ctx.emit("results", format!("Found {} search results", merged.len()));
        state.search_results = merged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StageKind;
    use crate::events::EventBus;
    use crate::models::{ResearchDepth, ResearchPlan, ResearchRequest};
    use crate::services::SearchError;
    use rustc_hash::FxHashMap;
    use std::sync::Mutex;

    struct ScriptedSearch {
        // query -> outcome
        outcomes: Mutex<FxHashMap<String, Result<Vec<SearchResult>, SearchError>>>,
    }

    impl ScriptedSearch {
        fn new(outcomes: Vec<(&str, Result<Vec<SearchResult>, SearchError>)>) -> Self {
            Self {
                outcomes: Mutex::new(
                    outcomes
                        .into_iter()
                        .map(|(q, o)| (q.to_string(), o))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl SearchService for ScriptedSearch {
        async fn search_web(
            &self,
            query: &str,
            _max_results: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            self.outcomes
                .lock()
                .unwrap()
                .remove(query)
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn fetch_content(&self, _url: &str) -> String {
            String::new()
        }
    }

    fn hit(url: &str, score: f64) -> SearchResult {
        SearchResult {
            title: url.to_string(),
            url: url.to_string(),
            snippet: "snippet".to_string(),
            published_date: None,
            relevance_score: score,
        }
    }

    fn ctx() -> StageContext {
        StageContext::new(
            "t".to_string(),
            StageKind::Search,
            EventBus::default().emitter(),
        )
    }

    fn state_with_plan(queries: Vec<&str>, expected_sources: usize) -> PipelineState {
        let request =
            ResearchRequest::new("a topic long enough", ResearchDepth::Medium, false, "u1")
                .unwrap();
        let mut state = PipelineState::new(request, "t".to_string());
        state.plan = Some(ResearchPlan {
            query: "a topic long enough".to_string(),
            search_queries: queries.into_iter().map(String::from).collect(),
            expected_sources,
            focus_areas: vec![],
            estimated_duration_seconds: 300,
        });
        state
    }

    #[tokio::test]
    async fn missing_plan_is_a_pipeline_defect() {
        let stage = Search::new(Arc::new(ScriptedSearch::new(vec![])), EngineConfig::default());
        let request =
            ResearchRequest::new("a topic long enough", ResearchDepth::Medium, false, "u1")
                .unwrap();
        let mut state = PipelineState::new(request, "t".to_string());
        let err = stage.run(&mut state, &ctx()).await.unwrap_err();
        assert!(matches!(err, StageError::MissingInput { .. }));
    }

    #[tokio::test]
    async fn dedupes_by_url_and_sorts_by_relevance() {
        let search = ScriptedSearch::new(vec![
            ("q1", Ok(vec![hit("https://a", 0.4), hit("https://b", 0.9)])),
            ("q2", Ok(vec![hit("https://a", 0.99), hit("https://c", 0.7)])),
        ]);
        let stage = Search::new(Arc::new(search), EngineConfig::default());
        let mut state = state_with_plan(vec!["q1", "q2"], 10);
        stage.run(&mut state, &ctx()).await.unwrap();

        let urls: Vec<&str> = state.search_results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b", "https://c", "https://a"]);
        // q1's copy of https://a won the dedupe.
        assert_eq!(state.search_results[2].relevance_score, 0.4);
    }

    #[tokio::test]
    async fn failed_queries_are_recorded_and_the_rest_merged() {
        let search = ScriptedSearch::new(vec![
            ("q1", Ok(vec![hit("https://a", 0.8)])),
            ("q2", Err(SearchError::provider("timeout"))),
            ("q3", Ok(vec![hit("https://b", 0.6)])),
        ]);
        let stage = Search::new(Arc::new(search), EngineConfig::default());
        let mut state = state_with_plan(vec!["q1", "q2", "q3"], 10);
        stage.run(&mut state, &ctx()).await.unwrap();

        assert_eq!(state.search_results.len(), 2);
        assert_eq!(state.errors.len(), 1);
        assert!(state.errors[0].starts_with("Search 2 failed:"));
    }

    #[tokio::test]
    async fn only_first_five_queries_are_issued_and_results_capped() {
        let hits: Vec<SearchResult> = (0..20).map(|i| hit(&format!("https://{i}"), 0.5)).collect();
        let search = ScriptedSearch::new(vec![
            ("q1", Ok(hits.clone())),
            ("q6", Err(SearchError::provider("should never be issued"))),
        ]);
        let stage = Search::new(Arc::new(search), EngineConfig::default());
        let mut state = state_with_plan(vec!["q1", "q2", "q3", "q4", "q5", "q6"], 20);
        stage.run(&mut state, &ctx()).await.unwrap();

        assert!(state.errors.is_empty());
        assert_eq!(state.search_results.len(), MAX_MERGED_RESULTS);
    }
}
