//! Engine tunables.
//!
//! Defaults mirror the production configuration; `from_env` lets deployments
//! override the external-call limits through the environment (a `.env` file is
//! honored via `dotenvy`).

use std::time::Duration;

/// All knobs the engine and its stages read.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// How many plan queries Search actually issues (first N).
    pub max_search_queries: usize,
    /// Result cap passed to the search collaborator per query.
    pub per_query_results: usize,
    /// Concurrent in-flight search queries.
    pub search_concurrency: usize,
    /// Concurrent in-flight content fetches.
    pub fetch_concurrency: usize,
    /// Summarization batch size; batches run sequentially.
    pub summarize_batch_size: usize,
    /// Characters of fetched content included in a summarization prompt.
    pub summarize_prompt_budget: usize,
    /// Minimum fetched-content length for a source to be summarizable.
    pub min_summarizable_chars: usize,
    /// Token budget for the secondary context-guidance generation call.
    pub context_guidance_max_tokens: u32,
    /// Look-back window for follow-up context summaries.
    pub history_window: Duration,
    /// Save a checkpoint after every completed stage.
    pub autosave: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_search_queries: 5,
            per_query_results: 5,
            search_concurrency: 5,
            fetch_concurrency: 5,
            summarize_batch_size: 5,
            summarize_prompt_budget: 3000,
            min_summarizable_chars: 100,
            context_guidance_max_tokens: 500,
            history_window: Duration::from_secs(30 * 24 * 60 * 60),
            autosave: true,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by environment variables where present.
    ///
    /// Recognized: `BRIEFWEAVE_SEARCH_CONCURRENCY`, `BRIEFWEAVE_FETCH_CONCURRENCY`,
    /// `BRIEFWEAVE_SUMMARIZE_BATCH_SIZE`, `BRIEFWEAVE_PROMPT_BUDGET`,
    /// `BRIEFWEAVE_AUTOSAVE`.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Some(n) = read_env_usize("BRIEFWEAVE_SEARCH_CONCURRENCY") {
            config.search_concurrency = n.max(1);
        }
        if let Some(n) = read_env_usize("BRIEFWEAVE_FETCH_CONCURRENCY") {
            config.fetch_concurrency = n.max(1);
        }
        if let Some(n) = read_env_usize("BRIEFWEAVE_SUMMARIZE_BATCH_SIZE") {
            config.summarize_batch_size = n.max(1);
        }
        if let Some(n) = read_env_usize("BRIEFWEAVE_PROMPT_BUDGET") {
            config.summarize_prompt_budget = n;
        }
        if let Ok(v) = std::env::var("BRIEFWEAVE_AUTOSAVE") {
            config.autosave = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        config
    }

    #[must_use]
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }
}

fn read_env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
