//! ContentFetching: pull full text for every search hit, bounded-concurrent.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{Stage, StageContext, StageError};
use crate::concurrency::ConcurrencyController;
use crate::config::EngineConfig;
use crate::services::{SearchService, sentinel};
use crate::state::PipelineState;

pub struct ContentFetching {
    search: Arc<dyn SearchService>,
    config: EngineConfig,
}

impl ContentFetching {
    pub fn new(search: Arc<dyn SearchService>, config: EngineConfig) -> Self {
        Self { search, config }
    }
}

#[async_trait]
impl Stage for ContentFetching {
    #[instrument(skip_all, fields(trace_id = %ctx.trace_id))]
    async fn run(&self, state: &mut PipelineState, ctx: &StageContext) -> Result<(), StageError> {
        let urls: Vec<String> = state
            .search_results
            .iter()
            .map(|r| r.url.clone())
            .collect();
        let total = urls.len();

        let controller = ConcurrencyController::new(self.config.fetch_concurrency);
        let search = Arc::clone(&self.search);
        let fetched = controller
            .scatter(urls, |url| {
                let search = Arc::clone(&search);
                async move {
                    let content = search.fetch_content(&url).await;
                    (url, content)
                }
            })
            .await;

        state.fetched_content = fetched.into_iter().collect();
        let successful = state
            .fetched_content
            .values()
            .filter(|content| !sentinel::is_failure(content))
            .count();
        info!(successful, total, "content fetched");
        ctx.emit(
            "fetch",
            format!("Successfully fetched content from {successful}/{total} sources"),
        );
        Ok(())
    }
}
