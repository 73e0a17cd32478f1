//! Shared scripted collaborators for engine-level tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use std::sync::Mutex;

use briefweave::models::{ResearchDepth, ResearchRequest, SearchResult};
use briefweave::services::{
    GenerationError, GenerationService, SearchError, SearchService, StructuredRequest, sentinel,
};

pub fn request(topic: &str, follow_up: bool) -> ResearchRequest {
    ResearchRequest::new(topic, ResearchDepth::Medium, follow_up, "user-1").unwrap()
}

pub fn hit(url: &str, relevance: f64) -> SearchResult {
    SearchResult {
        title: format!("title of {url}"),
        url: url.to_string(),
        snippet: "snippet".to_string(),
        published_date: None,
        relevance_score: relevance,
    }
}

/// Prompt-dispatching generation mock. Answers are keyed off stable markers in
/// the stage prompts; per-kind call counters let tests assert which stages ran.
pub struct MockGeneration {
    pub plan_queries: Vec<String>,
    pub fail_synthesis: bool,
    pub plan_calls: AtomicUsize,
    pub summary_calls: AtomicUsize,
    pub synthesis_calls: AtomicUsize,
    pub context_calls: AtomicUsize,
}

impl MockGeneration {
    pub fn with_plan_queries(queries: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            plan_queries: queries.iter().map(|q| q.to_string()).collect(),
            fail_synthesis: false,
            plan_calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
            synthesis_calls: AtomicUsize::new(0),
            context_calls: AtomicUsize::new(0),
        })
    }

    pub fn failing_synthesis(queries: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            plan_queries: queries.iter().map(|q| q.to_string()).collect(),
            fail_synthesis: true,
            plan_calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
            synthesis_calls: AtomicUsize::new(0),
            context_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GenerationService for MockGeneration {
    async fn generate_structured(
        &self,
        request: StructuredRequest,
    ) -> Result<Value, GenerationError> {
        let prompt = &request.prompt;
        if prompt.contains("Create a comprehensive research plan") {
            self.plan_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(json!({
                "query": "placeholder",
                "search_queries": self.plan_queries,
                "expected_sources": 10,
                "focus_areas": ["focus"],
                "estimated_duration_seconds": 300,
            }));
        }
        if prompt.starts_with("Source:") {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(json!({
                "url": "overwritten",
                "title": "overwritten",
                "content_snippet": "a snippet of the source content",
                "key_points": ["finding one", "finding two"],
                "relevance_score": 0.8,
                "credibility_score": 0.6,
            }));
        }
        if prompt.contains("Source Summaries:") {
            self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_synthesis {
                return Err(GenerationError::provider("synthesis model down"));
            }
            return Ok(json!({
                "topic": "overwritten",
                "summary": "s".repeat(150),
                "key_findings": ["first finding", "second finding", "third finding"],
                "detailed_analysis": "a".repeat(600),
            }));
        }
        if prompt.contains("research history") {
            self.context_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(json!({
                "user_id": "overwritten",
                "previous_topics": [],
                "key_insights": ["insight"],
                "recurring_themes": ["theme"],
                "total_interactions": 0,
            }));
        }
        Err(GenerationError::provider(format!(
            "unrecognized prompt: {}",
            &prompt[..prompt.len().min(60)]
        )))
    }

    async fn generate_text(
        &self,
        _prompt: &str,
        _system_message: Option<&str>,
        _max_tokens: Option<u32>,
    ) -> Result<String, GenerationError> {
        Ok("strategic guidance".to_string())
    }
}

/// Scripted search mock: fixed per-query results, per-url fetch outcomes, and
/// a call counter for retry assertions.
pub struct MockSearch {
    pub results: Mutex<FxHashMap<String, Vec<SearchResult>>>,
    /// Urls whose fetch returns a failure sentinel.
    pub failing_urls: Vec<String>,
    /// Every `search_web` call fails with a provider error.
    pub fail_searches: bool,
    pub search_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl MockSearch {
    pub fn new(results: Vec<(&str, Vec<SearchResult>)>, failing_urls: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(
                results
                    .into_iter()
                    .map(|(q, r)| (q.to_string(), r))
                    .collect(),
            ),
            failing_urls: failing_urls.iter().map(|u| u.to_string()).collect(),
            fail_searches: false,
            search_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        })
    }

    /// A search backend that finds nothing, ever.
    pub fn empty() -> Arc<Self> {
        Self::new(vec![], &[])
    }

    /// A search backend whose every query errors out.
    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(FxHashMap::default()),
            failing_urls: Vec::new(),
            fail_searches: true,
            search_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SearchService for MockSearch {
    async fn search_web(
        &self,
        query: &str,
        _max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_searches {
            return Err(SearchError::provider("backend unreachable"));
        }
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_content(&self, url: &str) -> String {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_urls.iter().any(|u| u == url) {
            sentinel::failure("HTTP 500")
        } else {
            format!("long article body for {url} {}", "word ".repeat(100))
        }
    }
}
