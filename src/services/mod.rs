//! Collaborator contracts the pipeline depends on.
//!
//! The engine never talks to a model, a search provider, or a history store
//! directly; it goes through these traits. Collaborators are constructed once
//! and injected into the engine builder, which keeps the pipeline trivially
//! testable with substitute implementations.
//!
//! Contract notes:
//! - [`GenerationService`] must apply its own retry/backoff; the pipeline
//!   treats any exhausted failure as a single [`GenerationError`].
//! - [`SearchService::fetch_content`] never fails: it returns a sentinel
//!   failure string on error (see [`sentinel`]), so callers need no error
//!   handling at the call site.
//! - [`ContextStore`] retention policy: at most the 50 most recent briefs per
//!   user.

mod memory;

pub use memory::InMemoryContextStore;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::models::{SearchResult, UserHistory, UserStats};

// ============================================================================
// Generation
// ============================================================================

/// A structured-output generation request.
#[derive(Clone, Debug)]
pub struct StructuredRequest {
    pub prompt: String,
    pub system_message: Option<String>,
    /// Select the high-capability model for this call.
    pub use_primary: bool,
}

impl StructuredRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_message: None,
            use_primary: false,
        }
    }

    #[must_use]
    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    #[must_use]
    pub fn with_primary_model(mut self, use_primary: bool) -> Self {
        self.use_primary = use_primary;
        self
    }
}

/// Text-generation backend.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate a JSON value conforming to the schema implied by the prompt.
    async fn generate_structured(
        &self,
        request: StructuredRequest,
    ) -> Result<Value, GenerationError>;

    /// Generate free-form text.
    async fn generate_text(
        &self,
        prompt: &str,
        system_message: Option<&str>,
        max_tokens: Option<u32>,
    ) -> Result<String, GenerationError>;
}

/// Generate a structured value and deserialize it into `T`.
///
/// A payload that does not match `T`'s schema is reported as
/// [`GenerationError::Schema`], which stages treat the same as any other
/// generation failure (fall back, record, continue).
pub async fn generate_typed<T: DeserializeOwned>(
    service: &dyn GenerationService,
    request: StructuredRequest,
) -> Result<T, GenerationError> {
    let value = service.generate_structured(request).await?;
    serde_json::from_value(value).map_err(GenerationError::Schema)
}

#[derive(Debug, Error, Diagnostic)]
pub enum GenerationError {
    /// The backend exhausted its retries.
    #[error("generation provider error: {message}")]
    #[diagnostic(code(briefweave::generation::provider))]
    Provider { message: String },

    /// The backend returned a payload that does not match the target schema.
    #[error("generated payload failed schema deserialization: {0}")]
    #[diagnostic(
        code(briefweave::generation::schema),
        help("The model produced output that does not match the requested structure.")
    )]
    Schema(#[source] serde_json::Error),
}

impl GenerationError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }
}

// ============================================================================
// Search & content fetching
// ============================================================================

/// Web-search and content-extraction backend.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search_web(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError>;

    /// Fetch and extract plain text from a URL.
    ///
    /// By contract this never fails: implementations return
    /// [`sentinel::failure`] output on any error.
    async fn fetch_content(&self, url: &str) -> String;
}

#[derive(Debug, Error, Diagnostic)]
pub enum SearchError {
    #[error("search provider error: {message}")]
    #[diagnostic(code(briefweave::search::provider))]
    Provider { message: String },

    #[error("search rate limited")]
    #[diagnostic(
        code(briefweave::search::rate_limited),
        help("The pipeline caps concurrent queries; consider lowering search_concurrency.")
    )]
    RateLimited,
}

impl SearchError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }
}

/// Failure sentinels for the never-failing `fetch_content` contract.
pub mod sentinel {
    const PREFIXES: [&str; 2] = ["Error", "Failed"];

    /// Build the sentinel string stored in place of fetched content.
    #[must_use]
    pub fn failure(reason: &str) -> String {
        format!("Error fetching content: {reason}")
    }

    /// Whether a stored content string is a fetch-failure sentinel.
    #[must_use]
    pub fn is_failure(content: &str) -> bool {
        PREFIXES.iter().any(|p| content.starts_with(p))
    }
}

// ============================================================================
// Context store
// ============================================================================

/// Per-user research history persistence.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn get_user_history(&self, user_id: &str) -> Result<Option<UserHistory>, StoreError>;

    async fn save_brief(
        &self,
        user_id: &str,
        brief: &crate::models::ResearchBrief,
    ) -> Result<(), StoreError>;

    async fn get_user_stats(&self, user_id: &str) -> Result<UserStats, StoreError>;
}

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("context store unavailable: {message}")]
    #[diagnostic(code(briefweave::store::unavailable))]
    Unavailable { message: String },

    #[error("context store serialization failed: {0}")]
    #[diagnostic(code(briefweave::store::serde))]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}
