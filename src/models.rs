//! Domain schemas for the research pipeline.
//!
//! Every type here is a plain serde-derived value object. Validation happens
//! at two boundaries: [`ResearchRequest::new`] for caller input, and the
//! `validate`/`normalize` methods for structured output returned by the
//! generation collaborator (which is untrusted in the same way any external
//! payload is).

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::utils::truncate_chars;

/// Topic length bounds for [`ResearchRequest`], in characters.
pub const TOPIC_MIN_CHARS: usize = 10;
pub const TOPIC_MAX_CHARS: usize = 500;

/// Maximum characters kept in a [`SourceSummary::content_snippet`].
pub const SNIPPET_MAX_CHARS: usize = 500;

/// Maximum characters kept in a [`Reference::excerpt`].
pub const EXCERPT_MAX_CHARS: usize = 200;

/// How thorough a research run should be.
///
/// Serialized as its numeric level (1–3) so requests and checkpoints stay
/// compatible with the wire shape `depth ∈ {1, 2, 3}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ResearchDepth {
    Shallow = 1,
    Medium = 2,
    Deep = 3,
}

impl ResearchDepth {
    #[must_use]
    pub fn level(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Shallow => "Shallow",
            Self::Medium => "Medium",
            Self::Deep => "Deep",
        }
    }
}

impl TryFrom<u8> for ResearchDepth {
    type Error = RequestError;

    fn try_from(level: u8) -> Result<Self, RequestError> {
        match level {
            1 => Ok(Self::Shallow),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Deep),
            other => Err(RequestError::InvalidDepth { level: other }),
        }
    }
}

impl From<ResearchDepth> for u8 {
    fn from(depth: ResearchDepth) -> u8 {
        depth.level()
    }
}

impl fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/3)", self.name(), self.level())
    }
}

/// Validation errors for caller-supplied request data.
#[derive(Debug, Error, Diagnostic)]
pub enum RequestError {
    #[error("topic cannot be empty or whitespace only")]
    #[diagnostic(code(briefweave::request::blank_topic))]
    BlankTopic,

    #[error("topic must be {TOPIC_MIN_CHARS}-{TOPIC_MAX_CHARS} characters, got {len}")]
    #[diagnostic(
        code(briefweave::request::topic_length),
        help("Topics are trimmed before length is checked.")
    )]
    TopicLength { len: usize },

    #[error("user id must be 1-100 characters, got {len}")]
    #[diagnostic(code(briefweave::request::user_id_length))]
    UserIdLength { len: usize },

    #[error("research depth must be 1, 2, or 3, got {level}")]
    #[diagnostic(code(briefweave::request::invalid_depth))]
    InvalidDepth { level: u8 },
}

/// A validated research request. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    pub depth: ResearchDepth,
    pub follow_up: bool,
    pub user_id: String,
}

impl ResearchRequest {
    /// Build a request, trimming the topic and enforcing length bounds.
    pub fn new(
        topic: impl Into<String>,
        depth: ResearchDepth,
        follow_up: bool,
        user_id: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(RequestError::BlankTopic);
        }
        let topic_len = topic.chars().count();
        if !(TOPIC_MIN_CHARS..=TOPIC_MAX_CHARS).contains(&topic_len) {
            return Err(RequestError::TopicLength { len: topic_len });
        }
        let user_id = user_id.into();
        let user_len = user_id.chars().count();
        if !(1..=100).contains(&user_len) {
            return Err(RequestError::UserIdLength { len: user_len });
        }
        Ok(Self {
            topic,
            depth,
            follow_up,
            user_id,
        })
    }
}

/// Summary of a user's recent research history, derived for follow-up runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub user_id: String,
    pub previous_topics: Vec<String>,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub recurring_themes: Vec<String>,
    #[serde(default = "Utc::now")]
    pub last_interaction: DateTime<Utc>,
    #[serde(default)]
    pub total_interactions: usize,
}

/// The plan produced by the Planning stage and consumed by Search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub query: String,
    pub search_queries: Vec<String>,
    pub expected_sources: usize,
    pub focus_areas: Vec<String>,
    pub estimated_duration_seconds: u64,
}

impl ResearchPlan {
    /// Schema bounds enforced on generation output: 1-10 queries, 1-20 sources.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        if self.search_queries.is_empty() || self.search_queries.len() > 10 {
            return Err(SchemaViolation {
                what: "search_queries",
                detail: format!("expected 1-10 entries, got {}", self.search_queries.len()),
            });
        }
        if !(1..=20).contains(&self.expected_sources) {
            return Err(SchemaViolation {
                what: "expected_sources",
                detail: format!("expected 1-20, got {}", self.expected_sources),
            });
        }
        Ok(())
    }

    /// Minimal fallback plan used when plan generation fails.
    #[must_use]
    pub fn fallback(topic: &str) -> Self {
        Self {
            query: topic.to_string(),
            search_queries: vec![topic.to_string()],
            expected_sources: 5,
            focus_areas: vec![topic.to_string()],
            estimated_duration_seconds: 300,
        }
    }
}

/// A structured payload that failed its schema bounds.
#[derive(Debug, Error, Diagnostic)]
#[error("schema violation in {what}: {detail}")]
#[diagnostic(code(briefweave::models::schema_violation))]
pub struct SchemaViolation {
    pub what: &'static str,
    pub detail: String,
}

/// One web search hit. Unique by `url` after the Search stage merges queries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default)]
    pub published_date: Option<DateTime<Utc>>,
    pub relevance_score: f64,
}

/// A per-source analysis produced by the SourceSummarization stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub url: String,
    pub title: String,
    pub content_snippet: String,
    pub key_points: Vec<String>,
    pub relevance_score: f64,
    pub credibility_score: f64,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default = "Utc::now")]
    pub processed_at: DateTime<Utc>,
}

impl SourceSummary {
    /// Clamp scores to [0, 1], cap the snippet and key-point list.
    ///
    /// Generation output is normalized instead of rejected: a summary with an
    /// out-of-range score is still useful evidence, just bounded.
    pub fn normalize(&mut self) {
        self.relevance_score = self.relevance_score.clamp(0.0, 1.0);
        self.credibility_score = self.credibility_score.clamp(0.0, 1.0);
        self.content_snippet = truncate_chars(&self.content_snippet, SNIPPET_MAX_CHARS);
        self.key_points.truncate(10);
        if self.key_points.is_empty() {
            self.key_points.push("No key points extracted".to_string());
        }
    }
}

/// A citation projected from a [`SourceSummary`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published_date: Option<DateTime<Utc>>,
    pub excerpt: String,
}

impl Reference {
    #[must_use]
    pub fn from_summary(summary: &SourceSummary) -> Self {
        Self {
            title: summary.title.clone(),
            url: summary.url.clone(),
            author: None,
            published_date: None,
            excerpt: truncate_chars(&summary.content_snippet, EXCERPT_MAX_CHARS),
        }
    }
}

/// The final synthesized output of a pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResearchBrief {
    pub topic: String,
    pub summary: String,
    pub key_findings: Vec<String>,
    pub detailed_analysis: String,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub processing_time_seconds: f64,
    #[serde(default)]
    pub token_usage: FxHashMap<String, u64>,
}

impl ResearchBrief {
    /// Schema bounds for generated briefs: summary ≥ 100 chars, 3-15 findings,
    /// analysis ≥ 500 chars.
    ///
    /// Applies to generation output only; the synthesis placeholder brief is
    /// constructed directly and deliberately exempt (it has zero references by
    /// definition).
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        if self.summary.chars().count() < 100 {
            return Err(SchemaViolation {
                what: "summary",
                detail: "expected at least 100 characters".to_string(),
            });
        }
        if !(3..=15).contains(&self.key_findings.len()) {
            return Err(SchemaViolation {
                what: "key_findings",
                detail: format!("expected 3-15 entries, got {}", self.key_findings.len()),
            });
        }
        if self.detailed_analysis.chars().count() < 500 {
            return Err(SchemaViolation {
                what: "detailed_analysis",
                detail: "expected at least 500 characters".to_string(),
            });
        }
        Ok(())
    }

    /// Deterministic placeholder returned when synthesis cannot run.
    #[must_use]
    pub fn placeholder(topic: &str, elapsed_seconds: f64, token_usage: FxHashMap<String, u64>) -> Self {
        Self {
            topic: topic.to_string(),
            summary: "Research synthesis failed due to technical issues.".to_string(),
            key_findings: vec!["Unable to complete research due to errors".to_string()],
            detailed_analysis: "The research process encountered technical difficulties \
                                and could not be completed successfully."
                .to_string(),
            references: Vec::new(),
            confidence_score: 0.0,
            generated_at: Utc::now(),
            processing_time_seconds: elapsed_seconds,
            token_usage,
        }
    }
}

/// Per-user brief history as stored by a [`crate::services::ContextStore`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserHistory {
    pub user_id: String,
    pub briefs: Vec<ResearchBrief>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Aggregate usage statistics for one user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_briefs: usize,
    pub avg_processing_time_seconds: f64,
    pub total_tokens: u64,
}
