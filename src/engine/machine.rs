//! Stage identifiers and the transition table.
//!
//! The pipeline topology is a fixed linear machine with two decision points.
//! It is declared as data ([`transition_table`]) and validated once at engine
//! build time, so an edit that orphans a stage or forks the line fails fast
//! instead of at some arbitrary point mid-run.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Every stage the engine can schedule, in pipeline order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    ContextSummarization,
    Planning,
    Search,
    ContentFetching,
    SourceSummarization,
    Synthesis,
    PostProcessing,
    Cleanup,
}

impl StageKind {
    pub const ALL: [StageKind; 8] = [
        Self::ContextSummarization,
        Self::Planning,
        Self::Search,
        Self::ContentFetching,
        Self::SourceSummarization,
        Self::Synthesis,
        Self::PostProcessing,
        Self::Cleanup,
    ];

    /// Stable string form used in checkpoints, events, and logs.
    #[must_use]
    pub fn encode(self) -> &'static str {
        match self {
            Self::ContextSummarization => "context_summarization",
            Self::Planning => "planning",
            Self::Search => "search",
            Self::ContentFetching => "content_fetching",
            Self::SourceSummarization => "source_summarization",
            Self::Synthesis => "synthesis",
            Self::PostProcessing => "post_processing",
            Self::Cleanup => "cleanup",
        }
    }

    /// Inverse of [`encode`](Self::encode).
    #[must_use]
    pub fn decode(encoded: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.encode() == encoded)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}

/// Router decision points, named by the stage they follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionPoint {
    AfterSearch,
    AfterSummarization,
}

/// One edge of the machine. A `guard` marks the edge as router-controlled:
/// the router decides whether to take it, loop back, or jump past it.
#[derive(Clone, Copy, Debug)]
pub struct Transition {
    pub from: StageKind,
    pub to: StageKind,
    pub guard: Option<DecisionPoint>,
}

/// The pipeline's forward edges. `Cleanup` has no outgoing edge; reaching it
/// and running it ends the execution.
#[must_use]
pub fn transition_table() -> Vec<Transition> {
    use StageKind::*;
    vec![
        edge(ContextSummarization, Planning, None),
        edge(Planning, Search, None),
        edge(Search, ContentFetching, Some(DecisionPoint::AfterSearch)),
        edge(ContentFetching, SourceSummarization, None),
        edge(
            SourceSummarization,
            Synthesis,
            Some(DecisionPoint::AfterSummarization),
        ),
        edge(Synthesis, PostProcessing, None),
        edge(PostProcessing, Cleanup, None),
    ]
}

fn edge(from: StageKind, to: StageKind, guard: Option<DecisionPoint>) -> Transition {
    Transition { from, to, guard }
}

/// Structural defects detectable without running anything.
#[derive(Debug, Error, Diagnostic)]
pub enum MachineError {
    #[error("stage `{stage}` has {count} outgoing transitions; the pipeline must be linear")]
    #[diagnostic(code(briefweave::machine::forked))]
    Forked { stage: StageKind, count: usize },

    #[error("stage `{stage}` is unreachable from the entry stage")]
    #[diagnostic(
        code(briefweave::machine::unreachable),
        help("Every stage must sit on the single path from ContextSummarization to Cleanup.")
    )]
    Unreachable { stage: StageKind },

    #[error("no terminal stage: every stage has an outgoing transition")]
    #[diagnostic(code(briefweave::machine::no_terminal))]
    NoTerminal,
}

/// Verify the table forms one linear path covering every stage, ending at a
/// stage with no outgoing edge.
pub fn validate(table: &[Transition]) -> Result<(), MachineError> {
    for stage in StageKind::ALL {
        let count = table.iter().filter(|t| t.from == stage).count();
        if count > 1 {
            return Err(MachineError::Forked { stage, count });
        }
    }
    if !StageKind::ALL
        .iter()
        .any(|stage| !table.iter().any(|t| t.from == *stage))
    {
        return Err(MachineError::NoTerminal);
    }
    let entry = StageKind::ContextSummarization;
    let mut reached = vec![entry];
    let mut cursor = entry;
    while let Some(next) = table.iter().find(|t| t.from == cursor).map(|t| t.to) {
        if reached.contains(&next) {
            break;
        }
        reached.push(next);
        cursor = next;
    }
    for stage in StageKind::ALL {
        if !reached.contains(&stage) {
            return Err(MachineError::Unreachable { stage });
        }
    }
    Ok(())
}

/// The forward edge out of `stage`, if any.
#[must_use]
pub fn successor(table: &[Transition], stage: StageKind) -> Option<&Transition> {
    table.iter().find(|t| t.from == stage)
}
