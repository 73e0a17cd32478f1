//! Router decisions at the two guarded edges.
//!
//! Routing is a pure function of the state: given the same state it always
//! returns the same decision, which is what makes resumed executions replay
//! deterministically. The only mutation is the retry counter bump when a
//! retry is granted.

use tracing::info;

use super::machine::DecisionPoint;
use crate::state::PipelineState;

/// What to do at a guarded edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    /// Take the forward edge.
    Continue,
    /// Re-run the stage the edge leaves; consumes one unit of retry budget.
    Retry,
    /// Jump past the next stage (or stages) straight to Synthesis.
    Skip,
}

/// Decide the route at `point`, bumping `retry_count` when a retry is granted.
///
/// Both points share one budget: retries spent after Search reduce what is
/// left after SourceSummarization.
pub fn decide(point: DecisionPoint, state: &mut PipelineState) -> RouteDecision {
    let decision = match point {
        DecisionPoint::AfterSearch => {
            if !state.search_results.is_empty() {
                RouteDecision::Continue
            } else if state.can_retry() {
                RouteDecision::Retry
            } else {
                RouteDecision::Skip
            }
        }
        DecisionPoint::AfterSummarization => {
            if !state.source_summaries.is_empty() {
                RouteDecision::Continue
            } else if state.can_retry() {
                RouteDecision::Retry
            } else {
                // Synthesis runs regardless; with no summaries it degrades to
                // the placeholder brief.
                RouteDecision::Continue
            }
        }
    };
    if decision == RouteDecision::Retry {
        state.retry_count += 1;
    }
    info!(
        trace_id = %state.trace_id,
        point = ?point,
        decision = ?decision,
        retry_count = state.retry_count,
        "route decided"
    );
    decision
}
