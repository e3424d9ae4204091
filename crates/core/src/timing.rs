//! Elapsed-time derivation over stamped timestamps.
//!
//! A missing timestamp yields `None`, never a zero duration. Negative spans
//! are returned as-is so callers can report them.

use chrono::Duration;
use crate::problem::Problem;
use crate::project::Project;
use crate::Time;

/// A measured span between two timestamps, possibly negative.
///
/// Keeps the full timestamp resolution, so sub-millisecond skew still
/// shows up as negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Elapsed {
    delta: Duration,
}

impl Elapsed {
    /// Span as a chrono duration.
    pub fn as_duration(&self) -> Duration {
        self.delta
    }

    /// Span in fractional seconds.
    pub fn as_secs_f64(&self) -> f64 {
        match self.delta.num_nanoseconds() {
            Some(nanos) => nanos as f64 / 1e9,
            // Out of i64 nanosecond range (about 292 years)
            None => self.delta.num_milliseconds() as f64 / 1e3,
        }
    }

    /// End came before start.
    pub fn is_negative(&self) -> bool {
        self.delta < Duration::zero()
    }
}

/// `end - start` when both are present.
pub fn duration(start: Option<Time>, end: Option<Time>) -> Option<Elapsed> {
    let (start, end) = (start?, end?);
    Some(Elapsed { delta: end - start })
}

/// `claimed_at - created_at`.
pub fn time_to_claim(problem: &Problem) -> Option<Elapsed> {
    duration(Some(problem.created_at), problem.claimed_at)
}

/// `completed_at - claimed_at`.
pub fn time_to_complete(problem: &Problem) -> Option<Elapsed> {
    duration(problem.claimed_at, problem.completed_at)
}

/// `completed_at - created_at` for a problem.
pub fn lead_time(problem: &Problem) -> Option<Elapsed> {
    duration(Some(problem.created_at), problem.completed_at)
}

/// `completed_at - created_at`.
pub fn project_duration(project: &Project) -> Option<Elapsed> {
    duration(Some(project.created_at), project.completed_at)
}
