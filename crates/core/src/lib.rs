//! tally core data models.
//!
//! Users, categories, projects and problems, the status machines that move
//! projects and problems through their lifecycles, and the timing helpers
//! derived from their timestamps.

#![warn(missing_docs)]

// Core identities
mod id;

// Entities
mod user;
mod category;
mod project;
mod problem;

// Lifecycle rules
mod transition;
pub mod timing;

// Re-exports
pub use id::*;

pub use user::User;
pub use category::Category;
pub use project::{PlannedDuration, PlannedDurationError, Project, ProjectFilter, ProjectStatus};
pub use problem::{Problem, ProblemFilter, ProblemStatus};
pub use transition::{
    next_problem_status, next_project_status, ProblemAction, ProblemOp, ProjectOp,
    TransitionError,
};
pub use timing::Elapsed;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
