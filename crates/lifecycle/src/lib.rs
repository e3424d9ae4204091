//! Lifecycle control for tally.
//!
//! The [`LifecycleController`] is the only writer of project and problem
//! status. It validates every move against the status tables in
//! `tally-core`, stamps timestamps, and commits through the store's
//! conditional updates.

#![warn(missing_docs)]

pub mod error;
pub mod controller;

pub use error::{LifecycleError, Result};
pub use controller::{ControllerConfig, LifecycleController, ProblemSpec, ProjectSpec};
