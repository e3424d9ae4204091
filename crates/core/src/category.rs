//! Category model - point values for problems.

use serde::{Deserialize, Serialize};
use crate::id::CategoryId;
use crate::Time;

/// A category assigns a point value to the problems filed under it.
///
/// Editing `points` later changes analytics for problems that were already
/// completed, unless the analytics run with frozen points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier
    pub id: CategoryId,

    /// Category name, unique across the store
    pub name: String,

    /// Points credited for each completed problem
    pub points: u32,

    /// When created
    pub created_at: Time,
}

impl Category {
    /// Create a new category.
    pub fn new(name: impl Into<String>, points: u32) -> Self {
        Self {
            id: CategoryId::new(),
            name: name.into(),
            points,
            created_at: chrono::Utc::now(),
        }
    }
}
