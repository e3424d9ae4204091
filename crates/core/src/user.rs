//! User model.

use serde::{Deserialize, Serialize};
use crate::id::UserId;
use crate::Time;

/// A person who claims and completes problems.
///
/// Users are referenced by problems (assignee, completed_by) and projects
/// (members) but never owned by them. Only the name may change after
/// creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: UserId,

    /// Display name, unique across the store
    pub name: String,

    /// When registered
    pub created_at: Time,
}

impl User {
    /// Create a new user.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            created_at: chrono::Utc::now(),
        }
    }
}
