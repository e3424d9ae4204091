//! Unique identifiers for tally entities.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generate a new identifier.
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a User
    UserId
);

entity_id!(
    /// Unique identifier for a Category
    CategoryId
);

entity_id!(
    /// Unique identifier for a Project
    ProjectId
);

entity_id!(
    /// Unique identifier for a Problem
    ProblemId
);

/// The four kinds of record held by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A user
    User,
    /// A point category
    Category,
    /// A time-boxed project
    Project,
    /// A work item
    Problem,
}

impl EntityKind {
    /// Lowercase name used in messages and on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Category => "category",
            Self::Project => "project",
            Self::Problem => "problem",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
