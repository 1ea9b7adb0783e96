//! Error taxonomy for catalog loading, progress documents, and configuration.
//!
//! Catalog errors are `Clone`: one failed load is fanned out to every caller
//! that joined it, so the same value has to be handed to each waiter.

use std::fmt;
use thiserror::Error;

/// A cacheable catalog resource. Each key has at most one load in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Metadata,
    Category(String),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => write!(f, "metadata"),
            Self::Category(id) => write!(f, "category:{}", id),
        }
    }
}

/// Failure reported by a [`crate::source::CatalogSource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Transient; the only class the retry policy retries.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("no such document: {0}")]
    Missing(String),

    #[error("malformed document {key}: {message}")]
    Malformed { key: String, message: String },
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// What kind of catalog entity a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Category,
    Skill,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => write!(f, "category"),
            Self::Skill => write!(f, "skill"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown {kind}: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("failed to load {resource}: {cause}")]
    LoadFailed {
        resource: ResourceKey,
        #[source]
        cause: SourceError,
    },

    #[error("catalog failed validation: {}", .0.join("; "))]
    InvalidCatalog(Vec<String>),

    #[error("load of {0} was interrupted")]
    Interrupted(ResourceKey),
}

impl CatalogError {
    pub fn category_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: EntityKind::Category,
            id: id.to_string(),
        }
    }

    pub fn skill_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: EntityKind::Skill,
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid progress document {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("serialize error: {0}")]
    Serialize(#[from] serde_yaml_ng::Error),

    #[error("skill '{skill}' has no level {level}")]
    UnknownLevel { skill: String, level: u32 },

    #[error("at most {max} programs can be active (already: {active})")]
    TooManyPrograms { max: usize, active: String },

    #[error("event log error: {0}")]
    EventLog(String),

    #[error("invalid user id '{0}': use letters, digits, '-' or '_'")]
    InvalidUser(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
