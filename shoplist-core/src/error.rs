//! Error types for the shopping list store

use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// The kind of record an operation referred to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    List,
    Item,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::List => write!(f, "List"),
            RecordKind::Item => write!(f, "Item"),
        }
    }
}

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: Uuid },

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),

    /// Backend I/O, locking, serialization or SQL failure
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl StoreError {
    pub fn list_not_found(id: Uuid) -> Self {
        StoreError::NotFound {
            kind: RecordKind::List,
            id,
        }
    }

    pub fn item_not_found(id: Uuid) -> Self {
        StoreError::NotFound {
            kind: RecordKind::Item,
            id,
        }
    }

    /// Returns true if this error is a `NotFound` of any kind
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Adds context to `Storage` failures. The other variants already say
    /// what went wrong and pass through unchanged.
    pub fn context<C>(self, context: C) -> Self
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        match self {
            StoreError::Storage(e) => StoreError::Storage(e.context(context)),
            other => other,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Storage(e.into())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Storage(e.into())
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(e: serde_yaml::Error) -> Self {
        StoreError::Storage(e.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Storage(e.into())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, StoreError>;
