use std::fmt;

use thiserror::Error;

use crate::domain::EntityId;
use crate::store::Kind;

/// Failures raised by a document store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Version conflict on {kind} {id}")]
    Conflict { kind: Kind, id: EntityId },

    #[error("Unsupported query on field '{field}'")]
    UnsupportedQuery { field: String },
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// One user or team whose update did not complete
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFailure {
    pub kind: Kind,
    pub id: EntityId,
    pub reason: String,
}

impl EntityFailure {
    pub fn new(kind: Kind, id: EntityId, error: &AggregationError) -> Self {
        Self {
            kind,
            id,
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for EntityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.id, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("{kind} {id} not found")]
    NotFound { kind: Kind, id: EntityId },

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("{} updates failed, {succeeded} succeeded: {}", .failures.len(), summarize(.failures))]
    PartialBatchFailure {
        failures: Vec<EntityFailure>,
        succeeded: usize,
    },

    #[error("Invalid match event: {0}")]
    InvalidEvent(String),
}

impl AggregationError {
    pub fn not_found(kind: Kind, id: EntityId) -> Self {
        AggregationError::NotFound { kind, id }
    }

    /// Failed identities carried by a partial batch failure
    pub fn failures(&self) -> &[EntityFailure] {
        match self {
            AggregationError::PartialBatchFailure { failures, .. } => failures,
            _ => &[],
        }
    }

    pub(crate) fn is_conflict(&self) -> bool {
        matches!(self, AggregationError::Persistence(e) if e.is_conflict())
    }
}

fn summarize(failures: &[EntityFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} {}", f.kind, f.id))
        .collect::<Vec<_>>()
        .join(", ")
}
