//! Error taxonomy for the training client core.
//!
//! Verification failures are terminal for a single `verify` call and are never retried.
//! Store failures belong to the configuration store and are surfaced unchanged to callers.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::tensor::ElementType;

/// A training payload that disagrees with the registered configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsistencyError {
    #[error("missing {field} information in payload")]
    MissingField { field: &'static str },
    #[error("unknown local parameter: {key}")]
    UnknownParameter { key: String },
    #[error("value mismatch for {key}: expected {expected}, got {got}")]
    ValueMismatch { key: String, expected: Value, got: Value },
    #[error("missing model parameter: {name}")]
    MissingParameter { name: String },
    #[error("invalid tensor for {name}: {reason}")]
    InvalidTensor { name: String, reason: TensorError },
    #[error("type mismatch for {name}: expected {expected}, got {got}")]
    TypeMismatch { name: String, expected: ElementType, got: ElementType },
    #[error("shape mismatch for {name}: expected {expected:?}, got {got:?}")]
    ShapeMismatch { name: String, expected: Vec<usize>, got: Vec<usize> },
    #[error("unexpected parameter in incoming model: {name}")]
    UnexpectedParameter { name: String },
}

impl ConsistencyError {
    /// Stable label used in log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing_field",
            Self::UnknownParameter { .. } => "unknown_parameter",
            Self::ValueMismatch { .. } => "value_mismatch",
            Self::MissingParameter { .. } => "missing_parameter",
            Self::InvalidTensor { .. } => "invalid_tensor",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::ShapeMismatch { .. } => "shape_mismatch",
            Self::UnexpectedParameter { .. } => "unexpected_parameter",
        }
    }
}

/// Why a nested JSON value could not be read as a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    #[error("ragged nesting at depth {depth}")]
    Ragged { depth: usize },
    #[error("non-numeric element ({found})")]
    NonNumeric { found: &'static str },
    #[error("integer {value} does not fit in int64")]
    IntegerOverflow { value: u64 },
}

/// A stored document could not be read into the shape the checker expects.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed {document} document: {reason}")]
pub struct MalformedConfigError {
    pub document: &'static str,
    pub reason: String,
}

impl MalformedConfigError {
    pub fn new(document: &'static str, reason: impl Into<String>) -> Self {
        Self { document, reason: reason.into() }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no {document} document registered for job_id {job_id}")]
    NotFound { job_id: String, document: &'static str },
    #[error("failed to access {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON document at {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid job_id {0:?}")]
    InvalidJobId(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
