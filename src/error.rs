//! Error types for IYP.
//!
//! All errors in IYP are strongly typed using thiserror.
//! Precondition failures, execution failures and store failures are kept in
//! separate enums so callers can decide which ones end a crawler run.

use thiserror::Error;

use crate::storage::StoreError;

/// Validation errors raised before any statement reaches the store.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Link {index} is missing mandatory provenance property '{key}'")]
    MissingProvenance {
        index: usize,
        key: &'static str,
    },

    #[error("Invalid {kind} identifier '{value}'")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
    },

    #[error("Entity with label {label} is missing key property '{property}'")]
    MissingKeyProperty {
        label: String,
        property: String,
    },

    #[error("Property '{property}' cannot be coerced to an integer: {value}")]
    NotAnInteger {
        property: String,
        value: String,
    },

    #[error("Entity must carry at least one label")]
    NoLabels,
}

/// Execution errors that end the current operation or the whole run.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Could not connect to the graph store at {uri}: {source}")]
    ConnectionFailed {
        uri: String,
        #[source]
        source: StoreError,
    },

    #[error("Cannot create constraint {name}: {source}")]
    ConstraintDeclaration {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Failed to read configuration: {message}")]
    Config {
        message: String,
    },
}

/// Top-level error type for IYP.
#[derive(Debug, Error)]
pub enum IypError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IypError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a store error.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if retrying the same call in a fresh transaction may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Execution(e) => matches!(e, ExecutionError::ConnectionFailed { .. }),
            Self::Store(e) => matches!(
                e,
                StoreError::TransactionConflict { .. } | StoreError::ConnectionError(_)
            ),
        }
    }
}

/// Result type alias for IYP operations.
pub type IypResult<T> = Result<T, IypError>;
