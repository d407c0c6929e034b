//! Abstract store traits for IYP.
//!
//! These traits define the contract a graph store must honour:
//! - schema statements run in their own short-lived context
//! - everything else runs inside an explicit transaction the caller
//!   commits or rolls back
//! - results come back as rows of named scalar columns

use std::collections::BTreeMap;

use thiserror::Error;

use crate::statement::Statement;
use crate::value::Value;

/// One result row, by column name.
pub type Row = BTreeMap<String, Value>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A schema constraint rejected the write.
    #[error("Constraint {constraint} violated: {detail}")]
    ConstraintViolation {
        /// Store-side constraint name.
        constraint: String,
        /// Human-readable description of the offending write.
        detail: String,
    },

    /// The store does not support this statement (e.g. edition limits).
    #[error("Unsupported statement: {0}")]
    Unsupported(String),

    /// Another transaction committed first.
    #[error("Transaction conflict: started at version {expected}, store is at {found}")]
    TransactionConflict {
        /// Version the transaction started from.
        expected: u64,
        /// Version found at commit time.
        found: u64,
    },

    /// Backend error.
    #[error("Store backend error: {0}")]
    BackendError(String),

    /// Connection failed or was closed.
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl StoreError {
    /// Returns true if the store rejected a write because of a schema constraint.
    #[must_use]
    pub const fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}

/// A connection to a graph store.
///
/// Implementations are shared handles: schema statements and new
/// transactions may be issued from any clone.
pub trait GraphStore: Send + Sync {
    /// Checks that the store is reachable.
    fn verify_connectivity(&self) -> Result<(), StoreError>;

    /// Runs a schema statement (constraint or index) outside any transaction.
    fn run_schema(&self, statement: &Statement) -> Result<(), StoreError>;

    /// Opens a new explicit transaction.
    fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    /// Releases the connection. Further calls fail with `ConnectionError`.
    fn close(&self) -> Result<(), StoreError>;
}

/// An explicit store transaction.
///
/// A statement that fails leaves the transaction's pending state exactly as
/// it was before the statement ran.
pub trait Transaction: Send {
    /// Runs one statement and returns its rows.
    fn run(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError>;

    /// Makes every pending write durable.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discards every pending write.
    fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
