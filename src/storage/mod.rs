//! Graph store seam.
//!
//! The store itself (query execution, durability) lives outside this crate.
//! IYP talks to it through [`GraphStore`] and [`Transaction`]; the in-memory
//! backend implements both for embedded use and tests.

mod memory;
mod traits;

pub use memory::{Edition, InMemoryGraph};
pub use traits::{GraphStore, Row, StoreError, Transaction};
