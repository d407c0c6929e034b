//! # IYP - identity resolution in front of a property graph
//!
//! IYP turns loosely described entities (a set of labels plus a property map)
//! into stable graph nodes, and links them with provenance-tagged
//! relationships. It sits between data-source crawlers and a graph store.
//!
//! ## Core Concepts
//!
//! - **Constraint registry**: which labels carry identity keys
//! - **Resolver**: get-or-create on those keys, last writer wins on other properties
//! - **Identity cache**: read-through, scoped to one transaction
//! - **Provenance**: origin, URL and capture date on every relationship
//!
//! ## Usage
//!
//! ```rust,ignore
//! use iyp::{properties, Crawler, IypConfig};
//!
//! let mut crawler = Crawler::new("BGPKIT", "https://data.bgpkit.com/pfx2as", store, &IypConfig::default())?;
//! let asn = crawler.iyp.resolve(["AS"], &properties([("asn", 2497)]), true)?.unwrap();
//! let pfx = crawler.iyp.resolve(["PREFIX"], &properties([("prefix", "2001:DB8::/32"), ("af", 6)]), true)?.unwrap();
//! crawler.iyp.add_links(asn, &[crawler.reference.link("ORIGINATE", pfx)])?;
//! crawler.close()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod crawler;
pub mod error;
pub mod iyp;
pub mod links;
pub mod normalize;
pub mod provenance;
pub mod resolver;
pub mod schema;
pub mod statement;
pub mod storage;
pub mod value;

// Re-export primary types at crate root for convenience
pub use cache::{CacheKey, CacheStats, IdentityCache};
pub use config::IypConfig;
pub use crawler::Crawler;
pub use error::{ExecutionError, IypError, IypResult, ValidationError};
pub use iyp::Iyp;
pub use links::Link;
pub use normalize::normalize;
pub use provenance::Provenance;
pub use resolver::Resolver;
pub use schema::{ConstraintKind, ConstraintRegistry, SchemaManager, SchemaReport};
pub use statement::{Operation, Statement, EXTERNAL_ID};
pub use storage::{Edition, GraphStore, InMemoryGraph, Row, StoreError, Transaction};
pub use value::{properties, NodeId, Properties, Value};
