//! Transaction coordinator.
//!
//! An [`Iyp`] handle owns one store connection, exactly one active
//! transaction, and the two identity caches. Commit and rollback are the only
//! transaction transitions; both clear the caches and immediately open the
//! next transaction. All operations take `&mut self`, so a handle is driven
//! by one thread of control at a time; run one handle per worker.

use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::cache::{CacheStats, IdentityCache};
use crate::config::IypConfig;
use crate::error::{ExecutionError, IypResult};
use crate::links::Link;
use crate::resolver::Resolver;
use crate::schema::{ConstraintRegistry, SchemaManager, SchemaReport};
use crate::storage::{GraphStore, Transaction};
use crate::value::{NodeId, Properties, Value};

/// Upsert handle over a graph store.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use iyp::{properties, InMemoryGraph, Iyp, IypConfig, Provenance};
///
/// let store = Arc::new(InMemoryGraph::new());
/// let mut iyp = Iyp::open(store, &IypConfig::default())?;
///
/// let asn = iyp.resolve(["AS"], &properties([("asn", 2497)]), true)?.unwrap();
/// let cc = iyp.resolve(["COUNTRY"], &properties([("country_code", "jp")]), true)?.unwrap();
///
/// let reference = Provenance::new("Example", "https://example.org/data");
/// iyp.add_links(asn, &[reference.link("COUNTRY", cc)])?;
/// iyp.close()?;
/// # Ok::<(), iyp::IypError>(())
/// ```
pub struct Iyp {
    store: Arc<dyn GraphStore>,
    tx: Option<Box<dyn Transaction>>,
    tx_id: Uuid,
    registry: ConstraintRegistry,
    nodes: IdentityCache,
    external_ids: IdentityCache,
    schema: SchemaReport,
}

impl Iyp {
    /// Connects with the default IYP constraint registry.
    ///
    /// # Errors
    ///
    /// See [`Iyp::with_registry`].
    pub fn open(store: Arc<dyn GraphStore>, config: &IypConfig) -> IypResult<Self> {
        Self::with_registry(store, config, ConstraintRegistry::iyp_default())
    }

    /// Connects, declares the schema, and opens the first transaction.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::ConnectionFailed`] if the store is unreachable,
    /// [`ExecutionError::ConstraintDeclaration`] if a uniqueness constraint
    /// cannot be created, or the store error raised by the first `begin`.
    pub fn with_registry(
        store: Arc<dyn GraphStore>,
        config: &IypConfig,
        registry: ConstraintRegistry,
    ) -> IypResult<Self> {
        debug!(uri = %config.uri(), "connecting to graph store");
        store
            .verify_connectivity()
            .map_err(|source| ExecutionError::ConnectionFailed {
                uri: config.uri(),
                source,
            })?;

        let registry = match &config.constraint_priority {
            Some(order) => registry.with_priority(order),
            None => registry,
        };
        let schema = SchemaManager::new(&registry, config.enterprise).declare(store.as_ref())?;

        let tx = store.begin()?;
        let tx_id = Uuid::new_v4();
        info!(uri = %config.uri(), tx = %tx_id, "IYP ready");

        Ok(Self {
            store,
            tx: Some(tx),
            tx_id,
            registry,
            nodes: IdentityCache::new(config.cache_capacity),
            external_ids: IdentityCache::new(config.cache_capacity),
            schema,
        })
    }

    /// Finds a node by labels and properties, creating it when `create` is set.
    ///
    /// Label order and property order do not matter.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve`]; also [`ExecutionError::NoActiveTransaction`].
    pub fn resolve<S: AsRef<str>>(
        &mut self,
        labels: impl IntoIterator<Item = S>,
        properties: &Properties,
        create: bool,
    ) -> IypResult<Option<NodeId>> {
        let tx = self
            .tx
            .as_deref_mut()
            .ok_or(ExecutionError::NoActiveTransaction)?;
        Resolver::new(tx, &self.registry, &mut self.nodes).resolve(labels, properties, create)
    }

    /// Finds the node linked by `EXTERNAL_ID` to `(:id_type {id: id})`.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve_external_id`]; also [`ExecutionError::NoActiveTransaction`].
    pub fn resolve_external_id(
        &mut self,
        id_type: &str,
        id: impl Into<Value>,
    ) -> IypResult<Option<NodeId>> {
        let tx = self
            .tx
            .as_deref_mut()
            .ok_or(ExecutionError::NoActiveTransaction)?;
        Resolver::new(tx, &self.registry, &mut self.external_ids)
            .resolve_external_id(id_type, id.into())
    }

    /// Merges `links` from `source` as one atomic statement.
    ///
    /// # Errors
    ///
    /// See [`crate::links::add_links`]; also [`ExecutionError::NoActiveTransaction`].
    pub fn add_links(&mut self, source: NodeId, links: &[Link]) -> IypResult<()> {
        let tx = self
            .tx
            .as_deref_mut()
            .ok_or(ExecutionError::NoActiveTransaction)?;
        crate::links::add_links(tx, source, links)
    }

    /// Commits pending work and opens a new transaction.
    ///
    /// # Errors
    ///
    /// Returns the commit error, if any. A new transaction is opened and the
    /// caches are cleared either way.
    pub fn commit(&mut self) -> IypResult<()> {
        self.finish(true)
    }

    /// Discards pending work and opens a new transaction.
    ///
    /// # Errors
    ///
    /// Returns the rollback error, if any. A new transaction is opened and
    /// the caches are cleared either way.
    pub fn rollback(&mut self) -> IypResult<()> {
        self.finish(false)
    }

    fn finish(&mut self, commit: bool) -> IypResult<()> {
        let outcome = match self.tx.take() {
            Some(tx) if commit => tx.commit(),
            Some(tx) => tx.rollback(),
            None => Ok(()),
        };
        self.nodes.clear();
        self.external_ids.clear();

        let finished = self.tx_id;
        match self.store.begin() {
            Ok(tx) => {
                self.tx = Some(tx);
                self.tx_id = Uuid::new_v4();
                debug!(%finished, next = %self.tx_id, commit, "transaction finished");
            }
            Err(e) => {
                error!(%finished, error = %e, "cannot open a new transaction");
                if outcome.is_ok() {
                    return Err(e.into());
                }
            }
        }
        outcome.map_err(Into::into)
    }

    /// Commits pending work and releases the store connection.
    ///
    /// # Errors
    ///
    /// Returns the commit error, or the error raised while closing the store.
    pub fn close(mut self) -> IypResult<()> {
        let committed = match self.tx.take() {
            Some(tx) => tx.commit(),
            None => Ok(()),
        };
        let closed = self.store.close();
        info!(tx = %self.tx_id, "IYP closed");
        committed?;
        closed.map_err(Into::into)
    }

    /// Identifier of the current transaction, for log correlation.
    #[must_use]
    pub const fn transaction_id(&self) -> Uuid {
        self.tx_id
    }

    /// Counters of the node cache.
    #[must_use]
    pub fn node_cache_stats(&self) -> CacheStats {
        self.nodes.stats()
    }

    /// Counters of the external-id cache.
    #[must_use]
    pub fn external_id_cache_stats(&self) -> CacheStats {
        self.external_ids.stats()
    }

    /// Outcome of the startup schema pass.
    #[must_use]
    pub const fn schema_report(&self) -> &SchemaReport {
        &self.schema
    }

    /// Constraint registry in effect.
    #[must_use]
    pub const fn registry(&self) -> &ConstraintRegistry {
        &self.registry
    }
}

impl Drop for Iyp {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            debug!(tx = %self.tx_id, "handle dropped without close, rolling back");
            if let Err(e) = tx.rollback() {
                error!(error = %e, "rollback on drop failed");
            }
        }
    }
}
