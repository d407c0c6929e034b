//! Base for data-source crawlers.
//!
//! A crawler run pairs one [`Provenance`] with one [`Iyp`] handle. Every
//! link the crawler creates carries the same reference, and closing the
//! crawler commits whatever the run left pending.

use std::sync::Arc;

use crate::config::IypConfig;
use crate::error::IypResult;
use crate::iyp::Iyp;
use crate::provenance::Provenance;
use crate::storage::GraphStore;

/// One data-source run.
pub struct Crawler {
    /// Provenance stamped on every link of this run.
    pub reference: Provenance,
    /// Upsert handle of this run.
    pub iyp: Iyp,
}

impl Crawler {
    /// Opens a run for `organization`'s data fetched from `url`, dated today.
    ///
    /// # Errors
    ///
    /// See [`Iyp::open`].
    pub fn new(
        organization: impl Into<String>,
        url: impl Into<String>,
        store: Arc<dyn GraphStore>,
        config: &IypConfig,
    ) -> IypResult<Self> {
        Ok(Self {
            reference: Provenance::new(organization, url),
            iyp: Iyp::open(store, config)?,
        })
    }

    /// Commits pending work and closes the store connection.
    ///
    /// # Errors
    ///
    /// See [`Iyp::close`].
    pub fn close(self) -> IypResult<()> {
        self.iyp.close()
    }
}
