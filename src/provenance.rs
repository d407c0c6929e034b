//! Provenance of relationships.
//!
//! Every relationship IYP writes records who published the data, where it
//! was fetched from, and when. A crawler builds one [`Provenance`] per run
//! and stamps it on every link it creates.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::links::Link;
use crate::value::{NodeId, Properties, Value};

/// Property naming the organization that published the data.
pub const REFERENCE_ORG: &str = "reference_org";
/// Property holding the URL the data was fetched from.
pub const REFERENCE_URL: &str = "reference_url";
/// Property holding the capture time of the data.
pub const REFERENCE_TIME: &str = "reference_time";

/// The three properties every relationship must carry.
pub const MANDATORY_KEYS: [&str; 3] = [REFERENCE_ORG, REFERENCE_URL, REFERENCE_TIME];

/// Truncates `t` to midnight UTC of the same day.
#[must_use]
pub fn midnight(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Origin, source locator and capture time of a data-source run.
///
/// # Examples
///
/// ```
/// use iyp::Provenance;
///
/// let reference = Provenance::new("BGPKIT", "https://data.bgpkit.com/pfx2as");
/// let props = reference.properties();
/// assert_eq!(props.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Publishing organization.
    pub org: String,
    /// Source locator, usually a URL.
    pub url: String,
    /// Capture time, at day granularity.
    pub time: DateTime<Utc>,
}

impl Provenance {
    /// Creates a provenance stamped with today's date (midnight UTC).
    #[must_use]
    pub fn new(org: impl Into<String>, url: impl Into<String>) -> Self {
        Self::at(org, url, Utc::now())
    }

    /// Creates a provenance for an explicit capture time, truncated to midnight UTC.
    #[must_use]
    pub fn at(org: impl Into<String>, url: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            org: org.into(),
            url: url.into(),
            time: midnight(time),
        }
    }

    /// The mandatory relationship properties.
    #[must_use]
    pub fn properties(&self) -> Properties {
        Properties::from([
            (REFERENCE_ORG.to_string(), Value::from(self.org.as_str())),
            (REFERENCE_URL.to_string(), Value::from(self.url.as_str())),
            (REFERENCE_TIME.to_string(), Value::from(self.time)),
        ])
    }

    /// `extra` plus the mandatory properties. Provenance wins on key clashes.
    #[must_use]
    pub fn with(&self, mut extra: Properties) -> Properties {
        extra.extend(self.properties());
        extra
    }

    /// A link to `target` carrying only this provenance.
    #[must_use]
    pub fn link(&self, rel_type: impl Into<String>, target: NodeId) -> Link {
        Link::new(rel_type, target, self.properties())
    }

    /// A link to `target` carrying `extra` plus this provenance.
    #[must_use]
    pub fn link_with(&self, rel_type: impl Into<String>, target: NodeId, extra: Properties) -> Link {
        Link::new(rel_type, target, self.with(extra))
    }
}
