//! Connection and resolver configuration.
//!
//! Read from JSON. Every field is optional and falls back to the values of a
//! local development store.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::ExecutionError;

/// Configuration of an [`Iyp`](crate::Iyp) handle.
///
/// # Examples
///
/// ```
/// use iyp::IypConfig;
///
/// let config = IypConfig::from_json_str(r#"{"host": "graph.internal", "enterprise": true}"#).unwrap();
/// assert_eq!(config.uri(), "neo4j://graph.internal:7687");
/// assert!(config.enterprise);
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IypConfig {
    /// Store host name.
    pub host: String,
    /// Store Bolt port.
    pub port: u16,
    /// Login principal.
    pub user: String,
    /// Login secret.
    pub password: String,
    /// Whether the store edition supports non-uniqueness constraints.
    pub enterprise: bool,
    /// Maximum entries held by each identity cache.
    pub cache_capacity: usize,
    /// Explicit merge-label priority for entities carrying several
    /// constrained labels. Unlisted labels follow registry order.
    pub constraint_priority: Option<Vec<String>>,
}

impl Default for IypConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7687,
            user: "neo4j".to_string(),
            password: "password".to_string(),
            enterprise: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            constraint_priority: None,
        }
    }
}

impl fmt::Debug for IypConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IypConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("enterprise", &self.enterprise)
            .field("cache_capacity", &self.cache_capacity)
            .field("constraint_priority", &self.constraint_priority)
            .finish()
    }
}

impl IypConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Config`] if the document is not valid.
    pub fn from_json_str(json: &str) -> Result<Self, ExecutionError> {
        serde_json::from_str(json).map_err(|e| ExecutionError::Config {
            message: e.to_string(),
        })
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Config`] if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ExecutionError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ExecutionError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    /// Bolt routing URI of the store.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("neo4j://{}:{}", self.host, self.port)
    }
}
