//! Runtime settings.
//!
//! [`MirrorConfig`] collects the knobs a deployment may want to change without
//! recompiling. Every field has a default, so an empty JSON object (or no file
//! at all) is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Result,
    constants::{DEFAULT_PRIORITY, DEFAULT_RESULT_CAPACITY},
};

/// Settings applied to new roots and their dispatchers.
///
/// ```
/// # use mirrordoc::MirrorConfig;
/// let config = MirrorConfig::from_json_str(r#"{"max_in_flight": 4}"#).unwrap();
/// assert_eq!(config.max_in_flight, 4);
/// assert_eq!(config.result_capacity, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Capacity of each dispatcher's recent-results feed
    pub result_capacity: usize,
    /// Maximum number of writes running at once across keys; 0 means
    /// unlimited
    pub max_in_flight: usize,
    /// Priority of a root's writes unless set on the builder
    pub default_priority: u32,
    /// Replace stored contents with the initial value on open
    pub overwrite: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            result_capacity: DEFAULT_RESULT_CAPACITY,
            max_in_flight: 0,
            default_priority: DEFAULT_PRIORITY,
            overwrite: false,
        }
    }
}

impl MirrorConfig {
    /// Parses settings from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads settings from a JSON file; a missing file yields the defaults.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                debug!(path = %path.display(), "Loaded mirror config");
                Self::from_json_str(&json)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}
