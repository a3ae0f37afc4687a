//! Connection configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sql::locator::EndpointOptions;

/// Connection settings, loadable from JSON.
///
/// All fields are optional; missing fields take their defaults.
/// ```json
/// {
///   "headers": 1,
///   "gid": "0",
///   "sheet": null,
///   "user_agent": "sheet-query/0.1.0",
///   "timeout_secs": 30,
///   "fallback": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Header rows in the source sheet, unless a call or the URL says
    /// otherwise.
    pub headers: u32,
    /// Sheet id used when neither the URL nor `sheet` picks one.
    pub gid: String,
    /// Sheet name; wins over `gid`.
    pub sheet: Option<String>,
    pub user_agent: String,
    /// Per-request timeout. `None` means block until the server answers.
    pub timeout_secs: Option<u64>,
    /// Re-run statements the remote dialect rejects on a local copy.
    pub fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            headers: 0,
            gid: "0".to_string(),
            sheet: None,
            user_agent: concat!("sheet-query/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: None,
            fallback: true,
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {:?}: {}", path, e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse {:?}: {}", path, e)))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Endpoint options for one statement; `headers` overrides the
    /// configured header count when given.
    pub fn endpoint_options(&self, headers: Option<u32>) -> EndpointOptions {
        EndpointOptions {
            headers: headers.unwrap_or(self.headers),
            gid: self.gid.clone(),
            sheet: self.sheet.clone(),
        }
    }
}
