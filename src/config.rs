//! Optional JSON configuration file.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::WatchList;
use crate::error::TiraError;
use crate::terraform::ImportFormat;

const CONFIG_DIR: &str = "tira";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Divisions to reconcile. Empty means every division found on disk.
    pub divisions: Vec<String>,
    pub watch: WatchList,
    /// Workspace name to the directory its artifacts are written under.
    pub workspace_directories: BTreeMap<String, String>,
    pub format: ImportFormat,
}

impl ReconcileConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads `path`, or the default location when none is given.
    ///
    /// An explicit path must exist; a missing default file yields the defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self, TiraError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound && !required => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(TiraError::Config(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config: Self = serde_json::from_slice(&bytes)
            .map_err(|e| TiraError::Config(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), divisions = config.divisions.len(), "config loaded");
        Ok(config)
    }
}
