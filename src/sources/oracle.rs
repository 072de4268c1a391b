use std::collections::BTreeMap;
use std::path::Path;

use super::SourceError;
use crate::plan::{OracleError, WorkspaceOracle};
use crate::resource::{InventoryRecord, Workspace};

/// Assigns workspaces from a static mapping.
///
/// Keys are either a resource identity or `division.type.name`. An empty
/// value marks the resource as explicitly unassigned.
#[derive(Debug, Clone, Default)]
pub struct MappingOracle {
    assignments: BTreeMap<String, Workspace>,
    default_workspace: Option<Workspace>,
}

impl MappingOracle {
    pub fn new(assignments: BTreeMap<String, Workspace>, default_workspace: Option<Workspace>) -> Self {
        Self {
            assignments,
            default_workspace,
        }
    }

    /// Loads a JSON object of `key -> workspace`.
    pub async fn from_path(path: &Path, default_workspace: Option<Workspace>) -> Result<Self, SourceError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let assignments: BTreeMap<String, Workspace> =
            serde_json::from_slice(&bytes).map_err(|source| SourceError::InvalidMapping {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %path.display(), count = assignments.len(), "workspace mapping loaded");
        Ok(Self::new(assignments, default_workspace))
    }
}

impl WorkspaceOracle for MappingOracle {
    fn assign_workspace(&self, record: &InventoryRecord) -> Result<Option<Workspace>, OracleError> {
        let by_address = || {
            self.assignments
                .get(&format!("{}.{}", record.division, record.address()))
        };

        Ok(self
            .assignments
            .get(record.identity.as_str())
            .or_else(by_address)
            .or(self.default_workspace.as_ref())
            .filter(|workspace| !workspace.is_empty())
            .cloned())
    }
}

/// Stands in when no oracle can be reached; every new resource is deferred.
#[derive(Debug, Clone)]
pub struct OfflineOracle {
    reason: String,
}

impl OfflineOracle {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl WorkspaceOracle for OfflineOracle {
    fn assign_workspace(&self, _record: &InventoryRecord) -> Result<Option<Workspace>, OracleError> {
        Err(OracleError::Unavailable(self.reason.clone()))
    }
}
