//! Ports to the collaborators that own I/O: state storage, the inventory
//! scanner, the cloud audit trail, the workspace oracle and the artifact sink.

pub mod fs;
pub mod oracle;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::actors::ActionLog;
use crate::plan::Artifact;
use crate::resource::RawResource;
use crate::terraform::MalformedStateError;

pub use fs::{
    FsArtifactSink, FsCloudActorSource, FsInventorySource, FsStateSource, discover_divisions,
};
pub use oracle::{MappingOracle, OfflineOracle};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed inventory for division '{division}': {source}")]
    MalformedInventory {
        division: String,
        #[source]
        source: MalformedStateError,
    },

    #[error("malformed cloud actor log {path}: {source}")]
    MalformedActions {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid workspace mapping {path}: {source}")]
    InvalidMapping {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("artifact already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("refusing to write artifact outside the output directory: {0}")]
    InvalidPath(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// State bytes of one tracked workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStateDocument {
    pub workspace: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait StateSource: Send + Sync {
    /// Every tracked state document of `division`. A read failure fails the run.
    async fn state_documents(&self, division: &str) -> Result<Vec<RawStateDocument>, SourceError>;
}

#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Live resources of `division`. A division that was never scanned has none.
    async fn inventory(&self, division: &str) -> Result<Vec<RawResource>, SourceError>;
}

#[async_trait]
pub trait CloudActorSource: Send + Sync {
    /// Creation and last modification of resources in `division`.
    async fn actions(&self, division: &str) -> Result<ActionLog, SourceError>;
}

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Stores an artifact once. Existing artifacts are never replaced.
    async fn write(&self, artifact: &Artifact) -> Result<(), SinkError>;
}
