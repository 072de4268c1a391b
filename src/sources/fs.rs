//! Filesystem-backed adapters.
//!
//! Layout:
//! - tracked state: `<root>/<division>/<workspace>.tfstate` or
//!   `<root>/<division>/<workspace>/terraform.tfstate`
//! - scanner output: `<root>/<division>/terraform.tfstate`
//! - cloud actors: `<root>/<division>/actions.json`
//! - artifacts: `<root>/<workspace directory>/imports/<file name>`

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{
    ArtifactSink, CloudActorSource, InventorySource, RawStateDocument, SinkError, SourceError,
    StateSource,
};
use crate::actors::ActionLog;
use crate::plan::Artifact;
use crate::resource::RawResource;
use crate::terraform::StateDocument;
use crate::terraform::state::IndexKey;

const STATE_FILE: &str = "terraform.tfstate";
const STATE_EXTENSION: &str = "tfstate";
const IMPORTS_DIR: &str = "imports";
const ACTIONS_FILE: &str = "actions.json";

fn read_error(path: &Path, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct FsStateSource {
    root: PathBuf,
}

impl FsStateSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// A division without state is empty, but a missing root means the state
    /// source is unreachable.
    async fn ensure_root(&self) -> Result<(), SourceError> {
        let metadata = fs::metadata(&self.root)
            .await
            .map_err(|source| read_error(&self.root, source))?;
        if !metadata.is_dir() {
            return Err(read_error(
                &self.root,
                std::io::Error::other("state root is not a directory"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StateSource for FsStateSource {
    async fn state_documents(&self, division: &str) -> Result<Vec<RawStateDocument>, SourceError> {
        let dir = self.root.join(division);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.ensure_root().await?;
                tracing::debug!(division, "no tracked state for division");
                return Ok(Vec::new());
            }
            Err(source) => return Err(read_error(&dir, source)),
        };

        let mut documents = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| read_error(&dir, source))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|source| read_error(&path, source))?;

            let (workspace, state_path) = if file_type.is_dir() {
                let candidate = path.join(STATE_FILE);
                let exists = fs::try_exists(&candidate)
                    .await
                    .map_err(|source| read_error(&candidate, source))?;
                if !exists {
                    continue;
                }
                (file_name(&path), candidate)
            } else if path.extension().is_some_and(|ext| ext == STATE_EXTENSION) {
                let workspace = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (workspace, path.clone())
            } else {
                continue;
            };

            let bytes = fs::read(&state_path)
                .await
                .map_err(|source| read_error(&state_path, source))?;
            documents.push(RawStateDocument { workspace, bytes });
        }

        documents.sort_by(|a, b| a.workspace.cmp(&b.workspace));
        tracing::debug!(division, count = documents.len(), "state documents loaded");
        Ok(documents)
    }
}

#[derive(Debug, Clone)]
pub struct FsInventorySource {
    root: PathBuf,
}

impl FsInventorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl InventorySource for FsInventorySource {
    async fn inventory(&self, division: &str) -> Result<Vec<RawResource>, SourceError> {
        let path = self.root.join(division).join(STATE_FILE);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(division, "no inventory scan for division, treating as empty");
                return Ok(Vec::new());
            }
            Err(source) => return Err(read_error(&path, source)),
        };

        let document = StateDocument::parse(division, &bytes).map_err(|source| {
            SourceError::MalformedInventory {
                division: division.to_string(),
                source,
            }
        })?;

        let resources = scanned_resources(&document);
        tracing::debug!(division, count = resources.len(), "inventory loaded");
        Ok(resources)
    }
}

/// One raw resource per scanned instance.
fn scanned_resources(document: &StateDocument) -> Vec<RawResource> {
    document
        .managed_resources()
        .flat_map(|resource| {
            resource.instances.iter().map(move |instance| {
                let name = match &instance.index_key {
                    None => resource.name.clone(),
                    Some(IndexKey::Int(index)) => format!("{}_{}", resource.name, index),
                    Some(IndexKey::Str(key)) => format!("{}_{}", resource.name, key),
                };
                RawResource {
                    resource_type: resource.resource_type.clone(),
                    name,
                    provider: resource.provider.clone(),
                    attributes: instance.attributes_flat.clone(),
                }
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct FsCloudActorSource {
    root: PathBuf,
}

impl FsCloudActorSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl CloudActorSource for FsCloudActorSource {
    async fn actions(&self, division: &str) -> Result<ActionLog, SourceError> {
        let path = self.root.join(division).join(ACTIONS_FILE);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(division, "no cloud actor log for division");
                return Ok(ActionLog::default());
            }
            Err(source) => return Err(read_error(&path, source)),
        };

        let log: ActionLog = serde_json::from_slice(&bytes)
            .map_err(|source| SourceError::MalformedActions { path: path.clone(), source })?;

        tracing::debug!(division, count = log.len(), "cloud actor log loaded");
        Ok(log)
    }
}

#[derive(Debug, Clone)]
pub struct FsArtifactSink {
    root: PathBuf,
    workspace_directories: BTreeMap<String, String>,
}

impl FsArtifactSink {
    pub fn new(root: impl Into<PathBuf>, workspace_directories: BTreeMap<String, String>) -> Self {
        Self {
            root: root.into(),
            workspace_directories,
        }
    }

    /// Where `artifact` is written. Names that could leave the output
    /// directory are rejected.
    pub fn artifact_path(&self, artifact: &Artifact) -> Result<PathBuf, SinkError> {
        if !is_plain_name(&artifact.file_name) {
            return Err(SinkError::InvalidPath(artifact.file_name.clone()));
        }

        let directory = match self.workspace_directories.get(&artifact.workspace) {
            Some(configured) => {
                let relative = Path::new(configured.trim_start_matches('/'));
                let contained = relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
                if !contained {
                    return Err(SinkError::InvalidPath(configured.clone()));
                }
                relative.to_path_buf()
            }
            None if is_plain_name(&artifact.workspace) => PathBuf::from(&artifact.workspace),
            None => return Err(SinkError::InvalidPath(artifact.workspace.clone())),
        };

        Ok(self.root.join(directory).join(IMPORTS_DIR).join(&artifact.file_name))
    }
}

/// A single path segment that is neither `.` nor `..`.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[async_trait]
impl ArtifactSink for FsArtifactSink {
    async fn write(&self, artifact: &Artifact) -> Result<(), SinkError> {
        let path = self.artifact_path(artifact)?;
        let write_error = |source: std::io::Error| SinkError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(write_error)?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| {
                if source.kind() == ErrorKind::AlreadyExists {
                    SinkError::AlreadyExists(path.clone())
                } else {
                    write_error(source)
                }
            })?;

        file.write_all(artifact.contents.as_bytes())
            .await
            .map_err(write_error)?;
        file.flush().await.map_err(write_error)?;

        tracing::info!(
            workspace = %artifact.workspace,
            path = %path.display(),
            "import plan written"
        );
        Ok(())
    }
}

/// Division names found as subdirectories of any of `roots`.
pub async fn discover_divisions(roots: &[&Path]) -> Result<BTreeSet<String>, SourceError> {
    let mut divisions = BTreeSet::new();

    for root in roots {
        let mut entries = match fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(source) => return Err(read_error(root, source)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| read_error(root, source))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|source| read_error(&entry.path(), source))?
                .is_dir();
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && !name.starts_with('.') {
                divisions.insert(name);
            }
        }
    }

    Ok(divisions)
}
