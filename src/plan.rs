//! Turns newly discovered resources into per-workspace import plans.

mod reference;

pub use reference::remote_reference;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::resource::{Division, InventoryRecord, ResourceIdentity, Workspace};
use crate::terraform::ImportFormat;
use crate::terraform::import;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("workspace oracle unavailable: {0}")]
    Unavailable(String),
}

/// Suggests the workspace a new resource should be imported into.
pub trait WorkspaceOracle: Send + Sync {
    fn assign_workspace(&self, record: &InventoryRecord) -> Result<Option<Workspace>, OracleError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDirective {
    pub division: Division,
    pub address: String,
    pub remote_reference: String,
    pub workspace: Workspace,
    pub identity: ResourceIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DeferReason {
    NoWorkspace,
    OracleUnavailable { message: String },
    NoRemoteReference,
    /// Tracked instances of this type have no identity, so the record may
    /// already be managed.
    UnresolvedTrackedType { resource_type: String },
}

/// A new resource left out of this run's plan, to be retried on the next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeferredResource {
    pub division: Division,
    pub identity: ResourceIdentity,
    pub address: String,
    #[serde(flatten)]
    pub reason: DeferReason,
}

impl DeferredResource {
    pub fn new(division: &str, record: &InventoryRecord, reason: DeferReason) -> Self {
        Self {
            division: division.to_string(),
            identity: record.identity.clone(),
            address: record.address(),
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollisionKind {
    /// Another directive in this plan already targets the address.
    DuplicateInPlan { kept: ResourceIdentity },
    /// The workspace's state already tracks a resource at the address.
    AlreadyTracked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressCollision {
    pub workspace: Workspace,
    pub address: String,
    pub dropped: ResourceIdentity,
    pub division: Division,
    #[serde(flatten)]
    pub kind: CollisionKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DivisionPlan {
    pub directives: Vec<ImportDirective>,
    pub deferred: Vec<DeferredResource>,
}

/// Builds import directives for a division's new resources.
///
/// Records are processed in identity order so that the result, and any later
/// collision handling, does not depend on scan order.
pub fn build_directives(
    division: &str,
    new: &[InventoryRecord],
    oracle: &dyn WorkspaceOracle,
) -> DivisionPlan {
    let mut ordered: Vec<&InventoryRecord> = new.iter().collect();
    ordered.sort_by(|a, b| a.identity.cmp(&b.identity));

    let mut plan = DivisionPlan::default();

    for record in ordered {
        let defer = |reason: DeferReason| DeferredResource::new(division, record, reason);

        let workspace = match oracle.assign_workspace(record) {
            Ok(Some(workspace)) if !workspace.is_empty() => workspace,
            Ok(_) => {
                tracing::warn!(identity = %record.identity, "no workspace suggested, deferring");
                plan.deferred.push(defer(DeferReason::NoWorkspace));
                continue;
            }
            Err(OracleError::Unavailable(message)) => {
                tracing::warn!(identity = %record.identity, %message, "workspace oracle unavailable, deferring");
                plan.deferred.push(defer(DeferReason::OracleUnavailable { message }));
                continue;
            }
        };

        let Some(remote_reference) = remote_reference(&record.resource_type, &record.attributes)
        else {
            tracing::warn!(identity = %record.identity, "no remote reference for import, deferring");
            plan.deferred.push(defer(DeferReason::NoRemoteReference));
            continue;
        };

        plan.directives.push(ImportDirective {
            division: division.to_string(),
            address: record.address(),
            remote_reference,
            workspace,
            identity: record.identity.clone(),
        });
    }

    plan
}

/// A rendered plan file for one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub workspace: Workspace,
    pub file_name: String,
    pub contents: String,
}

/// Import directives merged across divisions, keyed by target workspace.
#[derive(Debug, Default, Serialize)]
pub struct ImportPlan {
    workspaces: BTreeMap<Workspace, BTreeMap<String, ImportDirective>>,
    collisions: Vec<AddressCollision>,
    #[serde(skip)]
    tracked: BTreeMap<Workspace, BTreeSet<String>>,
}

impl ImportPlan {
    /// `tracked` holds the addresses each workspace's state already manages.
    pub fn new(tracked: BTreeMap<Workspace, BTreeSet<String>>) -> Self {
        Self {
            workspaces: BTreeMap::new(),
            collisions: Vec::new(),
            tracked,
        }
    }

    /// Adds a directive unless its address is taken in the target workspace.
    ///
    /// Returns false when the directive was dropped; the collision is kept for reporting.
    pub fn insert(&mut self, directive: ImportDirective) -> bool {
        let already_tracked = self
            .tracked
            .get(&directive.workspace)
            .is_some_and(|addresses| addresses.contains(&directive.address));

        let existing = self
            .workspaces
            .get(&directive.workspace)
            .and_then(|directives| directives.get(&directive.address))
            .map(|kept| kept.identity.clone());

        let kind = match (already_tracked, existing) {
            (true, _) => CollisionKind::AlreadyTracked,
            (false, Some(kept)) => CollisionKind::DuplicateInPlan { kept },
            (false, None) => {
                self.workspaces
                    .entry(directive.workspace.clone())
                    .or_default()
                    .insert(directive.address.clone(), directive);
                return true;
            }
        };

        tracing::warn!(
            workspace = %directive.workspace,
            address = %directive.address,
            dropped = %directive.identity,
            ?kind,
            "import address collision, dropping directive"
        );
        self.collisions.push(AddressCollision {
            workspace: directive.workspace,
            address: directive.address,
            dropped: directive.identity,
            division: directive.division,
            kind,
        });
        false
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }

    pub fn workspaces(&self) -> impl Iterator<Item = &Workspace> {
        self.workspaces.keys()
    }

    /// Directives for `workspace`, ordered by address.
    pub fn directives(&self, workspace: &str) -> impl Iterator<Item = &ImportDirective> {
        self.workspaces
            .get(workspace)
            .into_iter()
            .flat_map(|directives| directives.values())
    }

    pub fn directive_count(&self) -> usize {
        self.workspaces.values().map(BTreeMap::len).sum()
    }

    pub fn directive_count_for(&self, division: &str) -> usize {
        self.workspaces
            .values()
            .flat_map(BTreeMap::values)
            .filter(|directive| directive.division == division)
            .count()
    }

    pub fn collisions(&self) -> &[AddressCollision] {
        &self.collisions
    }

    /// Renders one artifact per workspace. Contents depend only on the directives.
    pub fn render(&self, run_id: &str, format: ImportFormat) -> Vec<Artifact> {
        self.workspaces
            .iter()
            .map(|(workspace, directives)| Artifact {
                workspace: workspace.clone(),
                file_name: format!("{}_imports.{}", run_id, format.extension()),
                contents: import::render(
                    directives
                        .values()
                        .map(|d| (d.address.as_str(), d.remote_reference.as_str())),
                    format,
                ),
            })
            .collect()
    }
}
