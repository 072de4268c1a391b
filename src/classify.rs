//! Set algebra between tracked state and the live inventory of one division.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolver::{ResourceOrigin, Resolver, UnresolvedResource};
use crate::resource::{AttributesFlat, Division, InventoryRecord, ResourceIdentity, Workspace};
use crate::terraform::StateDocument;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("identity collision in division '{division}': {identity} resolved from both {first} and {second}")]
pub struct IdentityCollisionError {
    pub division: Division,
    pub identity: ResourceIdentity,
    pub first: String,
    pub second: String,
}

/// Attribute paths compared between tracked and live snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchList {
    /// Paths watched on every resource type.
    pub default: Vec<String>,
    /// Extra paths per resource type.
    pub resource_types: BTreeMap<String, Vec<String>>,
}

impl Default for WatchList {
    fn default() -> Self {
        let per_type: &[(&str, &[&str])] = &[
            ("aws_s3_bucket", &["acl", "versioning", "versioning.0.enabled"]),
            ("aws_security_group", &["ingress.#", "egress.#"]),
            ("aws_instance", &["instance_type", "ami"]),
            ("aws_db_instance", &["instance_class", "engine_version"]),
            ("google_compute_instance", &["machine_type"]),
            ("google_storage_bucket", &["storage_class", "versioning.0.enabled"]),
            ("azurerm_storage_account", &["account_tier", "account_replication_type"]),
        ];

        Self {
            default: vec!["tags.%".to_string()],
            resource_types: per_type
                .iter()
                .map(|(resource_type, paths)| {
                    (
                        resource_type.to_string(),
                        paths.iter().map(|p| p.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl WatchList {
    pub fn empty() -> Self {
        Self {
            default: Vec::new(),
            resource_types: BTreeMap::new(),
        }
    }

    /// Watched paths for `resource_type`, deduplicated and sorted.
    pub fn paths_for(&self, resource_type: &str) -> BTreeSet<&str> {
        self.default
            .iter()
            .chain(self.resource_types.get(resource_type).into_iter().flatten())
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagedResource {
    pub identity: ResourceIdentity,
    pub workspace: Workspace,
    pub address: String,
    pub resource_type: String,
    pub region: String,
    #[serde(skip)]
    pub attributes: AttributesFlat,
}

/// Identities tracked by a division's state documents.
#[derive(Debug, Default)]
pub struct ManagedSet {
    entries: BTreeMap<ResourceIdentity, ManagedResource>,
    unresolved: Vec<UnresolvedResource>,
}

impl ManagedSet {
    pub fn build(division: &str, documents: &[StateDocument], resolver: &Resolver) -> Self {
        let mut set = ManagedSet::default();

        for document in documents {
            for resource in document.managed_resources() {
                for instance in &resource.instances {
                    let address = resource.address(instance);
                    let resolved = match resolver.resolve(
                        &resource.provider,
                        &resource.resource_type,
                        &instance.attributes_flat,
                    ) {
                        Ok(resolved) => resolved,
                        Err(reason) => {
                            tracing::warn!(
                                division = %division,
                                workspace = %document.workspace,
                                %address,
                                %reason,
                                "tracked resource has no resolvable identity"
                            );
                            set.unresolved.push(UnresolvedResource {
                                resource_type: resource.resource_type.clone(),
                                name: resource.name.clone(),
                                origin: ResourceOrigin::Tracked {
                                    workspace: document.workspace.clone(),
                                    address,
                                },
                                reason,
                            });
                            continue;
                        }
                    };

                    match set.entries.entry(resolved.identity.clone()) {
                        Entry::Occupied(existing) => {
                            tracing::warn!(
                                division = %division,
                                identity = %resolved.identity,
                                kept = %existing.get().address,
                                kept_workspace = %existing.get().workspace,
                                ignored = %address,
                                ignored_workspace = %document.workspace,
                                "identity tracked more than once"
                            );
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(ManagedResource {
                                identity: resolved.identity,
                                workspace: document.workspace.clone(),
                                address,
                                resource_type: resource.resource_type.clone(),
                                region: resolved.region,
                                attributes: instance.attributes_flat.clone(),
                            });
                        }
                    }
                }
            }
        }

        set
    }

    pub fn get(&self, identity: &ResourceIdentity) -> Option<&ManagedResource> {
        self.entries.get(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedResource> {
        self.entries.values()
    }

    /// Tracked resources whose identity could not be resolved.
    pub fn unresolved(&self) -> &[UnresolvedResource] {
        &self.unresolved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationKind {
    New,
    ManagedClean,
    ManagedDrifted,
    Orphaned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDifference {
    pub path: String,
    pub tracked: Option<String>,
    pub live: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftedResource {
    pub record: InventoryRecord,
    pub workspace: Workspace,
    pub tracked_address: String,
    pub differences: Vec<AttributeDifference>,
}

/// Partition of a division's tracked and live identities. Each list is sorted by identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub division: Division,
    pub new: Vec<InventoryRecord>,
    pub clean: Vec<InventoryRecord>,
    pub drifted: Vec<DriftedResource>,
    pub orphaned: Vec<ManagedResource>,
}

impl Classification {
    fn empty(division: &str) -> Self {
        Self {
            division: division.to_string(),
            new: Vec::new(),
            clean: Vec::new(),
            drifted: Vec::new(),
            orphaned: Vec::new(),
        }
    }

    pub fn kind_of(&self, identity: &ResourceIdentity) -> Option<ClassificationKind> {
        if self.new.iter().any(|r| &r.identity == identity) {
            Some(ClassificationKind::New)
        } else if self.clean.iter().any(|r| &r.identity == identity) {
            Some(ClassificationKind::ManagedClean)
        } else if self.drifted.iter().any(|d| &d.record.identity == identity) {
            Some(ClassificationKind::ManagedDrifted)
        } else if self.orphaned.iter().any(|m| &m.identity == identity) {
            Some(ClassificationKind::Orphaned)
        } else {
            None
        }
    }

    pub fn count(&self, kind: ClassificationKind) -> usize {
        match kind {
            ClassificationKind::New => self.new.len(),
            ClassificationKind::ManagedClean => self.clean.len(),
            ClassificationKind::ManagedDrifted => self.drifted.len(),
            ClassificationKind::Orphaned => self.orphaned.len(),
        }
    }
}

/// Classifies every live record of a division against its managed set.
///
/// Two records resolving to the same identity abort the division with
/// [`IdentityCollisionError`] instead of being collapsed.
pub fn classify(
    division: &str,
    managed: &ManagedSet,
    inventory: Vec<InventoryRecord>,
    watch: &WatchList,
) -> Result<Classification, IdentityCollisionError> {
    let mut live: BTreeMap<ResourceIdentity, InventoryRecord> = BTreeMap::new();

    for record in inventory {
        match live.entry(record.identity.clone()) {
            Entry::Occupied(existing) => {
                return Err(IdentityCollisionError {
                    division: division.to_string(),
                    identity: record.identity.clone(),
                    first: existing.get().address(),
                    second: record.address(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
    }

    let mut classification = Classification::empty(division);

    classification.orphaned = managed
        .iter()
        .filter(|tracked| !live.contains_key(&tracked.identity))
        .cloned()
        .collect();

    for (identity, record) in live {
        let Some(tracked) = managed.get(&identity) else {
            classification.new.push(record);
            continue;
        };

        let differences = attribute_differences(
            &tracked.attributes,
            &record.attributes,
            watch.paths_for(&record.resource_type),
        );

        if differences.is_empty() {
            classification.clean.push(record);
        } else {
            classification.drifted.push(DriftedResource {
                record,
                workspace: tracked.workspace.clone(),
                tracked_address: tracked.address.clone(),
                differences,
            });
        }
    }

    tracing::debug!(
        division = %division,
        new = classification.new.len(),
        clean = classification.clean.len(),
        drifted = classification.drifted.len(),
        orphaned = classification.orphaned.len(),
        "division classified"
    );

    Ok(classification)
}

/// Exact string comparison per path. A path absent on both sides is equal.
fn attribute_differences<'a>(
    tracked: &AttributesFlat,
    live: &AttributesFlat,
    paths: impl IntoIterator<Item = &'a str>,
) -> Vec<AttributeDifference> {
    paths
        .into_iter()
        .filter_map(|path| {
            let tracked_value = tracked.get(path);
            let live_value = live.get(path);
            (tracked_value != live_value).then(|| AttributeDifference {
                path: path.to_string(),
                tracked: tracked_value.cloned(),
                live: live_value.cloned(),
            })
        })
        .collect()
}
