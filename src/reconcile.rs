//! One reconciliation run: per-division classification and planning, merged
//! into a single import plan.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::actors::{ActionLog, ResourceActions};
use crate::classify::{Classification, ManagedSet, WatchList, classify};
use crate::plan::{
    DeferReason, DeferredResource, ImportDirective, ImportPlan, WorkspaceOracle, build_directives,
};
use crate::resolver::{ResourceOrigin, Resolver, UnresolvedResource};
use crate::resource::{Division, InventoryRecord, RawResource, ResourceIdentity, Workspace};
use crate::sources::{
    ArtifactSink, CloudActorSource, InventorySource, RawStateDocument, SinkError, SourceError,
    StateSource,
};
use crate::terraform::{ImportFormat, StateDocument};

/// Everything the engine needs for one division, already fetched.
#[derive(Debug)]
pub struct DivisionInput {
    pub division: Division,
    pub state_documents: Vec<RawStateDocument>,
    pub inventory: Result<Vec<RawResource>, SourceError>,
    pub actions: Result<ActionLog, SourceError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub workspace: Workspace,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DivisionStatus {
    Planned,
    /// Classified without planning imports.
    Classified,
    /// Classified, but new resources were not planned.
    PlanWithheld { reason: String },
    Failed { reason: String },
}

impl DivisionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DivisionStatus::Planned => "planned",
            DivisionStatus::Classified => "classified",
            DivisionStatus::PlanWithheld { .. } => "plan withheld",
            DivisionStatus::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DivisionOutcome {
    pub division: Division,
    #[serde(flatten)]
    pub status: DivisionStatus,
    pub classification: Option<Classification>,
    pub unresolved: Vec<UnresolvedResource>,
    pub deferred: Vec<DeferredResource>,
    pub document_failures: Vec<DocumentFailure>,
    /// Who created and last modified each new or drifted resource.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub actors: BTreeMap<ResourceIdentity, ResourceActions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actors_unavailable: Option<String>,
    #[serde(skip)]
    directives: Vec<ImportDirective>,
    #[serde(skip)]
    tracked: BTreeMap<Workspace, BTreeSet<String>>,
}

impl DivisionOutcome {
    fn new(division: &str) -> Self {
        Self {
            division: division.to_string(),
            status: DivisionStatus::Classified,
            classification: None,
            unresolved: Vec::new(),
            deferred: Vec::new(),
            document_failures: Vec::new(),
            actors: BTreeMap::new(),
            actors_unavailable: None,
            directives: Vec::new(),
            tracked: BTreeMap::new(),
        }
    }

    fn fail(mut self, reason: String) -> Self {
        tracing::error!(division = %self.division, %reason, "division failed");
        self.status = DivisionStatus::Failed { reason };
        self
    }
}

/// Result of a whole run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub divisions: BTreeMap<Division, DivisionOutcome>,
    pub plan: ImportPlan,
}

impl RunReport {
    pub fn failed_divisions(&self) -> impl Iterator<Item = &DivisionOutcome> {
        self.divisions
            .values()
            .filter(|outcome| matches!(outcome.status, DivisionStatus::Failed { .. }))
    }
}

pub struct Engine {
    resolver: Resolver,
    watch: WatchList,
    oracle: Arc<dyn WorkspaceOracle>,
    plan_imports: bool,
}

impl Engine {
    pub fn new(watch: WatchList, oracle: Arc<dyn WorkspaceOracle>) -> Self {
        Self {
            resolver: Resolver::new(),
            watch,
            oracle,
            plan_imports: true,
        }
    }

    /// Classify and report drift only; no import directives are built.
    pub fn classify_only(mut self) -> Self {
        self.plan_imports = false;
        self
    }

    /// Reconciles one division. Never reads another division's data.
    pub fn reconcile_division(&self, input: DivisionInput) -> DivisionOutcome {
        let DivisionInput {
            division,
            state_documents,
            inventory,
            actions,
        } = input;
        let mut outcome = DivisionOutcome::new(&division);

        let mut documents = Vec::with_capacity(state_documents.len());
        for raw in state_documents {
            match StateDocument::parse(raw.workspace.as_str(), &raw.bytes) {
                Ok(document) => documents.push(document),
                Err(error) => {
                    tracing::warn!(
                        division = %division,
                        workspace = %raw.workspace,
                        %error,
                        "skipping malformed state document"
                    );
                    outcome.document_failures.push(DocumentFailure {
                        workspace: raw.workspace,
                        error: error.to_string(),
                    });
                }
            }
        }

        for document in &documents {
            let addresses = outcome.tracked.entry(document.workspace.clone()).or_default();
            addresses.extend(document.managed_resources().map(|r| r.base_address()));
        }

        let raw_inventory = match inventory {
            Ok(resources) => resources,
            Err(error) => return outcome.fail(error.to_string()),
        };

        let managed = ManagedSet::build(&division, &documents, &self.resolver);
        outcome.unresolved = managed.unresolved().to_vec();

        let mut records = Vec::with_capacity(raw_inventory.len());
        for raw in raw_inventory {
            match self.resolver.resolve_inventory(&division, raw) {
                Ok(record) => records.push(record),
                Err(unresolved) => outcome.unresolved.push(unresolved),
            }
        }

        let classification = match classify(&division, &managed, records, &self.watch) {
            Ok(classification) => classification,
            Err(collision) => return outcome.fail(collision.to_string()),
        };

        if self.plan_imports {
            if outcome.document_failures.is_empty() {
                let (plannable, held) =
                    split_unresolved_types(&classification.new, &outcome.unresolved);
                let plan = build_directives(&division, &plannable, self.oracle.as_ref());
                outcome.directives = plan.directives;
                outcome.deferred = plan.deferred;
                for record in &held {
                    tracing::warn!(
                        division = %division,
                        identity = %record.identity,
                        "deferring import, tracked instances of this type are unresolved"
                    );
                    let reason = DeferReason::UnresolvedTrackedType {
                        resource_type: record.resource_type.clone(),
                    };
                    outcome.deferred.push(DeferredResource::new(&division, record, reason));
                }
                outcome.deferred.sort_by(|a, b| a.identity.cmp(&b.identity));
                outcome.status = DivisionStatus::Planned;
            } else {
                let reason = format!(
                    "{} state document(s) could not be parsed",
                    outcome.document_failures.len()
                );
                tracing::warn!(division = %division, %reason, "withholding import plan");
                outcome.status = DivisionStatus::PlanWithheld { reason };
            }
        }

        match actions {
            Ok(log) => outcome.actors = attribute_actors(&classification, &log),
            Err(error) => {
                tracing::warn!(division = %division, %error, "cloud actors unavailable");
                outcome.actors_unavailable = Some(error.to_string());
            }
        }

        outcome.classification = Some(classification);
        outcome
    }

    /// Reconciles every division in parallel, then merges their directives
    /// in division order.
    pub fn reconcile(&self, inputs: Vec<DivisionInput>) -> RunReport {
        let mut divisions: BTreeMap<Division, DivisionOutcome> = inputs
            .into_par_iter()
            .map(|input| {
                let outcome = self.reconcile_division(input);
                (outcome.division.clone(), outcome)
            })
            .collect();

        let mut tracked: BTreeMap<Workspace, BTreeSet<String>> = BTreeMap::new();
        for outcome in divisions.values() {
            for (workspace, addresses) in &outcome.tracked {
                tracked
                    .entry(workspace.clone())
                    .or_default()
                    .extend(addresses.iter().cloned());
            }
        }

        let mut plan = ImportPlan::new(tracked);
        for outcome in divisions.values_mut() {
            for directive in outcome.directives.drain(..) {
                plan.insert(directive);
            }
        }

        tracing::info!(
            divisions = divisions.len(),
            directives = plan.directive_count(),
            collisions = plan.collisions().len(),
            "reconciliation complete"
        );

        RunReport { divisions, plan }
    }
}

/// Splits new records into those safe to plan and those whose type has a
/// tracked instance without an identity. Such a record may already be managed.
fn split_unresolved_types(
    new: &[InventoryRecord],
    unresolved: &[UnresolvedResource],
) -> (Vec<InventoryRecord>, Vec<InventoryRecord>) {
    let held_types: BTreeSet<&str> = unresolved
        .iter()
        .filter(|resource| matches!(resource.origin, ResourceOrigin::Tracked { .. }))
        .map(|resource| resource.resource_type.as_str())
        .collect();

    new.iter()
        .cloned()
        .partition(|record| !held_types.contains(record.resource_type.as_str()))
}

fn attribute_actors(
    classification: &Classification,
    log: &ActionLog,
) -> BTreeMap<ResourceIdentity, ResourceActions> {
    let drifted = classification.drifted.iter().map(|drifted| &drifted.record);
    classification
        .new
        .iter()
        .chain(drifted)
        .filter_map(|record| {
            log.lookup(record)
                .map(|actions| (record.identity.clone(), actions.clone()))
        })
        .collect()
}

/// Fetches state, inventory and cloud actors for each division.
///
/// A state source failure aborts; inventory and actor failures stay with
/// their division.
pub async fn collect_inputs(
    divisions: &BTreeSet<Division>,
    state: &dyn StateSource,
    inventory: &dyn InventorySource,
    actors: Option<&dyn CloudActorSource>,
) -> Result<Vec<DivisionInput>, SourceError> {
    let mut inputs = Vec::with_capacity(divisions.len());

    for division in divisions {
        let state_documents = state.state_documents(division).await?;
        let inventory = inventory.inventory(division).await;
        let actions = match actors {
            Some(source) => source.actions(division).await,
            None => Ok(ActionLog::default()),
        };
        inputs.push(DivisionInput {
            division: division.clone(),
            state_documents,
            inventory,
            actions,
        });
    }

    Ok(inputs)
}

/// Renders the plan and hands every artifact to `sink`. Returns the number written.
pub async fn write_artifacts(
    plan: &ImportPlan,
    run_id: &str,
    format: ImportFormat,
    sink: &dyn ArtifactSink,
) -> Result<usize, SinkError> {
    let artifacts = plan.render(run_id, format);
    for artifact in &artifacts {
        sink.write(artifact).await?;
    }
    Ok(artifacts.len())
}
