//! Human-readable rendering of a run report.

use tabled::settings::Style;
use tabled::{Table, Tabled};
use termtree::Tree;

use crate::actors::{CloudActorTimestamp, ResourceActions, tally};
use crate::plan::{CollisionKind, DeferReason};
use crate::reconcile::{DivisionOutcome, DivisionStatus, RunReport};
use crate::resolver::ResourceOrigin;

#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Division")]
    pub division: String,
    #[tabled(rename = "New")]
    pub new: usize,
    #[tabled(rename = "Clean")]
    pub clean: usize,
    #[tabled(rename = "Drifted")]
    pub drifted: usize,
    #[tabled(rename = "Orphaned")]
    pub orphaned: usize,
    #[tabled(rename = "Unresolved")]
    pub unresolved: usize,
    #[tabled(rename = "Deferred")]
    pub deferred: usize,
    #[tabled(rename = "Planned")]
    pub planned: usize,
    #[tabled(rename = "Status")]
    pub status: String,
}

pub fn summary_rows(report: &RunReport) -> Vec<SummaryRow> {
    report
        .divisions
        .values()
        .map(|outcome| {
            let counts = outcome.classification.as_ref().map(|c| {
                (c.new.len(), c.clean.len(), c.drifted.len(), c.orphaned.len())
            });
            let (new, clean, drifted, orphaned) = counts.unwrap_or_default();
            SummaryRow {
                division: outcome.division.clone(),
                new,
                clean,
                drifted,
                orphaned,
                unresolved: outcome.unresolved.len(),
                deferred: outcome.deferred.len(),
                planned: report.plan.directive_count_for(&outcome.division),
                status: outcome.status.label().to_string(),
            }
        })
        .collect()
}

pub fn summary_table(report: &RunReport) -> String {
    Table::new(summary_rows(report)).with(Style::psql()).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct ActorRow {
    #[tabled(rename = "Actor")]
    pub actor: String,
    #[tabled(rename = "Created")]
    pub created: usize,
    #[tabled(rename = "Modified")]
    pub modified: usize,
}

/// Per-actor counts over every new or drifted resource with a known actor.
pub fn actor_rows(report: &RunReport) -> Vec<ActorRow> {
    let actions = report.divisions.values().flat_map(|outcome| outcome.actors.values());
    tally(actions)
        .into_iter()
        .map(|(actor, counts)| ActorRow {
            actor,
            created: counts.created,
            modified: counts.modified,
        })
        .collect()
}

/// `None` when no actor is known.
pub fn actor_table(report: &RunReport) -> Option<String> {
    let rows = actor_rows(report);
    (!rows.is_empty()).then(|| Table::new(rows).with(Style::psql()).to_string())
}

fn describe_actions(actions: &ResourceActions) -> String {
    let side = |verb: &str, stamp: &Option<CloudActorTimestamp>| {
        stamp
            .as_ref()
            .map(|stamp| format!("{} by {} at {}", verb, stamp.actor, stamp.timestamp))
    };
    [side("created", &actions.creation), side("modified", &actions.modified)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
}

fn division_tree(outcome: &DivisionOutcome) -> Tree<String> {
    let mut root = Tree::new(format!("{} ({})", outcome.division, outcome.status.label()));

    match &outcome.status {
        DivisionStatus::Failed { reason } | DivisionStatus::PlanWithheld { reason } => {
            root.push(Tree::new(format!("reason: {}", reason)));
        }
        DivisionStatus::Planned | DivisionStatus::Classified => {}
    }

    if !outcome.document_failures.is_empty() {
        let mut node = Tree::new("malformed state".to_string());
        for failure in &outcome.document_failures {
            node.push(Tree::new(format!("{}: {}", failure.workspace, failure.error)));
        }
        root.push(node);
    }

    if !outcome.unresolved.is_empty() {
        let mut node = Tree::new("unresolved".to_string());
        for unresolved in &outcome.unresolved {
            let seen = match &unresolved.origin {
                ResourceOrigin::Tracked { workspace, address } => format!("{} in {}", address, workspace),
                ResourceOrigin::Live => format!("{}.{} (live)", unresolved.resource_type, unresolved.name),
            };
            node.push(Tree::new(format!("{}: {}", seen, unresolved.reason)));
        }
        root.push(node);
    }

    if !outcome.deferred.is_empty() {
        let mut node = Tree::new("deferred".to_string());
        for deferred in &outcome.deferred {
            let reason = match &deferred.reason {
                DeferReason::NoWorkspace => "no workspace assigned".to_string(),
                DeferReason::OracleUnavailable { message } => format!("oracle unavailable: {}", message),
                DeferReason::NoRemoteReference => "no import id".to_string(),
                DeferReason::UnresolvedTrackedType { resource_type } => {
                    format!("tracked {} instances unresolved", resource_type)
                }
            };
            node.push(Tree::new(format!("{} [{}]: {}", deferred.address, deferred.identity, reason)));
        }
        root.push(node);
    }

    if let Some(classification) = &outcome.classification {
        if !classification.drifted.is_empty() {
            let mut node = Tree::new("drifted".to_string());
            for drifted in &classification.drifted {
                let mut leaf = Tree::new(format!("{} in {}", drifted.tracked_address, drifted.workspace));
                for difference in &drifted.differences {
                    leaf.push(Tree::new(format!(
                        "{}: {} -> {}",
                        difference.path,
                        difference.tracked.as_deref().unwrap_or("<unset>"),
                        difference.live.as_deref().unwrap_or("<unset>"),
                    )));
                }
                node.push(leaf);
            }
            root.push(node);
        }

        if !classification.orphaned.is_empty() {
            let mut node = Tree::new("orphaned".to_string());
            for orphaned in &classification.orphaned {
                node.push(Tree::new(format!(
                    "{} in {} [{}]",
                    orphaned.address, orphaned.workspace, orphaned.identity
                )));
            }
            root.push(node);
        }
    }

    if !outcome.actors.is_empty() || outcome.actors_unavailable.is_some() {
        let mut node = Tree::new("cloud actors".to_string());
        if let Some(reason) = &outcome.actors_unavailable {
            node.push(Tree::new(format!("unavailable: {}", reason)));
        }
        for (identity, actions) in &outcome.actors {
            node.push(Tree::new(format!("{}: {}", identity, describe_actions(actions))));
        }
        root.push(node);
    }

    root
}

/// Details worth a human look, or `None` when there is nothing to report.
pub fn detail_tree(report: &RunReport) -> Option<Tree<String>> {
    let mut root = Tree::new("details".to_string());
    let mut has_details = false;

    for outcome in report.divisions.values() {
        let tree = division_tree(outcome);
        if !tree.leaves.is_empty() {
            root.push(tree);
            has_details = true;
        }
    }

    if !report.plan.collisions().is_empty() {
        let mut node = Tree::new("address collisions".to_string());
        for collision in report.plan.collisions() {
            let detail = match &collision.kind {
                CollisionKind::DuplicateInPlan { kept } => format!("kept {}", kept),
                CollisionKind::AlreadyTracked => "already tracked".to_string(),
            };
            node.push(Tree::new(format!(
                "{}/{}: dropped {} from {} ({})",
                collision.workspace, collision.address, collision.dropped, collision.division, detail
            )));
        }
        root.push(node);
        has_details = true;
    }

    has_details.then_some(root)
}
