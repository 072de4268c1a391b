//! Cloud actors: who created and who last modified a live resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resource::InventoryRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudActorTimestamp {
    pub actor: String,
    pub timestamp: String,
}

/// Audit trail of one resource. Either side may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceActions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<CloudActorTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<CloudActorTimestamp>,
}

impl ResourceActions {
    pub fn is_empty(&self) -> bool {
        self.creation.is_none() && self.modified.is_none()
    }
}

/// Actions of one division, keyed by resource identity or `type.name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionLog(BTreeMap<String, ResourceActions>);

impl ActionLog {
    pub fn new(entries: BTreeMap<String, ResourceActions>) -> Self {
        Self(entries)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Identity keys win over address keys. Entries with neither side known are skipped.
    pub fn lookup(&self, record: &InventoryRecord) -> Option<&ResourceActions> {
        self.0
            .get(record.identity.as_str())
            .or_else(|| self.0.get(&record.address()))
            .filter(|actions| !actions.is_empty())
    }
}

/// How many resources each actor created and last modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorTally {
    pub created: usize,
    pub modified: usize,
}

pub fn tally<'a>(actions: impl IntoIterator<Item = &'a ResourceActions>) -> BTreeMap<String, ActorTally> {
    let mut tallies: BTreeMap<String, ActorTally> = BTreeMap::new();
    for action in actions {
        if let Some(creation) = &action.creation {
            tallies.entry(creation.actor.clone()).or_default().created += 1;
        }
        if let Some(modified) = &action.modified {
            tallies.entry(modified.actor.clone()).or_default().modified += 1;
        }
    }
    tallies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;
    use crate::resource::RawResource;

    fn stamp(actor: &str, timestamp: &str) -> Option<CloudActorTimestamp> {
        Some(CloudActorTimestamp {
            actor: actor.to_string(),
            timestamp: timestamp.to_string(),
        })
    }

    fn record(name: &str) -> InventoryRecord {
        let raw = RawResource {
            resource_type: "aws_s3_bucket".to_string(),
            name: format!("tfer--{}", name),
            provider: "aws".to_string(),
            attributes: [("arn".to_string(), format!("arn:aws:s3:::{}", name))]
                .into_iter()
                .collect(),
        };
        Resolver::new().resolve_inventory("acct-1", raw).unwrap()
    }

    #[test]
    fn test_actions_omit_unknown_sides() {
        let actions = ResourceActions {
            creation: stamp("creator@example.com", "time_1"),
            modified: None,
        };
        assert_eq!(
            serde_json::to_string(&actions).unwrap(),
            r#"{"creation":{"actor":"creator@example.com","timestamp":"time_1"}}"#
        );
    }

    #[test]
    fn test_log_parses_partial_entries() {
        let log: ActionLog = serde_json::from_str(
            r#"{
                "arn:aws:s3:::logs": {
                    "creation": {"actor": "alice", "timestamp": "2024-01-02T03:04:05Z"},
                    "modified": {"actor": "bob", "timestamp": "2024-02-03T04:05:06Z"}
                },
                "aws_s3_bucket.data": {"modified": {"actor": "ci", "timestamp": "t"}},
                "aws_s3_bucket.empty": {}
            }"#,
        )
        .unwrap();

        assert_eq!(log.len(), 3);
        let logs = log.lookup(&record("logs")).unwrap();
        assert_eq!(logs.creation.as_ref().unwrap().actor, "alice");
        assert_eq!(logs.modified.as_ref().unwrap().actor, "bob");
        assert_eq!(log.lookup(&record("data")).unwrap().modified.as_ref().unwrap().actor, "ci");
        assert!(log.lookup(&record("empty")).is_none());
        assert!(log.lookup(&record("other")).is_none());
    }

    #[test]
    fn test_identity_key_wins_over_address() {
        let log = ActionLog::new(BTreeMap::from([
            (
                "arn:aws:s3:::logs".to_string(),
                ResourceActions {
                    creation: stamp("alice", "t1"),
                    modified: None,
                },
            ),
            (
                "aws_s3_bucket.logs".to_string(),
                ResourceActions {
                    creation: stamp("mallory", "t2"),
                    modified: None,
                },
            ),
        ]));
        assert_eq!(log.lookup(&record("logs")).unwrap().creation.as_ref().unwrap().actor, "alice");
    }

    #[test]
    fn test_tally_counts_per_actor() {
        let actions = [
            ResourceActions {
                creation: stamp("alice", "t1"),
                modified: stamp("bob", "t2"),
            },
            ResourceActions {
                creation: stamp("alice", "t3"),
                modified: stamp("alice", "t4"),
            },
        ];
        let tallies = tally(&actions);
        assert_eq!(tallies["alice"], ActorTally { created: 2, modified: 1 });
        assert_eq!(tallies["bob"], ActorTally { created: 0, modified: 1 });
    }
}
