use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Flattened attribute snapshot: dot-delimited key paths to string values.
pub type AttributesFlat = BTreeMap<String, String>;

/// Tenancy boundary within a cloud provider (account, project or resource group).
pub type Division = String;

/// Named group of tracked state and configuration files.
pub type Workspace = String;

/// Canonical string naming one live cloud resource within its provider.
///
/// Only the resolver derives identities, so two equal identities always mean
/// the same resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceIdentity(String);

impl ResourceIdentity {
    pub(crate) fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resource as reported by the inventory scanner, before identity resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RawResource {
    pub resource_type: String,
    pub name: String,
    pub provider: String,
    pub attributes: AttributesFlat,
}

/// A live resource with its identity and region resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InventoryRecord {
    pub division: Division,
    pub provider: String,
    pub resource_type: String,
    pub resource_name: String,
    pub region: String,
    pub identity: ResourceIdentity,
    #[serde(skip)]
    pub attributes: AttributesFlat,
}

impl InventoryRecord {
    /// Root-module Terraform address this resource would be imported to.
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.resource_name)
    }
}
