//! Terraform state parser for drift detection.
//!
//! Parses tfstate v4 files (and the scanner's `attributes_flat` variant) into
//! typed resource records with flattened attribute snapshots.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::resource::AttributesFlat;

#[derive(Debug, Error)]
pub enum MalformedStateError {
    #[error("invalid state document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate resource '{address}' in state document")]
    DuplicateResource { address: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceMode {
    #[default]
    Managed,
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKey {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub index_key: Option<IndexKey>,
    pub attributes_flat: AttributesFlat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState {
    pub resource_type: String,
    pub name: String,
    /// Short provider name, e.g. `aws`.
    pub provider: String,
    pub module: Option<String>,
    pub mode: ResourceMode,
    pub instances: Vec<Instance>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateDocument {
    pub workspace: String,
    pub resources: Vec<ResourceState>,
}

#[derive(Debug, Deserialize)]
struct RawState {
    #[serde(default)]
    resources: Vec<RawResourceState>,
}

#[derive(Debug, Deserialize)]
struct RawResourceState {
    #[serde(rename = "type")]
    type_: String,
    name: String,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    instances: Vec<RawInstance>,
}

#[derive(Debug, Deserialize)]
struct RawInstance {
    #[serde(default)]
    index_key: Option<Value>,
    #[serde(default)]
    attributes_flat: Option<AttributesFlat>,
    #[serde(default)]
    attributes: Option<Value>,
}

impl StateDocument {
    pub fn parse(workspace: impl Into<String>, bytes: &[u8]) -> Result<Self, MalformedStateError> {
        let raw: RawState = serde_json::from_slice(bytes)?;

        let mut seen = BTreeSet::new();
        let mut resources = Vec::with_capacity(raw.resources.len());

        for raw_resource in raw.resources {
            let resource = ResourceState::from_raw(raw_resource);
            let key = (
                resource.module.clone(),
                resource.mode == ResourceMode::Data,
                resource.resource_type.clone(),
                resource.name.clone(),
            );
            if !seen.insert(key) {
                return Err(MalformedStateError::DuplicateResource {
                    address: resource.base_address(),
                });
            }
            resources.push(resource);
        }

        Ok(Self {
            workspace: workspace.into(),
            resources,
        })
    }

    /// Resources Terraform manages, skipping data sources.
    pub fn managed_resources(&self) -> impl Iterator<Item = &ResourceState> {
        self.resources
            .iter()
            .filter(|resource| resource.mode == ResourceMode::Managed)
    }
}

impl ResourceState {
    fn from_raw(raw: RawResourceState) -> Self {
        let provider = raw
            .provider
            .as_deref()
            .and_then(short_provider_name)
            .unwrap_or_else(|| provider_from_type(&raw.type_));

        let mode = match raw.mode.as_deref() {
            Some("data") => ResourceMode::Data,
            _ => ResourceMode::Managed,
        };

        Self {
            resource_type: raw.type_,
            name: raw.name,
            provider,
            module: raw.module.filter(|m| !m.is_empty()),
            mode,
            instances: raw.instances.into_iter().map(Instance::from_raw).collect(),
        }
    }

    /// Address without an instance key, e.g. `module.vpc.aws_vpc.main`.
    pub fn base_address(&self) -> String {
        let prefix = match self.mode {
            ResourceMode::Managed => "",
            ResourceMode::Data => "data.",
        };
        match &self.module {
            Some(module) => format!(
                "{}.{}{}.{}",
                module, prefix, self.resource_type, self.name
            ),
            None => format!("{}{}.{}", prefix, self.resource_type, self.name),
        }
    }

    pub fn address(&self, instance: &Instance) -> String {
        let base = self.base_address();
        match &instance.index_key {
            Some(IndexKey::Int(index)) => format!("{}[{}]", base, index),
            Some(IndexKey::Str(key)) => format!("{}[\"{}\"]", base, key),
            None => base,
        }
    }
}

impl Instance {
    fn from_raw(raw: RawInstance) -> Self {
        let index_key = raw.index_key.and_then(|key| match key {
            Value::Number(n) => n.as_i64().map(IndexKey::Int),
            Value::String(s) => Some(IndexKey::Str(s)),
            _ => None,
        });

        let attributes_flat = match (raw.attributes_flat, raw.attributes) {
            (Some(flat), _) => flat,
            (None, Some(nested)) => flatten_attributes(&nested),
            (None, None) => AttributesFlat::new(),
        };

        Self {
            index_key,
            attributes_flat,
        }
    }
}

/// Reduces a provider reference to its short name.
///
/// Accepts `provider["registry.terraform.io/hashicorp/aws"]`, the same with an
/// alias suffix or module prefix, the legacy `provider.aws.west` form and a
/// bare `aws`.
pub fn short_provider_name(provider: &str) -> Option<String> {
    let provider = provider.trim();

    if let Some(start) = provider.find("provider[\"") {
        let rest = &provider[start + "provider[\"".len()..];
        let source = rest.split('"').next().unwrap_or(rest);
        return source
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_string);
    }

    if let Some(start) = provider.rfind("provider.") {
        return provider[start + "provider.".len()..]
            .split('.')
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_string);
    }

    if !provider.is_empty() && provider.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Some(provider.to_string());
    }

    None
}

fn provider_from_type(resource_type: &str) -> String {
    resource_type
        .split('_')
        .next()
        .unwrap_or(resource_type)
        .to_string()
}

/// Flattens nested attributes using Terraform flatmap conventions.
pub fn flatten_attributes(value: &Value) -> AttributesFlat {
    let mut flat = AttributesFlat::new();
    if let Value::Object(map) = value {
        for (key, value) in map {
            flatten_into(&mut flat, key.clone(), value);
        }
    }
    flat
}

fn flatten_into(flat: &mut AttributesFlat, path: String, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            flat.insert(path, b.to_string());
        }
        Value::Number(n) => {
            flat.insert(path, n.to_string());
        }
        Value::String(s) => {
            flat.insert(path, s.clone());
        }
        Value::Array(items) => {
            flat.insert(format!("{}.#", path), items.len().to_string());
            for (index, item) in items.iter().enumerate() {
                flatten_into(flat, format!("{}.{}", path, index), item);
            }
        }
        Value::Object(map) => {
            flat.insert(format!("{}.%", path), map.len().to_string());
            for (key, item) in map {
                flatten_into(flat, format!("{}.{}", path, key), item);
            }
        }
    }
}
