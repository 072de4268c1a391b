//! Maps raw provider attributes onto canonical identities and regions.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::providers::{self, ProviderRules};
use crate::resource::{AttributesFlat, InventoryRecord, RawResource, ResourceIdentity};

/// Region reported when no region source yields a value.
pub const GLOBAL_REGION: &str = "global";

/// Prefix the inventory scanner puts in front of every generated resource name.
const SCANNER_PREFIX: &str = "tfer--";

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnresolvedIdentityError {
    #[error("unknown provider '{provider}'")]
    UnknownProvider { provider: String },

    #[error("no identity rule for {provider} resource type '{resource_type}'")]
    UnknownResourceType {
        provider: String,
        resource_type: String,
    },

    #[error("{resource_type} is missing identity attribute '{path}'")]
    MissingAttribute { resource_type: String, path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub identity: ResourceIdentity,
    pub region: String,
}

/// Where an unresolvable resource was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ResourceOrigin {
    Tracked { workspace: String, address: String },
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedResource {
    pub resource_type: String,
    pub name: String,
    #[serde(flatten)]
    pub origin: ResourceOrigin,
    pub reason: UnresolvedIdentityError,
}

pub struct Resolver {
    providers: BTreeMap<String, Box<dyn ProviderRules>>,
}

impl Resolver {
    pub fn new() -> Self {
        let providers = providers::all_providers()
            .into_iter()
            .map(|provider| (provider.name().to_string(), provider))
            .collect();
        Self { providers }
    }

    pub fn resolve(
        &self,
        provider: &str,
        resource_type: &str,
        attributes: &AttributesFlat,
    ) -> Result<ResolvedIdentity, UnresolvedIdentityError> {
        let rules = self
            .providers
            .get(providers::canonical_provider_name(provider))
            .ok_or_else(|| UnresolvedIdentityError::UnknownProvider {
                provider: provider.to_string(),
            })?;

        let rule =
            rules
                .rule(resource_type)
                .ok_or_else(|| UnresolvedIdentityError::UnknownResourceType {
                    provider: rules.name().to_string(),
                    resource_type: resource_type.to_string(),
                })?;

        let raw_identity = rule.identity.evaluate(attributes).map_err(|path| {
            UnresolvedIdentityError::MissingAttribute {
                resource_type: resource_type.to_string(),
                path: path.to_string(),
            }
        })?;

        let region = rule
            .region
            .iter()
            .find_map(|source| source.evaluate(attributes))
            .unwrap_or_else(|| GLOBAL_REGION.to_string());

        Ok(ResolvedIdentity {
            identity: ResourceIdentity::new(rules.normalize_identity(raw_identity)),
            region,
        })
    }

    /// Resolves one scanned resource into an inventory record for `division`.
    pub fn resolve_inventory(
        &self,
        division: &str,
        raw: RawResource,
    ) -> Result<InventoryRecord, UnresolvedResource> {
        match self.resolve(&raw.provider, &raw.resource_type, &raw.attributes) {
            Ok(resolved) => Ok(InventoryRecord {
                division: division.to_string(),
                provider: providers::canonical_provider_name(&raw.provider).to_string(),
                resource_name: clean_resource_name(&raw.name),
                resource_type: raw.resource_type,
                region: resolved.region,
                identity: resolved.identity,
                attributes: raw.attributes,
            }),
            Err(reason) => {
                tracing::warn!(
                    division = %division,
                    resource_type = %raw.resource_type,
                    name = %raw.name,
                    %reason,
                    "live resource has no resolvable identity"
                );
                Err(UnresolvedResource {
                    resource_type: raw.resource_type,
                    name: raw.name,
                    origin: ResourceOrigin::Live,
                    reason,
                })
            }
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns a scanner-generated name into a Terraform identifier.
///
/// Strips the `tfer--` prefix and decodes the scanner's `-00XX-` character
/// escapes: `-002D-` becomes `-`, any other escaped character becomes `_`.
pub fn clean_resource_name(name: &str) -> String {
    let stripped = name.strip_prefix(SCANNER_PREFIX).unwrap_or(name);

    let mut decoded = String::with_capacity(stripped.len());
    let mut rest = stripped;
    while let Some(pos) = rest.find("-00") {
        decoded.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let bytes = candidate.as_bytes();
        if bytes.len() >= 6
            && bytes[3].is_ascii_hexdigit()
            && bytes[4].is_ascii_hexdigit()
            && bytes[5] == b'-'
        {
            let code = &candidate[3..5];
            decoded.push(if code.eq_ignore_ascii_case("2d") { '-' } else { '_' });
            rest = &candidate[6..];
        } else {
            decoded.push('-');
            rest = &candidate[1..];
        }
    }
    decoded.push_str(rest);

    let mut cleaned: String = decoded
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if !cleaned.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        cleaned.insert(0, '_');
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> AttributesFlat {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_s3_bucket() {
        let resolver = Resolver::new();
        let resolved = resolver
            .resolve(
                "aws",
                "aws_s3_bucket",
                &attrs(&[("arn", "arn:aws:s3:::bucket-a"), ("region", "us-east-1")]),
            )
            .unwrap();
        assert_eq!(resolved.identity.as_str(), "arn:aws:s3:::bucket-a");
        assert_eq!(resolved.region, "us-east-1");
    }

    #[test]
    fn test_resolve_is_independent_of_insertion_order() {
        let resolver = Resolver::new();
        let pairs = [
            ("project", "dragon-dev"),
            ("zone", "us-central1-a"),
            ("name", "web-1"),
            ("labels.%", "0"),
        ];
        let forward = attrs(&pairs);
        let mut reversed = AttributesFlat::new();
        for (k, v) in pairs.iter().rev() {
            reversed.insert(k.to_string(), v.to_string());
        }

        let a = resolver
            .resolve("google", "google_compute_instance", &forward)
            .unwrap();
        let b = resolver
            .resolve("google", "google_compute_instance", &reversed)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.region, "us-central1");
    }

    #[test]
    fn test_resolve_defaults_to_global_region() {
        let resolver = Resolver::new();
        let resolved = resolver
            .resolve(
                "aws",
                "aws_iam_role",
                &attrs(&[("arn", "arn:aws:iam::123456789012:role/app")]),
            )
            .unwrap();
        assert_eq!(resolved.region, GLOBAL_REGION);
    }

    #[test]
    fn test_resolve_azure_identity_is_lowercased() {
        let resolver = Resolver::new();
        let upper = resolver
            .resolve(
                "azurerm",
                "azurerm_resource_group",
                &attrs(&[("id", "/subscriptions/S1/resourceGroups/Core"), ("location", "westeurope")]),
            )
            .unwrap();
        let lower = resolver
            .resolve(
                "azure",
                "azurerm_resource_group",
                &attrs(&[("id", "/subscriptions/s1/resourcegroups/core")]),
            )
            .unwrap();
        assert_eq!(upper.identity, lower.identity);
        assert_eq!(upper.region, "westeurope");
    }

    #[test]
    fn test_resolve_unknown_provider() {
        let resolver = Resolver::new();
        let err = resolver
            .resolve("cloudflare", "cloudflare_record", &AttributesFlat::new())
            .unwrap_err();
        assert_eq!(
            err,
            UnresolvedIdentityError::UnknownProvider {
                provider: "cloudflare".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_unknown_resource_type() {
        let resolver = Resolver::new();
        let err = resolver
            .resolve("aws", "aws_kinesis_stream", &AttributesFlat::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no identity rule for aws resource type 'aws_kinesis_stream'"
        );
    }

    #[test]
    fn test_resolve_missing_attribute() {
        let resolver = Resolver::new();
        let err = resolver
            .resolve("aws", "aws_s3_bucket", &attrs(&[("bucket", "b")]))
            .unwrap_err();
        assert_eq!(
            err,
            UnresolvedIdentityError::MissingAttribute {
                resource_type: "aws_s3_bucket".to_string(),
                path: "arn".to_string(),
            }
        );
    }

    #[test]
    fn test_resolve_inventory_cleans_name() {
        let resolver = Resolver::new();
        let raw = RawResource {
            resource_type: "aws_s3_bucket".to_string(),
            name: "tfer--bucket-002D-b".to_string(),
            provider: "aws".to_string(),
            attributes: attrs(&[("arn", "arn:aws:s3:::bucket-b")]),
        };
        let record = resolver.resolve_inventory("acct-1", raw).unwrap();
        assert_eq!(record.division, "acct-1");
        assert_eq!(record.resource_name, "bucket-b");
        assert_eq!(record.address(), "aws_s3_bucket.bucket-b");
        assert_eq!(record.region, GLOBAL_REGION);
    }

    #[test]
    fn test_resolve_inventory_reports_unresolved() {
        let resolver = Resolver::new();
        let raw = RawResource {
            resource_type: "aws_glue_job".to_string(),
            name: "tfer--etl".to_string(),
            provider: "aws".to_string(),
            attributes: AttributesFlat::new(),
        };
        let unresolved = resolver.resolve_inventory("acct-1", raw).unwrap_err();
        assert_eq!(unresolved.origin, ResourceOrigin::Live);
        assert!(matches!(
            unresolved.reason,
            UnresolvedIdentityError::UnknownResourceType { .. }
        ));
    }

    #[test]
    fn test_clean_resource_name() {
        assert_eq!(clean_resource_name("tfer--bucket-002D-a"), "bucket-a");
        assert_eq!(clean_resource_name("tfer--logs-002E-example-002E-com"), "logs_example_com");
        assert_eq!(clean_resource_name("tfer--web-001"), "web-001");
        assert_eq!(clean_resource_name("hand_written"), "hand_written");
        assert_eq!(clean_resource_name("tfer--123abc"), "_123abc");
        assert_eq!(clean_resource_name("tfer--"), "_");
    }
}
