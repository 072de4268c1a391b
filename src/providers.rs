pub mod aws;
pub mod azurerm;
pub mod google;

use thiserror::Error;

use crate::resource::AttributesFlat;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// How the canonical identity of a resource type is built from its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRule {
    /// A single attribute, e.g. `arn`.
    Field(&'static str),
    /// Several attributes joined by `separator`, for types without a stable single field.
    Composite {
        fields: &'static [&'static str],
        separator: &'static str,
    },
    /// A template whose `{path}` placeholders are filled from attributes.
    Derived(&'static str),
}

impl IdentityRule {
    /// Evaluates the rule, or returns the first attribute path that is missing or empty.
    pub fn evaluate(&self, attributes: &AttributesFlat) -> Result<String, &'static str> {
        match self {
            IdentityRule::Field(path) => lookup(attributes, path)
                .map(str::to_string)
                .ok_or(*path),
            IdentityRule::Composite { fields, separator } => {
                let parts = fields
                    .iter()
                    .map(|path| lookup(attributes, path).ok_or(*path))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(parts.join(*separator))
            }
            IdentityRule::Derived(template) => expand_template(*template, attributes),
        }
    }
}

/// Where a resource's region comes from. Sources are tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSource {
    Field(&'static str),
    /// A zone attribute truncated to its region.
    Zone(&'static str),
    /// The region segment of an ARN attribute.
    Arn(&'static str),
}

impl RegionSource {
    pub fn evaluate(&self, attributes: &AttributesFlat) -> Option<String> {
        match self {
            RegionSource::Field(path) => lookup(attributes, path).map(str::to_string),
            RegionSource::Zone(path) => lookup(attributes, path).map(zone_to_region),
            RegionSource::Arn(path) => lookup(attributes, path)
                .and_then(arn_region)
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRule {
    pub resource_type: &'static str,
    pub identity: IdentityRule,
    pub region: &'static [RegionSource],
}

pub trait ProviderRules: Send + Sync {
    fn name(&self) -> &str;

    fn rules(&self) -> &'static [ResourceRule];

    fn rule(&self, resource_type: &str) -> Option<&'static ResourceRule> {
        self.rules()
            .iter()
            .find(|rule| rule.resource_type == resource_type)
    }

    /// Hook for providers whose identifiers compare case-insensitively.
    fn normalize_identity(&self, identity: String) -> String {
        identity
    }

    fn resource_types(&self) -> Vec<&str> {
        self.rules().iter().map(|rule| rule.resource_type).collect()
    }
}

pub const SUPPORTED_PROVIDERS: &[&str] = &["aws", "google", "azurerm"];

/// Maps provider aliases onto the names used by the rule tables.
pub fn canonical_provider_name(name: &str) -> &str {
    match name {
        "google-beta" | "gcp" => "google",
        "azure" => "azurerm",
        other => other,
    }
}

pub fn get_provider(name: &str) -> Result<Box<dyn ProviderRules>, ProviderError> {
    match canonical_provider_name(name) {
        "aws" => Ok(Box::new(aws::AwsProvider)),
        "google" => Ok(Box::new(google::GoogleProvider)),
        "azurerm" => Ok(Box::new(azurerm::AzureProvider)),
        _ => Err(ProviderError::UnknownProvider(name.to_string())),
    }
}

pub fn all_providers() -> Vec<Box<dyn ProviderRules>> {
    vec![
        Box::new(aws::AwsProvider),
        Box::new(google::GoogleProvider),
        Box::new(azurerm::AzureProvider),
    ]
}

fn lookup<'a>(attributes: &'a AttributesFlat, path: &str) -> Option<&'a str> {
    attributes
        .get(path)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

fn expand_template(
    template: &'static str,
    attributes: &AttributesFlat,
) -> Result<String, &'static str> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let path = &after[..end];
        out.push_str(lookup(attributes, path).ok_or(path)?);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Truncates an availability zone to its region.
///
/// `us-central1-a` becomes `us-central1`, `us-east-1a` becomes `us-east-1`.
/// Values that are already regions pass through unchanged.
pub fn zone_to_region(zone: &str) -> String {
    if let Some((region, suffix)) = zone.rsplit_once('-') {
        if suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_lowercase()) {
            return region.to_string();
        }
    }

    let bytes = zone.as_bytes();
    if bytes.len() >= 2
        && bytes[bytes.len() - 1].is_ascii_lowercase()
        && bytes[bytes.len() - 2].is_ascii_digit()
    {
        return zone[..zone.len() - 1].to_string();
    }

    zone.to_string()
}

/// Region segment of `arn:partition:service:region:account:resource`.
pub fn arn_region(arn: &str) -> Option<&str> {
    let mut parts = arn.splitn(6, ':');
    if parts.next() != Some("arn") {
        return None;
    }
    parts.nth(2).filter(|region| !region.is_empty())
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
    fn test_get_provider_known() {
        assert_eq!(get_provider("aws").unwrap().name(), "aws");
        assert_eq!(get_provider("google").unwrap().name(), "google");
        assert_eq!(get_provider("azurerm").unwrap().name(), "azurerm");
    }

    #[test]
    fn test_get_provider_aliases() {
        assert_eq!(get_provider("google-beta").unwrap().name(), "google");
        assert_eq!(get_provider("azure").unwrap().name(), "azurerm");
    }

    #[test]
    fn test_get_provider_unknown() {
        let result = get_provider("cloudflare");
        match result {
            Err(ProviderError::UnknownProvider(name)) => assert_eq!(name, "cloudflare"),
            _ => panic!("expected UnknownProvider error"),
        }
    }

    #[test]
    fn test_all_providers_match_supported_list() {
        let names: Vec<String> = all_providers()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, SUPPORTED_PROVIDERS);
    }

    #[test]
    fn test_rule_tables_have_unique_types() {
        for provider in all_providers() {
            let mut types = provider.resource_types();
            let total = types.len();
            types.sort();
            types.dedup();
            assert_eq!(types.len(), total, "duplicate rule in {}", provider.name());
        }
    }

    #[test]
    fn test_field_rule() {
        let rule = IdentityRule::Field("arn");
        assert_eq!(rule.evaluate(&attrs(&[("arn", "arn:x")])), Ok("arn:x".to_string()));
        assert_eq!(rule.evaluate(&attrs(&[])), Err("arn"));
        assert_eq!(rule.evaluate(&attrs(&[("arn", "")])), Err("arn"));
    }

    #[test]
    fn test_composite_rule_reports_first_missing_field() {
        let rule = IdentityRule::Composite {
            fields: &["role", "policy_arn"],
            separator: "/",
        };
        assert_eq!(
            rule.evaluate(&attrs(&[("role", "app"), ("policy_arn", "arn:p")])),
            Ok("app/arn:p".to_string())
        );
        assert_eq!(rule.evaluate(&attrs(&[("role", "app")])), Err("policy_arn"));
    }

    #[test]
    fn test_derived_rule() {
        let rule = IdentityRule::Derived("arn:aws:route53:::hostedzone/{zone_id}");
        assert_eq!(
            rule.evaluate(&attrs(&[("zone_id", "Z123")])),
            Ok("arn:aws:route53:::hostedzone/Z123".to_string())
        );
        assert_eq!(rule.evaluate(&attrs(&[])), Err("zone_id"));
    }

    #[test]
    fn test_zone_to_region() {
        assert_eq!(zone_to_region("us-central1-a"), "us-central1");
        assert_eq!(zone_to_region("europe-west4-c"), "europe-west4");
        assert_eq!(zone_to_region("us-east-1a"), "us-east-1");
        assert_eq!(zone_to_region("us-central1"), "us-central1");
        assert_eq!(zone_to_region("eu-west-2"), "eu-west-2");
    }

    #[test]
    fn test_arn_region() {
        assert_eq!(
            arn_region("arn:aws:lambda:eu-west-1:123456789012:function:f"),
            Some("eu-west-1")
        );
        assert_eq!(arn_region("arn:aws:s3:::bucket-a"), None);
        assert_eq!(arn_region("not-an-arn"), None);
    }

    #[test]
    fn test_region_sources() {
        let a = attrs(&[
            ("zone", "us-central1-b"),
            ("arn", "arn:aws:sqs:us-west-2:1:q"),
        ]);
        assert_eq!(
            RegionSource::Zone("zone").evaluate(&a).as_deref(),
            Some("us-central1")
        );
        assert_eq!(
            RegionSource::Arn("arn").evaluate(&a).as_deref(),
            Some("us-west-2")
        );
        assert_eq!(RegionSource::Field("region").evaluate(&a), None);
    }
}
