use super::{IdentityRule, ProviderRules, RegionSource, ResourceRule};

const RULES: &[ResourceRule] = &[
    ResourceRule {
        resource_type: "google_storage_bucket",
        identity: IdentityRule::Derived("projects/{project}/buckets/{name}"),
        region: &[RegionSource::Field("location")],
    },
    ResourceRule {
        resource_type: "google_compute_instance",
        identity: IdentityRule::Derived("projects/{project}/zones/{zone}/instances/{name}"),
        region: &[RegionSource::Zone("zone")],
    },
    ResourceRule {
        resource_type: "google_compute_network",
        identity: IdentityRule::Derived("projects/{project}/global/networks/{name}"),
        region: &[],
    },
    ResourceRule {
        resource_type: "google_compute_subnetwork",
        identity: IdentityRule::Derived("projects/{project}/regions/{region}/subnetworks/{name}"),
        region: &[RegionSource::Field("region")],
    },
    ResourceRule {
        resource_type: "google_compute_firewall",
        identity: IdentityRule::Derived("projects/{project}/global/firewalls/{name}"),
        region: &[],
    },
    ResourceRule {
        resource_type: "google_compute_disk",
        identity: IdentityRule::Derived("projects/{project}/zones/{zone}/disks/{name}"),
        region: &[RegionSource::Zone("zone")],
    },
    ResourceRule {
        resource_type: "google_container_cluster",
        identity: IdentityRule::Derived("projects/{project}/locations/{location}/clusters/{name}"),
        // location is either a region or a zone
        region: &[RegionSource::Zone("location")],
    },
    ResourceRule {
        resource_type: "google_sql_database_instance",
        identity: IdentityRule::Derived("projects/{project}/instances/{name}"),
        region: &[RegionSource::Field("region")],
    },
    ResourceRule {
        resource_type: "google_pubsub_topic",
        identity: IdentityRule::Derived("projects/{project}/topics/{name}"),
        region: &[],
    },
    ResourceRule {
        resource_type: "google_service_account",
        identity: IdentityRule::Derived("projects/{project}/serviceAccounts/{email}"),
        region: &[],
    },
    ResourceRule {
        resource_type: "google_project_iam_member",
        identity: IdentityRule::Composite {
            fields: &["project", "role", "member"],
            separator: " ",
        },
        region: &[],
    },
];

pub struct GoogleProvider;

impl ProviderRules for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn rules(&self) -> &'static [ResourceRule] {
        RULES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::AttributesFlat;

    fn attrs(pairs: &[(&str, &str)]) -> AttributesFlat {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_compute_instance_identity_and_region() {
        let rule = GoogleProvider.rule("google_compute_instance").unwrap();
        let a = attrs(&[
            ("project", "dragon-dev"),
            ("zone", "us-central1-a"),
            ("name", "web-1"),
        ]);
        assert_eq!(
            rule.identity.evaluate(&a).unwrap(),
            "projects/dragon-dev/zones/us-central1-a/instances/web-1"
        );
        assert_eq!(rule.region[0].evaluate(&a).as_deref(), Some("us-central1"));
    }

    #[test]
    fn test_container_cluster_regional_location_passes_through() {
        let rule = GoogleProvider.rule("google_container_cluster").unwrap();
        let a = attrs(&[("location", "europe-west1")]);
        assert_eq!(rule.region[0].evaluate(&a).as_deref(), Some("europe-west1"));
    }

    #[test]
    fn test_missing_project_is_reported() {
        let rule = GoogleProvider.rule("google_storage_bucket").unwrap();
        let a = attrs(&[("name", "assets")]);
        assert_eq!(rule.identity.evaluate(&a), Err("project"));
    }
}
