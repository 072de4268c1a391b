use crate::providers::IdentityRule;
use crate::resource::AttributesFlat;

/// The id `terraform import` expects, where it differs from the plain `id` attribute.
const REFERENCES: &[(&str, IdentityRule)] = &[
    ("aws_s3_bucket", IdentityRule::Field("bucket")),
    ("aws_s3_bucket_policy", IdentityRule::Field("bucket")),
    ("aws_iam_policy", IdentityRule::Field("arn")),
    ("aws_iam_role", IdentityRule::Field("name")),
    ("aws_iam_user", IdentityRule::Field("name")),
    ("aws_sns_topic", IdentityRule::Field("arn")),
    ("aws_sqs_queue", IdentityRule::Field("url")),
    ("aws_lambda_function", IdentityRule::Field("function_name")),
    ("aws_dynamodb_table", IdentityRule::Field("name")),
    ("aws_ecr_repository", IdentityRule::Field("name")),
    ("aws_db_instance", IdentityRule::Field("identifier")),
    (
        "aws_iam_role_policy_attachment",
        IdentityRule::Composite {
            fields: &["role", "policy_arn"],
            separator: "/",
        },
    ),
    (
        "aws_route53_record",
        IdentityRule::Composite {
            fields: &["zone_id", "name", "type"],
            separator: "_",
        },
    ),
    (
        "google_project_iam_member",
        IdentityRule::Composite {
            fields: &["project", "role", "member"],
            separator: " ",
        },
    ),
    (
        "google_storage_bucket",
        IdentityRule::Derived("{project}/{name}"),
    ),
    (
        "google_compute_instance",
        IdentityRule::Derived("projects/{project}/zones/{zone}/instances/{name}"),
    ),
];

const DEFAULT_REFERENCE: IdentityRule = IdentityRule::Field("id");

/// Computes the remote reference for an import directive, falling back to `id`.
pub fn remote_reference(resource_type: &str, attributes: &AttributesFlat) -> Option<String> {
    let rule = REFERENCES
        .iter()
        .find(|(candidate, _)| *candidate == resource_type)
        .map(|(_, rule)| rule)
        .unwrap_or(&DEFAULT_REFERENCE);

    rule.evaluate(attributes)
        .or_else(|_| DEFAULT_REFERENCE.evaluate(attributes))
        .ok()
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
    fn test_s3_bucket_reference_is_bucket_name() {
        let a = attrs(&[("arn", "arn:aws:s3:::bucket-b"), ("bucket", "bucket-b"), ("id", "bucket-b")]);
        assert_eq!(remote_reference("aws_s3_bucket", &a).as_deref(), Some("bucket-b"));
    }

    #[test]
    fn test_default_reference_is_id() {
        let a = attrs(&[("arn", "arn:aws:ec2:us-east-1:1:vpc/vpc-1"), ("id", "vpc-1")]);
        assert_eq!(remote_reference("aws_vpc", &a).as_deref(), Some("vpc-1"));
    }

    #[test]
    fn test_falls_back_to_id_when_rule_field_missing() {
        let a = attrs(&[("id", "my-role")]);
        assert_eq!(remote_reference("aws_iam_role", &a).as_deref(), Some("my-role"));
    }

    #[test]
    fn test_composite_reference() {
        let a = attrs(&[("role", "app"), ("policy_arn", "arn:aws:iam::aws:policy/ReadOnly")]);
        assert_eq!(
            remote_reference("aws_iam_role_policy_attachment", &a).as_deref(),
            Some("app/arn:aws:iam::aws:policy/ReadOnly")
        );
    }

    #[test]
    fn test_missing_reference() {
        assert_eq!(remote_reference("aws_vpc", &AttributesFlat::new()), None);
    }
}
