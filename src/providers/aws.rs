use super::{IdentityRule, ProviderRules, RegionSource, ResourceRule};

/// ARN first, then an explicit `region` attribute.
const ARN_REGION: &[RegionSource] = &[RegionSource::Arn("arn"), RegionSource::Field("region")];
const REGION_ONLY: &[RegionSource] = &[RegionSource::Field("region")];
const GLOBAL: &[RegionSource] = &[];

const RULES: &[ResourceRule] = &[
    ResourceRule {
        resource_type: "aws_s3_bucket",
        identity: IdentityRule::Field("arn"),
        // S3 ARNs carry no region
        region: &[RegionSource::Field("region")],
    },
    ResourceRule {
        resource_type: "aws_s3_bucket_policy",
        identity: IdentityRule::Derived("arn:aws:s3:::{bucket}/policy"),
        region: REGION_ONLY,
    },
    ResourceRule {
        resource_type: "aws_instance",
        identity: IdentityRule::Field("arn"),
        region: &[RegionSource::Arn("arn"), RegionSource::Zone("availability_zone")],
    },
    ResourceRule {
        resource_type: "aws_vpc",
        identity: IdentityRule::Field("arn"),
        region: ARN_REGION,
    },
    ResourceRule {
        resource_type: "aws_subnet",
        identity: IdentityRule::Field("arn"),
        region: &[RegionSource::Arn("arn"), RegionSource::Zone("availability_zone")],
    },
    ResourceRule {
        resource_type: "aws_security_group",
        identity: IdentityRule::Field("arn"),
        region: ARN_REGION,
    },
    ResourceRule {
        resource_type: "aws_lambda_function",
        identity: IdentityRule::Field("arn"),
        region: ARN_REGION,
    },
    ResourceRule {
        resource_type: "aws_dynamodb_table",
        identity: IdentityRule::Field("arn"),
        region: ARN_REGION,
    },
    ResourceRule {
        resource_type: "aws_sqs_queue",
        identity: IdentityRule::Field("arn"),
        region: ARN_REGION,
    },
    ResourceRule {
        resource_type: "aws_sns_topic",
        identity: IdentityRule::Field("arn"),
        region: ARN_REGION,
    },
    ResourceRule {
        resource_type: "aws_db_instance",
        identity: IdentityRule::Field("arn"),
        region: ARN_REGION,
    },
    ResourceRule {
        resource_type: "aws_ecr_repository",
        identity: IdentityRule::Field("arn"),
        region: ARN_REGION,
    },
    ResourceRule {
        resource_type: "aws_iam_role",
        identity: IdentityRule::Field("arn"),
        region: GLOBAL,
    },
    ResourceRule {
        resource_type: "aws_iam_user",
        identity: IdentityRule::Field("arn"),
        region: GLOBAL,
    },
    ResourceRule {
        resource_type: "aws_iam_policy",
        identity: IdentityRule::Field("arn"),
        region: GLOBAL,
    },
    ResourceRule {
        resource_type: "aws_iam_role_policy_attachment",
        identity: IdentityRule::Composite {
            fields: &["role", "policy_arn"],
            separator: "/",
        },
        region: GLOBAL,
    },
    ResourceRule {
        resource_type: "aws_route53_zone",
        identity: IdentityRule::Derived("arn:aws:route53:::hostedzone/{zone_id}"),
        region: GLOBAL,
    },
    ResourceRule {
        resource_type: "aws_route53_record",
        identity: IdentityRule::Composite {
            fields: &["zone_id", "name", "type"],
            separator: "_",
        },
        region: GLOBAL,
    },
];

pub struct AwsProvider;

impl ProviderRules for AwsProvider {
    fn name(&self) -> &str {
        "aws"
    }

    fn rules(&self) -> &'static [ResourceRule] {
        RULES
    }
}
