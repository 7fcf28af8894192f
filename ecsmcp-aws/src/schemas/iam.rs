//! IAM schema definitions

use ecsmcp_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::AwsSchemaConfig;
use super::types;

/// iam.role (AWS::IAM::Role)
pub fn role_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::IAM::Role",
        ResourceSchema::new("iam.role")
            .attribute(
                AttributeSchema::new("assume_role_policy_document", types::policy_document())
                    .required()
                    .with_provider_name("AssumeRolePolicyDocument"),
            )
            .attribute(
                AttributeSchema::new("policies", types::objects())
                    .with_description("Inline policies: PolicyName + PolicyDocument")
                    .with_provider_name("Policies"),
            )
            .attribute(
                AttributeSchema::new("managed_policy_arns", types::strings())
                    .with_provider_name("ManagedPolicyArns"),
            )
            .attribute(
                AttributeSchema::new("role_name", AttributeType::String)
                    .with_provider_name("RoleName"),
            )
            .attribute(
                AttributeSchema::new("arn", AttributeType::String)
                    .computed()
                    .with_provider_name("Arn"),
            )
            .attribute(
                AttributeSchema::new("role_id", AttributeType::String)
                    .computed()
                    .with_provider_name("RoleId"),
            ),
    )
}

/// iam.policy (AWS::IAM::Policy)
pub fn policy_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::IAM::Policy",
        ResourceSchema::new("iam.policy")
            .with_description("Policy attached to one or more roles")
            .attribute(
                AttributeSchema::new("policy_name", AttributeType::String)
                    .required()
                    .with_provider_name("PolicyName"),
            )
            .attribute(
                AttributeSchema::new("policy_document", types::policy_document())
                    .required()
                    .with_provider_name("PolicyDocument"),
            )
            .attribute(
                AttributeSchema::new("roles", types::strings())
                    .required()
                    .with_provider_name("Roles"),
            ),
    )
}

pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![role_config(), policy_config()]
}
