//! CloudWatch Logs schema definitions

use ecsmcp_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::AwsSchemaConfig;
use super::types;

/// logs.log_group (AWS::Logs::LogGroup)
pub fn log_group_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::Logs::LogGroup",
        ResourceSchema::new("logs.log_group")
            .attribute(
                AttributeSchema::new("log_group_name", AttributeType::String)
                    .with_provider_name("LogGroupName"),
            )
            .attribute(
                AttributeSchema::new("retention_in_days", types::log_retention_days())
                    .with_provider_name("RetentionInDays"),
            )
            .attribute(
                AttributeSchema::new("arn", AttributeType::String)
                    .computed()
                    .with_provider_name("Arn"),
            ),
    )
}

pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![log_group_config()]
}
