//! Cloud Map schema definitions

use ecsmcp_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::AwsSchemaConfig;

/// servicediscovery.http_namespace (AWS::ServiceDiscovery::HttpNamespace)
pub fn http_namespace_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::ServiceDiscovery::HttpNamespace",
        ResourceSchema::new("servicediscovery.http_namespace")
            .with_description("HTTP namespace used by service connect")
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .required()
                    .with_provider_name("Name"),
            )
            .attribute(
                AttributeSchema::new("description", AttributeType::String)
                    .with_provider_name("Description"),
            )
            .attribute(
                AttributeSchema::new("arn", AttributeType::String)
                    .computed()
                    .with_provider_name("Arn"),
            )
            .attribute(
                AttributeSchema::new("id", AttributeType::String)
                    .computed()
                    .with_provider_name("Id"),
            ),
    )
}

pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![http_namespace_config()]
}
