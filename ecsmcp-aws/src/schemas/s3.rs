//! S3 schema definitions

use ecsmcp_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::AwsSchemaConfig;
use super::types;

/// s3.bucket (AWS::S3::Bucket)
pub fn bucket_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::S3::Bucket",
        ResourceSchema::new("s3.bucket")
            .with_description("An S3 bucket for object storage")
            .attribute(
                AttributeSchema::new("bucket_name", AttributeType::String)
                    .with_description("Bucket name (generated when omitted)")
                    .with_provider_name("BucketName"),
            )
            .attribute(
                AttributeSchema::new("bucket_encryption", AttributeType::Object)
                    .with_description("Default server-side encryption")
                    .with_provider_name("BucketEncryption"),
            )
            .attribute(
                AttributeSchema::new("public_access_block_configuration", AttributeType::Object)
                    .with_provider_name("PublicAccessBlockConfiguration"),
            )
            .attribute(
                AttributeSchema::new("ownership_controls", AttributeType::Object)
                    .with_provider_name("OwnershipControls"),
            )
            .attribute(
                AttributeSchema::new("logging_configuration", AttributeType::Object)
                    .with_description("Server access logging destination")
                    .with_provider_name("LoggingConfiguration"),
            )
            .attribute(
                AttributeSchema::new("versioning_configuration", AttributeType::Object)
                    .with_provider_name("VersioningConfiguration"),
            )
            .attribute(AttributeSchema::new("tags", types::tags()).with_provider_name("Tags"))
            .attribute(
                AttributeSchema::new("arn", AttributeType::String)
                    .computed()
                    .with_provider_name("Arn"),
            )
            .attribute(
                AttributeSchema::new("domain_name", AttributeType::String)
                    .computed()
                    .with_provider_name("DomainName"),
            ),
    )
}

/// s3.bucket_policy (AWS::S3::BucketPolicy)
pub fn bucket_policy_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::S3::BucketPolicy",
        ResourceSchema::new("s3.bucket_policy")
            .with_description("Resource policy attached to a bucket")
            .attribute(
                AttributeSchema::new("bucket", AttributeType::String)
                    .required()
                    .with_provider_name("Bucket"),
            )
            .attribute(
                AttributeSchema::new("policy_document", types::policy_document())
                    .required()
                    .with_provider_name("PolicyDocument"),
            ),
    )
}

pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![bucket_config(), bucket_policy_config()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecsmcp_core::resource::{Resource, Value};

    #[test]
    fn valid_bucket() {
        let bucket = Resource::new("s3.bucket", "Logs").with_attribute(
            "public_access_block_configuration",
            Value::map([("BlockPublicAcls", Value::Bool(true))]),
        );
        assert!(bucket_config().validate(&bucket).is_ok());
    }

    #[test]
    fn computed_attributes_are_listed() {
        let config = bucket_config();
        let mut computed: Vec<_> = config
            .schema
            .computed_attributes()
            .map(|a| a.name.as_str())
            .collect();
        computed.sort();
        assert_eq!(computed, vec!["arn", "domain_name"]);
    }

    #[test]
    fn bucket_policy_requires_document() {
        let policy = Resource::new("s3.bucket_policy", "Policy")
            .with_attribute("bucket", Value::ref_of("Logs"));
        assert!(bucket_policy_config().validate(&policy).is_err());
    }
}
