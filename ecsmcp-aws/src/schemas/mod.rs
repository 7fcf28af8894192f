//! AWS resource schema definitions
//!
//! Each resource type pairs its attribute schema with the CloudFormation type
//! name and any checks that span more than one attribute.

pub mod applicationautoscaling;
pub mod ec2;
pub mod ecs;
pub mod elbv2;
pub mod iam;
pub mod logs;
pub mod s3;
pub mod secretsmanager;
pub mod servicediscovery;
pub mod types;

use std::collections::HashMap;

use ecsmcp_core::resource::{Resource, ResourceId, Value};
use ecsmcp_core::schema::{AttributeSchema, ResourceSchema, TypeError};

use crate::case_convert::to_pascal_case;

/// Check over the whole attribute map of a resource
pub type ResourceCheck = fn(&HashMap<String, Value>) -> Result<(), String>;

/// Schema configuration for an AWS resource type
#[derive(Debug)]
pub struct AwsSchemaConfig {
    /// CloudFormation type name (e.g., "AWS::EC2::VPC")
    pub cfn_type: &'static str,
    /// The resource schema with attribute definitions
    pub schema: ResourceSchema,
    /// Checks spanning several attributes
    pub checks: Vec<ResourceCheck>,
}

impl AwsSchemaConfig {
    pub fn new(cfn_type: &'static str, schema: ResourceSchema) -> Self {
        Self {
            cfn_type,
            schema,
            checks: Vec::new(),
        }
    }

    pub fn with_check(mut self, check: ResourceCheck) -> Self {
        self.checks.push(check);
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.schema.resource_type
    }

    /// CloudFormation property or attribute name for an attribute
    pub fn provider_name(&self, attribute: &str) -> String {
        self.schema
            .attributes
            .get(attribute)
            .and_then(|a| a.provider_name.clone())
            .unwrap_or_else(|| to_pascal_case(attribute))
    }

    /// Attribute whose provider name is `provider_name`
    pub fn attribute_for_provider_name(&self, provider_name: &str) -> Option<&AttributeSchema> {
        self.schema
            .attributes
            .values()
            .find(|a| a.provider_name.as_deref() == Some(provider_name))
    }

    pub fn validate(&self, resource: &Resource) -> Result<(), Vec<SchemaError>> {
        let mut errors: Vec<SchemaError> = match self.schema.validate(&resource.attributes) {
            Ok(()) => Vec::new(),
            Err(errs) => errs
                .into_iter()
                .map(|error| SchemaError::Attribute {
                    id: resource.id.clone(),
                    error,
                })
                .collect(),
        };

        for check in &self.checks {
            if let Err(message) = check(&resource.attributes) {
                errors.push(SchemaError::Check {
                    id: resource.id.clone(),
                    message,
                });
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    #[error("Unknown resource type '{0}'")]
    UnknownType(String),

    #[error("{id}: {error}")]
    Attribute { id: ResourceId, error: TypeError },

    #[error("{id}: {message}")]
    Check { id: ResourceId, message: String },
}

/// Returns the configs of every supported resource type
pub fn all_configs() -> Vec<AwsSchemaConfig> {
    let mut configs = Vec::new();
    configs.extend(s3::configs());
    configs.extend(ec2::configs());
    configs.extend(ecs::configs());
    configs.extend(elbv2::configs());
    configs.extend(iam::configs());
    configs.extend(logs::configs());
    configs.extend(secretsmanager::configs());
    configs.extend(servicediscovery::configs());
    configs.extend(applicationautoscaling::configs());
    configs
}

/// Get the AwsSchemaConfig for a resource type
pub fn config_for(resource_type: &str) -> Option<AwsSchemaConfig> {
    all_configs()
        .into_iter()
        .find(|c| c.resource_type() == resource_type)
}

/// Index of all configs by resource type
pub fn config_index() -> HashMap<String, AwsSchemaConfig> {
    all_configs()
        .into_iter()
        .map(|c| (c.resource_type().to_string(), c))
        .collect()
}

/// Validate a single resource against its type's schema
pub fn validate_resource(resource: &Resource) -> Result<(), Vec<SchemaError>> {
    match config_for(&resource.id.resource_type) {
        Some(config) => config.validate(resource),
        None => Err(vec![SchemaError::UnknownType(resource.id.resource_type.clone())]),
    }
}

/// Validate every resource, collecting all errors
pub fn validate_resources(resources: &[Resource]) -> Result<(), Vec<SchemaError>> {
    let index = config_index();
    let mut errors = Vec::new();
    for resource in resources {
        match index.get(&resource.id.resource_type) {
            Some(config) => {
                if let Err(errs) = config.validate(resource) {
                    errors.extend(errs);
                }
            }
            None => errors.push(SchemaError::UnknownType(resource.id.resource_type.clone())),
        }
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Integer value of an attribute given either as a number or a numeric string
pub(crate) fn int_attr(attributes: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match attributes.get(key)? {
        Value::Int(n) => Some(*n),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resource_types_are_unique_and_mapped() {
        let configs = all_configs();
        let types: HashSet<_> = configs.iter().map(|c| c.resource_type().to_string()).collect();
        assert_eq!(types.len(), configs.len());
        assert!(configs.iter().all(|c| c.cfn_type.starts_with("AWS::")));
        assert_eq!(config_for("ec2.vpc").unwrap().cfn_type, "AWS::EC2::VPC");
    }

    #[test]
    fn provider_names_fall_back_to_pascal_case() {
        let config = config_for("elbv2.load_balancer").unwrap();
        assert_eq!(config.provider_name("dns_name"), "DNSName");
        assert_eq!(config.provider_name("scheme"), "Scheme");
        assert_eq!(
            config.attribute_for_provider_name("DNSName").map(|a| a.name.as_str()),
            Some("dns_name")
        );
    }

    #[test]
    fn unknown_type_is_an_error() {
        let errors = validate_resource(&Resource::new("ec2.instance", "Box")).unwrap_err();
        assert!(matches!(errors[0], SchemaError::UnknownType(_)));
    }
}
