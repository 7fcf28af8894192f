//! Template - Render resources as a CloudFormation template
//!
//! Attribute names map to CloudFormation property names through the schema.
//! References become intrinsic functions:
//!
//! - `ResourceRef(x, "ref")` -> `{"Ref": "x"}`
//! - `ResourceRef(x, attr)` -> `{"Fn::GetAtt": ["x", "Attr"]}`
//! - `Join(parts)` -> `{"Fn::Join": ["", [parts...]]}`

use std::collections::HashMap;

use ecsmcp_core::resource::{DeletionPolicy, PSEUDO_PREFIX, REF_ATTR, Resource, Value};
use serde_json::{Map, json};

use crate::schemas::{AwsSchemaConfig, config_index};

pub const FORMAT_VERSION: &str = "2010-09-09";

/// Stack output
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub name: String,
    pub value: Value,
    pub description: Option<String>,
}

impl Output {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown resource type '{0}'")]
    UnknownType(String),

    #[error("'{from}' references unknown resource '{target}'")]
    UnknownReference { from: String, target: String },
}

/// Renders resources using the schema configs of their types
pub struct Renderer {
    configs: HashMap<String, AwsSchemaConfig>,
    /// Logical ID -> resource type
    types: HashMap<String, String>,
}

impl Renderer {
    pub fn new(resources: &[Resource]) -> Self {
        Self {
            configs: config_index(),
            types: resources
                .iter()
                .map(|r| (r.logical_id().to_string(), r.id.resource_type.clone()))
                .collect(),
        }
    }

    fn config(&self, resource_type: &str) -> Result<&AwsSchemaConfig, TemplateError> {
        self.configs
            .get(resource_type)
            .ok_or_else(|| TemplateError::UnknownType(resource_type.to_string()))
    }

    /// Properties of a resource keyed by CloudFormation property name
    pub fn properties(&self, resource: &Resource) -> Result<Map<String, serde_json::Value>, TemplateError> {
        let config = self.config(&resource.id.resource_type)?;
        let mut properties = Map::new();
        for (name, value) in resource.provider_attributes() {
            let computed = config
                .schema
                .attributes
                .get(name)
                .is_some_and(|a| a.computed);
            if computed {
                continue;
            }
            properties.insert(
                config.provider_name(name),
                self.render_value(resource.logical_id(), value)?,
            );
        }
        Ok(properties)
    }

    /// Render a value; nested map keys are already CloudFormation names
    pub fn render_value(&self, from: &str, value: &Value) -> Result<serde_json::Value, TemplateError> {
        Ok(match value {
            Value::String(s) => json!(s),
            Value::Int(n) => json!(n),
            Value::Bool(b) => json!(b),
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|v| self.render_value(from, v))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.render_value(from, v)?);
                }
                serde_json::Value::Object(out)
            }
            Value::ResourceRef(target, attribute) => self.render_reference(from, target, attribute)?,
            Value::Join(parts) => {
                let parts = parts
                    .iter()
                    .map(|v| self.render_value(from, v))
                    .collect::<Result<Vec<_>, _>>()?;
                json!({ "Fn::Join": ["", parts] })
            }
        })
    }

    fn render_reference(
        &self,
        from: &str,
        target: &str,
        attribute: &str,
    ) -> Result<serde_json::Value, TemplateError> {
        if target.starts_with(PSEUDO_PREFIX) {
            return Ok(json!({ "Ref": target }));
        }
        let target_type = self
            .types
            .get(target)
            .ok_or_else(|| TemplateError::UnknownReference {
                from: from.to_string(),
                target: target.to_string(),
            })?;
        if attribute == REF_ATTR {
            return Ok(json!({ "Ref": target }));
        }
        let config = self.config(target_type)?;
        Ok(json!({ "Fn::GetAtt": [target, config.provider_name(attribute)] }))
    }

    pub fn render_resource(&self, resource: &Resource) -> Result<serde_json::Value, TemplateError> {
        let config = self.config(&resource.id.resource_type)?;
        let mut entry = Map::new();
        entry.insert("Type".to_string(), json!(config.cfn_type));

        let properties = self.properties(resource)?;
        if !properties.is_empty() {
            entry.insert("Properties".to_string(), serde_json::Value::Object(properties));
        }

        let mut depends_on = resource.depends_on();
        if !depends_on.is_empty() {
            depends_on.sort();
            entry.insert("DependsOn".to_string(), json!(depends_on));
        }

        if resource.deletion_policy() == DeletionPolicy::Retain {
            entry.insert("UpdateReplacePolicy".to_string(), json!("Retain"));
            entry.insert("DeletionPolicy".to_string(), json!("Retain"));
        }

        let mut metadata = Map::new();
        if let Some(path) = resource.path() {
            metadata.insert("aws:cdk:path".to_string(), json!(path.to_string()));
        }
        let suppressions = resource.suppressions();
        if !suppressions.is_empty() {
            let rules: Vec<_> = suppressions
                .iter()
                .map(|s| json!({ "id": s.rule_id, "reason": s.reason }))
                .collect();
            metadata.insert("cdk_nag".to_string(), json!({ "rules_to_suppress": rules }));
        }
        if !metadata.is_empty() {
            entry.insert("Metadata".to_string(), serde_json::Value::Object(metadata));
        }

        Ok(serde_json::Value::Object(entry))
    }
}

/// Render a full template
pub fn synthesize(
    resources: &[Resource],
    outputs: &[Output],
    description: Option<&str>,
) -> Result<serde_json::Value, TemplateError> {
    let renderer = Renderer::new(resources);

    let mut rendered = Map::new();
    for resource in resources {
        rendered.insert(
            resource.logical_id().to_string(),
            renderer.render_resource(resource)?,
        );
    }

    let mut rendered_outputs = Map::new();
    for output in outputs {
        let mut entry = Map::new();
        entry.insert("Value".to_string(), renderer.render_value(&output.name, &output.value)?);
        if let Some(description) = &output.description {
            entry.insert("Description".to_string(), json!(description));
        }
        rendered_outputs.insert(output.name.clone(), serde_json::Value::Object(entry));
    }

    let mut template = Map::new();
    template.insert("AWSTemplateFormatVersion".to_string(), json!(FORMAT_VERSION));
    if let Some(description) = description {
        template.insert("Description".to_string(), json!(description));
    }
    template.insert("Resources".to_string(), serde_json::Value::Object(rendered));
    if !rendered_outputs.is_empty() {
        template.insert("Outputs".to_string(), serde_json::Value::Object(rendered_outputs));
    }
    Ok(serde_json::Value::Object(template))
}
