//! Mapping between resource attributes and Cloud Control properties
//!
//! Cloud Control does not expand `{{resolve:secretsmanager:...}}` dynamic
//! references the way CloudFormation does. Every such string is replaced by
//! the secret value before a document is sent, and the recorded state keeps
//! the reference so the value never lands in the state file.

use std::collections::{BTreeSet, HashMap};

use ecsmcp_aws::AwsSchemaConfig;
use ecsmcp_aws::routing::parse_secret_reference;
use ecsmcp_core::provider::{ProviderError, ProviderResult};
use ecsmcp_core::resource::{Resource, State, Value};
use serde_json::json;

/// Secret id -> secret string, fetched for the references of one resource
pub type SecretValues = HashMap<String, String>;

fn is_computed(config: &AwsSchemaConfig, attribute: &str) -> bool {
    config
        .schema
        .attributes
        .get(attribute)
        .is_some_and(|a| a.computed)
}

/// Secret ids referenced anywhere in the resource's attributes
pub fn secret_references(resource: &Resource) -> BTreeSet<String> {
    fn collect(json: &serde_json::Value, ids: &mut BTreeSet<String>) {
        match json {
            serde_json::Value::String(s) => ids.extend(parse_secret_reference(s)),
            serde_json::Value::Array(items) => items.iter().for_each(|v| collect(v, ids)),
            serde_json::Value::Object(map) => map.values().for_each(|v| collect(v, ids)),
            _ => {}
        }
    }
    let mut ids = BTreeSet::new();
    for (_, value) in resource.provider_attributes() {
        collect(&value.to_json(), &mut ids);
    }
    ids
}

fn holds_secret_reference(value: &Value) -> bool {
    match value {
        Value::String(s) => parse_secret_reference(s).is_some(),
        Value::List(items) => items.iter().any(holds_secret_reference),
        Value::Map(map) => map.values().any(holds_secret_reference),
        _ => false,
    }
}

/// JSON form of `value` with every secret reference replaced by its value
fn reveal(value: &Value, secrets: &SecretValues) -> ProviderResult<serde_json::Value> {
    fn walk(json: &mut serde_json::Value, secrets: &SecretValues) -> ProviderResult<()> {
        match json {
            serde_json::Value::String(s) => {
                if let Some(id) = parse_secret_reference(s) {
                    let secret = secrets.get(&id).ok_or_else(|| {
                        ProviderError::invalid(format!("value of secret {} was not fetched", id))
                    })?;
                    *s = secret.clone();
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    walk(item, secrets)?;
                }
            }
            serde_json::Value::Object(map) => {
                for item in map.values_mut() {
                    walk(item, secrets)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
    let mut json = value.to_json();
    walk(&mut json, secrets)?;
    Ok(json)
}

/// Put the desired value back wherever it carried a secret reference
pub fn conceal_secrets(state: &mut State, resource: &Resource) {
    for (name, value) in resource.provider_attributes() {
        if holds_secret_reference(value) && state.attributes.contains_key(name) {
            state.attributes.insert(name.clone(), value.clone());
        }
    }
}

/// Desired state document for CreateResource
pub fn desired_state(
    resource: &Resource,
    config: &AwsSchemaConfig,
    secrets: &SecretValues,
) -> ProviderResult<serde_json::Value> {
    let mut desired = serde_json::Map::new();
    for (name, value) in resource.provider_attributes() {
        if is_computed(config, name) {
            continue;
        }
        desired.insert(config.provider_name(name), reveal(value, secrets)?);
    }
    set_default_values(config.resource_type(), &mut desired);
    Ok(serde_json::Value::Object(desired))
}

/// Defaults Cloud Control does not fill in by itself
fn set_default_values(resource_type: &str, desired: &mut serde_json::Map<String, serde_json::Value>) {
    if resource_type == "ec2.eip" && !desired.contains_key("Domain") {
        desired.insert("Domain".to_string(), json!("vpc"));
    }
}

/// JSON patch operations turning `from` into `to`
pub fn patch_operations(
    from: &State,
    to: &Resource,
    config: &AwsSchemaConfig,
    secrets: &SecretValues,
) -> ProviderResult<Vec<serde_json::Value>> {
    let mut ops = Vec::new();

    let mut names: Vec<&String> = to.provider_attributes().map(|(k, _)| k).collect();
    names.sort();
    for name in names {
        if is_computed(config, name) {
            continue;
        }
        let Some(value) = to.get(name) else {
            continue;
        };
        if from.attributes.get(name) == Some(value) {
            continue;
        }
        // "add" replaces an existing member
        ops.push(json!({
            "op": "add",
            "path": format!("/{}", config.provider_name(name)),
            "value": reveal(value, secrets)?
        }));
    }

    let mut removed: Vec<&String> = from
        .attributes
        .keys()
        .filter(|k| !k.starts_with('_'))
        .filter(|k| config.schema.attributes.contains_key(k.as_str()))
        .filter(|k| !is_computed(config, k))
        .filter(|k| to.get(k).is_none())
        .collect();
    removed.sort();
    for name in removed {
        ops.push(json!({
            "op": "remove",
            "path": format!("/{}", config.provider_name(name)),
        }));
    }

    Ok(ops)
}

/// Attributes read back from a GetResource properties document
pub fn read_back(props: &serde_json::Value, config: &AwsSchemaConfig) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    for name in config.schema.attributes.keys() {
        if let Some(value) = props.get(config.provider_name(name).as_str()) {
            attributes.insert(name.clone(), Value::from_json(value));
        }
    }
    attributes
}

/// Whether an SDK error string means the resource is gone
pub fn is_not_found(error: &str) -> bool {
    error.contains("ResourceNotFound") || error.contains("NotFound")
}
