//! Resolve - Substitute references with values known from applied resources
//!
//! Bindings hold, per logical ID, the attributes reported by the provider plus
//! `ref` (the provider identifier). Pseudo parameters such as `AWS::Region` are
//! stored the same way.

use std::collections::HashMap;

use crate::resource::{PSEUDO_PREFIX, REF_ATTR, Resource, State, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Reference to '{target}' cannot be resolved: resource has not been applied")]
    UnknownResource { target: String },

    #[error("Reference to '{target}.{attribute}' cannot be resolved: attribute not reported")]
    UnknownAttribute { target: String, attribute: String },

    #[error("Cannot join non-scalar value into a string")]
    NotAString,
}

/// Known attribute values by logical ID
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, HashMap<String, Value>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pseudo parameter (e.g., `Region`)
    pub fn with_pseudo(mut self, name: &str, value: impl Into<String>) -> Self {
        let mut attrs = HashMap::new();
        attrs.insert(REF_ATTR.to_string(), Value::String(value.into()));
        self.values.insert(format!("{}{}", PSEUDO_PREFIX, name), attrs);
        self
    }

    /// Seed bindings from recorded states
    pub fn from_states<'a>(states: impl IntoIterator<Item = &'a State>) -> Self {
        let mut bindings = Self::new();
        for state in states {
            bindings.insert_state(state);
        }
        bindings
    }

    /// Record the attributes of an applied resource
    pub fn insert_state(&mut self, state: &State) {
        if !state.exists {
            return;
        }
        let mut attrs: HashMap<String, Value> = state
            .attributes
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(identifier) = &state.identifier {
            attrs.insert(REF_ATTR.to_string(), Value::String(identifier.clone()));
        }
        self.values.insert(state.id.name.clone(), attrs);
    }

    /// Forget a resource, e.g. after deletion
    pub fn remove(&mut self, logical_id: &str) {
        self.values.remove(logical_id);
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.values.contains_key(logical_id)
    }

    pub fn get(&self, target: &str, attribute: &str) -> Option<&Value> {
        self.values.get(target).and_then(|attrs| attrs.get(attribute))
    }

    /// Resolve every reference in a value
    pub fn resolve_value(&self, value: &Value) -> Result<Value, ResolveError> {
        match value {
            Value::ResourceRef(target, attribute) => {
                let attrs = self
                    .values
                    .get(target)
                    .ok_or_else(|| ResolveError::UnknownResource {
                        target: target.clone(),
                    })?;
                let resolved = attrs
                    .get(attribute)
                    .ok_or_else(|| ResolveError::UnknownAttribute {
                        target: target.clone(),
                        attribute: attribute.clone(),
                    })?;
                // Reported values may themselves hold references
                self.resolve_value(resolved)
            }
            Value::Join(parts) => {
                let mut joined = String::new();
                for part in parts {
                    match self.resolve_value(part)? {
                        Value::String(s) => joined.push_str(&s),
                        Value::Int(n) => joined.push_str(&n.to_string()),
                        Value::Bool(b) => joined.push_str(&b.to_string()),
                        _ => return Err(ResolveError::NotAString),
                    }
                }
                Ok(Value::String(joined))
            }
            Value::List(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|v| self.resolve_value(v))
                    .collect::<Result<_, _>>()?,
            )),
            Value::Map(map) => Ok(Value::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve_value(v)?)))
                    .collect::<Result<_, ResolveError>>()?,
            )),
            other => Ok(other.clone()),
        }
    }

    /// Resolve what is known and leave the rest in place
    pub fn resolve_partially(&self, value: &Value) -> Value {
        match value {
            Value::ResourceRef(_, _) | Value::Join(_) => {
                self.resolve_value(value).unwrap_or_else(|_| match value {
                    Value::Join(parts) => {
                        Value::Join(parts.iter().map(|p| self.resolve_partially(p)).collect())
                    }
                    other => other.clone(),
                })
            }
            Value::List(items) => {
                Value::List(items.iter().map(|v| self.resolve_partially(v)).collect())
            }
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_partially(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Resolve the provider attributes of a resource; internal attributes are kept as-is
    pub fn resolve_resource(&self, resource: &Resource) -> Result<Resource, ResolveError> {
        let mut resolved = resource.clone();
        for (key, value) in resolved.attributes.iter_mut() {
            if key.starts_with('_') {
                continue;
            }
            *value = self.resolve_value(value)?;
        }
        Ok(resolved)
    }

    pub fn resolve_resource_partially(&self, resource: &Resource) -> Resource {
        let mut resolved = resource.clone();
        for (key, value) in resolved.attributes.iter_mut() {
            if !key.starts_with('_') {
                *value = self.resolve_partially(value);
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceId;

    fn applied_vpc() -> State {
        let mut attrs = HashMap::new();
        attrs.insert("cidr_block".to_string(), Value::string("192.168.0.0/16"));
        attrs.insert("_path".to_string(), Value::string("Networking/Vpc"));
        State::existing(ResourceId::new("ec2.vpc", "Vpc"), attrs).with_identifier("vpc-0abc")
    }

    #[test]
    fn resolves_ref_and_attributes() {
        let bindings = Bindings::from_states([&applied_vpc()]);
        assert_eq!(
            bindings.resolve_value(&Value::ref_of("Vpc")).unwrap(),
            Value::string("vpc-0abc")
        );
        assert_eq!(
            bindings
                .resolve_value(&Value::attr_of("Vpc", "cidr_block"))
                .unwrap(),
            Value::string("192.168.0.0/16")
        );
        assert!(bindings.get("Vpc", "_path").is_none());
    }

    #[test]
    fn joins_concatenate_resolved_parts() {
        let bindings = Bindings::new()
            .with_pseudo("Region", "ap-northeast-1")
            .with_pseudo("AccountId", "123456789012");
        let value = Value::Join(vec![
            Value::string("arn:aws:logs:"),
            Value::pseudo("Region"),
            Value::string(":"),
            Value::pseudo("AccountId"),
            Value::string(":log-group:app"),
        ]);
        assert_eq!(
            bindings.resolve_value(&value).unwrap(),
            Value::string("arn:aws:logs:ap-northeast-1:123456789012:log-group:app")
        );
    }

    #[test]
    fn unknown_references_fail_or_stay_in_place() {
        let bindings = Bindings::new();
        let value = Value::map([("VpcId", Value::ref_of("Vpc"))]);
        assert_eq!(
            bindings.resolve_value(&value).unwrap_err(),
            ResolveError::UnknownResource {
                target: "Vpc".to_string()
            }
        );
        assert_eq!(bindings.resolve_partially(&value), value);
    }

    #[test]
    fn missing_attribute_is_reported() {
        let bindings = Bindings::from_states([&applied_vpc()]);
        assert!(matches!(
            bindings.resolve_value(&Value::attr_of("Vpc", "arn")),
            Err(ResolveError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn resolve_resource_keeps_internal_attributes() {
        let bindings = Bindings::from_states([&applied_vpc()]);
        let subnet = Resource::new("ec2.subnet", "Subnet")
            .with_attribute("vpc_id", Value::ref_of("Vpc"))
            .with_attribute("_path", "Networking/Subnet");
        let resolved = bindings.resolve_resource(&subnet).unwrap();
        assert_eq!(resolved.get_str("vpc_id"), Some("vpc-0abc"));
        assert_eq!(resolved.get_str("_path"), Some("Networking/Subnet"));
    }
}
