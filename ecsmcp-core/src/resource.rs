//! Resource - Representing resources and their state

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::construct::ConstructPath;

/// Internal attribute holding the construct path (e.g., "Networking/NewVpc")
pub const PATH_ATTR: &str = "_path";
/// Internal attribute listing logical IDs this resource must wait for
pub const DEPENDS_ON_ATTR: &str = "_depends_on";
/// Internal attribute holding the deletion policy ("Delete" or "Retain")
pub const DELETION_POLICY_ATTR: &str = "_deletion_policy";
/// Internal attribute holding rule pack suppressions
pub const SUPPRESSIONS_ATTR: &str = "_suppressions";

/// Attribute name that resolves to the provider identifier of a resource
pub const REF_ATTR: &str = "ref";

/// Prefix of pseudo parameters (AWS::Region, AWS::AccountId, ...)
pub const PSEUDO_PREFIX: &str = "AWS::";

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    /// Resource type (e.g., "s3.bucket", "ecs.service")
    pub resource_type: String,
    /// Logical ID derived from the construct path
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Reference to another resource's attribute (logical_id, attribute_name)
    ///
    /// The attribute `ref` stands for the provider identifier.
    ResourceRef(String, String),
    /// String concatenation, known once every part is known
    Join(Vec<Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Reference to the provider identifier of a resource
    pub fn ref_of(logical_id: impl Into<String>) -> Self {
        Value::ResourceRef(logical_id.into(), REF_ATTR.to_string())
    }

    /// Reference to a read-back attribute of a resource
    pub fn attr_of(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::ResourceRef(logical_id.into(), attribute.into())
    }

    /// Reference to a pseudo parameter such as `AWS::Region`
    pub fn pseudo(name: &str) -> Self {
        Value::ResourceRef(format!("{}{}", PSEUDO_PREFIX, name), REF_ATTR.to_string())
    }

    /// Build a map value from key/value pairs
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a list of string values
    pub fn strings<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        Value::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Whether this value still contains references or joins
    pub fn is_resolved(&self) -> bool {
        match self {
            Value::ResourceRef(_, _) | Value::Join(_) => false,
            Value::List(items) => items.iter().all(Value::is_resolved),
            Value::Map(map) => map.values().all(Value::is_resolved),
            _ => true,
        }
    }

    /// Collect logical IDs referenced anywhere in this value
    pub fn collect_references(&self, out: &mut BTreeSet<String>) {
        match self {
            Value::ResourceRef(target, _) => {
                if !target.starts_with(PSEUDO_PREFIX) {
                    out.insert(target.clone());
                }
            }
            Value::List(items) | Value::Join(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Value::Map(map) => {
                for v in map.values() {
                    v.collect_references(out);
                }
            }
            _ => {}
        }
    }

    /// Convert to JSON for persistence
    ///
    /// References that are still unresolved are written as `${target.attr}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(n) => serde_json::Value::Number((*n).into()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::ResourceRef(target, attr) => {
                serde_json::Value::String(format!("${{{}.{}}}", target, attr))
            }
            Value::Join(parts) => {
                let joined: String = parts
                    .iter()
                    .map(|p| match p.to_json() {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect();
                serde_json::Value::String(joined)
            }
        }
    }

    /// Convert persisted JSON back into a value
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::String(n.to_string()),
            },
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
            serde_json::Value::Null => Value::String(String::new()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// What happens to the physical resource when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    /// Keep the physical resource, only forget it
    Retain,
}

impl DeletionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionPolicy::Delete => "Delete",
            DeletionPolicy::Retain => "Retain",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Delete" => Some(DeletionPolicy::Delete),
            "Retain" => Some(DeletionPolicy::Retain),
            _ => None,
        }
    }
}

/// A rule pack finding acknowledged on a specific resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suppression {
    pub rule_id: String,
    pub reason: String,
}

impl Suppression {
    pub fn new(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    fn to_value(&self) -> Value {
        Value::map([
            ("id", Value::string(&self.rule_id)),
            ("reason", Value::string(&self.reason)),
        ])
    }

    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_map()?;
        Some(Self::new(
            map.get("id")?.as_str()?,
            map.get("reason")?.as_str()?,
        ))
    }
}

/// Desired state produced by a construct
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Logical ID of this resource
    pub fn logical_id(&self) -> &str {
        &self.id.name
    }

    pub fn with_path(mut self, path: &ConstructPath) -> Self {
        self.attributes
            .insert(PATH_ATTR.to_string(), Value::String(path.to_string()));
        self
    }

    /// Construct path this resource was declared at
    pub fn path(&self) -> Option<ConstructPath> {
        self.get_str(PATH_ATTR).map(ConstructPath::parse)
    }

    /// Add an explicit ordering dependency
    pub fn add_dependency(&mut self, logical_id: impl Into<String>) {
        let logical_id = logical_id.into();
        let entry = self
            .attributes
            .entry(DEPENDS_ON_ATTR.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        if let Value::List(items) = entry
            && !items.iter().any(|v| v.as_str() == Some(logical_id.as_str()))
        {
            items.push(Value::String(logical_id));
        }
    }

    /// Explicit ordering dependencies
    pub fn depends_on(&self) -> Vec<String> {
        self.get(DEPENDS_ON_ATTR)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.attributes.insert(
            DELETION_POLICY_ATTR.to_string(),
            Value::String(policy.as_str().to_string()),
        );
        self
    }

    pub fn deletion_policy(&self) -> DeletionPolicy {
        self.get_str(DELETION_POLICY_ATTR)
            .and_then(DeletionPolicy::parse)
            .unwrap_or_default()
    }

    pub fn add_suppression(&mut self, suppression: Suppression) {
        let entry = self
            .attributes
            .entry(SUPPRESSIONS_ATTR.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        if let Value::List(items) = entry {
            items.push(suppression.to_value());
        }
    }

    pub fn suppressions(&self) -> Vec<Suppression> {
        self.get(SUPPRESSIONS_ATTR)
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(Suppression::from_value).collect())
            .unwrap_or_default()
    }

    pub fn is_suppressed(&self, rule_id: &str) -> bool {
        self.suppressions().iter().any(|s| s.rule_id == rule_id)
    }

    /// Attributes that are sent to the provider (internal `_` keys excluded)
    pub fn provider_attributes(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter().filter(|(k, _)| !k.starts_with('_'))
    }

    /// Logical IDs this resource depends on, through references or explicit ordering
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        for (_, value) in self.provider_attributes() {
            value.collect_references(&mut deps);
        }
        deps.extend(self.depends_on());
        deps.remove(self.logical_id());
        deps
    }
}

/// Current state recorded for, or read from, actual infrastructure
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Provider identifier (e.g., vpc-xxx, an ARN, a bucket name)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn deletion_policy(&self) -> DeletionPolicy {
        self.attributes
            .get(DELETION_POLICY_ATTR)
            .and_then(Value::as_str)
            .and_then(DeletionPolicy::parse)
            .unwrap_or_default()
    }

    /// Logical IDs recorded as dependencies when the resource was applied
    pub fn dependencies(&self) -> Vec<String> {
        self.attributes
            .get(DEPENDS_ON_ATTR)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn path(&self) -> Option<ConstructPath> {
        self.attributes
            .get(PATH_ATTR)
            .and_then(Value::as_str)
            .map(ConstructPath::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_include_refs_and_explicit_ordering() {
        let mut resource = Resource::new("ec2.subnet", "PublicSubnet")
            .with_attribute("vpc_id", Value::ref_of("Vpc"))
            .with_attribute(
                "tags",
                Value::List(vec![Value::map([("Value", Value::attr_of("Igw", "id"))])]),
            )
            .with_attribute("region", Value::pseudo("Region"));
        resource.add_dependency("Attachment");
        resource.add_dependency("Attachment");

        let deps: Vec<_> = resource.dependencies().into_iter().collect();
        assert_eq!(deps, vec!["Attachment", "Igw", "Vpc"]);
        assert_eq!(resource.depends_on(), vec!["Attachment".to_string()]);
    }

    #[test]
    fn provider_attributes_skip_internal_keys() {
        let resource = Resource::new("s3.bucket", "Logs")
            .with_path(&ConstructPath::parse("Storage/AccessLogs"))
            .with_deletion_policy(DeletionPolicy::Retain)
            .with_attribute("bucket_name", "logs");

        let keys: Vec<_> = resource.provider_attributes().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["bucket_name"]);
        assert_eq!(resource.deletion_policy(), DeletionPolicy::Retain);
        assert_eq!(resource.path().unwrap().to_string(), "Storage/AccessLogs");
    }

    #[test]
    fn suppressions_round_trip_through_attributes() {
        let mut resource = Resource::new("ec2.security_group", "AlbSg");
        resource.add_suppression(Suppression::new("AwsSolutions-EC23", "public entry point"));

        assert!(resource.is_suppressed("AwsSolutions-EC23"));
        assert!(!resource.is_suppressed("AwsSolutions-S1"));
        assert_eq!(resource.suppressions()[0].reason, "public entry point");
    }

    #[test]
    fn unresolved_values_render_as_placeholders() {
        let value = Value::Join(vec![
            Value::string("arn:"),
            Value::attr_of("Bucket", "arn"),
            Value::string("/*"),
        ]);
        assert!(!value.is_resolved());
        assert_eq!(value.to_json(), serde_json::json!("arn:${Bucket.arn}/*"));
    }

    #[test]
    fn json_conversion_keeps_structure() {
        let json = serde_json::json!({"Port": 8000, "Names": ["a", "b"], "Open": false});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }
}
