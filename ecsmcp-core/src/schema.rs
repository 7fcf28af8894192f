//! Attribute schemas
//!
//! Constructs are checked against the schema of every resource type before
//! planning, so a mistyped attribute or an out-of-range port fails at synth
//! time rather than halfway through an apply.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use crate::resource::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    String,
    Int,
}

#[derive(Debug, Clone)]
pub enum AttributeType {
    String,
    Int,
    Bool,
    Enum(&'static [&'static str]),
    /// A scalar with an extra check, e.g. a CIDR block or a Fargate size
    Custom {
        name: &'static str,
        base: Scalar,
        check: fn(&Value) -> Result<(), String>,
    },
    List(Box<AttributeType>),
    /// CloudFormation property bag passed through as is
    Object,
}

/// Unresolved until apply; only string-typed attributes can hold one
fn is_deferred(value: &Value) -> bool {
    matches!(value, Value::ResourceRef(..) | Value::Join(_))
}

impl AttributeType {
    pub fn list_of(inner: AttributeType) -> Self {
        AttributeType::List(Box::new(inner))
    }

    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::String, v) if is_deferred(v) => Ok(()),
            (AttributeType::Int, Value::Int(_))
            | (AttributeType::Bool, Value::Bool(_))
            | (AttributeType::Object, Value::Map(_)) => Ok(()),
            (AttributeType::Enum(allowed), Value::String(s)) => {
                if allowed.contains(&s.as_str()) {
                    Ok(())
                } else {
                    Err(TypeError::new(Problem::NotAllowed {
                        value: s.clone(),
                        allowed: *allowed,
                    }))
                }
            }
            (AttributeType::Custom { base: Scalar::String, .. }, v) if is_deferred(v) => Ok(()),
            (AttributeType::Custom { name, base, check }, v) => {
                let base_ok = matches!(
                    (base, v),
                    (Scalar::String, Value::String(_)) | (Scalar::Int, Value::Int(_))
                );
                if !base_ok {
                    return Err(self.mismatch(v));
                }
                check(v).map_err(|reason| TypeError::new(Problem::Rejected { type_name: *name, reason }))
            }
            (AttributeType::List(inner), Value::List(items)) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| inner.validate(item).map_err(|e| e.within(format!("[{}]", i)))),
            (_, v) => Err(self.mismatch(v)),
        }
    }

    fn mismatch(&self, got: &Value) -> TypeError {
        TypeError::new(Problem::Mismatch {
            expected: self.to_string(),
            got: got.kind_name(),
        })
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::String => f.write_str("string"),
            AttributeType::Int => f.write_str("integer"),
            AttributeType::Bool => f.write_str("boolean"),
            AttributeType::Enum(allowed) => write!(f, "one of {}", allowed.join("|")),
            AttributeType::Custom { name, .. } => f.write_str(name),
            AttributeType::List(inner) => write!(f, "list of {}", inner),
            AttributeType::Object => f.write_str("object"),
        }
    }
}

impl Value {
    fn kind_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "integer",
            Value::Bool(_) => "boolean",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::ResourceRef(..) => "reference",
            Value::Join(_) => "join",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    Mismatch { expected: String, got: &'static str },
    NotAllowed { value: String, allowed: &'static [&'static str] },
    Rejected { type_name: &'static str, reason: String },
    Missing,
    Unknown,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Mismatch { expected, got } => write!(f, "expected {}, got {}", expected, got),
            Problem::NotAllowed { value, allowed } => {
                write!(f, "'{}' is not one of {}", value, allowed.join(", "))
            }
            Problem::Rejected { type_name, reason } => write!(f, "invalid {}: {}", type_name, reason),
            Problem::Missing => f.write_str("required attribute is missing"),
            Problem::Unknown => f.write_str("unknown attribute"),
        }
    }
}

/// A [`Problem`] and where in the attribute tree it sits, e.g. `subnets[1]`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{}", display_path(.path), .problem)]
pub struct TypeError {
    pub path: String,
    pub problem: Problem,
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{}: ", path)
    }
}

impl TypeError {
    pub fn new(problem: Problem) -> Self {
        Self {
            path: String::new(),
            problem,
        }
    }

    fn within(mut self, segment: impl Into<String>) -> Self {
        self.path.insert_str(0, &segment.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Reported by the provider after create; never set by a construct
    pub computed: bool,
    pub description: Option<String>,
    /// CloudFormation property name when it is not the PascalCase of `name`
    pub provider_name: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            description: None,
            provider_name: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn computed_attributes(&self) -> impl Iterator<Item = &AttributeSchema> {
        self.attributes.values().filter(|a| a.computed)
    }

    /// All problems at once, sorted by attribute; `_`-prefixed bookkeeping
    /// attributes are ignored
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let missing = self
            .attributes
            .values()
            .filter(|a| a.required && !attributes.contains_key(&a.name))
            .map(|a| TypeError::new(Problem::Missing).within(a.name.clone()));

        let invalid = attributes
            .iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .filter_map(|(name, value)| match self.attributes.get(name) {
                Some(schema) => schema.attr_type.validate(value).err(),
                None => Some(TypeError::new(Problem::Unknown)),
            }
            .map(|e| e.within(name.clone())));

        let mut errors: Vec<TypeError> = missing.chain(invalid).collect();
        if errors.is_empty() {
            return Ok(());
        }
        errors.sort_by(|a, b| a.path.cmp(&b.path));
        Err(errors)
    }
}

pub mod types {
    use super::*;

    /// IPv4 block in CIDR notation with a zero host part
    pub fn cidr() -> AttributeType {
        AttributeType::Custom {
            name: "CIDR block",
            base: Scalar::String,
            check: |value| match value {
                Value::String(s) => validate_cidr(s),
                _ => Ok(()),
            },
        }
    }

    /// -1 means every port in security group rules
    pub fn port_number() -> AttributeType {
        AttributeType::Custom {
            name: "port",
            base: Scalar::Int,
            check: |value| match value {
                Value::Int(n) if *n == -1 || (0..=65535).contains(n) => Ok(()),
                Value::Int(n) => Err(format!("{} is outside 0-65535", n)),
                _ => Ok(()),
            },
        }
    }
}

pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let Some((address, prefix)) = cidr.split_once('/') else {
        return Err(format!("'{}' has no /prefix", cidr));
    };
    let address: Ipv4Addr = address
        .parse()
        .map_err(|_| format!("'{}' is not an IPv4 address", address))?;
    let prefix: u8 = match prefix.parse() {
        Ok(p) if p <= 32 => p,
        _ => return Err(format!("prefix '/{}' must be 0-32", prefix)),
    };
    let host_bits = u32::MAX.checked_shr(u32::from(prefix)).unwrap_or(0);
    if u32::from(address) & host_bits != 0 {
        return Err(format!("'{}' has host bits set beyond /{}", cidr, prefix));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn strings_accept_deferred_values() {
        assert!(AttributeType::String.validate(&Value::ref_of("Vpc")).is_ok());
        assert!(types::cidr().validate(&Value::attr_of("Vpc", "cidr_block")).is_ok());
        let err = AttributeType::Int.validate(&Value::ref_of("Vpc")).unwrap_err();
        assert_eq!(err.to_string(), "expected integer, got reference");
    }

    #[test]
    fn enums_list_their_variants() {
        let scheme = AttributeType::Enum(&["internet-facing", "internal"]);
        assert!(scheme.validate(&Value::string("internal")).is_ok());
        let err = scheme.validate(&Value::string("public")).unwrap_err();
        assert_eq!(err.to_string(), "'public' is not one of internet-facing, internal");
    }

    #[test]
    fn list_errors_carry_the_index() {
        let subnets = AttributeType::list_of(types::cidr());
        let err = subnets
            .validate(&Value::List(vec![Value::string("10.0.0.0/24"), Value::string("10.0.1.1/24")]))
            .unwrap_err();
        assert_eq!(err.path, "[1]");
        assert!(matches!(err.problem, Problem::Rejected { type_name: "CIDR block", .. }));
    }

    #[test]
    fn ports() {
        let port = types::port_number();
        assert!(port.validate(&Value::Int(8000)).is_ok());
        assert!(port.validate(&Value::Int(-1)).is_ok());
        assert!(port.validate(&Value::Int(65536)).is_err());
        assert!(port.validate(&Value::string("80")).is_err());
    }

    #[test]
    fn resource_validation_reports_everything_sorted() {
        let schema = ResourceSchema::new("elbv2.target_group")
            .attribute(AttributeSchema::new("port", types::port_number()).required())
            .attribute(AttributeSchema::new("protocol", AttributeType::Enum(&["HTTP", "HTTPS"])).required())
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed());

        let ok = attrs(&[
            ("port", Value::Int(8000)),
            ("protocol", Value::string("HTTP")),
            ("_path", Value::string("AI/TargetGroup")),
        ]);
        assert!(schema.validate(&ok).is_ok());

        let bad = attrs(&[("protocl", Value::string("HTTP")), ("port", Value::Int(70000))]);
        let errors = schema.validate(&bad).unwrap_err();
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["port", "protocl", "protocol"]);
        assert_eq!(errors[1].problem, Problem::Unknown);
        assert_eq!(errors[2].to_string(), "protocol: required attribute is missing");
        assert_eq!(schema.computed_attributes().count(), 1);
    }

    #[test]
    fn cidr_blocks() {
        for good in ["10.0.0.0/16", "192.168.0.0/16", "0.0.0.0/0", "255.255.255.255/32"] {
            assert!(validate_cidr(good).is_ok(), "{}", good);
        }
        for bad in ["10.0.0.0", "10.0.0.0/33", "10.0.0.256/16", "10.0.0/16", "10.0.1.0/16"] {
            assert!(validate_cidr(bad).is_err(), "{}", bad);
        }
    }
}
