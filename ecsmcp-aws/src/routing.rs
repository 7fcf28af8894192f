//! Routing - Evaluate listener rules against a request
//!
//! The listener model is read from the `elbv2.listener` and
//! `elbv2.listener_rule` descriptors. Secret-backed header values are kept as
//! dynamic references and looked up in a [`SecretStore`] at evaluation time.

use std::collections::HashMap;

use ecsmcp_core::resource::{REF_ATTR, Resource, Value};
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("No listener on port {0}")]
    NoListener(i64),

    #[error("Listener '{listener}' has an unsupported action: {reason}")]
    UnsupportedAction { listener: String, reason: String },

    #[error("Rule '{rule}' has an unsupported condition: {reason}")]
    UnsupportedCondition { rule: String, reason: String },

    #[error("Secret '{0}' not found")]
    UnknownSecret(String),
}

/// Source of secret values for dynamic references
pub trait SecretStore {
    fn secret_string(&self, secret_id: &str) -> Option<String>;
}

impl SecretStore for HashMap<String, String> {
    fn secret_string(&self, secret_id: &str) -> Option<String> {
        self.get(secret_id).cloned()
    }
}

/// Store that answers every lookup with the same value
pub struct FixedSecret(pub String);

impl SecretStore for FixedSecret {
    fn secret_string(&self, _secret_id: &str) -> Option<String> {
        Some(self.0.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Request {
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Header values, names compared case-insensitively
    fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FixedResponse {
        status_code: u16,
        content_type: Option<String>,
        body: Option<String>,
    },
    Forward {
        /// Logical ID of the target group
        target_group: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Literal(String),
    /// `{{resolve:secretsmanager:<id>:SecretString:::}}`
    Secret(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    PathPattern(Vec<String>),
    HttpHeader { name: String, values: Vec<HeaderValue> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    pub logical_id: String,
    pub priority: i64,
    pub conditions: Vec<Condition>,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerModel {
    pub logical_id: String,
    pub port: i64,
    pub default_action: Action,
    /// Sorted by ascending priority
    pub rules: Vec<RoutingRule>,
}

impl ListenerModel {
    /// Build the model of the listener on `port`
    pub fn from_resources(resources: &[Resource], port: i64) -> Result<Self, RoutingError> {
        let listener = resources
            .iter()
            .filter(|r| r.id.resource_type == "elbv2.listener")
            .find(|r| r.get("port").and_then(Value::as_int) == Some(port))
            .ok_or(RoutingError::NoListener(port))?;
        let listener_id = listener.logical_id();

        let default_action = first_action(listener_id, listener.get("default_actions"))?;

        let mut rules = Vec::new();
        for rule in resources
            .iter()
            .filter(|r| r.id.resource_type == "elbv2.listener_rule")
            .filter(|r| matches!(r.get("listener_arn"), Some(Value::ResourceRef(target, _)) if target == listener_id))
        {
            let conditions = rule
                .get("conditions")
                .and_then(Value::as_list)
                .unwrap_or_default()
                .iter()
                .map(|c| parse_condition(rule.logical_id(), c))
                .collect::<Result<Vec<_>, _>>()?;
            rules.push(RoutingRule {
                logical_id: rule.logical_id().to_string(),
                priority: rule.get("priority").and_then(Value::as_int).unwrap_or(i64::MAX),
                conditions,
                action: first_action(rule.logical_id(), rule.get("actions"))?,
            });
        }
        rules.sort_by_key(|r| r.priority);

        Ok(Self {
            logical_id: listener_id.to_string(),
            port,
            default_action,
            rules,
        })
    }

    /// Action taken for `request`: the first matching rule, else the default
    pub fn evaluate(&self, request: &Request, secrets: &dyn SecretStore) -> Result<&Action, RoutingError> {
        for rule in &self.rules {
            let mut matched = true;
            for condition in &rule.conditions {
                if !condition_matches(condition, request, secrets)? {
                    matched = false;
                    break;
                }
            }
            if matched {
                log::debug!("request {} matched rule {}", request.path, rule.logical_id);
                return Ok(&rule.action);
            }
        }
        Ok(&self.default_action)
    }
}

fn first_action(owner: &str, actions: Option<&Value>) -> Result<Action, RoutingError> {
    let unsupported = |reason: &str| RoutingError::UnsupportedAction {
        listener: owner.to_string(),
        reason: reason.to_string(),
    };
    let action = actions
        .and_then(Value::as_list)
        .and_then(|a| a.first())
        .and_then(Value::as_map)
        .ok_or_else(|| unsupported("no actions"))?;

    match action.get("Type").and_then(Value::as_str) {
        Some("fixed-response") => {
            let config = action
                .get("FixedResponseConfig")
                .and_then(Value::as_map)
                .ok_or_else(|| unsupported("missing FixedResponseConfig"))?;
            let status_code = config
                .get("StatusCode")
                .and_then(|v| match v {
                    Value::String(s) => s.parse().ok(),
                    Value::Int(n) => u16::try_from(*n).ok(),
                    _ => None,
                })
                .ok_or_else(|| unsupported("invalid StatusCode"))?;
            Ok(Action::FixedResponse {
                status_code,
                content_type: config.get("ContentType").and_then(Value::as_str).map(str::to_string),
                body: config.get("MessageBody").and_then(Value::as_str).map(str::to_string),
            })
        }
        Some("forward") => match action.get("TargetGroupArn") {
            Some(Value::ResourceRef(target, _)) => Ok(Action::Forward {
                target_group: target.clone(),
            }),
            Some(Value::String(arn)) => Ok(Action::Forward {
                target_group: arn.clone(),
            }),
            _ => Err(unsupported("forward without TargetGroupArn")),
        },
        Some(other) => Err(unsupported(other)),
        None => Err(unsupported("missing Type")),
    }
}

fn parse_condition(rule: &str, condition: &Value) -> Result<Condition, RoutingError> {
    let unsupported = |reason: String| RoutingError::UnsupportedCondition {
        rule: rule.to_string(),
        reason,
    };
    let map = condition
        .as_map()
        .ok_or_else(|| unsupported("condition is not a map".to_string()))?;

    match map.get("Field").and_then(Value::as_str) {
        Some("path-pattern") => {
            let values = map
                .get("PathPatternConfig")
                .and_then(Value::as_map)
                .and_then(|c| c.get("Values"))
                .and_then(Value::as_list)
                .unwrap_or_default()
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            Ok(Condition::PathPattern(values))
        }
        Some("http-header") => {
            let config = map
                .get("HttpHeaderConfig")
                .and_then(Value::as_map)
                .ok_or_else(|| unsupported("missing HttpHeaderConfig".to_string()))?;
            let name = config
                .get("HttpHeaderName")
                .and_then(Value::as_str)
                .ok_or_else(|| unsupported("missing HttpHeaderName".to_string()))?;
            let values = config
                .get("Values")
                .and_then(Value::as_list)
                .unwrap_or_default()
                .iter()
                .map(|v| header_value(v).ok_or_else(|| unsupported(format!("unrenderable value {}", v.to_json()))))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Condition::HttpHeader {
                name: name.to_string(),
                values,
            })
        }
        Some(other) => Err(unsupported(format!("field '{}'", other))),
        None => Err(unsupported("missing Field".to_string())),
    }
}

/// A header value, recognizing secret dynamic references
pub fn header_value(value: &Value) -> Option<HeaderValue> {
    let text = render(value)?;
    Some(match parse_secret_reference(&text) {
        Some(secret_id) => HeaderValue::Secret(secret_id),
        None => HeaderValue::Literal(text),
    })
}

/// Secret id of a `{{resolve:secretsmanager:...}}` reference
pub fn parse_secret_reference(text: &str) -> Option<String> {
    let re = Regex::new(r"^\{\{resolve:secretsmanager:(.+?):SecretString:[^:}]*:[^:}]*:[^:}]*\}\}$").ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Flatten to text; an unresolved `ref` stands for the logical ID
fn render(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::ResourceRef(target, attr) if attr == REF_ATTR => Some(target.clone()),
        Value::Join(parts) => parts.iter().map(render).collect(),
        _ => None,
    }
}

fn condition_matches(
    condition: &Condition,
    request: &Request,
    secrets: &dyn SecretStore,
) -> Result<bool, RoutingError> {
    match condition {
        Condition::PathPattern(patterns) => {
            Ok(patterns.iter().any(|p| wildcard_match(p, &request.path)))
        }
        Condition::HttpHeader { name, values } => {
            let mut expected = Vec::with_capacity(values.len());
            for value in values {
                expected.push(match value {
                    HeaderValue::Literal(s) => s.clone(),
                    HeaderValue::Secret(id) => secrets
                        .secret_string(id)
                        .ok_or_else(|| RoutingError::UnknownSecret(id.clone()))?,
                });
            }
            Ok(request
                .header_values(name)
                .any(|actual| expected.iter().any(|e| e == actual)))
        }
    }
}

/// Match with `*` (any run) and `?` (one character)
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
