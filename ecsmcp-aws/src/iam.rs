//! IAM policy documents
//!
//! Builders producing the `Value` shape CloudFormation expects for
//! `PolicyDocument` and `AssumeRolePolicyDocument`.

use ecsmcp_core::resource::Value;

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementEffect {
    Allow,
    Deny,
}

impl StatementEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementEffect::Allow => "Allow",
            StatementEffect::Deny => "Deny",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub sid: Option<String>,
    pub effect: StatementEffect,
    pub principal: Option<Value>,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    pub condition: Option<Value>,
}

impl PolicyStatement {
    pub fn new(effect: StatementEffect) -> Self {
        Self {
            sid: None,
            effect,
            principal: None,
            actions: Vec::new(),
            resources: Vec::new(),
            condition: None,
        }
    }

    pub fn allow() -> Self {
        Self::new(StatementEffect::Allow)
    }

    pub fn deny() -> Self {
        Self::new(StatementEffect::Deny)
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_actions<S: Into<String>>(mut self, actions: impl IntoIterator<Item = S>) -> Self {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn with_resources(mut self, resources: impl IntoIterator<Item = Value>) -> Self {
        self.resources.extend(resources);
        self
    }

    /// Principal such as `{"Service": "ecs-tasks.amazonaws.com"}`
    pub fn with_principal(mut self, principal: Value) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut entries = vec![("Effect", Value::string(self.effect.as_str()))];
        if let Some(sid) = &self.sid {
            entries.push(("Sid", Value::string(sid)));
        }
        if let Some(principal) = &self.principal {
            entries.push(("Principal", principal.clone()));
        }
        if !self.actions.is_empty() {
            entries.push(("Action", one_or_many(self.actions.iter().map(Value::string).collect())));
        }
        if !self.resources.is_empty() {
            entries.push(("Resource", one_or_many(self.resources.clone())));
        }
        if let Some(condition) = &self.condition {
            entries.push(("Condition", condition.clone()));
        }
        Value::map(entries)
    }
}

/// A single element is written bare, several as a list
fn one_or_many(mut items: Vec<Value>) -> Value {
    if items.len() == 1 {
        items.remove(0)
    } else {
        Value::List(items)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyDocument {
    statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust policy letting an AWS service assume the role
    pub fn assume_role(service: &str) -> Self {
        Self::new().statement(
            PolicyStatement::allow()
                .with_actions(["sts:AssumeRole"])
                .with_principal(Value::map([("Service", Value::string(service))])),
        )
    }

    pub fn statement(mut self, statement: PolicyStatement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Shorthand for an Allow statement
    pub fn allow<S: Into<String>>(
        self,
        actions: impl IntoIterator<Item = S>,
        resources: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.statement(
            PolicyStatement::allow()
                .with_actions(actions)
                .with_resources(resources),
        )
    }

    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::map([
            ("Version", Value::string(POLICY_VERSION)),
            (
                "Statement",
                Value::List(self.statements.iter().map(PolicyStatement::to_value).collect()),
            ),
        ])
    }
}

/// Statements of a policy document value
pub fn statements_of(document: &Value) -> Vec<&Value> {
    document
        .as_map()
        .and_then(|d| d.get("Statement"))
        .map(|s| match s {
            Value::List(items) => items.iter().collect(),
            single => vec![single],
        })
        .unwrap_or_default()
}

/// Strings of a field that may be a single value or a list (`Action`, `Resource`)
pub fn field_strings<'a>(statement: &'a Value, field: &str) -> Vec<&'a Value> {
    match statement.as_map().and_then(|m| m.get(field)) {
        Some(Value::List(items)) => items.iter().collect(),
        Some(single) => vec![single],
        None => Vec::new(),
    }
}
