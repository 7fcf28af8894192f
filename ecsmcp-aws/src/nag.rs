//! Nag - AwsSolutions rule pack
//!
//! Every rule looks at one resource, with the whole resource set available
//! for rules that depend on a sibling (bucket policies, flow logs). A finding
//! is suppressed when the resource carries a suppression for the rule id.

use std::fmt;

use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::resource::{REF_ATTR, Resource, Value};

use crate::iam::{field_strings, statements_of};

/// Signature of a rule check; `Some(message)` is a finding
pub type RuleCheck = fn(&Resource, &[Resource]) -> Option<String>;

pub struct Rule {
    pub id: &'static str,
    pub description: &'static str,
    pub check: RuleCheck,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub rule_id: String,
    pub logical_id: String,
    pub path: Option<ConstructPath>,
    pub message: String,
    /// Reason recorded with the suppression, if suppressed
    pub suppressed: Option<String>,
}

impl Finding {
    pub fn is_suppressed(&self) -> bool {
        self.suppressed.is_some()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = self
            .path
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| self.logical_id.clone());
        write!(f, "[{}] {}: {}", self.rule_id, location, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NagReport {
    pub findings: Vec<Finding>,
}

impl NagReport {
    pub fn unsuppressed(&self) -> Vec<&Finding> {
        self.findings.iter().filter(|f| !f.is_suppressed()).collect()
    }

    pub fn suppressed(&self) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.is_suppressed()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.findings.iter().all(Finding::is_suppressed)
    }
}

pub fn rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "AwsSolutions-S1",
            description: "The S3 Bucket has server access logs disabled",
            check: bucket_without_access_logs,
        },
        Rule {
            id: "AwsSolutions-S10",
            description: "The S3 Bucket or bucket policy does not require requests to use SSL",
            check: bucket_without_ssl_enforcement,
        },
        Rule {
            id: "AwsSolutions-VPC7",
            description: "The VPC does not have an associated Flow Log",
            check: vpc_without_flow_log,
        },
        Rule {
            id: "AwsSolutions-EC23",
            description: "The Security Group allows for 0.0.0.0/0 or ::/0 inbound access",
            check: open_ingress,
        },
        Rule {
            id: "AwsSolutions-ELB2",
            description: "The ELB does not have access logs enabled",
            check: load_balancer_without_access_logs,
        },
        Rule {
            id: "AwsSolutions-ECS4",
            description: "The ECS Cluster has CloudWatch Container Insights disabled",
            check: cluster_without_container_insights,
        },
        Rule {
            id: "AwsSolutions-ECS2",
            description: "The ECS Task Definition includes a container definition that directly specifies environment variables",
            check: task_definition_with_environment,
        },
        Rule {
            id: "AwsSolutions-IAM5",
            description: "The IAM entity contains wildcard permissions",
            check: wildcard_permissions,
        },
        Rule {
            id: "AwsSolutions-SMG4",
            description: "The secret does not have automatic rotation scheduled",
            check: secret_without_rotation,
        },
    ]
}

/// Run every rule over every resource
pub fn check(resources: &[Resource]) -> NagReport {
    let rules = rules();
    let mut findings = Vec::new();
    for resource in resources {
        let suppressions = resource.suppressions();
        for rule in &rules {
            let Some(message) = (rule.check)(resource, resources) else {
                continue;
            };
            let suppressed = suppressions
                .iter()
                .find(|s| s.rule_id == rule.id)
                .map(|s| s.reason.clone());
            if suppressed.is_none() {
                log::debug!("{} flagged {}", rule.id, resource.id);
            }
            findings.push(Finding {
                rule_id: rule.id.to_string(),
                logical_id: resource.logical_id().to_string(),
                path: resource.path(),
                message,
                suppressed,
            });
        }
    }
    NagReport { findings }
}

fn is_ref_to(value: Option<&Value>, logical_id: &str) -> bool {
    matches!(value, Some(Value::ResourceRef(target, attr)) if target == logical_id && attr == REF_ATTR)
}

fn of_type<'a>(resources: &'a [Resource], resource_type: &'a str) -> impl Iterator<Item = &'a Resource> {
    resources
        .iter()
        .filter(move |r| r.id.resource_type == resource_type)
}

fn bucket_without_access_logs(resource: &Resource, _: &[Resource]) -> Option<String> {
    (resource.id.resource_type == "s3.bucket" && resource.get("logging_configuration").is_none())
        .then(|| "bucket has no server access logging configured".to_string())
}

fn bucket_without_ssl_enforcement(resource: &Resource, all: &[Resource]) -> Option<String> {
    if resource.id.resource_type != "s3.bucket" {
        return None;
    }
    let enforced = of_type(all, "s3.bucket_policy")
        .filter(|p| is_ref_to(p.get("bucket"), resource.logical_id()))
        .filter_map(|p| p.get("policy_document"))
        .any(denies_insecure_transport);
    (!enforced).then(|| "bucket policy does not deny requests without TLS".to_string())
}

fn denies_insecure_transport(document: &Value) -> bool {
    statements_of(document).into_iter().any(|statement| {
        let Some(map) = statement.as_map() else {
            return false;
        };
        let deny = map.get("Effect").and_then(Value::as_str) == Some("Deny");
        let secure_transport = map
            .get("Condition")
            .and_then(Value::as_map)
            .and_then(|c| c.get("Bool"))
            .and_then(Value::as_map)
            .and_then(|b| b.get("aws:SecureTransport"))
            .and_then(Value::as_str);
        deny && secure_transport == Some("false")
    })
}

fn vpc_without_flow_log(resource: &Resource, all: &[Resource]) -> Option<String> {
    if resource.id.resource_type != "ec2.vpc" {
        return None;
    }
    let has_flow_log =
        of_type(all, "ec2.flow_log").any(|f| is_ref_to(f.get("resource_id"), resource.logical_id()));
    (!has_flow_log).then(|| "VPC has no flow log".to_string())
}

fn is_world(cidr: Option<&Value>) -> bool {
    matches!(cidr.and_then(Value::as_str), Some("0.0.0.0/0") | Some("::/0"))
}

fn open_ingress(resource: &Resource, _: &[Resource]) -> Option<String> {
    match resource.id.resource_type.as_str() {
        "ec2.security_group" => {
            let rules = resource.get("security_group_ingress").and_then(Value::as_list)?;
            let open = rules.iter().filter_map(Value::as_map).find(|rule| {
                is_world(rule.get("CidrIp")) || is_world(rule.get("CidrIpv6"))
            })?;
            let port = open.get("FromPort").and_then(Value::as_int).unwrap_or(-1);
            Some(format!("inline ingress on port {} is open to the world", port))
        }
        "ec2.security_group_ingress" => is_world(resource.get("cidr_ip"))
            .then(|| "ingress rule is open to the world".to_string()),
        _ => None,
    }
}

fn load_balancer_without_access_logs(resource: &Resource, _: &[Resource]) -> Option<String> {
    if resource.id.resource_type != "elbv2.load_balancer" {
        return None;
    }
    let enabled = resource
        .get("load_balancer_attributes")
        .and_then(Value::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_map)
        .any(|attr| {
            attr.get("Key").and_then(Value::as_str) == Some("access_logs.s3.enabled")
                && attr.get("Value").and_then(Value::as_str) == Some("true")
        });
    (!enabled).then(|| "load balancer access logs are not enabled".to_string())
}

fn cluster_without_container_insights(resource: &Resource, _: &[Resource]) -> Option<String> {
    if resource.id.resource_type != "ecs.cluster" {
        return None;
    }
    let enabled = resource
        .get("cluster_settings")
        .and_then(Value::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_map)
        .any(|setting| {
            setting.get("Name").and_then(Value::as_str) == Some("containerInsights")
                && matches!(
                    setting.get("Value").and_then(Value::as_str),
                    Some("enabled") | Some("enhanced")
                )
        });
    (!enabled).then(|| "container insights are disabled".to_string())
}

fn task_definition_with_environment(resource: &Resource, _: &[Resource]) -> Option<String> {
    if resource.id.resource_type != "ecs.task_definition" {
        return None;
    }
    let container = resource
        .get("container_definitions")
        .and_then(Value::as_list)?
        .iter()
        .filter_map(Value::as_map)
        .find(|c| {
            c.get("Environment")
                .and_then(Value::as_list)
                .is_some_and(|env| !env.is_empty())
        })?;
    let name = container.get("Name").and_then(Value::as_str).unwrap_or("?");
    Some(format!("container '{}' sets environment variables directly", name))
}

fn wildcard_permissions(resource: &Resource, _: &[Resource]) -> Option<String> {
    let documents: Vec<&Value> = match resource.id.resource_type.as_str() {
        "iam.policy" => resource.get("policy_document").into_iter().collect(),
        "iam.role" => resource
            .get("policies")
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_map)
            .filter_map(|p| p.get("PolicyDocument"))
            .collect(),
        _ => return None,
    };

    for document in documents {
        for statement in statements_of(document) {
            if let Some(action) = field_strings(statement, "Action")
                .into_iter()
                .find(|a| has_wildcard(a))
            {
                return Some(format!("wildcard action {}", action.to_json()));
            }
            if let Some(target) = field_strings(statement, "Resource")
                .into_iter()
                .find(|r| has_wildcard(r))
            {
                return Some(format!("wildcard resource {}", target.to_json()));
            }
        }
    }
    None
}

fn has_wildcard(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains('*'),
        Value::Join(parts) => parts.iter().any(has_wildcard),
        _ => false,
    }
}

fn secret_without_rotation(resource: &Resource, _: &[Resource]) -> Option<String> {
    (resource.id.resource_type == "secretsmanager.secret")
        .then(|| "secret has no rotation schedule".to_string())
}
