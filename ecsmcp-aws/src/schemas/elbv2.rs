//! Elastic Load Balancing v2 schema definitions

use std::collections::HashMap;

use ecsmcp_core::resource::Value;
use ecsmcp_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types as core_types};

use super::types;
use super::{AwsSchemaConfig, int_attr};

/// elbv2.load_balancer (AWS::ElasticLoadBalancingV2::LoadBalancer)
pub fn load_balancer_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::ElasticLoadBalancingV2::LoadBalancer",
        ResourceSchema::new("elbv2.load_balancer")
            .attribute(
                AttributeSchema::new(
                    "type",
                    AttributeType::Enum(&["application", "network"]),
                )
                .with_provider_name("Type"),
            )
            .attribute(
                AttributeSchema::new(
                    "scheme",
                    AttributeType::Enum(&["internet-facing", "internal"]),
                )
                .with_provider_name("Scheme"),
            )
            .attribute(
                AttributeSchema::new("subnets", types::strings())
                    .required()
                    .with_provider_name("Subnets"),
            )
            .attribute(
                AttributeSchema::new("security_groups", types::strings())
                    .with_provider_name("SecurityGroups"),
            )
            .attribute(
                AttributeSchema::new("load_balancer_attributes", types::objects())
                    .with_description("Key/Value pairs such as idle_timeout.timeout_seconds")
                    .with_provider_name("LoadBalancerAttributes"),
            )
            .attribute(
                AttributeSchema::new("dns_name", AttributeType::String)
                    .computed()
                    .with_provider_name("DNSName"),
            )
            .attribute(
                AttributeSchema::new("load_balancer_full_name", AttributeType::String)
                    .computed()
                    .with_provider_name("LoadBalancerFullName"),
            )
            .attribute(
                AttributeSchema::new("canonical_hosted_zone_id", AttributeType::String)
                    .computed()
                    .with_provider_name("CanonicalHostedZoneID"),
            ),
    )
}

/// elbv2.listener (AWS::ElasticLoadBalancingV2::Listener)
pub fn listener_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::ElasticLoadBalancingV2::Listener",
        ResourceSchema::new("elbv2.listener")
            .attribute(
                AttributeSchema::new("load_balancer_arn", AttributeType::String)
                    .required()
                    .with_provider_name("LoadBalancerArn"),
            )
            .attribute(
                AttributeSchema::new("port", core_types::port_number())
                    .required()
                    .with_provider_name("Port"),
            )
            .attribute(
                AttributeSchema::new("protocol", types::application_protocol())
                    .required()
                    .with_provider_name("Protocol"),
            )
            .attribute(
                AttributeSchema::new("default_actions", types::objects())
                    .required()
                    .with_provider_name("DefaultActions"),
            ),
    )
    .with_check(|attrs| non_empty_list(attrs, "default_actions"))
}

/// elbv2.listener_rule (AWS::ElasticLoadBalancingV2::ListenerRule)
pub fn listener_rule_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::ElasticLoadBalancingV2::ListenerRule",
        ResourceSchema::new("elbv2.listener_rule")
            .attribute(
                AttributeSchema::new("listener_arn", AttributeType::String)
                    .required()
                    .with_provider_name("ListenerArn"),
            )
            .attribute(
                AttributeSchema::new("priority", types::rule_priority())
                    .required()
                    .with_provider_name("Priority"),
            )
            .attribute(
                AttributeSchema::new("conditions", types::objects())
                    .required()
                    .with_description("path-pattern / http-header conditions")
                    .with_provider_name("Conditions"),
            )
            .attribute(
                AttributeSchema::new("actions", types::objects())
                    .required()
                    .with_provider_name("Actions"),
            ),
    )
    .with_check(|attrs| non_empty_list(attrs, "conditions"))
    .with_check(|attrs| non_empty_list(attrs, "actions"))
}

fn non_empty_list(attributes: &HashMap<String, Value>, key: &str) -> Result<(), String> {
    match attributes.get(key).and_then(Value::as_list) {
        Some(items) if !items.is_empty() => Ok(()),
        _ => Err(format!("'{}' must not be empty", key)),
    }
}

/// elbv2.target_group (AWS::ElasticLoadBalancingV2::TargetGroup)
pub fn target_group_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::ElasticLoadBalancingV2::TargetGroup",
        ResourceSchema::new("elbv2.target_group")
            .attribute(
                AttributeSchema::new("port", core_types::port_number())
                    .required()
                    .with_provider_name("Port"),
            )
            .attribute(
                AttributeSchema::new("protocol", types::application_protocol())
                    .required()
                    .with_provider_name("Protocol"),
            )
            .attribute(
                AttributeSchema::new(
                    "target_type",
                    AttributeType::Enum(&[
                        "ip",
                        "instance",
                        "lambda",
                    ]),
                )
                .required()
                .with_provider_name("TargetType"),
            )
            .attribute(
                AttributeSchema::new("vpc_id", AttributeType::String)
                    .required()
                    .with_provider_name("VpcId"),
            )
            .attribute(
                AttributeSchema::new("health_check_path", AttributeType::String)
                    .with_provider_name("HealthCheckPath"),
            )
            .attribute(
                AttributeSchema::new("health_check_interval_seconds", AttributeType::Int)
                    .with_provider_name("HealthCheckIntervalSeconds"),
            )
            .attribute(
                AttributeSchema::new("health_check_timeout_seconds", AttributeType::Int)
                    .with_provider_name("HealthCheckTimeoutSeconds"),
            )
            .attribute(
                AttributeSchema::new("matcher", AttributeType::Object)
                    .with_description("HttpCode matched as healthy")
                    .with_provider_name("Matcher"),
            )
            .attribute(
                AttributeSchema::new("target_group_attributes", types::objects())
                    .with_provider_name("TargetGroupAttributes"),
            )
            .attribute(
                AttributeSchema::new("target_group_full_name", AttributeType::String)
                    .computed()
                    .with_provider_name("TargetGroupFullName"),
            ),
    )
    .with_check(health_check_timing)
}

fn health_check_timing(attributes: &HashMap<String, Value>) -> Result<(), String> {
    // Service defaults: 30s interval, 5s timeout
    let interval = int_attr(attributes, "health_check_interval_seconds").unwrap_or(30);
    let timeout = int_attr(attributes, "health_check_timeout_seconds").unwrap_or(5);
    types::validate_health_check(interval, timeout)
}

pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![
        load_balancer_config(),
        listener_config(),
        listener_rule_config(),
        target_group_config(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecsmcp_core::resource::Resource;

    fn target_group(interval: i64, timeout: i64) -> Resource {
        Resource::new("elbv2.target_group", "Atg")
            .with_attribute("port", 8000i64)
            .with_attribute("protocol", "HTTP")
            .with_attribute("target_type", "ip")
            .with_attribute("vpc_id", Value::ref_of("Vpc"))
            .with_attribute("health_check_interval_seconds", interval)
            .with_attribute("health_check_timeout_seconds", timeout)
    }

    #[test]
    fn health_check_timeout_must_be_below_interval() {
        assert!(target_group_config().validate(&target_group(300, 30)).is_ok());
        assert!(target_group_config().validate(&target_group(20, 30)).is_err());
    }

    #[test]
    fn listener_rule_needs_conditions() {
        let rule = Resource::new("elbv2.listener_rule", "Rule")
            .with_attribute("listener_arn", Value::ref_of("Listener"))
            .with_attribute("priority", 1i64)
            .with_attribute("conditions", Value::List(vec![]))
            .with_attribute(
                "actions",
                Value::List(vec![Value::map([("Type", Value::string("forward"))])]),
            );
        let errors = listener_rule_config().validate(&rule).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn listener_protocol_is_checked() {
        let listener = Resource::new("elbv2.listener", "Listener")
            .with_attribute("load_balancer_arn", Value::ref_of("Lb"))
            .with_attribute("port", 80i64)
            .with_attribute("protocol", "FTP")
            .with_attribute(
                "default_actions",
                Value::List(vec![Value::map([("Type", Value::string("fixed-response"))])]),
            );
        assert!(listener_config().validate(&listener).is_err());
    }
}
