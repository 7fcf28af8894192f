//! Application Auto Scaling schema definitions

use std::collections::HashMap;

use ecsmcp_core::resource::Value;
use ecsmcp_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::types;
use super::{AwsSchemaConfig, int_attr};

/// applicationautoscaling.scalable_target (AWS::ApplicationAutoScaling::ScalableTarget)
pub fn scalable_target_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::ApplicationAutoScaling::ScalableTarget",
        ResourceSchema::new("applicationautoscaling.scalable_target")
            .attribute(
                AttributeSchema::new(
                    "service_namespace",
                    AttributeType::Enum(&["ecs"]),
                )
                .required()
                .with_provider_name("ServiceNamespace"),
            )
            .attribute(
                AttributeSchema::new("resource_id", AttributeType::String)
                    .required()
                    .with_description("service/<cluster>/<service>")
                    .with_provider_name("ResourceId"),
            )
            .attribute(
                AttributeSchema::new(
                    "scalable_dimension",
                    AttributeType::Enum(&["ecs:service:DesiredCount"]),
                )
                .required()
                .with_provider_name("ScalableDimension"),
            )
            .attribute(
                AttributeSchema::new("min_capacity", types::capacity())
                    .required()
                    .with_provider_name("MinCapacity"),
            )
            .attribute(
                AttributeSchema::new("max_capacity", types::capacity())
                    .required()
                    .with_provider_name("MaxCapacity"),
            )
            .attribute(
                AttributeSchema::new("role_arn", AttributeType::String)
                    .with_provider_name("RoleARN"),
            ),
    )
    .with_check(capacity_bounds)
}

fn capacity_bounds(attributes: &HashMap<String, Value>) -> Result<(), String> {
    match (
        int_attr(attributes, "min_capacity"),
        int_attr(attributes, "max_capacity"),
    ) {
        (Some(min), Some(max)) if min > max => Err(format!(
            "min_capacity {} must not exceed max_capacity {}",
            min, max
        )),
        _ => Ok(()),
    }
}

/// applicationautoscaling.scaling_policy (AWS::ApplicationAutoScaling::ScalingPolicy)
pub fn scaling_policy_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::ApplicationAutoScaling::ScalingPolicy",
        ResourceSchema::new("applicationautoscaling.scaling_policy")
            .attribute(
                AttributeSchema::new("policy_name", AttributeType::String)
                    .required()
                    .with_provider_name("PolicyName"),
            )
            .attribute(
                AttributeSchema::new(
                    "policy_type",
                    AttributeType::Enum(&[
                        "TargetTrackingScaling",
                        "StepScaling",
                    ]),
                )
                .required()
                .with_provider_name("PolicyType"),
            )
            .attribute(
                AttributeSchema::new("scaling_target_id", AttributeType::String)
                    .required()
                    .with_provider_name("ScalingTargetId"),
            )
            .attribute(
                AttributeSchema::new(
                    "target_tracking_scaling_policy_configuration",
                    AttributeType::Object,
                )
                .with_provider_name("TargetTrackingScalingPolicyConfiguration"),
            ),
    )
}

pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![scalable_target_config(), scaling_policy_config()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecsmcp_core::resource::Resource;

    #[test]
    fn min_must_not_exceed_max() {
        let target = Resource::new("applicationautoscaling.scalable_target", "Target")
            .with_attribute("service_namespace", "ecs")
            .with_attribute("resource_id", "service/cluster/svc")
            .with_attribute("scalable_dimension", "ecs:service:DesiredCount")
            .with_attribute("min_capacity", 5i64)
            .with_attribute("max_capacity", 2i64);
        assert!(scalable_target_config().validate(&target).is_err());

        let target = target.with_attribute("max_capacity", 10i64);
        assert!(scalable_target_config().validate(&target).is_ok());
    }
}
