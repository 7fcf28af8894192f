//! ECS schema definitions

use std::collections::HashMap;

use ecsmcp_core::resource::Value;
use ecsmcp_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::types;
use super::{AwsSchemaConfig, int_attr};

/// ecs.cluster (AWS::ECS::Cluster)
pub fn cluster_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::ECS::Cluster",
        ResourceSchema::new("ecs.cluster")
            .attribute(
                AttributeSchema::new("cluster_name", AttributeType::String)
                    .with_provider_name("ClusterName"),
            )
            .attribute(
                AttributeSchema::new("cluster_settings", types::objects())
                    .with_description("e.g. containerInsights = enhanced")
                    .with_provider_name("ClusterSettings"),
            )
            .attribute(
                AttributeSchema::new("service_connect_defaults", AttributeType::Object)
                    .with_provider_name("ServiceConnectDefaults"),
            )
            .attribute(AttributeSchema::new("tags", types::tags()).with_provider_name("Tags"))
            .attribute(
                AttributeSchema::new("arn", AttributeType::String)
                    .computed()
                    .with_provider_name("Arn"),
            ),
    )
}

/// ecs.cluster_capacity_provider_associations (AWS::ECS::ClusterCapacityProviderAssociations)
pub fn cluster_capacity_provider_associations_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::ECS::ClusterCapacityProviderAssociations",
        ResourceSchema::new("ecs.cluster_capacity_provider_associations")
            .attribute(
                AttributeSchema::new("cluster", AttributeType::String)
                    .required()
                    .with_provider_name("Cluster"),
            )
            .attribute(
                AttributeSchema::new(
                    "capacity_providers",
                    AttributeType::list_of(AttributeType::Enum(&["FARGATE", "FARGATE_SPOT"])),
                )
                .required()
                .with_provider_name("CapacityProviders"),
            )
            .attribute(
                AttributeSchema::new("default_capacity_provider_strategy", types::objects())
                    .required()
                    .with_provider_name("DefaultCapacityProviderStrategy"),
            ),
    )
}

/// ecs.task_definition (AWS::ECS::TaskDefinition)
pub fn task_definition_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::ECS::TaskDefinition",
        ResourceSchema::new("ecs.task_definition")
            .with_description("Fargate task definition")
            .attribute(
                AttributeSchema::new("family", AttributeType::String)
                    .required()
                    .with_provider_name("Family"),
            )
            .attribute(
                AttributeSchema::new("cpu", types::fargate_cpu())
                    .required()
                    .with_provider_name("Cpu"),
            )
            .attribute(
                AttributeSchema::new("memory", types::fargate_memory())
                    .required()
                    .with_provider_name("Memory"),
            )
            .attribute(
                AttributeSchema::new(
                    "network_mode",
                    AttributeType::Enum(&["awsvpc"]),
                )
                .required()
                .with_provider_name("NetworkMode"),
            )
            .attribute(
                AttributeSchema::new("requires_compatibilities", types::strings())
                    .with_provider_name("RequiresCompatibilities"),
            )
            .attribute(
                AttributeSchema::new("runtime_platform", AttributeType::Object)
                    .with_description("CpuArchitecture / OperatingSystemFamily")
                    .with_provider_name("RuntimePlatform"),
            )
            .attribute(
                AttributeSchema::new("execution_role_arn", AttributeType::String)
                    .required()
                    .with_provider_name("ExecutionRoleArn"),
            )
            .attribute(
                AttributeSchema::new("task_role_arn", AttributeType::String)
                    .with_provider_name("TaskRoleArn"),
            )
            .attribute(
                AttributeSchema::new("container_definitions", types::objects())
                    .required()
                    .with_provider_name("ContainerDefinitions"),
            )
            .attribute(
                AttributeSchema::new("task_definition_arn", AttributeType::String)
                    .computed()
                    .with_provider_name("TaskDefinitionArn"),
            ),
    )
    .with_check(fargate_sizing)
    .with_check(has_containers)
}

fn fargate_sizing(attributes: &HashMap<String, Value>) -> Result<(), String> {
    match (int_attr(attributes, "cpu"), int_attr(attributes, "memory")) {
        (Some(cpu), Some(memory)) => types::validate_fargate_sizing(cpu, memory),
        _ => Ok(()),
    }
}

fn has_containers(attributes: &HashMap<String, Value>) -> Result<(), String> {
    match attributes.get("container_definitions").and_then(Value::as_list) {
        Some(containers) if !containers.is_empty() => Ok(()),
        _ => Err("Task definition needs at least one container".to_string()),
    }
}

/// ecs.service (AWS::ECS::Service)
pub fn service_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::ECS::Service",
        ResourceSchema::new("ecs.service")
            .attribute(
                AttributeSchema::new("cluster", AttributeType::String)
                    .required()
                    .with_provider_name("Cluster"),
            )
            .attribute(
                AttributeSchema::new("task_definition", AttributeType::String)
                    .required()
                    .with_provider_name("TaskDefinition"),
            )
            .attribute(
                AttributeSchema::new("desired_count", types::capacity())
                    .with_provider_name("DesiredCount"),
            )
            .attribute(
                AttributeSchema::new(
                    "launch_type",
                    AttributeType::Enum(&["FARGATE"]),
                )
                .with_provider_name("LaunchType"),
            )
            .attribute(
                AttributeSchema::new("network_configuration", AttributeType::Object)
                    .required()
                    .with_provider_name("NetworkConfiguration"),
            )
            .attribute(
                AttributeSchema::new("load_balancers", types::objects())
                    .with_provider_name("LoadBalancers"),
            )
            .attribute(
                AttributeSchema::new("service_connect_configuration", AttributeType::Object)
                    .with_provider_name("ServiceConnectConfiguration"),
            )
            .attribute(
                AttributeSchema::new("deployment_configuration", AttributeType::Object)
                    .with_provider_name("DeploymentConfiguration"),
            )
            .attribute(
                AttributeSchema::new("enable_ecs_managed_tags", AttributeType::Bool)
                    .with_provider_name("EnableECSManagedTags"),
            )
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .computed()
                    .with_provider_name("Name"),
            )
            .attribute(
                AttributeSchema::new("service_arn", AttributeType::String)
                    .computed()
                    .with_provider_name("ServiceArn"),
            ),
    )
}

pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![
        cluster_config(),
        cluster_capacity_provider_associations_config(),
        task_definition_config(),
        service_config(),
    ]
}
