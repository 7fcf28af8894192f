//! ECSService - A Fargate service with logging and CPU auto scaling
//!
//! Produces the execution role and its policy, a log group, the task
//! definition with a single container, the service registered in Service
//! Connect under its own name, and a target-tracking scaling policy.

use std::collections::BTreeMap;

use ecsmcp_aws::iam::{PolicyDocument, PolicyStatement};
use ecsmcp_aws::schemas::types::validate_fargate_sizing;
use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::resource::{DeletionPolicy, Suppression, Value};

use crate::assets::ContainerImage;
use crate::constructs::ecs_cluster::EcsCluster;
use crate::constructs::networking::{Networking, SubnetTier};
use crate::constructs::security_group::SecurityGroup;
use crate::error::StackError;
use crate::scope::{Scope, declare};

pub const DEFAULT_CPU: i64 = 512;
pub const DEFAULT_MEMORY: i64 = 1024;
pub const DEFAULT_CONTAINER_PORT: i64 = 3000;
pub const MIN_CAPACITY: i64 = 1;
pub const MAX_CAPACITY: i64 = 10;
pub const CPU_TARGET_PERCENT: i64 = 70;
pub const SCALE_COOLDOWN_SECONDS: i64 = 60;
pub const STOP_TIMEOUT_SECONDS: i64 = 120;
pub const PORT_MAPPING_NAME: &str = "web";
pub const LOG_STREAM_PREFIX: &str = "ecs";
pub const LOG_RETENTION_DAYS: i64 = 731;

const AUTOSCALING_ROLE: &str = "/aws-service-role/ecs.application-autoscaling.amazonaws.com/AWSServiceRoleForApplicationAutoScaling_ECSService";

pub struct EcsServiceProps<'a> {
    pub cluster: &'a EcsCluster,
    pub networking: &'a Networking,
    /// Logical ID of the task role
    pub task_role: &'a str,
    pub image: ContainerImage,
    pub service_name: String,
    pub cpu: Option<i64>,
    pub memory: Option<i64>,
    pub environment: BTreeMap<String, String>,
    pub subnet_tier: Option<SubnetTier>,
    pub container_port: Option<i64>,
    pub security_group: Option<&'a SecurityGroup>,
}

impl<'a> EcsServiceProps<'a> {
    pub fn new(
        cluster: &'a EcsCluster,
        networking: &'a Networking,
        task_role: &'a str,
        image: ContainerImage,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            cluster,
            networking,
            task_role,
            image,
            service_name: service_name.into(),
            cpu: None,
            memory: None,
            environment: BTreeMap::new(),
            subnet_tier: None,
            container_port: None,
            security_group: None,
        }
    }

    pub fn with_sizing(mut self, cpu: i64, memory: i64) -> Self {
        self.cpu = Some(cpu);
        self.memory = Some(memory);
        self
    }

    pub fn with_port(mut self, port: i64) -> Self {
        self.container_port = Some(port);
        self
    }

    pub fn with_environment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_security_group(mut self, security_group: &'a SecurityGroup) -> Self {
        self.security_group = Some(security_group);
        self
    }

    pub fn with_subnet_tier(mut self, tier: SubnetTier) -> Self {
        self.subnet_tier = Some(tier);
        self
    }
}

#[derive(Debug, Clone)]
pub struct EcsService {
    pub name: String,
    pub cpu: i64,
    pub memory: i64,
    pub container_port: i64,
    pub service: String,
    pub task_definition: String,
    pub execution_role: String,
    pub execution_policy: String,
    pub log_group: String,
    pub security_group: SecurityGroup,
    pub scalable_target: String,
    pub scaling_policy: String,
}

impl EcsService {
    pub fn new(
        scope: &mut Scope,
        path: &ConstructPath,
        props: EcsServiceProps<'_>,
    ) -> Result<Self, StackError> {
        let name = props.service_name.clone();
        let cpu = props.cpu.unwrap_or(DEFAULT_CPU);
        let memory = props.memory.unwrap_or(DEFAULT_MEMORY);
        let container_port = props.container_port.unwrap_or(DEFAULT_CONTAINER_PORT);
        let tier = props.subnet_tier.unwrap_or(SubnetTier::PrivateWithEgress);

        validate_fargate_sizing(cpu, memory).map_err(|reason| StackError::InvalidService {
            service: name.clone(),
            reason,
        })?;
        if !(1..=65535).contains(&container_port) {
            return Err(StackError::InvalidService {
                service: name.clone(),
                reason: format!("container port {} is out of range", container_port),
            });
        }

        let log_group = scope.add(
            declare(&path.child(format!("{}Logs", name)), "logs.log_group")
                .with_attribute("log_group_name", format!("{}-Logs", name))
                .with_attribute("retention_in_days", Value::Int(LOG_RETENTION_DAYS))
                .with_deletion_policy(DeletionPolicy::Retain),
        );

        let task_path = path.child("TaskDefinition");
        let (execution_role, execution_policy) =
            execution_role(scope, &task_path, &props.image, &log_group)?;

        let container = container_definition(
            &name,
            &props.image,
            cpu,
            memory,
            container_port,
            &props.environment,
            &log_group,
        );
        let task_definition = scope.add(
            declare(&task_path, "ecs.task_definition")
                .with_attribute("family", task_path.logical_id())
                .with_attribute("cpu", cpu.to_string())
                .with_attribute("memory", memory.to_string())
                .with_attribute("network_mode", "awsvpc")
                .with_attribute("requires_compatibilities", Value::strings(["FARGATE"]))
                .with_attribute(
                    "runtime_platform",
                    Value::map([
                        ("CpuArchitecture", Value::string("ARM64")),
                        ("OperatingSystemFamily", Value::string("LINUX")),
                    ]),
                )
                .with_attribute("execution_role_arn", Value::attr_of(&execution_role, "arn"))
                .with_attribute("task_role_arn", Value::attr_of(props.task_role, "arn"))
                .with_attribute("container_definitions", Value::List(vec![container])),
        );

        let service_path = path.child("Service");
        let security_group = match props.security_group {
            Some(group) => group.clone(),
            None => SecurityGroup::new(
                scope,
                service_path.child("SecurityGroup"),
                &props.networking.vpc,
                true,
            )?,
        };

        let assign_public_ip = if tier == SubnetTier::Public {
            "ENABLED"
        } else {
            "DISABLED"
        };
        let mut service = declare(&service_path, "ecs.service")
            .with_attribute("cluster", props.cluster.cluster_ref())
            .with_attribute("task_definition", Value::ref_of(&task_definition))
            .with_attribute("desired_count", Value::Int(1))
            .with_attribute("launch_type", "FARGATE")
            .with_attribute("enable_ecs_managed_tags", false)
            .with_attribute(
                "deployment_configuration",
                Value::map([
                    ("MaximumPercent", Value::Int(200)),
                    ("MinimumHealthyPercent", Value::Int(50)),
                ]),
            )
            .with_attribute(
                "network_configuration",
                Value::map([(
                    "AwsvpcConfiguration",
                    Value::map([
                        ("AssignPublicIp", Value::string(assign_public_ip)),
                        ("SecurityGroups", Value::List(vec![security_group.group_id()])),
                        ("Subnets", props.networking.subnet_ids(tier)),
                    ]),
                )]),
            )
            .with_attribute(
                "service_connect_configuration",
                Value::map([
                    ("Enabled", Value::Bool(true)),
                    ("Namespace", Value::string(&props.cluster.namespace_name)),
                    (
                        "Services",
                        Value::List(vec![Value::map([
                            ("PortName", Value::string(PORT_MAPPING_NAME)),
                            ("DiscoveryName", Value::string(&name)),
                            (
                                "ClientAliases",
                                Value::List(vec![Value::map([
                                    ("Port", Value::Int(container_port)),
                                    ("DnsName", Value::string(&name)),
                                ])]),
                            ),
                        ])]),
                    ),
                ]),
            );
        // The namespace is referenced by name, so the ordering is explicit
        service.add_dependency(&props.cluster.namespace);
        service.add_dependency(&props.cluster.capacity_providers);
        service.add_dependency(&execution_policy);
        let service = scope.add(service);

        let (scalable_target, scaling_policy) =
            auto_scaling(scope, &service_path, props.cluster, &service);

        log::debug!(
            "Service {}: {} CPU / {} MiB on port {}",
            name,
            cpu,
            memory,
            container_port
        );
        Ok(Self {
            name,
            cpu,
            memory,
            container_port,
            service,
            task_definition,
            execution_role,
            execution_policy,
            log_group,
            security_group,
            scalable_target,
            scaling_policy,
        })
    }

    /// Register the container as a target of a target group
    pub fn attach_to_target_group(
        &self,
        scope: &mut Scope,
        target_group: &str,
    ) -> Result<(), StackError> {
        scope.push_to_list(
            &self.service,
            "load_balancers",
            Value::map([
                ("ContainerName", Value::string(&self.name)),
                ("ContainerPort", Value::Int(self.container_port)),
                ("TargetGroupArn", Value::ref_of(target_group)),
            ]),
        )
    }
}

fn execution_role(
    scope: &mut Scope,
    task_path: &ConstructPath,
    image: &ContainerImage,
    log_group: &str,
) -> Result<(String, String), StackError> {
    let role_path = task_path.child("ExecutionRole");
    let role = scope.add(declare(&role_path, "iam.role").with_attribute(
        "assume_role_policy_document",
        PolicyDocument::assume_role("ecs-tasks.amazonaws.com").to_value(),
    ));

    let mut document = PolicyDocument::new();
    if let Some(repository) = &image.repository_arn {
        document = document.allow(
            [
                "ecr:BatchCheckLayerAvailability",
                "ecr:GetDownloadUrlForLayer",
                "ecr:BatchGetImage",
            ],
            [repository.clone()],
        );
    }
    document = document
        .statement(
            PolicyStatement::allow()
                .with_actions(["ecr:GetAuthorizationToken"])
                .with_resources([Value::string("*")]),
        )
        .allow(
            ["logs:CreateLogStream", "logs:PutLogEvents"],
            [Value::attr_of(log_group, "arn")],
        );

    let policy_path = role_path.child("DefaultPolicy");
    let mut policy = declare(&policy_path, "iam.policy")
        .with_attribute("policy_name", policy_path.logical_id())
        .with_attribute("policy_document", document.to_value())
        .with_attribute("roles", Value::List(vec![Value::ref_of(&role)]));
    policy.add_suppression(Suppression::new(
        "AwsSolutions-IAM5",
        "ecr:GetAuthorizationToken does not support resource-level permissions",
    ));
    let policy = scope.add(policy);
    Ok((role, policy))
}

fn container_definition(
    name: &str,
    image: &ContainerImage,
    cpu: i64,
    memory: i64,
    port: i64,
    environment: &BTreeMap<String, String>,
    log_group: &str,
) -> Value {
    let mut entries = vec![
        ("Name", Value::string(name)),
        ("Image", image.uri.clone()),
        ("Essential", Value::Bool(true)),
        ("Cpu", Value::Int(cpu)),
        ("Memory", Value::Int(memory)),
        ("MemoryReservation", Value::Int(memory)),
        ("StopTimeout", Value::Int(STOP_TIMEOUT_SECONDS)),
        (
            "PortMappings",
            Value::List(vec![Value::map([
                ("ContainerPort", Value::Int(port)),
                ("Name", Value::string(PORT_MAPPING_NAME)),
                ("Protocol", Value::string("tcp")),
            ])]),
        ),
        (
            "LogConfiguration",
            Value::map([
                ("LogDriver", Value::string("awslogs")),
                (
                    "Options",
                    Value::map([
                        ("awslogs-group", Value::ref_of(log_group)),
                        ("awslogs-stream-prefix", Value::string(LOG_STREAM_PREFIX)),
                        ("awslogs-region", Value::pseudo("Region")),
                    ]),
                ),
            ]),
        ),
    ];
    if !environment.is_empty() {
        entries.push((
            "Environment",
            Value::List(
                environment
                    .iter()
                    .map(|(key, value)| {
                        Value::map([("Name", Value::string(key)), ("Value", Value::string(value))])
                    })
                    .collect(),
            ),
        ));
    }
    Value::map(entries)
}

fn auto_scaling(
    scope: &mut Scope,
    service_path: &ConstructPath,
    cluster: &EcsCluster,
    service: &str,
) -> (String, String) {
    let target_path = service_path.child("TaskCount").child("Target");
    let target = scope.add(
        declare(&target_path, "applicationautoscaling.scalable_target")
            .with_attribute("service_namespace", "ecs")
            .with_attribute("scalable_dimension", "ecs:service:DesiredCount")
            .with_attribute(
                "resource_id",
                Value::Join(vec![
                    Value::string("service/"),
                    cluster.cluster_ref(),
                    Value::string("/"),
                    Value::attr_of(service, "name"),
                ]),
            )
            .with_attribute("min_capacity", Value::Int(MIN_CAPACITY))
            .with_attribute("max_capacity", Value::Int(MAX_CAPACITY))
            .with_attribute(
                "role_arn",
                Value::Join(vec![
                    Value::string("arn:"),
                    Value::pseudo("Partition"),
                    Value::string(":iam::"),
                    Value::pseudo("AccountId"),
                    Value::string(format!(":role{}", AUTOSCALING_ROLE)),
                ]),
            ),
    );

    let policy_path = target_path.child("CpuScaling");
    let policy = scope.add(
        declare(&policy_path, "applicationautoscaling.scaling_policy")
            .with_attribute("policy_name", policy_path.logical_id())
            .with_attribute("policy_type", "TargetTrackingScaling")
            .with_attribute("scaling_target_id", Value::ref_of(&target))
            .with_attribute(
                "target_tracking_scaling_policy_configuration",
                Value::map([
                    (
                        "PredefinedMetricSpecification",
                        Value::map([(
                            "PredefinedMetricType",
                            Value::string("ECSServiceAverageCPUUtilization"),
                        )]),
                    ),
                    ("TargetValue", Value::Int(CPU_TARGET_PERCENT)),
                    ("ScaleInCooldown", Value::Int(SCALE_COOLDOWN_SECONDS)),
                    ("ScaleOutCooldown", Value::Int(SCALE_COOLDOWN_SECONDS)),
                ]),
            ),
    );
    (target, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::constructs::ecs_cluster::EcsClusterProps;
    use crate::constructs::networking::NetworkingProps;
    use crate::constructs::storage::Storage;

    struct Fixture {
        scope: Scope,
        networking: Networking,
        cluster: EcsCluster,
        task_role: String,
    }

    fn fixture() -> Fixture {
        let mut scope = Scope::new("Test", Environment::new(None, "us-east-1"));
        let mut storage = Storage::new(&mut scope, &ConstructPath::parse("Storage")).unwrap();
        let networking = Networking::new(
            &mut scope,
            &ConstructPath::parse("Networking"),
            NetworkingProps::default(),
            &mut storage,
        )
        .unwrap();
        let cluster = EcsCluster::new(
            &mut scope,
            &ConstructPath::parse("ECS"),
            EcsClusterProps {
                namespace: "services.local",
            },
        )
        .unwrap();
        let task_role = scope.add(
            declare(&ConstructPath::parse("Web/TaskRole"), "iam.role").with_attribute(
                "assume_role_policy_document",
                PolicyDocument::assume_role("ecs-tasks.amazonaws.com").to_value(),
            ),
        );
        Fixture {
            scope,
            networking,
            cluster,
            task_role,
        }
    }

    fn container(scope: &Scope, service: &EcsService) -> std::collections::HashMap<String, Value> {
        scope
            .resource(&service.task_definition)
            .and_then(|t| t.get("container_definitions"))
            .and_then(Value::as_list)
            .and_then(|c| c.first())
            .and_then(Value::as_map)
            .cloned()
            .unwrap()
    }

    #[test]
    fn defaults_apply() {
        let mut f = fixture();
        let props = EcsServiceProps::new(
            &f.cluster,
            &f.networking,
            &f.task_role,
            ContainerImage::from_registry("nginx"),
            "web",
        );
        let service = EcsService::new(&mut f.scope, &ConstructPath::parse("Web/ECSService"), props)
            .unwrap();

        assert_eq!(service.cpu, 512);
        assert_eq!(service.memory, 1024);
        assert_eq!(service.container_port, 3000);

        let task = f.scope.resource(&service.task_definition).unwrap();
        assert_eq!(task.get_str("cpu"), Some("512"));
        assert_eq!(task.get_str("memory"), Some("1024"));

        let container = container(&f.scope, &service);
        assert_eq!(container.get("StopTimeout"), Some(&Value::Int(120)));
        assert!(container.get("Environment").is_none());
        let mapping = container["PortMappings"].as_list().unwrap()[0].as_map().unwrap();
        assert_eq!(mapping.get("ContainerPort"), Some(&Value::Int(3000)));
        assert_eq!(mapping.get("Name"), Some(&Value::string("web")));
    }

    #[test]
    fn dedicated_security_group_when_none_given() {
        let mut f = fixture();
        let props = EcsServiceProps::new(
            &f.cluster,
            &f.networking,
            &f.task_role,
            ContainerImage::from_registry("nginx"),
            "web",
        );
        let service = EcsService::new(&mut f.scope, &ConstructPath::parse("Web/ECSService"), props)
            .unwrap();
        assert_ne!(service.security_group.id, f.networking.ai_security_group.id);
        assert!(f.scope.resource(&service.security_group.id).is_some());
    }

    fn awsvpc_configuration(scope: &Scope, service: &EcsService) -> std::collections::HashMap<String, Value> {
        scope
            .resource(&service.service)
            .and_then(|s| s.get("network_configuration"))
            .and_then(Value::as_map)
            .and_then(|n| n.get("AwsvpcConfiguration"))
            .and_then(Value::as_map)
            .cloned()
            .unwrap()
    }

    fn service_in(tier: Option<SubnetTier>) -> (Fixture, EcsService) {
        let mut f = fixture();
        let mut props = EcsServiceProps::new(
            &f.cluster,
            &f.networking,
            &f.task_role,
            ContainerImage::from_registry("nginx"),
            "web",
        );
        if let Some(tier) = tier {
            props = props.with_subnet_tier(tier);
        }
        let service = EcsService::new(&mut f.scope, &ConstructPath::parse("Web/ECSService"), props)
            .unwrap();
        (f, service)
    }

    #[test]
    fn private_subnets_with_egress_by_default() {
        let (f, service) = service_in(None);
        let awsvpc = awsvpc_configuration(&f.scope, &service);
        assert_eq!(
            awsvpc.get("Subnets"),
            Some(&f.networking.subnet_ids(SubnetTier::PrivateWithEgress))
        );
        assert_eq!(awsvpc.get("AssignPublicIp"), Some(&Value::string("DISABLED")));
    }

    #[test]
    fn isolated_tier_places_tasks_in_isolated_subnets() {
        let (f, service) = service_in(Some(SubnetTier::PrivateIsolated));
        let awsvpc = awsvpc_configuration(&f.scope, &service);
        let isolated = f.networking.subnet_ids(SubnetTier::PrivateIsolated);
        assert_eq!(isolated.as_list().map(|s| s.len()), Some(3));
        assert_eq!(awsvpc.get("Subnets"), Some(&isolated));
        assert_ne!(
            awsvpc.get("Subnets"),
            Some(&f.networking.subnet_ids(SubnetTier::PrivateWithEgress))
        );
        assert_eq!(awsvpc.get("AssignPublicIp"), Some(&Value::string("DISABLED")));
    }

    #[test]
    fn public_tier_assigns_public_ips() {
        let (f, service) = service_in(Some(SubnetTier::Public));
        let awsvpc = awsvpc_configuration(&f.scope, &service);
        assert_eq!(awsvpc.get("Subnets"), Some(&f.networking.subnet_ids(SubnetTier::Public)));
        assert_eq!(awsvpc.get("AssignPublicIp"), Some(&Value::string("ENABLED")));
    }

    #[test]
    fn shared_security_group_is_used() {
        let mut f = fixture();
        let shared = f.networking.ai_security_group.clone();
        let before = f.scope.resources().len();
        let props = EcsServiceProps::new(
            &f.cluster,
            &f.networking,
            &f.task_role,
            ContainerImage::from_registry("nginx"),
            "web",
        )
        .with_security_group(&shared);
        let service = EcsService::new(&mut f.scope, &ConstructPath::parse("Web/ECSService"), props)
            .unwrap();
        assert_eq!(service.security_group.id, shared.id);
        // log group, role, policy, task definition, service, target, policy
        assert_eq!(f.scope.resources().len(), before + 7);
    }

    #[test]
    fn service_connect_registers_name() {
        let mut f = fixture();
        let props = EcsServiceProps::new(
            &f.cluster,
            &f.networking,
            &f.task_role,
            ContainerImage::from_registry("nginx"),
            "mcp-one",
        )
        .with_port(8000);
        let service = EcsService::new(&mut f.scope, &ConstructPath::parse("MCPOne/ECSService"), props)
            .unwrap();

        let resource = f.scope.resource(&service.service).unwrap();
        let connect = resource.get("service_connect_configuration").unwrap().as_map().unwrap();
        assert_eq!(connect.get("Namespace"), Some(&Value::string("services.local")));
        let entry = connect["Services"].as_list().unwrap()[0].as_map().unwrap();
        assert_eq!(entry.get("DiscoveryName"), Some(&Value::string("mcp-one")));
        let alias = entry["ClientAliases"].as_list().unwrap()[0].as_map().unwrap();
        assert_eq!(alias.get("DnsName"), Some(&Value::string("mcp-one")));
        assert_eq!(alias.get("Port"), Some(&Value::Int(8000)));

        let log_group = f.scope.resource(&service.log_group).unwrap();
        assert_eq!(log_group.get_str("log_group_name"), Some("mcp-one-Logs"));
        assert_eq!(log_group.deletion_policy(), DeletionPolicy::Retain);
    }

    #[test]
    fn scaling_is_bounded_and_symmetric() {
        let mut f = fixture();
        let props = EcsServiceProps::new(
            &f.cluster,
            &f.networking,
            &f.task_role,
            ContainerImage::from_registry("nginx"),
            "web",
        );
        let service = EcsService::new(&mut f.scope, &ConstructPath::parse("Web/ECSService"), props)
            .unwrap();

        let target = f.scope.resource(&service.scalable_target).unwrap();
        assert_eq!(target.get("min_capacity"), Some(&Value::Int(1)));
        assert_eq!(target.get("max_capacity"), Some(&Value::Int(10)));

        let policy = f.scope.resource(&service.scaling_policy).unwrap();
        let config = policy
            .get("target_tracking_scaling_policy_configuration")
            .and_then(Value::as_map)
            .unwrap();
        assert_eq!(config.get("TargetValue"), Some(&Value::Int(70)));
        assert_eq!(config.get("ScaleInCooldown"), config.get("ScaleOutCooldown"));
    }

    #[test]
    fn environment_is_sorted_by_name() {
        let mut f = fixture();
        let props = EcsServiceProps::new(
            &f.cluster,
            &f.networking,
            &f.task_role,
            ContainerImage::from_registry("nginx"),
            "web",
        )
        .with_environment("B", "2")
        .with_environment("A", "1");
        let service = EcsService::new(&mut f.scope, &ConstructPath::parse("Web/ECSService"), props)
            .unwrap();
        let container = container(&f.scope, &service);
        let names: Vec<&str> = container["Environment"]
            .as_list()
            .unwrap()
            .iter()
            .filter_map(|e| e.as_map().and_then(|m| m.get("Name")).and_then(Value::as_str))
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn invalid_fargate_sizing_is_rejected() {
        let mut f = fixture();
        let props = EcsServiceProps::new(
            &f.cluster,
            &f.networking,
            &f.task_role,
            ContainerImage::from_registry("nginx"),
            "web",
        )
        .with_sizing(256, 4096);
        let result = EcsService::new(&mut f.scope, &ConstructPath::parse("Web/ECSService"), props);
        assert!(matches!(
            result,
            Err(StackError::InvalidService { service, .. }) if service == "web"
        ));
    }

    #[test]
    fn asset_images_grant_repository_pull() {
        let mut f = fixture();
        let image = ContainerImage {
            uri: Value::string("repo:tag"),
            repository_arn: Some(Value::string("arn:aws:ecr:us-east-1:123456789012:repository/r")),
        };
        let props = EcsServiceProps::new(&f.cluster, &f.networking, &f.task_role, image, "web");
        let service = EcsService::new(&mut f.scope, &ConstructPath::parse("Web/ECSService"), props)
            .unwrap();
        let policy = f.scope.resource(&service.execution_policy).unwrap();
        let statements = ecsmcp_aws::iam::statements_of(policy.get("policy_document").unwrap());
        assert_eq!(statements.len(), 3);
        assert!(policy.is_suppressed("AwsSolutions-IAM5"));
    }

    #[test]
    fn whole_service_validates() {
        let mut f = fixture();
        let props = EcsServiceProps::new(
            &f.cluster,
            &f.networking,
            &f.task_role,
            ContainerImage::from_registry("nginx"),
            "web",
        )
        .with_sizing(1024, 2048);
        EcsService::new(&mut f.scope, &ConstructPath::parse("Web/ECSService"), props).unwrap();
        ecsmcp_aws::validate_resources(f.scope.resources()).unwrap();
        assert!(ecsmcp_aws::nag::check(f.scope.resources()).is_clean());
    }
}
