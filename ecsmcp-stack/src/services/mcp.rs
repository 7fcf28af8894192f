//! MCP servers
//!
//! Both servers run on port 8000 in their own security group and accept
//! traffic only from the AI service's group. They differ in name, image and
//! what their task role may do.

use std::path::Path;

use ecsmcp_aws::iam::PolicyDocument;
use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::resource::{Suppression, Value};

use crate::constructs::ecs_cluster::EcsCluster;
use crate::constructs::ecs_service::{EcsService, EcsServiceProps};
use crate::constructs::networking::Networking;
use crate::constructs::security_group::{Peer, SecurityGroup};
use crate::error::StackError;
use crate::scope::Scope;
use crate::services::{SERVICE_PORT, ServiceDetails, image_asset, task_role};

pub struct McpServiceProps<'a> {
    pub cluster: &'a EcsCluster,
    pub networking: &'a Networking,
    pub services_dir: &'a Path,
}

pub struct McpService {
    pub details: ServiceDetails,
    pub security_group: SecurityGroup,
    pub task_role: String,
    pub service: EcsService,
}

struct McpDefinition<'a> {
    construct_id: &'a str,
    service_name: &'a str,
    image_id: &'a str,
    inline_policy: Option<(&'a str, PolicyDocument, &'a str)>,
}

impl McpService {
    /// `mcp-one`: no permissions beyond running
    pub fn one(scope: &mut Scope, props: &McpServiceProps<'_>) -> Result<Self, StackError> {
        Self::build(
            scope,
            props,
            McpDefinition {
                construct_id: "MCPOne",
                service_name: "mcp-one",
                image_id: "MCPServiceOneImage",
                inline_policy: None,
            },
        )
    }

    /// `mcp-two`: may list S3 buckets
    pub fn two(scope: &mut Scope, props: &McpServiceProps<'_>) -> Result<Self, StackError> {
        let list_buckets = PolicyDocument::new().allow(
            ["s3:ListAllMyBuckets", "s3:GetBucketLocation", "s3:ListBucket"],
            [Value::string("*")],
        );
        Self::build(
            scope,
            props,
            McpDefinition {
                construct_id: "MCPTwo",
                service_name: "mcp-two",
                image_id: "MCPServiceTwoImage",
                inline_policy: Some((
                    "LimitedS3Access",
                    list_buckets,
                    "Only provide access to list S3 buckets",
                )),
            },
        )
    }

    fn build(
        scope: &mut Scope,
        props: &McpServiceProps<'_>,
        definition: McpDefinition<'_>,
    ) -> Result<Self, StackError> {
        let path = ConstructPath::root().child(definition.construct_id);

        let security_group = SecurityGroup::new(
            scope,
            ConstructPath::root().child(format!("SG{}", definition.service_name)),
            &props.networking.vpc,
            true,
        )?;
        security_group.add_ingress_rule(
            scope,
            Peer::SecurityGroupId(props.networking.ai_security_group.group_id()),
            SERVICE_PORT,
            "Inbound from AI Service SG",
        )?;

        let image = image_asset(
            scope,
            &path.child(definition.image_id),
            props.services_dir,
            definition.service_name,
        )?;

        let (policies, suppression) = match definition.inline_policy {
            Some((name, document, reason)) => (vec![(name, document)], Some(reason)),
            None => (Vec::new(), None),
        };
        let task_role = task_role(scope, &path, policies);
        if let Some(reason) = suppression {
            scope
                .resource_mut(&task_role)?
                .add_suppression(Suppression::new("AwsSolutions-IAM5", reason));
        }

        let service = EcsService::new(
            scope,
            &path.child("ECSService"),
            EcsServiceProps::new(
                props.cluster,
                props.networking,
                &task_role,
                image,
                definition.service_name,
            )
            .with_port(SERVICE_PORT)
            .with_security_group(&security_group),
        )?;

        Ok(Self {
            details: ServiceDetails {
                service_name: definition.service_name.to_string(),
                service_port: SERVICE_PORT,
            },
            security_group,
            task_role,
            service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::constructs::ecs_cluster::EcsClusterProps;
    use crate::constructs::networking::NetworkingProps;
    use crate::constructs::storage::Storage;
    use ecsmcp_aws::iam::statements_of;

    fn build(dir: &Path) -> (Scope, McpService, McpService) {
        for name in ["mcp-one", "mcp-two"] {
            std::fs::create_dir(dir.join(name)).unwrap();
            std::fs::write(dir.join(name).join("Dockerfile"), "FROM scratch\n").unwrap();
        }
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
        let props = McpServiceProps {
            cluster: &cluster,
            networking: &networking,
            services_dir: dir,
        };
        let one = McpService::one(&mut scope, &props).unwrap();
        let two = McpService::two(&mut scope, &props).unwrap();
        (scope, one, two)
    }

    #[test]
    fn security_groups_sit_at_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let (_, one, two) = build(dir.path());
        assert_eq!(one.security_group.id, "SGmcpone");
        assert_eq!(two.security_group.id, "SGmcptwo");
        assert_eq!(one.details.service_port, 8000);
        assert_eq!(two.details.service_name, "mcp-two");
    }

    #[test]
    fn only_mcp_two_may_list_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let (scope, one, two) = build(dir.path());

        let role_one = scope.resource(&one.task_role).unwrap();
        assert!(role_one.get("policies").is_none());
        assert!(!role_one.is_suppressed("AwsSolutions-IAM5"));

        let role_two = scope.resource(&two.task_role).unwrap();
        let policies = role_two.get("policies").and_then(Value::as_list).unwrap();
        assert_eq!(policies.len(), 1);
        let policy = policies[0].as_map().unwrap();
        assert_eq!(policy["PolicyName"], Value::string("LimitedS3Access"));
        let statements = statements_of(&policy["PolicyDocument"]);
        assert_eq!(statements.len(), 1);
        assert!(role_two.is_suppressed("AwsSolutions-IAM5"));
    }

    #[test]
    fn services_register_their_images() {
        let dir = tempfile::tempdir().unwrap();
        let (scope, _, _) = build(dir.path());
        let (_, _, assets) = scope.into_parts();
        let ids: Vec<&str> = assets.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["MCPOne/MCPServiceOneImage", "MCPTwo/MCPServiceTwoImage"]);
    }
}
