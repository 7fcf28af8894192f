//! ECS cluster with Fargate capacity and a Service Connect namespace

use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::resource::Value;

use crate::error::StackError;
use crate::scope::{Scope, declare};

pub const CAPACITY_PROVIDERS: [&str; 2] = ["FARGATE", "FARGATE_SPOT"];

pub struct EcsClusterProps<'a> {
    /// HTTP namespace shared by every service in the cluster
    pub namespace: &'a str,
}

pub struct EcsCluster {
    pub cluster: String,
    pub namespace: String,
    pub namespace_name: String,
    pub capacity_providers: String,
}

impl EcsCluster {
    pub fn new(
        scope: &mut Scope,
        path: &ConstructPath,
        props: EcsClusterProps<'_>,
    ) -> Result<Self, StackError> {
        let cluster_path = path.child("Cluster");

        let namespace = scope.add(
            declare(
                &cluster_path.child("DefaultServiceDiscoveryNamespace"),
                "servicediscovery.http_namespace",
            )
            .with_attribute("name", props.namespace),
        );

        let cluster = scope.add(
            declare(&cluster_path, "ecs.cluster")
                .with_attribute(
                    "cluster_settings",
                    Value::List(vec![Value::map([
                        ("Name", Value::string("containerInsights")),
                        ("Value", Value::string("enhanced")),
                    ])]),
                )
                .with_attribute(
                    "service_connect_defaults",
                    Value::map([("Namespace", Value::attr_of(&namespace, "arn"))]),
                ),
        );

        let capacity_providers = scope.add(
            declare(&cluster_path.child("Cluster"), "ecs.cluster_capacity_provider_associations")
                .with_attribute("cluster", Value::ref_of(&cluster))
                .with_attribute("capacity_providers", Value::strings(CAPACITY_PROVIDERS))
                .with_attribute("default_capacity_provider_strategy", Value::List(Vec::new())),
        );

        Ok(Self {
            cluster,
            namespace,
            namespace_name: props.namespace.to_string(),
            capacity_providers,
        })
    }

    pub fn cluster_ref(&self) -> Value {
        Value::ref_of(&self.cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    #[test]
    fn cluster_uses_namespace_for_service_connect() {
        let mut scope = Scope::new("Test", Environment::new(None, "us-east-1"));
        let ecs = EcsCluster::new(
            &mut scope,
            &ConstructPath::parse("ECS"),
            EcsClusterProps {
                namespace: "services.local",
            },
        )
        .unwrap();

        let cluster = scope.resource(&ecs.cluster).unwrap();
        let defaults = cluster.get("service_connect_defaults").unwrap().as_map().unwrap();
        assert_eq!(defaults.get("Namespace"), Some(&Value::attr_of(&ecs.namespace, "arn")));

        let namespace = scope.resource(&ecs.namespace).unwrap();
        assert_eq!(namespace.get_str("name"), Some("services.local"));

        let associations = scope.resource(&ecs.capacity_providers).unwrap();
        assert_eq!(
            associations.get("capacity_providers"),
            Some(&Value::strings(["FARGATE", "FARGATE_SPOT"]))
        );

        ecsmcp_aws::validate_resources(scope.resources()).unwrap();
        assert!(ecsmcp_aws::nag::check(scope.resources()).is_clean());
    }

    #[test]
    fn association_id_differs_from_cluster() {
        let mut scope = Scope::new("Test", Environment::new(None, "us-east-1"));
        let ecs = EcsCluster::new(
            &mut scope,
            &ConstructPath::parse("ECS"),
            EcsClusterProps { namespace: "ns" },
        )
        .unwrap();
        assert_ne!(ecs.cluster, ecs.capacity_providers);
    }
}
