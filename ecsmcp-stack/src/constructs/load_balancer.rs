//! Internet-facing Application Load Balancer
//!
//! The security group and the load balancer are declared at the stack root,
//! so their logical IDs are `ALBSg` and `LoadBalancer`. Listeners are added by
//! whoever owns the targets.

use ecsmcp_aws::elb_accounts::log_delivery_principal;
use ecsmcp_aws::iam::PolicyStatement;
use ecsmcp_aws::template::Output;
use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::resource::{Suppression, Value};

use crate::constructs::networking::{Networking, SubnetTier};
use crate::constructs::security_group::{Peer, SecurityGroup};
use crate::constructs::storage::Storage;
use crate::error::StackError;
use crate::scope::{Scope, declare};

pub const HTTP_PORT: i64 = 80;
pub const IDLE_TIMEOUT_SECONDS: i64 = 300;
pub const ACCESS_LOG_PREFIX: &str = "elb-logs";
pub const DNS_OUTPUT: &str = "LoadBalancerDNS";

pub struct LoadBalancer {
    pub security_group: SecurityGroup,
    pub load_balancer: String,
}

impl LoadBalancer {
    pub fn new(
        scope: &mut Scope,
        networking: &Networking,
        storage: &mut Storage,
    ) -> Result<Self, StackError> {
        let root = ConstructPath::root();

        let security_group =
            SecurityGroup::new(scope, root.child("ALBSg"), &networking.vpc, true)?;
        security_group.add_ingress_rule(
            scope,
            Peer::AnyIpv4,
            HTTP_PORT,
            "Allow from anyone on port 80",
        )?;
        scope.resource_mut(&security_group.id)?.add_suppression(Suppression::new(
            "AwsSolutions-EC23",
            "inbound access needed for external resource",
        ));

        let region = scope.environment().region.clone();
        storage.add_to_resource_policy(
            scope,
            PolicyStatement::allow()
                .with_principal(log_delivery_principal(&region))
                .with_actions(["s3:PutObject"])
                .with_resources([Value::Join(vec![
                    storage.bucket_arn(),
                    Value::string(format!("/{}/AWSLogs/", ACCESS_LOG_PREFIX)),
                    Value::pseudo("AccountId"),
                    Value::string("/*"),
                ])]),
        )?;

        let attribute =
            |key: &str, value: Value| Value::map([("Key", Value::string(key)), ("Value", value)]);
        let mut load_balancer = declare(&root.child("LoadBalancer"), "elbv2.load_balancer")
            .with_attribute("type", "application")
            .with_attribute("scheme", "internet-facing")
            .with_attribute("subnets", networking.subnet_ids(SubnetTier::Public))
            .with_attribute("security_groups", Value::List(vec![security_group.group_id()]))
            .with_attribute(
                "load_balancer_attributes",
                Value::List(vec![
                    attribute("deletion_protection.enabled", Value::string("false")),
                    attribute(
                        "idle_timeout.timeout_seconds",
                        Value::string(IDLE_TIMEOUT_SECONDS.to_string()),
                    ),
                    attribute("access_logs.s3.enabled", Value::string("true")),
                    attribute("access_logs.s3.bucket", Value::ref_of(&storage.bucket)),
                    attribute("access_logs.s3.prefix", Value::string(ACCESS_LOG_PREFIX)),
                ]),
            );
        // Access logging is verified against the bucket policy on creation
        load_balancer.add_dependency(&storage.policy);
        for route in networking.public_routes() {
            load_balancer.add_dependency(route);
        }
        let load_balancer = scope.add(load_balancer);

        scope.add_output(Output::new(DNS_OUTPUT, Value::attr_of(&load_balancer, "dns_name")));

        Ok(Self {
            security_group,
            load_balancer,
        })
    }

    pub fn arn(&self) -> Value {
        Value::ref_of(&self.load_balancer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::constructs::networking::NetworkingProps;
    use ecsmcp_aws::iam::statements_of;
    use ecsmcp_aws::network_access::NetworkAccess;

    fn build() -> (Scope, Storage, LoadBalancer) {
        let mut scope = Scope::new("Test", Environment::new(None, "ap-northeast-1"));
        let mut storage = Storage::new(&mut scope, &ConstructPath::parse("Storage")).unwrap();
        let networking = Networking::new(
            &mut scope,
            &ConstructPath::parse("Networking"),
            NetworkingProps::default(),
            &mut storage,
        )
        .unwrap();
        let lb = LoadBalancer::new(&mut scope, &networking, &mut storage).unwrap();
        (scope, storage, lb)
    }

    #[test]
    fn root_level_logical_ids() {
        let (_, _, lb) = build();
        assert_eq!(lb.security_group.id, "ALBSg");
        assert_eq!(lb.load_balancer, "LoadBalancer");
    }

    #[test]
    fn only_port_80_is_open_to_the_world() {
        let (scope, _, lb) = build();
        let access = NetworkAccess::from_resources(scope.resources());
        let open = access.open_to_world();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].group, lb.security_group.id);
        assert_eq!((open[0].protocol.as_str(), open[0].from_port, open[0].to_port), ("tcp", 80, 80));
    }

    #[test]
    fn access_logs_go_to_bucket() {
        let (scope, storage, lb) = build();
        let resource = scope.resource(&lb.load_balancer).unwrap();
        let attributes = resource.get("load_balancer_attributes").unwrap().as_list().unwrap();
        let value_of = |key: &str| {
            attributes
                .iter()
                .filter_map(Value::as_map)
                .find(|m| m.get("Key") == Some(&Value::string(key)))
                .and_then(|m| m.get("Value").cloned())
        };
        assert_eq!(value_of("access_logs.s3.bucket"), Some(Value::ref_of(&storage.bucket)));
        assert_eq!(value_of("access_logs.s3.prefix"), Some(Value::string("elb-logs")));
        assert_eq!(value_of("idle_timeout.timeout_seconds"), Some(Value::string("300")));
        assert!(resource.depends_on().contains(&storage.policy));

        let policy = scope.resource(&storage.policy).unwrap();
        // TLS deny, two flow-log delivery grants, ELB delivery
        assert_eq!(statements_of(policy.get("policy_document").unwrap()).len(), 4);
    }

    #[test]
    fn dns_name_is_an_output() {
        let (scope, _, lb) = build();
        let (_, outputs, _) = scope.into_parts();
        let output = outputs.iter().find(|o| o.name == DNS_OUTPUT).unwrap();
        assert_eq!(output.value, Value::attr_of(&lb.load_balancer, "dns_name"));
    }

    #[test]
    fn load_balancer_passes_rule_pack() {
        let (scope, _, _) = build();
        ecsmcp_aws::validate_resources(scope.resources()).unwrap();
        assert!(ecsmcp_aws::nag::check(scope.resources()).is_clean());
    }
}
