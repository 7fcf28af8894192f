//! Security groups
//!
//! Rules whose peer is a CIDR or an explicit group ID are written inline on
//! the group. A peer that is another group construct gets a standalone
//! ingress resource instead, so two groups may reference each other without
//! forming a cycle.

use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::resource::Value;

use crate::error::StackError;
use crate::scope::{Scope, declare};

pub const ANY_IPV4: &str = "0.0.0.0/0";

/// Source of inline ingress
#[derive(Debug, Clone, PartialEq)]
pub enum Peer {
    AnyIpv4,
    Cidr(String),
    SecurityGroupId(Value),
}

#[derive(Debug, Clone)]
pub struct SecurityGroup {
    pub id: String,
    pub path: ConstructPath,
}

impl SecurityGroup {
    pub fn new(
        scope: &mut Scope,
        path: ConstructPath,
        vpc: &str,
        allow_all_outbound: bool,
    ) -> Result<Self, StackError> {
        let egress = if allow_all_outbound {
            Value::map([
                ("CidrIp", Value::string(ANY_IPV4)),
                ("Description", Value::string("Allow all outbound traffic by default")),
                ("IpProtocol", Value::string("-1")),
            ])
        } else {
            // Placeholder rule that matches nothing
            Value::map([
                ("CidrIp", Value::string("255.255.255.255/32")),
                ("Description", Value::string("Disallow all traffic")),
                ("FromPort", Value::Int(252)),
                ("IpProtocol", Value::string("icmp")),
                ("ToPort", Value::Int(86)),
            ])
        };

        let group = declare(&path, "ec2.security_group")
            .with_attribute("group_description", scope.qualified(&path))
            .with_attribute("vpc_id", Value::ref_of(vpc))
            .with_attribute("security_group_egress", Value::List(vec![egress]));
        let id = scope.add(group);
        Ok(Self { id, path })
    }

    pub fn group_id(&self) -> Value {
        Value::attr_of(&self.id, "group_id")
    }

    /// Inline TCP ingress on `port`
    pub fn add_ingress_rule(
        &self,
        scope: &mut Scope,
        peer: Peer,
        port: i64,
        description: &str,
    ) -> Result<(), StackError> {
        let source = match peer {
            Peer::AnyIpv4 => ("CidrIp", Value::string(ANY_IPV4)),
            Peer::Cidr(cidr) => ("CidrIp", Value::string(cidr)),
            Peer::SecurityGroupId(id) => ("SourceSecurityGroupId", id),
        };
        let rule = Value::map([
            source,
            ("Description", Value::string(description)),
            ("FromPort", Value::Int(port)),
            ("IpProtocol", Value::string("tcp")),
            ("ToPort", Value::Int(port)),
        ]);
        scope.push_to_list(&self.id, "security_group_ingress", rule)
    }

    /// Standalone TCP ingress on `port` from another group construct
    pub fn allow_from(
        &self,
        scope: &mut Scope,
        source: &SecurityGroup,
        port: i64,
        description: &str,
    ) -> Result<String, StackError> {
        let path = self.path.child(format!("from {}:{}", source.id, port));
        let ingress = declare(&path, "ec2.security_group_ingress")
            .with_attribute("group_id", self.group_id())
            .with_attribute("ip_protocol", "tcp")
            .with_attribute("from_port", Value::Int(port))
            .with_attribute("to_port", Value::Int(port))
            .with_attribute("source_security_group_id", source.group_id())
            .with_attribute("description", description);
        Ok(scope.add(ingress))
    }
}
