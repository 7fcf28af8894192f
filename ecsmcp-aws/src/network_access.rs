//! Network access - Static reachability over security group ingress
//!
//! Ingress is gathered from the inline `security_group_ingress` of each
//! `ec2.security_group` and from standalone `ec2.security_group_ingress`
//! resources. Security groups are identified by logical ID.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use ecsmcp_core::resource::{Resource, Value};

const ALL_PROTOCOLS: &str = "-1";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Peer {
    Cidr(String),
    SecurityGroup(String),
}

impl Peer {
    pub fn is_world(&self) -> bool {
        matches!(self, Peer::Cidr(c) if c == "0.0.0.0/0" || c == "::/0")
    }
}

/// Who is connecting, for [`NetworkAccess::admits`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Address(Ipv4Addr),
    /// Traffic from members of a security group
    Group(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    /// Security group the rule belongs to
    pub group: String,
    pub peer: Peer,
    pub protocol: String,
    pub from_port: i64,
    pub to_port: i64,
    /// Logical ID of the resource that declared the rule
    pub declared_by: String,
}

impl IngressRule {
    pub fn covers_port(&self, protocol: &str, port: i64) -> bool {
        self.protocol == ALL_PROTOCOLS
            || (self.protocol == protocol && self.from_port <= port && port <= self.to_port)
    }

    fn admits_source(&self, source: &Source) -> bool {
        match (&self.peer, source) {
            (Peer::SecurityGroup(group), Source::Group(from)) => group == from,
            (Peer::Cidr(cidr), Source::Address(addr)) => cidr_contains(cidr, *addr),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkAccess {
    groups: Vec<String>,
    rules: Vec<IngressRule>,
}

impl NetworkAccess {
    pub fn from_resources(resources: &[Resource]) -> Self {
        let mut access = Self::default();

        for resource in resources {
            match resource.id.resource_type.as_str() {
                "ec2.security_group" => {
                    let group = resource.logical_id().to_string();
                    for rule in resource
                        .get("security_group_ingress")
                        .and_then(Value::as_list)
                        .unwrap_or_default()
                        .iter()
                        .filter_map(Value::as_map)
                    {
                        if let Some(parsed) = parse_rule(&group, resource.logical_id(), rule) {
                            access.rules.push(parsed);
                        }
                    }
                    access.groups.push(group);
                }
                "ec2.security_group_ingress" => {
                    let Some(group) = resource.get("group_id").and_then(group_of) else {
                        log::warn!("{} has no resolvable group_id, skipped", resource.id);
                        continue;
                    };
                    let fields: HashMap<String, Value> = [
                        ("IpProtocol", "ip_protocol"),
                        ("FromPort", "from_port"),
                        ("ToPort", "to_port"),
                        ("CidrIp", "cidr_ip"),
                        ("SourceSecurityGroupId", "source_security_group_id"),
                    ]
                    .into_iter()
                    .filter_map(|(key, attr)| resource.get(attr).map(|v| (key.to_string(), v.clone())))
                    .collect();
                    if let Some(parsed) = parse_rule(&group, resource.logical_id(), &fields) {
                        access.rules.push(parsed);
                    }
                }
                _ => {}
            }
        }
        access
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn rules(&self) -> &[IngressRule] {
        &self.rules
    }

    pub fn ingress_of(&self, group: &str) -> Vec<&IngressRule> {
        self.rules.iter().filter(|r| r.group == group).collect()
    }

    /// Whether `group` admits TCP traffic from `source` on `port`
    pub fn admits(&self, group: &str, source: &Source, port: i64) -> bool {
        self.ingress_of(group)
            .into_iter()
            .any(|r| r.covers_port("tcp", port) && r.admits_source(source))
    }

    /// Rules open to `0.0.0.0/0` or `::/0`
    pub fn open_to_world(&self) -> Vec<&IngressRule> {
        self.rules.iter().filter(|r| r.peer.is_world()).collect()
    }
}

/// Logical ID of the security group a value points at
fn group_of(value: &Value) -> Option<String> {
    match value {
        Value::ResourceRef(target, _) => Some(target.clone()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn parse_rule(group: &str, declared_by: &str, rule: &HashMap<String, Value>) -> Option<IngressRule> {
    let peer = if let Some(source) = rule.get("SourceSecurityGroupId").and_then(group_of) {
        Peer::SecurityGroup(source)
    } else if let Some(cidr) = rule
        .get("CidrIp")
        .or_else(|| rule.get("CidrIpv6"))
        .and_then(Value::as_str)
    {
        Peer::Cidr(cidr.to_string())
    } else {
        log::warn!("ingress rule on {} has no peer, skipped", group);
        return None;
    };

    let protocol = rule
        .get("IpProtocol")
        .and_then(Value::as_str)
        .unwrap_or(ALL_PROTOCOLS)
        .to_string();
    let from_port = rule.get("FromPort").and_then(Value::as_int).unwrap_or(-1);
    let to_port = rule.get("ToPort").and_then(Value::as_int).unwrap_or(from_port);

    Some(IngressRule {
        group: group.to_string(),
        peer,
        protocol,
        from_port,
        to_port,
        declared_by: declared_by.to_string(),
    })
}

fn cidr_contains(cidr: &str, addr: Ipv4Addr) -> bool {
    let Some((network, prefix)) = cidr.split_once('/') else {
        return false;
    };
    let (Ok(network), Ok(prefix)) = (network.parse::<Ipv4Addr>(), prefix.parse::<u32>()) else {
        return false;
    };
    if prefix > 32 {
        return false;
    }
    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    (u32::from(network) & mask) == (u32::from(addr) & mask)
}
