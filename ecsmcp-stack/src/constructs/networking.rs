//! Networking - VPC with three subnet tiers across three AZs
//!
//! Every AZ gets a public subnet holding a NAT gateway, a private subnet
//! routed through that gateway, and an isolated subnet with no default route.
//! Flow logs for the whole VPC go to the access-log bucket.

use ecsmcp_aws::iam::PolicyStatement;
use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::resource::Value;

use crate::cidr;
use crate::config::DEFAULT_VPC_CIDR;
use crate::constructs::security_group::SecurityGroup;
use crate::constructs::storage::Storage;
use crate::error::StackError;
use crate::scope::{Scope, declare};

pub const AZ_COUNT: usize = 3;
pub const FLOW_LOG_PREFIX: &str = "vpc-logs";
const AZ_SUFFIXES: [&str; AZ_COUNT] = ["a", "b", "c"];
const DEFAULT_ROUTE: &str = "0.0.0.0/0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubnetTier {
    Public,
    PrivateWithEgress,
    PrivateIsolated,
}

impl SubnetTier {
    pub const ALL: [SubnetTier; 3] = [
        SubnetTier::Public,
        SubnetTier::PrivateWithEgress,
        SubnetTier::PrivateIsolated,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SubnetTier::Public => "PublicForNatGateway",
            SubnetTier::PrivateWithEgress => "PrivateWithEgress",
            SubnetTier::PrivateIsolated => "PrivateIsolatedSubnet",
        }
    }
}

#[derive(Debug, Default)]
pub struct NetworkingProps {
    pub cidr: Option<String>,
}

#[derive(Debug)]
pub struct Subnet {
    pub tier: SubnetTier,
    pub id: String,
    pub availability_zone: String,
    pub cidr: String,
    pub route_table: String,
    /// Default route, absent for isolated subnets
    pub default_route: Option<String>,
}

pub struct Networking {
    pub vpc: String,
    pub cidr: String,
    pub subnets: Vec<Subnet>,
    pub nat_gateways: Vec<String>,
    pub flow_log: String,
    pub ai_security_group: SecurityGroup,
}

impl Networking {
    pub fn new(
        scope: &mut Scope,
        path: &ConstructPath,
        props: NetworkingProps,
        storage: &mut Storage,
    ) -> Result<Self, StackError> {
        let vpc_cidr = props.cidr.unwrap_or_else(|| DEFAULT_VPC_CIDR.to_string());
        let blocks = cidr::split(&vpc_cidr, SubnetTier::ALL.len() * AZ_COUNT)?;

        let vpc_path = path.child("NewVpc");
        let vpc = scope.add(
            declare(&vpc_path, "ec2.vpc")
                .with_attribute("cidr_block", vpc_cidr.as_str())
                .with_attribute("enable_dns_hostnames", true)
                .with_attribute("enable_dns_support", true)
                .with_attribute("instance_tenancy", "default")
                .with_attribute("tags", name_tag(scope.qualified(&vpc_path))),
        );

        let igw = scope.add(
            declare(&vpc_path.child("IGW"), "ec2.internet_gateway")
                .with_attribute("tags", name_tag(scope.qualified(&vpc_path))),
        );
        let attachment = scope.add(
            declare(&vpc_path.child("VPCGW"), "ec2.vpc_gateway_attachment")
                .with_attribute("vpc_id", Value::ref_of(&vpc))
                .with_attribute("internet_gateway_id", Value::ref_of(&igw)),
        );

        let azs: Vec<String> = AZ_SUFFIXES
            .iter()
            .map(|suffix| format!("{}{}", scope.environment().region, suffix))
            .collect();

        let mut subnets = Vec::new();
        let mut nat_gateways = Vec::new();
        let mut blocks = blocks.into_iter();

        for tier in SubnetTier::ALL {
            for (index, az) in azs.iter().enumerate() {
                let Some(block) = blocks.next() else {
                    return Err(StackError::InvalidCidr {
                        cidr: vpc_cidr.clone(),
                        reason: "not enough subnet blocks".to_string(),
                    });
                };
                let subnet_path = vpc_path.child(format!("{}Subnet{}", tier.name(), index + 1));

                let subnet = scope.add(
                    declare(&subnet_path.child("Subnet"), "ec2.subnet")
                        .with_attribute("vpc_id", Value::ref_of(&vpc))
                        .with_attribute("cidr_block", block.as_str())
                        .with_attribute("availability_zone", az.as_str())
                        .with_attribute("map_public_ip_on_launch", tier == SubnetTier::Public)
                        .with_attribute("tags", name_tag(scope.qualified(&subnet_path))),
                );
                let route_table = scope.add(
                    declare(&subnet_path.child("RouteTable"), "ec2.route_table")
                        .with_attribute("vpc_id", Value::ref_of(&vpc)),
                );
                let association = scope.add(
                    declare(
                        &subnet_path.child("RouteTableAssociation"),
                        "ec2.subnet_route_table_association",
                    )
                    .with_attribute("subnet_id", Value::ref_of(&subnet))
                    .with_attribute("route_table_id", Value::ref_of(&route_table)),
                );

                let route = declare(&subnet_path.child("DefaultRoute"), "ec2.route")
                    .with_attribute("route_table_id", Value::ref_of(&route_table))
                    .with_attribute("destination_cidr_block", DEFAULT_ROUTE);

                let default_route = match tier {
                    SubnetTier::Public => {
                        let mut route = route.with_attribute("gateway_id", Value::ref_of(&igw));
                        route.add_dependency(&attachment);
                        let route = scope.add(route);

                        let eip = scope.add(
                            declare(&subnet_path.child("EIP"), "ec2.eip")
                                .with_attribute("domain", "vpc"),
                        );
                        let mut nat = declare(&subnet_path.child("NATGateway"), "ec2.nat_gateway")
                            .with_attribute("subnet_id", Value::ref_of(&subnet))
                            .with_attribute("allocation_id", Value::attr_of(&eip, "allocation_id"));
                        nat.add_dependency(&route);
                        nat.add_dependency(&association);
                        nat_gateways.push(scope.add(nat));
                        Some(route)
                    }
                    SubnetTier::PrivateWithEgress => {
                        let nat = nat_gateways.get(index).ok_or_else(|| {
                            StackError::UnknownResource(format!("NAT gateway for {}", az))
                        })?;
                        let route = route.with_attribute("nat_gateway_id", Value::ref_of(nat));
                        Some(scope.add(route))
                    }
                    SubnetTier::PrivateIsolated => None,
                };

                subnets.push(Subnet {
                    tier,
                    id: subnet,
                    availability_zone: az.clone(),
                    cidr: block,
                    route_table,
                    default_route,
                });
            }
        }

        let flow_log = add_flow_log(scope, &vpc_path, &vpc, storage)?;

        let ai_security_group = SecurityGroup::new(scope, path.child("AISG"), &vpc, true)?;

        log::info!("Networking: {} subnets in {}", subnets.len(), vpc_cidr);
        Ok(Self {
            vpc,
            cidr: vpc_cidr,
            subnets,
            nat_gateways,
            flow_log,
            ai_security_group,
        })
    }

    pub fn subnets_in(&self, tier: SubnetTier) -> impl Iterator<Item = &Subnet> {
        self.subnets.iter().filter(move |s| s.tier == tier)
    }

    /// References to the subnet IDs of a tier
    pub fn subnet_ids(&self, tier: SubnetTier) -> Value {
        Value::List(self.subnets_in(tier).map(|s| Value::ref_of(&s.id)).collect())
    }

    /// Default routes of the public subnets, for resources that need internet access
    pub fn public_routes(&self) -> Vec<&str> {
        self.subnets_in(SubnetTier::Public)
            .filter_map(|s| s.default_route.as_deref())
            .collect()
    }
}

fn name_tag(name: String) -> Value {
    Value::List(vec![Value::map([
        ("Key", Value::string("Name")),
        ("Value", Value::string(name)),
    ])])
}

/// Flow log to `<bucket>/vpc-logs` plus the bucket policy grants for log delivery
fn add_flow_log(
    scope: &mut Scope,
    vpc_path: &ConstructPath,
    vpc: &str,
    storage: &mut Storage,
) -> Result<String, StackError> {
    let delivery = Value::map([("Service", Value::string("delivery.logs.amazonaws.com"))]);
    let source_account = ("aws:SourceAccount", Value::pseudo("AccountId"));
    let source_arn = Value::Join(vec![
        Value::string("arn:"),
        Value::pseudo("Partition"),
        Value::string(":logs:"),
        Value::pseudo("Region"),
        Value::string(":"),
        Value::pseudo("AccountId"),
        Value::string(":*"),
    ]);

    storage.add_to_resource_policy(
        scope,
        PolicyStatement::allow()
            .with_sid("AWSLogDeliveryWrite")
            .with_principal(delivery.clone())
            .with_actions(["s3:PutObject"])
            .with_resources([Value::Join(vec![
                storage.bucket_arn(),
                Value::string(format!("/{}/AWSLogs/", FLOW_LOG_PREFIX)),
                Value::pseudo("AccountId"),
                Value::string("/*"),
            ])])
            .with_condition(Value::map([
                (
                    "StringEquals",
                    Value::map([
                        ("s3:x-amz-acl", Value::string("bucket-owner-full-control")),
                        source_account.clone(),
                    ]),
                ),
                ("ArnLike", Value::map([("aws:SourceArn", source_arn.clone())])),
            ])),
    )?;
    storage.add_to_resource_policy(
        scope,
        PolicyStatement::allow()
            .with_sid("AWSLogDeliveryCheck")
            .with_principal(delivery)
            .with_actions(["s3:GetBucketAcl", "s3:ListBucket"])
            .with_resources([storage.bucket_arn()])
            .with_condition(Value::map([
                ("StringEquals", Value::map([source_account])),
                ("ArnLike", Value::map([("aws:SourceArn", source_arn)])),
            ])),
    )?;

    let mut flow_log = declare(&vpc_path.child("accessLogs").child("FlowLog"), "ec2.flow_log")
        .with_attribute("resource_id", Value::ref_of(vpc))
        .with_attribute("resource_type", "VPC")
        .with_attribute("traffic_type", "ALL")
        .with_attribute("log_destination_type", "s3")
        .with_attribute(
            "log_destination",
            Value::Join(vec![
                storage.bucket_arn(),
                Value::string(format!("/{}", FLOW_LOG_PREFIX)),
            ]),
        );
    // Delivery checks the bucket policy when the flow log is created
    flow_log.add_dependency(&storage.policy);
    Ok(scope.add(flow_log))
}
