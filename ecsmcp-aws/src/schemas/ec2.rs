//! EC2 networking schema definitions

use std::collections::HashMap;

use ecsmcp_core::resource::Value;
use ecsmcp_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types as core_types};

use super::AwsSchemaConfig;
use super::types;

fn id_attr(name: &str, provider_name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
        .computed()
        .with_provider_name(provider_name)
}

fn tags_attr() -> AttributeSchema {
    AttributeSchema::new("tags", types::tags()).with_provider_name("Tags")
}

/// ec2.vpc (AWS::EC2::VPC)
pub fn vpc_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::VPC",
        ResourceSchema::new("ec2.vpc")
            .with_description("A virtual private cloud")
            .attribute(
                AttributeSchema::new("cidr_block", core_types::cidr())
                    .required()
                    .with_description("The IPv4 network range for the VPC, in CIDR notation")
                    .with_provider_name("CidrBlock"),
            )
            .attribute(
                AttributeSchema::new("enable_dns_hostnames", AttributeType::Bool)
                    .with_provider_name("EnableDnsHostnames"),
            )
            .attribute(
                AttributeSchema::new("enable_dns_support", AttributeType::Bool)
                    .with_provider_name("EnableDnsSupport"),
            )
            .attribute(
                AttributeSchema::new(
                    "instance_tenancy",
                    AttributeType::Enum(&["default", "dedicated"]),
                )
                .with_provider_name("InstanceTenancy"),
            )
            .attribute(tags_attr())
            .attribute(id_attr("vpc_id", "VpcId")),
    )
}

/// ec2.subnet (AWS::EC2::Subnet)
pub fn subnet_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::Subnet",
        ResourceSchema::new("ec2.subnet")
            .attribute(
                AttributeSchema::new("vpc_id", AttributeType::String)
                    .required()
                    .with_provider_name("VpcId"),
            )
            .attribute(
                AttributeSchema::new("cidr_block", core_types::cidr())
                    .required()
                    .with_provider_name("CidrBlock"),
            )
            .attribute(
                AttributeSchema::new("availability_zone", AttributeType::String)
                    .required()
                    .with_provider_name("AvailabilityZone"),
            )
            .attribute(
                AttributeSchema::new("map_public_ip_on_launch", AttributeType::Bool)
                    .with_provider_name("MapPublicIpOnLaunch"),
            )
            .attribute(tags_attr())
            .attribute(id_attr("subnet_id", "SubnetId")),
    )
}

/// ec2.route_table (AWS::EC2::RouteTable)
pub fn route_table_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::RouteTable",
        ResourceSchema::new("ec2.route_table")
            .attribute(
                AttributeSchema::new("vpc_id", AttributeType::String)
                    .required()
                    .with_provider_name("VpcId"),
            )
            .attribute(tags_attr())
            .attribute(id_attr("route_table_id", "RouteTableId")),
    )
}

/// ec2.subnet_route_table_association (AWS::EC2::SubnetRouteTableAssociation)
pub fn subnet_route_table_association_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::SubnetRouteTableAssociation",
        ResourceSchema::new("ec2.subnet_route_table_association")
            .attribute(
                AttributeSchema::new("subnet_id", AttributeType::String)
                    .required()
                    .with_provider_name("SubnetId"),
            )
            .attribute(
                AttributeSchema::new("route_table_id", AttributeType::String)
                    .required()
                    .with_provider_name("RouteTableId"),
            ),
    )
}

/// ec2.route (AWS::EC2::Route)
pub fn route_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::Route",
        ResourceSchema::new("ec2.route")
            .attribute(
                AttributeSchema::new("route_table_id", AttributeType::String)
                    .required()
                    .with_provider_name("RouteTableId"),
            )
            .attribute(
                AttributeSchema::new("destination_cidr_block", core_types::cidr())
                    .required()
                    .with_provider_name("DestinationCidrBlock"),
            )
            .attribute(
                AttributeSchema::new("gateway_id", AttributeType::String)
                    .with_provider_name("GatewayId"),
            )
            .attribute(
                AttributeSchema::new("nat_gateway_id", AttributeType::String)
                    .with_provider_name("NatGatewayId"),
            ),
    )
    .with_check(route_has_single_target)
}

fn route_has_single_target(attributes: &HashMap<String, Value>) -> Result<(), String> {
    match (
        attributes.contains_key("gateway_id"),
        attributes.contains_key("nat_gateway_id"),
    ) {
        (true, false) | (false, true) => Ok(()),
        (false, false) => Err("Route needs a gateway_id or a nat_gateway_id".to_string()),
        (true, true) => Err("Route cannot have both gateway_id and nat_gateway_id".to_string()),
    }
}

/// ec2.internet_gateway (AWS::EC2::InternetGateway)
pub fn internet_gateway_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::InternetGateway",
        ResourceSchema::new("ec2.internet_gateway")
            .attribute(tags_attr())
            .attribute(id_attr("internet_gateway_id", "InternetGatewayId")),
    )
}

/// ec2.vpc_gateway_attachment (AWS::EC2::VPCGatewayAttachment)
pub fn vpc_gateway_attachment_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::VPCGatewayAttachment",
        ResourceSchema::new("ec2.vpc_gateway_attachment")
            .attribute(
                AttributeSchema::new("vpc_id", AttributeType::String)
                    .required()
                    .with_provider_name("VpcId"),
            )
            .attribute(
                AttributeSchema::new("internet_gateway_id", AttributeType::String)
                    .required()
                    .with_provider_name("InternetGatewayId"),
            ),
    )
}

/// ec2.eip (AWS::EC2::EIP)
pub fn eip_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::EIP",
        ResourceSchema::new("ec2.eip")
            .attribute(
                AttributeSchema::new("domain", AttributeType::Enum(&["vpc"]))
                    .with_provider_name("Domain"),
            )
            .attribute(tags_attr())
            .attribute(id_attr("allocation_id", "AllocationId"))
            .attribute(id_attr("public_ip", "PublicIp")),
    )
}

/// ec2.nat_gateway (AWS::EC2::NatGateway)
pub fn nat_gateway_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::NatGateway",
        ResourceSchema::new("ec2.nat_gateway")
            .attribute(
                AttributeSchema::new("subnet_id", AttributeType::String)
                    .required()
                    .with_provider_name("SubnetId"),
            )
            .attribute(
                AttributeSchema::new("allocation_id", AttributeType::String)
                    .required()
                    .with_provider_name("AllocationId"),
            )
            .attribute(tags_attr())
            .attribute(id_attr("nat_gateway_id", "NatGatewayId")),
    )
}

/// ec2.flow_log (AWS::EC2::FlowLog)
pub fn flow_log_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::FlowLog",
        ResourceSchema::new("ec2.flow_log")
            .attribute(
                AttributeSchema::new("resource_id", AttributeType::String)
                    .required()
                    .with_provider_name("ResourceId"),
            )
            .attribute(
                AttributeSchema::new(
                    "resource_type",
                    AttributeType::Enum(&[
                        "VPC",
                        "Subnet",
                        "NetworkInterface",
                    ]),
                )
                .required()
                .with_provider_name("ResourceType"),
            )
            .attribute(
                AttributeSchema::new(
                    "traffic_type",
                    AttributeType::Enum(&[
                        "ACCEPT",
                        "REJECT",
                        "ALL",
                    ]),
                )
                .with_provider_name("TrafficType"),
            )
            .attribute(
                AttributeSchema::new(
                    "log_destination_type",
                    AttributeType::Enum(&["s3", "cloud-watch-logs"]),
                )
                .with_provider_name("LogDestinationType"),
            )
            .attribute(
                AttributeSchema::new("log_destination", AttributeType::String)
                    .with_provider_name("LogDestination"),
            )
            .attribute(tags_attr()),
    )
}

/// ec2.security_group (AWS::EC2::SecurityGroup)
pub fn security_group_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::SecurityGroup",
        ResourceSchema::new("ec2.security_group")
            .with_description("A security group with inline rules")
            .attribute(
                AttributeSchema::new("group_description", AttributeType::String)
                    .required()
                    .with_provider_name("GroupDescription"),
            )
            .attribute(
                AttributeSchema::new("vpc_id", AttributeType::String)
                    .required()
                    .with_provider_name("VpcId"),
            )
            .attribute(
                AttributeSchema::new("security_group_ingress", types::objects())
                    .with_description("Inline ingress rules (CidrIp / SourceSecurityGroupId)")
                    .with_provider_name("SecurityGroupIngress"),
            )
            .attribute(
                AttributeSchema::new("security_group_egress", types::objects())
                    .with_provider_name("SecurityGroupEgress"),
            )
            .attribute(tags_attr())
            .attribute(id_attr("group_id", "GroupId")),
    )
}

/// ec2.security_group_ingress (AWS::EC2::SecurityGroupIngress)
pub fn security_group_ingress_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::EC2::SecurityGroupIngress",
        ResourceSchema::new("ec2.security_group_ingress")
            .with_description("A standalone ingress rule between two groups")
            .attribute(
                AttributeSchema::new("group_id", AttributeType::String)
                    .required()
                    .with_provider_name("GroupId"),
            )
            .attribute(
                AttributeSchema::new("ip_protocol", types::ip_protocol())
                    .required()
                    .with_provider_name("IpProtocol"),
            )
            .attribute(
                AttributeSchema::new("from_port", core_types::port_number())
                    .with_provider_name("FromPort"),
            )
            .attribute(
                AttributeSchema::new("to_port", core_types::port_number())
                    .with_provider_name("ToPort"),
            )
            .attribute(
                AttributeSchema::new("source_security_group_id", AttributeType::String)
                    .with_provider_name("SourceSecurityGroupId"),
            )
            .attribute(
                AttributeSchema::new("cidr_ip", core_types::cidr()).with_provider_name("CidrIp"),
            )
            .attribute(
                AttributeSchema::new("description", AttributeType::String)
                    .with_provider_name("Description"),
            ),
    )
    .with_check(ingress_has_single_source)
}

fn ingress_has_single_source(attributes: &HashMap<String, Value>) -> Result<(), String> {
    let sources = ["source_security_group_id", "cidr_ip"]
        .iter()
        .filter(|k| attributes.contains_key(**k))
        .count();
    if sources == 1 {
        Ok(())
    } else {
        Err("Ingress rule needs exactly one of source_security_group_id or cidr_ip".to_string())
    }
}

pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![
        vpc_config(),
        subnet_config(),
        route_table_config(),
        subnet_route_table_association_config(),
        route_config(),
        internet_gateway_config(),
        vpc_gateway_attachment_config(),
        eip_config(),
        nat_gateway_config(),
        flow_log_config(),
        security_group_config(),
        security_group_ingress_config(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecsmcp_core::resource::Resource;

    #[test]
    fn vpc_rejects_malformed_cidr() {
        let vpc = Resource::new("ec2.vpc", "Vpc").with_attribute("cidr_block", "192.168.0.0/33");
        assert!(vpc_config().validate(&vpc).is_err());
    }

    #[test]
    fn subnet_accepts_reference_to_vpc() {
        let subnet = Resource::new("ec2.subnet", "Subnet")
            .with_attribute("vpc_id", Value::ref_of("Vpc"))
            .with_attribute("cidr_block", "192.168.0.0/20")
            .with_attribute("availability_zone", "ap-northeast-1a");
        assert!(subnet_config().validate(&subnet).is_ok());
    }

    #[test]
    fn route_needs_exactly_one_target() {
        let route = Resource::new("ec2.route", "Default")
            .with_attribute("route_table_id", Value::ref_of("Rt"))
            .with_attribute("destination_cidr_block", "0.0.0.0/0");
        assert!(route_config().validate(&route).is_err());

        let route = route.with_attribute("nat_gateway_id", Value::ref_of("Nat"));
        assert!(route_config().validate(&route).is_ok());
    }

    #[test]
    fn ingress_needs_one_source() {
        let ingress = Resource::new("ec2.security_group_ingress", "In")
            .with_attribute("group_id", Value::attr_of("Sg", "group_id"))
            .with_attribute("ip_protocol", "tcp")
            .with_attribute("from_port", 8000i64)
            .with_attribute("to_port", 8000i64);
        assert!(security_group_ingress_config().validate(&ingress).is_err());

        let ingress =
            ingress.with_attribute("source_security_group_id", Value::attr_of("Other", "group_id"));
        assert!(security_group_ingress_config().validate(&ingress).is_ok());
    }
}
