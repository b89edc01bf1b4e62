//! Segmented VPC descriptor
//!
//! Three subnet tiers, each replicated across the requested number of
//! availability zones:
//!
//! - **public**: internet-facing (NAT gateways, load balancers)
//! - **private**: application compute, egress through NAT when available
//! - **isolated**: data and functions, no internet path at all

use crate::descriptor::Descriptor;
use crate::error::{AwsError, Result};
use opsflow_cloud::{OutputValue, ResourceConfig};
use serde_json::json;
use std::net::Ipv4Addr;

const VPC_CIDR: (Ipv4Addr, u8) = (Ipv4Addr::new(10, 0, 0, 0), 16);
const SUBNET_MASK: u8 = 24;
const ZONE_SUFFIXES: &str = "abcdefghijklmnopqrstuvwxyz";

/// Internet reachability class of a subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubnetTier {
    Public,
    PrivateWithEgress,
    Isolated,
}

impl std::fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubnetTier::Public => write!(f, "public"),
            SubnetTier::PrivateWithEgress => write!(f, "private-with-egress"),
            SubnetTier::Isolated => write!(f, "isolated"),
        }
    }
}

/// One tier of the layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetConfiguration {
    pub name: String,
    pub tier: SubnetTier,
    pub cidr_mask: u8,
}

impl SubnetConfiguration {
    fn new(name: &str, tier: SubnetTier) -> Self {
        Self {
            name: name.to_string(),
            tier,
            cidr_mask: SUBNET_MASK,
        }
    }
}

/// The fixed public / private / isolated layout
pub fn default_subnet_configuration() -> Vec<SubnetConfiguration> {
    vec![
        SubnetConfiguration::new("public", SubnetTier::Public),
        SubnetConfiguration::new("private", SubnetTier::PrivateWithEgress),
        SubnetConfiguration::new("isolated", SubnetTier::Isolated),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub logical_id: String,
    pub name: String,
    pub tier: SubnetTier,
    pub availability_zone: String,
    pub cidr: String,
    /// Where the default route goes: internet gateway, NAT gateway, or nowhere
    pub default_route: Option<DefaultRoute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultRoute {
    InternetGateway,
    NatGateway(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatGateway {
    pub logical_id: String,
    /// Public subnet hosting the gateway
    pub subnet_logical_id: String,
    pub availability_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDescriptor {
    pub logical_id: String,
    pub vpc_name: String,
    pub cidr: String,
    pub availability_zones: Vec<String>,
    pub subnet_configuration: Vec<SubnetConfiguration>,
    pub subnets: Vec<Subnet>,
    pub nat_gateways: Vec<NatGateway>,
}

impl NetworkDescriptor {
    pub fn subnets_in(&self, tier: SubnetTier) -> impl Iterator<Item = &Subnet> {
        self.subnets.iter().filter(move |s| s.tier == tier)
    }

    fn internet_gateway_id(&self) -> String {
        format!("{}IGW", self.logical_id)
    }

    fn gateway_attachment_id(&self) -> String {
        format!("{}VPCGW", self.logical_id)
    }
}

/// Sequential, aligned carving of fixed-size blocks out of a CIDR range
struct CidrAllocator {
    next: u64,
    end: u64,
}

impl CidrAllocator {
    fn new(base: Ipv4Addr, prefix: u8) -> Self {
        let base = u32::from(base) as u64;
        Self {
            next: base,
            end: base + (1u64 << (32 - prefix)),
        }
    }

    fn allocate(&mut self, mask: u8) -> Option<String> {
        let size = 1u64 << (32 - mask);
        let start = self.next.div_ceil(size) * size;
        if start + size > self.end {
            return None;
        }
        self.next = start + size;
        Some(format!("{}/{}", Ipv4Addr::from(start as u32), mask))
    }
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lay out the VPC
///
/// `nat_gateway_count` of zero is valid: private subnets then have no
/// outbound path. Counts above `max_zones` are capped, one gateway per zone.
pub fn build_network(
    vpc_name: &str,
    region: &str,
    max_zones: u32,
    nat_gateway_count: u32,
) -> Result<NetworkDescriptor> {
    if max_zones == 0 || max_zones as usize > ZONE_SUFFIXES.len() {
        return Err(AwsError::InvalidNetwork(format!(
            "max_zones must be between 1 and {}, got {}",
            ZONE_SUFFIXES.len(),
            max_zones
        )));
    }

    let logical_id = "MainVpc".to_string();
    let availability_zones: Vec<String> = ZONE_SUFFIXES
        .chars()
        .take(max_zones as usize)
        .map(|suffix| format!("{}{}", region, suffix))
        .collect();

    let nat_count = nat_gateway_count.min(max_zones) as usize;
    if nat_gateway_count > max_zones {
        tracing::warn!(
            "{} NAT gateways requested for {} zones; creating {}",
            nat_gateway_count,
            max_zones,
            nat_count
        );
    }
    if nat_count == 0 {
        tracing::warn!("No NAT gateways: private subnets in {} have no egress", vpc_name);
    }

    let subnet_configuration = default_subnet_configuration();
    let (base, prefix) = VPC_CIDR;
    let mut allocator = CidrAllocator::new(base, prefix);

    let mut subnets = Vec::new();
    let mut nat_gateways = Vec::new();
    for config in &subnet_configuration {
        for (index, zone) in availability_zones.iter().enumerate() {
            let subnet_id = format!("{}{}Subnet{}", logical_id, title_case(&config.name), index + 1);
            let cidr = allocator.allocate(config.cidr_mask).ok_or_else(|| {
                AwsError::InvalidNetwork(format!(
                    "{}/{} has no room for subnet {}",
                    base, prefix, subnet_id
                ))
            })?;

            let default_route = match config.tier {
                SubnetTier::Public => {
                    if index < nat_count {
                        nat_gateways.push(NatGateway {
                            logical_id: format!("{}NATGateway", subnet_id),
                            subnet_logical_id: subnet_id.clone(),
                            availability_zone: zone.clone(),
                        });
                    }
                    Some(DefaultRoute::InternetGateway)
                }
                SubnetTier::PrivateWithEgress if nat_count > 0 => Some(DefaultRoute::NatGateway(
                    nat_gateways[index % nat_count].logical_id.clone(),
                )),
                SubnetTier::PrivateWithEgress | SubnetTier::Isolated => None,
            };

            subnets.push(Subnet {
                logical_id: subnet_id,
                name: config.name.clone(),
                tier: config.tier,
                availability_zone: zone.clone(),
                cidr,
                default_route,
            });
        }
    }

    tracing::debug!(
        "{}: {} subnets across {} zones, {} NAT gateways",
        vpc_name,
        subnets.len(),
        availability_zones.len(),
        nat_gateways.len()
    );

    Ok(NetworkDescriptor {
        logical_id,
        vpc_name: vpc_name.to_string(),
        cidr: format!("{}/{}", base, prefix),
        availability_zones,
        subnet_configuration,
        subnets,
        nat_gateways,
    })
}

impl Descriptor for NetworkDescriptor {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn to_resources(&self) -> Vec<ResourceConfig> {
        let vpc_ref = OutputValue::reference(&self.logical_id).to_json();
        let igw_id = self.internet_gateway_id();
        let attachment_id = self.gateway_attachment_id();

        let mut resources = vec![
            ResourceConfig::new(
                "AWS::EC2::VPC",
                &self.logical_id,
                json!({
                    "CidrBlock": self.cidr,
                    "EnableDnsHostnames": true,
                    "EnableDnsSupport": true,
                }),
            )
            .with_tag("Name", &self.vpc_name),
            ResourceConfig::new("AWS::EC2::InternetGateway", &igw_id, json!({}))
                .with_tag("Name", &self.vpc_name),
            ResourceConfig::new(
                "AWS::EC2::VPCGatewayAttachment",
                &attachment_id,
                json!({
                    "VpcId": vpc_ref,
                    "InternetGatewayId": OutputValue::reference(&igw_id).to_json(),
                }),
            )
            .untaggable(),
        ];

        for subnet in &self.subnets {
            let route_table_id = format!("{}RouteTable", subnet.logical_id);
            let subnet_ref = OutputValue::reference(&subnet.logical_id).to_json();
            let name = format!("{}/{}", self.vpc_name, subnet.logical_id);

            resources.push(
                ResourceConfig::new(
                    "AWS::EC2::Subnet",
                    &subnet.logical_id,
                    json!({
                        "VpcId": vpc_ref,
                        "AvailabilityZone": subnet.availability_zone,
                        "CidrBlock": subnet.cidr,
                        "MapPublicIpOnLaunch": subnet.tier == SubnetTier::Public,
                    }),
                )
                .with_tag("Name", &name)
                .with_tag("opsflow:subnet-name", &subnet.name)
                .with_tag("opsflow:subnet-tier", subnet.tier.to_string()),
            );
            resources.push(
                ResourceConfig::new(
                    "AWS::EC2::RouteTable",
                    &route_table_id,
                    json!({ "VpcId": vpc_ref }),
                )
                .with_tag("Name", &name),
            );
            resources.push(
                ResourceConfig::new(
                    "AWS::EC2::SubnetRouteTableAssociation",
                    format!("{}RouteTableAssociation", subnet.logical_id),
                    json!({
                        "RouteTableId": OutputValue::reference(&route_table_id).to_json(),
                        "SubnetId": subnet_ref,
                    }),
                )
                .untaggable(),
            );

            let route = match &subnet.default_route {
                Some(DefaultRoute::InternetGateway) => Some(
                    ResourceConfig::new(
                        "AWS::EC2::Route",
                        format!("{}DefaultRoute", subnet.logical_id),
                        json!({
                            "RouteTableId": OutputValue::reference(&route_table_id).to_json(),
                            "DestinationCidrBlock": "0.0.0.0/0",
                            "GatewayId": OutputValue::reference(&igw_id).to_json(),
                        }),
                    )
                    .depends_on(&attachment_id),
                ),
                Some(DefaultRoute::NatGateway(nat_id)) => Some(ResourceConfig::new(
                    "AWS::EC2::Route",
                    format!("{}DefaultRoute", subnet.logical_id),
                    json!({
                        "RouteTableId": OutputValue::reference(&route_table_id).to_json(),
                        "DestinationCidrBlock": "0.0.0.0/0",
                        "NatGatewayId": OutputValue::reference(nat_id).to_json(),
                    }),
                )),
                None => None,
            };
            if let Some(route) = route {
                resources.push(route.untaggable());
            }
        }

        for nat in &self.nat_gateways {
            let eip_id = format!("{}EIP", nat.subnet_logical_id);
            resources.push(
                ResourceConfig::new("AWS::EC2::EIP", &eip_id, json!({ "Domain": "vpc" }))
                    .with_tag("Name", format!("{}/{}", self.vpc_name, nat.subnet_logical_id)),
            );
            resources.push(
                ResourceConfig::new(
                    "AWS::EC2::NatGateway",
                    &nat.logical_id,
                    json!({
                        "SubnetId": OutputValue::reference(&nat.subnet_logical_id).to_json(),
                        "AllocationId": OutputValue::attribute(&eip_id, "AllocationId").to_json(),
                    }),
                )
                .with_tag("Name", format!("{}/{}", self.vpc_name, nat.subnet_logical_id))
                .depends_on(&attachment_id),
            );
        }

        resources
    }
}
