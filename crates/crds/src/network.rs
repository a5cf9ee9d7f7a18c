//! Network spec and status records shared by `UCloudCluster`.
//!
//! Spec records describe what the operator asked for. Status records hold the
//! resolved provider identifiers; a non-empty identifier means the resource
//! exists and must not be created again.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declared network layout of a cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkSpec {
    /// VPC to create or adopt
    pub vpc: VpcSpec,
    /// Subnet to create or adopt inside the VPC
    pub subnet: SubnetSpec,
    /// NAT gateway and its elastic IP
    pub nat: NatSpec,
    /// API server load balancer and its elastic IP
    pub ulb: UlbSpec,
    /// Firewall attached to the NAT gateway
    pub firewall: FirewallSpec,
}

/// VPC declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VpcSpec {
    /// Pre-existing VPC id. A VPC supplied here is never deleted.
    pub vpc_id: String,
    /// VPC name (generated from the cluster name when empty)
    pub vpc_name: String,
    /// VPC CIDR (defaults to 10.0.0.0/8)
    pub cidr_block: String,
}

/// Subnet declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SubnetSpec {
    /// Pre-existing subnet id
    pub subnet_id: String,
    /// Subnet name (generated from the cluster name when empty)
    pub subnet_name: String,
    /// Subnet CIDR (defaults to 10.0.0.0/16)
    pub cidr_block: String,
}

/// NAT gateway declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NatSpec {
    /// Gateway identity
    pub nat_gateway: NatGatewaySpec,
    /// Elastic IP allocated for the gateway
    pub eip: EipSpec,
}

/// NAT gateway identity
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NatGatewaySpec {
    /// Pre-existing gateway id
    pub nat_gateway_id: String,
    /// Gateway name (generated from the cluster name when empty)
    pub name: String,
}

/// Elastic IP declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EipSpec {
    /// Elastic IP name
    pub eip_name: String,
    /// Bandwidth in Mbps (defaults to 10)
    pub bandwidth: i32,
}

/// Load balancer declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UlbSpec {
    /// Pre-existing load balancer id
    pub load_balancer_id: String,
    /// Load balancer name (generated from the cluster name when empty)
    pub load_balancer_name: String,
    /// VServer name (defaults to `k8s-api-server`)
    pub vserver_name: String,
    /// Elastic IP bound to the load balancer
    pub eip: EipSpec,
}

/// Firewall selection. Firewalls are looked up, never created.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FirewallSpec {
    /// Firewall id; the first firewall of the project is used when empty
    pub firewall_id: String,
}

/// Resolved network state of a cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkStatus {
    /// Resolved VPC
    pub vpc: VpcStatus,
    /// Resolved subnet
    pub subnet: SubnetStatus,
    /// Resolved NAT gateway
    pub nat: NatStatus,
    /// Resolved load balancer
    pub ulb: UlbStatus,
    /// Resolved firewall
    pub firewall: FirewallStatus,
}

/// Resolved VPC
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VpcStatus {
    /// Provider id
    pub vpc_id: String,
    /// Resolved name
    pub vpc_name: String,
    /// First network of the VPC
    pub cidr_block: String,
}

/// Resolved subnet
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SubnetStatus {
    /// Provider id
    pub subnet_id: String,
    /// Resolved name
    pub subnet_name: String,
    /// Subnet CIDR
    pub cidr_block: String,
    /// Owning VPC
    pub vpc_id: String,
}

/// Resolved NAT gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NatStatus {
    /// Provider id
    pub nat_gateway_id: String,
    /// Resolved name
    pub name: String,
    /// Owning VPC
    pub vpc_id: String,
    /// Firewall the gateway was created with
    pub firewall: FirewallStatus,
    /// Elastic IP the gateway was created with
    pub eip: EipStatus,
}

/// Resolved elastic IP
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EipStatus {
    /// Provider id
    pub eip_id: String,
    /// Public address
    pub eip_addr: String,
    /// Resolved name
    pub eip_name: String,
    /// Bandwidth in Mbps
    pub bandwidth: i32,
}

/// Resolved load balancer
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UlbStatus {
    /// Provider id
    pub load_balancer_id: String,
    /// Resolved name
    pub load_balancer_name: String,
    /// Owning VPC
    pub vpc_id: String,
    /// API server VServer
    pub vserver_id: String,
    /// Elastic IP bound to the load balancer
    pub eip: EipStatus,
}

/// Resolved firewall
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FirewallStatus {
    /// Provider id
    pub firewall_id: String,
    /// Firewall name
    pub firewall_name: String,
    /// Firewall type reported by the provider
    pub firewall_type: String,
}
