//! UCloud API models
//!
//! Response records mirror the PascalCase JSON the API returns; only the fields
//! the controller reads are modelled. Request records carry the parameters of
//! the create calls and are flattened into form parameters by the client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Region and project every call is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestContext {
    /// Region, e.g. `cn-bj2`
    pub region: String,
    /// Project id
    pub project_id: String,
}

impl RequestContext {
    /// Create a request context
    pub fn new(region: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            project_id: project_id.into(),
        }
    }
}

/// API key pair
///
/// Serializes as `{"PublicKey":..,"PrivateKey":..}`, the shape instances
/// expect in their bootstrap payload.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credential {
    /// Public key, sent with every request
    pub public_key: String,
    /// Private key, used only to sign
    pub private_key: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Filter shared by the describe calls
///
/// Unset fields are not sent. Not every describe call honours every field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    /// Business group tag
    pub tag: Option<String>,
    /// Explicit resource ids
    pub ids: Vec<String>,
    /// Owning VPC
    pub vpc_id: Option<String>,
    /// Owning subnet
    pub subnet_id: Option<String>,
    /// Zone
    pub zone: Option<String>,
}

impl ResourceFilter {
    /// Filter by business group tag
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Default::default()
        }
    }

    /// Restrict to one id when `id` is non-empty
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        if !id.is_empty() {
            self.ids.push(id.to_string());
        }
        self
    }

    /// Restrict to a VPC
    #[must_use]
    pub fn in_vpc(mut self, vpc_id: &str) -> Self {
        self.vpc_id = Some(vpc_id.to_string());
        self
    }

    /// Restrict to a subnet
    #[must_use]
    pub fn in_subnet(mut self, subnet_id: &str) -> Self {
        self.subnet_id = Some(subnet_id.to_string());
        self
    }

    /// Restrict to a zone when `zone` is non-empty
    #[must_use]
    pub fn in_zone(mut self, zone: &str) -> Self {
        if !zone.is_empty() {
            self.zone = Some(zone.to_string());
        }
        self
    }
}

/// VPC
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Vpc {
    #[serde(rename = "VPCId")]
    pub vpc_id: String,
    pub name: String,
    pub network: Vec<String>,
    pub tag: String,
}

/// Subnet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Subnet {
    pub subnet_id: String,
    pub subnet_name: String,
    #[serde(rename = "VPCId")]
    pub vpc_id: String,
    /// Network address
    pub subnet: String,
    /// Prefix length, returned as a string
    pub netmask: String,
    pub tag: String,
}

impl Subnet {
    /// `subnet/netmask`
    #[must_use]
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.subnet, self.netmask)
    }
}

/// NAT gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NatGateway {
    #[serde(rename = "NATGWId")]
    pub natgw_id: String,
    #[serde(rename = "NATGWName")]
    pub natgw_name: String,
    #[serde(rename = "VPCId")]
    pub vpc_id: String,
    pub firewall_id: String,
    #[serde(rename = "IPSet")]
    pub ip_set: Vec<NatGatewayIp>,
    pub tag: String,
}

/// Elastic IP attached to a NAT gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NatGatewayIp {
    #[serde(rename = "EIPId")]
    pub eip_id: String,
    pub bandwidth: i32,
}

/// Firewall
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Firewall {
    #[serde(rename = "FWId")]
    pub fw_id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub firewall_type: String,
}

/// One address of an elastic IP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EipAddr {
    pub operator_name: String,
    #[serde(rename = "IP")]
    pub ip: String,
}

/// Elastic IP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Eip {
    #[serde(rename = "EIPId")]
    pub eip_id: String,
    pub name: String,
    pub bandwidth: i32,
    #[serde(rename = "EIPAddr")]
    pub eip_addr: Vec<EipAddr>,
}

impl Eip {
    /// First address, empty while the provider has not assigned one
    #[must_use]
    pub fn first_address(&self) -> &str {
        self.eip_addr.first().map_or("", |addr| addr.ip.as_str())
    }
}

/// Load balancer backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Backend {
    pub backend_id: String,
    pub resource_id: String,
    pub port: i32,
    #[serde(rename = "PrivateIP")]
    pub private_ip: String,
}

/// Load balancer listener
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VServer {
    #[serde(rename = "VServerId")]
    pub vserver_id: String,
    #[serde(rename = "VServerName")]
    pub vserver_name: String,
    pub frontend_port: i32,
    pub backend_set: Vec<Backend>,
}

/// Load balancer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoadBalancer {
    #[serde(rename = "ULBId")]
    pub ulb_id: String,
    pub name: String,
    #[serde(rename = "VPCId")]
    pub vpc_id: String,
    #[serde(rename = "VServerSet")]
    pub vserver_set: Vec<VServer>,
    #[serde(rename = "IPSet")]
    pub ip_set: Vec<LoadBalancerIp>,
    pub tag: String,
}

/// Elastic IP bound to a load balancer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoadBalancerIp {
    #[serde(rename = "EIPId")]
    pub eip_id: String,
    /// Public address
    #[serde(rename = "EIP")]
    pub eip: String,
    pub bandwidth: i32,
}

/// One address of an instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UHostIp {
    /// `Private`, `Bgp`, `International` ...
    #[serde(rename = "Type")]
    pub ip_type: String,
    #[serde(rename = "IP")]
    pub ip: String,
    /// `"true"` for the default interface
    pub default: String,
}

/// Compute instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UHostInstance {
    #[serde(rename = "UHostId")]
    pub uhost_id: String,
    pub name: String,
    pub zone: String,
    pub state: String,
    #[serde(rename = "IPSet")]
    pub ip_set: Vec<UHostIp>,
    pub tag: String,
    #[serde(rename = "SubnetId")]
    pub subnet_id: String,
}

impl UHostInstance {
    /// Normalized lifecycle state
    #[must_use]
    pub fn lifecycle_state(&self) -> UHostState {
        UHostState::parse(&self.state)
    }
}

/// Normalized instance lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UHostState {
    Initializing,
    Starting,
    Running,
    Stopping,
    Stopped,
    /// No state reported yet
    Empty,
    /// Anything else (`Install Fail`, `Rebooting`, ...)
    Other(String),
}

impl UHostState {
    /// Parse the provider's state string
    #[must_use]
    pub fn parse(state: &str) -> Self {
        match state {
            "Initializing" => Self::Initializing,
            "Starting" => Self::Starting,
            "Running" => Self::Running,
            "Stopping" => Self::Stopping,
            "Stopped" => Self::Stopped,
            "" => Self::Empty,
            other => Self::Other(other.to_string()),
        }
    }

    /// Provider spelling of the state
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initializing => "Initializing",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Empty => "",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for UHostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BusinessGroup {
    pub business_id: String,
    pub business_name: String,
}

/// Resource attached to a business group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GroupResource {
    pub id: String,
    /// `ulb`, `uhost`, `eip` ... (case varies)
    pub resource_type_name: String,
    pub zone_id: String,
}

/// One page of SearchBusinessGroupResource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GroupResourcePage {
    pub total_count: u32,
    pub infos: Vec<GroupResource>,
}

/// CreateVPC parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateVpcRequest {
    pub name: String,
    pub network: Vec<String>,
    pub tag: String,
}

/// CreateSubnet parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateSubnetRequest {
    pub vpc_id: String,
    pub subnet_name: String,
    pub subnet: String,
    pub netmask: u8,
    pub tag: String,
}

/// CreateNATGW parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateNatGatewayRequest {
    pub natgw_name: String,
    pub vpc_id: String,
    pub subnetwork_ids: Vec<String>,
    pub eip_ids: Vec<String>,
    pub firewall_id: String,
    pub tag: String,
}

/// AllocateEIP parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocateEipRequest {
    pub operator_name: String,
    pub bandwidth: i32,
    pub name: Option<String>,
    pub tag: String,
}

/// CreateULB parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateLoadBalancerRequest {
    pub ulb_name: String,
    pub vpc_id: String,
    pub listen_type: String,
    pub tag: String,
}

/// CreateVServer parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateVServerRequest {
    pub ulb_id: String,
    pub vserver_name: String,
    pub protocol: String,
    pub frontend_port: i32,
    pub listen_type: String,
    pub monitor_type: String,
}

/// AllocateBackend parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocateBackendRequest {
    pub ulb_id: String,
    pub vserver_id: String,
    pub resource_id: String,
    pub resource_type: String,
    pub port: i32,
}

/// Disk of a new instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UHostDisk {
    pub size: i32,
    pub disk_type: String,
    pub is_boot: bool,
    pub backup_type: String,
}

/// Elastic IP attached at instance creation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UHostEipInterface {
    pub bandwidth: i32,
    pub operator_name: String,
    pub pay_mode: String,
}

/// CreateUHostInstance parameters
#[derive(Clone, Default, PartialEq)]
pub struct CreateUHostRequest {
    pub zone: String,
    pub name: String,
    pub tag: String,
    pub charge_type: String,
    pub quantity: i32,
    pub vpc_id: String,
    pub subnet_id: String,
    pub image_id: String,
    pub cpu: i32,
    pub memory: i32,
    pub disks: Vec<UHostDisk>,
    pub machine_type: String,
    pub minimal_cpu_platform: String,
    pub login_mode: String,
    pub password: String,
    pub user_data: Option<String>,
    pub eip: Option<UHostEipInterface>,
}

impl fmt::Debug for CreateUHostRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateUHostRequest")
            .field("zone", &self.zone)
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("image_id", &self.image_id)
            .field("cpu", &self.cpu)
            .field("memory", &self.memory)
            .field("disks", &self.disks)
            .field("password", &"<redacted>")
            .field("user_data", &self.user_data.as_ref().map(String::len))
            .finish_non_exhaustive()
    }
}

/// CreateCAPUCluster parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterClusterRequest {
    pub vpc_id: String,
    pub subnet_id: String,
    pub pod_cidr: String,
    pub natgw_id: String,
    pub service_cidr: String,
    pub cluster_name: String,
    pub ulb_id: String,
    pub fw_id: String,
    pub node_cidr: String,
    pub k8s_version: String,
    pub api_server: String,
    pub bastion_id: Option<String>,
    pub bastion_zone: Option<String>,
}

/// CreateCAPUHost parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterHostRequest {
    pub cluster_id: String,
    pub instance_id: String,
    pub zone: String,
    /// `master` or `node`
    pub role: String,
}
