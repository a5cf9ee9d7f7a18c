//! UCloudCluster Custom Resource Definition
//!
//! Declares the cloud infrastructure of one Kubernetes cluster: business group,
//! VPC, subnet, NAT gateway, API server load balancer and an optional bastion.

use crate::network::{NetworkSpec, NetworkStatus};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Finalizer placed on every `UCloudCluster` until its delete path completes
pub const CLUSTER_FINALIZER: &str = "ucloudcluster.infrastructure.cluster.x-k8s.io";

/// UCloudClusterSpec defines the desired state of a cluster's infrastructure
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "UCloudCluster",
    namespaced,
    status = "UCloudClusterStatus",
    shortname = "ucc",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Region","type":"string","jsonPath":".spec.region"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.controlPlaneEndpoint.host"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct UCloudClusterSpec {
    /// Region all resources are created in (e.g. `cn-bj2`)
    pub region: String,

    /// Project the resources belong to
    pub project_id: String,

    /// Kubernetes version of the cluster
    #[serde(default)]
    pub version: String,

    /// Network layout
    #[serde(default)]
    pub network: NetworkSpec,

    /// Bastion host settings (no bastion when absent or without a password)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bastion: Option<BastionSpec>,

    /// Pod and service ranges handed to the external cluster registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_network: Option<ClusterNetworkSpec>,
}

/// Bastion host settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BastionSpec {
    /// Base64 encoded login password
    pub ssh_password: String,
    /// Zone override; a random zone of the region is used when empty
    pub zone: String,
}

/// Pod and service CIDRs
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkSpec {
    /// Pod CIDR
    #[serde(default = "default_pod_cidr")]
    pub pod_cidr: String,
    /// Service CIDR
    #[serde(default = "default_service_cidr")]
    pub service_cidr: String,
}

impl Default for ClusterNetworkSpec {
    fn default() -> Self {
        Self {
            pod_cidr: default_pod_cidr(),
            service_cidr: default_service_cidr(),
        }
    }
}

fn default_pod_cidr() -> String {
    "192.168.0.0/16".to_string()
}

fn default_service_cidr() -> String {
    "10.96.0.0/12".to_string()
}

/// UCloudClusterStatus is the observed state of a cluster's infrastructure
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UCloudClusterStatus {
    /// True once the load balancer has a public address
    pub ready: bool,

    /// API server endpoint published once the load balancer is reachable
    pub control_plane_endpoint: Option<ApiEndpoint>,

    /// Zones machines may be placed in, keyed by zone name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failure_domains: BTreeMap<String, FailureDomain>,

    /// Resolved network resources
    pub network: NetworkStatus,

    /// Bastion instance, when one was created
    pub bastion: Option<InstanceInfo>,

    /// Business group scoping every resource of this cluster
    pub group: GroupStatus,

    /// External cluster registration id
    pub cluster_id: String,
}

/// Host and port of the API server
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    /// Public address
    pub host: String,
    /// Port
    pub port: i32,
}

impl std::fmt::Display for ApiEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One failure domain
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailureDomain {
    /// Whether control plane machines may be placed here
    pub control_plane: bool,
}

/// Business group identity
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupStatus {
    /// Deterministic group name, also used as the resource tag
    pub group_name: String,
    /// Provider id
    pub group_id: String,
}

/// A compute instance recorded in cluster status
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceInfo {
    /// Provider id
    pub instance_id: String,
    /// Default private address
    #[serde(rename = "privateIP")]
    pub private_ip: String,
    /// Public address
    #[serde(rename = "publicIP")]
    pub public_ip: String,
    /// Always `uhost`
    pub instance_type: String,
    /// Zone
    pub zone: String,
    /// Instance name
    pub name: String,
}
