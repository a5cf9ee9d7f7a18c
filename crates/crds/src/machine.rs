//! UCloudMachine Custom Resource Definition
//!
//! Declares one compute instance (UHost) of a cluster.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer placed on every `UCloudMachine` until its instance is terminated
pub const MACHINE_FINALIZER: &str = "ucloudmachine.infrastructure.cluster.x-k8s.io";

/// Label linking a machine to the `UCloudCluster` of the same namespace
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Label marking a control plane machine
pub const CONTROL_PLANE_LABEL: &str = "cluster.x-k8s.io/control-plane";

/// UCloudMachineSpec defines the desired state of one instance
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "UCloudMachine",
    namespaced,
    status = "UCloudMachineStatus",
    shortname = "ucm",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.instanceState"}"#,
    printcolumn = r#"{"name":"ProviderID","type":"string","jsonPath":".spec.providerID"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct UCloudMachineSpec {
    /// Instance type label (informational)
    #[serde(default)]
    pub instance_type: String,

    /// vCPU count (defaults to 4)
    #[serde(default)]
    pub cpu: i32,

    /// Memory in MB (defaults to 8192)
    #[serde(default)]
    pub memory: i32,

    /// Root disk size in GB (defaults to 40)
    #[serde(default)]
    pub root_disk_size: i32,

    /// Data disk size in GB (defaults to 40)
    #[serde(default)]
    pub data_disk_size: i32,

    /// Base64 encoded login password
    #[serde(default)]
    pub ssh_password: String,

    /// `ucloud://{project}/{zone}/{uhostId}`, assigned once the instance exists
    #[serde(rename = "providerID", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Image override; the region default image is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,

    /// Zone override; a random zone of the region is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_domain: Option<String>,

    /// Secret holding the bootstrap payload under the `value` key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_data_secret_name: Option<String>,

    /// Kubernetes version substituted into the bootstrap payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// UCloudMachineStatus is the observed state of one instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UCloudMachineStatus {
    /// True while the instance is running
    pub ready: bool,

    /// Zone the instance lives in
    pub zone: String,

    /// Provider id
    pub instance_id: String,

    /// External registration id the host was registered under
    pub cluster_id: String,

    /// Addresses reported by the provider
    pub addresses: Vec<MachineAddress>,

    /// Last observed instance state
    pub instance_state: Option<String>,

    /// Terminal failure reason. Once set the machine is no longer reconciled.
    pub failure_reason: Option<String>,

    /// Terminal failure message
    pub failure_message: Option<String>,
}

impl UCloudMachineStatus {
    /// Whether a terminal failure has been recorded
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failure_reason.is_some() || self.failure_message.is_some()
    }
}

/// Address of a machine
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineAddress {
    /// Address kind
    #[serde(rename = "type")]
    pub address_type: MachineAddressType,
    /// The address
    pub address: String,
}

/// Address kinds understood by Cluster API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum MachineAddressType {
    /// Private VPC address
    InternalIP,
    /// Public address
    ExternalIP,
}
