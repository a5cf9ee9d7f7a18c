//! Controller-specific error types.
//!
//! Reconcilers wrap failures with the resource kind they were working on,
//! the orchestrator wraps again with the owning cluster or machine, so a
//! logged error reads from the outside in.

use crate::secrets::SecretError;
use kube::Error as KubeError;
use std::time::Duration;
use thiserror::Error;
use ucloud_client::UCloudError;

/// Errors that can occur in the UCloud Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// UCloud API error
    #[error("UCloud error: {0}")]
    UCloud(#[from] UCloudError),

    /// Secret store error
    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A resource was reconciled before the resource it lives in
    #[error("{parent} is not created, {kind} must be owned by a {parent}")]
    ParentNotCreated {
        /// Kind being reconciled
        kind: &'static str,
        /// Kind that must exist first
        parent: &'static str,
    },

    /// Bootstrap payload could not be read
    #[error("bootstrap data unavailable in secret {secret}: {source}")]
    BootstrapDataUnavailable {
        /// Secret name
        secret: String,
        /// Underlying lookup failure
        source: SecretError,
    },

    /// Neither an explicit image nor a region default exists
    #[error("no image available for region {0}")]
    NoImageForRegion(String),

    /// Login password missing or not base64
    #[error("invalid login credential: {0}")]
    InvalidCredential(String),

    /// Region missing from the region tables
    #[error("unsupported region: {0}")]
    UnsupportedRegion(String),

    /// No firewall matched
    #[error("firewall not found: {0}")]
    FirewallNotFound(String),

    /// Load balancer listener missing
    #[error("vserver {vserver_id} not found in load balancer {ulb_id}")]
    VServerNotFound {
        /// Load balancer id
        ulb_id: String,
        /// VServer id
        vserver_id: String,
    },

    /// Instance did not reach `Running` in time
    #[error("uhost {instance_id} did not start within {timeout:?}")]
    InstanceBootTimeout {
        /// Instance id
        instance_id: String,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// Instance did not reach `Stopped` in time
    #[error("uhost {instance_id} did not stop within {timeout:?}")]
    InstancePowerOffTimeout {
        /// Instance id
        instance_id: String,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// Instance was still described after terminate
    #[error("uhost {instance_id} was not terminated within {timeout:?}")]
    InstanceTerminateTimeout {
        /// Instance id
        instance_id: String,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// Failure reconciling one resource
    #[error("failed to reconcile {kind} {id}: {source}")]
    Reconcile {
        /// Resource kind
        kind: &'static str,
        /// Identifier or name being reconciled
        id: String,
        /// Cause
        source: Box<ControllerError>,
    },

    /// Failure in one step of a cluster pass
    #[error("UCloudCluster {namespace}/{name}: {step} failed: {source}")]
    Cluster {
        /// Namespace
        namespace: String,
        /// Name
        name: String,
        /// Orchestrator step
        step: &'static str,
        /// Cause
        source: Box<ControllerError>,
    },

    /// Failure in a machine pass
    #[error("UCloudMachine {namespace}/{name}: {source}")]
    Machine {
        /// Namespace
        namespace: String,
        /// Name
        name: String,
        /// Cause
        source: Box<ControllerError>,
    },

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Wrap an error with the resource it was raised for
    pub fn reconcile(kind: &'static str, id: impl Into<String>, source: ControllerError) -> Self {
        Self::Reconcile {
            kind,
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error below the context wrappers
    #[must_use]
    pub fn root_cause(&self) -> &ControllerError {
        match self {
            Self::Reconcile { source, .. }
            | Self::Cluster { source, .. }
            | Self::Machine { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the failure is one of the named instance timeouts
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::InstanceBootTimeout { .. }
                | Self::InstancePowerOffTimeout { .. }
                | Self::InstanceTerminateTimeout { .. }
        )
    }
}
