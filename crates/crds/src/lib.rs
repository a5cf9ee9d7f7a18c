//! UCloud Cluster API CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the UCloud infrastructure controller.

pub mod cluster;
pub mod machine;
pub mod network;

pub use cluster::*;
pub use machine::*;
pub use network::*;
