//! UCloud API Client
//!
//! A Rust client library for the UCloud OpenAPI.
//! Provides typed models and signed calls for the network, compute and
//! business group actions the cluster infrastructure controller drives.
//!
//! # Example
//!
//! ```no_run
//! use ucloud_client::{Credential, RequestContext, ResourceFilter, UCloudClient, UCloudClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Create a client
//! let client = UCloudClient::new(
//!     "https://api.ucloud.cn".to_string(),
//!     Credential {
//!         public_key: "your-public-key".to_string(),
//!         private_key: "your-private-key".to_string(),
//!     },
//! )?;
//!
//! // Every call is scoped to a region and project
//! let ctx = RequestContext::new("cn-bj2", "org-xxxx");
//!
//! // Find the VPCs of one business group
//! let vpcs = client.describe_vpcs(&ctx, &ResourceFilter::tagged("capu-group")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Signing**: SHA-1 request signatures over sorted parameters
//! - **Network**: VPC, subnet, NAT gateway, firewall, elastic IP, load balancer
//! - **Compute**: instance create, power-off and terminate
//! - **Grouping**: business groups and their attached resources
//! - **Registration**: cluster and host registration with the managed service

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod ucloud_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{DEFAULT_BASE_URL, UCloudClient};
pub use common::{HttpClient, Params};
pub use error::{UCloudError, retcode};
pub use models::*;
pub use ucloud_trait::{RegistrationClientTrait, UCloudClientTrait};
#[cfg(feature = "test-util")]
pub use mock::MockUCloudClient;
