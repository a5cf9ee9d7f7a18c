//! UCloud Controller
//!
//! Cluster API infrastructure controller for UCloud:
//! - UCloudCluster: business group, VPC, subnet, NAT gateway, API server load
//!   balancer, optional bastion, and the managed cluster registration
//! - UCloudMachine: one UHost instance per machine, its load balancer backend
//!   and host registration
//!
//! Configuration is read from the environment:
//! - `UCLOUD_ACCESS_PUBKEY` / `UCLOUD_ACCESS_PRIKEY` (required)
//! - `UCLOUD_BASE_URL`, `WATCH_NAMESPACE`, `UCLOUD_REGION_TABLE`
//! - `UCLOUD_REGION` + `UCLOUD_PROJECT_ID` to validate the credential at startup
//! - `RUST_LOG` for log filtering (defaults to `info`)

mod backoff;
mod clock;
mod config;
mod controller;
mod error;
mod placement;
mod reconcile_helpers;
mod reconciler;
mod scope;
mod secrets;
mod watcher;

#[cfg(test)]
mod reconcile_helpers_test;
#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting UCloud Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  UCloud API: {}", config.base_url);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    if let Some(path) = &config.region_table_path {
        info!("  Region table: {}", path.display());
    }

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
