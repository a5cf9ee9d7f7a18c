//! Main controller implementation.
//!
//! This module contains the `Controller` struct that builds the UCloud and
//! Kubernetes clients, validates the credential when a probe project is
//! configured, and runs the UCloudCluster and UCloudMachine watchers.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::secrets::KubeSecretStore;
use crate::watcher::Watcher;
use crds::{UCloudCluster, UCloudMachine};
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use ucloud_client::UCloudClient;

/// Main controller for UCloud cluster infrastructure.
#[derive(Debug)]
pub struct Controller {
    cluster_watcher: JoinHandle<Result<(), ControllerError>>,
    machine_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing UCloud Controller");

        let kube_client = Client::try_default().await?;

        let regions = Arc::new(config.load_region_table()?);
        let ucloud_client = Arc::new(UCloudClient::new(config.base_url.clone(), config.credential.clone())?);

        if let Some(probe) = &config.probe {
            info!("Validating UCloud credential against project {} in {}...", probe.project_id, probe.region);
            ucloud_client.validate_credential(probe).await.map_err(|e| {
                error!("Failed to validate UCloud credential: {}", e);
                error!("Please ensure UCLOUD_ACCESS_PUBKEY and UCLOUD_ACCESS_PRIKEY are set correctly");
                error!("and that {} is reachable", config.base_url);
                ControllerError::UCloud(e)
            })?;
            info!("UCloud credential validated");
        }

        let reconciler = Arc::new(Reconciler::new(
            ucloud_client.clone(),
            ucloud_client,
            Arc::new(KubeSecretStore::new(kube_client.clone())),
            regions,
            config.credential.clone(),
        ));

        let (cluster_api, machine_api): (Api<UCloudCluster>, Api<UCloudMachine>) = match &config.namespace {
            Some(ns) => (
                Api::namespaced(kube_client.clone(), ns),
                Api::namespaced(kube_client.clone(), ns),
            ),
            None => (Api::all(kube_client.clone()), Api::all(kube_client.clone())),
        };

        let watcher_instance = Arc::new(Watcher::new(reconciler, kube_client, cluster_api, machine_api));

        let cluster_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_clusters().await })
        };

        let machine_watcher = {
            let watcher = watcher_instance;
            tokio::spawn(async move { watcher.watch_machines().await })
        };

        Ok(Self {
            cluster_watcher,
            machine_watcher,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("UCloud Controller running");

        // Watchers run forever; either one exiting stops the process
        tokio::select! {
            result = &mut self.cluster_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("UCloudCluster watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("UCloudCluster watcher error: {}", e)))?;
            }
            result = &mut self.machine_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("UCloudMachine watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("UCloudMachine watcher error: {}", e)))?;
            }
        }

        Ok(())
    }
}
