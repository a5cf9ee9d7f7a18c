//! UCloudMachine orchestration
//!
//! A machine waits for its cluster, then gets exactly one instance. The pass
//! mirrors the instance into status and reacts to its lifecycle state:
//! running control plane instances join the API server load balancer,
//! unexpected states fail the machine for good.

use super::instance::machine_addresses;
use super::network::ulb::{add_backend, remove_backend};
use super::{EMPTY_STATE_REQUEUE_AFTER, REQUEUE_AFTER, ReconcileOutcome, Reconciler};
use crate::error::ControllerError;
use crate::scope::{ClusterView, MachineScope, ProviderId};
use tracing::{info, warn};
use ucloud_client::UHostState;

/// Failure reason recorded when a machine can no longer be reconciled
const UPDATE_MACHINE_ERROR: &str = "UpdateMachineError";

impl Reconciler {
    /// One create-path pass over a machine
    pub async fn reconcile_machine(
        &self,
        cluster: ClusterView<'_>,
        machine: &mut MachineScope<'_>,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let (namespace, name) = (machine.namespace.clone(), machine.name.clone());
        self.converge_machine(&cluster, machine)
            .await
            .map_err(|e| ControllerError::Machine {
                namespace,
                name,
                source: Box::new(e),
            })
    }

    async fn converge_machine(
        &self,
        cluster: &ClusterView<'_>,
        machine: &mut MachineScope<'_>,
    ) -> Result<ReconcileOutcome, ControllerError> {
        info!("Reconciling UCloudMachine {}", machine);
        if machine.status.has_failed() {
            info!("UCloudMachine {} has failed, skipping reconciliation", machine);
            return Ok(ReconcileOutcome::Done);
        }
        if !cluster.status.ready {
            info!("UCloudCluster {} is not ready yet", cluster.identity);
            return Ok(ReconcileOutcome::Done);
        }
        if machine.spec.bootstrap_data_secret_name.is_none() {
            info!("Bootstrap data secret of {} is not available yet", machine);
            return Ok(ReconcileOutcome::Done);
        }

        let instance = match self.instance_if_exists(cluster, machine).await? {
            Some(instance) => instance,
            None if machine.instance_id().is_some() => {
                warn!("uhost of {} cannot be found, marking the machine failed", machine);
                machine.status.failure_reason = Some(UPDATE_MACHINE_ERROR.to_string());
                machine.status.failure_message =
                    Some("uhost instance cannot be found, you may have deleted it manually".to_string());
                machine.status.ready = false;
                return Ok(ReconcileOutcome::Done);
            }
            None => self.create_instance(cluster, machine).await?,
        };

        let provider_id = ProviderId {
            project_id: cluster.identity.project_id.clone(),
            zone: instance.zone.clone(),
            instance_id: instance.uhost_id.clone(),
        };
        machine.provider_id = Some(provider_id.to_string());
        machine.status.zone.clone_from(&instance.zone);
        machine.status.instance_id.clone_from(&instance.uhost_id);
        machine.status.instance_state = Some(instance.state.clone());
        machine.status.addresses = machine_addresses(&instance);

        let ctx = cluster.identity.request_context();
        let ulb = &cluster.status.network.ulb;
        let outcome = match instance.lifecycle_state() {
            UHostState::Running => {
                info!("uhost {} of {} is running", instance.uhost_id, machine);
                machine.status.ready = true;
                if machine.control_plane {
                    add_backend(&*self.cloud, &ctx, ulb, &instance.uhost_id).await?;
                }
                ReconcileOutcome::Done
            }
            UHostState::Initializing | UHostState::Starting => {
                info!("uhost {} of {} is pending", instance.uhost_id, machine);
                ReconcileOutcome::RequeueAfter(REQUEUE_AFTER)
            }
            UHostState::Empty => return Ok(ReconcileOutcome::RequeueAfter(EMPTY_STATE_REQUEUE_AFTER)),
            state => {
                warn!("uhost {} of {} is in unexpected state {:?}", instance.uhost_id, machine, state.as_str());
                machine.status.failure_reason = Some(UPDATE_MACHINE_ERROR.to_string());
                machine.status.failure_message = Some(format!(
                    "uhost instance {} state \"{}\" is unexpected",
                    instance.uhost_id, state
                ));
                machine.status.ready = false;
                if machine.control_plane {
                    remove_backend(&*self.cloud, &ctx, ulb, &instance.uhost_id).await?;
                }
                return Ok(ReconcileOutcome::Done);
            }
        };

        if !self.register_host(cluster, machine).await? {
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_AFTER));
        }
        Ok(outcome)
    }

    /// Delete-path pass: release the instance so the finalizer can go
    pub async fn delete_machine(
        &self,
        cluster: ClusterView<'_>,
        machine: &mut MachineScope<'_>,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let (namespace, name) = (machine.namespace.clone(), machine.name.clone());
        self.release_machine(&cluster, machine)
            .await
            .map_err(|e| ControllerError::Machine {
                namespace,
                name,
                source: Box::new(e),
            })
    }

    async fn release_machine(
        &self,
        cluster: &ClusterView<'_>,
        machine: &mut MachineScope<'_>,
    ) -> Result<ReconcileOutcome, ControllerError> {
        info!("Deleting UCloudMachine {}", machine);
        let Some(instance) = self.instance_if_exists(cluster, machine).await? else {
            info!("No uhost found for {}, nothing to terminate", machine);
            return Ok(ReconcileOutcome::Done);
        };

        let ctx = cluster.identity.request_context();
        if machine.control_plane {
            remove_backend(&*self.cloud, &ctx, &cluster.status.network.ulb, &instance.uhost_id).await?;
        }
        self.deregister_host(cluster, &instance.uhost_id).await?;
        self.terminate_instance(&ctx, &cluster.tag(), &instance.uhost_id, &instance.zone)
            .await?;
        machine.status.ready = false;
        machine.status.instance_state = Some(UHostState::Stopped.to_string());
        info!("Terminated uhost {} of {}", instance.uhost_id, machine);
        Ok(ReconcileOutcome::Done)
    }
}
