//! Bastion host reconciler
//!
//! The bastion is an optional jump host in the cluster subnet with its own
//! elastic IP. It exists only when a bastion password is declared, and is
//! created once: a recorded bastion is never re-checked.

use super::Reconciler;
use super::instance::{base_request, decode_password, disk, private_ip, public_ip};
use crate::config::DEFAULT_ROOT_DISK_SIZE;
use crate::error::ControllerError;
use crate::reconcile_helpers::CloudContext;
use crate::scope::{ClusterIdentity, ClusterView};
use crds::{InstanceInfo, UCloudClusterSpec, UCloudClusterStatus};
use tracing::{debug, info};
use ucloud_client::{ResourceFilter, UHostEipInterface, UHostInstance};

const BASTION_CPU: i32 = 2;
const BASTION_MEMORY: i32 = 4096;
const BASTION_EIP_BANDWIDTH: i32 = 1;

fn instance_info(host: &UHostInstance, operator: &str) -> InstanceInfo {
    InstanceInfo {
        instance_id: host.uhost_id.clone(),
        private_ip: private_ip(host),
        public_ip: public_ip(host, operator),
        instance_type: "uhost".to_string(),
        zone: host.zone.clone(),
        name: host.name.clone(),
    }
}

impl Reconciler {
    /// Create the bastion host when one is declared and none is recorded
    pub(crate) async fn reconcile_bastion(
        &self,
        cloud: &CloudContext<'_>,
        identity: &ClusterIdentity,
        spec: &UCloudClusterSpec,
        status: &mut UCloudClusterStatus,
    ) -> Result<(), ControllerError> {
        let Some(bastion) = spec.bastion.as_ref().filter(|b| !b.ssh_password.is_empty()) else {
            return Ok(());
        };
        if status.bastion.is_some() {
            return Ok(());
        }

        let name = format!("{}-{}-bastion", identity.namespace, identity.name);
        let wrap = |e: ControllerError| ControllerError::reconcile("bastion", name.clone(), e);
        let operator = cloud.regions.eip_operator(&identity.region).map_err(wrap)?;

        let subnet_id = status.network.subnet.subnet_id.clone();
        let filter = ResourceFilter::tagged(cloud.tag).in_subnet(&subnet_id);
        let hosts = cloud
            .cloud
            .describe_uhost_instances(cloud.ctx, &filter)
            .await
            .map_err(|e| wrap(e.into()))?;
        if let Some(existing) = hosts.iter().find(|h| h.name == name) {
            info!("Found existing bastion {} ({})", name, existing.uhost_id);
            status.bastion = Some(instance_info(existing, operator));
            return Ok(());
        }

        let image_id = self.regions.image(&identity.region).map_err(wrap)?.to_string();
        let zone = self.choose_zone(&identity.region, &bastion.zone).map_err(wrap)?;
        let password = decode_password(&bastion.ssh_password).map_err(wrap)?;

        let view = ClusterView {
            identity,
            spec,
            status: &*status,
        };
        let mut request = base_request(&view, name.clone(), zone, image_id, password);
        request.cpu = BASTION_CPU;
        request.memory = BASTION_MEMORY;
        request.disks = vec![disk(DEFAULT_ROOT_DISK_SIZE, true)];
        request.eip = Some(UHostEipInterface {
            bandwidth: BASTION_EIP_BANDWIDTH,
            operator_name: operator.to_string(),
            pay_mode: "Bandwidth".to_string(),
        });
        debug!("Creating bastion {:?}", request);

        let instance_id = cloud
            .cloud
            .create_uhost_instance(cloud.ctx, &request)
            .await
            .map_err(|e| wrap(e.into()))?;
        info!("Created bastion {} ({}) in {}", name, instance_id, request.zone);

        let filter = ResourceFilter::tagged(cloud.tag).in_zone(&request.zone).with_id(&instance_id);
        let hosts = cloud
            .cloud
            .describe_uhost_instances(cloud.ctx, &filter)
            .await
            .map_err(|e| wrap(e.into()))?;
        let info = match hosts.iter().find(|h| h.uhost_id == instance_id) {
            Some(host) => instance_info(host, operator),
            None => InstanceInfo {
                instance_id,
                instance_type: "uhost".to_string(),
                zone: request.zone,
                name,
                ..Default::default()
            },
        };
        status.bastion = Some(info);
        Ok(())
    }

    /// Terminate the recorded bastion and forget it
    pub(crate) async fn terminate_bastion(
        &self,
        cloud: &CloudContext<'_>,
        status: &mut UCloudClusterStatus,
    ) -> Result<(), ControllerError> {
        let Some(bastion) = status.bastion.as_ref().filter(|b| !b.instance_id.is_empty()) else {
            return Ok(());
        };
        info!("Terminating bastion {} ({})", bastion.name, bastion.instance_id);
        self.terminate_instance(cloud.ctx, cloud.tag, &bastion.instance_id, &bastion.zone)
            .await?;
        status.bastion = None;
        Ok(())
    }
}
