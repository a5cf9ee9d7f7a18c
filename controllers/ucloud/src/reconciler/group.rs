//! Business group reconciler
//!
//! The business group is the tag every other resource of a cluster carries.
//! On delete it doubles as a cleanup anchor: anything still attached to the
//! group (load balancers, instances) is force-deleted before the network goes.

use super::Reconciler;
use crate::error::ControllerError;
use crate::reconcile_helpers::{CloudContext, ResourceKind};
use crds::UCloudClusterStatus;
use tracing::{debug, info};
use ucloud_client::{BusinessGroup, UCloudError, retcode};

/// Page size SearchBusinessGroupResource uses when no limit is sent
const SWEEP_PAGE_SIZE: u32 = 10;

/// The cluster's business group, identified by its deterministic name
#[derive(Debug)]
pub(crate) struct BusinessGroupKind {
    name: String,
}

impl BusinessGroupKind {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait::async_trait]
impl ResourceKind for BusinessGroupKind {
    type Remote = BusinessGroup;
    const KIND: &'static str = "business group";

    fn recorded_id<'s>(&self, status: &'s UCloudClusterStatus) -> &'s str {
        &status.group.group_id
    }

    fn wanted_id(&self) -> &str {
        ""
    }

    fn wanted_name(&self) -> &str {
        &self.name
    }

    async fn describe(&self, cloud: &CloudContext<'_>) -> Result<Vec<BusinessGroup>, UCloudError> {
        cloud.cloud.list_business_groups(cloud.ctx).await
    }

    fn matches(&self, remote: &BusinessGroup) -> bool {
        remote.business_name == self.name
    }

    async fn create(&self, cloud: &CloudContext<'_>) -> Result<BusinessGroup, ControllerError> {
        let group = cloud.cloud.create_business_group(cloud.ctx, &self.name).await?;
        info!("Created business group {} ({})", group.business_name, group.business_id);
        Ok(group)
    }

    fn publish(&self, remote: BusinessGroup, status: &mut UCloudClusterStatus) {
        status.group.group_id = remote.business_id;
        status.group.group_name = remote.business_name;
    }

    async fn delete(&self, cloud: &CloudContext<'_>, id: &str) -> Result<(), UCloudError> {
        cloud.cloud.delete_business_group(cloud.ctx, id).await
    }

    fn clear(&self, status: &mut UCloudClusterStatus) {
        status.group = Default::default();
    }
}

impl Reconciler {
    /// Force-delete load balancers and instances still attached to the group
    ///
    /// Catches resources whose identifiers never made it into status, e.g. a
    /// load balancer created in a pass whose status patch was lost.
    pub(crate) async fn sweep_business_group(
        &self,
        cloud: &CloudContext<'_>,
        group_id: &str,
    ) -> Result<(), ControllerError> {
        if group_id.is_empty() {
            return Ok(());
        }

        let mut page = cloud
            .cloud
            .search_business_group_resources(cloud.ctx, group_id, None)
            .await
            .map_err(|e| ControllerError::reconcile("business group", group_id, e.into()))?;
        if page.total_count > SWEEP_PAGE_SIZE {
            debug!("Business group {} holds {} resources, fetching all", group_id, page.total_count);
            page = cloud
                .cloud
                .search_business_group_resources(cloud.ctx, group_id, Some(page.total_count))
                .await
                .map_err(|e| ControllerError::reconcile("business group", group_id, e.into()))?;
        }

        info!("Sweeping {} resource(s) left in business group {}", page.infos.len(), group_id);
        for resource in page.infos {
            match resource.resource_type_name.to_lowercase().as_str() {
                "ulb" => {
                    info!("Deleting leftover ULB {}", resource.id);
                    match cloud.cloud.delete_load_balancer(cloud.ctx, &resource.id, true).await {
                        Ok(()) => {}
                        Err(e) if e.is_retcode(retcode::ULB_NOT_FOUND) => {
                            debug!("ULB {} is already gone", resource.id);
                        }
                        Err(e) => return Err(ControllerError::reconcile("load balancer", resource.id, e.into())),
                    }
                }
                "uhost" => {
                    info!("Terminating leftover uhost {}", resource.id);
                    self.terminate_instance(cloud.ctx, cloud.tag, &resource.id, &resource.zone_id).await?;
                }
                other => debug!("Leaving {} {} to its owner", other, resource.id),
            }
        }
        Ok(())
    }
}
