//! VPC reconciler

use crate::config::DEFAULT_VPC_CIDR;
use crate::error::ControllerError;
use crate::reconcile_helpers::{CloudContext, ResourceKind};
use crds::{UCloudClusterStatus, VpcSpec};
use tracing::info;
use ucloud_client::{CreateVpcRequest, ResourceFilter, UCloudError, Vpc, retcode};

/// The cluster VPC
#[derive(Debug)]
pub(crate) struct VpcKind {
    id: String,
    name: String,
    cidr: String,
}

impl VpcKind {
    pub(crate) fn new(spec: &VpcSpec, cluster: &str) -> Self {
        Self {
            id: spec.vpc_id.clone(),
            name: if spec.vpc_name.is_empty() {
                format!("cluster-api-{cluster}-vpc")
            } else {
                spec.vpc_name.clone()
            },
            cidr: if spec.cidr_block.is_empty() {
                DEFAULT_VPC_CIDR.to_string()
            } else {
                spec.cidr_block.clone()
            },
        }
    }
}

#[async_trait::async_trait]
impl ResourceKind for VpcKind {
    type Remote = Vpc;
    const KIND: &'static str = "VPC";

    fn recorded_id<'s>(&self, status: &'s UCloudClusterStatus) -> &'s str {
        &status.network.vpc.vpc_id
    }

    fn wanted_id(&self) -> &str {
        &self.id
    }

    fn wanted_name(&self) -> &str {
        &self.name
    }

    async fn describe(&self, cloud: &CloudContext<'_>) -> Result<Vec<Vpc>, UCloudError> {
        let filter = ResourceFilter::tagged(cloud.tag).with_id(&self.id);
        cloud.cloud.describe_vpcs(cloud.ctx, &filter).await
    }

    fn matches(&self, remote: &Vpc) -> bool {
        self.is_wanted(&remote.name, &remote.vpc_id)
    }

    async fn create(&self, cloud: &CloudContext<'_>) -> Result<Vpc, ControllerError> {
        let request = CreateVpcRequest {
            name: self.name.clone(),
            network: vec![self.cidr.clone()],
            tag: cloud.tag.to_string(),
        };
        let vpc_id = cloud.cloud.create_vpc(cloud.ctx, &request).await?;
        info!("Created VPC {} ({}) with network {}", self.name, vpc_id, self.cidr);
        Ok(Vpc {
            vpc_id,
            name: request.name,
            network: request.network,
            tag: request.tag,
        })
    }

    fn publish(&self, remote: Vpc, status: &mut UCloudClusterStatus) {
        let vpc = &mut status.network.vpc;
        vpc.cidr_block = remote.network.into_iter().next().unwrap_or_default();
        vpc.vpc_name = remote.name;
        vpc.vpc_id = remote.vpc_id;
    }

    async fn delete(&self, cloud: &CloudContext<'_>, id: &str) -> Result<(), UCloudError> {
        cloud.cloud.delete_vpc(cloud.ctx, id).await
    }

    fn gone_code(&self) -> Option<i64> {
        Some(retcode::VPC_NOT_FOUND)
    }

    fn clear(&self, status: &mut UCloudClusterStatus) {
        status.network.vpc = Default::default();
    }
}
