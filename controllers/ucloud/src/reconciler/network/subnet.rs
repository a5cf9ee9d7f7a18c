//! Subnet reconciler

use crate::config::DEFAULT_SUBNET_CIDR;
use crate::error::ControllerError;
use crate::reconcile_helpers::{CloudContext, ResourceKind};
use crds::{SubnetSpec, UCloudClusterStatus};
use tracing::info;
use ucloud_client::{CreateSubnetRequest, ResourceFilter, Subnet, UCloudError, retcode};

/// The cluster subnet, owned by the cluster VPC
#[derive(Debug)]
pub(crate) struct SubnetKind {
    id: String,
    name: String,
    cidr: String,
    vpc_id: String,
}

impl SubnetKind {
    pub(crate) fn new(spec: &SubnetSpec, cluster: &str, vpc_id: &str) -> Self {
        Self {
            id: spec.subnet_id.clone(),
            name: if spec.subnet_name.is_empty() {
                format!("cluster-api-{cluster}-subnet")
            } else {
                spec.subnet_name.clone()
            },
            cidr: if spec.cidr_block.is_empty() {
                DEFAULT_SUBNET_CIDR.to_string()
            } else {
                spec.cidr_block.clone()
            },
            vpc_id: vpc_id.to_string(),
        }
    }
}

/// Split `10.0.0.0/16` into `("10.0.0.0", 16)`
pub(crate) fn split_cidr(cidr: &str) -> Result<(&str, u8), ControllerError> {
    let (network, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| ControllerError::InvalidConfig(format!("subnet CIDR {cidr} has no prefix length")))?;
    let prefix = prefix
        .parse::<u8>()
        .ok()
        .filter(|p| *p <= 32)
        .ok_or_else(|| ControllerError::InvalidConfig(format!("subnet CIDR {cidr} has an invalid prefix length")))?;
    Ok((network, prefix))
}

#[async_trait::async_trait]
impl ResourceKind for SubnetKind {
    type Remote = Subnet;
    const KIND: &'static str = "subnet";

    fn recorded_id<'s>(&self, status: &'s UCloudClusterStatus) -> &'s str {
        &status.network.subnet.subnet_id
    }

    fn wanted_id(&self) -> &str {
        &self.id
    }

    fn wanted_name(&self) -> &str {
        &self.name
    }

    fn parents(&self) -> Vec<(&'static str, &str)> {
        vec![("vpc", &self.vpc_id)]
    }

    async fn describe(&self, cloud: &CloudContext<'_>) -> Result<Vec<Subnet>, UCloudError> {
        let filter = ResourceFilter::tagged(cloud.tag).in_vpc(&self.vpc_id).with_id(&self.id);
        cloud.cloud.describe_subnets(cloud.ctx, &filter).await
    }

    fn matches(&self, remote: &Subnet) -> bool {
        self.is_wanted(&remote.subnet_name, &remote.subnet_id) && remote.vpc_id == self.vpc_id
    }

    async fn create(&self, cloud: &CloudContext<'_>) -> Result<Subnet, ControllerError> {
        let (network, netmask) = split_cidr(&self.cidr)?;
        let request = CreateSubnetRequest {
            vpc_id: self.vpc_id.clone(),
            subnet_name: self.name.clone(),
            subnet: network.to_string(),
            netmask,
            tag: cloud.tag.to_string(),
        };
        let subnet_id = cloud.cloud.create_subnet(cloud.ctx, &request).await?;
        info!("Created subnet {} ({}) {} in VPC {}", self.name, subnet_id, self.cidr, self.vpc_id);
        Ok(Subnet {
            subnet_id,
            subnet_name: request.subnet_name,
            vpc_id: request.vpc_id,
            subnet: request.subnet,
            netmask: netmask.to_string(),
            tag: request.tag,
        })
    }

    fn publish(&self, remote: Subnet, status: &mut UCloudClusterStatus) {
        let subnet = &mut status.network.subnet;
        subnet.cidr_block = remote.cidr();
        subnet.subnet_id = remote.subnet_id;
        subnet.subnet_name = remote.subnet_name;
        subnet.vpc_id = remote.vpc_id;
    }

    async fn delete(&self, cloud: &CloudContext<'_>, id: &str) -> Result<(), UCloudError> {
        cloud.cloud.delete_subnet(cloud.ctx, id).await
    }

    fn gone_code(&self) -> Option<i64> {
        Some(retcode::SUBNET_NOT_FOUND)
    }

    fn clear(&self, status: &mut UCloudClusterStatus) {
        status.network.subnet = Default::default();
    }
}
