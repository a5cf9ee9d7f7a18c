//! Elastic IP allocation for NAT gateways and load balancers

use crate::config::DEFAULT_EIP_BANDWIDTH;
use crate::error::ControllerError;
use crate::reconcile_helpers::CloudContext;
use crds::{EipSpec, EipStatus};
use tracing::info;
use ucloud_client::{AllocateEipRequest, Eip};

/// Allocate an elastic IP on the region's line, tagged with the business group
pub(crate) async fn allocate_eip(cloud: &CloudContext<'_>, spec: &EipSpec) -> Result<Eip, ControllerError> {
    let request = AllocateEipRequest {
        operator_name: cloud.regions.eip_operator(&cloud.ctx.region)?.to_string(),
        bandwidth: if spec.bandwidth > 0 { spec.bandwidth } else { DEFAULT_EIP_BANDWIDTH },
        name: (!spec.eip_name.is_empty()).then(|| spec.eip_name.clone()),
        tag: cloud.tag.to_string(),
    };
    let eip = cloud.cloud.allocate_eip(cloud.ctx, &request).await?;
    info!(
        "Allocated EIP {} ({} Mbps, {}) address {:?}",
        eip.eip_id,
        request.bandwidth,
        request.operator_name,
        eip.first_address()
    );
    Ok(eip)
}

/// Status record of an elastic IP
pub(crate) fn eip_status(eip: &Eip) -> EipStatus {
    EipStatus {
        eip_id: eip.eip_id.clone(),
        eip_addr: eip.first_address().to_string(),
        eip_name: eip.name.clone(),
        bandwidth: eip.bandwidth,
    }
}
