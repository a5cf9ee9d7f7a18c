//! Firewall lookup. Firewalls are never created or deleted here.

use crate::error::ControllerError;
use crate::reconcile_helpers::CloudContext;
use tracing::debug;
use ucloud_client::{Firewall, ResourceFilter};

/// The firewall named by `firewall_id`, or the project's first firewall when empty
pub(crate) async fn resolve_firewall(cloud: &CloudContext<'_>, firewall_id: &str) -> Result<Firewall, ControllerError> {
    let filter = ResourceFilter::default().with_id(firewall_id);
    let firewall = cloud
        .cloud
        .describe_firewalls(cloud.ctx, &filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ControllerError::FirewallNotFound(if firewall_id.is_empty() {
                format!("no firewall in project {}", cloud.ctx.project_id)
            } else {
                firewall_id.to_string()
            })
        })?;
    debug!("Using firewall {} ({}, {})", firewall.fw_id, firewall.name, firewall.firewall_type);
    Ok(firewall)
}
