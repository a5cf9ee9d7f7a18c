//! Helper functions for common reconciliation patterns
//!
//! Every cluster resource kind (business group, VPC, subnet, NAT gateway,
//! load balancer) converges the same way; this module holds that control
//! flow once and each kind supplies a small `ResourceKind` implementation.
//!
//! Reconcile:
//! 1. Return early when status already records an identifier
//! 2. Fail fast when a parent identifier is still empty
//! 3. Describe candidates scoped to the parent and business group tag
//! 4. Take the first candidate with the wanted name or id under the right parent
//! 5. Otherwise create, synthesizing the record from the request
//! 6. Publish identifiers into status
//!
//! Delete:
//! 1. Nothing recorded, nothing to do
//! 2. Operator-supplied resources (spec id == status id) are kept, status untouched
//! 3. Delete, treating the kind's "already gone" return code as success
//! 4. Clear the status identifier

use crate::config::RegionTable;
use crate::error::ControllerError;
use crds::UCloudClusterStatus;
use std::fmt;
use tracing::{debug, info};
use ucloud_client::{RequestContext, UCloudClientTrait, UCloudError};

/// Cloud access for one cluster pass
#[derive(Clone, Copy)]
pub struct CloudContext<'a> {
    /// Provider API
    pub cloud: &'a dyn UCloudClientTrait,
    /// Region and project
    pub ctx: &'a RequestContext,
    /// Business group tag put on every created resource
    pub tag: &'a str,
    /// Region lookup tables
    pub regions: &'a RegionTable,
}

impl fmt::Debug for CloudContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudContext")
            .field("ctx", self.ctx)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// One cluster resource kind
#[async_trait::async_trait]
pub trait ResourceKind: Send + Sync {
    /// Provider record of this kind
    type Remote: Send + Sync + fmt::Debug;

    /// Kind name used in logs and errors
    const KIND: &'static str;

    /// Identifier recorded in status, empty when unresolved
    fn recorded_id<'s>(&self, status: &'s UCloudClusterStatus) -> &'s str;

    /// Identifier supplied in spec, empty when the operator did not name one
    fn wanted_id(&self) -> &str;

    /// Declared or generated name
    fn wanted_name(&self) -> &str;

    /// Parent kinds with their resolved identifiers
    fn parents(&self) -> Vec<(&'static str, &str)> {
        Vec::new()
    }

    /// List candidates
    async fn describe(&self, cloud: &CloudContext<'_>) -> Result<Vec<Self::Remote>, UCloudError>;

    /// Whether a candidate is the resource this cluster wants
    fn matches(&self, remote: &Self::Remote) -> bool;

    /// Create the resource (and any sub-resources) and synthesize its record
    async fn create(&self, cloud: &CloudContext<'_>) -> Result<Self::Remote, ControllerError>;

    /// Write the record's identifiers into status
    fn publish(&self, remote: Self::Remote, status: &mut UCloudClusterStatus);

    /// Delete by identifier
    async fn delete(&self, cloud: &CloudContext<'_>, id: &str) -> Result<(), UCloudError>;

    /// Return code meaning the resource no longer exists
    fn gone_code(&self) -> Option<i64> {
        None
    }

    /// Forget the resource in status
    fn clear(&self, status: &mut UCloudClusterStatus);

    /// Name equals the wanted name, or id equals the wanted id
    fn is_wanted(&self, name: &str, id: &str) -> bool {
        let wanted_name = self.wanted_name();
        let wanted_id = self.wanted_id();
        (!wanted_name.is_empty() && name == wanted_name) || (!wanted_id.is_empty() && id == wanted_id)
    }

    /// Identifier or name for messages
    fn label(&self) -> &str {
        if self.wanted_id().is_empty() { self.wanted_name() } else { self.wanted_id() }
    }
}

/// Find or create one resource and publish it into status
pub async fn reconcile_resource<K: ResourceKind>(
    kind: &K,
    cloud: &CloudContext<'_>,
    status: &mut UCloudClusterStatus,
) -> Result<(), ControllerError> {
    let recorded = kind.recorded_id(status);
    if !recorded.is_empty() {
        debug!("{} {} already reconciled", K::KIND, recorded);
        return Ok(());
    }

    if let Some((parent, _)) = kind.parents().into_iter().find(|(_, id)| id.is_empty()) {
        return Err(ControllerError::reconcile(
            K::KIND,
            kind.label(),
            ControllerError::ParentNotCreated { kind: K::KIND, parent },
        ));
    }

    info!("Reconciling {} {} (tag {})", K::KIND, kind.label(), cloud.tag);
    let remote = find_or_create(kind, cloud)
        .await
        .map_err(|e| ControllerError::reconcile(K::KIND, kind.label(), e))?;

    debug!("Publishing {} {:?}", K::KIND, remote);
    kind.publish(remote, status);
    info!("Reconciled {} {} -> {}", K::KIND, kind.label(), kind.recorded_id(status));
    Ok(())
}

async fn find_or_create<K: ResourceKind>(kind: &K, cloud: &CloudContext<'_>) -> Result<K::Remote, ControllerError> {
    let candidates = kind.describe(cloud).await?;
    debug!("Found {} {} candidate(s)", candidates.len(), K::KIND);
    if let Some(existing) = candidates.into_iter().find(|candidate| kind.matches(candidate)) {
        info!("Found existing {} {}", K::KIND, kind.label());
        return Ok(existing);
    }
    info!("Creating {} {}", K::KIND, kind.label());
    kind.create(cloud).await
}

/// Delete one resource recorded in status unless the operator supplied it
pub async fn delete_resource<K: ResourceKind>(
    kind: &K,
    cloud: &CloudContext<'_>,
    status: &mut UCloudClusterStatus,
) -> Result<(), ControllerError> {
    let id = kind.recorded_id(status).to_string();
    if id.is_empty() {
        debug!("No {} recorded, nothing to delete", K::KIND);
        return Ok(());
    }
    if id == kind.wanted_id() {
        info!("{} {} was supplied by the operator, skipping delete", K::KIND, id);
        return Ok(());
    }

    info!("Deleting {} {}", K::KIND, id);
    match kind.delete(cloud, &id).await {
        Ok(()) => info!("Deleted {} {}", K::KIND, id),
        Err(e) if kind.gone_code().is_some_and(|code| e.is_retcode(code)) => {
            info!("{} {} is already gone", K::KIND, id);
        }
        Err(e) => return Err(ControllerError::reconcile(K::KIND, id, e.into())),
    }
    kind.clear(status);
    Ok(())
}
