//! Reconciliation scopes.
//!
//! A scope pairs the read-only declared spec with the mutable status record
//! of one object for the length of one pass. Nothing in a scope is shared
//! across objects; the caller persists the status once the pass returns.

use crds::{UCloudClusterSpec, UCloudClusterStatus, UCloudMachineSpec, UCloudMachineStatus};
use std::fmt;
use ucloud_client::RequestContext;
use uuid::Uuid;

/// Namespace UUID for business group names
const GROUP_NAME_NAMESPACE: Uuid = Uuid::from_u128(0xe364_031d_ad93_4744_b411_85bb_870a_8623);

/// Prefix of every business group name
const GROUP_NAME_PREFIX: &str = "capu-";

const PROVIDER_ID_SCHEME: &str = "ucloud://";

/// Identity of one cluster, everything its generated names derive from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterIdentity {
    /// Kubernetes namespace
    pub namespace: String,
    /// Cluster name
    pub name: String,
    /// Project
    pub project_id: String,
    /// Region
    pub region: String,
    /// Kubernetes version
    pub version: String,
    /// RFC 3339 creation timestamp of the cluster object
    pub creation_timestamp: String,
}

impl ClusterIdentity {
    /// Business group name to look up or create the group with
    ///
    /// Derives from the mutable version, so once the group exists its
    /// recorded name is the tag; see [`group_tag`].
    #[must_use]
    pub fn group_name(&self) -> String {
        let seed = format!(
            "{}-{}-{}-{}-{}-{}",
            self.project_id, self.region, self.namespace, self.name, self.version, self.creation_timestamp
        );
        format!("{GROUP_NAME_PREFIX}{}", Uuid::new_v5(&GROUP_NAME_NAMESPACE, seed.as_bytes()))
    }

    /// Request scope of every call made for this cluster
    #[must_use]
    pub fn request_context(&self) -> RequestContext {
        RequestContext::new(&self.region, &self.project_id)
    }
}

/// Tag of the cluster's resources: the recorded group name, else the derived one
#[must_use]
pub fn group_tag(identity: &ClusterIdentity, status: &UCloudClusterStatus) -> String {
    if status.group.group_name.is_empty() {
        identity.group_name()
    } else {
        status.group.group_name.clone()
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One cluster pass: declared spec, observed status and identity
#[derive(Debug)]
pub struct ClusterScope<'a> {
    /// Identity
    pub identity: ClusterIdentity,
    /// Declared state
    pub spec: &'a UCloudClusterSpec,
    /// Observed state, written back by the caller
    pub status: &'a mut UCloudClusterStatus,
    ctx: RequestContext,
}

impl<'a> ClusterScope<'a> {
    /// Scope for one pass over a cluster
    pub fn new(identity: ClusterIdentity, spec: &'a UCloudClusterSpec, status: &'a mut UCloudClusterStatus) -> Self {
        let ctx = identity.request_context();
        Self { identity, spec, status, ctx }
    }

    /// Business group name, used as the tag of every created resource
    #[must_use]
    pub fn tag(&self) -> String {
        group_tag(&self.identity, &*self.status)
    }

    /// Region and project
    #[must_use]
    pub fn ctx(&self) -> &RequestContext {
        &self.ctx
    }

    /// Cluster name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Read-only view handed to machine passes
    #[must_use]
    pub fn view(&self) -> ClusterView<'_> {
        ClusterView {
            identity: &self.identity,
            spec: self.spec,
            status: &*self.status,
        }
    }
}

/// Read-only view of the cluster a machine belongs to
#[derive(Debug, Clone, Copy)]
pub struct ClusterView<'a> {
    /// Identity
    pub identity: &'a ClusterIdentity,
    /// Declared state
    pub spec: &'a UCloudClusterSpec,
    /// Observed state
    pub status: &'a UCloudClusterStatus,
}

impl ClusterView<'_> {
    /// Business group name
    #[must_use]
    pub fn tag(&self) -> String {
        group_tag(self.identity, self.status)
    }
}

/// `ucloud://{project}/{zone}/{instance}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderId {
    /// Project
    pub project_id: String,
    /// Zone
    pub zone: String,
    /// Instance id
    pub instance_id: String,
}

impl ProviderId {
    /// Parse a provider id; `None` unless it has the scheme and three non-empty parts
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.strip_prefix(PROVIDER_ID_SCHEME)?.split('/');
        let (project_id, zone, instance_id) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || [project_id, zone, instance_id].iter().any(|p| p.is_empty()) {
            return None;
        }
        Some(Self {
            project_id: project_id.to_string(),
            zone: zone.to_string(),
            instance_id: instance_id.to_string(),
        })
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PROVIDER_ID_SCHEME}{}/{}/{}", self.project_id, self.zone, self.instance_id)
    }
}

/// One machine pass
#[derive(Debug)]
pub struct MachineScope<'a> {
    /// Namespace
    pub namespace: String,
    /// Machine name
    pub name: String,
    /// Declared state
    pub spec: &'a UCloudMachineSpec,
    /// Observed state, written back by the caller
    pub status: &'a mut UCloudMachineStatus,
    /// Provider id; the caller patches the spec when this changes
    pub provider_id: Option<String>,
    /// Whether the machine runs the control plane
    pub control_plane: bool,
}

impl<'a> MachineScope<'a> {
    /// Scope for one pass over a machine
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: &'a UCloudMachineSpec,
        status: &'a mut UCloudMachineStatus,
        control_plane: bool,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            provider_id: spec.provider_id.clone(),
            spec,
            status,
            control_plane,
        }
    }

    /// Instance id carried by the provider id
    #[must_use]
    pub fn instance_id(&self) -> Option<String> {
        self.provider_id
            .as_deref()
            .and_then(ProviderId::parse)
            .map(|id| id.instance_id)
    }

    /// Zone: the machine's failure domain, else the zone recorded in status
    #[must_use]
    pub fn zone(&self) -> &str {
        match self.spec.failure_domain.as_deref() {
            Some(zone) if !zone.is_empty() => zone,
            _ => &self.status.zone,
        }
    }

    /// Instance name
    #[must_use]
    pub fn instance_name(&self) -> String {
        format!("{}-{}", self.namespace, self.name)
    }

    /// Role sent to the registration service
    #[must_use]
    pub fn role(&self) -> &'static str {
        if self.control_plane { "master" } else { "node" }
    }
}

impl fmt::Display for MachineScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ClusterIdentity {
        ClusterIdentity {
            namespace: "default".to_string(),
            name: "demo".to_string(),
            project_id: "org-1".to_string(),
            region: "cn-bj2".to_string(),
            version: "v1.18.3".to_string(),
            creation_timestamp: "2020-06-01T08:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_group_name_is_deterministic() {
        let first = identity().group_name();
        let second = identity().group_name();
        assert_eq!(first, second);
        assert!(first.starts_with("capu-"));
        assert_eq!(first.len(), "capu-".len() + 36);
    }

    #[test]
    fn test_group_name_depends_on_every_identity_field() {
        let base = identity().group_name();
        let mut other = identity();
        other.creation_timestamp = "2020-06-01T08:00:01Z".to_string();
        assert_ne!(base, other.group_name());
        let mut other = identity();
        other.namespace = "prod".to_string();
        assert_ne!(base, other.group_name());
    }

    #[test]
    fn test_recorded_group_name_wins_over_derived() {
        let mut status = UCloudClusterStatus::default();
        assert_eq!(group_tag(&identity(), &status), identity().group_name());

        status.group.group_name = identity().group_name();
        let mut upgraded = identity();
        upgraded.version = "v1.19.0".to_string();
        assert_ne!(upgraded.group_name(), status.group.group_name);
        assert_eq!(group_tag(&upgraded, &status), status.group.group_name);
    }

    #[test]
    fn test_provider_id_round_trip() {
        let id = ProviderId {
            project_id: "org-1".to_string(),
            zone: "cn-bj2-02".to_string(),
            instance_id: "uhost-abc".to_string(),
        };
        assert_eq!(id.to_string(), "ucloud://org-1/cn-bj2-02/uhost-abc");
        assert_eq!(ProviderId::parse(&id.to_string()), Some(id));
    }

    #[test]
    fn test_provider_id_rejects_malformed() {
        assert_eq!(ProviderId::parse("aws://org-1/cn-bj2-02/uhost-abc"), None);
        assert_eq!(ProviderId::parse("ucloud://org-1/uhost-abc"), None);
        assert_eq!(ProviderId::parse("ucloud://org-1//uhost-abc"), None);
        assert_eq!(ProviderId::parse("ucloud://a/b/c/d"), None);
    }

    #[test]
    fn test_machine_zone_prefers_failure_domain() {
        let spec = UCloudMachineSpec {
            failure_domain: Some("cn-bj2-04".to_string()),
            ..Default::default()
        };
        let mut status = UCloudMachineStatus {
            zone: "cn-bj2-02".to_string(),
            ..Default::default()
        };
        let scope = MachineScope::new("default", "cp-0", &spec, &mut status, true);
        assert_eq!(scope.zone(), "cn-bj2-04");
        assert_eq!(scope.instance_name(), "default-cp-0");
        assert_eq!(scope.role(), "master");
        assert_eq!(scope.instance_id(), None);
    }
}
