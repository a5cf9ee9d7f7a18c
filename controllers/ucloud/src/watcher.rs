//! Kubernetes resource watchers.
//!
//! This module handles watching `UCloudCluster` and `UCloudMachine` objects
//! and driving the reconciler with kube_runtime::Controller. It owns all
//! Kubernetes I/O of a pass: finalizers, the owning cluster lookup, the
//! machine count a cluster delete waits on, and writing status back.
//!
//! Status is written after every pass, successful or not, so progress made
//! before a failure is kept.

use crate::error::ControllerError;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::scope::{ClusterIdentity, ClusterScope, ClusterView, MachineScope};
use crds::{
    CLUSTER_FINALIZER, CLUSTER_NAME_LABEL, CONTROL_PLANE_LABEL, MACHINE_FINALIZER, UCloudCluster,
    UCloudClusterStatus, UCloudMachine, UCloudMachineStatus,
};
use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::{Controller, controller::{Action, Config as ControllerConfig}, watcher};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delay after adding a finalizer before the first real pass
const FINALIZER_REQUEUE: Duration = Duration::from_secs(1);

/// Shared state handed to every reconcile call
pub struct WatchContext {
    reconciler: Arc<Reconciler>,
    client: Client,
}

impl std::fmt::Debug for WatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchContext")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<Action, ControllerError>> + Send>>;

/// Generic watcher helper around kube_runtime::Controller.
///
/// The controller reconnects on watch errors and retries failed passes
/// through the error policy, which backs off per object with the
/// reconciler's Fibonacci schedule.
async fn watch_resource<K, F>(
    api: Api<K>,
    ctx: Arc<WatchContext>,
    reconcile_fn: F,
    resource_name: &'static str,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<WatchContext>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = move |obj: Arc<K>, error: &ControllerError, ctx: Arc<WatchContext>| {
        let key = resource_key(obj.as_ref());
        ctx.reconciler.increment_error(&key);
        let (backoff_seconds, error_count) = ctx.reconciler.get_backoff_for_resource(&key);
        error!(
            "Reconciliation error for {} {} (attempt {}), retrying in {}s: {}",
            resource_name, key, error_count, backoff_seconds, error
        );
        Action::requeue(Duration::from_secs(backoff_seconds))
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<WatchContext>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            debug!("Reconciling {} {}", resource_name, resource_key(obj.as_ref()));
            reconcile_fn(ctx, obj).await
        }
    };

    // Passes block on instance polling for minutes; keep a few in flight
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    Ok(())
}

fn resource_key<K: kube::Resource>(obj: &K) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

fn to_action(outcome: ReconcileOutcome) -> Action {
    match outcome {
        ReconcileOutcome::Done => Action::await_change(),
        ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
    }
}

fn has_finalizer(meta: &ObjectMeta, finalizer: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|name| name == finalizer))
}

async fn add_finalizer<K>(api: &Api<K>, meta: &ObjectMeta, name: &str, finalizer: &str) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
{
    let mut finalizers = meta.finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_string());
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
    info!("Added finalizer {} to {}", finalizer, name);
    Ok(())
}

async fn remove_finalizer<K>(api: &Api<K>, meta: &ObjectMeta, name: &str, finalizer: &str) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
{
    let finalizers: Vec<String> = meta
        .finalizers
        .iter()
        .flatten()
        .filter(|f| f.as_str() != finalizer)
        .cloned()
        .collect();
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
    info!("Removed finalizer {} from {}", finalizer, name);
    Ok(())
}

/// RFC 3339 creation timestamp, empty when the object has none yet
fn creation_timestamp(meta: &ObjectMeta) -> String {
    meta.creation_timestamp
        .as_ref()
        .and_then(|time| serde_json::to_value(time).ok())
        .and_then(|value| value.as_str().map(String::from))
        .unwrap_or_default()
}

fn cluster_identity(cluster: &UCloudCluster) -> ClusterIdentity {
    ClusterIdentity {
        namespace: cluster.namespace().unwrap_or_default(),
        name: cluster.name_any(),
        project_id: cluster.spec.project_id.clone(),
        region: cluster.spec.region.clone(),
        version: cluster.spec.version.clone(),
        creation_timestamp: creation_timestamp(&cluster.metadata),
    }
}

async fn persist_cluster_status(
    api: &Api<UCloudCluster>,
    cluster: &UCloudCluster,
    status: &UCloudClusterStatus,
) -> Result<(), ControllerError> {
    if cluster.status.as_ref() == Some(status) {
        return Ok(());
    }
    let patch = json!({ "status": status });
    api.patch_status(&cluster.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    debug!("Updated UCloudCluster {} status", resource_key(cluster));
    Ok(())
}

async fn persist_machine_status(
    api: &Api<UCloudMachine>,
    machine: &UCloudMachine,
    status: &UCloudMachineStatus,
) -> Result<(), ControllerError> {
    if machine.status.as_ref() == Some(status) {
        return Ok(());
    }
    let patch = json!({ "status": status });
    api.patch_status(&machine.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    debug!("Updated UCloudMachine {} status", resource_key(machine));
    Ok(())
}

/// Machines labelled with `cluster`
async fn count_machines(client: &Client, namespace: &str, cluster: &str) -> Result<usize, ControllerError> {
    let api: Api<UCloudMachine> = Api::namespaced(client.clone(), namespace);
    let params = ListParams::default().labels(&format!("{CLUSTER_NAME_LABEL}={cluster}"));
    Ok(api.list(&params).await?.items.len())
}

/// The `UCloudCluster` a machine's cluster label points at
async fn owning_cluster(client: &Client, machine: &UCloudMachine) -> Result<Option<UCloudCluster>, ControllerError> {
    let Some(cluster_name) = machine.labels().get(CLUSTER_NAME_LABEL) else {
        return Ok(None);
    };
    let api: Api<UCloudCluster> = Api::namespaced(client.clone(), &machine.namespace().unwrap_or_default());
    Ok(api.get_opt(cluster_name).await?)
}

async fn reconcile_cluster_object(ctx: Arc<WatchContext>, cluster: Arc<UCloudCluster>) -> Result<Action, ControllerError> {
    let namespace = cluster.namespace().unwrap_or_default();
    let name = cluster.name_any();
    let key = format!("{namespace}/{name}");
    let api: Api<UCloudCluster> = Api::namespaced(ctx.client.clone(), &namespace);
    let deleting = cluster.metadata.deletion_timestamp.is_some();

    if !has_finalizer(&cluster.metadata, CLUSTER_FINALIZER) {
        if deleting {
            return Ok(Action::await_change());
        }
        add_finalizer(&api, &cluster.metadata, &name, CLUSTER_FINALIZER).await?;
        return Ok(Action::requeue(FINALIZER_REQUEUE));
    }

    let mut status = cluster.status.clone().unwrap_or_default();
    let result = if deleting {
        let dependents = count_machines(&ctx.client, &namespace, &name).await?;
        let mut scope = ClusterScope::new(cluster_identity(&cluster), &cluster.spec, &mut status);
        ctx.reconciler.delete_cluster(&mut scope, dependents).await
    } else {
        let mut scope = ClusterScope::new(cluster_identity(&cluster), &cluster.spec, &mut status);
        ctx.reconciler.reconcile_cluster(&mut scope).await
    };

    let persisted = persist_cluster_status(&api, &cluster, &status).await;
    let outcome = result?;
    persisted?;
    ctx.reconciler.reset_error(&key);

    if deleting && outcome == ReconcileOutcome::Done {
        remove_finalizer(&api, &cluster.metadata, &name, CLUSTER_FINALIZER).await?;
        ctx.reconciler.forget_resource(&key);
        return Ok(Action::await_change());
    }
    Ok(to_action(outcome))
}

async fn reconcile_machine_object(ctx: Arc<WatchContext>, machine: Arc<UCloudMachine>) -> Result<Action, ControllerError> {
    let namespace = machine.namespace().unwrap_or_default();
    let name = machine.name_any();
    let key = format!("{namespace}/{name}");
    let api: Api<UCloudMachine> = Api::namespaced(ctx.client.clone(), &namespace);
    let deleting = machine.metadata.deletion_timestamp.is_some();

    if !has_finalizer(&machine.metadata, MACHINE_FINALIZER) {
        if deleting {
            return Ok(Action::await_change());
        }
        add_finalizer(&api, &machine.metadata, &name, MACHINE_FINALIZER).await?;
        return Ok(Action::requeue(FINALIZER_REQUEUE));
    }

    let Some(cluster) = owning_cluster(&ctx.client, &machine).await? else {
        if deleting {
            warn!("UCloudMachine {} has no cluster left, releasing it without cleanup", key);
            remove_finalizer(&api, &machine.metadata, &name, MACHINE_FINALIZER).await?;
            ctx.reconciler.forget_resource(&key);
            return Ok(Action::await_change());
        }
        info!("UCloudMachine {} is not linked to an existing UCloudCluster yet", key);
        return Ok(Action::requeue(crate::reconciler::REQUEUE_AFTER));
    };

    let identity = cluster_identity(&cluster);
    let cluster_status = cluster.status.clone().unwrap_or_default();
    let view = ClusterView {
        identity: &identity,
        spec: &cluster.spec,
        status: &cluster_status,
    };
    let control_plane = machine.labels().contains_key(CONTROL_PLANE_LABEL);

    let mut status = machine.status.clone().unwrap_or_default();
    let (result, provider_id) = {
        let mut scope = MachineScope::new(&namespace, &name, &machine.spec, &mut status, control_plane);
        let result = if deleting {
            ctx.reconciler.delete_machine(view, &mut scope).await
        } else {
            ctx.reconciler.reconcile_machine(view, &mut scope).await
        };
        (result, scope.provider_id.clone())
    };

    if provider_id.is_some() && provider_id != machine.spec.provider_id {
        let patch = json!({ "spec": { "providerID": provider_id } });
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
        info!("Set providerID of UCloudMachine {} to {:?}", key, provider_id);
    }
    let persisted = persist_machine_status(&api, &machine, &status).await;
    let outcome = result?;
    persisted?;
    ctx.reconciler.reset_error(&key);

    if deleting && outcome == ReconcileOutcome::Done {
        remove_finalizer(&api, &machine.metadata, &name, MACHINE_FINALIZER).await?;
        ctx.reconciler.forget_resource(&key);
        return Ok(Action::await_change());
    }
    Ok(to_action(outcome))
}

/// Watches Kubernetes resources for changes.
#[derive(Debug)]
pub struct Watcher {
    ctx: Arc<WatchContext>,
    cluster_api: Api<UCloudCluster>,
    machine_api: Api<UCloudMachine>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        reconciler: Arc<Reconciler>,
        client: Client,
        cluster_api: Api<UCloudCluster>,
        machine_api: Api<UCloudMachine>,
    ) -> Self {
        Self {
            ctx: Arc::new(WatchContext { reconciler, client }),
            cluster_api,
            machine_api,
        }
    }

    /// Starts watching UCloudCluster resources.
    pub async fn watch_clusters(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.cluster_api.clone(),
            self.ctx.clone(),
            |ctx, cluster| Box::pin(reconcile_cluster_object(ctx, cluster)),
            "UCloudCluster",
        )
        .await
    }

    /// Starts watching UCloudMachine resources.
    pub async fn watch_machines(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.machine_api.clone(),
            self.ctx.clone(),
            |ctx, machine| Box::pin(reconcile_machine_object(ctx, machine)),
            "UCloudMachine",
        )
        .await
    }
}
