//! Reconciliation logic for UCloudCluster and UCloudMachine.
//!
//! This module is organized by the provider resources a cluster owns:
//! - `group`: business group and the delete-time resource sweep
//! - `network`: VPC, subnet, firewall, elastic IP, NAT gateway, load balancer
//! - `instance`: UHost create, lookup and terminate with polling
//! - `bastion`: optional bastion host
//! - `registration`: external cluster and host registration
//! - `cluster` / `machine`: the orchestrators the watchers call
//!
//! Nothing here talks to the Kubernetes API. Passes mutate the status held by
//! their scope and the watcher persists it afterwards.

pub mod bastion;
pub mod cluster;
pub mod group;
pub mod instance;
pub mod machine;
pub mod network;
pub mod registration;

#[cfg(test)]
mod cluster_test;
#[cfg(test)]
mod machine_test;

use crate::backoff::FibonacciBackoff;
use crate::clock::{Clock, SystemClock};
use crate::config::RegionTable;
use crate::placement::{RandomZoneSelector, ZoneSelector};
use crate::secrets::SecretStore;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;
use ucloud_client::{Credential, RegistrationClientTrait, UCloudClientTrait};

/// Delay before re-entering a pass that waits on an asynchronous condition
pub const REQUEUE_AFTER: Duration = Duration::from_secs(15);

/// Delay before re-reading an instance that reports no state yet
pub const EMPTY_STATE_REQUEUE_AFTER: Duration = Duration::from_secs(5);

/// Interval between describes while waiting for an instance to boot
pub const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Interval between describes while waiting for power-off and termination
pub const STOP_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Deadline of each instance polling phase
pub const PHASE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// What the caller should do once a pass returns successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged, wait for the next change
    Done,
    /// Incomplete, run again after the delay
    RequeueAfter(Duration),
}

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(1, 10), // 1 minute min, 10 minutes max
            error_count: 0,
        }
    }

    fn increment_error(&mut self) {
        self.error_count += 1;
    }

    fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Reconciles UCloud infrastructure for clusters and machines.
pub struct Reconciler {
    pub(crate) cloud: Arc<dyn UCloudClientTrait>,
    pub(crate) registration: Arc<dyn RegistrationClientTrait>,
    pub(crate) secrets: Arc<dyn SecretStore>,
    pub(crate) regions: Arc<RegionTable>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) zones: Arc<dyn ZoneSelector>,
    /// Injected into instance bootstrap payloads
    pub(crate) credential: Credential,
    /// Error count tracking per resource (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("clock", &self.clock)
            .field("zones", &self.zones)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        cloud: Arc<dyn UCloudClientTrait>,
        registration: Arc<dyn RegistrationClientTrait>,
        secrets: Arc<dyn SecretStore>,
        regions: Arc<RegionTable>,
        credential: Credential,
    ) -> Self {
        Self {
            cloud,
            registration,
            secrets,
            regions,
            clock: Arc::new(SystemClock::new()),
            zones: Arc::new(RandomZoneSelector),
            credential,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace the time source used by instance polling
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the zone choice used for instances without a zone
    #[must_use]
    pub fn with_zone_selector(mut self, zones: Arc<dyn ZoneSelector>) -> Self {
        self.zones = zones;
        self
    }

    /// Get backoff duration for a resource based on error count
    pub fn get_backoff_for_resource(&self, resource_key: &str) -> (u64, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(resource_key.to_string()).or_insert_with(BackoffState::new);
                let backoff_seconds = state.backoff.next_backoff_seconds();
                (backoff_seconds, state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (60, 0) // 60 seconds default
            }
        }
    }

    /// Increment error count for a resource
    pub fn increment_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.entry(resource_key.to_string()).or_insert_with(BackoffState::new).increment_error();
        }
    }

    /// Reset error count for a resource (on successful reconciliation)
    pub fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }

    /// Drop the backoff state of a resource that no longer exists
    pub fn forget_resource(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_resources(&self) -> usize {
        self.backoff_states.lock().map(|states| states.len()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;

    #[test]
    fn test_backoff_grows_per_resource_and_resets() {
        let (reconciler, _mock) = create_test_reconciler();

        reconciler.increment_error("default/demo");
        assert_eq!(reconciler.get_backoff_for_resource("default/demo"), (60, 1));
        reconciler.increment_error("default/demo");
        assert_eq!(reconciler.get_backoff_for_resource("default/demo"), (60, 2));
        assert_eq!(reconciler.get_backoff_for_resource("default/demo").0, 120);
        assert_eq!(reconciler.get_backoff_for_resource("default/other"), (60, 0));

        reconciler.reset_error("default/demo");
        assert_eq!(reconciler.get_backoff_for_resource("default/demo"), (60, 0));
    }

    #[test]
    fn test_forgotten_resource_releases_its_backoff() {
        let (reconciler, _mock) = create_test_reconciler();

        reconciler.increment_error("default/demo");
        reconciler.increment_error("default/worker-0");
        assert_eq!(reconciler.tracked_resources(), 2);

        reconciler.forget_resource("default/demo");
        assert_eq!(reconciler.tracked_resources(), 1);
        reconciler.forget_resource("default/absent");
        assert_eq!(reconciler.tracked_resources(), 1);
        assert_eq!(reconciler.get_backoff_for_resource("default/demo"), (60, 0));
    }
}
