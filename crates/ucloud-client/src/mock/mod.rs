//! Mock UCloudClient for unit testing
//!
//! This module provides an in-memory implementation of `UCloudClientTrait` and
//! `RegistrationClientTrait` that can be used in unit tests without credentials.
//!
//! The mock is organized into domain-specific modules:
//! - `network.rs` - VPC, subnet, NAT gateway, firewall, EIP and load balancer operations
//! - `compute.rs` - UHost operations, including scripted lifecycle states
//! - `group.rs` - business groups and the cluster registration service
//!
//! Every call is appended to an ordered log (`calls()`) so tests can assert on
//! which actions ran and in what order.

mod compute;
mod group;
mod network;

use crate::error::UCloudError;
use crate::models::*;
use crate::ucloud_trait::{RegistrationClientTrait, UCloudClientTrait};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory state shared by all clones of one mock
#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub(crate) vpcs: Vec<Vpc>,
    pub(crate) subnets: Vec<Subnet>,
    pub(crate) nat_gateways: Vec<NatGateway>,
    pub(crate) firewalls: Vec<Firewall>,
    pub(crate) eips: Vec<Eip>,
    pub(crate) eip_bindings: Vec<(String, String, String)>,
    pub(crate) load_balancers: Vec<LoadBalancer>,
    pub(crate) uhosts: Vec<UHostInstance>,
    pub(crate) groups: Vec<BusinessGroup>,
    pub(crate) group_resources: HashMap<String, Vec<GroupResource>>,
    pub(crate) registrations: Vec<String>,
    pub(crate) registered_hosts: Vec<RegisterHostRequest>,
    pub(crate) last_cluster_registration: Option<RegisterClusterRequest>,
    /// Per-instance states returned by successive describes; the last one sticks
    pub(crate) uhost_states: HashMap<String, VecDeque<String>>,
    pub(crate) next_create_states: Option<Vec<String>>,
    /// Instances that TerminateUHostInstance accepts but never removes
    pub(crate) stuck_uhosts: HashSet<String>,
    pub(crate) last_uhost_request: Option<CreateUHostRequest>,
    pub(crate) failures: HashMap<String, i64>,
    pub(crate) eip_address_pending: bool,
    pub(crate) calls: Vec<String>,
    pub(crate) next_id: u64,
}

impl MockState {
    pub(crate) fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    /// Attach a resource to the business group whose name equals `tag`
    pub(crate) fn attach_to_group(&mut self, tag: &str, resource: GroupResource) {
        let group_id = self
            .groups
            .iter()
            .find(|g| g.business_name == tag)
            .map(|g| g.business_id.clone());
        if let Some(group_id) = group_id {
            self.group_resources.entry(group_id).or_default().push(resource);
        }
    }

    pub(crate) fn detach_from_groups(&mut self, id: &str) {
        for resources in self.group_resources.values_mut() {
            resources.retain(|r| r.id != id);
        }
    }
}

/// Mock UCloudClient for testing
///
/// This mock stores resources in memory and can be configured to return
/// specific responses (provider return codes, lifecycle states) for testing
/// different scenarios.
#[derive(Clone, Default)]
pub struct MockUCloudClient {
    pub(crate) state: Arc<Mutex<MockState>>,
}

impl std::fmt::Debug for MockUCloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockUCloudClient").finish_non_exhaustive()
    }
}

impl MockUCloudClient {
    /// Create a new, empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log `action` and fail it when a return code was injected for it
    pub(crate) fn record(&self, state: &mut MockState, action: &str) -> Result<(), UCloudError> {
        state.calls.push(action.to_string());
        match state.failures.get(action) {
            Some(code) => Err(UCloudError::RetCode {
                action: action.to_string(),
                code: *code,
                message: format!("mock failure for {action}"),
            }),
            None => Ok(()),
        }
    }

    /// Add a VPC to the mock store (for test setup)
    pub fn add_vpc(&self, vpc: Vpc) {
        self.lock().vpcs.push(vpc);
    }

    /// Add a subnet to the mock store (for test setup)
    pub fn add_subnet(&self, subnet: Subnet) {
        self.lock().subnets.push(subnet);
    }

    /// Add a NAT gateway to the mock store (for test setup)
    pub fn add_nat_gateway(&self, natgw: NatGateway) {
        self.lock().nat_gateways.push(natgw);
    }

    /// Add a firewall to the mock store (for test setup)
    pub fn add_firewall(&self, firewall: Firewall) {
        self.lock().firewalls.push(firewall);
    }

    /// Add an elastic IP to the mock store (for test setup)
    pub fn add_eip(&self, eip: Eip) {
        self.lock().eips.push(eip);
    }

    /// Add a load balancer to the mock store (for test setup)
    pub fn add_load_balancer(&self, ulb: LoadBalancer) {
        self.lock().load_balancers.push(ulb);
    }

    /// Add an instance to the mock store (for test setup)
    pub fn add_uhost(&self, uhost: UHostInstance) {
        self.lock().uhosts.push(uhost);
    }

    /// Add a business group to the mock store (for test setup)
    pub fn add_business_group(&self, group: BusinessGroup) {
        self.lock().groups.push(group);
    }

    /// Attach a resource to a business group (for test setup)
    pub fn add_group_resource(&self, group_id: &str, resource: GroupResource) {
        self.lock()
            .group_resources
            .entry(group_id.to_string())
            .or_default()
            .push(resource);
    }

    /// Make successive describes of `uhost_id` report `states`, one per call
    pub fn queue_uhost_states(&self, uhost_id: &str, states: &[&str]) {
        self.lock().uhost_states.insert(
            uhost_id.to_string(),
            states.iter().map(ToString::to_string).collect(),
        );
    }

    /// Accept termination of `uhost_id` without ever removing it
    pub fn keep_uhost_after_terminate(&self, uhost_id: &str) {
        self.lock().stuck_uhosts.insert(uhost_id.to_string());
    }

    /// Script the states of the next created instance instead of `Running`
    pub fn set_next_create_states(&self, states: &[&str]) {
        self.lock().next_create_states = Some(states.iter().map(ToString::to_string).collect());
    }

    /// Fail every call of `action` with the given provider return code
    pub fn fail_with_retcode(&self, action: &str, code: i64) {
        self.lock().failures.insert(action.to_string(), code);
    }

    /// Stop failing `action`
    pub fn clear_failure(&self, action: &str) {
        self.lock().failures.remove(action);
    }

    /// Allocate elastic IPs without an address, as the provider does briefly
    pub fn set_eip_address_pending(&self, pending: bool) {
        self.lock().eip_address_pending = pending;
    }

    /// Give every address-less elastic IP an address, as the provider eventually does
    pub fn assign_pending_eip_addresses(&self) {
        let mut state = self.lock();
        let mut next = state.next_id;
        for eip in state.eips.iter_mut().filter(|e| e.eip_addr.is_empty()) {
            next += 1;
            eip.eip_addr.push(EipAddr {
                operator_name: String::new(),
                ip: format!("106.75.2.{next}"),
            });
        }
        state.next_id = next;
    }

    /// Ordered log of every action called
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Forget the call log
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of calls of one action
    pub fn calls_of(&self, action: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.as_str() == action).count()
    }

    /// Number of resource-creating calls
    pub fn create_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with("Create") || c.starts_with("Allocate"))
            .count()
    }

    /// Number of lookup calls
    pub fn describe_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with("Describe") || c.starts_with("List") || c.starts_with("Search"))
            .count()
    }

    /// Current VPCs
    pub fn vpcs(&self) -> Vec<Vpc> {
        self.lock().vpcs.clone()
    }

    /// Current subnets
    pub fn subnets(&self) -> Vec<Subnet> {
        self.lock().subnets.clone()
    }

    /// Current NAT gateways
    pub fn nat_gateways(&self) -> Vec<NatGateway> {
        self.lock().nat_gateways.clone()
    }

    /// Current elastic IPs
    pub fn eips(&self) -> Vec<Eip> {
        self.lock().eips.clone()
    }

    /// Resources attached to a business group
    pub fn group_resources(&self, group_id: &str) -> Vec<GroupResource> {
        self.lock().group_resources.get(group_id).cloned().unwrap_or_default()
    }

    /// Current load balancers
    pub fn load_balancers(&self) -> Vec<LoadBalancer> {
        self.lock().load_balancers.clone()
    }

    /// Current instances
    pub fn uhosts(&self) -> Vec<UHostInstance> {
        self.lock().uhosts.clone()
    }

    /// Current business groups
    pub fn business_groups(&self) -> Vec<BusinessGroup> {
        self.lock().groups.clone()
    }

    /// EIP bindings as `(eip, resource, resource type)`
    pub fn eip_bindings(&self) -> Vec<(String, String, String)> {
        self.lock().eip_bindings.clone()
    }

    /// Parameters of the last CreateUHostInstance call
    pub fn last_uhost_request(&self) -> Option<CreateUHostRequest> {
        self.lock().last_uhost_request.clone()
    }

    /// Active cluster registrations
    pub fn registrations(&self) -> Vec<String> {
        self.lock().registrations.clone()
    }

    /// Parameters of the most recent cluster registration
    pub fn last_cluster_registration(&self) -> Option<RegisterClusterRequest> {
        self.lock().last_cluster_registration.clone()
    }

    /// Registered hosts
    pub fn registered_hosts(&self) -> Vec<RegisterHostRequest> {
        self.lock().registered_hosts.clone()
    }
}

#[async_trait::async_trait]
impl UCloudClientTrait for MockUCloudClient {
    async fn describe_vpcs(&self, _ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Vpc>, UCloudError> {
        network::describe_vpcs(self, filter)
    }
    async fn create_vpc(&self, _ctx: &RequestContext, request: &CreateVpcRequest) -> Result<String, UCloudError> {
        network::create_vpc(self, request)
    }
    async fn delete_vpc(&self, _ctx: &RequestContext, vpc_id: &str) -> Result<(), UCloudError> {
        network::delete_vpc(self, vpc_id)
    }
    async fn describe_subnets(&self, _ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Subnet>, UCloudError> {
        network::describe_subnets(self, filter)
    }
    async fn create_subnet(&self, _ctx: &RequestContext, request: &CreateSubnetRequest) -> Result<String, UCloudError> {
        network::create_subnet(self, request)
    }
    async fn delete_subnet(&self, _ctx: &RequestContext, subnet_id: &str) -> Result<(), UCloudError> {
        network::delete_subnet(self, subnet_id)
    }
    async fn describe_nat_gateways(&self, _ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<NatGateway>, UCloudError> {
        network::describe_nat_gateways(self, filter)
    }
    async fn create_nat_gateway(&self, _ctx: &RequestContext, request: &CreateNatGatewayRequest) -> Result<String, UCloudError> {
        network::create_nat_gateway(self, request)
    }
    async fn delete_nat_gateway(&self, _ctx: &RequestContext, natgw_id: &str, release_eip: bool) -> Result<(), UCloudError> {
        network::delete_nat_gateway(self, natgw_id, release_eip)
    }
    async fn describe_firewalls(&self, _ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Firewall>, UCloudError> {
        network::describe_firewalls(self, filter)
    }
    async fn describe_eips(&self, _ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Eip>, UCloudError> {
        network::describe_eips(self, filter)
    }
    async fn allocate_eip(&self, _ctx: &RequestContext, request: &AllocateEipRequest) -> Result<Eip, UCloudError> {
        network::allocate_eip(self, request)
    }
    async fn release_eip(&self, _ctx: &RequestContext, eip_id: &str) -> Result<(), UCloudError> {
        network::release_eip(self, eip_id)
    }
    async fn bind_eip(&self, _ctx: &RequestContext, eip_id: &str, resource_id: &str, resource_type: &str) -> Result<(), UCloudError> {
        network::bind_eip(self, eip_id, resource_id, resource_type)
    }
    async fn unbind_eip(&self, _ctx: &RequestContext, eip_id: &str, resource_id: &str, resource_type: &str) -> Result<(), UCloudError> {
        network::unbind_eip(self, eip_id, resource_id, resource_type)
    }
    async fn describe_load_balancers(&self, _ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<LoadBalancer>, UCloudError> {
        network::describe_load_balancers(self, filter)
    }
    async fn create_load_balancer(&self, _ctx: &RequestContext, request: &CreateLoadBalancerRequest) -> Result<String, UCloudError> {
        network::create_load_balancer(self, request)
    }
    async fn delete_load_balancer(&self, _ctx: &RequestContext, ulb_id: &str, release_eip: bool) -> Result<(), UCloudError> {
        network::delete_load_balancer(self, ulb_id, release_eip)
    }
    async fn describe_vservers(&self, _ctx: &RequestContext, ulb_id: &str, vserver_id: &str) -> Result<Vec<VServer>, UCloudError> {
        network::describe_vservers(self, ulb_id, vserver_id)
    }
    async fn create_vserver(&self, _ctx: &RequestContext, request: &CreateVServerRequest) -> Result<String, UCloudError> {
        network::create_vserver(self, request)
    }
    async fn allocate_backend(&self, _ctx: &RequestContext, request: &AllocateBackendRequest) -> Result<String, UCloudError> {
        network::allocate_backend(self, request)
    }
    async fn release_backend(&self, _ctx: &RequestContext, ulb_id: &str, backend_id: &str) -> Result<(), UCloudError> {
        network::release_backend(self, ulb_id, backend_id)
    }
    async fn describe_uhost_instances(&self, _ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<UHostInstance>, UCloudError> {
        compute::describe_uhost_instances(self, filter)
    }
    async fn create_uhost_instance(&self, _ctx: &RequestContext, request: &CreateUHostRequest) -> Result<String, UCloudError> {
        compute::create_uhost_instance(self, request)
    }
    async fn poweroff_uhost_instance(&self, _ctx: &RequestContext, _zone: &str, uhost_id: &str) -> Result<(), UCloudError> {
        compute::poweroff_uhost_instance(self, uhost_id)
    }
    async fn terminate_uhost_instance(&self, _ctx: &RequestContext, _zone: &str, uhost_id: &str, _release_eip: bool, _release_udisk: bool) -> Result<(), UCloudError> {
        compute::terminate_uhost_instance(self, uhost_id)
    }
    async fn list_business_groups(&self, _ctx: &RequestContext) -> Result<Vec<BusinessGroup>, UCloudError> {
        group::list_business_groups(self)
    }
    async fn create_business_group(&self, _ctx: &RequestContext, name: &str) -> Result<BusinessGroup, UCloudError> {
        group::create_business_group(self, name)
    }
    async fn delete_business_group(&self, _ctx: &RequestContext, group_id: &str) -> Result<(), UCloudError> {
        group::delete_business_group(self, group_id)
    }
    async fn search_business_group_resources(&self, _ctx: &RequestContext, group_id: &str, limit: Option<u32>) -> Result<GroupResourcePage, UCloudError> {
        group::search_business_group_resources(self, group_id, limit)
    }
}

#[async_trait::async_trait]
impl RegistrationClientTrait for MockUCloudClient {
    async fn register_cluster(&self, _ctx: &RequestContext, request: &RegisterClusterRequest) -> Result<String, UCloudError> {
        group::register_cluster(self, request)
    }
    async fn deregister_cluster(&self, _ctx: &RequestContext, cluster_id: &str) -> Result<(), UCloudError> {
        group::deregister_cluster(self, cluster_id)
    }
    async fn register_host(&self, _ctx: &RequestContext, request: &RegisterHostRequest) -> Result<(), UCloudError> {
        group::register_host(self, request)
    }
    async fn deregister_host(&self, _ctx: &RequestContext, cluster_id: &str, instance_id: &str) -> Result<(), UCloudError> {
        group::deregister_host(self, cluster_id, instance_id)
    }
}
