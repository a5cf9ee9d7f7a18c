//! UCloud client traits for mocking
//!
//! `UCloudClientTrait` covers the resource APIs the controller drives,
//! `RegistrationClientTrait` the external cluster registration service.
//! The concrete `UCloudClient` implements both; tests use `MockUCloudClient`.

use crate::error::UCloudError;
use crate::models::*;

/// Resource operations against the UCloud API
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait UCloudClientTrait: Send + Sync {
    // VPC
    async fn describe_vpcs(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Vpc>, UCloudError>;
    async fn create_vpc(&self, ctx: &RequestContext, request: &CreateVpcRequest) -> Result<String, UCloudError>;
    async fn delete_vpc(&self, ctx: &RequestContext, vpc_id: &str) -> Result<(), UCloudError>;

    // Subnet
    async fn describe_subnets(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Subnet>, UCloudError>;
    async fn create_subnet(&self, ctx: &RequestContext, request: &CreateSubnetRequest) -> Result<String, UCloudError>;
    async fn delete_subnet(&self, ctx: &RequestContext, subnet_id: &str) -> Result<(), UCloudError>;

    // NAT gateway
    async fn describe_nat_gateways(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<NatGateway>, UCloudError>;
    async fn create_nat_gateway(&self, ctx: &RequestContext, request: &CreateNatGatewayRequest) -> Result<String, UCloudError>;
    async fn delete_nat_gateway(&self, ctx: &RequestContext, natgw_id: &str, release_eip: bool) -> Result<(), UCloudError>;

    // Firewall
    async fn describe_firewalls(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Firewall>, UCloudError>;

    // Elastic IP
    async fn describe_eips(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Eip>, UCloudError>;
    async fn allocate_eip(&self, ctx: &RequestContext, request: &AllocateEipRequest) -> Result<Eip, UCloudError>;
    async fn release_eip(&self, ctx: &RequestContext, eip_id: &str) -> Result<(), UCloudError>;
    async fn bind_eip(&self, ctx: &RequestContext, eip_id: &str, resource_id: &str, resource_type: &str) -> Result<(), UCloudError>;
    async fn unbind_eip(&self, ctx: &RequestContext, eip_id: &str, resource_id: &str, resource_type: &str) -> Result<(), UCloudError>;

    // Load balancer
    async fn describe_load_balancers(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<LoadBalancer>, UCloudError>;
    async fn create_load_balancer(&self, ctx: &RequestContext, request: &CreateLoadBalancerRequest) -> Result<String, UCloudError>;
    async fn delete_load_balancer(&self, ctx: &RequestContext, ulb_id: &str, release_eip: bool) -> Result<(), UCloudError>;
    async fn describe_vservers(&self, ctx: &RequestContext, ulb_id: &str, vserver_id: &str) -> Result<Vec<VServer>, UCloudError>;
    async fn create_vserver(&self, ctx: &RequestContext, request: &CreateVServerRequest) -> Result<String, UCloudError>;
    async fn allocate_backend(&self, ctx: &RequestContext, request: &AllocateBackendRequest) -> Result<String, UCloudError>;
    async fn release_backend(&self, ctx: &RequestContext, ulb_id: &str, backend_id: &str) -> Result<(), UCloudError>;

    // Compute
    async fn describe_uhost_instances(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<UHostInstance>, UCloudError>;
    async fn create_uhost_instance(&self, ctx: &RequestContext, request: &CreateUHostRequest) -> Result<String, UCloudError>;
    async fn poweroff_uhost_instance(&self, ctx: &RequestContext, zone: &str, uhost_id: &str) -> Result<(), UCloudError>;
    async fn terminate_uhost_instance(&self, ctx: &RequestContext, zone: &str, uhost_id: &str, release_eip: bool, release_udisk: bool) -> Result<(), UCloudError>;

    // Business group
    async fn list_business_groups(&self, ctx: &RequestContext) -> Result<Vec<BusinessGroup>, UCloudError>;
    async fn create_business_group(&self, ctx: &RequestContext, name: &str) -> Result<BusinessGroup, UCloudError>;
    async fn delete_business_group(&self, ctx: &RequestContext, group_id: &str) -> Result<(), UCloudError>;
    async fn search_business_group_resources(&self, ctx: &RequestContext, group_id: &str, limit: Option<u32>) -> Result<GroupResourcePage, UCloudError>;
}

/// External cluster registration service
#[async_trait::async_trait]
pub trait RegistrationClientTrait: Send + Sync {
    /// Register a cluster, returning its registration id
    async fn register_cluster(&self, ctx: &RequestContext, request: &RegisterClusterRequest) -> Result<String, UCloudError>;
    /// Remove a cluster registration
    async fn deregister_cluster(&self, ctx: &RequestContext, cluster_id: &str) -> Result<(), UCloudError>;
    /// Register an instance as a cluster host
    async fn register_host(&self, ctx: &RequestContext, request: &RegisterHostRequest) -> Result<(), UCloudError>;
    /// Remove an instance from a cluster registration
    async fn deregister_host(&self, ctx: &RequestContext, cluster_id: &str, instance_id: &str) -> Result<(), UCloudError>;
}
