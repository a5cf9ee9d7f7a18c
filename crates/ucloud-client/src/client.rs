//! UCloud API client
//!
//! Implements the UCloud OpenAPI actions used by the infrastructure controller:
//! VPC, UNet (EIP, firewall), ULB, UHost, business groups and the UK8S
//! cluster registration endpoints.

use crate::common::{HttpClient, Params};
use crate::error::UCloudError;
use crate::models::*;
use crate::ucloud_trait::{RegistrationClientTrait, UCloudClientTrait};
use reqwest::Client;
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::time::Duration;
use tracing::debug;

/// Default public endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.ucloud.cn";

/// UCloud API client
pub struct UCloudClient {
    http: HttpClient,
}

impl UCloudClient {
    /// Create a new UCloud client
    ///
    /// # Arguments
    /// * `base_url` - API endpoint (e.g., "https://api.ucloud.cn")
    /// * `credential` - key pair used to sign every request
    pub fn new(base_url: String, credential: Credential) -> Result<Self, UCloudError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(UCloudError::Network)?;

        Ok(Self {
            http: HttpClient::new(client, base_url, credential),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Check the credential by listing the project's business groups
    pub async fn validate_credential(&self, ctx: &RequestContext) -> Result<(), UCloudError> {
        debug!("Validating UCloud credential and connectivity");
        match self.list_business_groups(ctx).await {
            Ok(_) => Ok(()),
            Err(UCloudError::RetCode { code: 171, message, .. }) => {
                Err(UCloudError::Authentication(format!("signature rejected: {message}")))
            }
            Err(e) => Err(e),
        }
    }
}

fn filter_params(mut params: Params, filter: &ResourceFilter, id_key: &str) -> Params {
    params = params
        .set_opt("Tag", filter.tag.as_deref())
        .set_opt("VPCId", filter.vpc_id.as_deref())
        .set_opt("SubnetId", filter.subnet_id.as_deref())
        .set_opt("Zone", filter.zone.as_deref());
    params.set_list(id_key, &filter.ids)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DataSet<T> {
    data_set: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreatedId {
    #[serde(alias = "VPCId", alias = "SubnetId", alias = "NATGWId", alias = "ULBId", alias = "VServerId", alias = "BackendId", alias = "ClusterId")]
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct EipSetResponse {
    #[serde(rename = "EIPSet")]
    eip_set: Vec<Eip>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct UHostSetResponse {
    #[serde(rename = "UHostSet")]
    uhost_set: Vec<UHostInstance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct UHostIdsResponse {
    #[serde(rename = "UHostIds")]
    uhost_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct BusinessGroupList {
    infos: Vec<BusinessGroup>,
}

#[async_trait::async_trait]
impl UCloudClientTrait for UCloudClient {
    async fn describe_vpcs(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Vpc>, UCloudError> {
        let params = filter_params(Params::new("DescribeVPC").context(ctx), filter, "VPCIds");
        let res: DataSet<Vpc> = self.http.call(params).await?;
        Ok(res.data_set)
    }

    async fn create_vpc(&self, ctx: &RequestContext, request: &CreateVpcRequest) -> Result<String, UCloudError> {
        let params = Params::new("CreateVPC")
            .context(ctx)
            .set("Name", &request.name)
            .set("Tag", &request.tag)
            .set_list("Network", &request.network);
        let res: CreatedId = self.http.call(params).await?;
        Ok(res.id)
    }

    async fn delete_vpc(&self, ctx: &RequestContext, vpc_id: &str) -> Result<(), UCloudError> {
        let params = Params::new("DeleteVPC").context(ctx).set("VPCId", vpc_id);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn describe_subnets(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Subnet>, UCloudError> {
        let params = filter_params(Params::new("DescribeSubnet").context(ctx), filter, "SubnetIds");
        let res: DataSet<Subnet> = self.http.call(params).await?;
        Ok(res.data_set)
    }

    async fn create_subnet(&self, ctx: &RequestContext, request: &CreateSubnetRequest) -> Result<String, UCloudError> {
        let params = Params::new("CreateSubnet")
            .context(ctx)
            .set("VPCId", &request.vpc_id)
            .set("SubnetName", &request.subnet_name)
            .set("Subnet", &request.subnet)
            .set("Netmask", request.netmask)
            .set("Tag", &request.tag);
        let res: CreatedId = self.http.call(params).await?;
        Ok(res.id)
    }

    async fn delete_subnet(&self, ctx: &RequestContext, subnet_id: &str) -> Result<(), UCloudError> {
        let params = Params::new("DeleteSubnet").context(ctx).set("SubnetId", subnet_id);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn describe_nat_gateways(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<NatGateway>, UCloudError> {
        let params = filter_params(Params::new("DescribeNATGW").context(ctx), filter, "NATGWIds");
        let res: DataSet<NatGateway> = self.http.call(params).await?;
        Ok(res.data_set)
    }

    async fn create_nat_gateway(&self, ctx: &RequestContext, request: &CreateNatGatewayRequest) -> Result<String, UCloudError> {
        let params = Params::new("CreateNATGW")
            .context(ctx)
            .set("NATGWName", &request.natgw_name)
            .set("VPCId", &request.vpc_id)
            .set("FirewallId", &request.firewall_id)
            .set("Tag", &request.tag)
            .set_list("SubnetworkIds", &request.subnetwork_ids)
            .set_list("EIPIds", &request.eip_ids);
        let res: CreatedId = self.http.call(params).await?;
        Ok(res.id)
    }

    async fn delete_nat_gateway(&self, ctx: &RequestContext, natgw_id: &str, release_eip: bool) -> Result<(), UCloudError> {
        let params = Params::new("DeleteNATGW")
            .context(ctx)
            .set("NATGWId", natgw_id)
            .set("ReleaseEip", release_eip);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn describe_firewalls(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Firewall>, UCloudError> {
        let mut params = Params::new("DescribeFirewall").context(ctx);
        if let Some(id) = filter.ids.first() {
            params = params.set("FWId", id);
        }
        let res: DataSet<Firewall> = self.http.call(params).await?;
        Ok(res.data_set)
    }

    async fn describe_eips(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<Eip>, UCloudError> {
        let params = Params::new("DescribeEIP").context(ctx).set_list("EIPIds", &filter.ids);
        let res: EipSetResponse = self.http.call(params).await?;
        Ok(res.eip_set)
    }

    async fn allocate_eip(&self, ctx: &RequestContext, request: &AllocateEipRequest) -> Result<Eip, UCloudError> {
        let params = Params::new("AllocateEIP")
            .context(ctx)
            .set("OperatorName", &request.operator_name)
            .set("Bandwidth", request.bandwidth)
            .set("Tag", &request.tag)
            .set_opt("Name", request.name.as_deref());
        let res: EipSetResponse = self.http.call(params).await?;
        res.eip_set.into_iter().next().ok_or_else(|| {
            UCloudError::InvalidRequest("AllocateEIP returned an empty EIPSet".to_string())
        })
    }

    async fn release_eip(&self, ctx: &RequestContext, eip_id: &str) -> Result<(), UCloudError> {
        let params = Params::new("ReleaseEIP").context(ctx).set("EIPId", eip_id);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn bind_eip(&self, ctx: &RequestContext, eip_id: &str, resource_id: &str, resource_type: &str) -> Result<(), UCloudError> {
        let params = Params::new("BindEIP")
            .context(ctx)
            .set("EIPId", eip_id)
            .set("ResourceId", resource_id)
            .set("ResourceType", resource_type);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn unbind_eip(&self, ctx: &RequestContext, eip_id: &str, resource_id: &str, resource_type: &str) -> Result<(), UCloudError> {
        let params = Params::new("UnBindEIP")
            .context(ctx)
            .set("EIPId", eip_id)
            .set("ResourceId", resource_id)
            .set("ResourceType", resource_type);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn describe_load_balancers(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<LoadBalancer>, UCloudError> {
        let mut params = Params::new("DescribeULB")
            .context(ctx)
            .set_opt("VPCId", filter.vpc_id.as_deref())
            .set_opt("Tag", filter.tag.as_deref());
        if let Some(id) = filter.ids.first() {
            params = params.set("ULBId", id);
        }
        let res: DataSet<LoadBalancer> = self.http.call(params).await?;
        Ok(res.data_set)
    }

    async fn create_load_balancer(&self, ctx: &RequestContext, request: &CreateLoadBalancerRequest) -> Result<String, UCloudError> {
        let params = Params::new("CreateULB")
            .context(ctx)
            .set("ULBName", &request.ulb_name)
            .set("VPCId", &request.vpc_id)
            .set("ListenType", &request.listen_type)
            .set("Tag", &request.tag);
        let res: CreatedId = self.http.call(params).await?;
        Ok(res.id)
    }

    async fn delete_load_balancer(&self, ctx: &RequestContext, ulb_id: &str, release_eip: bool) -> Result<(), UCloudError> {
        let params = Params::new("DeleteULB")
            .context(ctx)
            .set("ULBId", ulb_id)
            .set("ReleaseEip", release_eip);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn describe_vservers(&self, ctx: &RequestContext, ulb_id: &str, vserver_id: &str) -> Result<Vec<VServer>, UCloudError> {
        let params = Params::new("DescribeVServer")
            .context(ctx)
            .set("ULBId", ulb_id)
            .set_opt("VServerId", Some(vserver_id));
        let res: DataSet<VServer> = self.http.call(params).await?;
        Ok(res.data_set)
    }

    async fn create_vserver(&self, ctx: &RequestContext, request: &CreateVServerRequest) -> Result<String, UCloudError> {
        let params = Params::new("CreateVServer")
            .context(ctx)
            .set("ULBId", &request.ulb_id)
            .set("VServerName", &request.vserver_name)
            .set("Protocol", &request.protocol)
            .set("FrontendPort", request.frontend_port)
            .set("ListenType", &request.listen_type)
            .set("MonitorType", &request.monitor_type);
        let res: CreatedId = self.http.call(params).await?;
        Ok(res.id)
    }

    async fn allocate_backend(&self, ctx: &RequestContext, request: &AllocateBackendRequest) -> Result<String, UCloudError> {
        let params = Params::new("AllocateBackend")
            .context(ctx)
            .set("ULBId", &request.ulb_id)
            .set("VServerId", &request.vserver_id)
            .set("ResourceId", &request.resource_id)
            .set("ResourceType", &request.resource_type)
            .set("Port", request.port);
        let res: CreatedId = self.http.call(params).await?;
        Ok(res.id)
    }

    async fn release_backend(&self, ctx: &RequestContext, ulb_id: &str, backend_id: &str) -> Result<(), UCloudError> {
        let params = Params::new("ReleaseBackend")
            .context(ctx)
            .set("ULBId", ulb_id)
            .set("BackendId", backend_id);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn describe_uhost_instances(&self, ctx: &RequestContext, filter: &ResourceFilter) -> Result<Vec<UHostInstance>, UCloudError> {
        let params = filter_params(Params::new("DescribeUHostInstance").context(ctx), filter, "UHostIds");
        let res: UHostSetResponse = self.http.call(params).await?;
        Ok(res.uhost_set)
    }

    async fn create_uhost_instance(&self, ctx: &RequestContext, request: &CreateUHostRequest) -> Result<String, UCloudError> {
        let mut params = Params::new("CreateUHostInstance")
            .context(ctx)
            .set("Zone", &request.zone)
            .set("Name", &request.name)
            .set("Tag", &request.tag)
            .set("ChargeType", &request.charge_type)
            .set("Quantity", request.quantity)
            .set("VPCId", &request.vpc_id)
            .set("SubnetId", &request.subnet_id)
            .set("ImageId", &request.image_id)
            .set("CPU", request.cpu)
            .set("Memory", request.memory)
            .set("MachineType", &request.machine_type)
            .set("MinimalCpuPlatform", &request.minimal_cpu_platform)
            .set("LoginMode", &request.login_mode)
            .set("Password", &request.password)
            .set_opt("UserData", request.user_data.as_deref());
        for (i, disk) in request.disks.iter().enumerate() {
            params = params
                .set(format!("Disks.{i}.Size"), disk.size)
                .set(format!("Disks.{i}.Type"), &disk.disk_type)
                .set(format!("Disks.{i}.IsBoot"), disk.is_boot)
                .set(format!("Disks.{i}.BackupType"), &disk.backup_type);
        }
        if let Some(eip) = &request.eip {
            params = params
                .set("NetworkInterface.0.EIP.Bandwidth", eip.bandwidth)
                .set("NetworkInterface.0.EIP.OperatorName", &eip.operator_name)
                .set("NetworkInterface.0.EIP.PayMode", &eip.pay_mode);
        }
        let res: UHostIdsResponse = self.http.call(params).await?;
        res.uhost_ids.into_iter().next().ok_or_else(|| {
            UCloudError::InvalidRequest("CreateUHostInstance returned no UHostIds".to_string())
        })
    }

    async fn poweroff_uhost_instance(&self, ctx: &RequestContext, zone: &str, uhost_id: &str) -> Result<(), UCloudError> {
        let params = Params::new("PoweroffUHostInstance")
            .context(ctx)
            .set("Zone", zone)
            .set("UHostId", uhost_id);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn terminate_uhost_instance(&self, ctx: &RequestContext, zone: &str, uhost_id: &str, release_eip: bool, release_udisk: bool) -> Result<(), UCloudError> {
        let params = Params::new("TerminateUHostInstance")
            .context(ctx)
            .set("Zone", zone)
            .set("UHostId", uhost_id)
            .set("ReleaseEIP", release_eip)
            .set("ReleaseUDisk", release_udisk);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn list_business_groups(&self, ctx: &RequestContext) -> Result<Vec<BusinessGroup>, UCloudError> {
        let params = Params::new("ListBusinessGroup").context(ctx);
        let res: BusinessGroupList = self.http.call(params).await?;
        Ok(res.infos)
    }

    async fn create_business_group(&self, ctx: &RequestContext, name: &str) -> Result<BusinessGroup, UCloudError> {
        let params = Params::new("CreateBusinessGroup").context(ctx).set("BusinessName", name);
        let mut group: BusinessGroup = self.http.call(params).await?;
        if group.business_name.is_empty() {
            group.business_name = name.to_string();
        }
        Ok(group)
    }

    async fn delete_business_group(&self, ctx: &RequestContext, group_id: &str) -> Result<(), UCloudError> {
        let params = Params::new("DeleteBusinessGroup").context(ctx).set("BusinessId", group_id);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn search_business_group_resources(&self, ctx: &RequestContext, group_id: &str, limit: Option<u32>) -> Result<GroupResourcePage, UCloudError> {
        let mut params = Params::new("SearchBusinessGroupResource")
            .set("ProjectId", &ctx.project_id)
            .set("BusinessId", group_id);
        if let Some(limit) = limit {
            params = params.set("Limit", limit);
        }
        self.http.call(params).await
    }
}

#[async_trait::async_trait]
impl RegistrationClientTrait for UCloudClient {
    async fn register_cluster(&self, ctx: &RequestContext, request: &RegisterClusterRequest) -> Result<String, UCloudError> {
        let params = Params::new("CreateCAPUCluster")
            .context(ctx)
            .set("VPCId", &request.vpc_id)
            .set("SubnetId", &request.subnet_id)
            .set("PodCIDR", &request.pod_cidr)
            .set("NATGWId", &request.natgw_id)
            .set("ServiceCIDR", &request.service_cidr)
            .set("ClusterName", &request.cluster_name)
            .set("ULBId", &request.ulb_id)
            .set("FWId", &request.fw_id)
            .set("NodeCIDR", &request.node_cidr)
            .set("K8SVersion", &request.k8s_version)
            .set("APIServer", &request.api_server)
            .set_opt("BastionId", request.bastion_id.as_deref())
            .set_opt("BastionZone", request.bastion_zone.as_deref());
        let res: CreatedId = self.http.call(params).await?;
        Ok(res.id)
    }

    async fn deregister_cluster(&self, ctx: &RequestContext, cluster_id: &str) -> Result<(), UCloudError> {
        let params = Params::new("DeleteCAPUCluster").context(ctx).set("ClusterId", cluster_id);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn register_host(&self, ctx: &RequestContext, request: &RegisterHostRequest) -> Result<(), UCloudError> {
        let params = Params::new("CreateCAPUHost")
            .context(ctx)
            .set("ClusterId", &request.cluster_id)
            .set("InstanceId", &request.instance_id)
            .set("Zone", &request.zone)
            .set("Type", "uhost")
            .set("Role", &request.role);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }

    async fn deregister_host(&self, ctx: &RequestContext, cluster_id: &str, instance_id: &str) -> Result<(), UCloudError> {
        let params = Params::new("DeleteCAPUHost")
            .context(ctx)
            .set("ClusterId", cluster_id)
            .set("InstanceId", instance_id);
        let _: IgnoredAny = self.http.call(params).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_params_include_only_set_fields() {
        let filter = ResourceFilter::tagged("capu-1").with_id("uvnet-1");
        let params = filter_params(Params::new("DescribeVPC"), &filter, "VPCIds");
        assert_eq!(params.get("Tag"), Some("capu-1"));
        assert_eq!(params.get("VPCIds.0"), Some("uvnet-1"));
        assert_eq!(params.get("VPCId"), None);
        assert_eq!(params.get("Zone"), None);
    }

    #[test]
    fn test_created_id_aliases() {
        let id: CreatedId = serde_json::from_str(r#"{"RetCode":0,"NATGWId":"natgw-1"}"#).unwrap();
        assert_eq!(id.id, "natgw-1");
        let id: CreatedId = serde_json::from_str(r#"{"RetCode":0,"ULBId":"ulb-1"}"#).unwrap();
        assert_eq!(id.id, "ulb-1");
    }

    #[test]
    fn test_uhost_set_decodes() {
        let body = r#"{"RetCode":0,"UHostSet":[{"UHostId":"uhost-1","State":"Running","Zone":"cn-bj2-02",
            "IPSet":[{"Type":"Private","IP":"10.0.0.5","Default":"true"}]}]}"#;
        let res: UHostSetResponse = serde_json::from_str(body).unwrap();
        assert_eq!(res.uhost_set[0].lifecycle_state(), UHostState::Running);
        assert_eq!(res.uhost_set[0].ip_set[0].ip, "10.0.0.5");
    }
}
