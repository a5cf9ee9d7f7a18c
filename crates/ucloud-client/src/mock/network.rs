//! Network operations for MockUCloudClient

use super::MockUCloudClient;
use crate::error::{retcode, UCloudError};
use crate::models::*;

fn matches_tag(filter: &ResourceFilter, tag: &str) -> bool {
    filter.tag.as_deref().is_none_or(|t| t == tag)
}

fn matches_id(filter: &ResourceFilter, id: &str) -> bool {
    filter.ids.is_empty() || filter.ids.iter().any(|i| i == id)
}

fn matches_vpc(filter: &ResourceFilter, vpc_id: &str) -> bool {
    filter.vpc_id.as_deref().is_none_or(|v| v == vpc_id)
}

fn not_found(action: &str, code: i64, id: &str) -> UCloudError {
    UCloudError::RetCode {
        action: action.to_string(),
        code,
        message: format!("resource {id} not exists"),
    }
}

pub(super) fn describe_vpcs(mock: &MockUCloudClient, filter: &ResourceFilter) -> Result<Vec<Vpc>, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DescribeVPC")?;
    Ok(state
        .vpcs
        .iter()
        .filter(|v| matches_tag(filter, &v.tag) && matches_id(filter, &v.vpc_id))
        .cloned()
        .collect())
}

pub(super) fn create_vpc(mock: &MockUCloudClient, request: &CreateVpcRequest) -> Result<String, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "CreateVPC")?;
    let vpc_id = state.next_id("uvnet");
    state.vpcs.push(Vpc {
        vpc_id: vpc_id.clone(),
        name: request.name.clone(),
        network: request.network.clone(),
        tag: request.tag.clone(),
    });
    Ok(vpc_id)
}

pub(super) fn delete_vpc(mock: &MockUCloudClient, vpc_id: &str) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DeleteVPC")?;
    let before = state.vpcs.len();
    state.vpcs.retain(|v| v.vpc_id != vpc_id);
    if state.vpcs.len() == before {
        return Err(not_found("DeleteVPC", retcode::VPC_NOT_FOUND, vpc_id));
    }
    Ok(())
}

pub(super) fn describe_subnets(mock: &MockUCloudClient, filter: &ResourceFilter) -> Result<Vec<Subnet>, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DescribeSubnet")?;
    Ok(state
        .subnets
        .iter()
        .filter(|s| matches_tag(filter, &s.tag) && matches_id(filter, &s.subnet_id) && matches_vpc(filter, &s.vpc_id))
        .cloned()
        .collect())
}

pub(super) fn create_subnet(mock: &MockUCloudClient, request: &CreateSubnetRequest) -> Result<String, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "CreateSubnet")?;
    let subnet_id = state.next_id("subnet");
    state.subnets.push(Subnet {
        subnet_id: subnet_id.clone(),
        subnet_name: request.subnet_name.clone(),
        vpc_id: request.vpc_id.clone(),
        subnet: request.subnet.clone(),
        netmask: request.netmask.to_string(),
        tag: request.tag.clone(),
    });
    Ok(subnet_id)
}

pub(super) fn delete_subnet(mock: &MockUCloudClient, subnet_id: &str) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DeleteSubnet")?;
    let before = state.subnets.len();
    state.subnets.retain(|s| s.subnet_id != subnet_id);
    if state.subnets.len() == before {
        return Err(not_found("DeleteSubnet", retcode::SUBNET_NOT_FOUND, subnet_id));
    }
    Ok(())
}

pub(super) fn describe_nat_gateways(mock: &MockUCloudClient, filter: &ResourceFilter) -> Result<Vec<NatGateway>, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DescribeNATGW")?;
    Ok(state
        .nat_gateways
        .iter()
        .filter(|n| matches_tag(filter, &n.tag) && matches_id(filter, &n.natgw_id) && matches_vpc(filter, &n.vpc_id))
        .cloned()
        .collect())
}

pub(super) fn create_nat_gateway(mock: &MockUCloudClient, request: &CreateNatGatewayRequest) -> Result<String, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "CreateNATGW")?;
    let natgw_id = state.next_id("natgw");
    let ip_set = request
        .eip_ids
        .iter()
        .map(|eip_id| NatGatewayIp {
            eip_id: eip_id.clone(),
            bandwidth: state.eips.iter().find(|e| &e.eip_id == eip_id).map_or(0, |e| e.bandwidth),
        })
        .collect();
    state.nat_gateways.push(NatGateway {
        natgw_id: natgw_id.clone(),
        natgw_name: request.natgw_name.clone(),
        vpc_id: request.vpc_id.clone(),
        firewall_id: request.firewall_id.clone(),
        ip_set,
        tag: request.tag.clone(),
    });
    Ok(natgw_id)
}

pub(super) fn delete_nat_gateway(mock: &MockUCloudClient, natgw_id: &str, _release_eip: bool) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DeleteNATGW")?;
    let before = state.nat_gateways.len();
    state.nat_gateways.retain(|n| n.natgw_id != natgw_id);
    if state.nat_gateways.len() == before {
        return Err(not_found("DeleteNATGW", retcode::NAT_GATEWAY_NOT_FOUND, natgw_id));
    }
    Ok(())
}

pub(super) fn describe_firewalls(mock: &MockUCloudClient, filter: &ResourceFilter) -> Result<Vec<Firewall>, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DescribeFirewall")?;
    Ok(state
        .firewalls
        .iter()
        .filter(|f| matches_id(filter, &f.fw_id))
        .cloned()
        .collect())
}

pub(super) fn describe_eips(mock: &MockUCloudClient, filter: &ResourceFilter) -> Result<Vec<Eip>, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DescribeEIP")?;
    Ok(state
        .eips
        .iter()
        .filter(|e| matches_id(filter, &e.eip_id))
        .cloned()
        .collect())
}

pub(super) fn allocate_eip(mock: &MockUCloudClient, request: &AllocateEipRequest) -> Result<Eip, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "AllocateEIP")?;
    let eip_id = state.next_id("eip");
    let eip_addr = if state.eip_address_pending {
        Vec::new()
    } else {
        vec![EipAddr {
            operator_name: request.operator_name.clone(),
            ip: format!("106.75.0.{}", state.next_id),
        }]
    };
    let eip = Eip {
        eip_id,
        name: request.name.clone().unwrap_or_default(),
        bandwidth: request.bandwidth,
        eip_addr,
    };
    state.eips.push(eip.clone());
    Ok(eip)
}

pub(super) fn release_eip(mock: &MockUCloudClient, eip_id: &str) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "ReleaseEIP")?;
    state.eips.retain(|e| e.eip_id != eip_id);
    state.eip_bindings.retain(|(e, _, _)| e != eip_id);
    Ok(())
}

pub(super) fn bind_eip(mock: &MockUCloudClient, eip_id: &str, resource_id: &str, resource_type: &str) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "BindEIP")?;
    state
        .eip_bindings
        .push((eip_id.to_string(), resource_id.to_string(), resource_type.to_string()));
    let bound = state.eips.iter().find(|e| e.eip_id == eip_id).map(|e| LoadBalancerIp {
        eip_id: e.eip_id.clone(),
        eip: e.first_address().to_string(),
        bandwidth: e.bandwidth,
    });
    if let (Some(bound), Some(ulb)) = (bound, state.load_balancers.iter_mut().find(|l| l.ulb_id == resource_id)) {
        ulb.ip_set.push(bound);
    }
    Ok(())
}

pub(super) fn unbind_eip(mock: &MockUCloudClient, eip_id: &str, resource_id: &str, _resource_type: &str) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "UnBindEIP")?;
    state.eip_bindings.retain(|(e, r, _)| !(e == eip_id && r == resource_id));
    Ok(())
}

pub(super) fn describe_load_balancers(mock: &MockUCloudClient, filter: &ResourceFilter) -> Result<Vec<LoadBalancer>, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DescribeULB")?;
    Ok(state
        .load_balancers
        .iter()
        .filter(|l| matches_tag(filter, &l.tag) && matches_id(filter, &l.ulb_id) && matches_vpc(filter, &l.vpc_id))
        .cloned()
        .collect())
}

pub(super) fn create_load_balancer(mock: &MockUCloudClient, request: &CreateLoadBalancerRequest) -> Result<String, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "CreateULB")?;
    let ulb_id = state.next_id("ulb");
    state.load_balancers.push(LoadBalancer {
        ulb_id: ulb_id.clone(),
        name: request.ulb_name.clone(),
        vpc_id: request.vpc_id.clone(),
        vserver_set: Vec::new(),
        ip_set: Vec::new(),
        tag: request.tag.clone(),
    });
    state.attach_to_group(
        &request.tag,
        GroupResource {
            id: ulb_id.clone(),
            resource_type_name: "ulb".to_string(),
            zone_id: String::new(),
        },
    );
    Ok(ulb_id)
}

pub(super) fn delete_load_balancer(mock: &MockUCloudClient, ulb_id: &str, _release_eip: bool) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DeleteULB")?;
    let before = state.load_balancers.len();
    state.load_balancers.retain(|l| l.ulb_id != ulb_id);
    if state.load_balancers.len() == before {
        return Err(not_found("DeleteULB", retcode::ULB_NOT_FOUND, ulb_id));
    }
    state.detach_from_groups(ulb_id);
    Ok(())
}

pub(super) fn describe_vservers(mock: &MockUCloudClient, ulb_id: &str, vserver_id: &str) -> Result<Vec<VServer>, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DescribeVServer")?;
    Ok(state
        .load_balancers
        .iter()
        .filter(|l| l.ulb_id == ulb_id)
        .flat_map(|l| l.vserver_set.iter())
        .filter(|v| vserver_id.is_empty() || v.vserver_id == vserver_id)
        .cloned()
        .collect())
}

pub(super) fn create_vserver(mock: &MockUCloudClient, request: &CreateVServerRequest) -> Result<String, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "CreateVServer")?;
    let vserver_id = state.next_id("vserver");
    let vserver = VServer {
        vserver_id: vserver_id.clone(),
        vserver_name: request.vserver_name.clone(),
        frontend_port: request.frontend_port,
        backend_set: Vec::new(),
    };
    match state.load_balancers.iter_mut().find(|l| l.ulb_id == request.ulb_id) {
        Some(ulb) => {
            ulb.vserver_set.push(vserver);
            Ok(vserver_id)
        }
        None => Err(not_found("CreateVServer", retcode::ULB_NOT_FOUND, &request.ulb_id)),
    }
}

pub(super) fn allocate_backend(mock: &MockUCloudClient, request: &AllocateBackendRequest) -> Result<String, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "AllocateBackend")?;
    let backend_id = state.next_id("backend");
    let vserver = state
        .load_balancers
        .iter_mut()
        .filter(|l| l.ulb_id == request.ulb_id)
        .flat_map(|l| l.vserver_set.iter_mut())
        .find(|v| v.vserver_id == request.vserver_id);
    match vserver {
        Some(vserver) => {
            vserver.backend_set.push(Backend {
                backend_id: backend_id.clone(),
                resource_id: request.resource_id.clone(),
                port: request.port,
                private_ip: String::new(),
            });
            Ok(backend_id)
        }
        None => Err(not_found("AllocateBackend", retcode::ULB_NOT_FOUND, &request.vserver_id)),
    }
}

pub(super) fn release_backend(mock: &MockUCloudClient, ulb_id: &str, backend_id: &str) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "ReleaseBackend")?;
    for ulb in state.load_balancers.iter_mut().filter(|l| l.ulb_id == ulb_id) {
        for vserver in &mut ulb.vserver_set {
            vserver.backend_set.retain(|b| b.backend_id != backend_id);
        }
    }
    Ok(())
}
