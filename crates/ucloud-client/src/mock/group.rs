//! Business group and registration operations for MockUCloudClient

use super::MockUCloudClient;
use crate::error::UCloudError;
use crate::models::*;

/// Page size the provider uses when no limit is given
const DEFAULT_PAGE_SIZE: u32 = 10;

pub(super) fn list_business_groups(mock: &MockUCloudClient) -> Result<Vec<BusinessGroup>, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "ListBusinessGroup")?;
    Ok(state.groups.clone())
}

pub(super) fn create_business_group(mock: &MockUCloudClient, name: &str) -> Result<BusinessGroup, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "CreateBusinessGroup")?;
    let group = BusinessGroup {
        business_id: state.next_id("bg"),
        business_name: name.to_string(),
    };
    state.groups.push(group.clone());
    Ok(group)
}

pub(super) fn delete_business_group(mock: &MockUCloudClient, group_id: &str) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DeleteBusinessGroup")?;
    state.groups.retain(|g| g.business_id != group_id);
    state.group_resources.remove(group_id);
    Ok(())
}

pub(super) fn search_business_group_resources(
    mock: &MockUCloudClient,
    group_id: &str,
    limit: Option<u32>,
) -> Result<GroupResourcePage, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "SearchBusinessGroupResource")?;
    let all = state.group_resources.get(group_id).cloned().unwrap_or_default();
    let page_size = limit.unwrap_or(DEFAULT_PAGE_SIZE) as usize;
    Ok(GroupResourcePage {
        total_count: u32::try_from(all.len()).unwrap_or(u32::MAX),
        infos: all.into_iter().take(page_size).collect(),
    })
}

pub(super) fn register_cluster(mock: &MockUCloudClient, request: &RegisterClusterRequest) -> Result<String, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "CreateCAPUCluster")?;
    state.last_cluster_registration = Some(request.clone());
    let cluster_id = state.next_id("uk8s");
    state.registrations.push(cluster_id.clone());
    Ok(cluster_id)
}

pub(super) fn deregister_cluster(mock: &MockUCloudClient, cluster_id: &str) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DeleteCAPUCluster")?;
    state.registrations.retain(|c| c != cluster_id);
    state.registered_hosts.retain(|h| h.cluster_id != cluster_id);
    Ok(())
}

pub(super) fn register_host(mock: &MockUCloudClient, request: &RegisterHostRequest) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "CreateCAPUHost")?;
    state.registered_hosts.push(request.clone());
    Ok(())
}

pub(super) fn deregister_host(mock: &MockUCloudClient, cluster_id: &str, instance_id: &str) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DeleteCAPUHost")?;
    state
        .registered_hosts
        .retain(|h| !(h.cluster_id == cluster_id && h.instance_id == instance_id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::MockUCloudClient;
    use crate::models::*;
    use crate::ucloud_trait::UCloudClientTrait;

    #[tokio::test]
    async fn test_search_pages_by_limit() {
        let mock = MockUCloudClient::new();
        let ctx = RequestContext::new("cn-bj2", "org-1");
        for i in 0..12 {
            mock.add_group_resource(
                "bg-1",
                GroupResource {
                    id: format!("uhost-{i}"),
                    resource_type_name: "uhost".to_string(),
                    zone_id: "cn-bj2-02".to_string(),
                },
            );
        }

        let first = mock.search_business_group_resources(&ctx, "bg-1", None).await.unwrap();
        assert_eq!(first.total_count, 12);
        assert_eq!(first.infos.len(), 10);

        let all = mock
            .search_business_group_resources(&ctx, "bg-1", Some(first.total_count))
            .await
            .unwrap();
        assert_eq!(all.infos.len(), 12);
    }

    #[tokio::test]
    async fn test_created_resources_join_the_tagged_group() {
        let mock = MockUCloudClient::new();
        let ctx = RequestContext::new("cn-bj2", "org-1");
        let group = mock.create_business_group(&ctx, "capu-x").await.unwrap();
        mock.create_load_balancer(
            &ctx,
            &CreateLoadBalancerRequest { ulb_name: "lb".to_string(), tag: "capu-x".to_string(), ..Default::default() },
        )
        .await
        .unwrap();

        let page = mock.search_business_group_resources(&ctx, &group.business_id, None).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.infos[0].resource_type_name, "ulb");
    }
}
