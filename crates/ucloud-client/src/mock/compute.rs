//! Compute operations for MockUCloudClient
//!
//! Instance states can be scripted per instance with `queue_uhost_states`:
//! each describe consumes one queued state and the last one sticks.

use super::MockUCloudClient;
use crate::error::{retcode, UCloudError};
use crate::models::*;

pub(super) fn describe_uhost_instances(mock: &MockUCloudClient, filter: &ResourceFilter) -> Result<Vec<UHostInstance>, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "DescribeUHostInstance")?;

    let mut found = Vec::new();
    for index in 0..state.uhosts.len() {
        let host = &state.uhosts[index];
        let matches = filter.tag.as_deref().is_none_or(|t| t == host.tag)
            && (filter.ids.is_empty() || filter.ids.contains(&host.uhost_id))
            && filter.zone.as_deref().is_none_or(|z| z == host.zone)
            && filter.subnet_id.as_deref().is_none_or(|s| s == host.subnet_id);
        if !matches {
            continue;
        }
        let uhost_id = host.uhost_id.clone();
        if let Some(queue) = state.uhost_states.get_mut(&uhost_id) {
            let next = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
            if let Some(next) = next {
                state.uhosts[index].state = next;
            }
        }
        found.push(state.uhosts[index].clone());
    }
    Ok(found)
}

pub(super) fn create_uhost_instance(mock: &MockUCloudClient, request: &CreateUHostRequest) -> Result<String, UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "CreateUHostInstance")?;
    state.last_uhost_request = Some(request.clone());

    let uhost_id = state.next_id("uhost");
    let private_ip = format!("10.0.0.{}", state.next_id);
    let mut ip_set = vec![UHostIp {
        ip_type: "Private".to_string(),
        ip: private_ip,
        default: "true".to_string(),
    }];
    if let Some(eip) = &request.eip {
        ip_set.push(UHostIp {
            ip_type: eip.operator_name.clone(),
            ip: format!("106.75.1.{}", state.next_id),
            default: "false".to_string(),
        });
    }

    let initial = match state.next_create_states.take() {
        Some(states) => {
            let first = states.first().cloned().unwrap_or_default();
            state.uhost_states.insert(uhost_id.clone(), states.into_iter().collect());
            first
        }
        None => "Running".to_string(),
    };

    state.uhosts.push(UHostInstance {
        uhost_id: uhost_id.clone(),
        name: request.name.clone(),
        zone: request.zone.clone(),
        state: initial,
        ip_set,
        tag: request.tag.clone(),
        subnet_id: request.subnet_id.clone(),
    });
    state.attach_to_group(
        &request.tag,
        GroupResource {
            id: uhost_id.clone(),
            resource_type_name: "uhost".to_string(),
            zone_id: request.zone.clone(),
        },
    );
    Ok(uhost_id)
}

pub(super) fn poweroff_uhost_instance(mock: &MockUCloudClient, uhost_id: &str) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "PoweroffUHostInstance")?;
    if state.uhost_states.contains_key(uhost_id) {
        return Ok(());
    }
    match state.uhosts.iter_mut().find(|h| h.uhost_id == uhost_id) {
        Some(host) => {
            host.state = "Stopped".to_string();
            Ok(())
        }
        None => Err(UCloudError::RetCode {
            action: "PoweroffUHostInstance".to_string(),
            code: retcode::UHOST_NOT_FOUND,
            message: format!("uhost {uhost_id} not exists"),
        }),
    }
}

pub(super) fn terminate_uhost_instance(mock: &MockUCloudClient, uhost_id: &str) -> Result<(), UCloudError> {
    let mut state = mock.lock();
    mock.record(&mut state, "TerminateUHostInstance")?;
    if state.stuck_uhosts.contains(uhost_id) {
        return Ok(());
    }
    state.uhosts.retain(|h| h.uhost_id != uhost_id);
    state.uhost_states.remove(uhost_id);
    state.detach_from_groups(uhost_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::MockUCloudClient;
    use crate::models::*;
    use crate::ucloud_trait::UCloudClientTrait;

    fn ctx() -> RequestContext {
        RequestContext::new("cn-bj2", "org-1")
    }

    #[tokio::test]
    async fn test_queued_states_are_consumed_and_last_sticks() {
        let mock = MockUCloudClient::new();
        mock.add_uhost(UHostInstance {
            uhost_id: "uhost-a".to_string(),
            state: "Running".to_string(),
            ..Default::default()
        });
        mock.queue_uhost_states("uhost-a", &["Stopping", "Stopped"]);

        let filter = ResourceFilter::default().with_id("uhost-a");
        let first = mock.describe_uhost_instances(&ctx(), &filter).await.unwrap();
        let second = mock.describe_uhost_instances(&ctx(), &filter).await.unwrap();
        let third = mock.describe_uhost_instances(&ctx(), &filter).await.unwrap();

        assert_eq!(first[0].state, "Stopping");
        assert_eq!(second[0].state, "Stopped");
        assert_eq!(third[0].state, "Stopped");
    }

    #[tokio::test]
    async fn test_poweroff_then_terminate() {
        let mock = MockUCloudClient::new();
        let id = mock
            .create_uhost_instance(&ctx(), &CreateUHostRequest { zone: "cn-bj2-02".to_string(), ..Default::default() })
            .await
            .unwrap();
        mock.poweroff_uhost_instance(&ctx(), "cn-bj2-02", &id).await.unwrap();
        assert_eq!(mock.uhosts()[0].state, "Stopped");

        mock.terminate_uhost_instance(&ctx(), "cn-bj2-02", &id, true, true).await.unwrap();
        assert!(mock.uhosts().is_empty());
        assert_eq!(mock.create_calls(), 1);
    }
}
