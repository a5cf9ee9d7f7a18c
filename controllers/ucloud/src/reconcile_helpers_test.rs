//! Unit tests for the reconcile_helpers skeleton

#[cfg(test)]
mod tests {
    use crate::config::RegionTable;
    use crate::error::ControllerError;
    use crate::reconcile_helpers::*;
    use crds::UCloudClusterStatus;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ucloud_client::{MockUCloudClient, RequestContext, UCloudError};

    const GONE: i64 = 4040;

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        id: String,
        name: String,
        parent: String,
    }

    /// Kind backed by a plain vector, storing its id in the VPC status slot
    #[derive(Default)]
    struct WidgetKind {
        wanted_id: String,
        wanted_name: String,
        parent: String,
        remote: Mutex<Vec<Widget>>,
        describes: AtomicUsize,
        creates: AtomicUsize,
        deletes: AtomicUsize,
        delete_code: Option<i64>,
    }

    impl WidgetKind {
        fn named(name: &str) -> Self {
            Self {
                wanted_name: name.to_string(),
                parent: "parent-1".to_string(),
                ..Default::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl ResourceKind for WidgetKind {
        type Remote = Widget;
        const KIND: &'static str = "widget";

        fn recorded_id<'s>(&self, status: &'s UCloudClusterStatus) -> &'s str {
            &status.network.vpc.vpc_id
        }

        fn wanted_id(&self) -> &str {
            &self.wanted_id
        }

        fn wanted_name(&self) -> &str {
            &self.wanted_name
        }

        fn parents(&self) -> Vec<(&'static str, &str)> {
            vec![("parent", &self.parent)]
        }

        async fn describe(&self, _cloud: &CloudContext<'_>) -> Result<Vec<Widget>, UCloudError> {
            self.describes.fetch_add(1, Ordering::SeqCst);
            Ok(self.remote.lock().unwrap().clone())
        }

        fn matches(&self, remote: &Widget) -> bool {
            self.is_wanted(&remote.name, &remote.id) && remote.parent == self.parent
        }

        async fn create(&self, _cloud: &CloudContext<'_>) -> Result<Widget, ControllerError> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
            let widget = Widget {
                id: format!("widget-{n}"),
                name: self.wanted_name.clone(),
                parent: self.parent.clone(),
            };
            self.remote.lock().unwrap().push(widget.clone());
            Ok(widget)
        }

        fn publish(&self, remote: Widget, status: &mut UCloudClusterStatus) {
            status.network.vpc.vpc_id = remote.id;
            status.network.vpc.vpc_name = remote.name;
        }

        async fn delete(&self, _cloud: &CloudContext<'_>, id: &str) -> Result<(), UCloudError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if let Some(code) = self.delete_code {
                return Err(UCloudError::RetCode {
                    action: "DeleteWidget".to_string(),
                    code,
                    message: "nope".to_string(),
                });
            }
            self.remote.lock().unwrap().retain(|w| w.id != id);
            Ok(())
        }

        fn gone_code(&self) -> Option<i64> {
            Some(GONE)
        }

        fn clear(&self, status: &mut UCloudClusterStatus) {
            status.network.vpc = Default::default();
        }
    }

    struct Harness {
        mock: MockUCloudClient,
        ctx: RequestContext,
        regions: RegionTable,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                mock: MockUCloudClient::new(),
                ctx: RequestContext::new("cn-bj2", "org-1"),
                regions: RegionTable::default(),
            }
        }

        fn cloud(&self) -> CloudContext<'_> {
            CloudContext {
                cloud: &self.mock,
                ctx: &self.ctx,
                tag: "capu-test",
                regions: &self.regions,
            }
        }
    }

    #[tokio::test]
    async fn test_second_pass_is_a_pure_short_circuit() {
        let harness = Harness::new();
        let kind = WidgetKind::named("w");
        let mut status = UCloudClusterStatus::default();

        reconcile_resource(&kind, &harness.cloud(), &mut status).await.unwrap();
        reconcile_resource(&kind, &harness.cloud(), &mut status).await.unwrap();

        assert_eq!(status.network.vpc.vpc_id, "widget-1");
        assert_eq!(kind.creates.load(Ordering::SeqCst), 1);
        assert_eq!(kind.describes.load(Ordering::SeqCst), 1, "second pass must not describe");
    }

    #[tokio::test]
    async fn test_missing_parent_fails_before_describe() {
        let harness = Harness::new();
        let kind = WidgetKind {
            parent: String::new(),
            ..WidgetKind::named("w")
        };
        let mut status = UCloudClusterStatus::default();

        let err = reconcile_resource(&kind, &harness.cloud(), &mut status).await.unwrap_err();

        assert!(matches!(
            err.root_cause(),
            ControllerError::ParentNotCreated { kind: "widget", parent: "parent" }
        ));
        assert_eq!(kind.describes.load(Ordering::SeqCst), 0);
        assert!(status.network.vpc.vpc_id.is_empty());
    }

    #[tokio::test]
    async fn test_existing_match_is_adopted_without_create() {
        let harness = Harness::new();
        let kind = WidgetKind::named("w");
        kind.remote.lock().unwrap().extend([
            Widget { id: "other-parent".into(), name: "w".into(), parent: "parent-2".into() },
            Widget { id: "first".into(), name: "w".into(), parent: "parent-1".into() },
            Widget { id: "second".into(), name: "w".into(), parent: "parent-1".into() },
        ]);
        let mut status = UCloudClusterStatus::default();

        reconcile_resource(&kind, &harness.cloud(), &mut status).await.unwrap();

        assert_eq!(status.network.vpc.vpc_id, "first", "first match under the right parent wins");
        assert_eq!(kind.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_match_by_wanted_id() {
        let harness = Harness::new();
        let kind = WidgetKind {
            wanted_id: "given".to_string(),
            ..WidgetKind::named("generated")
        };
        kind.remote
            .lock()
            .unwrap()
            .push(Widget { id: "given".into(), name: "renamed".into(), parent: "parent-1".into() });
        let mut status = UCloudClusterStatus::default();

        reconcile_resource(&kind, &harness.cloud(), &mut status).await.unwrap();

        assert_eq!(status.network.vpc.vpc_id, "given");
        assert_eq!(status.network.vpc.vpc_name, "renamed");
    }

    #[tokio::test]
    async fn test_operator_supplied_resource_is_never_deleted() {
        let harness = Harness::new();
        let kind = WidgetKind {
            wanted_id: "given".to_string(),
            ..WidgetKind::named("w")
        };
        let mut status = UCloudClusterStatus::default();
        status.network.vpc.vpc_id = "given".to_string();

        delete_resource(&kind, &harness.cloud(), &mut status).await.unwrap();

        assert_eq!(kind.deletes.load(Ordering::SeqCst), 0);
        assert_eq!(status.network.vpc.vpc_id, "given", "reference stays in status");
    }

    #[tokio::test]
    async fn test_delete_of_gone_resource_succeeds_and_clears() {
        let harness = Harness::new();
        let kind = WidgetKind {
            delete_code: Some(GONE),
            ..WidgetKind::named("w")
        };
        let mut status = UCloudClusterStatus::default();
        status.network.vpc.vpc_id = "widget-9".to_string();

        delete_resource(&kind, &harness.cloud(), &mut status).await.unwrap();

        assert_eq!(kind.deletes.load(Ordering::SeqCst), 1);
        assert!(status.network.vpc.vpc_id.is_empty());
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_status() {
        let harness = Harness::new();
        let kind = WidgetKind {
            delete_code: Some(1),
            ..WidgetKind::named("w")
        };
        let mut status = UCloudClusterStatus::default();
        status.network.vpc.vpc_id = "widget-9".to_string();

        let err = delete_resource(&kind, &harness.cloud(), &mut status).await.unwrap_err();

        assert!(matches!(err, ControllerError::Reconcile { kind: "widget", .. }));
        assert_eq!(status.network.vpc.vpc_id, "widget-9");
    }

    #[tokio::test]
    async fn test_delete_without_record_is_a_no_op() {
        let harness = Harness::new();
        let kind = WidgetKind::named("w");
        let mut status = UCloudClusterStatus::default();

        delete_resource(&kind, &harness.cloud(), &mut status).await.unwrap();

        assert_eq!(kind.deletes.load(Ordering::SeqCst), 0);
    }
}
