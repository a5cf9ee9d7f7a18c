//! Integration tests for the UCloud client
//!
//! These tests call the real API.
//! Set UCLOUD_ACCESS_PUBKEY, UCLOUD_ACCESS_PRIKEY, UCLOUD_REGION and
//! UCLOUD_PROJECT_ID environment variables to run.

use ucloud_client::{Credential, RequestContext, ResourceFilter, UCloudClient, UCloudClientTrait};

fn live_client() -> (UCloudClient, RequestContext) {
    let url = std::env::var("UCLOUD_BASE_URL").unwrap_or_else(|_| ucloud_client::DEFAULT_BASE_URL.to_string());
    let credential = Credential {
        public_key: std::env::var("UCLOUD_ACCESS_PUBKEY").expect("UCLOUD_ACCESS_PUBKEY environment variable must be set"),
        private_key: std::env::var("UCLOUD_ACCESS_PRIKEY").expect("UCLOUD_ACCESS_PRIKEY environment variable must be set"),
    };
    let region = std::env::var("UCLOUD_REGION").unwrap_or_else(|_| "cn-bj2".to_string());
    let project = std::env::var("UCLOUD_PROJECT_ID").expect("UCLOUD_PROJECT_ID environment variable must be set");

    let client = UCloudClient::new(url, credential).expect("Failed to create client");
    (client, RequestContext::new(region, project))
}

#[tokio::test]
#[ignore] // Requires UCloud credentials
async fn test_validate_credential() {
    let (client, ctx) = live_client();
    client.validate_credential(&ctx).await.expect("credential rejected");
}

#[tokio::test]
#[ignore]
async fn test_list_business_groups() {
    let (client, ctx) = live_client();
    let groups = client.list_business_groups(&ctx).await.expect("Failed to list business groups");
    println!("Found {} business groups", groups.len());
}

#[tokio::test]
#[ignore]
async fn test_describe_untagged_vpcs() {
    let (client, ctx) = live_client();
    let vpcs = client
        .describe_vpcs(&ctx, &ResourceFilter::default())
        .await
        .expect("Failed to describe VPCs");
    for vpc in vpcs {
        println!("{} {} {:?}", vpc.vpc_id, vpc.name, vpc.network);
    }
}

#[tokio::test]
#[ignore]
async fn test_unknown_vpc_delete_reports_gone() {
    let (client, ctx) = live_client();
    let err = client
        .delete_vpc(&ctx, "uvnet-doesnotexist")
        .await
        .expect_err("deleting an unknown VPC should fail");
    println!("DeleteVPC returned {err}");
}
