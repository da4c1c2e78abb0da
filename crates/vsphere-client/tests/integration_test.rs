//! Integration tests for the vSphere client
//!
//! These tests require a reachable vCenter.
//! Set VSPHERE_URL, VSPHERE_USER and VSPHERE_PASSWORD environment variables to run.

use vsphere_client::{DvsProperties, VSphereClient, VSphereClientTrait, fetch_properties};

async fn connect() -> VSphereClient {
    let url = std::env::var("VSPHERE_URL")
        .unwrap_or_else(|_| "https://localhost:8989".to_string());
    let user = std::env::var("VSPHERE_USER")
        .expect("VSPHERE_USER environment variable must be set");
    let password = std::env::var("VSPHERE_PASSWORD")
        .expect("VSPHERE_PASSWORD environment variable must be set");
    let release = std::env::var("VSPHERE_API_RELEASE")
        .unwrap_or_else(|_| "8.0.2.0".to_string());

    VSphereClient::login(url, &user, &password, release, true)
        .await
        .expect("Failed to log in")
}

#[tokio::test]
#[ignore] // Requires a reachable vCenter
async fn test_login_and_find_datacenter() {
    let client = connect().await;

    let dc = client.find_datacenter(None).await
        .expect("Failed to find datacenter");
    let folders = client.datacenter_folders(&dc).await
        .expect("Failed to read datacenter folders");

    println!("Datacenter {} network folder {}", dc.inventory_path, folders.network_folder);
    client.logout().await.expect("Failed to log out");
}

#[tokio::test]
#[ignore]
async fn test_read_switch() {
    let client = connect().await;
    let path = std::env::var("VSPHERE_DVS_PATH")
        .expect("VSPHERE_DVS_PATH environment variable must be set");

    let dc = client.find_datacenter(None).await
        .expect("Failed to find datacenter");
    let dvs = client.find_network(&dc, &path).await
        .expect("Failed to find switch");
    assert!(dvs.is_distributed_switch(), "{} is not a distributed switch", dvs);

    let props: DvsProperties = fetch_properties(&client, &dvs, &["uuid", "config", "portgroup"])
        .await
        .expect("Failed to read switch properties");
    println!("Switch {} has {} port groups", props.uuid, props.portgroup.len());
}
