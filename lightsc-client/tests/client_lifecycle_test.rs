//! Client lifecycle integration tests
//!
//! Connecting, closing, and closing from another task while a call is
//! blocked on a silent daemon.

mod common;

use common::{Action, MockLightsd};
use lightsc_client::{ClientBuilder, LightsClient};
use lightsc_core::Error;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_client_connect_success() {
    let server = MockLightsd::new().await;

    let client = LightsClient::connect(&server.host(), server.port()).await;
    assert!(client.is_ok());

    let client = client.unwrap();
    assert_eq!(client.peer(), format!("127.0.0.1:{}", server.port()));
    assert!(!client.is_batching());

    server.shutdown().await;
}

#[tokio::test]
async fn test_client_connect_refused() {
    let server = MockLightsd::new().await;
    let port = server.port();
    server.shutdown().await;

    let result = LightsClient::connect("127.0.0.1", port).await;
    assert!(matches!(result, Err(Error::Connection(_))));
}

#[tokio::test]
async fn test_client_close_graceful() {
    let server = MockLightsd::new().await;
    let mut client = LightsClient::connect(&server.host(), server.port()).await.unwrap();

    client.power_on("*").await.unwrap();

    client.close().await.unwrap();
    client.close().await.unwrap();

    let result = client.power_on("*").await;
    assert!(matches!(result, Err(Error::Connection(_))));

    server.shutdown().await;
}

#[tokio::test]
async fn test_close_handle_unblocks_call() {
    let server = MockLightsd::with_handler(|_| Action::Ignore).await;
    let mut client = ClientBuilder::new(server.host(), server.port())
        .read_timeout(None)
        .connect()
        .await
        .unwrap();

    let handle = client.close_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.close();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        client.call("get_light_state", json!(["*"])),
    )
    .await
    .expect("close handle should unblock the call");

    assert!(matches!(result, Err(Error::Connection(_))));
    assert!(client.close_handle().is_closed());

    server.shutdown().await;
}

#[tokio::test]
async fn test_close_handle_before_call() {
    let server = MockLightsd::new().await;
    let mut client = LightsClient::connect(&server.host(), server.port()).await.unwrap();

    client.close_handle().close();

    let result = client.power_on("*").await;
    assert!(matches!(result, Err(Error::Connection(_))));

    server.shutdown().await;
}

#[tokio::test]
async fn test_close_with_open_batch() {
    let mut server = MockLightsd::new().await;
    let mut client = LightsClient::connect(&server.host(), server.port()).await.unwrap();

    client.begin_batch().unwrap();
    client.power_on("*").await.unwrap();
    client.close().await.unwrap();

    assert!(!client.is_batching());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.try_message().is_none());

    server.shutdown().await;
}

#[tokio::test]
async fn test_builder_limits_reply_size() {
    let server = MockLightsd::new().await;
    let mut client = ClientBuilder::new(server.host(), server.port())
        .max_response_size(64)
        .connect()
        .await
        .unwrap();

    // The default bulbs don't fit in 64 bytes
    let result = client.get_light_state("*").await;
    assert!(matches!(result, Err(Error::MalformedResponse { .. })));

    server.shutdown().await;
}
