//! Mock fallback when the provider is away.

mod common;

use common::{SseReader, start_stack};

#[tokio::test]
async fn headlight_command_is_mocked_offline() {
    let stack = start_stack(false).await;
    let mut sse = SseReader::connect(&stack.base_url).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/light/headlight", stack.base_url))
        .json(&serde_json::json!({"command": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["result"], 1);

    // The mocked transition is still visible on the event stream.
    let frame = sse.expect_event("light_state_changed").await;
    assert_eq!(frame["data"]["lightType"], "headlight");
    assert_eq!(frame["data"]["state"], true);
}

#[tokio::test]
async fn queries_fall_back_to_plausible_defaults() {
    let stack = start_stack(false).await;
    let client = reqwest::Client::new();

    let status: serde_json::Value = client
        .get(format!("{}/api/door/2/status", stack.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["data"]["doorID"], 2);
    assert_eq!(status["data"]["lockState"], true);

    let position: serde_json::Value = client
        .get(format!("{}/api/window/3/position", stack.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(position["data"]["position"], 50);
}

#[tokio::test]
async fn health_reports_services_down_offline() {
    let stack = start_stack(false).await;
    let health: serde_json::Value = reqwest::get(format!("{}/api/health", stack.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    for service in ["door_service", "window_service", "light_service", "seat_service"] {
        assert_eq!(health["data"]["services"][service], false);
    }
}

#[tokio::test]
async fn mock_ends_once_the_provider_appears() {
    let stack = start_stack(true).await;
    let client = reqwest::Client::new();

    // Real path: the provider's door state, not the mocked LOCKED default.
    let status: serde_json::Value = client
        .get(format!("{}/api/door/0/status", stack.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["data"]["lockState"], false);
}
