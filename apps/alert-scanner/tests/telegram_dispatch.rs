//! Telegram Adapter Integration Tests
//!
//! Verifies the `sendMessage` request and error handling against a local
//! mock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alert_scanner::infrastructure::config::{RetrySettings, TelegramSettings};
use alert_scanner::{AlertDispatchPort, DispatchError, TelegramDispatcher};

fn dispatcher(server: &MockServer, max_retries: u32) -> TelegramDispatcher {
    let settings = TelegramSettings {
        bot_token: "123:abc".to_string(),
        chat_id: "-100200".to_string(),
        base_url: server.uri(),
    };
    let retry = RetrySettings {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
        max_retries,
    };
    TelegramDispatcher::new(&settings, &retry).unwrap()
}

#[tokio::test]
async fn posts_chat_id_and_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_json(json!({"chat_id": "-100200", "text": "⚡ HIGH VALUE BID: NVR"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    dispatcher(&server, 2)
        .dispatch("⚡ HIGH VALUE BID: NVR")
        .await
        .unwrap();
}

#[tokio::test]
async fn rejection_carries_description() {
    let server = MockServer::start().await;

    Mock::given(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false, "error_code": 400, "description": "Bad Request: chat not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = dispatcher(&server, 2).dispatch("hello").await.unwrap_err();
    match err {
        DispatchError::Rejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Bad Request: chat not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_is_retried() {
    let server = MockServer::start().await;

    Mock::given(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    dispatcher(&server, 2).dispatch("hello").await.unwrap();
}

#[tokio::test]
async fn rate_limit_waits_for_body_retry_after() {
    let server = MockServer::start().await;

    Mock::given(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 1",
            "parameters": {"retry_after": 1}
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    dispatcher(&server, 2).dispatch("hello").await.unwrap();
    assert!(
        started.elapsed() >= Duration::from_millis(900),
        "retried after {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn unreachable_host_is_connection_error() {
    let server = MockServer::start().await;
    let dispatcher = dispatcher(&server, 0);
    drop(server);

    let err = dispatcher.dispatch("hello").await.unwrap_err();
    assert_eq!(err.reason(), "connection");
}
