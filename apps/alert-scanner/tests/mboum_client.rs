//! Mboum Adapter Integration Tests
//!
//! Exercises the HTTP client against a local mock server: request shape,
//! snapshot conversion, retries, and error mapping.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alert_scanner::infrastructure::config::{
    Credentials, HaltSignal, MboumSettings, RetrySettings,
};
use alert_scanner::{FetchError, MarketDataPort, MboumClient, MboumError, OptionType, Symbol};

fn retry() -> RetrySettings {
    RetrySettings {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
        max_retries: 2,
    }
}

fn client(server: &MockServer) -> MboumClient {
    let settings = MboumSettings {
        credentials: Credentials::new("test-key".to_string()),
        base_url: server.uri(),
        screener_limit: 5,
        halt_signal: HaltSignal::default(),
    };
    MboumClient::new(&settings, &retry()).unwrap()
}

async fn mount_screener(server: &MockServer, symbols: &[&str]) {
    let body: Vec<_> = symbols.iter().map(|s| json!({"symbol": s})).collect();
    Mock::given(method("GET"))
        .and(path("/v1/screener"))
        .and(query_param("filter", "day_gainers"))
        .and(query_param("metricType", "overview"))
        .and(query_param("limit", "5"))
        .and(header("authorization", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"body": body})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn snapshots_cover_screener_and_watchlist() {
    let server = MockServer::start().await;
    mount_screener(&server, &["NVDA", "AMD"]).await;

    Mock::given(method("GET"))
        .and(path("/v1/markets/quote"))
        .and(query_param("ticker", "NVDA,AMD,NVR"))
        .and(query_param("type", "STOCKS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"body": [
            {"symbol": "NVDA", "bid": 181.2, "bidSize": 3, "regularMarketPrice": 181.25,
             "regularMarketVolume": 1200000, "regularMarketPreviousClose": 175.0,
             "tradeable": false},
            {"symbol": "AMD", "regularMarketPrice": 150.0},
            {"symbol": "NVR", "bid": "2,500.00", "bidSize": "20", "regularMarketPrice": 2510,
             "regularMarketVolume": 41000, "regularMarketPreviousClose": 2400,
             "tradeable": false, "tradingStatus": "Halted"}
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let rows = client(&server)
        .fetch_snapshots(&[Symbol::new("amd"), Symbol::new("NVR")])
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    let nvda = rows[0].as_ref().unwrap();
    assert_eq!(nvda.symbol.as_str(), "NVDA");
    assert_eq!(nvda.bid_price, dec!(181.2));
    assert!(!nvda.halted);
    assert!(rows[1].is_err());
    let nvr = rows[2].as_ref().unwrap();
    assert_eq!(nvr.bid_price, dec!(2500.00));
    assert_eq!(nvr.bid_size, 20);
    assert!(nvr.halted);
}

#[tokio::test]
async fn empty_universe_skips_quotes() {
    let server = MockServer::start().await;
    mount_screener(&server, &[]).await;

    Mock::given(path("/v1/markets/quote"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let rows = client(&server).fetch_snapshots(&[]).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn retries_server_errors() {
    let server = MockServer::start().await;

    Mock::given(path("/v1/screener"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(path("/v1/screener"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"body": [{"symbol": "AMD"}]})))
        .expect(1)
        .mount(&server)
        .await;

    let symbols = client(&server).screener_symbols().await.unwrap();
    assert_eq!(symbols, vec![Symbol::new("AMD")]);
}

#[tokio::test]
async fn gives_up_after_max_retries() {
    let server = MockServer::start().await;

    Mock::given(path("/v1/screener"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).screener_symbols().await.unwrap_err();
    assert!(matches!(err, MboumError::Api { status: 502, .. }));
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(path("/v1/screener"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).fetch_snapshots(&[]).await.unwrap_err();
    assert!(matches!(err, FetchError::Unauthorized));
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(path("/v1/screener"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server).fetch_snapshots(&[]).await.unwrap_err();
    assert_eq!(err.reason(), "decode");
}

#[tokio::test]
async fn options_activity_skips_unusable_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/markets/options/unusual-options-activity"))
        .and(query_param("type", "STOCKS"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"body": [
            {"symbol": "AMD|20261120|150.00P", "baseSymbol": "AMD", "symbolType": "Put",
             "strikePrice": "150.00", "expirationDate": "2026-11-20",
             "volume": "5,000", "openInterest": "1,200", "lastPrice": "3.45"},
            {"symbol": "BAD", "baseSymbol": "BAD", "symbolType": "Call"}
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let activity = client(&server).fetch_options_activity().await.unwrap();
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].underlying, Symbol::new("AMD"));
    assert_eq!(activity[0].option_type, OptionType::Put);
    assert_eq!(activity[0].volume, 5_000);
}
