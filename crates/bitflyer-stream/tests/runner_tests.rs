/*
[INPUT]:  Scripted realtime endpoint, mocked REST endpoint, runner configuration
[OUTPUT]: Stream runner lifecycle verification
[POS]:    Integration tests - runner startup, monitoring and shutdown
[UPDATE]: When runner lifecycle semantics change
*/

mod common;

use std::collections::HashMap;
use std::time::Duration;

use bitflyer_adapter::{ChannelKey, ConnectionConfig, ProductCode, RealtimeClient, RealtimeConfig, StreamKind};
use bitflyer_stream::{StreamConfig, StreamRunner, StreamSelection, StreamSpec, build_clients};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{ScriptedWsServer, closed_port_url, ticker_payload};

fn fast_connection() -> ConnectionConfig {
    ConnectionConfig {
        retry_max: 1,
        retry_wait: Duration::from_millis(20),
        ping_interval: Duration::from_secs(5),
        ping_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(10),
    }
}

fn realtime_for(endpoint: String) -> RealtimeClient {
    RealtimeClient::new(RealtimeConfig {
        endpoint,
        headers: Vec::new(),
        connection: fast_connection(),
    })
}

fn spec(product: &str, stream: StreamSelection, merge: bool) -> StreamSpec {
    StreamSpec {
        product_code: ProductCode::from(product),
        stream,
        merge,
    }
}

async fn wait_for_updates(runner: &StreamRunner, key: &ChannelKey, at_least: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while runner.update_count(key) < at_least {
        assert!(tokio::time::Instant::now() < deadline, "no updates for {key}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_runner_counts_ticker_updates() {
    let script = HashMap::from([("lightning_ticker_BTC_JPY".to_string(), ticker_payload("BTC_JPY"))]);
    let server = ScriptedWsServer::start(script).await;

    let mut runner = StreamRunner::new(realtime_for(server.url()));
    assert_ok!(runner.start(&spec("BTC_JPY", StreamSelection::Ticker, false)).await);

    let key = ChannelKey::new(ProductCode::from("BTC_JPY"), StreamKind::Ticker);
    wait_for_updates(&runner, &key, 2).await;
    assert_eq!(server.subscriptions().await, vec!["lightning_ticker_BTC_JPY".to_string()]);

    let summary = runner.shutdown_and_wait().await.unwrap();
    assert!(summary.updates[&key] >= 2);
    assert!(summary.exhausted.is_empty());
}

#[tokio::test]
async fn test_runner_rejects_duplicate_stream() {
    let server = ScriptedWsServer::start(HashMap::new()).await;
    let mut runner = StreamRunner::new(realtime_for(server.url()));
    let ticker = spec("BTC_JPY", StreamSelection::Ticker, false);

    assert_ok!(runner.start(&ticker).await);
    let err = runner.start_all(&[ticker]).await.unwrap_err();
    assert!(format!("{err:#}").contains("already exists"));

    runner.shutdown_and_wait().await.unwrap();
}

#[tokio::test]
async fn test_runner_cancels_when_all_streams_exhaust() {
    let mut runner = StreamRunner::new(realtime_for(closed_port_url().await));
    let shutdown = runner.shutdown_token();
    assert_ok!(runner.start(&spec("ETH_JPY", StreamSelection::Executions, false)).await);

    tokio::time::timeout(Duration::from_secs(5), shutdown.cancelled())
        .await
        .expect("shutdown was not triggered by exhaustion");

    let summary = runner.shutdown_and_wait().await.unwrap();
    assert_eq!(
        summary.exhausted,
        vec![ChannelKey::new(ProductCode::from("ETH_JPY"), StreamKind::Executions)]
    );
}

#[tokio::test]
async fn test_merged_board_needs_rest_client() {
    let server = ScriptedWsServer::start(HashMap::new()).await;
    let mut runner = StreamRunner::new(realtime_for(server.url()));

    let err = runner
        .start(&spec("FX_BTC_JPY", StreamSelection::Board, true))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("start stream FX_BTC_JPY/board"));
    assert!(runner.realtime().active_channels().await.is_empty());
}

#[tokio::test]
async fn test_build_clients_seeds_merged_board() {
    let rest_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/getboard"))
        .and(query_param("product_code", "FX_BTC_JPY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "mid_price": 100.5,
            "bids": [{"price": 100.0, "size": 1.0}],
            "asks": [{"price": 101.0, "size": 1.0}]
        })))
        .expect(1)
        .mount(&rest_server)
        .await;

    let diff = json!({"mid_price": 100.5, "bids": [{"price": 99.0, "size": 3.0}], "asks": []});
    let script = HashMap::from([("lightning_board_FX_BTC_JPY".to_string(), diff)]);
    let ws_server = ScriptedWsServer::start(script).await;

    let config = StreamConfig {
        endpoint: ws_server.url(),
        api_base_url: rest_server.uri(),
        streams: vec![spec("FX_BTC_JPY", StreamSelection::Board, true)],
        ..StreamConfig::default()
    };
    let (realtime, rest) = build_clients(&config).unwrap();
    assert!(rest.is_some_and(|rest| !rest.is_authenticated()));

    let mut runner = StreamRunner::new(realtime);
    assert_ok!(runner.start_all(&config.streams).await);

    let key = ChannelKey::new(ProductCode::from("FX_BTC_JPY"), StreamKind::Board);
    wait_for_updates(&runner, &key, 1).await;

    let mut subscriptions = ws_server.subscriptions().await;
    subscriptions.sort();
    assert_eq!(
        subscriptions,
        vec![
            "lightning_board_FX_BTC_JPY".to_string(),
            "lightning_board_snapshot_FX_BTC_JPY".to_string(),
        ]
    );

    runner.shutdown_and_wait().await.unwrap();
}

#[test]
fn test_build_clients_without_rest() {
    let config = StreamConfig {
        streams: vec![spec("BTC_JPY", StreamSelection::Ticker, false)],
        ..StreamConfig::default()
    };
    let (realtime, rest) = build_clients(&config).unwrap();
    assert!(rest.is_none());
    assert_eq!(realtime.config().endpoint, bitflyer_adapter::REALTIME_ENDPOINT);
}

#[test]
fn test_build_clients_reports_missing_credentials() {
    let config = StreamConfig {
        credentials_path: Some(std::env::temp_dir().join(format!("missing-{}", uuid::Uuid::new_v4()))),
        ..StreamConfig::default()
    };
    let err = build_clients(&config).unwrap_err();
    assert!(format!("{err:#}").contains("load credentials"));
}
