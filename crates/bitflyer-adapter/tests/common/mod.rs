/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock WebSocket server
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for bitflyer-adapter tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_async, accept_hdr_async};
use wiremock::MockServer;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// What the mock WebSocket server observed, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Connected(u32),
    /// Handshake request headers, names lowercased.
    Headers(u32, Vec<(String, String)>),
    Text(u32, Value),
    Ping(u32),
    Closed(u32),
}

#[derive(Default)]
struct ServerState {
    events: Vec<WireEvent>,
    connections: u32,
    peers: Vec<mpsc::UnboundedSender<Message>>,
}

/// A JSON-RPC realtime endpoint double.
///
/// Acknowledges every subscribe with a JSON-RPC result frame and otherwise
/// stays silent until the test pushes notifications.
pub struct MockWsServer {
    addr: SocketAddr,
    state: Arc<Mutex<ServerState>>,
    shutdown_tx: mpsc::Sender<()>,
}

impl MockWsServer {
    /// Start a new mock WebSocket server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(ServerState::default()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(stream, accept_state.clone()));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    /// Get the server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn connection_count(&self) -> u32 {
        self.state.lock().await.connections
    }

    pub async fn events(&self) -> Vec<WireEvent> {
        self.state.lock().await.events.clone()
    }

    /// Every text frame received, across all connections.
    pub async fn received(&self) -> Vec<Value> {
        self.events()
            .await
            .into_iter()
            .filter_map(|event| match event {
                WireEvent::Text(_, value) => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Send a `channelMessage` notification to every open connection.
    pub async fn notify(&self, channel: &str, message: Value) {
        let frame = json!({
            "jsonrpc": "2.0",
            "method": "channelMessage",
            "params": {"channel": channel, "message": message}
        });
        self.push_raw(frame.to_string()).await;
    }

    pub async fn push_raw(&self, text: String) {
        let mut state = self.state.lock().await;
        state
            .peers
            .retain(|peer| peer.send(Message::Text(text.clone().into())).is_ok());
    }

    /// Poll until `predicate` holds for the recorded events.
    pub async fn wait_until<F>(&self, predicate: F) -> Vec<WireEvent>
    where
        F: Fn(&[WireEvent]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let events = self.events().await;
            if predicate(&events) {
                return events;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition not met, events: {events:#?}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Keepalive pings received on one connection.
    pub async fn ping_count(&self, connection: u32) -> usize {
        self.events()
            .await
            .iter()
            .filter(|event| **event == WireEvent::Ping(connection))
            .count()
    }

    /// Handshake headers of one connection.
    pub async fn headers(&self, connection: u32) -> Vec<(String, String)> {
        self.events()
            .await
            .into_iter()
            .find_map(|event| match event {
                WireEvent::Headers(id, headers) if id == connection => Some(headers),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Wait for `count` frames with the given method and channel.
    pub async fn wait_for_control(&self, method: &str, channel: &str, count: usize) -> Vec<WireEvent> {
        self.wait_until(|events| count_control(events, method, channel) >= count)
            .await
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

pub fn is_control(value: &Value, method: &str, channel: &str) -> bool {
    value["jsonrpc"] == "2.0" && value["method"] == method && value["params"]["channel"] == channel
}

pub fn count_control(events: &[WireEvent], method: &str, channel: &str) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, WireEvent::Text(_, value) if is_control(value, method, channel)))
        .count()
}

async fn handle_connection(stream: TcpStream, state: Arc<Mutex<ServerState>>) {
    let mut headers = Vec::new();
    let record_headers = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        headers = request
            .headers()
            .iter()
            .map(|(name, value)| {
                (name.as_str().to_string(), value.to_str().unwrap_or_default().to_string())
            })
            .collect();
        Ok(response)
    };
    let ws_stream = match accept_hdr_async(stream, record_headers).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let id = {
        let mut state = state.lock().await;
        state.connections += 1;
        let id = state.connections;
        state.events.push(WireEvent::Connected(id));
        state.events.push(WireEvent::Headers(id, headers));
        state.peers.push(outbound_tx.clone());
        id
    };

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(message) => {
                        if write.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let value: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                        if value["method"] == "subscribe" {
                            let ack = json!({"jsonrpc": "2.0", "id": null, "result": true});
                            let _ = outbound_tx.send(Message::Text(ack.to_string().into()));
                        }
                        state.lock().await.events.push(WireEvent::Text(id, value));
                    }
                    Some(Ok(Message::Ping(data))) => {
                        state.lock().await.events.push(WireEvent::Ping(id));
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.lock().await.events.push(WireEvent::Closed(id));
}

/// Endpoint double that fails every other dial and lets the rest go silent.
///
/// Odd connections are dropped before the handshake. Even ones complete it,
/// then read and discard everything without answering.
pub struct FlakyWsServer {
    addr: SocketAddr,
    handshakes: Arc<Mutex<u32>>,
}

impl FlakyWsServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handshakes = Arc::new(Mutex::new(0u32));

        let accepted = handshakes.clone();
        tokio::spawn(async move {
            let mut attempt = 0u32;
            while let Ok((stream, _)) = listener.accept().await {
                attempt += 1;
                if attempt % 2 == 1 {
                    drop(stream);
                    continue;
                }
                let accepted = accepted.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(stream).await else {
                        return;
                    };
                    *accepted.lock().await += 1;
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        Self { addr, handshakes }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn handshakes(&self) -> u32 {
        *self.handshakes.lock().await
    }
}

pub fn ticker_message(product_code: &str, tick_id: i64) -> Value {
    json!({
        "product_code": product_code,
        "timestamp": "2019-04-11T05:14:12.3739915Z",
        "state": "RUNNING",
        "tick_id": tick_id,
        "best_bid": 580006,
        "best_ask": 580771,
        "best_bid_size": 2.00000013,
        "best_ask_size": 0.4,
        "total_bid_depth": 1581.64414981,
        "total_ask_depth": 1415.32079982,
        "market_bid_size": 0,
        "market_ask_size": 0,
        "ltp": 580790,
        "volume": 6703.96837634,
        "volume_by_product": 6703.96837634
    })
}
