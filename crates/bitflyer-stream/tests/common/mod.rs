/*
[INPUT]:  Scripted channel payloads for the realtime endpoint double
[OUTPUT]: Mock JSON-RPC WebSocket server for runner tests
[POS]:    Test infrastructure - shared across runner test modules
[UPDATE]: When runner tests need new server behaviour
*/

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Realtime endpoint double that answers each subscribe with an ack and then
/// keeps replaying the scripted payload for that channel.
pub struct ScriptedWsServer {
    addr: SocketAddr,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl ScriptedWsServer {
    pub async fn start(script: HashMap<String, Value>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let subscriptions = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(script);

        let accept_subscriptions = subscriptions.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, script.clone(), accept_subscriptions.clone()));
            }
        });

        Self { addr, subscriptions }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Channels subscribed so far, in arrival order.
    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().await.clone()
    }
}

async fn serve(stream: TcpStream, script: Arc<HashMap<String, Value>>, subscriptions: Arc<Mutex<Vec<String>>>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();
    let mut active: Vec<String> = Vec::new();
    let mut replay = tokio::time::interval(Duration::from_millis(20));

    loop {
        tokio::select! {
            frame = source.next() => {
                let Some(Ok(frame)) = frame else { return };
                let Message::Text(text) = frame else { continue };
                let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else { continue };
                let channel = request["params"]["channel"].as_str().unwrap_or_default().to_string();
                match request["method"].as_str() {
                    Some("subscribe") => {
                        subscriptions.lock().await.push(channel.clone());
                        active.push(channel);
                        let ack = json!({"jsonrpc": "2.0", "id": null, "result": true});
                        if sink.send(Message::Text(ack.to_string().into())).await.is_err() {
                            return;
                        }
                    }
                    Some("unsubscribe") => active.retain(|name| name != &channel),
                    _ => {}
                }
            }
            _ = replay.tick() => {
                for channel in &active {
                    let Some(message) = script.get(channel) else { continue };
                    let frame = json!({
                        "jsonrpc": "2.0",
                        "method": "channelMessage",
                        "params": {"channel": channel, "message": message}
                    });
                    if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

pub fn ticker_payload(product_code: &str) -> Value {
    json!({
        "product_code": product_code,
        "timestamp": "2024-01-01T00:00:00.000",
        "tick_id": 1,
        "best_bid": 100.0,
        "best_ask": 101.0,
        "best_bid_size": 1.0,
        "best_ask_size": 2.0,
        "total_bid_depth": 10.0,
        "total_ask_depth": 20.0,
        "ltp": 100.5,
        "volume": 1000.0,
        "volume_by_product": 500.0
    })
}

/// A port nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}")
}
