/*
[INPUT]:  Product codes, stream kinds and consumer callbacks
[OUTPUT]: Managed realtime subscriptions with start/stop per channel key
[POS]:    Realtime layer - public facade over connection, channel and merge
[UPDATE]: When adding stream kinds or changing registration rules
*/

pub mod channel;
pub mod connection;
mod keepalive;
pub mod merge;
pub mod message;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

pub use channel::{Callback, ControlSender, StreamHandler, SubscriptionChannel, SubscriptionState};
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, MessageLoop, WsConnection};
pub use merge::OrderBook;
pub use message::{ChannelKey, ControlFrame, ControlMethod, NotificationParams, StreamKind};

use crate::http::{BitflyerClient, BitflyerError, Result};
use crate::types::{Board, Execution, ProductCode, Ticker};

/// Lightning realtime JSON-RPC endpoint
pub const REALTIME_ENDPOINT: &str = "wss://ws.lightstream.bitflyer.com/json-rpc";

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub endpoint: String,
    /// Extra headers sent with the WebSocket handshake.
    pub headers: Vec<(String, String)>,
    pub connection: ConnectionConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: REALTIME_ENDPOINT.to_string(),
            headers: Vec::new(),
            connection: ConnectionConfig::default(),
        }
    }
}

struct ActiveChannel {
    manager: ConnectionManager,
    control_tx: ControlSender,
    topics: Vec<String>,
}

/// Entry point for realtime streams. One connection per active channel key.
pub struct RealtimeClient {
    config: RealtimeConfig,
    rest: Option<Arc<BitflyerClient>>,
    channels: Mutex<HashMap<ChannelKey, ActiveChannel>>,
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("config", &self.config)
            .field("rest", &self.rest)
            .finish_non_exhaustive()
    }
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            rest: None,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// REST client used to seed merged boards.
    pub fn with_rest_client(mut self, rest: Arc<BitflyerClient>) -> Self {
        self.rest = Some(rest);
        self
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub async fn start_ticker<F>(&self, product_code: ProductCode, callback: F) -> Result<()>
    where
        F: FnMut(&ProductCode, Ticker) + Send + 'static,
    {
        self.start_channel(product_code, StreamHandler::Ticker(Box::new(callback)))
            .await
    }

    pub async fn start_board_snapshot<F>(&self, product_code: ProductCode, callback: F) -> Result<()>
    where
        F: FnMut(&ProductCode, Board) + Send + 'static,
    {
        self.start_channel(product_code, StreamHandler::BoardSnapshot(Box::new(callback)))
            .await
    }

    /// Start a board stream.
    ///
    /// With `merge` the channel delivers the full book: it is seeded from
    /// `GET /v1/getboard` before connecting, then every diff is folded in.
    /// A seeding failure aborts the start. Diffs published between the REST
    /// fetch and the subscription taking effect can be missed; the snapshot
    /// topic re-baselines the book when it arrives.
    pub async fn start_board<F>(&self, product_code: ProductCode, merge: bool, callback: F) -> Result<()>
    where
        F: FnMut(&ProductCode, Board) + Send + 'static,
    {
        if !merge {
            return self
                .start_channel(product_code, StreamHandler::Board(Box::new(callback)))
                .await;
        }

        let key = ChannelKey::new(product_code.clone(), StreamKind::Board);
        if self.channels.lock().await.contains_key(&key) {
            return Err(BitflyerError::AlreadyExists(key));
        }
        let rest = self.rest.as_ref().ok_or_else(|| {
            BitflyerError::Config("merged board requires a REST client".to_string())
        })?;
        let snapshot = rest.get_board(&product_code).await?;
        debug!(channel = %key, bids = snapshot.bids.len(), asks = snapshot.asks.len(), "board seeded");

        let handler = StreamHandler::MergedBoard {
            book: OrderBook::new(snapshot),
            callback: Box::new(callback),
        };
        self.start_channel(product_code, handler).await
    }

    pub async fn start_executions<F>(&self, product_code: ProductCode, callback: F) -> Result<()>
    where
        F: FnMut(&ProductCode, Vec<Execution>) + Send + 'static,
    {
        self.start_channel(product_code, StreamHandler::Executions(Box::new(callback)))
            .await
    }

    pub async fn stop_ticker(&self, product_code: &ProductCode) -> Result<()> {
        self.stop(&ChannelKey::new(product_code.clone(), StreamKind::Ticker))
            .await
    }

    pub async fn stop_board_snapshot(&self, product_code: &ProductCode) -> Result<()> {
        self.stop(&ChannelKey::new(product_code.clone(), StreamKind::BoardSnapshot))
            .await
    }

    pub async fn stop_board(&self, product_code: &ProductCode) -> Result<()> {
        self.stop(&ChannelKey::new(product_code.clone(), StreamKind::Board))
            .await
    }

    pub async fn stop_executions(&self, product_code: &ProductCode) -> Result<()> {
        self.stop(&ChannelKey::new(product_code.clone(), StreamKind::Executions))
            .await
    }

    /// Unsubscribe, tear the connection down and forget the channel.
    ///
    /// Returns once the worker has fully exited. The registry is released
    /// before the teardown, so other channels are not held up by a slow peer.
    pub async fn stop(&self, key: &ChannelKey) -> Result<()> {
        let mut active = self
            .channels
            .lock()
            .await
            .remove(key)
            .ok_or_else(|| BitflyerError::NotFound(key.clone()))?;

        for topic in &active.topics {
            // A worker that already gave up has dropped its mailbox.
            let _ = active.control_tx.send(ControlFrame::unsubscribe(topic.clone()));
        }
        active.manager.stop().await;
        info!(channel = %key, "stream stopped");
        Ok(())
    }

    pub async fn stop_all(&self) {
        let keys = self.active_channels().await;
        for key in keys {
            // Concurrent stops may have removed it already.
            let _ = self.stop(&key).await;
        }
    }

    pub async fn active_channels(&self) -> Vec<ChannelKey> {
        self.channels.lock().await.keys().cloned().collect()
    }

    /// Connection lifecycle of a running channel, including retry exhaustion.
    pub async fn connection_state(&self, key: &ChannelKey) -> Option<watch::Receiver<ConnectionState>> {
        self.channels
            .lock()
            .await
            .get(key)
            .map(|active| active.manager.subscribe_state())
    }

    async fn start_channel(&self, product_code: ProductCode, handler: StreamHandler) -> Result<()> {
        let key = ChannelKey::new(product_code.clone(), handler.kind());
        let mut channels = self.channels.lock().await;
        if channels.contains_key(&key) {
            return Err(BitflyerError::AlreadyExists(key));
        }

        let (channel, control_tx) =
            SubscriptionChannel::new(product_code, handler, &self.config.connection);
        let topics = channel.topics().to_vec();

        let mut manager = ConnectionManager::new(self.config.connection.clone());
        manager.start(&self.config.endpoint, self.config.headers.clone(), channel)?;

        info!(channel = %key, endpoint = %self.config.endpoint, "stream started");
        channels.insert(
            key,
            ActiveChannel {
                manager,
                control_tx,
                topics,
            },
        );
        Ok(())
    }
}
