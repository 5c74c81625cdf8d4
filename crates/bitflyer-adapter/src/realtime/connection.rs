/*
[INPUT]:  Endpoint address, handshake headers and a message loop implementation
[OUTPUT]: One supervised WebSocket connection with dial retry and keepalive
[POS]:    Realtime layer - connection manager
[UPDATE]: When retry policy, deadlines or shutdown protocol change
*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::keepalive::Keepalive;
use crate::http::{BitflyerError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Per-connection timing and retry policy
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Consecutive failed dials tolerated before giving up.
    pub retry_max: u32,
    pub retry_wait: Duration,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub write_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_max: 10,
            retry_wait: Duration::from_secs(3),
            ping_interval: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
        }
    }
}

/// Observable lifecycle of a managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    /// Stopped on request; terminal.
    Stopped,
    /// Dial retries exhausted; terminal until the channel is restarted.
    Exhausted { retries: u32 },
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Stopped | ConnectionState::Exhausted { .. }
        )
    }
}

/// Write half shared between the message loop and the keepalive task.
#[derive(Clone)]
pub(crate) struct SharedSink(Arc<Mutex<SplitSink<WsStream, Message>>>);

impl SharedSink {
    async fn send(&self, message: Message) -> Result<()> {
        self.0.lock().await.send(message).await?;
        Ok(())
    }

    pub(crate) async fn ping(&self) -> Result<()> {
        self.send(Message::Ping(Vec::new().into())).await
    }

    async fn close(&self) {
        if let Err(err) = self.0.lock().await.close().await {
            debug!(error = %err, "close handshake failed");
        }
    }
}

/// An established WebSocket session.
pub struct WsConnection {
    sink: SharedSink,
    stream: SplitStream<WsStream>,
}

impl WsConnection {
    /// Dial and complete the handshake. Non-101 responses fail here.
    pub async fn connect(url: &Url, headers: &[(String, String)]) -> Result<Self> {
        let mut request = url.as_str().into_client_request()?;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| BitflyerError::Config(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| BitflyerError::Config(format!("invalid header value for {name}: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let (ws, response) = connect_async(request).await?;
        debug!(%url, status = %response.status(), "websocket handshake complete");

        let (sink, stream) = ws.split();
        Ok(Self {
            sink: SharedSink(Arc::new(Mutex::new(sink))),
            stream,
        })
    }

    /// Serialize `value` and send it as a text frame within `deadline`.
    pub async fn write_json<T: Serialize>(&self, value: &T, deadline: Duration) -> Result<()> {
        let text = serde_json::to_string(value)?;
        time::timeout(deadline, self.sink.send(Message::Text(text.into())))
            .await
            .map_err(|_| BitflyerError::Timeout {
                operation: "write",
                duration: deadline,
            })?
    }

    /// Read the next data frame within `deadline`.
    ///
    /// Ping and pong frames are consumed without extending the deadline. A
    /// close frame or end of stream is an error.
    pub async fn read_text(&mut self, deadline: Duration) -> Result<String> {
        let next_data = async {
            loop {
                match self.stream.next().await {
                    None | Some(Ok(Message::Close(_))) => return Err(BitflyerError::ConnectionClosed),
                    Some(Err(err)) => return Err(err.into()),
                    Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                    Some(Ok(Message::Binary(bytes))) => {
                        return String::from_utf8(bytes.to_vec()).map_err(|e| {
                            BitflyerError::WebSocket(format!("non-utf8 binary frame: {e}"))
                        });
                    }
                    Some(Ok(_)) => continue,
                }
            }
        };

        time::timeout(deadline, next_data)
            .await
            .map_err(|_| BitflyerError::Timeout {
                operation: "read",
                duration: deadline,
            })?
    }

    pub(crate) fn sink(&self) -> SharedSink {
        self.sink.clone()
    }

    pub async fn close(self) {
        self.sink.close().await;
    }
}

/// Protocol logic driven by the connection manager.
#[async_trait]
pub trait MessageLoop: Send + 'static {
    /// Run one iteration. An error tears the connection down and redials.
    async fn step(&mut self, conn: &mut WsConnection) -> Result<()>;

    /// Last chance to write pending frames after a stop was requested.
    async fn flush(&mut self, conn: &mut WsConnection);

    /// Called after every teardown of an established connection.
    fn on_disconnect(&mut self) {}
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps one logical connection alive until stopped.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state_tx: watch::Sender<ConnectionState>,
    worker: Option<Worker>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        Self {
            config,
            state_tx,
            worker: None,
        }
    }

    /// Validate `address` and launch the background worker.
    ///
    /// Returns as soon as the worker is spawned; dialing happens in the
    /// background.
    pub fn start<L: MessageLoop>(
        &mut self,
        address: &str,
        headers: Vec<(String, String)>,
        message_loop: L,
    ) -> Result<()> {
        if self.worker.is_some() {
            return Err(BitflyerError::Config(
                "connection manager already started".to_string(),
            ));
        }
        let url = parse_address(address)?;

        let cancel = CancellationToken::new();
        let session = Session {
            url,
            headers,
            config: self.config.clone(),
            state_tx: self.state_tx.clone(),
            cancel: cancel.clone(),
        };
        self.state_tx.send_replace(ConnectionState::Connecting);
        let handle = tokio::spawn(session.run(message_loop));
        self.worker = Some(Worker { cancel, handle });
        Ok(())
    }

    /// Request shutdown and wait until the worker, its keepalive task and
    /// the socket are released. Does nothing if never started.
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.cancel.cancel();
        if let Err(err) = worker.handle.await {
            error!(error = %err, "connection worker ended abnormally");
        }
        self.state_tx.send_replace(ConnectionState::Stopped);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.cancel.cancel();
        }
    }
}

fn parse_address(address: &str) -> Result<Url> {
    let url = Url::parse(address).map_err(|e| BitflyerError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(BitflyerError::InvalidAddress {
            address: address.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

enum SessionEnd {
    Stopped,
    Failed(BitflyerError),
}

struct Session {
    url: Url,
    headers: Vec<(String, String)>,
    config: ConnectionConfig,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl Session {
    async fn run<L: MessageLoop>(self, mut message_loop: L) {
        let mut retry = 0u32;

        loop {
            let dialed = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                dialed = WsConnection::connect(&self.url, &self.headers) => dialed,
            };

            let mut conn = match dialed {
                Ok(conn) => conn,
                Err(err) => {
                    retry += 1;
                    if retry > self.config.retry_max {
                        error!(url = %self.url, retry, error = %err, "dial retries exhausted, giving up");
                        self.state_tx.send_replace(ConnectionState::Exhausted {
                            retries: self.config.retry_max,
                        });
                        return;
                    }
                    warn!(url = %self.url, retry, error = %err, "dial failed, retrying");
                    if !self.backoff().await {
                        break;
                    }
                    continue;
                }
            };

            retry = 0;
            info!(url = %self.url, "connected");
            self.state_tx.send_replace(ConnectionState::Connected);

            let keepalive = Keepalive::spawn(
                conn.sink(),
                self.config.ping_interval,
                self.config.ping_timeout,
                &self.cancel,
            );

            let end = loop {
                let step = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    result = message_loop.step(&mut conn) => Some(result),
                };
                match step {
                    None => {
                        message_loop.flush(&mut conn).await;
                        break SessionEnd::Stopped;
                    }
                    Some(Ok(())) => {}
                    Some(Err(err)) => break SessionEnd::Failed(err),
                }
            };

            keepalive.stop().await;
            if time::timeout(self.config.write_timeout, conn.close()).await.is_err() {
                warn!(url = %self.url, timeout = ?self.config.write_timeout, "close handshake timed out");
            }
            message_loop.on_disconnect();

            match end {
                SessionEnd::Stopped => break,
                SessionEnd::Failed(err) => {
                    warn!(url = %self.url, error = %err, "connection lost, reconnecting");
                    self.state_tx.send_replace(ConnectionState::Reconnecting);
                    if !self.backoff().await {
                        break;
                    }
                }
            }
        }

        debug!(url = %self.url, "connection worker exited");
        self.state_tx.send_replace(ConnectionState::Stopped);
    }

    /// Sleep the retry wait. Returns false if a stop arrived meanwhile.
    async fn backoff(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = time::sleep(self.config.retry_wait) => true,
        }
    }
}
