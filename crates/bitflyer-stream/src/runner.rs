/*
[INPUT]:  StreamConfig, RealtimeClient, shutdown token
[OUTPUT]: Running realtime streams with logged updates and connection state monitoring
[POS]:    Runtime layer - owns stream lifecycle for the binary
[UPDATE]: When changing stream startup, monitoring or shutdown semantics
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use bitflyer_adapter::{
    ApiKeyAuthenticator, BitflyerClient, Board, ChannelKey, ClientConfig, ConnectionState, ProductCode,
    RealtimeClient, StreamKind,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{StreamConfig, StreamSpec};

/// Build the REST client (when needed) and the realtime client for a config.
pub fn build_clients(config: &StreamConfig) -> Result<(RealtimeClient, Option<Arc<BitflyerClient>>)> {
    let mut realtime = RealtimeClient::new(config.realtime_config());
    if !config.needs_rest() {
        return Ok((realtime, None));
    }

    let mut rest = BitflyerClient::with_config_and_base_url(ClientConfig::default(), &config.api_base_url)
        .context("create REST client")?;
    if let Some(path) = &config.credentials_path {
        let authenticator = ApiKeyAuthenticator::from_file(path)
            .with_context(|| format!("load credentials from {}", path.display()))?;
        rest.set_authenticator(Arc::new(authenticator));
    }

    let rest = Arc::new(rest);
    realtime = realtime.with_rest_client(rest.clone());
    Ok((realtime, Some(rest)))
}

/// Final counters reported after shutdown
#[derive(Debug, Default)]
pub struct RunSummary {
    pub updates: HashMap<ChannelKey, u64>,
    pub exhausted: Vec<ChannelKey>,
}

/// Starts configured streams, logs their updates and watches their connections.
///
/// When every started stream has exhausted its retries the shutdown token is
/// cancelled, so the caller's wait ends without an external signal.
pub struct StreamRunner {
    realtime: Arc<RealtimeClient>,
    shutdown: CancellationToken,
    counters: HashMap<ChannelKey, Arc<AtomicU64>>,
    monitors: Vec<JoinHandle<()>>,
    live: Arc<AtomicUsize>,
    exhausted: Arc<Mutex<Vec<ChannelKey>>>,
}

impl StreamRunner {
    pub fn new(realtime: RealtimeClient) -> Self {
        Self {
            realtime: Arc::new(realtime),
            shutdown: CancellationToken::new(),
            counters: HashMap::new(),
            monitors: Vec::new(),
            live: Arc::new(AtomicUsize::new(0)),
            exhausted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn realtime(&self) -> &RealtimeClient {
        &self.realtime
    }

    /// Updates delivered so far on one stream
    pub fn update_count(&self, key: &ChannelKey) -> u64 {
        self.counters
            .get(key)
            .map(|counter| counter.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub async fn start_all(&mut self, specs: &[StreamSpec]) -> Result<()> {
        for spec in specs {
            self.start(spec).await?;
        }
        Ok(())
    }

    pub async fn start(&mut self, spec: &StreamSpec) -> Result<()> {
        let product = spec.product_code.clone();
        let kind = StreamKind::from(spec.stream);
        let key = ChannelKey::new(product.clone(), kind);
        let counter = Arc::new(AtomicU64::new(0));

        let started = match kind {
            StreamKind::Ticker => {
                let counter = counter.clone();
                self.realtime
                    .start_ticker(product, move |product, ticker| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        info!(
                            product_code = %product,
                            tick_id = ticker.tick_id,
                            best_bid = %ticker.best_bid,
                            best_ask = %ticker.best_ask,
                            ltp = %ticker.ltp,
                            "ticker"
                        );
                    })
                    .await
            }
            StreamKind::BoardSnapshot | StreamKind::Board => {
                let counter = counter.clone();
                let on_board = move |product: &ProductCode, board: Board| {
                    counter.fetch_add(1, Ordering::Relaxed);
                    info!(
                        product_code = %product,
                        kind = %kind,
                        mid_price = %board.mid_price,
                        best_bid = ?board.best_bid().map(|level| level.price),
                        best_ask = ?board.best_ask().map(|level| level.price),
                        bids = board.bids.len(),
                        asks = board.asks.len(),
                        "board"
                    );
                };
                if kind == StreamKind::Board {
                    self.realtime.start_board(product, spec.merge, on_board).await
                } else {
                    self.realtime.start_board_snapshot(product, on_board).await
                }
            }
            StreamKind::Executions => {
                let counter = counter.clone();
                self.realtime
                    .start_executions(product, move |product, executions| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let last_price = executions.last().map(|execution| execution.price);
                        info!(
                            product_code = %product,
                            count = executions.len(),
                            last_price = ?last_price,
                            "executions"
                        );
                    })
                    .await
            }
        };
        started.with_context(|| format!("start stream {key}"))?;

        debug!(channel = %key, merge = spec.merge, "monitoring stream");
        self.counters.insert(key.clone(), counter);

        if let Some(state_rx) = self.realtime.connection_state(&key).await {
            self.live.fetch_add(1, Ordering::SeqCst);
            self.monitors.push(tokio::spawn(monitor_connection(
                key,
                state_rx,
                self.shutdown.clone(),
                self.live.clone(),
                self.exhausted.clone(),
            )));
        }
        Ok(())
    }

    /// Stop every stream and wait for the monitors to finish.
    pub async fn shutdown_and_wait(mut self) -> Result<RunSummary> {
        self.shutdown.cancel();
        self.realtime.stop_all().await;

        for handle in self.monitors.drain(..) {
            if let Err(err) = handle.await {
                warn!(error = %err, "connection monitor ended abnormally");
            }
        }

        let exhausted = match self.exhausted.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let updates = self
            .counters
            .iter()
            .map(|(key, counter)| (key.clone(), counter.load(Ordering::Relaxed)))
            .collect();

        Ok(RunSummary { updates, exhausted })
    }
}

async fn monitor_connection(
    key: ChannelKey,
    mut state_rx: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
    live: Arc<AtomicUsize>,
    exhausted: Arc<Mutex<Vec<ChannelKey>>>,
) {
    loop {
        let state = *state_rx.borrow_and_update();
        match state {
            ConnectionState::Exhausted { retries } => {
                error!(channel = %key, retries, "stream gave up reconnecting");
                match exhausted.lock() {
                    Ok(mut guard) => guard.push(key.clone()),
                    Err(poisoned) => poisoned.into_inner().push(key.clone()),
                }
                if live.fetch_sub(1, Ordering::SeqCst) == 1 {
                    warn!("all streams exhausted; shutting down");
                    shutdown.cancel();
                }
                return;
            }
            ConnectionState::Stopped => {
                debug!(channel = %key, "stream stopped");
                return;
            }
            ConnectionState::Reconnecting => warn!(channel = %key, "stream reconnecting"),
            other => debug!(channel = %key, state = ?other, "connection state"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}
