/*
[INPUT]:  Shared WebSocket write half and ping timing
[OUTPUT]: Periodic protocol pings while a connection is up
[POS]:    Realtime layer - keepalive sub-loop of the connection manager
[UPDATE]: When ping cadence or stop semantics change
*/

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::connection::SharedSink;

/// Ping loop bound to one connection.
///
/// Must be stopped with [`Keepalive::stop`] before the connection closes.
pub(crate) struct Keepalive {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Keepalive {
    pub(crate) fn spawn(
        sink: SharedSink,
        interval: Duration,
        write_timeout: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        // A stalled write must not delay a stop.
                        let sent = tokio::select! {
                            biased;
                            _ = token.cancelled() => break,
                            sent = time::timeout(write_timeout, sink.ping()) => sent,
                        };
                        match sent {
                            Ok(Ok(())) => trace!("ping sent"),
                            Ok(Err(err)) => {
                                warn!(error = %err, "ping failed, leaving reconnect to the reader");
                                break;
                            }
                            Err(_) => {
                                warn!(timeout = ?write_timeout, "ping write timed out");
                                break;
                            }
                        }
                    }
                }
            }
            debug!("keepalive stopped");
        });

        Self { cancel, handle }
    }

    /// Signal the loop and wait until it has exited.
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            warn!(error = %err, "keepalive task ended abnormally");
        }
    }
}
