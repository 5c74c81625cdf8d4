/*
[INPUT]:  Control frames from the facade and notifications from the wire
[OUTPUT]: Subscribe/unsubscribe writes and typed callback invocations
[POS]:    Realtime layer - per-channel subscription state machine
[UPDATE]: When stream kinds or subscription rules change
*/

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::connection::{ConnectionConfig, MessageLoop, WsConnection};
use super::merge::OrderBook;
use super::message::{
    ControlFrame, ControlMethod, NotificationParams, StreamKind, decode_notification,
    decode_payload,
};
use crate::http::Result;
use crate::types::{Board, Execution, ProductCode, Ticker};

/// Consumer callback. Runs on the channel's worker and must not block.
pub type Callback<T> = Box<dyn FnMut(&ProductCode, T) + Send>;

pub type ControlSender = mpsc::UnboundedSender<ControlFrame>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribed,
}

/// Stream-specific decoding and delivery. Exactly one callback per channel.
pub enum StreamHandler {
    Ticker(Callback<Ticker>),
    BoardSnapshot(Callback<Board>),
    /// Raw board diffs, forwarded untouched.
    Board(Callback<Board>),
    /// Board diffs folded into a full book seeded from a snapshot.
    MergedBoard {
        book: OrderBook,
        callback: Callback<Board>,
    },
    Executions(Callback<Vec<Execution>>),
}

impl StreamHandler {
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamHandler::Ticker(_) => StreamKind::Ticker,
            StreamHandler::BoardSnapshot(_) => StreamKind::BoardSnapshot,
            StreamHandler::Board(_) | StreamHandler::MergedBoard { .. } => StreamKind::Board,
            StreamHandler::Executions(_) => StreamKind::Executions,
        }
    }

    /// Protocol channels this handler listens on.
    pub fn topics(&self, product_code: &ProductCode) -> Vec<String> {
        match self {
            StreamHandler::MergedBoard { .. } => vec![
                StreamKind::Board.channel_name(product_code),
                StreamKind::BoardSnapshot.channel_name(product_code),
            ],
            other => vec![other.kind().channel_name(product_code)],
        }
    }

    fn dispatch(&mut self, product_code: &ProductCode, params: NotificationParams<Value>) -> Result<()> {
        let NotificationParams { channel, message } = params;

        if let StreamHandler::MergedBoard { book, callback } = self {
            let merged = if channel == StreamKind::BoardSnapshot.channel_name(product_code) {
                book.replace(decode_payload(message)?)
            } else if channel == StreamKind::Board.channel_name(product_code) {
                book.apply_diff(&decode_payload(message)?)
            } else {
                debug!(%channel, "ignoring message for foreign channel");
                return Ok(());
            };
            callback(product_code, merged);
            return Ok(());
        }

        if channel != self.kind().channel_name(product_code) {
            debug!(%channel, "ignoring message for foreign channel");
            return Ok(());
        }
        match self {
            StreamHandler::Ticker(callback) => callback(product_code, decode_payload(message)?),
            StreamHandler::BoardSnapshot(callback) | StreamHandler::Board(callback) => {
                callback(product_code, decode_payload(message)?)
            }
            StreamHandler::Executions(callback) => callback(product_code, decode_payload(message)?),
            StreamHandler::MergedBoard { .. } => {}
        }
        Ok(())
    }
}

enum Event {
    Control(Option<ControlFrame>),
    Read(Result<String>),
}

/// Per-channel protocol state driven by the connection manager.
///
/// Only this type mutates the subscription state. Other tasks talk to it
/// through the control mailbox.
pub struct SubscriptionChannel {
    product_code: ProductCode,
    handler: StreamHandler,
    topics: Vec<String>,
    subscribed: BTreeSet<String>,
    // Set once an unsubscribe is written; suppresses automatic resubscribe.
    parked: bool,
    control_rx: mpsc::UnboundedReceiver<ControlFrame>,
    mailbox_open: bool,
    write_timeout: Duration,
    read_timeout: Duration,
}

impl SubscriptionChannel {
    pub fn new(
        product_code: ProductCode,
        handler: StreamHandler,
        config: &ConnectionConfig,
    ) -> (Self, ControlSender) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let topics = handler.topics(&product_code);
        let channel = Self {
            product_code,
            handler,
            topics,
            subscribed: BTreeSet::new(),
            parked: false,
            control_rx,
            mailbox_open: true,
            write_timeout: config.write_timeout,
            read_timeout: config.read_timeout,
        };
        (channel, control_tx)
    }

    pub fn state(&self) -> SubscriptionState {
        if self.subscribed.is_empty() {
            SubscriptionState::Unsubscribed
        } else {
            SubscriptionState::Subscribed
        }
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    async fn send_control(&mut self, conn: &WsConnection, frame: ControlFrame) -> Result<()> {
        let channel = frame.channel().to_string();
        if frame.method == ControlMethod::Unsubscribe && !self.subscribed.contains(&channel) {
            debug!(%channel, "dropping unsubscribe for inactive topic");
            return Ok(());
        }

        if let Err(err) = conn.write_json(&frame, self.write_timeout).await {
            self.subscribed.clear();
            return Err(err);
        }

        match frame.method {
            ControlMethod::Subscribe => {
                debug!(%channel, "subscribed");
                self.subscribed.insert(channel);
                self.parked = false;
            }
            ControlMethod::Unsubscribe => {
                debug!(%channel, "unsubscribed");
                self.subscribed.remove(&channel);
                self.parked = true;
            }
        }
        Ok(())
    }

    async fn subscribe_all(&mut self, conn: &WsConnection) -> Result<()> {
        for topic in self.topics.clone() {
            if !self.subscribed.contains(&topic) {
                self.send_control(conn, ControlFrame::subscribe(topic)).await?;
            }
        }
        Ok(())
    }

    fn handle_read(&mut self, read: Result<String>) -> Result<()> {
        let text = match read {
            Ok(text) => text,
            Err(err) => {
                self.subscribed.clear();
                return Err(err);
            }
        };

        let delivered = match decode_notification(&text) {
            Ok(Some(params)) => self.handler.dispatch(&self.product_code, params),
            Ok(None) => {
                trace!(frame = %text, "skipping non-notification frame");
                Ok(())
            }
            Err(err) => Err(err),
        };
        if let Err(err) = &delivered {
            warn!(product_code = %self.product_code, error = %err, "undecodable notification");
            self.subscribed.clear();
        }
        delivered
    }

    async fn next_control(&mut self) -> Option<ControlFrame> {
        if !self.mailbox_open {
            return std::future::pending().await;
        }
        let frame = self.control_rx.recv().await;
        if frame.is_none() {
            self.mailbox_open = false;
        }
        frame
    }
}

#[async_trait]
impl MessageLoop for SubscriptionChannel {
    async fn step(&mut self, conn: &mut WsConnection) -> Result<()> {
        // Pending control frames always go before reads.
        if let Ok(frame) = self.control_rx.try_recv() {
            return self.send_control(conn, frame).await;
        }

        match self.state() {
            SubscriptionState::Unsubscribed if !self.parked => self.subscribe_all(conn).await,
            SubscriptionState::Unsubscribed => match self.next_control().await {
                Some(frame) => self.send_control(conn, frame).await,
                None => Ok(()),
            },
            SubscriptionState::Subscribed => {
                let read_timeout = self.read_timeout;
                let event = tokio::select! {
                    biased;
                    frame = self.control_rx.recv(), if self.mailbox_open => Event::Control(frame),
                    read = conn.read_text(read_timeout) => Event::Read(read),
                };
                match event {
                    Event::Control(Some(frame)) => self.send_control(conn, frame).await,
                    Event::Control(None) => {
                        self.mailbox_open = false;
                        Ok(())
                    }
                    Event::Read(read) => self.handle_read(read),
                }
            }
        }
    }

    async fn flush(&mut self, conn: &mut WsConnection) {
        while let Ok(frame) = self.control_rx.try_recv() {
            if let Err(err) = self.send_control(conn, frame).await {
                warn!(product_code = %self.product_code, error = %err, "failed to flush control frame");
                return;
            }
        }
    }

    fn on_disconnect(&mut self) {
        self.subscribed.clear();
    }
}
