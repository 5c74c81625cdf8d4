/*
[INPUT]:  Raw JSON-RPC 2.0 text frames from the Lightning realtime endpoint
[OUTPUT]: Control frames to send and decoded channel notifications
[POS]:    Realtime layer - wire codec
[UPDATE]: When adding stream kinds or changing the envelope format
*/

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::Result;
use crate::types::ProductCode;

pub const JSONRPC_VERSION: &str = "2.0";
pub const CHANNEL_MESSAGE_METHOD: &str = "channelMessage";

/// Which realtime feed a channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Ticker,
    BoardSnapshot,
    Board,
    Executions,
}

impl StreamKind {
    pub fn prefix(self) -> &'static str {
        match self {
            StreamKind::Ticker => "lightning_ticker_",
            StreamKind::BoardSnapshot => "lightning_board_snapshot_",
            StreamKind::Board => "lightning_board_",
            StreamKind::Executions => "lightning_executions_",
        }
    }

    /// Protocol channel name, e.g. `lightning_board_BTC_JPY`.
    pub fn channel_name(self, product_code: &ProductCode) -> String {
        format!("{}{}", self.prefix(), product_code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Ticker => "ticker",
            StreamKind::BoardSnapshot => "board_snapshot",
            StreamKind::Board => "board",
            StreamKind::Executions => "executions",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one active subscription: at most one channel per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub product_code: ProductCode,
    pub kind: StreamKind,
}

impl ChannelKey {
    pub fn new(product_code: ProductCode, kind: StreamKind) -> Self {
        Self { product_code, kind }
    }

    pub fn channel_name(&self) -> String {
        self.kind.channel_name(&self.product_code)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product_code, self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMethod {
    Subscribe,
    Unsubscribe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelParams {
    pub channel: String,
}

/// Client to server subscribe/unsubscribe request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub jsonrpc: String,
    pub method: ControlMethod,
    pub params: ChannelParams,
}

impl ControlFrame {
    pub fn new(method: ControlMethod, channel: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method,
            params: ChannelParams {
                channel: channel.into(),
            },
        }
    }

    pub fn subscribe(channel: impl Into<String>) -> Self {
        Self::new(ControlMethod::Subscribe, channel)
    }

    pub fn unsubscribe(channel: impl Into<String>) -> Self {
        Self::new(ControlMethod::Unsubscribe, channel)
    }

    pub fn channel(&self) -> &str {
        &self.params.channel
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationParams<T> {
    pub channel: String,
    pub message: T,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<NotificationParams<Value>>,
}

/// Decode one text frame.
///
/// Returns `Ok(None)` for well-formed frames that carry no channel message,
/// such as subscribe acknowledgements.
pub fn decode_notification(text: &str) -> Result<Option<NotificationParams<Value>>> {
    let envelope: Envelope = serde_json::from_str(text)?;
    match (envelope.method.as_deref(), envelope.params) {
        (Some(CHANNEL_MESSAGE_METHOD), Some(params)) => Ok(Some(params)),
        _ => Ok(None),
    }
}

/// Decode the payload of a notification into the stream's typed message.
pub fn decode_payload<T: serde::de::DeserializeOwned>(message: Value) -> Result<T> {
    Ok(serde_json::from_value(message)?)
}
