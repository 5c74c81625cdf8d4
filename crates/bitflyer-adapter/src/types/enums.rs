/*
[INPUT]:  bitFlyer Lightning API schema definitions and serde requirements
[OUTPUT]: Typed Rust enums and identifiers with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new enum values appear
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Traded product code, e.g. `BTC_JPY` or `FX_BTC_JPY`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductCode(String);

impl ProductCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductCode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProductCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Currency code, e.g. `JPY` or `BTC`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
}

/// Order lifecycle state, used by both child and parent orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChildOrderState {
    Active,
    Completed,
    Canceled,
    Expired,
    Rejected,
}

/// Special order method of a parent order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderMethod {
    Simple,
    Ifd,
    Oco,
    Ifdoco,
}

impl OrderMethod {
    /// Number of parameters the method takes.
    pub fn parameter_count(self) -> usize {
        match self {
            OrderMethod::Simple => 1,
            OrderMethod::Ifd | OrderMethod::Oco => 2,
            OrderMethod::Ifdoco => 3,
        }
    }
}

/// Execution condition of one parent order parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    Limit,
    Market,
    Stop,
    StopLimit,
    Trail,
}

/// Which identifier an order lookup or cancellation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    ParentOrderId,
    ParentOrderAcceptanceId,
    ChildOrderId,
    ChildOrderAcceptanceId,
}
