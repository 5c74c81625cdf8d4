/*
[INPUT]:  bitFlyer Lightning API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions shared by REST and realtime streams
[UPDATE]: When API schema changes or new response types added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{
    ChildOrderState, CurrencyCode, OrderMethod, OrderType, ProductCode, Side, TimeInForce,
};
use super::requests::ParentOrderParameter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub product_code: ProductCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<ProductCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_type: Option<String>,
}

/// One price level of an order book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl BoardLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Order book view: bids descending, asks ascending by price.
///
/// The same shape carries REST snapshots, realtime snapshots and realtime
/// diffs. In a diff, `size == 0` removes a level and `price == 0` is a no-op.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Board {
    pub mid_price: Decimal,
    #[serde(default)]
    pub bids: Vec<BoardLevel>,
    #[serde(default)]
    pub asks: Vec<BoardLevel>,
}

impl Board {
    pub fn best_bid(&self) -> Option<&BoardLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BoardLevel> {
        self.asks.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub product_code: ProductCode,
    pub timestamp: String,
    pub tick_id: i64,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub best_bid_size: Decimal,
    pub best_ask_size: Decimal,
    pub total_bid_depth: Decimal,
    pub total_ask_depth: Decimal,
    pub ltp: Decimal,
    pub volume: Decimal,
    pub volume_by_product: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: i64,
    /// `BUY`, `SELL`, or empty for executions matched during itayose.
    pub side: String,
    pub price: Decimal,
    pub size: Decimal,
    pub exec_date: String,
    pub buy_child_order_acceptance_id: String,
    pub sell_child_order_acceptance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardState {
    pub health: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BoardStateData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardStateData {
    pub special_quotation: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub currency_code: String,
    pub amount: Decimal,
    pub available: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collateral {
    pub collateral: Decimal,
    pub open_position_pnl: Decimal,
    pub require_collateral: Decimal,
    pub keep_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub product_code: ProductCode,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub commission: Decimal,
    pub swap_point_accumulate: Decimal,
    pub require_collateral: Decimal,
    pub open_date: String,
    pub leverage: Decimal,
    pub pnl: Decimal,
    #[serde(default)]
    pub sfd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildOrder {
    pub id: i64,
    pub child_order_id: String,
    pub product_code: ProductCode,
    pub side: Side,
    pub child_order_type: OrderType,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub average_price: Decimal,
    pub size: Decimal,
    pub child_order_state: ChildOrderState,
    pub expire_date: String,
    pub child_order_date: String,
    pub child_order_acceptance_id: String,
    pub outstanding_size: Decimal,
    pub cancel_size: Decimal,
    pub executed_size: Decimal,
    pub total_commission: Decimal,
}

/// Public chat log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub nickname: String,
    pub message: String,
    pub date: String,
}

/// One of the account's own fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MyExecution {
    pub id: i64,
    pub child_order_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    pub exec_date: String,
    pub child_order_acceptance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceHistory {
    pub id: i64,
    pub trade_date: String,
    #[serde(default)]
    pub product_code: Option<ProductCode>,
    pub currency_code: CurrencyCode,
    /// `BUY`, `SELL`, `DEPOSIT`, `WITHDRAW`, `FEE`, `POST_COLL`, `CANCEL_COLL`, `PAYMENT` or `TRANSFER`.
    pub trade_type: String,
    #[serde(default)]
    pub price: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    pub balance: Decimal,
    #[serde(default)]
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralHistory {
    pub id: i64,
    pub currency_code: CurrencyCode,
    pub change: Decimal,
    pub amount: Decimal,
    pub reason_code: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralAccount {
    pub currency_code: CurrencyCode,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingCommission {
    pub commission_rate: Decimal,
}

/// Parent order as listed by `getparentorders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentOrder {
    pub id: i64,
    pub parent_order_id: String,
    pub product_code: ProductCode,
    pub side: String,
    pub parent_order_type: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub average_price: Decimal,
    pub size: Decimal,
    pub parent_order_state: ChildOrderState,
    pub expire_date: String,
    pub parent_order_date: String,
    pub parent_order_acceptance_id: String,
    pub outstanding_size: Decimal,
    pub cancel_size: Decimal,
    pub executed_size: Decimal,
    pub total_commission: Decimal,
}

/// Parent order with its legs, as returned by `getparentorder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentOrderDetail {
    pub id: i64,
    pub parent_order_id: String,
    pub order_method: OrderMethod,
    #[serde(default)]
    pub minute_to_expire: Option<u32>,
    #[serde(default)]
    pub time_in_force: Option<TimeInForce>,
    pub parameters: Vec<ParentOrderParameter>,
}
