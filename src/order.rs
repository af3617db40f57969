//! Orders and trades.
//!
//! Market orders are created PENDING and resolved to FILLED or REJECTED inside
//! the same engine call, so nothing ever rests. Every fill, opening or closing,
//! leaves one immutable [`Trade`].

use crate::types::{AccountId, Money, OrderId, PositionId, Price, Side, Timestamp, TradeId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Only `Market` is executed synchronously. The others are accepted as
/// descriptors for external routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
    Stop,
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: Side,
    pub volume: Decimal,
    pub sl: Option<Price>,
    pub tp: Option<Price>,
    pub status: OrderStatus,
    pub filled_price: Option<Price>,
    pub filled_at: Option<Timestamp>,
    pub position_id: Option<PositionId>,
    pub reject_reason: Option<String>,
    pub created_at: Timestamp,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn market(
        id: OrderId,
        account_id: AccountId,
        symbol: String,
        side: Side,
        volume: Decimal,
        sl: Option<Price>,
        tp: Option<Price>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            account_id,
            symbol,
            order_type: OrderType::Market,
            side,
            volume,
            sl,
            tp,
            status: OrderStatus::Pending,
            filled_price: None,
            filled_at: None,
            position_id: None,
            reject_reason: None,
            created_at: timestamp,
        }
    }

    // PENDING -> FILLED
    pub fn fill(&mut self, price: Price, position_id: PositionId, timestamp: Timestamp) {
        debug_assert_eq!(self.status, OrderStatus::Pending);
        self.status = OrderStatus::Filled;
        self.filled_price = Some(price);
        self.filled_at = Some(timestamp);
        self.position_id = Some(position_id);
    }

    // PENDING -> REJECTED
    pub fn reject(&mut self, reason: impl Into<String>) {
        debug_assert_eq!(self.status, OrderStatus::Pending);
        self.status = OrderStatus::Rejected;
        self.reject_reason = Some(reason.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    /// Opening fills carry their order. Closes are not order-driven.
    pub order_id: Option<OrderId>,
    pub position_id: PositionId,
    pub account_id: AccountId,
    pub symbol: String,
    /// Side of the position the trade belongs to.
    pub side: Side,
    pub action: TradeAction,
    pub volume: Decimal,
    pub price: Price,
    pub realized_pnl: Money,
    pub commission: Money,
    pub executed_at: Timestamp,
}

impl Trade {
    /// `BUY`, `SELL`, `CLOSE_BUY` or `CLOSE_SELL`.
    pub fn label(&self) -> String {
        match self.action {
            TradeAction::Open => self.side.to_string(),
            TradeAction::Close => format!("CLOSE_{}", self.side),
        }
    }
}
