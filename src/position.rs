// 4.0: open position tracking. pnl is in pips, see margin::calculate_pnl.
// 4.1 has the close/reduce transitions at the bottom.

use crate::instrument::SymbolSpec;
use crate::margin::calculate_pnl;
use crate::types::{AccountId, Money, OrderId, PositionId, Price, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloseReason {
    Manual,
    Bulk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub symbol: String,
    pub side: Side,
    pub volume: Decimal,
    pub open_price: Price,
    pub current_price: Price,
    pub sl: Option<Price>,
    pub tp: Option<Price>,
    pub commission: Money,
    pub unrealized_pnl: Money,
    /// Sum of P&L realized by partial closes so far.
    pub realized_pnl: Money,
    pub status: PositionStatus,
    pub opened_at: Timestamp,
    pub close_price: Option<Price>,
    pub closed_at: Option<Timestamp>,
    pub close_reason: Option<CloseReason>,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: PositionId,
        order_id: OrderId,
        account_id: AccountId,
        symbol: String,
        side: Side,
        volume: Decimal,
        open_price: Price,
        sl: Option<Price>,
        tp: Option<Price>,
        commission: Money,
        timestamp: Timestamp,
    ) -> Self {
        debug_assert!(volume > Decimal::ZERO, "open position needs positive volume");
        Self {
            id,
            order_id,
            account_id,
            symbol,
            side,
            volume,
            open_price,
            current_price: open_price,
            sl,
            tp,
            commission,
            unrealized_pnl: Money::zero(),
            realized_pnl: Money::zero(),
            status: PositionStatus::Open,
            opened_at: timestamp,
            close_price: None,
            closed_at: None,
            close_reason: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    // 4.1: mark-to-market. price is the exit side of the quote
    pub fn mark(&mut self, price: Price, spec: Option<&SymbolSpec>) {
        self.current_price = price;
        self.unrealized_pnl = calculate_pnl(self.side, self.open_price, price, self.volume, spec);
    }

    /// P&L of closing `volume` lots at `price`.
    pub fn pnl_for(&self, volume: Decimal, price: Price, spec: Option<&SymbolSpec>) -> Money {
        calculate_pnl(self.side, self.open_price, price, volume, spec)
    }

    /// Non-positive or oversized requests mean "close everything".
    pub fn normalize_close_volume(&self, requested: Decimal) -> Decimal {
        if requested <= Decimal::ZERO || requested >= self.volume {
            self.volume
        } else {
            requested
        }
    }

    /// Volume is frozen at its last value; the position never reopens.
    pub fn close_fully(&mut self, price: Price, reason: CloseReason, timestamp: Timestamp) {
        debug_assert!(self.is_open());
        self.status = PositionStatus::Closed;
        self.current_price = price;
        self.unrealized_pnl = Money::zero();
        self.close_price = Some(price);
        self.closed_at = Some(timestamp);
        self.close_reason = Some(reason);
    }

    pub fn reduce(&mut self, volume: Decimal) {
        debug_assert!(volume > Decimal::ZERO && volume < self.volume);
        self.volume -= volume;
    }
}

// 4.2: bulk close selector, evaluated on freshly marked pnl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloseFilter {
    All,
    Winners,
    Losers,
}

impl CloseFilter {
    pub fn matches(&self, unrealized_pnl: Money) -> bool {
        match self {
            CloseFilter::All => true,
            CloseFilter::Winners => unrealized_pnl.is_positive(),
            CloseFilter::Losers => unrealized_pnl.is_negative(),
        }
    }
}

impl fmt::Display for CloseFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseFilter::All => "ALL",
            CloseFilter::Winners => "WINNERS",
            CloseFilter::Losers => "LOSERS",
        };
        f.write_str(s)
    }
}

impl FromStr for CloseFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(CloseFilter::All),
            "WINNERS" => Ok(CloseFilter::Winners),
            "LOSERS" => Ok(CloseFilter::Losers),
            other => Err(format!("unknown close filter: {other}")),
        }
    }
}
