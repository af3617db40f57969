//! Trading accounts and their margin summary.
//!
//! An account's balance is never mutated directly: the engine copies the
//! ledger's `balance_after` onto it after every posting. Equity, used margin
//! and free margin are derived on demand from the account's open positions.

use crate::instrument::{InstrumentRegistry, SymbolSpec};
use crate::margin::{free_margin, margin_level, notional_value, required_margin};
use crate::position::Position;
use crate::types::{AccountId, Leverage, Money, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Disabled,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => f.write_str("ACTIVE"),
            AccountStatus::Disabled => f.write_str("DISABLED"),
        }
    }
}

/// Stored per account. Execution treats every account as hedging: each fill
/// opens an independent position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarginMode {
    #[default]
    Hedging,
    Netting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_number: String,
    pub user_id: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub balance: Money,
    pub leverage: Leverage,
    pub margin_mode: MarginMode,
    pub status: AccountStatus,
    pub is_demo: bool,
    pub created_at: Timestamp,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Point-in-time margin picture of one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: AccountId,
    pub balance: Money,
    pub equity: Money,
    pub margin: Money,
    pub free_margin: Money,
    /// `None` when nothing is margined.
    pub margin_level: Option<Decimal>,
    pub unrealized_pnl: Money,
    pub exposure: Money,
    pub open_positions: usize,
}

/// Margin held by one open position: priced at its open price against the
/// account's current leverage.
pub fn position_margin(position: &Position, spec: Option<&SymbolSpec>, leverage: Leverage) -> Money {
    required_margin(spec, &position.symbol, position.volume, position.open_price, leverage)
}

/// Gross notional of a position at its last marked price.
pub fn position_exposure(position: &Position, spec: Option<&SymbolSpec>) -> Money {
    match spec {
        Some(spec) => notional_value(spec, position.volume, position.current_price),
        None => notional_value(&SymbolSpec::synthesize(&position.symbol), position.volume, position.current_price),
    }
}

// 2.1: equity = balance + marked pnl. free margin is what a new order is checked against
pub fn calculate_account_summary<'a>(
    account: &Account,
    positions: impl IntoIterator<Item = &'a Position>,
    registry: &InstrumentRegistry,
) -> AccountSummary {
    let mut unrealized_pnl = Money::zero();
    let mut used_margin = Money::zero();
    let mut exposure = Money::zero();
    let mut open_positions = 0;

    for position in positions
        .into_iter()
        .filter(|p| p.account_id == account.id && p.is_open())
    {
        let spec = registry.get(&position.symbol);
        unrealized_pnl = unrealized_pnl.add(position.unrealized_pnl);
        used_margin = used_margin.add(position_margin(position, spec, account.leverage));
        exposure = exposure.add(position_exposure(position, spec));
        open_positions += 1;
    }

    let equity = account.balance.add(unrealized_pnl);

    AccountSummary {
        account_id: account.id,
        balance: account.balance,
        equity,
        margin: used_margin,
        free_margin: free_margin(equity, used_margin),
        margin_level: margin_level(equity, used_margin),
        unrealized_pnl,
        exposure,
        open_positions,
    }
}

/// Formats an account number such as `RTX-000042`.
pub fn format_account_number(prefix: &str, id: AccountId) -> String {
    format!("{}-{:06}", prefix, id.0)
}
