// 8.0.2: result types and errors for engine operations.

use crate::instrument::{RegistryError, SymbolError};
use crate::ledger::{LedgerError, LedgerEntry};
use crate::order::{Order, Trade};
use crate::position::Position;
use crate::types::{AccountId, Money, OrderId, PositionId};
use rust_decimal::Decimal;

/// Everything a filled market order produced.
#[derive(Debug, Clone)]
pub struct OrderResult {
    pub order: Order,
    pub position: Position,
    pub trade: Trade,
    /// Present when the symbol charges commission.
    pub commission_entry: Option<LedgerEntry>,
}

/// Per-position result of a bulk close.
#[derive(Debug)]
pub struct CloseOutcome {
    pub position_id: PositionId,
    pub result: Result<Trade, EngineError>,
}

/// Coarse failure class, for callers mapping errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    ResourceUnavailable,
    InsufficientFunds,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Position {0} not found")]
    PositionNotFound(PositionId),

    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Symbol {0} not found")]
    SymbolNotFound(String),

    #[error("Unknown symbol {0}")]
    UnknownSymbol(String),

    #[error("Account {0} is not active")]
    AccountNotActive(AccountId),

    #[error("Account {0} is already active")]
    AccountAlreadyActive(AccountId),

    #[error("Account {0} is already disabled")]
    AccountAlreadyDisabled(AccountId),

    #[error("Cannot disable account {account_id} with {open_positions} open positions")]
    AccountHasOpenPositions {
        account_id: AccountId,
        open_positions: usize,
    },

    #[error("Position {0} is not open")]
    PositionNotOpen(PositionId),

    #[error("Invalid side {0:?}: must be BUY or SELL")]
    InvalidSide(String),

    #[error("Symbol {0} is disabled for trading")]
    SymbolDisabled(String),

    #[error("Leverage must be positive, got {0}")]
    InvalidLeverage(Decimal),

    #[error("Password cannot be empty")]
    EmptyPassword,

    #[error("Price feed not available")]
    NoPriceFeed,

    #[error("No price available for {0}")]
    NoQuote(String),

    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Money, available: Money },

    #[error("Symbol error: {0}")]
    Symbol(#[from] SymbolError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        use EngineError::*;
        match self {
            AccountNotFound(_) | PositionNotFound(_) | OrderNotFound(_) | SymbolNotFound(_) => {
                ErrorKind::NotFound
            }
            AccountNotActive(_)
            | AccountAlreadyActive(_)
            | AccountAlreadyDisabled(_)
            | AccountHasOpenPositions { .. }
            | PositionNotOpen(_) => ErrorKind::State,
            UnknownSymbol(_)
            | InvalidSide(_)
            | SymbolDisabled(_)
            | InvalidLeverage(_)
            | EmptyPassword
            | Symbol(_) => ErrorKind::Validation,
            Registry(RegistryError::InvalidSpec(_)) => ErrorKind::Validation,
            NoPriceFeed | NoQuote(_) | Registry(_) => ErrorKind::ResourceUnavailable,
            InsufficientMargin { .. } => ErrorKind::InsufficientFunds,
            Ledger(LedgerError::NonPositiveAmount { .. } | LedgerError::Overflow { .. }) => {
                ErrorKind::Validation
            }
            Ledger(LedgerError::InsufficientBalance { .. } | LedgerError::NegativeBalance { .. }) => {
                ErrorKind::InsufficientFunds
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerEntryType;
    use rust_decimal_macros::dec;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(EngineError::AccountNotFound(AccountId(1)).kind(), ErrorKind::NotFound);
        assert_eq!(EngineError::PositionNotOpen(PositionId(1)).kind(), ErrorKind::State);
        assert_eq!(EngineError::InvalidSide("HOLD".into()).kind(), ErrorKind::Validation);
        assert_eq!(EngineError::NoQuote("EURUSD".into()).kind(), ErrorKind::ResourceUnavailable);
        assert_eq!(
            EngineError::InsufficientMargin {
                required: Money::new(dec!(10)),
                available: Money::new(dec!(5)),
            }
            .kind(),
            ErrorKind::InsufficientFunds
        );
        let overdraw: EngineError = LedgerError::InsufficientBalance {
            requested: Money::new(dec!(2)),
            available: Money::new(dec!(1)),
        }
        .into();
        assert_eq!(overdraw.kind(), ErrorKind::InsufficientFunds);
        let zero: EngineError = LedgerError::NonPositiveAmount {
            entry_type: LedgerEntryType::Deposit,
            amount: Money::zero(),
        }
        .into();
        assert_eq!(zero.kind(), ErrorKind::Validation);
        let overflow: EngineError = LedgerError::Overflow {
            amount: Money::new(Decimal::MAX),
            balance: Money::new(dec!(1)),
        }
        .into();
        assert_eq!(overflow.kind(), ErrorKind::Validation);

        // unknown on the order path is bad input, unknown on an admin lookup is a miss
        assert_eq!(EngineError::UnknownSymbol("FOOBAR".into()).kind(), ErrorKind::Validation);
        assert_eq!(EngineError::SymbolNotFound("FOOBAR".into()).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn margin_message_carries_amounts() {
        let err = EngineError::InsufficientMargin {
            required: Money::new(dec!(110.02)),
            available: Money::new(dec!(50)),
        };
        assert_eq!(err.to_string(), "Insufficient margin: required 110.02, available 50");
    }
}
