//! Position lifecycle: close, bulk close, modify, mark-to-market.

use super::core::{Engine, EngineState};
use super::results::{CloseOutcome, EngineError};
use crate::order::{Trade, TradeAction};
use crate::position::{CloseFilter, CloseReason, Position};
use crate::types::{AccountId, Money, PositionId, Price, Timestamp};
use rust_decimal::Decimal;

impl Engine {
    /// Close `volume` lots of an open position, or all of it when `volume` is
    /// non-positive or at least the remaining size. Always posts the realized
    /// P&L to the ledger and emits one closing trade.
    pub fn close_position(&self, position_id: PositionId, volume: Decimal) -> Result<Trade, EngineError> {
        let mut state = self.state.write();
        self.close_locked(&mut state, position_id, volume, CloseReason::Manual)
    }

    /// Close every open position of an account matching `filter` (and
    /// `symbol`, if given). Positions are marked first so WINNERS/LOSERS see
    /// current P&L. Runs under a single write lock.
    pub fn close_positions(
        &self,
        account_id: AccountId,
        filter: CloseFilter,
        symbol: Option<&str>,
    ) -> Result<Vec<CloseOutcome>, EngineError> {
        let symbol = symbol.map(|s| s.trim().to_ascii_uppercase());
        let mut state = self.state.write();
        state.account(account_id)?;
        self.mark_locked(&mut state);

        let targets: Vec<PositionId> = state
            .positions
            .values()
            .filter(|p| p.account_id == account_id && p.is_open())
            .filter(|p| symbol.as_ref().map_or(true, |s| &p.symbol == s))
            .filter(|p| filter.matches(p.unrealized_pnl))
            .map(|p| p.id)
            .collect();

        let outcomes: Vec<CloseOutcome> = targets
            .into_iter()
            .map(|position_id| CloseOutcome {
                position_id,
                result: self.close_locked(&mut state, position_id, Decimal::ZERO, CloseReason::Bulk),
            })
            .collect();

        let closed = outcomes.iter().filter(|o| o.result.is_ok()).count();
        tracing::info!(account = %account_id, %filter, closed, failed = outcomes.len() - closed, "bulk close");
        Ok(outcomes)
    }

    fn close_locked(
        &self,
        state: &mut EngineState,
        position_id: PositionId,
        requested: Decimal,
        reason: CloseReason,
    ) -> Result<Trade, EngineError> {
        let position = state
            .positions
            .get(&position_id)
            .ok_or(EngineError::PositionNotFound(position_id))?;
        if !position.is_open() {
            return Err(EngineError::PositionNotOpen(position_id));
        }
        let account_id = position.account_id;
        state.account(account_id)?;

        let tick = self.quote(&position.symbol)?;
        let close_price = tick.exit_price(position.side);
        let volume = position.normalize_close_volume(requested);
        let spec = state.registry.get(&position.symbol).cloned();
        let realized = position.pnl_for(volume, close_price, spec.as_ref());

        // commit
        let now = Timestamp::now();
        let trade_id = state.next_trade_id();
        let entry = state.ledger.record_realized_pnl(account_id, realized, trade_id)?;
        state.apply_entry(&entry);

        let position = state
            .positions
            .get_mut(&position_id)
            .ok_or(EngineError::PositionNotFound(position_id))?;
        let trade = Trade {
            id: trade_id,
            order_id: None,
            position_id,
            account_id,
            symbol: position.symbol.clone(),
            side: position.side,
            action: TradeAction::Close,
            volume,
            price: close_price,
            realized_pnl: realized,
            commission: Money::zero(),
            executed_at: now,
        };

        position.realized_pnl = position.realized_pnl.add(realized);
        if volume >= position.volume {
            position.close_fully(close_price, reason, now);
        } else {
            position.reduce(volume);
            position.mark(close_price, spec.as_ref());
        }

        tracing::info!(
            position = %position_id,
            symbol = %trade.symbol,
            %volume,
            price = %close_price,
            pnl = %realized,
            remaining = %position.volume,
            closed = !position.is_open(),
            "position closed"
        );
        state.trades.push(trade.clone());
        Ok(trade)
    }

    /// Replace stop-loss and take-profit. No ledger effect.
    pub fn modify_position(
        &self,
        position_id: PositionId,
        sl: Option<Price>,
        tp: Option<Price>,
    ) -> Result<Position, EngineError> {
        let mut state = self.state.write();
        let position = state
            .positions
            .get_mut(&position_id)
            .ok_or(EngineError::PositionNotFound(position_id))?;
        if !position.is_open() {
            return Err(EngineError::PositionNotOpen(position_id));
        }
        position.sl = sl;
        position.tp = tp;
        tracing::info!(position = %position_id, sl = ?sl.map(|p| p.value()), tp = ?tp.map(|p| p.value()), "position modified");
        Ok(position.clone())
    }

    /// Mark every open position to the exit side of its current quote.
    /// Symbols without a quote keep their last mark. Returns how many were
    /// marked.
    pub fn update_position_prices(&self) -> usize {
        if self.oracle.is_none() {
            return 0;
        }
        let mut state = self.state.write();
        self.mark_locked(&mut state)
    }

    fn mark_locked(&self, state: &mut EngineState) -> usize {
        let Some(oracle) = self.oracle.as_ref() else {
            return 0;
        };
        let EngineState {
            positions, registry, ..
        } = state;

        let mut marked = 0;
        for position in positions.values_mut().filter(|p| p.is_open()) {
            let Some(tick) = oracle.quote(&position.symbol) else {
                continue;
            };
            position.mark(tick.exit_price(position.side), registry.get(&position.symbol));
            marked += 1;
        }
        tracing::debug!(marked, "mark-to-market pass");
        marked
    }

    pub fn get_position(&self, position_id: PositionId) -> Result<Position, EngineError> {
        self.state
            .read()
            .positions
            .get(&position_id)
            .cloned()
            .ok_or(EngineError::PositionNotFound(position_id))
    }

    /// Open positions of one account.
    pub fn get_positions(&self, account_id: AccountId) -> Vec<Position> {
        self.state
            .read()
            .positions
            .values()
            .filter(|p| p.account_id == account_id && p.is_open())
            .cloned()
            .collect()
    }

    /// Open positions across all accounts.
    pub fn get_all_positions(&self) -> Vec<Position> {
        self.state
            .read()
            .positions
            .values()
            .filter(|p| p.is_open())
            .cloned()
            .collect()
    }
}
