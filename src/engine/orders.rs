//! Market order execution.

use super::core::{Engine, EngineState};
use super::results::{EngineError, OrderResult};
use crate::account::calculate_account_summary;
use crate::margin::required_margin;
use crate::order::{Order, OrderStatus, Trade, TradeAction};
use crate::position::Position;
use crate::types::{AccountId, Money, OrderId, Price, Side, Timestamp};
use rust_decimal::Decimal;

impl Engine {
    /// Validate, margin-check and fill a market order. The whole sequence runs
    /// under one write-lock acquisition, so a concurrent order or close can
    /// never invalidate the free-margin figure between check and commit.
    ///
    /// Rejections for an existing account are kept as REJECTED orders.
    pub fn execute_market_order(
        &self,
        account_id: AccountId,
        symbol: &str,
        side: Side,
        volume: Decimal,
        sl: Option<Price>,
        tp: Option<Price>,
    ) -> Result<OrderResult, EngineError> {
        let symbol = symbol.trim().to_ascii_uppercase();
        let mut state = self.state.write();

        match self.fill_market_order(&mut state, account_id, &symbol, side, volume, sl, tp) {
            Ok(result) => Ok(result),
            Err(err) => {
                tracing::warn!(account = %account_id, symbol = %symbol, side = %side, %volume, error = %err, "order rejected");
                if state.accounts.contains_key(&account_id) {
                    let order_id = state.next_order_id();
                    let mut order = Order::market(order_id, account_id, symbol, side, volume, sl, tp, Timestamp::now());
                    order.reject(err.to_string());
                    state.orders.insert(order_id, order);
                }
                Err(err)
            }
        }
    }

    // every check precedes the first write
    #[allow(clippy::too_many_arguments)]
    fn fill_market_order(
        &self,
        state: &mut EngineState,
        account_id: AccountId,
        symbol: &str,
        side: Side,
        volume: Decimal,
        sl: Option<Price>,
        tp: Option<Price>,
    ) -> Result<OrderResult, EngineError> {
        let account = state.account(account_id)?;
        if !account.is_active() {
            return Err(EngineError::AccountNotActive(account_id));
        }
        let leverage = account.leverage;

        let spec = state
            .registry
            .get(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))?;
        if !spec.enabled {
            return Err(EngineError::SymbolDisabled(symbol.to_string()));
        }
        spec.validate_volume(volume)?;

        let tick = self.quote(symbol)?;
        let fill_price = tick.entry_price(side);

        let required = required_margin(Some(spec), symbol, volume, fill_price, leverage);
        let summary = calculate_account_summary(account, state.positions.values(), &state.registry);
        if summary.free_margin < required {
            return Err(EngineError::InsufficientMargin {
                required,
                available: summary.free_margin,
            });
        }
        let commission = Money::new(spec.commission_per_lot * volume);

        // commit
        let now = Timestamp::now();
        let order_id = state.next_order_id();
        let position_id = state.next_position_id();
        let trade_id = state.next_trade_id();

        let mut order = Order::market(order_id, account_id, symbol.to_string(), side, volume, sl, tp, now);
        order.fill(fill_price, position_id, now);

        let position = Position::open(
            position_id,
            order_id,
            account_id,
            symbol.to_string(),
            side,
            volume,
            fill_price,
            sl,
            tp,
            commission,
            now,
        );

        let trade = Trade {
            id: trade_id,
            order_id: Some(order_id),
            position_id,
            account_id,
            symbol: symbol.to_string(),
            side,
            action: TradeAction::Open,
            volume,
            price: fill_price,
            realized_pnl: Money::zero(),
            commission,
            executed_at: now,
        };

        // the ledger is the only step that can still fail, so it goes first
        let commission_entry = if commission.is_positive() {
            let entry = state
                .ledger
                .record_commission(account_id, commission.negate(), trade_id)?;
            state.apply_entry(&entry);
            Some(entry)
        } else {
            None
        };

        state.orders.insert(order_id, order.clone());
        state.positions.insert(position_id, position.clone());
        state.trades.push(trade.clone());

        tracing::info!(
            account = %account_id,
            position = %position_id,
            %symbol,
            %side,
            %volume,
            price = %fill_price,
            margin = %required,
            "order executed"
        );

        Ok(OrderResult {
            order,
            position,
            trade,
            commission_entry,
        })
    }

    pub fn get_order(&self, order_id: OrderId) -> Result<Order, EngineError> {
        self.state
            .read()
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(EngineError::OrderNotFound(order_id))
    }

    /// Orders of one account in id order, optionally filtered by status.
    pub fn get_orders(&self, account_id: AccountId, status: Option<OrderStatus>) -> Vec<Order> {
        self.state
            .read()
            .orders
            .values()
            .filter(|o| o.account_id == account_id)
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect()
    }

    /// Opening and closing fills of one account, oldest first.
    pub fn get_trades(&self, account_id: AccountId) -> Vec<Trade> {
        self.state
            .read()
            .trades
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect()
    }
}
