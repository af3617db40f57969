// 8.0 engine/core.rs: main engine. one RwLock over every map, accounts, funds, symbols.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::account::{
    calculate_account_summary, format_account_number, Account, AccountStatus, AccountSummary, MarginMode,
};
use crate::instrument::{InstrumentRegistry, SymbolSpec};
use crate::ledger::{Ledger, LedgerEntry, LedgerEntryType, PostingInfo};
use crate::order::{Order, Trade};
use crate::position::Position;
use crate::price_feed::PriceOracle;
use crate::types::{AccountId, Leverage, Money, OrderId, PositionId, Timestamp, TradeId};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/** 8.1: everything that moves money. only ever touched through Engine::state */
#[derive(Debug)]
pub(crate) struct EngineState {
    pub(super) accounts: BTreeMap<AccountId, Account>,
    pub(super) positions: BTreeMap<PositionId, Position>,
    pub(super) orders: BTreeMap<OrderId, Order>,
    pub(super) trades: Vec<Trade>,
    pub(super) registry: InstrumentRegistry,
    pub(super) ledger: Ledger,
    pub(super) next_account_id: u64,
    pub(super) next_order_id: u64,
    pub(super) next_position_id: u64,
    pub(super) next_trade_id: u64,
}

impl EngineState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            accounts: BTreeMap::new(),
            positions: BTreeMap::new(),
            orders: BTreeMap::new(),
            trades: Vec::new(),
            registry: InstrumentRegistry::bootstrap(config.symbol_data_dir.as_deref(), &config.essential_symbols),
            ledger: Ledger::new(config.currency.clone()),
            next_account_id: 1,
            next_order_id: 1,
            next_position_id: 1,
            next_trade_id: 1,
        }
    }

    pub(super) fn account(&self, account_id: AccountId) -> Result<&Account, EngineError> {
        self.accounts
            .get(&account_id)
            .ok_or(EngineError::AccountNotFound(account_id))
    }

    pub(super) fn account_mut(&mut self, account_id: AccountId) -> Result<&mut Account, EngineError> {
        self.accounts
            .get_mut(&account_id)
            .ok_or(EngineError::AccountNotFound(account_id))
    }

    pub(super) fn summary(&self, account_id: AccountId) -> Result<AccountSummary, EngineError> {
        let account = self.account(account_id)?;
        Ok(calculate_account_summary(account, self.positions.values(), &self.registry))
    }

    pub(super) fn open_position_count(&self, account_id: AccountId) -> usize {
        self.positions
            .values()
            .filter(|p| p.account_id == account_id && p.is_open())
            .count()
    }

    // ledger first, then mirror the new balance onto the account
    pub(super) fn apply_entry(&mut self, entry: &LedgerEntry) {
        if let Some(account) = self.accounts.get_mut(&entry.account_id) {
            account.balance = entry.balance_after;
        }
    }

    pub(super) fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    pub(super) fn next_position_id(&mut self) -> PositionId {
        let id = PositionId(self.next_position_id);
        self.next_position_id += 1;
        id
    }

    pub(super) fn next_trade_id(&mut self) -> TradeId {
        let id = TradeId(self.next_trade_id);
        self.next_trade_id += 1;
        id
    }
}

/// Shared engine handle. Cheap to wrap in `Arc` and call from many threads:
/// reads share the lock, every mutation holds it exclusively end to end.
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) oracle: Option<Arc<dyn PriceOracle>>,
    pub(super) state: RwLock<EngineState>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("has_oracle", &self.oracle.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine without a price oracle. Anything needing a quote fails with
    /// [`EngineError::NoPriceFeed`].
    pub fn new(config: EngineConfig) -> Self {
        let state = EngineState::new(&config);
        tracing::info!(symbols = state.registry.len(), "engine started");
        Self {
            config,
            oracle: None,
            state: RwLock::new(state),
        }
    }

    pub fn with_oracle(config: EngineConfig, oracle: Arc<dyn PriceOracle>) -> Self {
        let mut engine = Self::new(config);
        engine.oracle = Some(oracle);
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- accounts ----

    /// New ACTIVE account with zero balance. An empty username defaults to the
    /// account number.
    pub fn create_account(&self, user_id: &str, username: &str, password: &str, is_demo: bool) -> Account {
        let mut state = self.state.write();
        let id = AccountId(state.next_account_id);
        state.next_account_id += 1;

        let account_number = format_account_number(&self.config.account_number_prefix, id);
        let username = if username.trim().is_empty() {
            account_number.clone()
        } else {
            username.to_string()
        };
        let account = Account {
            id,
            account_number,
            user_id: user_id.to_string(),
            username,
            password: password.to_string(),
            balance: Money::zero(),
            leverage: self.config.default_leverage,
            margin_mode: MarginMode::Hedging,
            status: AccountStatus::Active,
            is_demo,
            created_at: Timestamp::now(),
        };
        tracing::info!(account = %account.account_number, user = %user_id, demo = is_demo, "account created");
        state.accounts.insert(id, account.clone());
        account
    }

    pub fn get_account(&self, account_id: AccountId) -> Option<Account> {
        self.state.read().accounts.get(&account_id).cloned()
    }

    pub fn get_accounts_by_user(&self, user_id: &str) -> Vec<Account> {
        self.state
            .read()
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn list_accounts(&self) -> Vec<Account> {
        self.state.read().accounts.values().cloned().collect()
    }

    pub fn update_password(&self, account_id: AccountId, new_password: &str) -> Result<(), EngineError> {
        if new_password.is_empty() {
            return Err(EngineError::EmptyPassword);
        }
        let mut state = self.state.write();
        let account = state.account_mut(account_id)?;
        account.password = new_password.to_string();
        tracing::info!(account = %account.account_number, "password updated");
        Ok(())
    }

    /// Changes leverage and/or margin mode. `None` leaves a field alone.
    pub fn update_account(
        &self,
        account_id: AccountId,
        leverage: Option<Decimal>,
        margin_mode: Option<MarginMode>,
    ) -> Result<Account, EngineError> {
        let leverage = leverage
            .map(|value| Leverage::new(value).ok_or(EngineError::InvalidLeverage(value)))
            .transpose()?;

        let mut state = self.state.write();
        let account = state.account_mut(account_id)?;
        if let Some(leverage) = leverage {
            account.leverage = leverage;
        }
        if let Some(mode) = margin_mode {
            account.margin_mode = mode;
        }
        tracing::info!(
            account = %account.account_number,
            leverage = %account.leverage,
            mode = ?account.margin_mode,
            "account updated"
        );
        Ok(account.clone())
    }

    pub fn disable_account(&self, account_id: AccountId) -> Result<(), EngineError> {
        let mut state = self.state.write();
        let open_positions = state.open_position_count(account_id);
        let account = state.account_mut(account_id)?;
        if account.status == AccountStatus::Disabled {
            return Err(EngineError::AccountAlreadyDisabled(account_id));
        }
        if open_positions > 0 {
            return Err(EngineError::AccountHasOpenPositions {
                account_id,
                open_positions,
            });
        }
        account.status = AccountStatus::Disabled;
        tracing::info!(account = %account.account_number, "account disabled");
        Ok(())
    }

    pub fn enable_account(&self, account_id: AccountId) -> Result<(), EngineError> {
        let mut state = self.state.write();
        let account = state.account_mut(account_id)?;
        if account.is_active() {
            return Err(EngineError::AccountAlreadyActive(account_id));
        }
        account.status = AccountStatus::Active;
        tracing::info!(account = %account.account_number, "account enabled");
        Ok(())
    }

    pub fn get_account_summary(&self, account_id: AccountId) -> Result<AccountSummary, EngineError> {
        self.state.read().summary(account_id)
    }

    /// Summaries of every account holding open positions, for external
    /// monitoring.
    pub fn get_account_snapshots(&self) -> Vec<AccountSummary> {
        let state = self.state.read();
        state
            .accounts
            .values()
            .map(|account| calculate_account_summary(account, state.positions.values(), &state.registry))
            .filter(|summary| summary.open_positions > 0)
            .collect()
    }

    // ---- funds ----

    pub fn deposit(&self, account_id: AccountId, amount: Money, info: PostingInfo) -> Result<LedgerEntry, EngineError> {
        self.post(account_id, |ledger| ledger.deposit(account_id, amount, info))
    }

    pub fn withdraw(&self, account_id: AccountId, amount: Money, info: PostingInfo) -> Result<LedgerEntry, EngineError> {
        self.post(account_id, |ledger| ledger.withdraw(account_id, amount, info))
    }

    pub fn adjust(&self, account_id: AccountId, amount: Money, info: PostingInfo) -> Result<LedgerEntry, EngineError> {
        self.post(account_id, |ledger| ledger.adjust(account_id, amount, info))
    }

    pub fn add_bonus(&self, account_id: AccountId, amount: Money, info: PostingInfo) -> Result<LedgerEntry, EngineError> {
        self.post(account_id, |ledger| ledger.add_bonus(account_id, amount, info))
    }

    fn post<F>(&self, account_id: AccountId, posting: F) -> Result<LedgerEntry, EngineError>
    where
        F: FnOnce(&mut Ledger) -> Result<LedgerEntry, crate::ledger::LedgerError>,
    {
        let mut state = self.state.write();
        state.account(account_id)?;
        let entry = posting(&mut state.ledger).map_err(|err| {
            tracing::warn!(account = %account_id, error = %err, "ledger posting rejected");
            EngineError::from(err)
        })?;
        state.apply_entry(&entry);
        Ok(entry)
    }

    pub fn get_balance(&self, account_id: AccountId) -> Money {
        self.state.read().ledger.balance(account_id)
    }

    /// Newest first. `limit == 0` means the configured maximum.
    pub fn get_ledger_history(&self, account_id: AccountId, limit: usize) -> Vec<LedgerEntry> {
        self.state.read().ledger.history(account_id, self.config.clamp_limit(limit))
    }

    pub fn get_all_ledger_entries(&self, limit: usize) -> Vec<LedgerEntry> {
        self.state.read().ledger.all_entries(self.config.clamp_limit(limit))
    }

    pub fn get_ledger_entries_by_type(&self, entry_type: LedgerEntryType, limit: usize) -> Vec<LedgerEntry> {
        self.state
            .read()
            .ledger
            .entries_by_type(entry_type, self.config.clamp_limit(limit))
    }

    /// Chronological, unbounded. Used for reconciliation.
    pub fn get_ledger_entries_for(&self, account_id: AccountId) -> Vec<LedgerEntry> {
        self.state.read().ledger.entries_for(account_id).to_vec()
    }

    // ---- symbols ----

    pub fn register_symbol(&self, symbol: &str) -> SymbolSpec {
        self.state.write().registry.register(symbol).clone()
    }

    /// Read-path lookup first so a feed announcing known symbols never takes
    /// the write lock.
    pub fn discover_symbol(&self, symbol: &str) -> SymbolSpec {
        if let Some(spec) = self.state.read().registry.get(symbol) {
            return spec.clone();
        }
        self.register_symbol(symbol)
    }

    /// Admin upsert. The stored spec is marked confirmed.
    pub fn update_symbol(&self, mut spec: SymbolSpec) -> Result<SymbolSpec, EngineError> {
        spec.validate()?;
        spec.provisional = false;
        let mut state = self.state.write();
        state.registry.upsert(spec.clone());
        let stored = state
            .registry
            .get(&spec.symbol)
            .cloned()
            .ok_or(EngineError::SymbolNotFound(spec.symbol))?;
        tracing::info!(symbol = %stored.symbol, "symbol updated");
        Ok(stored)
    }

    pub fn confirm_symbol(&self, symbol: &str) -> Result<SymbolSpec, EngineError> {
        let mut state = self.state.write();
        let spec = state
            .registry
            .get_mut(symbol)
            .ok_or_else(|| EngineError::SymbolNotFound(symbol.to_string()))?;
        spec.provisional = false;
        Ok(spec.clone())
    }

    pub fn set_symbol_enabled(&self, symbol: &str, enabled: bool) -> Result<SymbolSpec, EngineError> {
        let mut state = self.state.write();
        let spec = state
            .registry
            .get_mut(symbol)
            .ok_or_else(|| EngineError::SymbolNotFound(symbol.to_string()))?;
        spec.enabled = enabled;
        tracing::info!(symbol = %spec.symbol, enabled, "symbol trading toggled");
        Ok(spec.clone())
    }

    pub fn get_symbol(&self, symbol: &str) -> Option<SymbolSpec> {
        self.state.read().registry.get(symbol).cloned()
    }

    /// Sorted by code.
    pub fn get_symbols(&self) -> Vec<SymbolSpec> {
        self.state.read().registry.all()
    }

    pub fn load_symbols_from_json(&self, path: impl AsRef<Path>) -> Result<usize, EngineError> {
        Ok(self.state.write().registry.load_json(path.as_ref())?)
    }

    pub fn save_symbols_to_json(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        Ok(self.state.read().registry.save_json(path.as_ref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ErrorKind;
    use crate::instrument::RegistryError;
    use crate::ledger::LedgerError;
    use rust_decimal_macros::dec;

    fn engine() -> Engine {
        Engine::new(EngineConfig::in_memory())
    }

    #[test]
    fn accounts_get_sequential_numbers() {
        let engine = engine();
        let first = engine.create_account("u1", "", "pw", false);
        let second = engine.create_account("u1", "trader", "pw", true);
        assert_eq!(first.id, AccountId(1));
        assert_eq!(first.account_number, "RTX-000001");
        assert_eq!(first.username, "RTX-000001");
        assert_eq!(second.username, "trader");
        assert_eq!(first.leverage.value(), dec!(100));
        assert_eq!(first.status, AccountStatus::Active);
        assert_eq!(engine.get_accounts_by_user("u1").len(), 2);
        assert!(engine.get_accounts_by_user("u2").is_empty());
    }

    #[test]
    fn funds_keep_account_and_ledger_in_step() {
        let engine = engine();
        let id = engine.create_account("u1", "", "pw", false).id;
        engine.deposit(id, Money::new(dec!(10000)), PostingInfo::new("wire")).unwrap();
        engine.add_bonus(id, Money::new(dec!(100)), PostingInfo::new("promo")).unwrap();
        engine.withdraw(id, Money::new(dec!(600)), PostingInfo::new("payout")).unwrap();
        engine.adjust(id, Money::new(dec!(-500)), PostingInfo::new("fix").admin("ops")).unwrap();

        let account = engine.get_account(id).unwrap();
        assert_eq!(account.balance.value(), dec!(9000));
        assert_eq!(engine.get_balance(id), account.balance);
        let history = engine.get_ledger_history(id, 2);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].entry_type, LedgerEntryType::Adjustment);
    }

    #[test]
    fn overdraw_leaves_everything_untouched() {
        let engine = engine();
        let id = engine.create_account("u1", "", "pw", false).id;
        engine.deposit(id, Money::new(dec!(100)), PostingInfo::new("wire")).unwrap();

        let err = engine
            .withdraw(id, Money::new(dec!(100.01)), PostingInfo::new("too much"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(engine.get_account(id).unwrap().balance.value(), dec!(100));
        assert_eq!(engine.get_ledger_entries_for(id).len(), 1);
    }

    #[test]
    fn overflowing_deposit_is_rejected() {
        let engine = engine();
        let id = engine.create_account("u1", "", "pw", false).id;
        engine.deposit(id, Money::new(dec!(10000)), PostingInfo::new("wire")).unwrap();

        let err = engine
            .deposit(id, Money::new(Decimal::MAX), PostingInfo::new("too big"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Ledger(LedgerError::Overflow { .. })));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(engine.get_balance(id).value(), dec!(10000));
        assert_eq!(engine.get_ledger_entries_for(id).len(), 1);

        // the lock was released cleanly
        engine.deposit(id, Money::new(dec!(1)), PostingInfo::new("after")).unwrap();
    }

    #[test]
    fn funds_for_unknown_account() {
        let engine = engine();
        let err = engine
            .deposit(AccountId(9), Money::new(dec!(1)), PostingInfo::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::AccountNotFound(AccountId(9))));
        assert!(engine.get_all_ledger_entries(0).is_empty());
    }

    #[test]
    fn password_and_account_updates() {
        let engine = engine();
        let id = engine.create_account("u1", "", "pw", false).id;
        assert!(matches!(engine.update_password(id, ""), Err(EngineError::EmptyPassword)));
        engine.update_password(id, "new").unwrap();
        assert_eq!(engine.get_account(id).unwrap().password, "new");

        let err = engine.update_account(id, Some(dec!(0)), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let updated = engine
            .update_account(id, Some(dec!(500)), Some(MarginMode::Netting))
            .unwrap();
        assert_eq!(updated.leverage.value(), dec!(500));
        assert_eq!(updated.margin_mode, MarginMode::Netting);

        let untouched = engine.update_account(id, None, None).unwrap();
        assert_eq!(untouched.leverage.value(), dec!(500));
    }

    #[test]
    fn disable_and_enable() {
        let engine = engine();
        let id = engine.create_account("u1", "", "pw", false).id;
        assert!(matches!(engine.enable_account(id), Err(EngineError::AccountAlreadyActive(_))));
        engine.disable_account(id).unwrap();
        assert!(!engine.get_account(id).unwrap().is_active());
        assert!(matches!(engine.disable_account(id), Err(EngineError::AccountAlreadyDisabled(_))));
        engine.enable_account(id).unwrap();
        assert!(engine.get_account(id).unwrap().is_active());
    }

    #[test]
    fn symbol_administration() {
        let engine = engine();
        let spec = engine.register_symbol("nzdchf");
        assert_eq!(spec.symbol, "NZDCHF");
        assert!(spec.provisional);
        assert_eq!(engine.discover_symbol("NZDCHF"), spec);

        let confirmed = engine.confirm_symbol("NZDCHF").unwrap();
        assert!(!confirmed.provisional);

        let disabled = engine.set_symbol_enabled("NZDCHF", false).unwrap();
        assert!(!disabled.enabled);
        assert!(matches!(
            engine.set_symbol_enabled("NOPE", true),
            Err(EngineError::SymbolNotFound(_))
        ));

        let mut custom = SymbolSpec::synthesize("EURUSD");
        custom.commission_per_lot = dec!(7);
        let stored = engine.update_symbol(custom.clone()).unwrap();
        assert_eq!(stored.commission_per_lot, dec!(7));
        assert!(!stored.provisional);

        custom.volume_step = Decimal::ZERO;
        assert_eq!(engine.update_symbol(custom).unwrap_err().kind(), ErrorKind::Validation);

        let codes: Vec<String> = engine.get_symbols().into_iter().map(|s| s.symbol).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn symbol_catalog_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbols.json");
        let engine = engine();
        let mut spec = SymbolSpec::synthesize("XAUUSD");
        spec.commission_per_lot = dec!(3.5);
        engine.update_symbol(spec).unwrap();
        engine.save_symbols_to_json(&path).unwrap();

        let other = Engine::new(EngineConfig {
            symbol_data_dir: None,
            essential_symbols: Vec::new(),
            ..EngineConfig::default()
        });
        assert!(other.get_symbol("XAUUSD").is_none());
        let loaded = other.load_symbols_from_json(&path).unwrap();
        assert_eq!(loaded, engine.get_symbols().len());
        assert_eq!(other.get_symbol("xauusd").unwrap().commission_per_lot, dec!(3.5));
    }

    #[test]
    fn zero_step_catalog_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbols.json");
        std::fs::write(
            &path,
            r#"{"symbols":[{"symbol":"EURUSD","contractSize":"100000","pipSize":"0.0001",
                "pipValue":"10","minVolume":"0.01","maxVolume":"100","volumeStep":"0",
                "marginPercent":"1"}]}"#,
        )
        .unwrap();

        let engine = engine();
        let err = engine.load_symbols_from_json(&path).unwrap_err();
        assert!(matches!(err, EngineError::Registry(RegistryError::InvalidSpec(_))));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(engine.get_symbol("EURUSD").unwrap().volume_step, dec!(0.01));
    }
}
