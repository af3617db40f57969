//! Ledger invariant tests.
//!
//! An account's balance must always equal the sum of its ledger entries, and
//! each entry must chain onto the previous one, whatever sequence of funding
//! and trading produced them.

use bbook_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Deposit(i64),
    Withdraw(i64),
    Bonus(i64),
    Adjust(i64),
    Open(bool, i64),
    Close(usize, i64),
    Move(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-100i64..50_000).prop_map(Op::Deposit),
        (-100i64..50_000).prop_map(Op::Withdraw),
        (0i64..1_000).prop_map(Op::Bonus),
        (-20_000i64..20_000).prop_map(Op::Adjust),
        (any::<bool>(), 1i64..300).prop_map(|(buy, lots)| Op::Open(buy, lots)),
        (0usize..8, -50i64..150).prop_map(|(idx, lots)| Op::Close(idx, lots)),
        (-200i64..200).prop_map(Op::Move),
    ]
}

fn assert_reconciled(engine: &Engine, id: AccountId) {
    let account = engine.get_account(id).unwrap();
    let entries = engine.get_ledger_entries_for(id);
    let sum: Money = entries.iter().map(|e| e.amount).sum();
    assert_eq!(account.balance, sum);
    assert_eq!(account.balance, engine.get_balance(id));
    for entry in &entries {
        assert_eq!(entry.balance_after, entry.balance_before.add(entry.amount));
    }
    for pair in entries.windows(2) {
        assert_eq!(pair[1].balance_before, pair[0].balance_after);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Balance equals the ledger sum after every operation, including failed ones.
    #[test]
    fn balance_always_equals_ledger_sum(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let oracle = Arc::new(StaticPriceOracle::new());
        let mut bid = dec!(1.1000);
        oracle.set_quote("EURUSD", bid, bid + dec!(0.0002));
        let engine = Engine::with_oracle(EngineConfig::in_memory(), oracle.clone());
        let id = engine.create_account("prop", "", "pw", false).id;

        for op in ops {
            match op {
                Op::Deposit(cents) => {
                    let _ = engine.deposit(id, Money::new(Decimal::new(cents, 2)), PostingInfo::new("dep"));
                }
                Op::Withdraw(cents) => {
                    let _ = engine.withdraw(id, Money::new(Decimal::new(cents, 2)), PostingInfo::new("wd"));
                }
                Op::Bonus(cents) => {
                    let _ = engine.add_bonus(id, Money::new(Decimal::new(cents, 2)), PostingInfo::new("bonus"));
                }
                Op::Adjust(cents) => {
                    let _ = engine.adjust(id, Money::new(Decimal::new(cents, 2)), PostingInfo::new("adj"));
                }
                Op::Open(buy, lots) => {
                    let side = if buy { Side::Buy } else { Side::Sell };
                    let _ = engine.execute_market_order(id, "EURUSD", side, Decimal::new(lots, 2), None, None);
                }
                Op::Close(idx, lots) => {
                    let open = engine.get_positions(id);
                    if let Some(position) = open.get(idx % open.len().max(1)) {
                        let _ = engine.close_position(position.id, Decimal::new(lots, 2));
                    }
                }
                Op::Move(ticks) => {
                    let next = bid + Decimal::new(ticks, 4);
                    if next > Decimal::ZERO {
                        bid = next;
                        oracle.set_quote("EURUSD", bid, bid + dec!(0.0002));
                        engine.update_position_prices();
                    }
                }
            }
            assert_reconciled(&engine, id);
            for position in engine.get_positions(id) {
                prop_assert!(position.volume > Decimal::ZERO);
            }
        }
    }

    /// Closing never changes anything but the realized amount posted.
    #[test]
    fn close_moves_balance_by_realized_pnl(lots in 1i64..100, ticks in -300i64..300) {
        let oracle = Arc::new(StaticPriceOracle::new());
        oracle.set_quote("EURUSD", dec!(1.1000), dec!(1.1000));
        let engine = Engine::with_oracle(EngineConfig::in_memory(), oracle.clone());
        let id = engine.create_account("prop", "", "pw", false).id;
        engine.deposit(id, Money::new(dec!(100000)), PostingInfo::new("seed")).unwrap();
        let position = engine
            .execute_market_order(id, "EURUSD", Side::Buy, Decimal::new(lots, 2), None, None)
            .unwrap()
            .position;

        let price = dec!(1.1000) + Decimal::new(ticks, 4);
        oracle.set_quote("EURUSD", price, price);
        let before = engine.get_balance(id);
        let trade = engine.close_position(position.id, Decimal::ZERO).unwrap();
        prop_assert_eq!(engine.get_balance(id), before.add(trade.realized_pnl));
        assert_reconciled(&engine, id);
    }
}

mod deterministic {
    use super::*;

    #[test]
    fn failed_withdrawal_changes_nothing() {
        let engine = Engine::new(EngineConfig::in_memory());
        let id = engine.create_account("u1", "", "pw", false).id;
        engine
            .deposit(id, Money::new(dec!(500)), PostingInfo::new("seed"))
            .unwrap();
        let before = engine.get_ledger_entries_for(id);

        let err = engine
            .withdraw(id, Money::new(dec!(500.01)), PostingInfo::new("overdraw"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        assert_eq!(engine.get_ledger_entries_for(id), before);
        assert_eq!(engine.get_account(id).unwrap().balance.value(), dec!(500));
    }

    #[test]
    fn trading_entries_reference_trades() {
        let oracle = Arc::new(StaticPriceOracle::new());
        oracle.set_quote("EURUSD", dec!(1.1000), dec!(1.1000));
        let engine = Engine::with_oracle(EngineConfig::in_memory(), oracle);
        let mut spec = SymbolSpec::synthesize("EURUSD");
        spec.commission_per_lot = dec!(5);
        engine.update_symbol(spec).unwrap();

        let id = engine.create_account("u1", "", "pw", false).id;
        engine
            .deposit(id, Money::new(dec!(1000)), PostingInfo::new("seed"))
            .unwrap();
        let opened = engine
            .execute_market_order(id, "EURUSD", Side::Buy, dec!(0.2), None, None)
            .unwrap();
        let closed = engine.close_position(opened.position.id, Decimal::ZERO).unwrap();

        let history = engine.get_ledger_history(id, 0);
        assert_eq!(history[0].entry_type, LedgerEntryType::RealizedPnl);
        assert_eq!(history[0].reference, EntryReference::Trade(closed.id));
        assert_eq!(history[1].entry_type, LedgerEntryType::Commission);
        assert_eq!(history[1].reference, EntryReference::Trade(opened.trade.id));
        assert_eq!(history[1].amount.value(), dec!(-1));
        assert_eq!(history[2].reference, EntryReference::Admin);
        assert_reconciled(&engine, id);
    }
}
