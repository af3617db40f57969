//! B-Book Engine Simulation.
//!
//! Walks the dealer engine through funding, margin-checked execution,
//! mark-to-market, partial and bulk closes, and concurrent order flow.

use bbook_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<(), EngineError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bbook_core=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("B-Book Dealer Engine Simulation");
    println!("Ledger-first, one write lock, hedging positions\n");

    scenario_1_funding()?;
    scenario_2_margin_checked_order()?;
    scenario_3_mark_to_market()?;
    scenario_4_partial_close()?;
    scenario_5_bulk_close()?;
    scenario_6_concurrent_orders()?;
    scenario_7_background_marking()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn setup(balance: Decimal) -> Result<(Arc<Engine>, Arc<StaticPriceOracle>, AccountId), EngineError> {
    let oracle = Arc::new(StaticPriceOracle::new());
    oracle.set_quote("EURUSD", dec!(1.1000), dec!(1.1002));
    oracle.set_quote("XAUUSD", dec!(2000.00), dec!(2000.50));
    let engine = Arc::new(Engine::with_oracle(EngineConfig::in_memory(), oracle.clone()));
    let account = engine.create_account("demo-user", "", "changeme", true);
    engine.deposit(account.id, Money::new(balance), PostingInfo::new("Initial funding").method("BANK"))?;
    Ok((engine, oracle, account.id))
}

/// Deposits, bonus, withdrawal and a rejected overdraw.
fn scenario_1_funding() -> Result<(), EngineError> {
    println!("Scenario 1: Funding and the Ledger\n");

    let (engine, _, id) = setup(dec!(10000))?;
    engine.add_bonus(id, Money::new(dec!(250)), PostingInfo::new("Welcome bonus").admin("ops"))?;
    engine.withdraw(id, Money::new(dec!(1000)), PostingInfo::new("Payout").method("CARD"))?;

    match engine.withdraw(id, Money::new(dec!(1_000_000)), PostingInfo::new("Too much")) {
        Ok(_) => println!("  unexpected: overdraw accepted"),
        Err(err) => println!("  Overdraw rejected ({:?}): {}", err.kind(), err),
    }

    for entry in engine.get_ledger_history(id, 0) {
        println!(
            "  #{} {:<12} {:>10}  {} -> {}",
            entry.id.0, entry.entry_type, entry.amount, entry.balance_before, entry.balance_after
        );
    }
    println!("  Balance: ${}\n", engine.get_balance(id));
    Ok(())
}

/// BUY 0.1 EURUSD at 1:100 needs 110.02 of margin.
fn scenario_2_margin_checked_order() -> Result<(), EngineError> {
    println!("Scenario 2: Margin-Checked Execution\n");

    let (engine, _, id) = setup(dec!(10000))?;
    let result = engine.execute_market_order(id, "EURUSD", Side::Buy, dec!(0.1), None, None)?;
    let summary = engine.get_account_summary(id)?;
    println!("  BUY 0.1 EURUSD filled @ {}", result.position.open_price);
    println!("  Used margin: ${}, free margin: ${}", summary.margin, summary.free_margin);

    match engine.execute_market_order(id, "EURUSD", Side::Buy, dec!(50), None, None) {
        Ok(_) => println!("  unexpected: oversized order filled"),
        Err(err) => println!("  BUY 50 lots rejected: {}", err),
    }
    println!();
    Ok(())
}

/// Price moves 50 pips in favour of a 1-lot long.
fn scenario_3_mark_to_market() -> Result<(), EngineError> {
    println!("Scenario 3: Mark-to-Market\n");

    let (engine, oracle, id) = setup(dec!(10000))?;
    oracle.set_quote("EURUSD", dec!(1.1000), dec!(1.1000));
    let position = engine.execute_market_order(id, "EURUSD", Side::Buy, dec!(1), None, None)?.position;

    oracle.set_quote("EURUSD", dec!(1.1050), dec!(1.1052));
    engine.update_position_prices();
    let marked = engine.get_position(position.id)?;
    let summary = engine.get_account_summary(id)?;
    println!("  Long 1 lot @ {} marked at {}", marked.open_price, marked.current_price);
    println!("  Unrealized P&L: ${}, equity: ${}", marked.unrealized_pnl, summary.equity);
    if let Some(level) = summary.margin_level {
        println!("  Margin level: {}%", level.round_dp(2));
    }
    println!();
    Ok(())
}

/// Close 40% then the rest.
fn scenario_4_partial_close() -> Result<(), EngineError> {
    println!("Scenario 4: Partial and Full Close\n");

    let (engine, oracle, id) = setup(dec!(10000))?;
    let position = engine
        .execute_market_order(id, "XAUUSD", Side::Sell, dec!(1), None, None)?
        .position;
    println!("  SELL 1 XAUUSD @ {}", position.open_price);

    oracle.set_quote("XAUUSD", dec!(1995.00), dec!(1995.50));
    let first = engine.close_position(position.id, dec!(0.4))?;
    let remaining = engine.get_position(position.id)?;
    println!("  Closed {} @ {} for ${}, {} lots left", first.volume, first.price, first.realized_pnl, remaining.volume);

    let second = engine.close_position(position.id, Decimal::ZERO)?;
    println!("  Closed {} @ {} for ${}", second.volume, second.price, second.realized_pnl);
    println!("  Balance: ${}\n", engine.get_account(id).map(|a| a.balance).unwrap_or_default());
    Ok(())
}

/// Close only the losers, then everything else.
fn scenario_5_bulk_close() -> Result<(), EngineError> {
    println!("Scenario 5: Bulk Close\n");

    let (engine, oracle, id) = setup(dec!(50000))?;
    oracle.set_quote("EURUSD", dec!(1.1000), dec!(1.1000));
    engine.execute_market_order(id, "EURUSD", Side::Buy, dec!(0.5), None, None)?;
    engine.execute_market_order(id, "EURUSD", Side::Sell, dec!(0.5), None, None)?;
    engine.execute_market_order(id, "XAUUSD", Side::Buy, dec!(0.1), None, None)?;
    oracle.set_quote("EURUSD", dec!(1.1020), dec!(1.1020));

    for (filter, symbol) in [(CloseFilter::Losers, None), (CloseFilter::All, Some("EURUSD"))] {
        let outcomes = engine.close_positions(id, filter, symbol)?;
        for outcome in outcomes {
            match outcome.result {
                Ok(trade) => println!("  {} {}: {} P&L ${}", filter, outcome.position_id, trade.label(), trade.realized_pnl),
                Err(err) => println!("  {} {}: failed: {}", filter, outcome.position_id, err),
            }
        }
    }
    println!("  Still open: {}\n", engine.get_positions(id).len());
    Ok(())
}

/// Eight threads race for margin that covers seven orders.
fn scenario_6_concurrent_orders() -> Result<(), EngineError> {
    println!("Scenario 6: Concurrent Orders\n");

    // one 1-lot EURUSD order at 1.1002 needs 1100.20
    let (engine, _, id) = setup(dec!(7701.40))?;
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || engine.execute_market_order(id, "EURUSD", Side::Buy, dec!(1), None, None))
        })
        .collect();

    let mut filled = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.join() {
            Ok(Ok(_)) => filled += 1,
            Ok(Err(_)) => rejected += 1,
            Err(_) => println!("  worker panicked"),
        }
    }
    let summary = engine.get_account_summary(id)?;
    println!("  Filled: {filled}, rejected: {rejected}");
    println!("  Free margin left: ${}\n", summary.free_margin);
    Ok(())
}

/// Background ticker publishing snapshots.
fn scenario_7_background_marking() -> Result<(), EngineError> {
    println!("Scenario 7: Background Mark-to-Market\n");

    let (engine, oracle, id) = setup(dec!(10000))?;
    engine.execute_market_order(id, "EURUSD", Side::Buy, dec!(1), None, None)?;

    let (ticker, snapshots) = MarkToMarketTicker::spawn(engine.clone());
    for bid in [dec!(1.1010), dec!(1.1030), dec!(1.0990)] {
        oracle.set_quote("EURUSD", bid, bid + dec!(0.0002));
        thread::sleep(engine.config().mark_to_market_interval() * 2);
        if let Ok(batch) = snapshots.recv_timeout(Duration::from_secs(1)) {
            for snapshot in batch {
                println!(
                    "  bid {} -> account {} equity ${} exposure ${}",
                    bid, snapshot.account_id, snapshot.equity, snapshot.exposure
                );
            }
        }
    }
    ticker.stop();
    Ok(())
}
