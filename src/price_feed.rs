// Price Oracle
//
// The engine never fetches prices on its own. An integrator supplies one
// oracle at construction and the engine calls it synchronously, under its
// write lock, whenever it needs a quote. A slow oracle stalls every engine
// operation for its duration, so implementations must answer from memory.

use crate::types::{Price, Tick};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Source of live bid/ask quotes. `None` means no quote right now, which
/// fails the calling operation without retry.
pub trait PriceOracle: Send + Sync {
    fn quote(&self, symbol: &str) -> Option<Tick>;
}

impl<F> PriceOracle for F
where
    F: Fn(&str) -> Option<Tick> + Send + Sync,
{
    fn quote(&self, symbol: &str) -> Option<Tick> {
        self(symbol)
    }
}

/// In-memory oracle for tests and the simulator. Quotes are set explicitly.
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    ticks: RwLock<HashMap<String, Tick>>,
    halted: RwLock<bool>,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets bid/ask for `symbol`. Ignored unless both are positive and bid <= ask.
    pub fn set_quote(&self, symbol: &str, bid: Decimal, ask: Decimal) -> bool {
        let (Some(bid), Some(ask)) = (Price::new(bid), Price::new(ask)) else {
            return false;
        };
        if bid > ask {
            return false;
        }
        self.ticks
            .write()
            .insert(symbol.to_ascii_uppercase(), Tick::new(bid, ask));
        true
    }

    pub fn remove_quote(&self, symbol: &str) {
        self.ticks.write().remove(&symbol.to_ascii_uppercase());
    }

    /// A halted oracle answers `None` for every symbol.
    pub fn set_halted(&self, halted: bool) {
        *self.halted.write() = halted;
    }
}

impl PriceOracle for StaticPriceOracle {
    fn quote(&self, symbol: &str) -> Option<Tick> {
        if *self.halted.read() {
            return None;
        }
        self.ticks.read().get(&symbol.to_ascii_uppercase()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[test]
    fn static_oracle_quotes() {
        let oracle = StaticPriceOracle::new();
        assert!(oracle.set_quote("eurusd", dec!(1.1000), dec!(1.1002)));
        let tick = oracle.quote("EURUSD").unwrap();
        assert_eq!(tick.bid.value(), dec!(1.1000));
        assert_eq!(tick.ask.value(), dec!(1.1002));
        assert!(oracle.quote("GBPUSD").is_none());
    }

    #[test]
    fn rejects_crossed_or_non_positive_quotes() {
        let oracle = StaticPriceOracle::new();
        assert!(!oracle.set_quote("EURUSD", dec!(1.2), dec!(1.1)));
        assert!(!oracle.set_quote("EURUSD", dec!(0), dec!(1.1)));
        assert!(oracle.quote("EURUSD").is_none());
    }

    #[test]
    fn halt_and_remove() {
        let oracle = StaticPriceOracle::new();
        oracle.set_quote("XAUUSD", dec!(2000), dec!(2000.5));
        oracle.set_halted(true);
        assert!(oracle.quote("XAUUSD").is_none());
        oracle.set_halted(false);
        assert!(oracle.quote("XAUUSD").is_some());
        oracle.remove_quote("xauusd");
        assert!(oracle.quote("XAUUSD").is_none());
    }

    #[test]
    fn closures_are_oracles() {
        let fixed = Tick::new(Price::new_unchecked(dec!(1)), Price::new_unchecked(dec!(1.01)));
        let oracle: Arc<dyn PriceOracle> = Arc::new(move |symbol: &str| {
            (symbol == "USDJPY").then_some(fixed)
        });
        assert_eq!(oracle.quote("USDJPY"), Some(fixed));
        assert_eq!(oracle.quote("EURUSD"), None);
    }
}
