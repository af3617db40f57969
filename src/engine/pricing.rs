//! Quote resolution.

use super::core::Engine;
use super::results::EngineError;
use crate::types::Tick;

impl Engine {
    /// Current bid/ask from the oracle. Missing oracle and missing quote are
    /// both hard failures; nothing here retries.
    pub fn quote(&self, symbol: &str) -> Result<Tick, EngineError> {
        let oracle = self.oracle.as_ref().ok_or(EngineError::NoPriceFeed)?;
        oracle
            .quote(symbol)
            .ok_or_else(|| EngineError::NoQuote(symbol.to_string()))
    }

    pub fn has_price_feed(&self) -> bool {
        self.oracle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{Engine, EngineConfig, EngineError};
    use crate::price_feed::StaticPriceOracle;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[test]
    fn quote_without_oracle() {
        let engine = Engine::new(EngineConfig::in_memory());
        assert!(!engine.has_price_feed());
        assert!(matches!(engine.quote("EURUSD"), Err(EngineError::NoPriceFeed)));
    }

    #[test]
    fn quote_passthrough() {
        let oracle = Arc::new(StaticPriceOracle::new());
        oracle.set_quote("EURUSD", dec!(1.1000), dec!(1.1002));
        let engine = Engine::with_oracle(EngineConfig::in_memory(), oracle);
        assert_eq!(engine.quote("EURUSD").unwrap().ask.value(), dec!(1.1002));
        assert!(matches!(engine.quote("GBPUSD"), Err(EngineError::NoQuote(s)) if s == "GBPUSD"));
    }
}
