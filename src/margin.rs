//! Margin and P&L calculation.
//!
//! Required margin is the notional of the trade divided by account leverage:
//! `volume * contract_size * price / leverage`. P&L is expressed in pips so the
//! symbol's pip value converts a price move into account currency.
//!
//! Everything here is pure. The engine passes in whatever spec it holds.

use crate::instrument::SymbolSpec;
use crate::types::{Leverage, Money, Price, Side};
use rust_decimal::Decimal;

/// Contract notional of `volume` lots at `price`.
pub fn notional_value(spec: &SymbolSpec, volume: Decimal, price: Price) -> Money {
    Money::new(volume * spec.contract_size * price.value())
}

/// Margin needed to open `volume` lots at `price`.
///
/// With no spec on hand the registry's UNKNOWN defaults are used, so a symbol
/// prices the same before and after its first registration.
pub fn required_margin(
    spec: Option<&SymbolSpec>,
    symbol: &str,
    volume: Decimal,
    price: Price,
    leverage: Leverage,
) -> Money {
    let notional = match spec {
        Some(spec) => notional_value(spec, volume, price),
        None => notional_value(&SymbolSpec::synthesize(symbol), volume, price),
    };
    Money::new(notional.value() / leverage.value())
}

/// P&L of `volume` lots opened at `open_price` and valued at `current_price`.
/// Returns zero when no symbol spec is available.
pub fn calculate_pnl(
    side: Side,
    open_price: Price,
    current_price: Price,
    volume: Decimal,
    spec: Option<&SymbolSpec>,
) -> Money {
    let Some(spec) = spec else {
        return Money::zero();
    };
    if spec.pip_size.is_zero() {
        return Money::zero();
    }
    let price_diff = side.sign() * (current_price.value() - open_price.value());
    let pips = price_diff / spec.pip_size;
    Money::new(pips * spec.pip_value * volume)
}

/// Equity as a percentage of used margin. `None` when nothing is margined.
pub fn margin_level(equity: Money, used_margin: Money) -> Option<Decimal> {
    if used_margin.value() <= Decimal::ZERO {
        return None;
    }
    Some(equity.value() / used_margin.value() * Decimal::ONE_HUNDRED)
}

/// Equity available for new positions.
pub fn free_margin(equity: Money, used_margin: Money) -> Money {
    equity.sub(used_margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eurusd() -> SymbolSpec {
        SymbolSpec::synthesize("EURUSD")
    }

    #[test]
    fn margin_for_tenth_lot_eurusd() {
        let spec = eurusd();
        let margin = required_margin(
            Some(&spec),
            "EURUSD",
            dec!(0.1),
            Price::new_unchecked(dec!(1.1002)),
            Leverage::new(dec!(100)).unwrap(),
        );
        assert_eq!(margin.value(), dec!(110.02));
    }

    #[test]
    fn margin_scales_with_leverage() {
        let spec = eurusd();
        let price = Price::new_unchecked(dec!(1.1000));
        let at_100 = required_margin(Some(&spec), "EURUSD", dec!(1), price, Leverage::new(dec!(100)).unwrap());
        let at_500 = required_margin(Some(&spec), "EURUSD", dec!(1), price, Leverage::new(dec!(500)).unwrap());
        assert_eq!(at_100.value(), dec!(1100));
        assert_eq!(at_500.value(), dec!(220));
    }

    #[test]
    fn crypto_margin() {
        let spec = SymbolSpec::synthesize("ETHUSD");
        let margin = required_margin(
            Some(&spec),
            "ETHUSD",
            dec!(1),
            Price::new_unchecked(dec!(2000)),
            Leverage::new(dec!(100)).unwrap(),
        );
        assert_eq!(margin.value(), dec!(20));
    }

    #[test]
    fn unregistered_symbol_uses_unknown_defaults() {
        let price = Price::new_unchecked(dec!(2));
        let leverage = Leverage::new(dec!(100)).unwrap();
        let margin = required_margin(None, "FOOBAR", dec!(1), price, leverage);
        let registered = SymbolSpec::synthesize("FOOBAR");
        assert_eq!(
            margin,
            required_margin(Some(&registered), "FOOBAR", dec!(1), price, leverage)
        );
        assert_eq!(margin.value(), dec!(2000));
    }

    #[test]
    fn buy_pnl_in_pips() {
        let spec = eurusd();
        let pnl = calculate_pnl(
            Side::Buy,
            Price::new_unchecked(dec!(1.1000)),
            Price::new_unchecked(dec!(1.1050)),
            dec!(1.0),
            Some(&spec),
        );
        assert_eq!(pnl.value(), dec!(500));
    }

    #[test]
    fn sell_pnl_is_mirrored() {
        let spec = eurusd();
        let open = Price::new_unchecked(dec!(1.1000));
        let up = Price::new_unchecked(dec!(1.1050));
        let sell = calculate_pnl(Side::Sell, open, up, dec!(1.0), Some(&spec));
        let buy = calculate_pnl(Side::Buy, open, up, dec!(1.0), Some(&spec));
        assert_eq!(sell, buy.negate());
    }

    #[test]
    fn pnl_without_spec_is_zero() {
        let pnl = calculate_pnl(
            Side::Buy,
            Price::new_unchecked(dec!(1)),
            Price::new_unchecked(dec!(2)),
            dec!(1),
            None,
        );
        assert_eq!(pnl, Money::zero());
    }

    #[test]
    fn margin_level_calculation() {
        let level = margin_level(Money::new(dec!(10000)), Money::new(dec!(500)));
        assert_eq!(level, Some(dec!(2000)));
        assert_eq!(margin_level(Money::new(dec!(10000)), Money::zero()), None);
    }

    #[test]
    fn free_margin_calculation() {
        let free = free_margin(Money::new(dec!(10000)), Money::new(dec!(5000)));
        assert_eq!(free.value(), dec!(5000));
    }
}
