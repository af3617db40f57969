//! Instrument catalog: contract parameters per tradable symbol.
//!
//! Unknown symbols are never an error here. A symbol seen for the first time is
//! classified from its name and gets a synthesized spec, which stays
//! provisional until an admin confirms or overwrites it.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Asset class derived from the symbol code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolCategory {
    ForexMajor,
    ForexMinor,
    ForexExotic,
    Crypto,
    Metals,
    Commodities,
    Indices,
    Bonds,
    Unknown,
}

const METAL_PREFIXES: &[&str] = &["XAU", "XAG", "XPT", "XPD", "XCU"];
const CRYPTO_CODES: &[&str] = &["BTC", "ETH", "BNB", "SOL", "XRP", "LTC", "DOGE", "ADA", "DOT", "AVAX"];
const INDEX_CODES: &[&str] = &[
    "US30", "US2000", "NAS100", "SPX500", "JP225", "DE30", "UK100", "FR40", "EU50", "AU200",
    "CN50", "HK33", "SG30", "NL25", "CH20", "ESPIX", "CHINAH",
];
const BOND_CODES: &[&str] = &["USB", "YB"];
const COMMODITY_CODES: &[&str] = &["BCO", "WTICO", "NATGAS", "CORN", "WHEAT", "SUGAR", "SOYBN"];
const CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "AUD", "NZD", "CAD", "CHF", "HKD", "SGD", "NOK", "SEK", "DKK",
    "PLN", "CZK", "HUF", "TRY", "ZAR", "MXN", "THB", "CNH",
];
const MAJOR_PAIRS: &[&str] = &["EURUSD", "GBPUSD", "USDJPY", "USDCHF", "AUDUSD", "NZDUSD", "USDCAD"];
const EXOTIC_CURRENCIES: &[&str] = &[
    "TRY", "ZAR", "MXN", "THB", "CNH", "PLN", "CZK", "HUF", "NOK", "SEK", "DKK", "HKD", "SGD",
];

/// Fallback catalog used when no bootstrap directory can be read.
pub const ESSENTIAL_SYMBOLS: &[&str] = &[
    "EURUSD", "GBPUSD", "USDJPY", "USDCHF", "AUDUSD", "NZDUSD", "USDCAD", "EURGBP", "EURJPY",
    "GBPJPY", "AUDJPY", "BTCUSD", "ETHUSD", "XAUUSD",
];

fn contains_any(symbol: &str, codes: &[&str]) -> bool {
    codes.iter().any(|code| symbol.contains(code))
}

fn classify_metal(symbol: &str) -> Option<SymbolCategory> {
    METAL_PREFIXES
        .iter()
        .any(|p| symbol.starts_with(p))
        .then_some(SymbolCategory::Metals)
}

fn classify_crypto(symbol: &str) -> Option<SymbolCategory> {
    contains_any(symbol, CRYPTO_CODES).then_some(SymbolCategory::Crypto)
}

fn classify_index(symbol: &str) -> Option<SymbolCategory> {
    contains_any(symbol, INDEX_CODES).then_some(SymbolCategory::Indices)
}

fn classify_bond(symbol: &str) -> Option<SymbolCategory> {
    contains_any(symbol, BOND_CODES).then_some(SymbolCategory::Bonds)
}

fn classify_commodity(symbol: &str) -> Option<SymbolCategory> {
    contains_any(symbol, COMMODITY_CODES).then_some(SymbolCategory::Commodities)
}

fn classify_forex(symbol: &str) -> Option<SymbolCategory> {
    let currency_count = CURRENCIES.iter().filter(|c| symbol.contains(*c)).count();
    if currency_count < 2 || !(6..=7).contains(&symbol.len()) {
        return None;
    }
    if MAJOR_PAIRS.contains(&symbol) {
        Some(SymbolCategory::ForexMajor)
    } else if contains_any(symbol, EXOTIC_CURRENCIES) {
        Some(SymbolCategory::ForexExotic)
    } else {
        Some(SymbolCategory::ForexMinor)
    }
}

type Classifier = fn(&str) -> Option<SymbolCategory>;

/// Evaluated top to bottom, first match wins. Order matters: "XAUUSD" holds two
/// currency codes and would otherwise pass as forex.
pub const CATEGORY_RULES: &[(&str, Classifier)] = &[
    ("metals", classify_metal),
    ("crypto", classify_crypto),
    ("indices", classify_index),
    ("bonds", classify_bond),
    ("commodities", classify_commodity),
    ("forex", classify_forex),
];

pub fn detect_category(symbol: &str) -> SymbolCategory {
    let symbol = symbol.to_ascii_uppercase();
    CATEGORY_RULES
        .iter()
        .find_map(|(_, rule)| rule(&symbol))
        .unwrap_or(SymbolCategory::Unknown)
}

/// Contract parameters for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SymbolSpecRecord", into = "SymbolSpecRecord")]
pub struct SymbolSpec {
    pub symbol: String,
    pub contract_size: Decimal,
    pub pip_size: Decimal,
    pub pip_value: Decimal,
    pub min_volume: Decimal,
    pub max_volume: Decimal,
    pub volume_step: Decimal,
    pub margin_percent: Decimal,
    pub commission_per_lot: Decimal,
    pub enabled: bool,
    /// Synthesized from the name and not yet reviewed by an admin.
    pub provisional: bool,
}

// Catalog wire format: camelCase keys and a `disabled` flag, as the dealer
// backend writes them. snake_case keys and `enabled` are still accepted.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolSpecRecord {
    symbol: String,
    #[serde(alias = "contract_size")]
    contract_size: Decimal,
    #[serde(alias = "pip_size")]
    pip_size: Decimal,
    #[serde(alias = "pip_value")]
    pip_value: Decimal,
    #[serde(alias = "min_volume")]
    min_volume: Decimal,
    #[serde(alias = "max_volume")]
    max_volume: Decimal,
    #[serde(alias = "volume_step")]
    volume_step: Decimal,
    #[serde(alias = "margin_percent")]
    margin_percent: Decimal,
    #[serde(default, alias = "commission_per_lot")]
    commission_per_lot: Decimal,
    #[serde(default)]
    disabled: bool,
    #[serde(default, skip_serializing)]
    enabled: Option<bool>,
    #[serde(default)]
    provisional: bool,
}

impl From<SymbolSpecRecord> for SymbolSpec {
    fn from(record: SymbolSpecRecord) -> Self {
        Self {
            symbol: record.symbol,
            contract_size: record.contract_size,
            pip_size: record.pip_size,
            pip_value: record.pip_value,
            min_volume: record.min_volume,
            max_volume: record.max_volume,
            volume_step: record.volume_step,
            margin_percent: record.margin_percent,
            commission_per_lot: record.commission_per_lot,
            enabled: record.enabled.unwrap_or(!record.disabled),
            provisional: record.provisional,
        }
    }
}

impl From<SymbolSpec> for SymbolSpecRecord {
    fn from(spec: SymbolSpec) -> Self {
        Self {
            symbol: spec.symbol,
            contract_size: spec.contract_size,
            pip_size: spec.pip_size,
            pip_value: spec.pip_value,
            min_volume: spec.min_volume,
            max_volume: spec.max_volume,
            volume_step: spec.volume_step,
            margin_percent: spec.margin_percent,
            commission_per_lot: spec.commission_per_lot,
            disabled: !spec.enabled,
            enabled: None,
            provisional: spec.provisional,
        }
    }
}

impl SymbolSpec {
    /// Synthesize a spec from naming heuristics. Never fails.
    pub fn synthesize(symbol: &str) -> Self {
        let symbol = symbol.to_ascii_uppercase();
        let category = detect_category(&symbol);

        let mut spec = SymbolSpec {
            symbol: symbol.clone(),
            contract_size: dec!(100000),
            pip_size: dec!(0.0001),
            pip_value: dec!(10),
            min_volume: dec!(0.01),
            max_volume: dec!(100),
            volume_step: dec!(0.01),
            margin_percent: dec!(5),
            commission_per_lot: Decimal::ZERO,
            enabled: true,
            provisional: true,
        };

        let is_jpy = symbol.contains("JPY");

        match category {
            SymbolCategory::ForexMajor | SymbolCategory::ForexMinor => {
                spec.margin_percent = dec!(1);
                if is_jpy {
                    spec.pip_size = dec!(0.01);
                    spec.pip_value = dec!(9.09);
                } else if symbol.contains("HKD") {
                    spec.pip_value = dec!(1.28);
                }
            }
            SymbolCategory::ForexExotic => {
                spec.margin_percent = dec!(3);
                if is_jpy {
                    spec.pip_size = dec!(0.01);
                    spec.pip_value = dec!(9.09);
                } else if contains_any(&symbol, &["ZAR", "TRY", "MXN"]) {
                    spec.pip_value = dec!(5);
                }
            }
            SymbolCategory::Crypto => {
                spec.contract_size = dec!(1);
                spec.margin_percent = dec!(10);
                if symbol.contains("BTC") {
                    spec.pip_size = dec!(1);
                    spec.pip_value = dec!(1);
                    spec.max_volume = dec!(10);
                } else if symbol.contains("ETH") {
                    spec.pip_size = dec!(0.1);
                    spec.pip_value = dec!(0.1);
                    spec.max_volume = dec!(50);
                } else {
                    spec.pip_size = dec!(0.01);
                    spec.pip_value = dec!(0.01);
                }
            }
            SymbolCategory::Metals => {
                spec.margin_percent = dec!(2);
                if symbol.starts_with("XAG") {
                    spec.contract_size = dec!(5000);
                    spec.pip_size = dec!(0.001);
                    spec.pip_value = dec!(5);
                } else if symbol.starts_with("XCU") {
                    spec.contract_size = dec!(25000);
                    spec.pip_size = dec!(0.0001);
                    spec.pip_value = dec!(2.5);
                } else {
                    // gold, platinum, palladium
                    spec.contract_size = dec!(100);
                    spec.pip_size = dec!(0.01);
                    spec.pip_value = dec!(1);
                }
            }
            SymbolCategory::Commodities => {
                spec.contract_size = dec!(1000);
                spec.margin_percent = dec!(5);
                spec.pip_size = dec!(0.01);
                spec.pip_value = dec!(10);
            }
            SymbolCategory::Indices => {
                spec.contract_size = dec!(1);
                spec.margin_percent = dec!(5);
                spec.pip_size = dec!(0.1);
                spec.pip_value = dec!(0.1);
                spec.max_volume = dec!(500);
            }
            SymbolCategory::Bonds => {
                spec.contract_size = dec!(1000);
                spec.margin_percent = dec!(2);
                spec.pip_size = dec!(0.01);
                spec.pip_value = dec!(10);
            }
            // conservative forex-like defaults
            SymbolCategory::Unknown => {}
        }

        spec
    }

    pub fn category(&self) -> SymbolCategory {
        detect_category(&self.symbol)
    }

    /// Check an order volume against bounds and step.
    pub fn validate_volume(&self, volume: Decimal) -> Result<(), SymbolError> {
        if volume < self.min_volume || volume > self.max_volume {
            return Err(SymbolError::VolumeOutOfRange {
                volume,
                min: self.min_volume,
                max: self.max_volume,
            });
        }
        // a zero step has no multiples; treat it like any other misfit
        let on_step = volume
            .checked_rem(self.volume_step)
            .is_some_and(|remainder| remainder.is_zero());
        if !on_step {
            return Err(SymbolError::InvalidVolumeStep {
                volume,
                step: self.volume_step,
            });
        }
        Ok(())
    }

    /// Structural checks for admin-supplied specs.
    pub fn validate(&self) -> Result<(), SymbolError> {
        if self.symbol.trim().is_empty() {
            return Err(SymbolError::InvalidSpec("symbol code is empty".into()));
        }
        if self.volume_step <= Decimal::ZERO {
            return Err(SymbolError::InvalidSpec("volume step must be positive".into()));
        }
        if self.min_volume > self.max_volume {
            return Err(SymbolError::InvalidSpec(format!(
                "min volume {} exceeds max volume {}",
                self.min_volume, self.max_volume
            )));
        }
        if self.contract_size <= Decimal::ZERO || self.pip_size <= Decimal::ZERO {
            return Err(SymbolError::InvalidSpec(
                "contract size and pip size must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SymbolError {
    #[error("volume {volume} outside [{min}, {max}]")]
    VolumeOutOfRange {
        volume: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("volume {volume} is not a multiple of step {step}")]
    InvalidVolumeStep { volume: Decimal, step: Decimal },

    #[error("invalid symbol spec: {0}")]
    InvalidSpec(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("symbol catalog I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("symbol catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("symbol catalog rejected: {0}")]
    InvalidSpec(#[from] SymbolError),
}

/// On-disk shape of a symbol catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolCatalog {
    pub symbols: Vec<SymbolSpec>,
}

/// Code → spec map. Owned by the engine state, so it relies on the engine lock.
#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    specs: HashMap<String, SymbolSpec>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded from a bootstrap directory, or the essentials if it can't be read.
    pub fn bootstrap(dir: Option<&Path>, essentials: &[String]) -> Self {
        let mut registry = Self::new();
        let loaded = match dir {
            Some(dir) => match registry.load_from_directory(dir) {
                Ok(count) => Some(count),
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), error = %err, "symbol bootstrap failed, using essentials");
                    None
                }
            },
            None => None,
        };
        if loaded.is_none() {
            registry.register_all(essentials.iter().map(String::as_str));
        }
        registry
    }

    /// Idempotent: returns the existing spec or synthesizes a provisional one.
    pub fn register(&mut self, symbol: &str) -> &SymbolSpec {
        let code = symbol.trim().to_ascii_uppercase();
        self.specs.entry(code).or_insert_with_key(|code| {
            let spec = SymbolSpec::synthesize(code);
            tracing::info!(symbol = %code, category = ?spec.category(), "auto-registered symbol");
            spec
        })
    }

    pub fn register_all<'a>(&mut self, symbols: impl IntoIterator<Item = &'a str>) -> usize {
        let mut count = 0;
        for symbol in symbols {
            self.register(symbol);
            count += 1;
        }
        tracing::info!(count, "registered symbols");
        count
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolSpec> {
        self.specs.get(&symbol.trim().to_ascii_uppercase())
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut SymbolSpec> {
        self.specs.get_mut(&symbol.trim().to_ascii_uppercase())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    /// Insert or overwrite. The code is normalized to uppercase.
    pub fn upsert(&mut self, mut spec: SymbolSpec) {
        spec.symbol = spec.symbol.trim().to_ascii_uppercase();
        self.specs.insert(spec.symbol.clone(), spec);
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// All specs sorted by code.
    pub fn all(&self) -> Vec<SymbolSpec> {
        let mut specs: Vec<SymbolSpec> = self.specs.values().cloned().collect();
        specs.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        specs
    }

    /// One spec per sub-directory name. Plain files are ignored.
    pub fn load_from_directory(&mut self, dir: &Path) -> Result<usize, RegistryError> {
        let mut count = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let symbol = name.to_string_lossy().to_ascii_uppercase();
            self.specs
                .entry(symbol.clone())
                .or_insert_with(|| SymbolSpec::synthesize(&symbol));
            count += 1;
        }
        tracing::info!(dir = %dir.display(), count, "loaded symbols from data directory");
        Ok(count)
    }

    /// Admin-curated catalog; its entries overwrite synthesized ones.
    /// One invalid entry rejects the whole catalog and nothing is stored.
    pub fn load_json(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let data = fs::read_to_string(path)?;
        let catalog: SymbolCatalog = serde_json::from_str(&data)?;
        for spec in &catalog.symbols {
            spec.validate()?;
        }
        let count = catalog.symbols.len();
        for spec in catalog.symbols {
            self.upsert(spec);
        }
        tracing::info!(path = %path.display(), count, "loaded symbols from JSON catalog");
        Ok(count)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), RegistryError> {
        let catalog = SymbolCatalog { symbols: self.all() };
        let data = serde_json::to_string_pretty(&catalog)?;
        fs::write(path, data)?;
        Ok(())
    }
}
