// 8.0: dealer execution engine. one RwLock guards accounts, positions, orders,
// trades, the instrument registry and the ledger. mutations hold the write side
// for their entire duration, including oracle calls made inside them.

mod config;
mod core;
mod orders;
mod positions;
mod pricing;
mod results;
mod ticker;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{CloseOutcome, EngineError, ErrorKind, OrderResult};
pub use ticker::MarkToMarketTicker;
