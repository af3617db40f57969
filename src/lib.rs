// bbook-core: dealer-model (B-Book) execution engine.
// ledger-first architecture: every balance change is a ledger entry, and margin
// validation plus state mutation happen under one write lock.
// in-memory only; persistence belongs to whoever embeds this.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: ids, Side, Price, Tick, Money, Leverage
//   2.x  account.rs: accounts, margin summary
//   3.x  ledger.rs: append-only balance journal
//   4.x  position.rs: position struct, mark, partial/full close
//   5.x  order.rs: market orders and trades
//   6.x  instrument.rs: symbol catalog, category detection, spec synthesis
//   7.x  margin.rs: required margin, pip P&L, margin level
//   8.x  engine/: core engine: accounts, funds, orders, positions, ticker
//   9.x  price_feed.rs: oracle trait + in-memory oracle

pub mod account;
pub mod engine;
pub mod instrument;
pub mod ledger;
pub mod margin;
pub mod order;
pub mod position;
pub mod price_feed;
pub mod types;

// re exports for convenience
pub use account::*;
pub use engine::*;
pub use instrument::*;
pub use ledger::*;
pub use margin::*;
pub use order::*;
pub use position::*;
pub use price_feed::*;
pub use types::*;
