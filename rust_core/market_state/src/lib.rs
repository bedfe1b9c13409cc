//! In-memory mirror of per-symbol books and tickers, plus the synchronizer that writes it.

pub mod store;
pub mod synchronizer;

pub use store::{MarketEvent, MarketEventKind, MarketStore, OrderBook};
pub use synchronizer::{BookSynchronizer, RecordOutcome};
