//! Data model and error type shared by the feed connectors, the market store and the depth
//! calculator.

pub mod errors;
pub mod symbols;
pub mod types;

pub use errors::ConnectorError;
pub use symbols::{SymbolId, SymbolTable};
pub use types::{
    BookRecord, BookSide, PriceLevel, PriceSnapshot, Quote, SideBook, SideLevels, Ticker, Tips,
};
