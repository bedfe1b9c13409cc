use std::sync::Arc;

use arc_swap::ArcSwapOption;
use connectors_common::{BookSide, PriceSnapshot, SideBook, SymbolId, SymbolTable, Ticker, Tips};
use log::warn;
use market_depth::{DepthError, Evaluation, SideBookDepth};
use serde::Serialize;
use tokio::sync::broadcast;

/// Both sides of a symbol's book as last published.
#[derive(Debug, Clone, Serialize)]
pub struct OrderBook {
    pub bids: Arc<SideBook>,
    pub asks: Arc<SideBook>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketEventKind {
    BookSnapshot,
    BookUpdate(BookSide),
    Ticker,
}

/// Emitted after every publication, for consumers that want to push rather than poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketEvent {
    pub symbol: String,
    pub kind: MarketEventKind,
}

#[derive(Default)]
struct MarketSlot {
    bids: ArcSwapOption<SideBook>,
    asks: ArcSwapOption<SideBook>,
    ticker: ArcSwapOption<Ticker>,
}

impl MarketSlot {
    fn side(&self, side: BookSide) -> &ArcSwapOption<SideBook> {
        match side {
            BookSide::Bids => &self.bids,
            BookSide::Asks => &self.asks,
        }
    }
}

/// Per-symbol books and tickers.
///
/// Every side is stored as an immutable `Arc<SideBook>` and replaced wholesale, so readers on
/// other threads never observe levels and snapshot out of step. Writes go through
/// [`crate::BookSynchronizer`].
pub struct MarketStore {
    symbols: SymbolTable,
    markets: Vec<MarketSlot>,
    tx: broadcast::Sender<MarketEvent>,
}

impl MarketStore {
    pub fn new(symbols: SymbolTable, buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        let markets = symbols.iter().map(|_| MarketSlot::default()).collect();
        MarketStore { symbols, markets, tx }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.tx.subscribe()
    }

    pub fn side_book_by_id(&self, id: SymbolId, side: BookSide) -> Option<Arc<SideBook>> {
        self.markets.get(id.index())?.side(side).load_full()
    }

    pub fn side_book(&self, symbol: &str, side: BookSide) -> Option<Arc<SideBook>> {
        self.side_book_by_id(self.symbols.id(symbol)?, side)
    }

    pub fn price_snapshot(&self, symbol: &str, side: BookSide) -> Option<PriceSnapshot> {
        self.side_book(symbol, side).map(|book| book.snapshot.clone())
    }

    /// `None` until both sides have been received.
    pub fn order_book(&self, symbol: &str) -> Option<OrderBook> {
        Some(OrderBook {
            bids: self.side_book(symbol, BookSide::Bids)?,
            asks: self.side_book(symbol, BookSide::Asks)?,
        })
    }

    pub fn ticker_by_id(&self, id: SymbolId) -> Option<Arc<Ticker>> {
        self.markets.get(id.index())?.ticker.load_full()
    }

    pub fn ticker(&self, symbol: &str) -> Option<Arc<Ticker>> {
        self.ticker_by_id(self.symbols.id(symbol)?)
    }

    pub fn tips(&self, symbol: &str) -> Option<Tips> {
        let bids = self.side_book(symbol, BookSide::Bids)?;
        let asks = self.side_book(symbol, BookSide::Asks)?;
        Some(Tips {
            bid: *bids.best()?,
            ask: *asks.best()?,
        })
    }

    fn require_side(&self, symbol: &str, side: BookSide) -> Result<Arc<SideBook>, DepthError> {
        let id = self
            .symbols
            .id(symbol)
            .ok_or_else(|| DepthError::UnknownSymbol(symbol.to_string()))?;
        self.side_book_by_id(id, side)
            .ok_or_else(|| DepthError::MissingBook {
                symbol: symbol.to_string(),
                side: side.as_str(),
            })
    }

    pub fn effective_price(&self, symbol: &str, side: BookSide, amount: f64) -> Result<f64, DepthError> {
        self.require_side(symbol, side)?.effective_price(amount)
    }

    pub fn max_order_size(&self, symbol: &str, side: BookSide, limit_price: f64) -> Result<f64, DepthError> {
        self.require_side(symbol, side)?.max_order_size(limit_price)
    }

    pub fn evaluate(
        &self,
        symbol: &str,
        side: BookSide,
        amount: f64,
        limit_price: Option<f64>,
    ) -> Result<Evaluation, DepthError> {
        let book = self.require_side(symbol, side)?;
        market_depth::evaluate(amount, limit_price, &book.levels, &book.snapshot)
    }

    pub(crate) fn publish_side(&self, id: SymbolId, book: SideBook) {
        match self.markets.get(id.index()) {
            Some(slot) => slot.side(book.side()).store(Some(Arc::new(book))),
            None => warn!("dropping book for unknown symbol id {}", id),
        }
    }

    pub(crate) fn publish_ticker(&self, id: SymbolId, ticker: Ticker) {
        match self.markets.get(id.index()) {
            Some(slot) => slot.ticker.store(Some(Arc::new(ticker))),
            None => warn!("dropping ticker for unknown symbol id {}", id),
        }
    }

    pub(crate) fn notify(&self, id: SymbolId, kind: MarketEventKind) {
        if let Some(symbol) = self.symbols.name(id) {
            let _ = self.tx.send(MarketEvent {
                symbol: symbol.to_string(),
                kind,
            });
        }
    }
}
