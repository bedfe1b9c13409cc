use std::sync::Arc;

use connectors_common::{BookRecord, BookSide, SideBook, SideLevels, SymbolId, Ticker};
use log::debug;

use crate::store::{MarketEventKind, MarketStore};

/// What a single book record did to its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Upserted(BookSide),
    Deleted(BookSide),
    /// Deletion for a price the side does not hold; nothing was published.
    Missing(BookSide),
}

/// The single writer of a [`MarketStore`].
///
/// Each mutation copies the affected side, applies the record, rebuilds the sorted snapshot
/// and swaps the new pair in, so the snapshot is never stale, deletions included.
pub struct BookSynchronizer {
    store: Arc<MarketStore>,
}

impl BookSynchronizer {
    pub fn new(store: Arc<MarketStore>) -> Self {
        BookSynchronizer { store }
    }

    pub fn store(&self) -> &Arc<MarketStore> {
        &self.store
    }

    fn current_levels(&self, symbol: SymbolId, side: BookSide) -> SideLevels {
        self.store
            .side_book_by_id(symbol, side)
            .map(|book| book.levels.clone())
            .unwrap_or_default()
    }

    /// Upsert or delete one level, then republish the affected side.
    pub fn apply_record(&mut self, symbol: SymbolId, record: BookRecord) -> RecordOutcome {
        let side = record.side();
        let mut levels = self.current_levels(symbol, side);

        let outcome = if record.is_deletion() {
            match levels.remove(record.price) {
                Some(_) => RecordOutcome::Deleted(side),
                None => {
                    debug!(
                        "delete for absent {} level {} on {}",
                        side.as_str(),
                        record.price,
                        symbol
                    );
                    return RecordOutcome::Missing(side);
                }
            }
        } else {
            levels.upsert(record.level());
            RecordOutcome::Upserted(side)
        };

        self.store.publish_side(symbol, SideBook::new(side, levels));
        outcome
    }

    /// Replace the whole book for `symbol` with the records of a snapshot payload.
    pub fn apply_snapshot(&mut self, symbol: SymbolId, records: &[BookRecord]) {
        let mut bids = SideLevels::new();
        let mut asks = SideLevels::new();
        for record in records {
            if record.is_deletion() {
                debug!("ignoring zero-count level {} in snapshot", record.price);
                continue;
            }
            match record.side() {
                BookSide::Bids => bids.upsert(record.level()),
                BookSide::Asks => asks.upsert(record.level()),
            }
        }
        debug!(
            "book snapshot for {}: {} bids, {} asks",
            symbol,
            bids.len(),
            asks.len()
        );

        self.store.publish_side(symbol, SideBook::new(BookSide::Bids, bids));
        self.store.publish_side(symbol, SideBook::new(BookSide::Asks, asks));
        self.store.notify(symbol, MarketEventKind::BookSnapshot);
    }

    pub fn apply_update(&mut self, symbol: SymbolId, record: BookRecord) -> RecordOutcome {
        let outcome = self.apply_record(symbol, record);
        match outcome {
            RecordOutcome::Upserted(side) | RecordOutcome::Deleted(side) => {
                self.store.notify(symbol, MarketEventKind::BookUpdate(side));
            }
            RecordOutcome::Missing(_) => {}
        }
        outcome
    }

    /// Rebuild both snapshots from the current key sets.
    pub fn resort(&mut self, symbol: SymbolId) {
        for side in [BookSide::Bids, BookSide::Asks] {
            if let Some(book) = self.store.side_book_by_id(symbol, side) {
                self.store
                    .publish_side(symbol, SideBook::new(side, book.levels.clone()));
            }
        }
    }

    pub fn apply_ticker(&mut self, symbol: SymbolId, ticker: Ticker) {
        self.store.publish_ticker(symbol, ticker);
        self.store.notify(symbol, MarketEventKind::Ticker);
    }
}
