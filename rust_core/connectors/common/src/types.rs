use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Which half of a book a level, snapshot or query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bids,
    Asks,
}

impl BookSide {
    /// Feed convention: positive amounts rest on the bid side, everything else on the ask side.
    pub fn from_signed_amount(amount: f64) -> Self {
        if amount > 0.0 {
            BookSide::Bids
        } else {
            BookSide::Asks
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookSide::Bids => "bids",
            BookSide::Asks => "asks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub count: u32,
    /// Always a magnitude; the side is tracked by the container.
    pub amount: f64,
}

/// One `[price, count, amount]` triple as it arrives on the book channel.
/// `amount` still carries the wire sign.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "(f64, u32, f64)")]
pub struct BookRecord {
    pub price: f64,
    pub count: u32,
    pub amount: f64,
}

impl From<(f64, u32, f64)> for BookRecord {
    fn from((price, count, amount): (f64, u32, f64)) -> Self {
        BookRecord { price, count, amount }
    }
}

impl BookRecord {
    pub fn new(price: f64, count: u32, amount: f64) -> Self {
        BookRecord { price, count, amount }
    }

    pub fn side(&self) -> BookSide {
        BookSide::from_signed_amount(self.amount)
    }

    pub fn is_deletion(&self) -> bool {
        self.count == 0
    }

    pub fn level(&self) -> PriceLevel {
        PriceLevel {
            price: self.price,
            count: self.count,
            amount: self.amount.abs(),
        }
    }
}

/// Unordered price → level map for one side of a book.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideLevels {
    levels: HashMap<OrderedFloat<f64>, PriceLevel>,
}

impl SideLevels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, level: PriceLevel) {
        self.levels.insert(OrderedFloat(level.price), level);
    }

    pub fn remove(&mut self, price: f64) -> Option<PriceLevel> {
        self.levels.remove(&OrderedFloat(price))
    }

    pub fn get(&self, price: f64) -> Option<&PriceLevel> {
        self.levels.get(&OrderedFloat(price))
    }

    pub fn contains(&self, price: f64) -> bool {
        self.levels.contains_key(&OrderedFloat(price))
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn prices(&self) -> impl Iterator<Item = f64> + '_ {
        self.levels.keys().map(|p| p.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceLevel> {
        self.levels.values()
    }
}

impl FromIterator<PriceLevel> for SideLevels {
    fn from_iter<I: IntoIterator<Item = PriceLevel>>(iter: I) -> Self {
        let mut levels = SideLevels::new();
        for level in iter {
            levels.upsert(level);
        }
        levels
    }
}

impl Serialize for SideLevels {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.levels.values())
    }
}

/// Sorted view of the prices of one side: bids descending, asks ascending.
///
/// Only constructible from a [`SideLevels`], so the ordering always matches the side it names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSnapshot {
    side: BookSide,
    prices: Vec<f64>,
}

impl PriceSnapshot {
    pub fn from_levels(side: BookSide, levels: &SideLevels) -> Self {
        let mut prices: Vec<f64> = levels.prices().collect();
        match side {
            BookSide::Bids => prices.sort_unstable_by(|a, b| b.total_cmp(a)),
            BookSide::Asks => prices.sort_unstable_by(|a, b| a.total_cmp(b)),
        }
        PriceSnapshot { side, prices }
    }

    pub fn side(&self) -> BookSide {
        self.side
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn first(&self) -> Option<f64> {
        self.prices.first().copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// A side's levels together with the snapshot derived from them. Published as one unit.
#[derive(Debug, Clone, Serialize)]
pub struct SideBook {
    pub levels: SideLevels,
    pub snapshot: PriceSnapshot,
    pub updated_at: DateTime<Utc>,
}

impl SideBook {
    pub fn new(side: BookSide, levels: SideLevels) -> Self {
        let snapshot = PriceSnapshot::from_levels(side, &levels);
        SideBook {
            levels,
            snapshot,
            updated_at: Utc::now(),
        }
    }

    pub fn empty(side: BookSide) -> Self {
        Self::new(side, SideLevels::new())
    }

    pub fn side(&self) -> BookSide {
        self.snapshot.side()
    }

    /// Top of this side, if any.
    pub fn best(&self) -> Option<&PriceLevel> {
        self.snapshot.first().and_then(|p| self.levels.get(p))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticker {
    pub bid: Quote,
    pub ask: Quote,
    pub daily_change: f64,
    pub daily_change_relative: f64,
    pub last_price: f64,
    pub volume: f64,
    pub high: f64,
    pub low: f64,
    pub received_at: DateTime<Utc>,
}

impl Ticker {
    /// Field order: bid, bid size, ask, ask size, daily change, relative daily change,
    /// last price, volume, high, low.
    pub fn from_fields(fields: [f64; 10], received_at: DateTime<Utc>) -> Self {
        let [bid, bid_size, ask, ask_size, daily_change, daily_change_relative, last_price, volume, high, low] =
            fields;
        Ticker {
            bid: Quote { price: bid, amount: bid_size },
            ask: Quote { price: ask, amount: ask_size },
            daily_change,
            daily_change_relative,
            last_price,
            volume,
            high,
            low,
            received_at,
        }
    }
}

/// Best level on each side of a book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tips {
    pub bid: PriceLevel,
    pub ask: PriceLevel,
}
