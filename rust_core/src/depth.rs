//! Walks a side's sorted snapshot to price an order against the mirrored book.
//!
//! Every function here is pure: it reads one `(SideLevels, PriceSnapshot)` pair and never
//! touches shared state, so callers can hold an `Arc<SideBook>` and query it from any thread.

use connectors_common::{BookSide, PriceSnapshot, SideBook, SideLevels};
use serde::Serialize;
use thiserror::Error;

/// Relative slack allowed when the requested amount equals the whole book.
const FILL_TOLERANCE: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DepthError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("no {side} book received yet for {symbol}")]
    MissingBook { symbol: String, side: &'static str },

    #[error("book side is empty")]
    EmptyBook,

    #[error("snapshot references price {price} which is not in the book")]
    InconsistentBook { price: f64 },

    #[error("insufficient depth: requested {requested}, book holds {available}")]
    InsufficientDepth { requested: f64, available: f64 },

    #[error("insufficient depth: limit price {limit_price} is not reached within {available} of book depth")]
    LimitBeyondDepth { limit_price: f64, available: f64 },
}

impl DepthError {
    pub fn is_insufficient_depth(&self) -> bool {
        matches!(
            self,
            DepthError::InsufficientDepth { .. } | DepthError::LimitBeyondDepth { .. }
        )
    }
}

/// Answer to an evaluate query: effective price and, when a positive limit was given,
/// the largest size whose effective price stays within it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub effective_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_order_size: Option<f64>,
}

fn level_amount(levels: &SideLevels, price: f64) -> Result<f64, DepthError> {
    levels
        .get(price)
        .map(|l| l.amount)
        .ok_or(DepthError::InconsistentBook { price })
}

/// Checks the pair holds the same key set and returns the first snapshot price.
///
/// Snapshot prices are unique, so equal lengths plus every snapshot price being present in
/// `levels` means the key sets match.
fn first_price(levels: &SideLevels, snapshot: &PriceSnapshot) -> Result<f64, DepthError> {
    let price = snapshot.first().ok_or(DepthError::EmptyBook)?;
    for &p in snapshot.prices() {
        level_amount(levels, p)?;
    }
    if snapshot.len() != levels.len() {
        let missing = levels
            .prices()
            .find(|p| !snapshot.prices().contains(p))
            .unwrap_or(price);
        return Err(DepthError::InconsistentBook { price: missing });
    }
    Ok(price)
}

/// Size-weighted average price of filling `amount` from the top of the book.
///
/// A non-positive `amount` prices at the first level.
pub fn effective_price(
    amount: f64,
    levels: &SideLevels,
    snapshot: &PriceSnapshot,
) -> Result<f64, DepthError> {
    let first = first_price(levels, snapshot)?;
    if amount <= 0.0 {
        return Ok(first);
    }

    let mut filled = 0.0;
    let mut notional = 0.0;
    for &price in snapshot.prices() {
        let available = level_amount(levels, price)?;
        let remaining = amount - filled;
        if remaining <= available + FILL_TOLERANCE * amount {
            notional += remaining * price;
            return Ok(notional / amount);
        }
        filled += available;
        notional += available * price;
    }

    Err(DepthError::InsufficientDepth {
        requested: amount,
        available: filled,
    })
}

fn crosses(side: BookSide, effective: f64, limit_price: f64) -> bool {
    match side {
        BookSide::Asks => effective > limit_price,
        BookSide::Bids => effective < limit_price,
    }
}

/// Largest order whose effective price does not go past `limit_price`.
///
/// Walks levels until the running effective price crosses the limit, then solves for the
/// size on the crossing level that lands exactly on it:
/// `A + A * (limit - E) / (price - limit)`, where `A` and `E` are the cumulative amount and
/// effective price before that level. A non-positive limit yields zero.
pub fn max_order_size(
    limit_price: f64,
    levels: &SideLevels,
    snapshot: &PriceSnapshot,
) -> Result<f64, DepthError> {
    first_price(levels, snapshot)?;
    if limit_price <= 0.0 {
        return Ok(0.0);
    }

    let side = snapshot.side();
    let mut cum_amount = 0.0;
    let mut notional = 0.0;
    let mut effective = 0.0;
    for &price in snapshot.prices() {
        let amount = level_amount(levels, price)?;
        let prev_amount = cum_amount;
        let prev_effective = effective;

        cum_amount += amount;
        notional += price * amount;
        effective = notional / cum_amount;

        if crosses(side, effective, limit_price) {
            if prev_amount <= 0.0 {
                // limit is already worse than the best level
                return Ok(0.0);
            }
            return Ok(prev_amount + prev_amount * (limit_price - prev_effective) / (price - limit_price));
        }
    }

    Err(DepthError::LimitBeyondDepth {
        limit_price,
        available: cum_amount,
    })
}

/// Effective price for `amount`, plus the max order size when `limit_price` is positive.
pub fn evaluate(
    amount: f64,
    limit_price: Option<f64>,
    levels: &SideLevels,
    snapshot: &PriceSnapshot,
) -> Result<Evaluation, DepthError> {
    let effective_price = effective_price(amount, levels, snapshot)?;
    let max_order_size = match limit_price {
        Some(limit) if limit > 0.0 => Some(max_order_size(limit, levels, snapshot)?),
        _ => None,
    };
    Ok(Evaluation {
        effective_price,
        max_order_size,
    })
}

/// Convenience wrappers over a published [`SideBook`].
pub trait SideBookDepth {
    fn effective_price(&self, amount: f64) -> Result<f64, DepthError>;
    fn max_order_size(&self, limit_price: f64) -> Result<f64, DepthError>;
}

impl SideBookDepth for SideBook {
    fn effective_price(&self, amount: f64) -> Result<f64, DepthError> {
        effective_price(amount, &self.levels, &self.snapshot)
    }

    fn max_order_size(&self, limit_price: f64) -> Result<f64, DepthError> {
        max_order_size(limit_price, &self.levels, &self.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors_common::PriceLevel;
    use proptest::prelude::*;

    fn side_book(side: BookSide, levels: &[(f64, f64)]) -> SideBook {
        let levels: SideLevels = levels
            .iter()
            .map(|&(price, amount)| PriceLevel { price, count: 1, amount })
            .collect();
        SideBook::new(side, levels)
    }

    fn bids() -> SideBook {
        side_book(
            BookSide::Bids,
            &[
                (9000.0, 15.0),
                (20000.0, 1579.7490481),
                (8000.0, 50.0),
                (10000.0, 695.0751044),
            ],
        )
    }

    fn asks() -> SideBook {
        side_book(
            BookSide::Asks,
            &[
                (50000.0, 300.0),
                (30000.0, 1085.85477097),
                (60000.0, 100.0),
                (40000.0, 402.25193007),
            ],
        )
    }

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn zero_or_negative_amount_uses_first_level() {
        assert_eq!(bids().effective_price(0.0).unwrap(), 20000.0);
        assert_eq!(bids().effective_price(-15.0).unwrap(), 20000.0);
        assert_eq!(asks().effective_price(0.0).unwrap(), 30000.0);
        assert_eq!(asks().effective_price(-15.0).unwrap(), 30000.0);
    }

    #[test]
    fn fill_within_first_level() {
        assert_eq!(bids().effective_price(1.0).unwrap(), 20000.0);
        assert_eq!(asks().effective_price(1000.0).unwrap(), 30000.0);
    }

    #[test]
    fn bids_effective_price_walks_down() {
        let book = bids();
        assert_close(book.effective_price(1779.7490481).unwrap(), 18876.24606, 1e-3);
        assert_close(book.effective_price(2274.824153).unwrap(), 16944.48864, 1e-3);
        assert_close(book.effective_price(2289.824153).unwrap(), 16892.4465, 1e-3);
    }

    #[test]
    fn asks_effective_price_walks_up() {
        let book = asks();
        assert_close(book.effective_price(1285.85477097).unwrap(), 31555.3856, 1e-3);
        assert_close(book.effective_price(1488.10670104).unwrap(), 32703.11214, 1e-3);
        assert_close(book.effective_price(1788.106701).unwrap(), 35605.10136, 1e-3);
    }

    #[test]
    fn whole_book_is_fillable() {
        let book = asks();
        let total: f64 = book.levels.iter().map(|l| l.amount).sum();
        assert!(book.effective_price(total).is_ok());
    }

    #[test]
    fn amount_beyond_depth_is_an_error() {
        let err = bids().effective_price(10_000.0).unwrap_err();
        assert!(err.is_insufficient_depth());
        match err {
            DepthError::InsufficientDepth { requested, available } => {
                assert_eq!(requested, 10_000.0);
                assert_close(available, 2339.8241525, 1e-6);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_book_is_an_error() {
        let book = SideBook::empty(BookSide::Bids);
        assert_eq!(book.effective_price(1.0), Err(DepthError::EmptyBook));
        assert_eq!(book.max_order_size(1.0), Err(DepthError::EmptyBook));
    }

    #[test]
    fn mismatched_pair_is_an_error() {
        let bids = bids();
        let asks = asks();
        let err = effective_price(1.0, &bids.levels, &asks.snapshot).unwrap_err();
        assert_eq!(err, DepthError::InconsistentBook { price: 30000.0 });
        assert!(max_order_size(1.0, &asks.levels, &bids.snapshot).is_err());
    }

    #[test]
    fn mismatch_past_the_walk_is_an_error() {
        let levels: SideLevels = [100.0, 101.0, 102.0]
            .iter()
            .map(|&price| PriceLevel { price, count: 1, amount: 1.0 })
            .collect();
        let other: SideLevels = [100.0, 500.0]
            .iter()
            .map(|&price| PriceLevel { price, count: 1, amount: 1.0 })
            .collect();
        let snapshot = PriceSnapshot::from_levels(BookSide::Asks, &other);
        assert_eq!(
            effective_price(0.5, &levels, &snapshot),
            Err(DepthError::InconsistentBook { price: 500.0 })
        );
        assert_eq!(
            max_order_size(100.5, &levels, &snapshot),
            Err(DepthError::InconsistentBook { price: 500.0 })
        );
    }

    #[test]
    fn snapshot_missing_levels_is_an_error() {
        let levels: SideLevels = [100.0, 101.0]
            .iter()
            .map(|&price| PriceLevel { price, count: 1, amount: 1.0 })
            .collect();
        let partial: SideLevels = std::iter::once(PriceLevel { price: 100.0, count: 1, amount: 1.0 }).collect();
        let snapshot = PriceSnapshot::from_levels(BookSide::Asks, &partial);
        assert_eq!(
            effective_price(1.0, &levels, &snapshot),
            Err(DepthError::InconsistentBook { price: 101.0 })
        );
        assert_eq!(
            evaluate(1.0, Some(100.0), &levels, &snapshot),
            Err(DepthError::InconsistentBook { price: 101.0 })
        );
    }

    #[test]
    fn max_order_size_non_positive_limit_is_zero() {
        for book in [bids(), asks()] {
            assert_eq!(book.max_order_size(0.0).unwrap(), 0.0);
            assert_eq!(book.max_order_size(-10000.0).unwrap(), 0.0);
        }
    }

    #[test]
    fn bids_max_order_size_interpolates() {
        let book = bids();
        assert_close(book.max_order_size(18876.24606).unwrap(), 1779.7490481, 1e-3);
        assert_close(book.max_order_size(16944.48864).unwrap(), 2274.824153, 1e-3);
        assert_close(book.max_order_size(16892.4465).unwrap(), 2289.824153, 1e-3);
    }

    #[test]
    fn asks_max_order_size_interpolates() {
        let book = asks();
        assert_close(book.max_order_size(31555.3856).unwrap(), 1285.85477, 1e-3);
        assert_close(book.max_order_size(32703.11214).unwrap(), 1488.10670, 1e-3);
        assert_close(book.max_order_size(35605.10136).unwrap(), 1788.10670, 1e-3);
    }

    #[test]
    fn limit_at_best_price_takes_the_whole_first_level() {
        assert_close(asks().max_order_size(30000.0).unwrap(), 1085.85477097, 1e-9);
        assert_close(bids().max_order_size(20000.0).unwrap(), 1579.7490481, 1e-9);
    }

    #[test]
    fn limit_better_than_best_price_fills_nothing() {
        assert_eq!(asks().max_order_size(29000.0).unwrap(), 0.0);
        assert_eq!(bids().max_order_size(21000.0).unwrap(), 0.0);
    }

    #[test]
    fn limit_never_crossed_is_an_error() {
        let err = asks().max_order_size(1_000_000.0).unwrap_err();
        assert!(err.is_insufficient_depth());
        let err = bids().max_order_size(1.0).unwrap_err();
        assert!(matches!(err, DepthError::LimitBeyondDepth { .. }));
    }

    #[test]
    fn evaluate_skips_max_size_without_limit() {
        let book = asks();
        let e = evaluate(1000.0, None, &book.levels, &book.snapshot).unwrap();
        assert_eq!(e, Evaluation { effective_price: 30000.0, max_order_size: None });
        let e = evaluate(1000.0, Some(0.0), &book.levels, &book.snapshot).unwrap();
        assert!(e.max_order_size.is_none());
        let e = evaluate(1000.0, Some(32703.11214), &book.levels, &book.snapshot).unwrap();
        assert_close(e.max_order_size.unwrap(), 1488.10670, 1e-3);
    }

    fn arb_book() -> impl Strategy<Value = SideBook> {
        (
            prop_oneof![Just(BookSide::Bids), Just(BookSide::Asks)],
            prop::collection::btree_map(1u32..100_000, 0.01f64..500.0, 2..40),
        )
            .prop_map(|(side, levels)| {
                let levels: Vec<(f64, f64)> =
                    levels.into_iter().map(|(p, a)| (p as f64, a)).collect();
                side_book(side, &levels)
            })
    }

    proptest! {
        #[test]
        fn zero_amount_prices_at_top(book in arb_book()) {
            prop_assert_eq!(book.effective_price(0.0).unwrap(), book.snapshot.prices()[0]);
        }

        #[test]
        fn larger_orders_never_price_better(book in arb_book(), a in 0.0f64..1.0, b in 0.0f64..1.0) {
            let total: f64 = book.levels.iter().map(|l| l.amount).sum();
            let (small, large) = if a <= b { (a * total, b * total) } else { (b * total, a * total) };
            let top = book.snapshot.prices()[0];
            let p_small = book.effective_price(small).unwrap();
            let p_large = book.effective_price(large).unwrap();
            prop_assert!((p_large - top).abs() + 1e-6 >= (p_small - top).abs());
        }

        #[test]
        fn max_order_size_inverts_effective_price(book in arb_book(), frac in 0.05f64..0.95) {
            let first = book.levels.get(book.snapshot.prices()[0]).unwrap().amount;
            let total: f64 = book.levels.iter().map(|l| l.amount).sum();
            let amount = first + frac * (total - first);
            let price = book.effective_price(amount).unwrap();
            let size = book.max_order_size(price).unwrap();
            prop_assert!((size - amount).abs() <= 1e-6 * total.max(1.0), "amount {} size {}", amount, size);
        }
    }
}
