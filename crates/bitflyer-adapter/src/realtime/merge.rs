/*
[INPUT]:  A baseline board snapshot followed by incremental board diffs
[OUTPUT]: Independent copies of the continuously merged order book
[POS]:    Realtime layer - order book reconstruction
[UPDATE]: When diff semantics or ordering rules change
*/

use std::cmp::Reverse;

use rust_decimal::Decimal;

use crate::types::{Board, BoardLevel};

/// Authoritative merged view for one board channel.
///
/// Levels within one side have unique prices, no zero sizes, asks are
/// ascending and bids descending after every mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    view: Board,
}

impl OrderBook {
    pub fn new(snapshot: Board) -> Self {
        let mut book = Self::default();
        book.replace(snapshot);
        book
    }

    /// Replace the whole view with a fresh snapshot and return a copy.
    pub fn replace(&mut self, snapshot: Board) -> Board {
        let Board {
            mid_price,
            bids,
            asks,
        } = snapshot;
        self.view = Board {
            mid_price,
            bids: Vec::with_capacity(bids.len()),
            asks: Vec::with_capacity(asks.len()),
        };
        // Route through the diff path so duplicates and zero sizes in the
        // snapshot cannot break the side invariants.
        apply_side(&mut self.view.bids, &bids);
        apply_side(&mut self.view.asks, &asks);
        self.sort();
        self.view.clone()
    }

    /// Fold one diff into the view and return a copy of the result.
    pub fn apply_diff(&mut self, diff: &Board) -> Board {
        self.view.mid_price = diff.mid_price;
        apply_side(&mut self.view.bids, &diff.bids);
        apply_side(&mut self.view.asks, &diff.asks);
        self.sort();
        self.view.clone()
    }

    pub fn view(&self) -> &Board {
        &self.view
    }

    fn sort(&mut self) {
        self.view.asks.sort_by_key(|level| level.price);
        self.view.bids.sort_by_key(|level| Reverse(level.price));
    }
}

fn apply_side(side: &mut Vec<BoardLevel>, edits: &[BoardLevel]) {
    for edit in edits {
        if edit.price.is_zero() {
            continue;
        }
        let existing = side.iter().position(|level| level.price == edit.price);
        match (existing, edit.size == Decimal::ZERO) {
            (Some(idx), true) => {
                side.remove(idx);
            }
            (None, true) => {}
            (Some(idx), false) => side[idx].size = edit.size,
            (None, false) => side.push(*edit),
        }
    }
}
