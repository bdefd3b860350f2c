//! Matching Engine - Core order matching algorithm.
//!
//! Implements the cross/rest algorithm:
//! 1. CROSSING: Match the incoming order against the opposite side, best
//!    level first, oldest order first within a level
//! 2. RESTING: Place remaining quantity at the tail of its own level
//!
//! The matching engine is the only writer of order quantities and the only
//! place where the ladder, the order index and the arena change together.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use arrayvec::ArrayVec;
use log::{debug, error, info, warn};

use crate::arena::{Arena, ArenaIndex, NULL_INDEX};
use crate::command::{Fill, NewOrder, Side};
use crate::config::BookConfig;
use crate::error::{BookError, BookResult};
use crate::ladder::{FixedLadder, Ladder, LevelKey};
use crate::order_book::{OrderBook, OrderInfo};

/// Result of a successful submit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Trades in execution order
    pub fills: Vec<Fill>,
    /// Quantity left resting in the book (0 = fully filled on arrival)
    pub resting_qty: u32,
}

impl SubmitOutcome {
    /// Total executed quantity
    pub fn filled_qty(&self) -> u64 {
        self.fills.iter().map(|f| f.qty as u64).sum()
    }

    pub fn is_resting(&self) -> bool {
        self.resting_qty > 0
    }
}

/// Result of a successful modify
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOutcome {
    /// Quantity changed in place; queue position kept
    Updated { old_qty: u32, new_qty: u32 },
    /// Non-positive target quantity canceled the order
    Canceled { canceled_qty: u32 },
}

/// Read-only view of a live order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderView {
    pub order_id: u64,
    pub side: Side,
    pub price: u64,
    pub qty: u32,
}

/// Read-only view of an active price level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelView {
    pub price: u64,
    pub total_qty: u64,
    pub count: u32,
}

/// Aggregate state of both sides, best level first on each side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookSnapshot {
    /// Descending prices
    pub bids: Vec<LevelView>,
    /// Ascending prices
    pub asks: Vec<LevelView>,
}

/// The matching engine core
pub struct MatchingEngine<L: Ladder = FixedLadder> {
    /// Storage for every live order
    pub(crate) arena: Arena,
    /// Ladder plus order index
    pub(crate) book: OrderBook<L>,
}

impl<L: Ladder> MatchingEngine<L> {
    /// Create an engine over `ladder` holding at most `capacity` live orders.
    pub fn with_ladder(ladder: L, capacity: u32) -> Self {
        Self {
            arena: Arena::new(capacity),
            book: OrderBook::with_capacity(ladder, capacity as usize),
        }
    }

    /// Build the ladder described by `config`.
    pub fn from_config(config: &BookConfig) -> BookResult<Self> {
        config.validate()?;
        let ladder = L::from_config(config)?;
        info!(
            "matching engine ready: capacity={}, ladder={:?}, range=[{}, {}], tick={}",
            config.capacity, config.ladder, config.min_price, config.max_price, config.tick_size
        );
        Ok(Self::with_ladder(ladder, config.capacity))
    }

    // ========================================================================
    // Submit
    // ========================================================================

    /// Admit a limit order, match it and rest any residual.
    ///
    /// All validation happens before the first mutation, so an `Err` leaves
    /// the book exactly as it was.
    ///
    /// # Errors
    /// - `InvalidQuantity` for a zero quantity
    /// - `DuplicateOrderId` if the id is live
    /// - `OutOfRange` if the price is not on the ladder
    /// - `PoolExhausted` if no arena slot is free
    pub fn submit(&mut self, order: NewOrder) -> BookResult<SubmitOutcome> {
        if order.qty == 0 {
            warn!("rejecting order {}: zero quantity", order.order_id);
            return Err(BookError::InvalidQuantity {
                order_id: order.order_id,
                qty: 0,
            });
        }

        if self.book.contains_order(order.order_id) {
            warn!("rejecting order {}: id already live", order.order_id);
            return Err(BookError::DuplicateOrderId(order.order_id));
        }

        let key = self.book.ladder().key_of(order.price).inspect_err(|e| {
            warn!("rejecting order {}: {}", order.order_id, e);
        })?;

        let arena_index = self.arena.alloc().inspect_err(|e| {
            error!("rejecting order {}: {}", order.order_id, e);
        })?;

        // From here on nothing can fail
        let price = self.book.ladder().price_of(key);
        self.arena
            .get_mut(arena_index)
            .init(order.order_id, order.side, price, order.qty);

        let info = OrderInfo {
            arena_index,
            side: order.side,
            key,
        };
        let indexed = self.book.index_order(order.order_id, info);
        debug_assert!(indexed);

        let mut fills = Vec::new();
        let remaining = self.cross(order.order_id, order.side, key, arena_index, order.qty, &mut fills);

        if remaining > 0 {
            self.book.rest_order(&mut self.arena, info);
        } else {
            self.book.unindex_order(order.order_id);
            self.arena.free(arena_index);
        }

        debug!(
            "order {} {:?} {}@{}: {} fills, resting {}",
            order.order_id,
            order.side,
            order.qty,
            price,
            fills.len(),
            remaining
        );

        Ok(SubmitOutcome {
            fills,
            resting_qty: remaining,
        })
    }

    /// Cross the taker against the opposite side.
    ///
    /// # Returns
    /// Remaining taker quantity
    fn cross(
        &mut self,
        taker_id: u64,
        taker_side: Side,
        taker_key: LevelKey,
        taker_index: ArenaIndex,
        mut remaining: u32,
        fills: &mut Vec<Fill>,
    ) -> u32 {
        let maker_side = taker_side.opposite();

        while remaining > 0 {
            let Some(best) = self.book.ladder().best(maker_side) else {
                break; // No orders on opposite side
            };

            if !Self::crosses(taker_side, taker_key, best) {
                break;
            }

            remaining = self.match_at_level(taker_id, taker_side, maker_side, best, remaining, fills);
            self.arena.get_mut(taker_index).qty = remaining;
        }

        remaining
    }

    /// Whether a taker at `taker_key` may trade with the best opposite level.
    #[inline]
    fn crosses(taker_side: Side, taker_key: LevelKey, opposite_best: LevelKey) -> bool {
        match taker_side {
            // Buyer willing to pay >= lowest ask
            Side::Buy => taker_key >= opposite_best,
            // Seller willing to accept <= highest bid
            Side::Sell => taker_key <= opposite_best,
        }
    }

    /// Consume one level head-first.
    ///
    /// # Returns
    /// Remaining taker quantity after this level
    fn match_at_level(
        &mut self,
        taker_id: u64,
        taker_side: Side,
        maker_side: Side,
        key: LevelKey,
        mut remaining: u32,
        fills: &mut Vec<Fill>,
    ) -> u32 {
        let price = self.book.ladder().price_of(key);

        while remaining > 0 {
            let maker_idx = match self.book.level(maker_side, key) {
                Some(level) => level.peek_head(),
                None => break,
            };
            if maker_idx == NULL_INDEX {
                break;
            }

            let maker = self.arena.get(maker_idx);
            debug_assert_eq!(maker.side, maker_side, "same-side order on opposite ladder");
            let maker_order_id = maker.order_id;
            let maker_qty = maker.qty;

            let trade_qty = remaining.min(maker_qty);
            remaining -= trade_qty;

            fills.push(Fill {
                price,
                qty: trade_qty,
                maker_order_id,
                taker_order_id: taker_id,
                taker_side,
            });

            if trade_qty == maker_qty {
                // Unlinking subtracts the maker's full quantity from the level
                self.book
                    .ladder_mut()
                    .remove(&mut self.arena, maker_side, key, maker_idx);
                self.book.unindex_order(maker_order_id);
                self.arena.free(maker_idx);
            } else {
                self.arena.get_mut(maker_idx).qty = maker_qty - trade_qty;
                if let Some(level) = self.book.level_mut(maker_side, key) {
                    level.subtract_qty(trade_qty);
                }
            }
        }

        remaining
    }

    // ========================================================================
    // Cancel / Modify
    // ========================================================================

    /// Remove a live order from the book.
    ///
    /// # Returns
    /// The quantity that was resting
    ///
    /// # Errors
    /// `NotFound` for unknown ids; the book is untouched.
    pub fn cancel(&mut self, order_id: u64) -> BookResult<u32> {
        let Some(info) = self.book.remove_order(&mut self.arena, order_id) else {
            warn!("cancel: order {} not found", order_id);
            return Err(BookError::NotFound(order_id));
        };

        let canceled_qty = self.arena.get(info.arena_index).qty;
        self.arena.free(info.arena_index);

        debug!("order {} canceled, {} left the book", order_id, canceled_qty);
        Ok(canceled_qty)
    }

    /// Change the quantity of a live order in place.
    ///
    /// A non-positive `new_qty` cancels the order. Any positive change keeps
    /// the order's queue position, including increases.
    ///
    /// # Errors
    /// - `NotFound` for unknown ids
    /// - `InvalidQuantity` if `new_qty` does not fit a `u32`
    pub fn modify(&mut self, order_id: u64, new_qty: i64) -> BookResult<ModifyOutcome> {
        let Some(info) = self.book.get_order(order_id).copied() else {
            warn!("modify: order {} not found", order_id);
            return Err(BookError::NotFound(order_id));
        };

        if new_qty <= 0 {
            debug!("modify: order {} to {} degrades to cancel", order_id, new_qty);
            let canceled_qty = self.cancel(order_id)?;
            return Ok(ModifyOutcome::Canceled { canceled_qty });
        }

        let new_qty = u32::try_from(new_qty).map_err(|_| BookError::InvalidQuantity {
            order_id,
            qty: new_qty,
        })?;

        let node = self.arena.get_mut(info.arena_index);
        let old_qty = node.qty;
        node.qty = new_qty;

        if let Some(level) = self.book.level_mut(info.side, info.key) {
            level.apply_delta(old_qty, new_qty);
        }

        debug!("order {} modified {} -> {}", order_id, old_qty, new_qty);
        Ok(ModifyOutcome::Updated { old_qty, new_qty })
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.book.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.book.best_ask()
    }

    #[inline]
    pub fn spread(&self) -> Option<u64> {
        self.book.spread()
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.book.order_count()
    }

    /// `(allocated, capacity)` of the order pool
    #[inline]
    pub fn arena_usage(&self) -> (u32, u32) {
        (self.arena.allocated(), self.arena.capacity())
    }

    /// Current state of a live order
    pub fn order(&self, order_id: u64) -> Option<OrderView> {
        self.book.get_order(order_id).map(|info| {
            let node = self.arena.get(info.arena_index);
            OrderView {
                order_id,
                side: node.side,
                price: node.price,
                qty: node.qty,
            }
        })
    }

    /// Aggregate `(total_qty, count)` at a price
    pub fn depth_at(&self, side: Side, price: u64) -> (u64, u32) {
        self.book.depth_at(side, price)
    }

    /// Resting orders at a price in time priority
    pub fn queue(&self, side: Side, price: u64) -> Vec<OrderView> {
        let ladder = self.book.ladder();
        let Some(level) = ladder.key_of(price).ok().and_then(|key| ladder.level(side, key)) else {
            return Vec::new();
        };
        level
            .iter(&self.arena)
            .map(|idx| {
                let node = self.arena.get(idx);
                OrderView {
                    order_id: node.order_id,
                    side: node.side,
                    price: node.price,
                    qty: node.qty,
                }
            })
            .collect()
    }

    fn level_views(&self, side: Side) -> impl Iterator<Item = LevelView> + '_ {
        let ladder = self.book.ladder();
        ladder.active_levels(side).map(move |(key, level)| LevelView {
            price: ladder.price_of(key),
            total_qty: level.total_qty,
            count: level.count,
        })
    }

    /// All active levels of one side, best first
    pub fn levels(&self, side: Side) -> Vec<LevelView> {
        self.level_views(side).collect()
    }

    /// The best `N` levels of one side, without heap allocation
    pub fn top_levels<const N: usize>(&self, side: Side) -> ArrayVec<LevelView, N> {
        self.level_views(side).take(N).collect()
    }

    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            bids: self.levels(Side::Buy),
            asks: self.levels(Side::Sell),
        }
    }

    /// Full consistency check of ladder, index and arena.
    ///
    /// Linear in the size of the book; meant for tests and diagnostics.
    pub fn check_invariants(&self) -> Result<(), String> {
        let ladder = self.book.ladder();
        ladder.check_active_index()?;

        let mut queued = 0usize;
        for side in [Side::Buy, Side::Sell] {
            for (key, level) in ladder.active_levels(side) {
                let mut sum = 0u64;
                let mut count = 0u32;
                for idx in level.iter(&self.arena) {
                    let node = self.arena.get(idx);
                    if !node.is_live() {
                        return Err(format!("slot {} queued but free", idx));
                    }
                    if node.side != side {
                        return Err(format!("order {} queued on the wrong side", node.order_id));
                    }
                    if node.qty == 0 {
                        return Err(format!("order {} resting with zero quantity", node.order_id));
                    }
                    let expected = OrderInfo {
                        arena_index: idx,
                        side,
                        key,
                    };
                    if self.book.get_order(node.order_id) != Some(&expected) {
                        return Err(format!("order {} missing from index", node.order_id));
                    }
                    sum += node.qty as u64;
                    count += 1;
                }
                if sum != level.total_qty || count != level.count {
                    return Err(format!(
                        "{:?} level {}: total_qty={} count={} but queue holds {} in {}",
                        side,
                        ladder.price_of(key),
                        level.total_qty,
                        level.count,
                        sum,
                        count
                    ));
                }
                queued += count as usize;
            }
        }

        if queued != self.book.order_count() {
            return Err(format!(
                "{} orders queued but {} indexed",
                queued,
                self.book.order_count()
            ));
        }
        if self.arena.allocated() as usize != queued {
            return Err(format!(
                "{} slots allocated but {} orders queued",
                self.arena.allocated(),
                queued
            ));
        }
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                return Err(format!("crossed book: bid {} >= ask {}", bid, ask));
            }
        }
        Ok(())
    }

    /// Hash of the visible book state (for determinism testing)
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.best_bid().hash(&mut hasher);
        self.best_ask().hash(&mut hasher);
        self.order_count().hash(&mut hasher);
        self.arena.allocated().hash(&mut hasher);

        for side in [Side::Buy, Side::Sell] {
            for level in self.level_views(side) {
                level.price.hash(&mut hasher);
                level.total_qty.hash(&mut hasher);
                level.count.hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    /// Warm up the engine (pre-fault memory pages)
    pub fn warm_up(&mut self) {
        self.arena.warm_up();
    }

    /// Drop every order and return all slots to the pool.
    pub fn clear(&mut self) {
        self.book.clear();
        self.arena = Arena::new(self.arena.capacity());
    }
}
