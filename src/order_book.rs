//! Order Book - resting book state for one instrument.
//!
//! Combines the price ladder with the order index (order id -> arena slot)
//! used for O(1) cancel and modify lookup.

use rustc_hash::FxHashMap;

use crate::arena::{Arena, ArenaIndex};
use crate::command::Side;
use crate::ladder::{Ladder, LevelKey};
use crate::price_level::PriceLevel;

/// Where a live order sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderInfo {
    /// Slot in the arena
    pub arena_index: ArenaIndex,
    /// Order side (selects the ladder side)
    pub side: Side,
    /// Ladder key of the order's price level
    pub key: LevelKey,
}

/// Order book over a [`Ladder`] layout.
pub struct OrderBook<L: Ladder> {
    ladder: L,
    /// Order lookup map: OrderId -> OrderInfo
    order_map: FxHashMap<u64, OrderInfo>,
}

impl<L: Ladder> OrderBook<L> {
    /// Create an empty book with room for `orders` index entries.
    pub fn with_capacity(ladder: L, orders: usize) -> Self {
        Self {
            ladder,
            order_map: FxHashMap::with_capacity_and_hasher(orders, Default::default()),
        }
    }

    #[inline]
    pub fn ladder(&self) -> &L {
        &self.ladder
    }

    #[inline]
    pub fn ladder_mut(&mut self) -> &mut L {
        &mut self.ladder
    }

    // ========================================================================
    // Best Price Access
    // ========================================================================

    /// Highest bid price
    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.best_price(Side::Buy)
    }

    /// Lowest ask price
    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.best_price(Side::Sell)
    }

    #[inline]
    pub fn best_price(&self, side: Side) -> Option<u64> {
        self.ladder.best(side).map(|key| self.ladder.price_of(key))
    }

    /// Calculate spread (best_ask - best_bid)
    pub fn spread(&self) -> Option<u64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    // ========================================================================
    // Order Index
    // ========================================================================

    /// Register an admitted order.
    ///
    /// Returns `false` (and changes nothing) if the id is already live.
    #[inline]
    pub fn index_order(&mut self, order_id: u64, info: OrderInfo) -> bool {
        use std::collections::hash_map::Entry;
        match self.order_map.entry(order_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(info);
                true
            }
        }
    }

    /// Drop an order from the index only (after a full fill).
    #[inline]
    pub fn unindex_order(&mut self, order_id: u64) -> Option<OrderInfo> {
        self.order_map.remove(&order_id)
    }

    #[inline]
    pub fn get_order(&self, order_id: u64) -> Option<&OrderInfo> {
        self.order_map.get(&order_id)
    }

    #[inline]
    pub fn contains_order(&self, order_id: u64) -> bool {
        self.order_map.contains_key(&order_id)
    }

    // ========================================================================
    // Resting Orders
    // ========================================================================

    /// Put an indexed order at the tail of its level.
    #[inline]
    pub fn rest_order(&mut self, arena: &mut Arena, info: OrderInfo) {
        self.ladder.insert(arena, info.side, info.key, info.arena_index);
    }

    /// Take an order out of its level and out of the index.
    ///
    /// The arena slot is left for the caller to free.
    pub fn remove_order(&mut self, arena: &mut Arena, order_id: u64) -> Option<OrderInfo> {
        let info = self.order_map.remove(&order_id)?;
        self.ladder.remove(arena, info.side, info.key, info.arena_index);
        Some(info)
    }

    // ========================================================================
    // Level Access
    // ========================================================================

    #[inline]
    pub fn level(&self, side: Side, key: LevelKey) -> Option<&PriceLevel> {
        self.ladder.level(side, key)
    }

    #[inline]
    pub fn level_mut(&mut self, side: Side, key: LevelKey) -> Option<&mut PriceLevel> {
        self.ladder.level_mut(side, key)
    }

    /// Aggregate quantity and order count at a price, `(0, 0)` if none.
    pub fn depth_at(&self, side: Side, price: u64) -> (u64, u32) {
        self.ladder
            .key_of(price)
            .ok()
            .and_then(|key| self.ladder.level(side, key))
            .map(|l| (l.total_qty, l.count))
            .unwrap_or((0, 0))
    }

    // ========================================================================
    // Utility Methods
    // ========================================================================

    /// Total number of live orders
    pub fn order_count(&self) -> usize {
        self.order_map.len()
    }

    pub fn bid_levels(&self) -> usize {
        self.ladder.active_count(Side::Buy)
    }

    pub fn ask_levels(&self) -> usize {
        self.ladder.active_count(Side::Sell)
    }

    pub fn is_empty(&self) -> bool {
        self.order_map.is_empty()
    }

    /// Forget every order and level. The arena must be reset separately.
    pub fn clear(&mut self) {
        self.ladder.clear();
        self.order_map.clear();
    }
}

impl<L: Ladder> std::fmt::Debug for OrderBook<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("bid_levels", &self.bid_levels())
            .field("ask_levels", &self.ask_levels())
            .field("order_count", &self.order_map.len())
            .finish()
    }
}
