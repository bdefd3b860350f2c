//! Price Level - the FIFO queue of resting orders at one price.
//!
//! The queue is a doubly-linked list threaded through the arena's
//! `prev`/`next` handles, so appending, popping the head and removing an
//! arbitrary order by handle are all O(1).

use crate::arena::{Arena, ArenaIndex, NULL_INDEX};

/// A queue of resting orders at a single price.
///
/// `total_qty` is always the sum of `qty` over the queued orders. Every
/// mutation of a queued order's quantity must go through this type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceLevel {
    /// Oldest order (first to match)
    pub head: ArenaIndex,
    /// Newest order (last to match)
    pub tail: ArenaIndex,
    /// Aggregate resting quantity
    pub total_qty: u64,
    /// Number of queued orders
    pub count: u32,
}

impl PriceLevel {
    #[inline]
    pub const fn new() -> Self {
        Self {
            head: NULL_INDEX,
            tail: NULL_INDEX,
            total_qty: 0,
            count: 0,
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append an order at the tail (it gets the lowest time priority).
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn push_back(&mut self, arena: &mut Arena, index: ArenaIndex) {
        let qty = arena.get(index).qty;

        if self.tail == NULL_INDEX {
            debug_assert!(self.head == NULL_INDEX);
            self.head = index;
        } else {
            arena.get_mut(self.tail).next = index;
        }

        let node = arena.get_mut(index);
        node.prev = self.tail;
        node.next = NULL_INDEX;
        self.tail = index;

        self.count += 1;
        self.total_qty += qty as u64;
    }

    /// Unlink an order from anywhere in the queue.
    ///
    /// Returns `true` if the level is now empty. The slot is NOT freed.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn remove(&mut self, arena: &mut Arena, index: ArenaIndex) -> bool {
        let node = arena.get(index);
        let prev_idx = node.prev;
        let next_idx = node.next;
        let qty = node.qty;

        if prev_idx == NULL_INDEX {
            debug_assert!(self.head == index);
            self.head = next_idx;
        } else {
            arena.get_mut(prev_idx).next = next_idx;
        }

        if next_idx == NULL_INDEX {
            debug_assert!(self.tail == index);
            self.tail = prev_idx;
        } else {
            arena.get_mut(next_idx).prev = prev_idx;
        }

        debug_assert!(self.count > 0);
        debug_assert!(self.total_qty >= qty as u64);
        self.count -= 1;
        self.total_qty -= qty as u64;

        let node = arena.get_mut(index);
        node.prev = NULL_INDEX;
        node.next = NULL_INDEX;

        self.count == 0
    }

    /// Head order, or `NULL_INDEX` if empty.
    #[inline]
    pub const fn peek_head(&self) -> ArenaIndex {
        self.head
    }

    /// Account for a partial fill of a queued order.
    #[inline]
    pub fn subtract_qty(&mut self, qty: u32) {
        debug_assert!(self.total_qty >= qty as u64);
        self.total_qty -= qty as u64;
    }

    /// Account for an in-place quantity change of a queued order.
    #[inline]
    pub fn apply_delta(&mut self, old_qty: u32, new_qty: u32) {
        debug_assert!(self.total_qty >= old_qty as u64);
        self.total_qty = self.total_qty - old_qty as u64 + new_qty as u64;
    }

    /// Walk the queue head to tail.
    pub fn iter<'a>(&self, arena: &'a Arena) -> LevelIter<'a> {
        LevelIter {
            arena,
            cursor: self.head,
        }
    }
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the handles queued at one level, in time priority.
pub struct LevelIter<'a> {
    arena: &'a Arena,
    cursor: ArenaIndex,
}

impl Iterator for LevelIter<'_> {
    type Item = ArenaIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NULL_INDEX {
            return None;
        }
        let current = self.cursor;
        self.cursor = self.arena.get(current).next;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Side;

    fn setup_arena_with_orders(arena: &mut Arena, count: u32) -> Vec<ArenaIndex> {
        (0..count)
            .map(|i| {
                let idx = arena.alloc().unwrap();
                arena.get_mut(idx).init(i as u64, Side::Buy, 10000, 100);
                idx
            })
            .collect()
    }

    fn filled_level(arena: &mut Arena, count: u32) -> (PriceLevel, Vec<ArenaIndex>) {
        let mut level = PriceLevel::new();
        let indices = setup_arena_with_orders(arena, count);
        for &idx in &indices {
            level.push_back(arena, idx);
        }
        (level, indices)
    }

    #[test]
    fn test_empty_level() {
        let level = PriceLevel::new();
        assert!(level.is_empty());
        assert_eq!(level.total_qty, 0);
        assert_eq!(level.head, NULL_INDEX);
        assert_eq!(level.tail, NULL_INDEX);
    }

    #[test]
    fn test_push_multiple_fifo() {
        let mut arena = Arena::new(10);
        let (level, indices) = filled_level(&mut arena, 3);

        assert_eq!(level.count, 3);
        assert_eq!(level.total_qty, 300);
        assert_eq!(level.head, indices[0]);
        assert_eq!(level.tail, indices[2]);

        assert_eq!(arena.get(indices[0]).next, indices[1]);
        assert_eq!(arena.get(indices[1]).prev, indices[0]);
        assert_eq!(arena.get(indices[1]).next, indices[2]);
        assert_eq!(arena.get(indices[2]).prev, indices[1]);
    }

    #[test]
    fn test_iter_in_arrival_order() {
        let mut arena = Arena::new(10);
        let (level, indices) = filled_level(&mut arena, 4);

        let walked: Vec<_> = level.iter(&arena).collect();
        assert_eq!(walked, indices);
    }

    #[test]
    fn test_drain_from_head() {
        let mut arena = Arena::new(10);
        let (mut level, indices) = filled_level(&mut arena, 3);

        let head = level.peek_head();
        assert_eq!(head, indices[0]);
        assert!(!level.remove(&mut arena, head));
        assert_eq!(level.count, 2);
        assert_eq!(level.head, indices[1]);
        assert_eq!(arena.get(indices[1]).prev, NULL_INDEX);

        assert!(!level.remove(&mut arena, indices[1]));
        assert!(level.remove(&mut arena, indices[2]));
        assert!(level.is_empty());
        assert_eq!(level.total_qty, 0);
        assert_eq!(level.peek_head(), NULL_INDEX);
    }

    #[test]
    fn test_remove_only_node() {
        let mut arena = Arena::new(10);
        let (mut level, indices) = filled_level(&mut arena, 1);

        assert!(level.remove(&mut arena, indices[0]));
        assert!(level.is_empty());
        assert_eq!(level.head, NULL_INDEX);
        assert_eq!(level.tail, NULL_INDEX);
    }

    #[test]
    fn test_remove_head() {
        let mut arena = Arena::new(10);
        let (mut level, indices) = filled_level(&mut arena, 3);

        assert!(!level.remove(&mut arena, indices[0]));
        assert_eq!(level.count, 2);
        assert_eq!(level.head, indices[1]);
        assert_eq!(arena.get(indices[1]).prev, NULL_INDEX);
    }

    #[test]
    fn test_remove_tail() {
        let mut arena = Arena::new(10);
        let (mut level, indices) = filled_level(&mut arena, 3);

        assert!(!level.remove(&mut arena, indices[2]));
        assert_eq!(level.tail, indices[1]);
        assert_eq!(arena.get(indices[1]).next, NULL_INDEX);
    }

    #[test]
    fn test_remove_middle() {
        let mut arena = Arena::new(10);
        let (mut level, indices) = filled_level(&mut arena, 3);

        assert!(!level.remove(&mut arena, indices[1]));
        assert_eq!(level.total_qty, 200);
        assert_eq!(arena.get(indices[0]).next, indices[2]);
        assert_eq!(arena.get(indices[2]).prev, indices[0]);
    }

    #[test]
    fn test_quantity_adjustments() {
        let mut level = PriceLevel::new();
        level.total_qty = 500;

        level.subtract_qty(100);
        assert_eq!(level.total_qty, 400);

        level.apply_delta(100, 250);
        assert_eq!(level.total_qty, 550);

        level.apply_delta(250, 10);
        assert_eq!(level.total_qty, 310);
    }
}
