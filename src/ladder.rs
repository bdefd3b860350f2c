//! Price Ladder - maps prices to price levels and tracks which are active.
//!
//! Two interchangeable layouts implement [`Ladder`]:
//!
//! - [`FixedLadder`]: a dense array of levels over a bounded tick grid. The
//!   level of a price is found by arithmetic, and a per-side ordered set of
//!   non-empty level indices gives best-price discovery without scanning.
//! - [`SparseLadder`]: one ordered map per side keyed by raw price. No
//!   range limit, at the cost of logarithmic navigation.
//!
//! Both keep bids and asks in separate level stores, so a level only ever
//! queues one side's orders.

use std::collections::{BTreeMap, BTreeSet};

use crate::arena::{Arena, ArenaIndex};
use crate::command::Side;
use crate::config::BookConfig;
use crate::error::{BookError, BookResult};
use crate::price_level::PriceLevel;

/// Position of a level on a ladder. Ascending keys mean ascending prices.
pub type LevelKey = u64;

/// Best-first walk over the active levels of one side.
pub type ActiveLevels<'a> = Box<dyn Iterator<Item = (LevelKey, &'a PriceLevel)> + 'a>;

/// The Price Ladder contract shared by both layouts.
///
/// `insert` and `remove` are the only ways a level enters or leaves the
/// active set: a level is active exactly while its queue is non-empty.
pub trait Ladder {
    /// Build an empty ladder for the given configuration.
    fn from_config(config: &BookConfig) -> BookResult<Self>
    where
        Self: Sized;

    /// Resolve a price to its level key, rejecting prices the ladder cannot hold.
    fn key_of(&self, price: u64) -> BookResult<LevelKey>;

    /// Price of the level at `key`.
    fn price_of(&self, key: LevelKey) -> u64;

    fn level(&self, side: Side, key: LevelKey) -> Option<&PriceLevel>;

    fn level_mut(&mut self, side: Side, key: LevelKey) -> Option<&mut PriceLevel>;

    /// Append `index` to the tail of the level, activating the level if it was empty.
    fn insert(&mut self, arena: &mut Arena, side: Side, key: LevelKey, index: ArenaIndex);

    /// Unlink `index` from its level, deactivating the level once it empties.
    ///
    /// Returns `true` if the level is now empty.
    fn remove(&mut self, arena: &mut Arena, side: Side, key: LevelKey, index: ArenaIndex) -> bool;

    /// Best level: highest key for bids, lowest for asks.
    fn best(&self, side: Side) -> Option<LevelKey>;

    /// Active levels of one side, best first.
    fn active_levels(&self, side: Side) -> ActiveLevels<'_>;

    /// Number of active levels on one side.
    fn active_count(&self, side: Side) -> usize;

    /// Verify that the active set and the non-empty levels coincide.
    fn check_active_index(&self) -> Result<(), String>;

    /// Drop every level. Does not touch the arena.
    fn clear(&mut self);
}

// ============================================================================
// Tick Grid
// ============================================================================

/// Upper bound on the number of points in a [`PriceGrid`].
pub const MAX_GRID_LEVELS: u32 = 1 << 24;

/// The tradable price grid of an instrument: `[min_price, max_price]` in
/// steps of `tick_size`, all in fixed-point units.
///
/// The top grid point is the highest `min_price + k * tick_size` not above
/// `max_price`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceGrid {
    min_price: u64,
    max_price: u64,
    tick_size: u64,
    levels: u32,
}

impl PriceGrid {
    pub fn new(min_price: u64, max_price: u64, tick_size: u64) -> BookResult<Self> {
        if tick_size == 0 {
            return Err(BookError::InvalidConfig("tick size must be positive".into()));
        }
        if min_price > max_price {
            return Err(BookError::InvalidConfig(format!(
                "min price {} above max price {}",
                min_price, max_price
            )));
        }

        let last = (max_price - min_price) / tick_size;
        let levels = u32::try_from(last)
            .ok()
            .and_then(|l| l.checked_add(1))
            .filter(|&l| l <= MAX_GRID_LEVELS)
            .ok_or_else(|| {
                BookError::InvalidConfig(format!(
                    "price grid of {} ticks exceeds {} levels",
                    last, MAX_GRID_LEVELS
                ))
            })?;

        Ok(Self {
            min_price,
            max_price,
            tick_size,
            levels,
        })
    }

    #[inline]
    pub fn min_price(&self) -> u64 {
        self.min_price
    }

    #[inline]
    pub fn max_price(&self) -> u64 {
        self.max_price
    }

    #[inline]
    pub fn tick_size(&self) -> u64 {
        self.tick_size
    }

    /// Number of grid points.
    #[inline]
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// `round((price - min_price) / tick_size)`, half-up.
    ///
    /// # Errors
    /// `BookError::OutOfRange` for prices outside `[min_price, max_price]`,
    /// and for prices that round up past the top grid point.
    #[inline]
    pub fn index_of(&self, price: u64) -> BookResult<u32> {
        let out_of_range = BookError::OutOfRange {
            price,
            min: self.min_price,
            max: self.max_price,
        };
        if price < self.min_price || price > self.max_price {
            return Err(out_of_range);
        }
        let index = round_div(price - self.min_price, self.tick_size);
        if index >= self.levels as u64 {
            return Err(out_of_range);
        }
        Ok(index as u32)
    }

    /// Inverse of [`PriceGrid::index_of`] for on-tick prices.
    #[inline]
    pub fn price_of(&self, index: u32) -> u64 {
        self.min_price
            .saturating_add((index as u64).saturating_mul(self.tick_size))
    }
}

#[inline]
fn round_div(offset: u64, tick: u64) -> u64 {
    let q = offset / tick;
    let r = offset % tick;
    if r >= tick - r {
        q + 1
    } else {
        q
    }
}

// ============================================================================
// Fixed Ladder
// ============================================================================

/// Dense ladder over a [`PriceGrid`].
pub struct FixedLadder {
    grid: PriceGrid,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    /// Indices of non-empty bid levels
    active_bids: BTreeSet<u32>,
    /// Indices of non-empty ask levels
    active_asks: BTreeSet<u32>,
}

impl FixedLadder {
    pub fn new(grid: PriceGrid) -> Self {
        let levels = grid.levels() as usize;
        Self {
            grid,
            bids: vec![PriceLevel::new(); levels],
            asks: vec![PriceLevel::new(); levels],
            active_bids: BTreeSet::new(),
            active_asks: BTreeSet::new(),
        }
    }

    #[inline]
    fn side_parts(&mut self, side: Side) -> (&mut Vec<PriceLevel>, &mut BTreeSet<u32>) {
        match side {
            Side::Buy => (&mut self.bids, &mut self.active_bids),
            Side::Sell => (&mut self.asks, &mut self.active_asks),
        }
    }

    #[inline]
    fn levels(&self, side: Side) -> &[PriceLevel] {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    #[inline]
    fn active(&self, side: Side) -> &BTreeSet<u32> {
        match side {
            Side::Buy => &self.active_bids,
            Side::Sell => &self.active_asks,
        }
    }
}

impl Ladder for FixedLadder {
    fn from_config(config: &BookConfig) -> BookResult<Self> {
        Ok(Self::new(config.price_grid()?))
    }

    #[inline]
    fn key_of(&self, price: u64) -> BookResult<LevelKey> {
        self.grid.index_of(price).map(LevelKey::from)
    }

    #[inline]
    fn price_of(&self, key: LevelKey) -> u64 {
        self.grid.price_of(key as u32)
    }

    #[inline]
    fn level(&self, side: Side, key: LevelKey) -> Option<&PriceLevel> {
        self.levels(side).get(key as usize)
    }

    #[inline]
    fn level_mut(&mut self, side: Side, key: LevelKey) -> Option<&mut PriceLevel> {
        self.side_parts(side).0.get_mut(key as usize)
    }

    #[inline]
    fn insert(&mut self, arena: &mut Arena, side: Side, key: LevelKey, index: ArenaIndex) {
        let (levels, active) = self.side_parts(side);
        let level = &mut levels[key as usize];
        if level.is_empty() {
            active.insert(key as u32);
        }
        level.push_back(arena, index);
    }

    #[inline]
    fn remove(&mut self, arena: &mut Arena, side: Side, key: LevelKey, index: ArenaIndex) -> bool {
        let (levels, active) = self.side_parts(side);
        let emptied = levels[key as usize].remove(arena, index);
        if emptied {
            active.remove(&(key as u32));
        }
        emptied
    }

    #[inline]
    fn best(&self, side: Side) -> Option<LevelKey> {
        let best = match side {
            Side::Buy => self.active_bids.last(),
            Side::Sell => self.active_asks.first(),
        };
        best.map(|&i| LevelKey::from(i))
    }

    fn active_levels(&self, side: Side) -> ActiveLevels<'_> {
        let levels = self.levels(side);
        let lookup = move |&i: &u32| (LevelKey::from(i), &levels[i as usize]);
        match side {
            Side::Buy => Box::new(self.active_bids.iter().rev().map(lookup)),
            Side::Sell => Box::new(self.active_asks.iter().map(lookup)),
        }
    }

    fn active_count(&self, side: Side) -> usize {
        self.active(side).len()
    }

    fn check_active_index(&self) -> Result<(), String> {
        for side in [Side::Buy, Side::Sell] {
            let active = self.active(side);
            for (i, level) in self.levels(side).iter().enumerate() {
                let listed = active.contains(&(i as u32));
                if listed == level.is_empty() {
                    return Err(format!(
                        "{:?} level {} has {} orders but active={}",
                        side, i, level.count, listed
                    ));
                }
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        for side in [Side::Buy, Side::Sell] {
            let (levels, active) = self.side_parts(side);
            for &i in active.iter() {
                levels[i as usize] = PriceLevel::new();
            }
            active.clear();
        }
    }
}

// ============================================================================
// Sparse Ladder
// ============================================================================

/// Ordered-map ladder keyed by raw price.
///
/// Only non-empty levels are kept, so map membership is the active set.
#[derive(Default)]
pub struct SparseLadder {
    bids: BTreeMap<u64, PriceLevel>,
    asks: BTreeMap<u64, PriceLevel>,
}

impl SparseLadder {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn map(&self, side: Side) -> &BTreeMap<u64, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    #[inline]
    fn map_mut(&mut self, side: Side) -> &mut BTreeMap<u64, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }
}

impl Ladder for SparseLadder {
    fn from_config(_config: &BookConfig) -> BookResult<Self> {
        Ok(Self::new())
    }

    #[inline]
    fn key_of(&self, price: u64) -> BookResult<LevelKey> {
        Ok(price)
    }

    #[inline]
    fn price_of(&self, key: LevelKey) -> u64 {
        key
    }

    #[inline]
    fn level(&self, side: Side, key: LevelKey) -> Option<&PriceLevel> {
        self.map(side).get(&key)
    }

    #[inline]
    fn level_mut(&mut self, side: Side, key: LevelKey) -> Option<&mut PriceLevel> {
        self.map_mut(side).get_mut(&key)
    }

    #[inline]
    fn insert(&mut self, arena: &mut Arena, side: Side, key: LevelKey, index: ArenaIndex) {
        self.map_mut(side)
            .entry(key)
            .or_insert_with(PriceLevel::new)
            .push_back(arena, index);
    }

    #[inline]
    fn remove(&mut self, arena: &mut Arena, side: Side, key: LevelKey, index: ArenaIndex) -> bool {
        let map = self.map_mut(side);
        let Some(level) = map.get_mut(&key) else {
            debug_assert!(false, "removing from a missing level");
            return false;
        };
        let emptied = level.remove(arena, index);
        if emptied {
            map.remove(&key);
        }
        emptied
    }

    #[inline]
    fn best(&self, side: Side) -> Option<LevelKey> {
        match side {
            Side::Buy => self.bids.last_key_value().map(|(&p, _)| p),
            Side::Sell => self.asks.first_key_value().map(|(&p, _)| p),
        }
    }

    fn active_levels(&self, side: Side) -> ActiveLevels<'_> {
        match side {
            Side::Buy => Box::new(self.bids.iter().rev().map(|(&p, l)| (p, l))),
            Side::Sell => Box::new(self.asks.iter().map(|(&p, l)| (p, l))),
        }
    }

    fn active_count(&self, side: Side) -> usize {
        self.map(side).len()
    }

    fn check_active_index(&self) -> Result<(), String> {
        for side in [Side::Buy, Side::Sell] {
            if let Some((price, _)) = self.map(side).iter().find(|(_, l)| l.is_empty()) {
                return Err(format!("{:?} level {} is empty but still mapped", side, price));
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> PriceGrid {
        // 90.00 .. 110.00 at one cent, fixed-point scale 100
        PriceGrid::new(9000, 11000, 1).unwrap()
    }

    fn order(arena: &mut Arena, id: u64, side: Side, price: u64, qty: u32) -> ArenaIndex {
        let idx = arena.alloc().unwrap();
        arena.get_mut(idx).init(id, side, price, qty);
        idx
    }

    #[test]
    fn test_grid_index_round_trip() {
        let grid = PriceGrid::new(1000, 2000, 10).unwrap();
        assert_eq!(grid.levels(), 101);
        assert_eq!(grid.index_of(1000), Ok(0));
        assert_eq!(grid.index_of(1010), Ok(1));
        assert_eq!(grid.index_of(2000), Ok(100));
        assert_eq!(grid.price_of(grid.index_of(1550).unwrap()), 1550);
    }

    #[test]
    fn test_grid_rounds_to_nearest_tick() {
        let grid = PriceGrid::new(1000, 2000, 10).unwrap();
        assert_eq!(grid.index_of(1004), Ok(0));
        assert_eq!(grid.index_of(1005), Ok(1));
        assert_eq!(grid.index_of(1016), Ok(2));
    }

    #[test]
    fn test_grid_rejects_out_of_range() {
        let grid = PriceGrid::new(1000, 2000, 10).unwrap();
        assert_eq!(
            grid.index_of(999),
            Err(BookError::OutOfRange { price: 999, min: 1000, max: 2000 })
        );
        assert!(grid.index_of(2001).is_err());
    }

    #[test]
    fn test_grid_validation() {
        assert!(matches!(PriceGrid::new(0, 10, 0), Err(BookError::InvalidConfig(_))));
        assert!(matches!(PriceGrid::new(10, 0, 1), Err(BookError::InvalidConfig(_))));
        assert!(matches!(PriceGrid::new(0, u64::MAX, 1), Err(BookError::InvalidConfig(_))));
        assert_eq!(PriceGrid::new(5, 5, 1).unwrap().levels(), 1);
        assert!(PriceGrid::new(0, MAX_GRID_LEVELS as u64 - 1, 1).is_ok());
        assert!(matches!(
            PriceGrid::new(0, MAX_GRID_LEVELS as u64, 1),
            Err(BookError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_grid_top_point_stays_within_max_price() {
        // 15 is not a whole number of ticks above 0
        let grid = PriceGrid::new(0, 15, 10).unwrap();
        assert_eq!(grid.levels(), 2);
        assert_eq!(grid.price_of(grid.levels() - 1), 10);
        assert_eq!(grid.index_of(14), Ok(1));
        assert_eq!(
            grid.index_of(15),
            Err(BookError::OutOfRange { price: 15, min: 0, max: 15 })
        );

        let mut ladder = FixedLadder::new(grid);
        let mut arena = Arena::new(4);
        let idx = order(&mut arena, 1, Side::Buy, 10, 7);
        ladder.insert(&mut arena, Side::Buy, 1, idx);
        assert_eq!(ladder.best(Side::Buy), Some(1));
        assert_eq!(ladder.price_of(1), 10);
    }

    #[test]
    fn test_fixed_insert_activates_level() {
        let mut arena = Arena::new(10);
        let mut ladder = FixedLadder::new(grid());

        let key = ladder.key_of(10000).unwrap();
        let idx = order(&mut arena, 1, Side::Buy, 10000, 100);
        ladder.insert(&mut arena, Side::Buy, key, idx);

        assert_eq!(ladder.best(Side::Buy), Some(key));
        assert_eq!(ladder.best(Side::Sell), None);
        assert_eq!(ladder.price_of(key), 10000);
        assert_eq!(ladder.level(Side::Buy, key).unwrap().total_qty, 100);
        assert!(ladder.check_active_index().is_ok());
    }

    #[test]
    fn test_fixed_remove_deactivates_level() {
        let mut arena = Arena::new(10);
        let mut ladder = FixedLadder::new(grid());

        let key = ladder.key_of(10100).unwrap();
        let a = order(&mut arena, 1, Side::Sell, 10100, 40);
        let b = order(&mut arena, 2, Side::Sell, 10100, 60);
        ladder.insert(&mut arena, Side::Sell, key, a);
        ladder.insert(&mut arena, Side::Sell, key, b);

        assert!(!ladder.remove(&mut arena, Side::Sell, key, a));
        assert_eq!(ladder.active_count(Side::Sell), 1);
        assert!(ladder.remove(&mut arena, Side::Sell, key, b));
        assert_eq!(ladder.active_count(Side::Sell), 0);
        assert_eq!(ladder.best(Side::Sell), None);
        assert!(ladder.check_active_index().is_ok());
    }

    #[test]
    fn test_fixed_best_and_walk_order() {
        let mut arena = Arena::new(10);
        let mut ladder = FixedLadder::new(grid());

        for (id, price) in [(1, 9990), (2, 10010), (3, 10000)] {
            let idx = order(&mut arena, id, Side::Buy, price, 10);
            let key = ladder.key_of(price).unwrap();
            ladder.insert(&mut arena, Side::Buy, key, idx);
        }
        for (id, price) in [(4, 10030), (5, 10020)] {
            let idx = order(&mut arena, id, Side::Sell, price, 10);
            let key = ladder.key_of(price).unwrap();
            ladder.insert(&mut arena, Side::Sell, key, idx);
        }

        let bids: Vec<_> = ladder
            .active_levels(Side::Buy)
            .map(|(k, _)| ladder.price_of(k))
            .collect();
        assert_eq!(bids, vec![10010, 10000, 9990]);

        let asks: Vec<_> = ladder
            .active_levels(Side::Sell)
            .map(|(k, _)| ladder.price_of(k))
            .collect();
        assert_eq!(asks, vec![10020, 10030]);
    }

    #[test]
    fn test_fixed_clear() {
        let mut arena = Arena::new(10);
        let mut ladder = FixedLadder::new(grid());
        let idx = order(&mut arena, 1, Side::Buy, 9500, 10);
        let key = ladder.key_of(9500).unwrap();
        ladder.insert(&mut arena, Side::Buy, key, idx);

        ladder.clear();
        assert_eq!(ladder.best(Side::Buy), None);
        assert!(ladder.level(Side::Buy, key).unwrap().is_empty());
    }

    #[test]
    fn test_sparse_matches_fixed_contract() {
        let mut arena = Arena::new(10);
        let mut ladder = SparseLadder::new();

        let a = order(&mut arena, 1, Side::Sell, 1_000_000, 10);
        let b = order(&mut arena, 2, Side::Sell, 5, 10);
        ladder.insert(&mut arena, Side::Sell, 1_000_000, a);
        ladder.insert(&mut arena, Side::Sell, 5, b);

        assert_eq!(ladder.best(Side::Sell), Some(5));
        assert_eq!(ladder.active_count(Side::Sell), 2);

        assert!(ladder.remove(&mut arena, Side::Sell, 5, b));
        assert_eq!(ladder.best(Side::Sell), Some(1_000_000));
        assert!(ladder.level(Side::Sell, 5).is_none());
        assert!(ladder.check_active_index().is_ok());
    }
}
