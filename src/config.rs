//! Construction-time configuration for a book.
//!
//! Prices inside the engine are fixed-point integers. `price_scale` says how
//! many fixed-point units make one quoted unit (100 for cents).

use std::path::Path;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

use crate::arena::NULL_INDEX;
use crate::error::{BookError, BookResult};
use crate::ladder::PriceGrid;

/// Which [`Ladder`](crate::ladder::Ladder) layout to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LadderKind {
    /// Dense array over a bounded tick grid
    #[default]
    Fixed,
    /// Ordered map keyed by price, unbounded
    Sparse,
}

/// Book configuration.
///
/// ```json
/// { "capacity": 100000, "ladder": "fixed",
///   "min_price": 0, "max_price": 1000000, "tick_size": 1, "price_scale": 100 }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Maximum number of simultaneously live orders
    pub capacity: u32,
    pub ladder: LadderKind,
    /// Lowest tradable price, fixed-point
    pub min_price: u64,
    /// Highest tradable price, fixed-point
    pub max_price: u64,
    /// Minimum price increment, fixed-point
    pub tick_size: u64,
    /// Fixed-point units per quoted unit
    pub price_scale: u64,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            ladder: LadderKind::Fixed,
            min_price: 0,
            max_price: 1_000_000,
            tick_size: 1,
            price_scale: 100,
        }
    }
}

impl BookConfig {
    /// Fixed ladder over `[min_price, max_price]` with the given tick.
    pub fn fixed(capacity: u32, min_price: u64, max_price: u64, tick_size: u64) -> Self {
        Self {
            capacity,
            ladder: LadderKind::Fixed,
            min_price,
            max_price,
            tick_size,
            ..Self::default()
        }
    }

    /// Sparse ladder; the price bounds are ignored by the book.
    pub fn sparse(capacity: u32) -> Self {
        Self {
            capacity,
            ladder: LadderKind::Sparse,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> BookResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> BookResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> BookResult<()> {
        if self.capacity == 0 {
            return Err(BookError::InvalidConfig("capacity must be positive".into()));
        }
        if self.capacity >= NULL_INDEX {
            return Err(BookError::InvalidConfig(format!(
                "capacity {} must be below {}",
                self.capacity, NULL_INDEX
            )));
        }
        if self.price_scale == 0 {
            return Err(BookError::InvalidConfig("price scale must be positive".into()));
        }
        if self.ladder == LadderKind::Fixed {
            self.price_grid()?;
        }
        Ok(())
    }

    pub fn price_grid(&self) -> BookResult<PriceGrid> {
        PriceGrid::new(self.min_price, self.max_price, self.tick_size)
    }

    /// Convert a quoted decimal price into fixed-point units.
    ///
    /// Rounds half away from zero to the nearest unit.
    ///
    /// # Errors
    /// `BookError::InvalidConfig` for negative prices or ones that overflow `u64`.
    pub fn to_fixed_price(&self, quote: Decimal) -> BookResult<u64> {
        if quote.is_sign_negative() && !quote.is_zero() {
            return Err(BookError::InvalidConfig(format!("negative price {}", quote)));
        }
        quote
            .checked_mul(Decimal::from(self.price_scale))
            .map(|d| d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|d| d.to_u64())
            .ok_or_else(|| BookError::InvalidConfig(format!("price {} not representable", quote)))
    }

    /// Convert a fixed-point price back into a quoted decimal.
    pub fn to_quote(&self, price: u64) -> Decimal {
        Decimal::from(price) / Decimal::from(self.price_scale)
    }
}
