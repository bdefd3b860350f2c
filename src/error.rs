//! Error types for book operations.

use thiserror::Error;

/// Everything that can go wrong at the book boundary.
///
/// None of these leave the book partially mutated: validation always runs
/// before the first write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    /// Cancel/modify referenced an id that is not live.
    #[error("order {0} not found")]
    NotFound(u64),

    /// Submit reused the id of an order that is still live.
    #[error("order {0} is already live")]
    DuplicateOrderId(u64),

    /// Submitted quantity was zero, or a modify target does not fit a `u32`.
    #[error("invalid quantity {qty} for order {order_id}")]
    InvalidQuantity { order_id: u64, qty: i64 },

    /// Price falls outside the configured ladder.
    #[error("price {price} outside ladder range [{min}, {max}]")]
    OutOfRange { price: u64, min: u64, max: u64 },

    /// The arena has no free slot left.
    #[error("order pool exhausted (capacity {capacity})")]
    PoolExhausted { capacity: u32 },

    /// Ladder or book configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

pub type BookResult<T> = std::result::Result<T, BookError>;

impl From<serde_json::Error> for BookError {
    fn from(err: serde_json::Error) -> Self {
        BookError::Config(err.to_string())
    }
}

impl From<std::io::Error> for BookError {
    fn from(err: std::io::Error) -> Self {
        BookError::Config(err.to_string())
    }
}
