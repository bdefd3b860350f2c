//! Command and Event types for the matching engine.
//!
//! Commands are the inbound operations (submit, cancel, modify).
//! Events are what the engine reports back for each command.

use crate::error::BookError;

/// Order side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    #[default]
    Buy = 0,
    /// Sell side (asks)
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

// ============================================================================
// Input Commands
// ============================================================================

/// Submit a new limit order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewOrder {
    /// Client-assigned order ID, unique among live orders
    pub order_id: u64,
    /// Order side
    pub side: Side,
    /// Fixed-point price (e.g., $100.50 -> 10050 at a scale of 100)
    pub price: u64,
    /// Order quantity, must be positive
    pub qty: u32,
}

impl NewOrder {
    pub const fn new(order_id: u64, side: Side, price: u64, qty: u32) -> Self {
        Self { order_id, side, price, qty }
    }

    pub const fn buy(order_id: u64, price: u64, qty: u32) -> Self {
        Self::new(order_id, Side::Buy, price, qty)
    }

    pub const fn sell(order_id: u64, price: u64, qty: u32) -> Self {
        Self::new(order_id, Side::Sell, price, qty)
    }
}

/// Cancel an existing order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancelOrder {
    /// Order ID to cancel
    pub order_id: u64,
}

/// Change the quantity of a resting order in place.
///
/// A non-positive `new_qty` cancels the order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModifyOrder {
    pub order_id: u64,
    pub new_qty: i64,
}

/// Inbound commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Submit(NewOrder),
    Cancel(CancelOrder),
    Modify(ModifyOrder),
}

// ============================================================================
// Output Events
// ============================================================================

/// A trade was executed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fill {
    /// Execution price (the resting order's level)
    pub price: u64,
    /// Executed quantity
    pub qty: u32,
    /// Maker (resting) order ID
    pub maker_order_id: u64,
    /// Taker (incoming) order ID
    pub taker_order_id: u64,
    /// Side of the taker order
    pub taker_side: Side,
}

/// Order book level update (Level 2 market data)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookUpdate {
    /// Which side changed
    pub side: Side,
    /// Price level that changed
    pub price: u64,
    /// New total quantity at this price (0 = level removed)
    pub new_qty: u64,
    /// New order count at this price
    pub new_count: u32,
}

/// Order residual is resting in the book
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderAccepted {
    pub order_id: u64,
    pub price: u64,
    /// Quantity left after matching
    pub qty: u32,
    pub side: Side,
}

/// Incoming order was fully consumed while matching and never rested
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderFilled {
    pub order_id: u64,
    pub filled_qty: u32,
}

/// Order was canceled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderCanceled {
    pub order_id: u64,
    /// Remaining quantity that was canceled
    pub canceled_qty: u32,
}

/// Order quantity was changed in place
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderModified {
    pub order_id: u64,
    pub old_qty: u32,
    pub new_qty: u32,
}

/// Command was rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderRejected {
    pub order_id: u64,
    pub reason: RejectReason,
}

/// Reasons for rejection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RejectReason {
    /// Order ID already live
    DuplicateOrderId = 0,
    /// Order not found (for cancel/modify)
    OrderNotFound = 1,
    /// Arena is full
    PoolExhausted = 2,
    /// Price outside the ladder
    PriceOutOfRange = 3,
    /// Invalid quantity
    InvalidQuantity = 4,
    /// Anything that is not an order-level problem
    Internal = 5,
}

impl From<&BookError> for RejectReason {
    fn from(err: &BookError) -> Self {
        match err {
            BookError::NotFound(_) => RejectReason::OrderNotFound,
            BookError::DuplicateOrderId(_) => RejectReason::DuplicateOrderId,
            BookError::InvalidQuantity { .. } => RejectReason::InvalidQuantity,
            BookError::OutOfRange { .. } => RejectReason::PriceOutOfRange,
            BookError::PoolExhausted { .. } => RejectReason::PoolExhausted,
            BookError::InvalidConfig(_) | BookError::Config(_) => RejectReason::Internal,
        }
    }
}

/// Output events from the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputEvent {
    /// Trade executed
    Trade(Fill),
    /// Book level changed
    BookDelta(BookUpdate),
    /// Order residual resting
    Accepted(OrderAccepted),
    /// Order fully filled on arrival
    Filled(OrderFilled),
    /// Order canceled
    Canceled(OrderCanceled),
    /// Order quantity changed
    Modified(OrderModified),
    /// Command rejected
    Rejected(OrderRejected),
}
