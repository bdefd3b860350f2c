//! # Tick-LOB
//!
//! A single-instrument limit order book with price-time priority matching.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: One thread owns the book exclusively (no locks)
//! - **Arena Allocation**: Orders live in a fixed slab; no heap churn per order
//! - **Tick Ladder**: Price levels are found by index arithmetic over a
//!   bounded grid, best prices from per-side sets of active levels
//! - **Handles, not pointers**: The order index and level queues refer to
//!   orders by `u32` arena slot
//!
//! ## Architecture
//!
//! ```text
//! [Producer Thread] --> [SPSC Ring Buffer] --> [Engine Thread (Pinned)]
//!                                                     |
//!                                              [Output Events]
//! ```

pub mod arena;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod ladder;
pub mod matching;
pub mod order_book;
pub mod price_level;

// Re-exports for convenience
pub use arena::{Arena, ArenaIndex, OrderNode, NULL_INDEX};
pub use command::{
    BookUpdate, CancelOrder, Command, Fill, ModifyOrder, NewOrder, OutputEvent, RejectReason, Side,
};
pub use config::{BookConfig, LadderKind};
pub use engine::Engine;
pub use error::{BookError, BookResult};
pub use ladder::{FixedLadder, Ladder, PriceGrid, SparseLadder, MAX_GRID_LEVELS};
pub use matching::{BookSnapshot, LevelView, MatchingEngine, ModifyOutcome, OrderView, SubmitOutcome};
pub use order_book::OrderBook;
pub use price_level::PriceLevel;
