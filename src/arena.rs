//! Order Allocator - fixed-capacity slab with a LIFO free-slot stack.
//!
//! All live orders sit in one contiguous block sized at startup. Handing out
//! and reclaiming slots is pure index bookkeeping, so the hot path never
//! touches the system allocator.

use std::fmt;

use crate::command::Side;
use crate::error::{BookError, BookResult};

/// Sentinel value representing a null/invalid index (like nullptr)
pub const NULL_INDEX: u32 = u32::MAX;

/// Type alias for arena indices - our "compressed pointers".
///
/// The order index and the level queues only ever hold these handles;
/// the arena is the sole owner of the order data.
pub type ArenaIndex = u32;

/// A single order in the book - exactly 64 bytes (one cache line).
///
/// # Memory Layout
///
/// | Field      | Type    | Offset | Size |
/// |------------|---------|--------|------|
/// | price      | u64     | 0      | 8    |
/// | order_id   | u64     | 8      | 8    |
/// | qty        | u32     | 16     | 4    |
/// | next       | u32     | 20     | 4    |
/// | prev       | u32     | 24     | 4    |
/// | side       | Side    | 28     | 1    |
/// | in_use     | bool    | 29     | 1    |
/// | _reserved  | [u8;34] | 30     | 34   |
/// | **Total**  |         |        | 64   |
#[repr(C)]
#[repr(align(64))]
#[derive(Clone, Copy)]
pub struct OrderNode {
    // === Hot Data (frequently accessed during matching) ===

    /// Fixed-point price, immutable once admitted
    pub price: u64,

    /// External order ID, immutable once admitted
    pub order_id: u64,

    /// Remaining quantity; only the matching engine writes this
    pub qty: u32,

    // === Linkage (FIFO queue pointers within a PriceLevel) ===

    /// Index of next order at same price level
    pub next: ArenaIndex,

    /// Index of previous order (enables O(1) cancel)
    pub prev: ArenaIndex,

    /// Order side, immutable once admitted
    pub side: Side,

    /// Set while the slot is handed out
    in_use: bool,

    pub _reserved: [u8; 34],
}

const _: () = assert!(
    std::mem::size_of::<OrderNode>() == 64,
    "OrderNode must be exactly 64 bytes (one cache line)"
);

const _: () = assert!(
    std::mem::align_of::<OrderNode>() == 64,
    "OrderNode must be 64-byte aligned"
);

impl OrderNode {
    /// Create an empty/uninitialized node (for the free stack)
    #[inline]
    pub const fn empty() -> Self {
        Self {
            price: 0,
            order_id: 0,
            qty: 0,
            next: NULL_INDEX,
            prev: NULL_INDEX,
            side: Side::Buy,
            in_use: false,
            _reserved: [0u8; 34],
        }
    }

    /// Fill a freshly allocated slot. Linkage is left detached.
    #[inline]
    pub fn init(&mut self, order_id: u64, side: Side, price: u64, qty: u32) {
        self.order_id = order_id;
        self.side = side;
        self.price = price;
        self.qty = qty;
        self.next = NULL_INDEX;
        self.prev = NULL_INDEX;
    }

    /// Whether the slot is currently handed out
    #[inline]
    pub fn is_live(&self) -> bool {
        self.in_use
    }
}

impl fmt::Debug for OrderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderNode")
            .field("order_id", &self.order_id)
            .field("side", &self.side)
            .field("price", &self.price)
            .field("qty", &self.qty)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish()
    }
}

/// Pre-allocated order pool with O(1) allocation and deallocation.
///
/// Reclaimed slot indices go on a stack and are handed out again LIFO,
/// which keeps recently touched cache lines hot.
pub struct Arena {
    /// Contiguous block of pre-allocated nodes
    nodes: Vec<OrderNode>,

    /// Free slot indices; top of the stack is the next slot handed out
    free: Vec<ArenaIndex>,

    /// Total capacity
    capacity: u32,
}

impl Arena {
    /// Create a new arena with the specified capacity.
    ///
    /// # Panics
    /// Panics if capacity is not below `NULL_INDEX` (reserved as the null handle)
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < NULL_INDEX, "Capacity must be less than NULL_INDEX");

        let nodes = vec![OrderNode::empty(); capacity as usize];

        // Reverse order so slot 0 sits on top of the stack
        let free: Vec<ArenaIndex> = (0..capacity).rev().collect();

        Self { nodes, free, capacity }
    }

    /// Take a slot from the free stack.
    ///
    /// # Errors
    /// `BookError::PoolExhausted` when every slot is in use.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn alloc(&mut self) -> BookResult<ArenaIndex> {
        let index = self.free.pop().ok_or(BookError::PoolExhausted {
            capacity: self.capacity,
        })?;

        let node = &mut self.nodes[index as usize];
        node.in_use = true;
        node.next = NULL_INDEX;
        node.prev = NULL_INDEX;

        Ok(index)
    }

    /// Return a slot to the free stack.
    ///
    /// The caller must ensure nothing (order index, level queue) still
    /// refers to `index`.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn free(&mut self, index: ArenaIndex) {
        debug_assert!(index < self.capacity, "Index out of bounds");
        debug_assert!(self.nodes[index as usize].in_use, "Double free detected");

        self.nodes[index as usize] = OrderNode::empty();
        self.free.push(index);
    }

    /// Get an immutable reference to a node.
    #[inline]
    pub fn get(&self, index: ArenaIndex) -> &OrderNode {
        debug_assert!(index < self.capacity, "Index out of bounds");
        &self.nodes[index as usize]
    }

    /// Get a mutable reference to a node.
    #[inline]
    pub fn get_mut(&mut self, index: ArenaIndex) -> &mut OrderNode {
        debug_assert!(index < self.capacity, "Index out of bounds");
        &mut self.nodes[index as usize]
    }

    /// Returns the number of currently allocated nodes.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.capacity - self.free.len() as u32
    }

    /// Returns the total capacity of the arena.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns true if no slot is handed out.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.free.len() as u32 == self.capacity
    }

    /// Returns true if no free slot remains.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Pre-fault all memory pages (warm-up routine).
    ///
    /// Walks through all nodes to force the OS to map virtual pages
    /// to physical RAM, preventing page faults in the hot path.
    pub fn warm_up(&mut self) {
        for node in &mut self.nodes {
            // Volatile write so the touch is not optimized away
            unsafe {
                std::ptr::write_volatile(&mut node._reserved[0], 0);
            }
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocated())
            .finish()
    }
}
