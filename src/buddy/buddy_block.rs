//! Buddy block metadata
//!
//! Represents a block of the pool in the buddy system with order and offset
//! information, plus the size-class arithmetic shared by the allocator.

use core::mem::size_of;

use static_assertions::const_assert;

/// Smallest `n` such that `2^n >= value`.
pub const fn ceil_log2(value: usize) -> usize {
    if value <= 1 {
        0
    } else {
        (usize::BITS - (value - 1).leading_zeros()) as usize
    }
}

/// Smallest block order.
///
/// A free block holds a pointer-sized link, and every block gives up one byte
/// to the order metadata of the block that follows it.
pub const MIN_ORDER: usize = ceil_log2(size_of::<usize>() + 1);

/// Number of free list slots, one per order from `MIN_ORDER` up.
pub(crate) const ORDER_SLOTS: usize = usize::BITS as usize - MIN_ORDER;

const_assert!((1usize << MIN_ORDER) >= size_of::<usize>() + 1);
const_assert!(ORDER_SLOTS > 0);

/// Order of the block that serves a `size`-byte request.
///
/// One byte is added for the order metadata stored before the block. The
/// result may exceed the pool's maximum order; callers reject that.
pub const fn required_order(size: usize) -> usize {
    let order = ceil_log2(size.saturating_add(1));
    if order < MIN_ORDER {
        MIN_ORDER
    } else {
        order
    }
}

/// Buddy block metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuddyBlock {
    pub order: usize,
    /// Offset from the pool base.
    pub offset: usize,
}

impl BuddyBlock {
    /// Create a new buddy block
    pub const fn new(order: usize, offset: usize) -> Self {
        Self { order, offset }
    }

    /// Block size in bytes
    pub const fn size(&self) -> usize {
        1 << self.order
    }

    /// Offset of the same-order block this one merges with.
    /// For a block at order k with offset D, its buddy is at D ^ 2^k
    pub const fn buddy_offset(&self) -> usize {
        self.offset ^ self.size()
    }

    /// The block obtained by merging with the buddy.
    pub const fn parent(&self) -> Self {
        Self::new(self.order + 1, self.offset & !self.size())
    }

    pub const fn end(&self) -> usize {
        self.offset + self.size()
    }
}
