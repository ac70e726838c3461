//! Fixed-capacity buddy allocator
//!
//! Serves variable-size requests from a pool embedded in the allocator.
//! Requests are rounded up to a power-of-two block that also covers the order
//! byte kept just before the returned address. Larger free blocks are split
//! on demand and freed blocks are coalesced with their buddies.
//!
//! Policy: the free lists are searched first-fit ascending by order, blocks
//! are inserted at the head of their list, and a split keeps the lower half.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::{align_down, is_aligned, AllocError, AllocResult, ByteAllocator};

#[cfg(feature = "log")]
use log::{debug, error, trace, warn};

#[cfg(feature = "tracking")]
use super::stats::{BuddyStats, MemoryStatsReporter};

use static_assertions::{assert_impl_all, assert_not_impl_any};

use super::{
    buddy_block::{required_order, BuddyBlock, MIN_ORDER, ORDER_SLOTS},
    free_list::FreeList,
    pool::{Align8, Alignment, Pool},
};

/// Binary buddy allocator over an owned pool of `POOL_SIZE` bytes.
///
/// `POOL_SIZE` must be a power of two holding at least one minimum block;
/// anything else fails to compile. `A` sets the pool alignment.
///
/// Returned pointers point into the allocator itself. The allocator must not
/// be moved or dropped while any block is outstanding. Every operation takes
/// `&self`, so a block stays writable across later `alloc` and `free` calls.
/// The pool and the list heads use interior mutability, which makes the
/// allocator `Send` but not `Sync`; wrap it in a mutex to share it.
///
/// `free` rejects pointers it can prove are not live blocks, but it cannot
/// tell a block start from an interior pointer that happens to be aligned to
/// some order whose preceding byte holds a plausible order. Freeing such a
/// pointer corrupts the pool.
pub struct BuddyAllocator<const POOL_SIZE: usize, A: Alignment = Align8> {
    /// Free lists for each order, starting at `MIN_ORDER`
    free_lists: [FreeList; ORDER_SLOTS],
    pool: Pool<POOL_SIZE, A>,
}

assert_impl_all!(BuddyAllocator<256>: Send);
assert_not_impl_any!(BuddyAllocator<256>: Sync);

impl<const POOL_SIZE: usize, A: Alignment> BuddyAllocator<POOL_SIZE, A> {
    /// Smallest block order.
    pub const MIN_ORDER: usize = MIN_ORDER;
    /// Order of the whole pool.
    pub const MAX_ORDER: usize = POOL_SIZE.trailing_zeros() as usize;
    pub const POOL_SIZE: usize = POOL_SIZE;
    pub const ALIGNMENT: usize = A::ALIGN;

    const VALID_GEOMETRY: () = {
        assert!(POOL_SIZE.is_power_of_two(), "pool size must be a power of two");
        assert!(
            POOL_SIZE >= 1 << MIN_ORDER,
            "pool must hold at least one minimum-order block"
        );
    };

    /// Create an allocator whose pool is a single free block.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_GEOMETRY;

        let mut free_lists = [const { FreeList::new() }; ORDER_SLOTS];
        // The pool starts zeroed, which reads as an empty link.
        free_lists[Self::MAX_ORDER - MIN_ORDER] = FreeList::with_zeroed_block(0);
        Self {
            free_lists,
            pool: Pool::new(),
        }
    }

    fn list(&self, order: usize) -> &FreeList {
        &self.free_lists[order - MIN_ORDER]
    }

    /// Allocate a block able to hold `size` bytes.
    ///
    /// The block is the smallest power of two of at least `size + 1` bytes
    /// and at least `2^MIN_ORDER` bytes.
    pub fn alloc(&self, size: usize) -> AllocResult<NonNull<u8>> {
        if size == 0 {
            warn!("buddy: zero-size allocation request");
            return Err(AllocError::ZeroSize);
        }

        let order = required_order(size);
        if order > Self::MAX_ORDER {
            warn!(
                "buddy: request of {} bytes needs order {}, max order: {}",
                size,
                order,
                Self::MAX_ORDER
            );
            return Err(AllocError::Oversized);
        }

        self.alloc_order(order, size)
    }

    /// Take a block of exactly `order`, splitting a larger one if needed.
    fn alloc_order(&self, order: usize, request_size: usize) -> AllocResult<NonNull<u8>> {
        let Some(mut block) = self.take_first_fit(order) else {
            debug!(
                "buddy: pool exhausted for {} bytes (order {})",
                request_size, order
            );
            #[cfg(feature = "tracking")]
            MemoryStatsReporter::print_alloc_failure_stats(&self.stats(), request_size, order);
            return Err(AllocError::NoMemory);
        };

        // Split down to required order, freeing the upper halves
        while block.order > order {
            block.order -= 1;
            let buddy = block.buddy_offset();
            trace!("buddy: split, order {} buddy at {:#x}", block.order, buddy);
            self.list(block.order).push_front(&self.pool, buddy);
        }

        self.pool.set_order_byte(block.offset, order as u8);
        Ok(self.pool.ptr_at(block.offset))
    }

    /// Pop the head of the first non-empty free list at or above `order`.
    fn take_first_fit(&self, order: usize) -> Option<BuddyBlock> {
        for index in order..=Self::MAX_ORDER {
            if let Some(offset) = self.list(index).pop_front(&self.pool) {
                return Some(BuddyBlock::new(index, offset));
            }
        }
        None
    }

    /// Return a block to the pool, merging it with free buddies.
    ///
    /// A null pointer is a no-op. Pointers that are provably not live blocks
    /// of this allocator are rejected with [`AllocError::NotAllocated`] and
    /// leave the allocator untouched.
    pub fn free(&self, ptr: *mut u8) -> AllocResult {
        if ptr.is_null() {
            return Ok(());
        }

        let block = self.live_block(ptr)?;
        self.release(block);
        Ok(())
    }

    /// Insert `block` into the free lists, coalescing as far as possible.
    fn release(&self, mut block: BuddyBlock) {
        while block.order < Self::MAX_ORDER {
            let buddy = block.buddy_offset();
            if !self.list(block.order).remove(&self.pool, buddy) {
                break;
            }
            trace!(
                "buddy: merge {:#x} with {:#x} at order {}",
                block.offset,
                buddy,
                block.order
            );
            block = block.parent();
        }

        self.list(block.order).push_front(&self.pool, block.offset);
    }

    /// Resolve `ptr` to the live block it starts, validating its metadata
    ///
    /// An interior pointer aligned to some order passes when the byte before
    /// it holds that order and no free block overlaps; it cannot be told apart
    /// from a block start.
    fn live_block(&self, ptr: *const u8) -> AllocResult<BuddyBlock> {
        let Some(offset) = self.pool.offset_of(ptr) else {
            error!(
                "buddy: pointer {:p} outside pool [{:p}, +{:#x})",
                ptr,
                self.pool.base(),
                POOL_SIZE
            );
            return Err(AllocError::NotAllocated);
        };

        let order = self.pool.order_byte(offset) as usize;
        if !(MIN_ORDER..=Self::MAX_ORDER).contains(&order) {
            error!("buddy: block at {:#x} has invalid order byte {}", offset, order);
            return Err(AllocError::NotAllocated);
        }

        let block = BuddyBlock::new(order, offset);
        if !is_aligned(offset, block.size()) {
            error!(
                "buddy: block at {:#x} is not aligned for order {}",
                offset, order
            );
            return Err(AllocError::NotAllocated);
        }

        // 1. Descendant check: no free block may start inside a live block
        for index in MIN_ORDER..order {
            if self
                .list(index)
                .has_block_in_range(&self.pool, block.offset, block.end())
            {
                warn!(
                    "buddy: double free (descendant) at order {} in [{:#x}, {:#x})",
                    index,
                    block.offset,
                    block.end()
                );
                return Err(AllocError::NotAllocated);
            }
        }

        // 2. Ancestor check: neither the block nor an enclosing block is free
        for index in order..=Self::MAX_ORDER {
            let base = align_down(offset, 1 << index);
            if self.list(index).contains(&self.pool, base) {
                warn!(
                    "buddy: double free at {:#x} (found at order {})",
                    offset, index
                );
                return Err(AllocError::NotAllocated);
            }
        }

        Ok(block)
    }

    /// Order of the live block starting at `ptr`
    pub fn order_of(&self, ptr: *const u8) -> AllocResult<usize> {
        self.live_block(ptr).map(|block| block.order)
    }

    /// Bytes a caller may use from `ptr`; the last byte of every block holds
    /// the order of the block after it.
    pub fn usable_size(&self, ptr: *const u8) -> AllocResult<usize> {
        self.live_block(ptr).map(|block| block.size() - 1)
    }

    /// Whether `ptr` points into this allocator's pool
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.pool.offset_of(ptr).is_some()
    }

    /// Address of the first pool byte
    pub fn pool_base(&self) -> *const u8 {
        self.pool.base()
    }

    /// Get the number of free blocks of a specific order
    pub fn free_block_count(&self, order: usize) -> usize {
        if (MIN_ORDER..=Self::MAX_ORDER).contains(&order) {
            self.list(order).len(&self.pool)
        } else {
            0
        }
    }

    /// Get free blocks of a specific order as pool offsets, most recently
    /// freed first
    pub fn free_blocks_by_order(&self, order: usize) -> impl Iterator<Item = usize> + '_ {
        (MIN_ORDER..=Self::MAX_ORDER)
            .contains(&order)
            .then(|| self.list(order).iter(&self.pool))
            .into_iter()
            .flatten()
    }

    /// Free bytes across all orders
    pub fn free_bytes(&self) -> usize {
        (MIN_ORDER..=Self::MAX_ORDER)
            .map(|order| self.list(order).len(&self.pool) << order)
            .sum()
    }

    /// Get statistics for this pool
    #[cfg(feature = "tracking")]
    pub fn stats(&self) -> BuddyStats {
        let mut stats = BuddyStats::new();
        stats.total_bytes = POOL_SIZE;

        for order in MIN_ORDER..=Self::MAX_ORDER {
            let block_count = self.list(order).len(&self.pool);
            stats.free_blocks_by_order[order] = block_count;
            stats.free_bytes += block_count << order;
        }

        stats.used_bytes = stats.total_bytes - stats.free_bytes;
        stats
    }
}

impl<const POOL_SIZE: usize, A: Alignment> Default for BuddyAllocator<POOL_SIZE, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const POOL_SIZE: usize, A: Alignment> ByteAllocator for BuddyAllocator<POOL_SIZE, A> {
    fn alloc(&self, layout: Layout) -> AllocResult<NonNull<u8>> {
        if layout.size() == 0 {
            return Err(AllocError::ZeroSize);
        }
        if layout.align() > A::ALIGN {
            warn!(
                "buddy: alignment {:#x} exceeds pool alignment {:#x}",
                layout.align(),
                A::ALIGN
            );
            return Err(AllocError::InvalidParam);
        }

        // Blocks are aligned to their own size relative to an aligned base.
        let align_order = layout.align().trailing_zeros() as usize;
        let order = required_order(layout.size()).max(align_order);
        if order > Self::MAX_ORDER {
            return Err(AllocError::Oversized);
        }

        self.alloc_order(order, layout.size())
    }

    #[allow(unused_variables)]
    fn dealloc(&self, pos: NonNull<u8>, layout: Layout) {
        if let Err(err) = self.free(pos.as_ptr()) {
            error!(
                "buddy: dealloc of {:p} ({} bytes) failed: {}",
                pos,
                layout.size(),
                err
            );
        }
    }

    fn total_bytes(&self) -> usize {
        POOL_SIZE
    }

    fn used_bytes(&self) -> usize {
        POOL_SIZE - self.free_bytes()
    }

    fn available_bytes(&self) -> usize {
        self.free_bytes()
    }
}
