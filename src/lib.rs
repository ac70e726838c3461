//! Fixed-capacity buddy allocator
//!
//! This crate implements a binary buddy allocator over a single contiguous
//! byte pool that is owned by the allocator itself, featuring:
//! - Compile-time pool size and alignment
//! - Intrusive per-order free lists stored inside the free blocks
//! - Buddy splitting on allocation and coalescing on free
//! - Order metadata kept in the byte just before every block, so `free`
//!   only needs the pointer
//!
//! The allocator never touches the system heap and is meant for embedded,
//! real-time or short-lived message buffer use.
//!
//! ```
//! use buddy_pool::BuddyAllocator;
//!
//! let pool = BuddyAllocator::<{ 1 << 14 }>::new();
//! let block = pool.alloc(100).unwrap();
//! assert_eq!(pool.usable_size(block.as_ptr()).unwrap(), 127);
//! pool.free(block.as_ptr()).unwrap();
//! ```

#![no_std]

#[cfg(test)]
extern crate alloc;

use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// A zero-byte request.
    ZeroSize,
    /// The request plus its order byte does not fit even the whole pool.
    Oversized,
    /// No free block large enough is left.
    NoMemory,
    /// Invalid layout parameter (e.g. alignment above the pool alignment).
    InvalidParam,
    /// Deallocate memory that is not a live block of this allocator.
    NotAllocated,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::ZeroSize => "zero-size request",
            Self::Oversized => "request exceeds pool capacity",
            Self::NoMemory => "pool exhausted",
            Self::InvalidParam => "invalid allocation parameter",
            Self::NotAllocated => "pointer is not a live allocation",
        };
        f.write_str(msg)
    }
}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// Byte-granularity allocator.
///
/// Both calls take `&self`: memory handed out stays owned by the allocator,
/// and a `&mut` borrow of it would assert exclusive access over blocks the
/// caller is still using.
pub trait ByteAllocator {
    /// Allocate memory with the given size (in bytes) and alignment.
    fn alloc(&self, layout: Layout) -> AllocResult<NonNull<u8>>;

    /// Deallocate memory at the given position, size, and alignment.
    fn dealloc(&self, pos: NonNull<u8>, layout: Layout);

    /// Returns total memory size in bytes.
    fn total_bytes(&self) -> usize;

    /// Returns allocated memory size in bytes.
    fn used_bytes(&self) -> usize;

    /// Returns available memory size in bytes.
    fn available_bytes(&self) -> usize;
}

/// Checks whether the offset has the demanded alignment.
///
/// Equivalent to `pos % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(pos: usize, align: usize) -> bool {
    pos & (align - 1) == 0
}

#[inline]
const fn align_down(pos: usize, align: usize) -> usize {
    pos & !(align - 1)
}

pub mod buddy;
#[cfg(feature = "tracking")]
pub use buddy::{BuddyStats, MemoryStatsReporter};
pub use buddy::{
    ceil_log2, required_order, Align1, Align1024, Align128, Align16, Align2, Align2048,
    Align256, Align32, Align4, Align4096, Align512, Align64, Align8, Alignment, BuddyAllocator,
    BuddyBlock, MIN_ORDER,
};
