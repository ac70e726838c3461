//! Buddy allocator module
//!
//! This module provides the fixed-capacity buddy system:
//! - Owned, aligned pool storage with per-block order metadata
//! - Intrusive free lists, one per order
//! - Optional statistics and failure reporting

pub mod buddy_allocator;
pub mod buddy_block;
mod free_list;
pub mod pool;
#[cfg(feature = "tracking")]
pub mod stats;

pub use buddy_allocator::BuddyAllocator;
pub use buddy_block::{ceil_log2, required_order, BuddyBlock, MIN_ORDER};
pub use pool::{
    Align1, Align1024, Align128, Align16, Align2, Align2048, Align256, Align32, Align4, Align4096,
    Align512, Align64, Align8, Alignment,
};
#[cfg(feature = "tracking")]
pub use stats::{BuddyStats, MemoryStatsReporter};
