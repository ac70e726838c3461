//! Statistics and debugging for buddy allocator
//!
//! Provides per-order free block statistics and failure reporting.

/// Orders a `usize` offset can express; stats are indexed by raw order.
const ORDERS: usize = usize::BITS as usize;

/// Buddy pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuddyStats {
    pub total_bytes: usize,
    pub free_bytes: usize,
    pub used_bytes: usize,
    pub free_blocks_by_order: [usize; ORDERS],
}

impl Default for BuddyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BuddyStats {
    pub const fn new() -> Self {
        Self {
            total_bytes: 0,
            free_bytes: 0,
            used_bytes: 0,
            free_blocks_by_order: [0; ORDERS],
        }
    }

    /// Size of the largest free block, or 0 when the pool is exhausted
    pub fn largest_free_block(&self) -> usize {
        self.free_blocks_by_order
            .iter()
            .rposition(|&count| count > 0)
            .map_or(0, |order| 1 << order)
    }
}

/// Detailed memory statistics reporter
pub struct MemoryStatsReporter;

impl MemoryStatsReporter {
    /// Print detailed allocation failure statistics
    /// This is a standalone function to keep allocation logic clean
    #[allow(unused_variables)]
    pub fn print_alloc_failure_stats(stats: &BuddyStats, request_size: usize, order: usize) {
        #[cfg(feature = "log")]
        use log::error;
        error!("========================================");
        error!(
            "Request: {} bytes (order {}, {} byte block)",
            request_size,
            order,
            1usize << order
        );
        error!(
            "  Pool: {} bytes, {} free, {} used",
            stats.total_bytes, stats.free_bytes, stats.used_bytes
        );
        error!("  Free blocks by order:");

        for (order, &count) in stats.free_blocks_by_order.iter().enumerate().rev() {
            if count > 0 {
                error!(
                    "    Order {}: {} blocks ({} bytes each, {} bytes total)",
                    order,
                    count,
                    1usize << order,
                    count << order
                );
            }
        }
        error!("========================================");
    }
}
