//! Integration tests for the buddy pool
//!
//! Exercises the public surface: size classes, boundary rejections,
//! layout-based allocation and pool alignment.

use buddy_pool::{
    required_order, Align4096, AllocError, BuddyAllocator, ByteAllocator, MIN_ORDER,
};
use core::alloc::Layout;

const MAX_ORDER: usize = 14;
const POOL_SIZE: usize = 1 << MAX_ORDER; // 16KB

type Pool = BuddyAllocator<POOL_SIZE>;

#[test]
fn test_constants() {
    assert_eq!(Pool::MAX_ORDER, MAX_ORDER);
    assert_eq!(Pool::MIN_ORDER, MIN_ORDER);
    assert_eq!(Pool::POOL_SIZE, POOL_SIZE);
    assert_eq!(Pool::ALIGNMENT, 8);
    assert!((1usize << MIN_ORDER) > core::mem::size_of::<usize>());
}

#[test]
fn test_const_construction() {
    let pool = const { BuddyAllocator::<256>::new() };
    assert_eq!(pool.free_block_count(8), 1);
    let block = pool.alloc(255).unwrap();
    assert_eq!(pool.usable_size(block.as_ptr()), Ok(255));
}

#[test]
fn test_boundary_rejections() {
    let pool = Pool::new();
    assert_eq!(pool.alloc(0), Err(AllocError::ZeroSize));
    assert_eq!(pool.alloc(POOL_SIZE), Err(AllocError::Oversized));
    assert_eq!(pool.free(core::ptr::null_mut()), Ok(()));

    // Nothing above changed the pool.
    assert_eq!(pool.free_bytes(), POOL_SIZE);
    assert!(pool.alloc(POOL_SIZE - 1).is_ok());
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_size_classes_on_64bit() {
    let pool = Pool::new();

    let one = pool.alloc(1).unwrap();
    let fifteen = pool.alloc(15).unwrap();
    let sixteen = pool.alloc(16).unwrap();

    assert_eq!(pool.order_of(one.as_ptr()), Ok(4));
    assert_eq!(pool.order_of(fifteen.as_ptr()), Ok(4));
    assert_eq!(pool.order_of(sixteen.as_ptr()), Ok(5));
    assert_eq!(pool.usable_size(sixteen.as_ptr()), Ok(31));
}

#[test]
fn test_pointers_lie_within_pool() {
    let pool = Pool::new();
    let base = pool.pool_base() as usize;

    for size in [1, 7, 100, 1000, 4000] {
        let ptr = pool.alloc(size).unwrap();
        let addr = ptr.as_ptr() as usize;
        assert!(pool.contains(ptr.as_ptr()));
        assert!(addr >= base && addr + size < base + POOL_SIZE);
        assert_eq!((addr - base) % (1 << required_order(size)), 0);
    }
}

/// A block stays readable and writable while other blocks come and go.
///
/// Run under Miri (`cargo +nightly miri test`) to check that no later call
/// invalidates the pointer; both Stacked Borrows and Tree Borrows apply.
#[test]
fn test_block_stays_valid_across_calls() {
    let pool = Pool::new();
    let a = pool.alloc(100).unwrap();
    unsafe { a.as_ptr().write_bytes(0xA5, 100) };

    let mut others = Vec::new();
    for size in [1, 30, 200, 15, 1000] {
        others.push(pool.alloc(size).unwrap());
    }
    for ptr in others.drain(..).rev() {
        pool.free(ptr.as_ptr()).unwrap();
    }
    let layout = Layout::from_size_align(40, 8).unwrap();
    let via_layout = ByteAllocator::alloc(&pool, layout).unwrap();
    pool.dealloc(via_layout, layout);

    for i in 0..100 {
        assert_eq!(unsafe { a.as_ptr().add(i).read() }, 0xA5);
    }
    unsafe { a.as_ptr().write_bytes(0x3C, 100) };
    assert_eq!(unsafe { a.as_ptr().add(99).read() }, 0x3C);

    pool.free(a.as_ptr()).unwrap();
    assert_eq!(pool.free_bytes(), POOL_SIZE);
}

#[test]
fn test_free_rejects_foreign_pointer() {
    let pool = Pool::new();
    let other = Pool::new();
    let foreign = other.alloc(10).unwrap();

    assert_eq!(pool.free(foreign.as_ptr()), Err(AllocError::NotAllocated));
    assert_eq!(pool.order_of(foreign.as_ptr()), Err(AllocError::NotAllocated));
    assert_eq!(other.free(foreign.as_ptr()), Ok(()));
}

#[test]
fn test_byte_allocator_layout() {
    let pool = Pool::new();
    assert_eq!(pool.total_bytes(), POOL_SIZE);
    assert_eq!(pool.available_bytes(), POOL_SIZE);

    let layout = Layout::from_size_align(24, 8).unwrap();
    let ptr = ByteAllocator::alloc(&pool, layout).unwrap();
    assert_eq!(pool.used_bytes(), 1 << required_order(24));

    // Minimum blocks already satisfy the pool alignment.
    let aligned = Layout::from_size_align(1, 8).unwrap();
    let aligned_ptr = ByteAllocator::alloc(&pool, aligned).unwrap();
    assert_eq!(aligned_ptr.as_ptr() as usize % 8, 0);

    pool.dealloc(ptr, layout);
    pool.dealloc(aligned_ptr, aligned);
    assert_eq!(pool.used_bytes(), 0);
    assert_eq!(pool.free_block_count(MAX_ORDER), 1);
}

#[test]
fn test_byte_allocator_rejects_excess_alignment() {
    let pool = Pool::new();
    let layout = Layout::from_size_align(16, 64).unwrap();
    assert_eq!(
        ByteAllocator::alloc(&pool, layout),
        Err(AllocError::InvalidParam)
    );
    let empty = Layout::from_size_align(0, 1).unwrap();
    assert_eq!(ByteAllocator::alloc(&pool, empty), Err(AllocError::ZeroSize));
}

#[test]
fn test_page_aligned_pool() {
    let pool = Box::new(BuddyAllocator::<{ 1 << 13 }, Align4096>::new());
    assert_eq!(pool.pool_base() as usize % 4096, 0);

    let layout = Layout::from_size_align(10, 1024).unwrap();
    let ptr = ByteAllocator::alloc(&*pool, layout).unwrap();
    assert_eq!(ptr.as_ptr() as usize % 1024, 0);
    assert_eq!(pool.order_of(ptr.as_ptr()), Ok(10));

    let page = Layout::from_size_align(100, 4096).unwrap();
    let page_ptr = ByteAllocator::alloc(&*pool, page).unwrap();
    assert_eq!(page_ptr.as_ptr() as usize % 4096, 0);

    pool.dealloc(ptr, layout);
    pool.dealloc(page_ptr, page);
    assert_eq!(pool.free_bytes(), 1 << 13);
}

#[test]
fn test_dealloc_of_unknown_pointer_is_ignored() {
    let pool = Pool::new();
    let live = pool.alloc(50).unwrap();
    let mut outside = [0u8; 4];
    let layout = Layout::from_size_align(4, 1).unwrap();

    pool.dealloc(core::ptr::NonNull::from(&mut outside).cast(), layout);
    assert_eq!(pool.usable_size(live.as_ptr()), Ok(63));
    assert_eq!(pool.free(live.as_ptr()), Ok(()));
}

#[test]
fn test_first_fit_policy_is_lifo() {
    let pool = Pool::new();
    let min = 1usize << MIN_ORDER;
    let base = pool.pool_base() as usize;

    let a = pool.alloc(1).unwrap();
    let b = pool.alloc(1).unwrap();
    let c = pool.alloc(1).unwrap();
    assert_eq!(a.as_ptr() as usize - base, 0);
    assert_eq!(b.as_ptr() as usize - base, min);
    assert_eq!(c.as_ptr() as usize - base, 2 * min);

    // `c`'s buddy is free, so freeing `c` merges; `a` has a live buddy.
    pool.free(a.as_ptr()).unwrap();
    pool.free(c.as_ptr()).unwrap();
    assert_eq!(pool.free_blocks_by_order(MIN_ORDER).collect::<Vec<_>>(), [0]);
    assert_eq!(pool.alloc(1).unwrap(), a);
}

#[cfg(feature = "tracking")]
#[test]
fn test_stats() {
    let pool = Pool::new();
    let stats = pool.stats();
    assert_eq!(stats.free_bytes, POOL_SIZE);
    assert_eq!(stats.largest_free_block(), POOL_SIZE);

    let ptr = pool.alloc(1).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.used_bytes, 1 << MIN_ORDER);
    assert_eq!(stats.free_blocks_by_order[MIN_ORDER], 1);
    assert_eq!(stats.largest_free_block(), POOL_SIZE / 2);

    pool.free(ptr.as_ptr()).unwrap();
    assert_eq!(pool.stats().used_bytes, 0);
}
