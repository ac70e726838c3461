//! Intrusive free list stored inside the pool
//!
//! Every free block carries the link to the next free block of the same
//! order in its first `size_of::<usize>()` bytes. The list itself keeps only
//! the head. Links are pool offsets rather than pointers, and the storage
//! behind them is reached through [`LinkStore`].

use core::cell::Cell;

#[cfg(feature = "log")]
use log::error;

/// Storage holding the link words of free blocks.
pub(crate) trait LinkStore {
    /// Read the link word at `offset`.
    fn load_link(&self, offset: usize) -> usize;

    /// Write the link word at `offset`.
    fn store_link(&self, offset: usize, word: usize);

    /// Upper bound on the length of any list, used to stop on cycles.
    fn max_links(&self) -> usize;
}

/// Link word encoding: `offset + 1`, with `0` terminating the list, so a
/// zeroed block reads as the end of its list.
const fn encode(next: Option<usize>) -> usize {
    match next {
        Some(offset) => offset + 1,
        None => 0,
    }
}

const fn decode(word: usize) -> Option<usize> {
    word.checked_sub(1)
}

/// Singly-linked LIFO list of free blocks of one order.
#[derive(Debug)]
pub(crate) struct FreeList {
    head: Cell<usize>,
}

impl FreeList {
    /// Create a new empty free list
    pub const fn new() -> Self {
        Self {
            head: Cell::new(encode(None)),
        }
    }

    /// A list holding one block whose link bytes are still zero.
    pub const fn with_zeroed_block(offset: usize) -> Self {
        Self {
            head: Cell::new(encode(Some(offset))),
        }
    }

    /// Number of blocks, found by walking the list
    pub fn len<S: LinkStore>(&self, store: &S) -> usize {
        self.iter(store).count()
    }

    /// Insert a block at the head
    pub fn push_front<S: LinkStore>(&self, store: &S, offset: usize) {
        store.store_link(offset, self.head.get());
        self.head.set(encode(Some(offset)));
    }

    /// Remove and return the head block
    pub fn pop_front<S: LinkStore>(&self, store: &S) -> Option<usize> {
        let offset = decode(self.head.get())?;
        self.head.set(store.load_link(offset));
        Some(offset)
    }

    /// Find a block by offset, returning its predecessor in the list
    ///
    /// The outer `Option` is `None` when the block is absent; the inner one is
    /// `None` when the block is the head.
    pub fn find<S: LinkStore>(&self, store: &S, offset: usize) -> Option<Option<usize>> {
        let mut prev = None;
        for current in self.iter(store) {
            if current == offset {
                return Some(prev);
            }
            prev = Some(current);
        }
        None
    }

    pub fn contains<S: LinkStore>(&self, store: &S, offset: usize) -> bool {
        self.find(store, offset).is_some()
    }

    /// Unlink the block at `offset`, returning whether it was in the list
    pub fn remove<S: LinkStore>(&self, store: &S, offset: usize) -> bool {
        let Some(prev) = self.find(store, offset) else {
            return false;
        };

        let next = store.load_link(offset);
        match prev {
            Some(prev) => store.store_link(prev, next),
            None => self.head.set(next),
        }
        true
    }

    /// Check if any free block starts within `[start, end)`
    pub fn has_block_in_range<S: LinkStore>(&self, store: &S, start: usize, end: usize) -> bool {
        self.iter(store).any(|offset| offset >= start && offset < end)
    }

    /// Get iterator over the block offsets, head first
    pub fn iter<'a, S: LinkStore>(&self, store: &'a S) -> FreeListIter<'a, S> {
        FreeListIter {
            store,
            current: decode(self.head.get()),
            remaining: store.max_links(),
        }
    }
}

/// Iterator over a [`FreeList`]
pub(crate) struct FreeListIter<'a, S> {
    store: &'a S,
    current: Option<usize>,
    remaining: usize,
}

impl<S: LinkStore> Iterator for FreeListIter<'_, S> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.current?;
        if self.remaining == 0 {
            error!("Potential cycle detected in free list at offset {:#x}", offset);
            self.current = None;
            return None;
        }
        self.remaining -= 1;
        self.current = decode(self.store.load_link(offset));
        Some(offset)
    }
}
