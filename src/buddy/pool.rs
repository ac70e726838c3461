//! Owned pool storage
//!
//! The pool is a byte array embedded in the allocator, aligned by a
//! zero-sized marker type. The order of a block at offset `d` lives in the
//! byte at `d - 1`; the block at offset 0 has nothing before it, so its order
//! is kept in a dedicated lead byte.
//!
//! Callers write to live blocks through the pointers handed out, so the
//! bytes sit in an `UnsafeCell` and are only ever touched through raw
//! pointers derived from it. No reference to the byte array is created.

use core::cell::{Cell, UnsafeCell};
use core::mem::size_of;
use core::ptr::{addr_of_mut, NonNull};

use super::free_list::LinkStore;

/// Alignment of a pool, carried by a zero-sized marker type.
pub trait Alignment: Copy {
    const ALIGN: usize;
}

macro_rules! alignment_markers {
    ($($name:ident => $align:tt),* $(,)?) => {
        $(
            #[doc = concat!("Aligns the pool to ", stringify!($align), " bytes.")]
            #[repr(align($align))]
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
            pub struct $name;

            impl Alignment for $name {
                const ALIGN: usize = $align;
            }
        )*
    };
}

alignment_markers! {
    Align1 => 1,
    Align2 => 2,
    Align4 => 4,
    Align8 => 8,
    Align16 => 16,
    Align32 => 32,
    Align64 => 64,
    Align128 => 128,
    Align256 => 256,
    Align512 => 512,
    Align1024 => 1024,
    Align2048 => 2048,
    Align4096 => 4096,
}

#[repr(C)]
struct AlignedBytes<const SIZE: usize, A> {
    _align: [A; 0],
    bytes: [u8; SIZE],
}

/// Pool bytes plus the lead order byte.
pub(crate) struct Pool<const SIZE: usize, A> {
    lead: Cell<u8>,
    storage: UnsafeCell<AlignedBytes<SIZE, A>>,
}

impl<const SIZE: usize, A: Alignment> Pool<SIZE, A> {
    pub const fn new() -> Self {
        Self {
            lead: Cell::new(0),
            storage: UnsafeCell::new(AlignedBytes {
                _align: [],
                bytes: [0; SIZE],
            }),
        }
    }

    /// First pool byte, with provenance for the whole pool.
    pub fn base(&self) -> *mut u8 {
        // SAFETY: `storage.get()` is valid for as long as `self` is; only the
        // field address is computed, nothing is read.
        unsafe { addr_of_mut!((*self.storage.get()).bytes).cast::<u8>() }
    }

    fn byte_ptr(&self, offset: usize) -> *mut u8 {
        assert!(offset < SIZE, "offset {:#x} outside pool", offset);
        // SAFETY: `offset` is inside the pool array.
        unsafe { self.base().add(offset) }
    }

    /// Offset of `ptr` from the pool base, if it points into the pool.
    pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        (ptr as usize)
            .checked_sub(self.base() as usize)
            .filter(|&offset| offset < SIZE)
    }

    /// Pointer to the byte at `offset`.
    pub fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        // SAFETY: derived from the non-null pool base.
        unsafe { NonNull::new_unchecked(self.byte_ptr(offset)) }
    }

    /// Order byte of the block starting at `offset`.
    pub fn order_byte(&self, offset: usize) -> u8 {
        match offset {
            0 => self.lead.get(),
            // SAFETY: in bounds; the byte before a block belongs to the
            // allocator, never to a caller.
            _ => unsafe { self.byte_ptr(offset - 1).read() },
        }
    }

    pub fn set_order_byte(&self, offset: usize, order: u8) {
        match offset {
            0 => self.lead.set(order),
            // SAFETY: as in `order_byte`.
            _ => unsafe { self.byte_ptr(offset - 1).write(order) },
        }
    }
}

impl<const SIZE: usize, A: Alignment> LinkStore for Pool<SIZE, A> {
    fn load_link(&self, offset: usize) -> usize {
        assert!(offset + size_of::<usize>() <= SIZE);
        // SAFETY: in bounds; link words are only stored in free blocks.
        unsafe { self.byte_ptr(offset).cast::<usize>().read_unaligned() }
    }

    fn store_link(&self, offset: usize, word: usize) {
        assert!(offset + size_of::<usize>() <= SIZE);
        // SAFETY: as in `load_link`.
        unsafe { self.byte_ptr(offset).cast::<usize>().write_unaligned(word) }
    }

    fn max_links(&self) -> usize {
        SIZE / size_of::<usize>()
    }
}
