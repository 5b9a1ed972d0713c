//! `bdalloc` is a binary buddy sub-allocator: it takes one contiguous power-of-two arena from a
//! backing memory source and hands out and reclaims power-of-two slices of it. Memory is
//! managed in blocks, where a block of `2^n` bytes is said to be of order `n`:
//!
//! ```ignore
//!       64                              0       Order       Size of blocks
//!        |-------------------------------|
//!        |                               |       6           2^6 = 64
//!        |---------------|---------------|
//!        |               |               |       5           2^5 = 32
//!        |-------|-------|-------|-------|
//!        |       |       |       |       |       4           2^4 = 16
//! ```
//!
//! Each block in a row pairs up with a "buddy" - the block its offset differs from in exactly
//! the bit of its order. An allocation takes the head of the matching order's free list,
//! splitting a larger block downward when that list is empty; a free merges the block with its
//! buddy whenever the buddy is also wholly free, repeating upward. Splitting and merging are
//! both O(log2(arena size)), and eager merging keeps external fragmentation down. The cost is
//! internal fragmentation: every allocation occupies a whole power-of-two block, of which 8
//! bytes go to an in-band header recording the block's order while it is allocated.
//!
//! All bookkeeping lives either inside the managed blocks themselves (free-list links, headers)
//! or in a side table of one byte per minimum-sized block, so the allocator is suited to
//! managing a memory region on behalf of code that can't or shouldn't touch a general-purpose
//! heap, such as a pool allocator or the memory manager of a sandboxed guest.
//!
//! `BuddyAllocator` is a single-owner structure: operations take `&mut self` and nothing is
//! locked internally. For contended use, `LockedBuddyAllocator` wraps it in a spinlock and
//! implements `GlobalAlloc` for payloads that don't need more than the natural 8-byte
//! alignment.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod arena;
mod buddy;
mod freelist;
mod header;
mod table;

pub use arena::{BackingSource, HeapSource};
pub use buddy::{BuddyAllocator, Error, MAX_ORDERS, MIN_BLOCK_SIZE, MIN_ORDER};
pub use header::HEADER_SIZE;

use core::{
    alloc::{GlobalAlloc, Layout},
    ops::Deref,
    ptr::{self, NonNull},
};
use spinning_top::Spinlock;

/// A `BuddyAllocator` behind a spinlock, for callers that need to allocate from several threads
/// (or from a `GlobalAlloc` position, which only offers `&self`).
pub struct LockedBuddyAllocator<A = HeapSource>(Spinlock<BuddyAllocator<A>>)
where
    A: BackingSource;

impl LockedBuddyAllocator<HeapSource> {
    pub fn new(size: usize) -> Result<LockedBuddyAllocator, Error> {
        Ok(LockedBuddyAllocator(Spinlock::new(BuddyAllocator::new(size)?)))
    }
}

impl<A> LockedBuddyAllocator<A>
where
    A: BackingSource,
{
    pub fn new_in(size: usize, source: A) -> Result<LockedBuddyAllocator<A>, Error> {
        Ok(LockedBuddyAllocator(Spinlock::new(BuddyAllocator::new_in(size, source)?)))
    }
}

impl<A> Deref for LockedBuddyAllocator<A>
where
    A: BackingSource,
{
    type Target = Spinlock<BuddyAllocator<A>>;

    fn deref(&self) -> &Spinlock<BuddyAllocator<A>> {
        &self.0
    }
}

unsafe impl<A> GlobalAlloc for LockedBuddyAllocator<A>
where
    A: BackingSource,
{
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        /*
         * Payloads sit 8 bytes into a naturally-aligned block, so 8 is the strongest alignment
         * the layout can promise. Callers needing more must overallocate and align manually.
         */
        if layout.align() > HEADER_SIZE {
            return ptr::null_mut();
        }

        match self.0.lock().allocate(layout.size()) {
            Some(block) => block.as_ptr(),
            None => ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        /*
         * The layout is ignored - the block's header already records its order.
         */
        if let Some(ptr) = NonNull::new(ptr) {
            self.0.lock().free(ptr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_allocator_round_trip() {
        let allocator = LockedBuddyAllocator::new(1024).unwrap();

        unsafe {
            let layout = Layout::from_size_align(64, 8).unwrap();
            let ptr = allocator.alloc(layout);
            assert!(!ptr.is_null());

            ptr.write_bytes(0xee, 64);
            allocator.dealloc(ptr, layout);
        }

        assert_eq!(allocator.lock().available_bytes(), 1024);
    }

    #[test]
    fn test_over_aligned_request_is_refused() {
        let allocator = LockedBuddyAllocator::new(1024).unwrap();

        unsafe {
            let layout = Layout::from_size_align(64, 32).unwrap();
            assert!(allocator.alloc(layout).is_null());
        }
    }

    #[test]
    fn test_exhaustion_returns_null() {
        let allocator = LockedBuddyAllocator::new(64).unwrap();

        unsafe {
            let layout = Layout::from_size_align(56, 8).unwrap();
            let ptr = allocator.alloc(layout);
            assert!(!ptr.is_null());
            assert!(allocator.alloc(Layout::from_size_align(1, 1).unwrap()).is_null());

            allocator.dealloc(ptr, layout);
        }
    }

    #[test]
    fn test_allocator_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<BuddyAllocator>();
        assert_send::<LockedBuddyAllocator>();
    }
}
