//! The allocator does not own the mechanism that produces its arena - it asks a `BackingSource`
//! for one contiguous region at construction and hands it back when dropped. The default source
//! draws from the global heap, which is the right thing for a sub-allocator embedded in a hosted
//! program; kernels and other freestanding users can plug in a source backed by whatever memory
//! manager they have.

use crate::buddy::MIN_BLOCK_SIZE;
use alloc::alloc::{alloc, dealloc, Layout};
use core::ptr::NonNull;

/// Where an allocator's arena comes from. A source hands out at most one region per allocator,
/// acquired once at construction and released once at drop.
pub trait BackingSource {
    /// Hand over `size` contiguous writable bytes, aligned to at least the minimum block size.
    /// Returns `None` when the source can't satisfy the request; the allocator reports that as
    /// construction failure. The region does not need to be zeroed - the allocator does that
    /// itself.
    fn acquire(&self, size: usize) -> Option<NonNull<u8>>;

    /// Take back a region previously handed out by `acquire`.
    ///
    /// ### Safety
    /// `base` and `size` must be exactly what `acquire` returned, and the region must not be
    /// touched again after this call.
    unsafe fn release(&self, base: NonNull<u8>, size: usize);
}

/// A `BackingSource` that draws from the global heap.
pub struct HeapSource;

impl BackingSource for HeapSource {
    fn acquire(&self, size: usize) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(size, MIN_BLOCK_SIZE).ok()?;
        NonNull::new(unsafe { alloc(layout) })
    }

    unsafe fn release(&self, base: NonNull<u8>, size: usize) {
        let layout = Layout::from_size_align_unchecked(size, MIN_BLOCK_SIZE);
        dealloc(base.as_ptr(), layout);
    }
}
