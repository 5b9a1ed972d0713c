//! Every allocated block starts with an 8-byte header: bit 63 is the in-use flag and the low 63
//! bits hold the order the block was allocated at. The header is what lets `free` take just a
//! pointer - the order is recovered from the bytes in front of the payload rather than being
//! passed back in by the caller.
//!
//! The header only exists while the block is allocated. When the block is freed, the same bytes
//! become the block's free-list links (see `freelist`), which also clears the in-use flag: link
//! words are either null or heap addresses, and neither has bit 63 set on any supported
//! platform.

use bit_field::BitField;
use core::{mem, ptr::NonNull};

/// Bytes of in-band bookkeeping at the start of every allocated block. The usable payload of a
/// block of order `k` is `2^k - HEADER_SIZE` bytes.
pub const HEADER_SIZE: usize = mem::size_of::<u64>();

const IN_USE_BIT: usize = 63;
const ORDER_BITS: core::ops::Range<usize> = 0..63;

/// Stamp the in-use header onto `block` and return the pointer the user gets to write through.
/// The block must not be linked into any free list once this has been called - the header
/// destroys the link cell.
///
/// ### Safety
/// `block` must point at least `2^order` writable bytes owned by the allocator.
pub unsafe fn mark_allocated(block: NonNull<u8>, order: usize) -> NonNull<u8> {
    let mut header = 0u64;
    header.set_bits(ORDER_BITS, order as u64);
    header.set_bit(IN_USE_BIT, true);
    block.cast::<u64>().as_ptr().write(header);

    NonNull::new_unchecked(block.as_ptr().add(HEADER_SIZE))
}

/// Step back from a user pointer to the block it lives in, and read the allocation order out of
/// the header. The header bytes are left in place; the caller overwrites them with free-list
/// links when it threads the block back onto a list.
///
/// ### Safety
/// `user_ptr` must have been produced by `mark_allocated` on a block that is still allocated.
pub unsafe fn unmark(user_ptr: NonNull<u8>) -> (NonNull<u8>, usize) {
    let block = NonNull::new_unchecked(user_ptr.as_ptr().sub(HEADER_SIZE));
    let header = block.cast::<u64>().as_ptr().read();

    (block, header.get_bits(ORDER_BITS) as usize)
}

/// Read the in-use flag from the first 8 bytes of a block.
///
/// ### Safety
/// `block` must point at least 8 readable bytes inside the arena.
pub unsafe fn is_in_use(block: NonNull<u8>) -> bool {
    block.cast::<u64>().as_ptr().read().get_bit(IN_USE_BIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freelist::FreeBlock;

    #[repr(align(16))]
    struct Block([u8; 32]);

    #[test]
    fn test_header_round_trip() {
        let mut block = Block([0; 32]);
        let base = NonNull::new(block.0.as_mut_ptr()).unwrap();

        unsafe {
            let user = mark_allocated(base, 5);
            assert_eq!(user.as_ptr() as usize - base.as_ptr() as usize, HEADER_SIZE);
            assert!(is_in_use(base));

            let (recovered, order) = unmark(user);
            assert_eq!(recovered, base);
            assert_eq!(order, 5);
        }
    }

    #[test]
    fn test_free_links_clear_in_use_flag() {
        let mut block = Block([0; 32]);
        let base = NonNull::new(block.0.as_mut_ptr()).unwrap();

        unsafe {
            mark_allocated(base, 4);
            assert!(is_in_use(base));

            // Writing the link cell over the header is what marks the block free again
            FreeBlock::init_at(base);
            assert!(!is_in_use(base));
        }
    }

    #[test]
    fn test_payload_is_writable_after_header() {
        let mut block = Block([0; 32]);
        let base = NonNull::new(block.0.as_mut_ptr()).unwrap();

        unsafe {
            let user = mark_allocated(base, 5);
            user.as_ptr().write_bytes(0xab, 32 - HEADER_SIZE);

            let (_, order) = unmark(user);
            assert_eq!(order, 5);
        }
    }
}
