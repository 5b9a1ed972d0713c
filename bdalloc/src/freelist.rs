//! Free blocks are tracked by threading a doubly-linked list through the blocks themselves: the
//! first 16 bytes of every free block hold its `prev` and `next` links. No memory outside the
//! arena is needed to track an arbitrary number of free blocks, but it does mean the links of a
//! block are only meaningful while that block is actually free.
//!
//! The links are `Option<NonNull<FreeBlock>>`, which has the nullable-pointer layout, so a block
//! whose first 16 bytes are zero has both links null. This is what lets `BuddyAllocator` zero
//! the fresh arena and immediately treat its base as a linked free block.

use core::ptr::NonNull;

/// The link cell at the start of every free block. A free block must be at least
/// `size_of::<FreeBlock>()` bytes, which bounds the minimum block size the allocator can manage.
#[repr(C)]
pub struct FreeBlock {
    prev: Option<NonNull<FreeBlock>>,
    next: Option<NonNull<FreeBlock>>,
}

impl FreeBlock {
    /// Overwrite the first bytes of `block` with null links, making it safe to thread onto a
    /// `FreeList`. Any header previously stored there is destroyed, which also clears the in-use
    /// flag.
    ///
    /// ### Safety
    /// `block` must point at least `size_of::<FreeBlock>()` writable bytes that no other code is
    /// currently using.
    pub unsafe fn init_at(block: NonNull<u8>) -> NonNull<FreeBlock> {
        let node = block.cast::<FreeBlock>();
        node.as_ptr().write(FreeBlock { prev: None, next: None });
        node
    }
}

/// The list of free blocks of a single order. The head slot is a plain pointer to the first
/// node, not a sentinel, so removing a node must fix the head slot up when the node happens to
/// be the head - `remove` does both in one step.
#[derive(Clone, Copy)]
pub struct FreeList {
    head: Option<NonNull<FreeBlock>>,
}

impl FreeList {
    pub const fn new() -> FreeList {
        FreeList { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Add `entry` to the list. An entry attached to an empty list becomes the head; otherwise
    /// it is inserted immediately after the current head, so the head itself is only replaced by
    /// `detach_head` / `remove`.
    ///
    /// ### Safety
    /// `entry` must be a valid link cell (see `FreeBlock::init_at`) that is not currently in any
    /// list.
    pub unsafe fn attach(&mut self, mut entry: NonNull<FreeBlock>) {
        match self.head {
            None => {
                debug_assert!(entry.as_ref().prev.is_none() && entry.as_ref().next.is_none());
                self.head = Some(entry);
            }

            Some(mut head) => {
                let successor = head.as_ref().next;
                if let Some(mut successor) = successor {
                    successor.as_mut().prev = Some(entry);
                }
                entry.as_mut().next = successor;
                entry.as_mut().prev = Some(head);
                head.as_mut().next = Some(entry);
            }
        }
    }

    /// Remove and return the first node, advancing the head slot to its successor. The removed
    /// node's links are nulled.
    ///
    /// ### Safety
    /// All nodes reachable from the head must still be valid link cells.
    pub unsafe fn detach_head(&mut self) -> Option<NonNull<FreeBlock>> {
        let mut head = self.head?;

        let successor = head.as_ref().next;
        if let Some(mut successor) = successor {
            successor.as_mut().prev = None;
        }
        self.head = successor;

        head.as_mut().prev = None;
        head.as_mut().next = None;
        Some(head)
    }

    /// Splice `node` out of the list, patching its neighbours' links and, if `node` is the
    /// current head, advancing the head slot to its successor. The removed node's links are
    /// nulled.
    ///
    /// ### Safety
    /// `node` must currently be linked into *this* list.
    pub unsafe fn remove(&mut self, mut node: NonNull<FreeBlock>) {
        if self.head == Some(node) {
            self.head = node.as_ref().next;
        }

        if let Some(mut prev) = node.as_ref().prev {
            prev.as_mut().next = node.as_ref().next;
        }
        if let Some(mut next) = node.as_ref().next {
            next.as_mut().prev = node.as_ref().prev;
        }

        node.as_mut().prev = None;
        node.as_mut().next = None;
    }

    /// Walk the nodes currently in the list, head first. The iterator reads the links as it
    /// goes, so the list must not be mutated while iterating.
    pub fn iter(&self) -> Iter {
        Iter { current: self.head }
    }
}

pub struct Iter {
    current: Option<NonNull<FreeBlock>>,
}

impl Iterator for Iter {
    type Item = NonNull<FreeBlock>;

    fn next(&mut self) -> Option<NonNull<FreeBlock>> {
        let node = self.current?;
        self.current = unsafe { node.as_ref().next };
        Some(node)
    }
}
