//! Segregated Free List Index
//!
//! Free arena blocks are bucketed by size class, each bucket an intrusive
//! doubly-linked list threaded through the free-list links stored in the
//! blocks' own payload bytes (see [`crate::block::FreeLinks`]). Insertion,
//! removal, and first-fit lookup are all O(1) relative to the number of
//! buckets — there is never a scan of every free block.
//!
//! Size classing is power-of-two: class `k` holds blocks whose payload size
//! is in `[2^k, 2^(k+1))`. A fit for a request of size `n` is found by first
//! scanning `n`'s own class (same-class membership alone doesn't guarantee a
//! fit near the top of the range) and falling back to the smallest non-empty
//! class above it, where membership does guarantee sufficiency.

use crate::block::{BlockHeader, BlockState, FreeLinks};

/// Number of size classes. 64 comfortably covers every representable
/// `usize` payload size on both 32- and 64-bit targets.
const NUM_CLASSES: usize = 64;

/// Sentinel meaning "no block" in a free-list link slot. Block addresses are
/// never `0` (no region is ever mapped at the null page), so this is safe to
/// use in the same words that otherwise hold addresses.
const NIL: usize = 0;

fn size_class(payload_size: usize) -> usize {
    debug_assert!(payload_size > 0);
    (usize::BITS - 1 - payload_size.leading_zeros()) as usize
}

/// Segregated free-list buckets, keyed by power-of-two size class.
#[derive(Default)]
pub struct FreeListIndex {
    /// Head block address of each class's free list, or [`NIL`].
    heads: [usize; NUM_CLASSES],
    /// Bitmap of non-empty classes, for O(1) "find smallest non-empty class
    /// at or above k" via trailing-zero scanning instead of a linear walk.
    non_empty: u64,
}

impl FreeListIndex {
    pub fn new() -> Self {
        Self {
            heads: [NIL; NUM_CLASSES],
            non_empty: 0,
        }
    }

    /// Insert a free block at `addr` (header already initialized, state
    /// already `Free`) at the head of its size class's list.
    ///
    /// # Safety
    /// `addr` must be a live `BlockHeader` with `state() == Free` and
    /// `payload_size() >= MIN_PAYLOAD`.
    pub unsafe fn insert(&mut self, addr: usize) {
        let hdr = &mut *(addr as *mut BlockHeader);
        debug_assert_eq!(hdr.state(), BlockState::Free);
        let class = size_class(hdr.payload_size());

        let old_head = self.heads[class];
        FreeLinks::set_next(hdr, old_head);
        FreeLinks::set_prev(hdr, NIL);
        if old_head != NIL {
            let old_head_hdr = &mut *(old_head as *mut BlockHeader);
            FreeLinks::set_prev(old_head_hdr, addr);
        }
        self.heads[class] = addr;
        self.non_empty |= 1 << class;
    }

    /// Remove the block at `addr` from whichever class list it is currently
    /// threaded into.
    ///
    /// # Safety
    /// `addr` must be a live, currently-free `BlockHeader` that is actually
    /// linked into this index.
    pub unsafe fn remove(&mut self, addr: usize) {
        let hdr = &mut *(addr as *mut BlockHeader);
        let class = size_class(hdr.payload_size());
        let prev = FreeLinks::prev(hdr);
        let next = FreeLinks::next(hdr);

        if prev != NIL {
            FreeLinks::set_next(&mut *(prev as *mut BlockHeader), next);
        } else {
            self.heads[class] = next;
            if next == NIL {
                self.non_empty &= !(1 << class);
            }
        }

        if next != NIL {
            FreeLinks::set_prev(&mut *(next as *mut BlockHeader), prev);
        }
    }

    /// Find a free block able to satisfy a request of `payload_size` bytes.
    ///
    /// A class only guarantees every member fits the request when the class
    /// is strictly above the request's own — two blocks in the same
    /// power-of-two class can still differ enough that one is too small for
    /// a request near the top of that class's range. So this scans the
    /// request's own class for a member big enough first, and only falls
    /// back to the head of the smallest higher non-empty class (where
    /// class membership alone guarantees sufficiency) if nothing in the
    /// home class fits. Does not remove the block from the index.
    ///
    /// # Safety
    /// Every block currently linked into this index must be a live, free
    /// `BlockHeader`.
    pub unsafe fn find_fit(&self, payload_size: usize) -> Option<usize> {
        let start = size_class(payload_size);
        if start >= NUM_CLASSES {
            return None;
        }

        if self.non_empty & (1 << start) != 0 {
            let mut addr = self.heads[start];
            while addr != NIL {
                let hdr = &*(addr as *const BlockHeader);
                if hdr.payload_size() >= payload_size {
                    return Some(addr);
                }
                addr = FreeLinks::next(hdr);
            }
        }

        if start + 1 >= NUM_CLASSES {
            return None;
        }
        let mask = self.non_empty & (!0u64 << (start + 1));
        if mask == 0 {
            return None;
        }
        let class = mask.trailing_zeros() as usize;
        let addr = self.heads[class];
        debug_assert_ne!(addr, NIL);
        Some(addr)
    }

    pub fn is_empty(&self) -> bool {
        self.non_empty == 0
    }
}
