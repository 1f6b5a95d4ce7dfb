//! Allocation Policy & Dispatch
//!
//! Decides, for a given request size, whether it is served from an arena
//! region (segregated free list, split/coalesce) or a dedicated large
//! region (one block per region, no splitting). The rest of the allocator
//! is split into [`arena`] and [`large`] to keep each path's invariants
//! separate and easy to reason about independently.

pub mod arena;
pub mod freelist;
pub mod large;

use crate::block::{BlockKind, HEADER_SIZE, MIN_BLOCK, WORD_ALIGN};
use crate::util::alignment::Alignment;

/// Which path a request of a given effective size should take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Arena,
    Large,
}

/// Resolves the arena/large threshold once, from the heap's page size and
/// configuration, and answers routing/size questions against it.
#[derive(Debug, Clone, Copy)]
pub struct AllocationPolicy {
    /// Effective block size (header + payload, word-aligned) above which a
    /// request is routed to the large path.
    threshold_bytes: usize,
}

impl AllocationPolicy {
    pub fn new(page_size: usize, arena_threshold_pages: usize) -> Self {
        Self {
            threshold_bytes: page_size * arena_threshold_pages,
        }
    }

    /// Effective total block size (header + payload, rounded up to word and
    /// minimum-block size) needed to satisfy a user request of
    /// `requested_bytes`, at `alignment`.
    pub fn effective_block_size(&self, requested_bytes: usize, alignment: usize) -> usize {
        let payload = Alignment::align_up(requested_bytes.max(1), alignment.max(WORD_ALIGN));
        let total = Alignment::align_up(HEADER_SIZE + payload, WORD_ALIGN);
        let total = total.max(MIN_BLOCK);
        debug_assert!(Alignment::is_aligned(total, WORD_ALIGN));
        total
    }

    /// Which path an allocation of `effective_size` bytes should take.
    pub fn route(&self, effective_size: usize) -> Route {
        if effective_size > self.threshold_bytes {
            Route::Large
        } else {
            Route::Arena
        }
    }

    pub fn threshold_bytes(&self) -> usize {
        self.threshold_bytes
    }

    pub fn block_kind_for(&self, effective_size: usize) -> BlockKind {
        match self.route(effective_size) {
            Route::Arena => BlockKind::Arena,
            Route::Large => BlockKind::Large,
        }
    }
}
