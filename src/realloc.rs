//! Reallocation Policy
//!
//! Tries to resize a block in place before falling back to
//! allocate-copy-free. Arena blocks can shrink by splitting off a tail
//! residual, or grow by absorbing a free physical neighbor with enough
//! room; large blocks never resize in place and always fall back.
//!
//! Large blocks are excluded from in-place growth because a dedicated
//! region is sized exactly to its one block, so there is never slack to
//! grow into, and by the same reasoning excluded from in-place shrink too:
//! splitting a dedicated large region would produce a second block inside a
//! region the large path never expects to hold more than one of, so a
//! shrink there also falls back to allocate-copy-free.

use crate::allocator::freelist::FreeListIndex;
use crate::allocator::{self, AllocationPolicy};
use crate::block::{BlockHeader, BlockKind, BlockState, MIN_BLOCK};
use crate::config::HeapConfig;
use crate::dealloc;
use crate::error::Result;
use crate::heap::region::RegionRegistry;
use crate::logging::{log_event, AllocEvent};

/// Outcome of a reallocation: either the same address (resized in place) or
/// a new address (the old block was freed after copying).
pub enum ReallocOutcome {
    SamePointer(usize),
    Moved { old_addr: usize, new_addr: usize },
}

/// Resize the block at `old_addr` to hold `new_requested` bytes.
pub fn reallocate(
    free_list: &mut FreeListIndex,
    regions: &mut RegionRegistry,
    config: &HeapConfig,
    policy: &AllocationPolicy,
    page_size: usize,
    old_addr: usize,
    new_requested: usize,
) -> Result<ReallocOutcome> {
    let new_effective = policy.effective_block_size(new_requested, config.min_alignment);

    let kind = unsafe { (*(old_addr as *const BlockHeader)).kind() };
    if kind == BlockKind::Large {
        return fallback(
            free_list, regions, config, policy, page_size, old_addr, new_requested,
        );
    }

    let old_total = unsafe { (*(old_addr as *const BlockHeader)).total_size };

    if new_effective <= old_total {
        unsafe { shrink_in_place(free_list, regions, old_addr, new_effective, old_total) };
        return Ok(ReallocOutcome::SamePointer(old_addr));
    }

    if unsafe { try_grow_in_place(free_list, regions, old_addr, new_effective) } {
        return Ok(ReallocOutcome::SamePointer(old_addr));
    }

    log_event(&AllocEvent::ReallocFallback {
        old_size: old_total,
        new_size: new_effective,
    });
    fallback(
        free_list, regions, config, policy, page_size, old_addr, new_requested,
    )
}

/// Shrink the block at `addr` from `old_total` down to `new_total`,
/// splitting off a free tail residual when the remainder is big enough to
/// stand alone as its own block. The residual is coalesced with its own
/// next-physical neighbor if that neighbor is free, so a shrink never
/// leaves two adjacent free blocks.
///
/// # Safety
/// `addr` must be a live, in-use arena `BlockHeader` of exactly `old_total`
/// bytes.
unsafe fn shrink_in_place(
    free_list: &mut FreeListIndex,
    regions: &RegionRegistry,
    addr: usize,
    new_total: usize,
    old_total: usize,
) {
    let residual = old_total - new_total;
    if residual < MIN_BLOCK {
        return;
    }

    let hdr = &mut *(addr as *mut BlockHeader);
    let region_base = hdr.region_base;
    hdr.total_size = new_total;

    let residual_addr = addr + new_total;
    BlockHeader::init(
        residual_addr as *mut u8,
        residual,
        new_total,
        region_base,
        BlockKind::Arena,
    );

    let mut residual_total = residual;
    let next_addr = residual_addr + residual_total;
    let in_region = regions
        .get(region_base)
        .map(|r| next_addr < r.end())
        .unwrap_or(false);
    if in_region {
        let next_hdr = &*(next_addr as *const BlockHeader);
        if next_hdr.state() == BlockState::Free {
            residual_total += next_hdr.total_size;
            free_list.remove(next_addr);
            let residual_hdr = &mut *(residual_addr as *mut BlockHeader);
            residual_hdr.total_size = residual_total;
        }
    }

    free_list.insert(residual_addr);

    let after_addr = residual_addr + residual_total;
    let still_in_region = regions
        .get(region_base)
        .map(|r| after_addr < r.end())
        .unwrap_or(false);
    if still_in_region {
        let after_hdr = &mut *(after_addr as *mut BlockHeader);
        after_hdr.prev_phys_size = residual_total;
    }
}

/// Try to grow the block at `addr` to `new_total` bytes by absorbing the
/// free physical block that immediately follows it. Returns `false` (no
/// change made) if there is no next-physical block, it isn't free, or it
/// isn't big enough.
///
/// # Safety
/// `addr` must be a live, in-use arena `BlockHeader`.
unsafe fn try_grow_in_place(
    free_list: &mut FreeListIndex,
    regions: &RegionRegistry,
    addr: usize,
    new_total: usize,
) -> bool {
    let hdr = &*(addr as *const BlockHeader);
    let next_addr = hdr.next_phys_addr();

    let in_region = regions
        .get(hdr.region_base)
        .map(|r| next_addr < r.end())
        .unwrap_or(false);
    if !in_region {
        return false;
    }

    let next_hdr = &*(next_addr as *const BlockHeader);
    if next_hdr.state() != BlockState::Free {
        return false;
    }

    let available = hdr.total_size + next_hdr.total_size;
    if available < new_total {
        return false;
    }

    free_list.remove(next_addr);

    let hdr = &mut *(addr as *mut BlockHeader);
    let residual = available - new_total;

    if residual >= MIN_BLOCK {
        hdr.total_size = new_total;
        let residual_addr = addr + new_total;
        let region_base = hdr.region_base;
        BlockHeader::init(
            residual_addr as *mut u8,
            residual,
            new_total,
            region_base,
            BlockKind::Arena,
        );
        free_list.insert(residual_addr);

        let after_addr = residual_addr + residual;
        let still_in_region = regions
            .get(region_base)
            .map(|r| after_addr < r.end())
            .unwrap_or(false);
        if still_in_region {
            let after_hdr = &mut *(after_addr as *mut BlockHeader);
            after_hdr.prev_phys_size = residual;
        }
    } else {
        // Absorb the whole neighbor; the residual slack stays inside this
        // block rather than being tracked separately.
        hdr.total_size = available;
        let after_addr = addr + available;
        let region_base = hdr.region_base;
        let still_in_region = regions
            .get(region_base)
            .map(|r| after_addr < r.end())
            .unwrap_or(false);
        if still_in_region {
            let after_hdr = &mut *(after_addr as *mut BlockHeader);
            after_hdr.prev_phys_size = available;
        }
    }

    true
}

/// Allocate a fresh block of `new_requested` bytes, copy the old payload
/// into it, and free the old block.
fn fallback(
    free_list: &mut FreeListIndex,
    regions: &mut RegionRegistry,
    config: &HeapConfig,
    policy: &AllocationPolicy,
    page_size: usize,
    old_addr: usize,
    new_requested: usize,
) -> Result<ReallocOutcome> {
    let (old_payload_ptr, old_payload_size, old_kind) = unsafe {
        let hdr = &*(old_addr as *const BlockHeader);
        (hdr.payload_ptr(), hdr.payload_size(), hdr.kind())
    };

    let new_effective = policy.effective_block_size(new_requested, config.min_alignment);
    let new_addr = match policy.route(new_effective) {
        allocator::Route::Arena => {
            allocator::arena::allocate(free_list, regions, config, page_size, new_effective)?
        }
        allocator::Route::Large => allocator::large::allocate(regions, page_size, new_effective)?,
    };

    let copy_len = old_payload_size.min(new_requested);
    unsafe {
        let new_payload_ptr = (*(new_addr as *const BlockHeader)).payload_ptr();
        std::ptr::copy_nonoverlapping(old_payload_ptr, new_payload_ptr, copy_len);
    }

    let _ = old_kind;
    dealloc::deallocate(free_list, regions, config, old_addr)?;

    Ok(ReallocOutcome::Moved {
        old_addr,
        new_addr,
    })
}
