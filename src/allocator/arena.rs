//! Arena Allocation Path
//!
//! Small and medium requests are served from arena regions: large mmap'd
//! spans subdivided into many blocks, tracked by the segregated
//! [`crate::allocator::freelist::FreeListIndex`]. A request either finds an
//! existing free block big enough (optionally splitting off a residual), or
//! the allocator maps a fresh arena region sized to fit the request and
//! tries again.

use crate::allocator::freelist::FreeListIndex;
use crate::block::{BlockHeader, BlockKind, BlockState, MIN_BLOCK};
use crate::config::HeapConfig;
use crate::error::Result;
use crate::heap::page::align_to_page;
use crate::heap::region::{RegionKind, RegionRegistry};
use crate::logging::{log_event, AllocEvent};

/// Serve a request for `effective_size` bytes from the arena path, mapping a
/// fresh region if no existing free block is big enough. Returns the
/// address of a block header, already marked `InUse`, whose `total_size` is
/// exactly `effective_size`.
pub fn allocate(
    free_list: &mut FreeListIndex,
    regions: &mut RegionRegistry,
    config: &HeapConfig,
    page_size: usize,
    effective_size: usize,
) -> Result<usize> {
    // find_fit looks up by payload size; a block's payload is total_size
    // minus the header, so search using that same key.
    let payload_key = effective_size.saturating_sub(crate::block::HEADER_SIZE).max(1);

    let addr = match unsafe { free_list.find_fit(payload_key) } {
        Some(addr) => addr,
        None => {
            acquire_fresh_region(free_list, regions, config, page_size, effective_size)?
        }
    };

    Ok(unsafe { take_and_split(free_list, regions, addr, effective_size) })
}

/// Map a new arena region sized to comfortably fit `effective_size`
/// (at least `config.arena_granularity`, rounded up to a page multiple),
/// initialize it as one free block spanning the whole region, and insert
/// that block into the free list. Returns the address of the new free
/// block (equal to the region base).
fn acquire_fresh_region(
    free_list: &mut FreeListIndex,
    regions: &mut RegionRegistry,
    config: &HeapConfig,
    page_size: usize,
    effective_size: usize,
) -> Result<usize> {
    let raw_size = config.arena_granularity.max(effective_size);
    let region_size = align_to_page(raw_size, page_size);

    let base = regions.acquire(region_size, RegionKind::Arena)?;
    log_event(&AllocEvent::ArenaAcquired {
        base,
        size: region_size,
    });

    unsafe {
        BlockHeader::init(base as *mut u8, region_size, 0, base, BlockKind::Arena);
        free_list.insert(base);
    }

    Ok(base)
}

/// Remove the free block at `addr` from the index, split off a residual
/// free block if the remainder is big enough to stand alone, and return the
/// address of an `InUse` block of exactly `effective_size` bytes.
///
/// # Safety
/// `addr` must be a block currently linked into `free_list`.
unsafe fn take_and_split(
    free_list: &mut FreeListIndex,
    regions: &RegionRegistry,
    addr: usize,
    effective_size: usize,
) -> usize {
    free_list.remove(addr);
    let hdr = &mut *(addr as *mut BlockHeader);
    debug_assert!(hdr.total_size >= effective_size);

    let residual = hdr.total_size - effective_size;
    if residual >= MIN_BLOCK {
        let region_base = hdr.region_base;
        hdr.total_size = effective_size;

        let residual_addr = addr + effective_size;
        BlockHeader::init(
            residual_addr as *mut u8,
            residual,
            effective_size,
            region_base,
            BlockKind::Arena,
        );
        free_list.insert(residual_addr);

        let next_addr = residual_addr + residual;
        let in_region = regions
            .get(region_base)
            .map(|r| next_addr < r.end())
            .unwrap_or(false);
        if in_region {
            let next_hdr = &mut *(next_addr as *mut BlockHeader);
            next_hdr.prev_phys_size = residual;
        }
    }

    hdr.set_state(BlockState::InUse);
    addr
}
