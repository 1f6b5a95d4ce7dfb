//! Deallocation & Coalescing
//!
//! Freeing a block always leaves the heap in a state where no two
//! physically adjacent blocks are both free — every `deallocate` call
//! coalesces eagerly with whichever neighbors are free, rather than leaving
//! that work for a later allocation to discover. This is what makes the
//! dual physical linkage in [`crate::block`] worth maintaining: both
//! neighbors are reachable in O(1), so there is no boundary-tag scan.
//!
//! Large blocks skip all of this — a large region holds exactly one block,
//! so "freeing" it is just giving the region back to the OS.

use crate::allocator::freelist::FreeListIndex;
use crate::allocator::large;
use crate::block::{BlockHeader, BlockKind, BlockState};
use crate::config::HeapConfig;
use crate::error::Result;
use crate::heap::region::RegionRegistry;
use crate::logging::{log_event, AllocEvent};

/// Free the block at `addr`. Coalesces with free physical neighbors on the
/// arena path; releases the region outright on the large path.
pub fn deallocate(
    free_list: &mut FreeListIndex,
    regions: &mut RegionRegistry,
    config: &HeapConfig,
    addr: usize,
) -> Result<()> {
    let kind = unsafe { (*(addr as *const BlockHeader)).kind() };

    match kind {
        BlockKind::Large => large::free(regions, addr),
        BlockKind::Arena => {
            coalesce_and_free_arena(free_list, regions, config, addr);
            Ok(())
        }
    }
}

/// Mark `addr` free, merge with any free physical neighbors, and either
/// reinsert the (possibly merged) block into the free list or release the
/// region entirely if the merge produced a block spanning the whole region
/// and `shrink_empty_arenas` is set.
fn coalesce_and_free_arena(
    free_list: &mut FreeListIndex,
    regions: &mut RegionRegistry,
    config: &HeapConfig,
    addr: usize,
) {
    unsafe {
        let hdr = &mut *(addr as *mut BlockHeader);
        hdr.set_state(BlockState::Free);
    }

    let mut merged_addr = addr;

    // Merge backward with the previous physical block, if it exists and is free.
    merged_addr = unsafe { try_merge_prev(free_list, regions, merged_addr) };
    // Merge forward with the next physical block, if it exists, in-region,
    // and free.
    merged_addr = unsafe { try_merge_next(free_list, regions, merged_addr) };

    let region_base = unsafe { (*(merged_addr as *const BlockHeader)).region_base };
    let spans_whole_region = regions
        .get(region_base)
        .map(|r| {
            let hdr = unsafe { &*(merged_addr as *const BlockHeader) };
            merged_addr == r.base() && hdr.total_size == r.size()
        })
        .unwrap_or(false);

    if spans_whole_region && config.shrink_empty_arenas {
        let size = regions.get(region_base).map(|r| r.size()).unwrap_or(0);
        // The merged block was never (re)inserted into the free list in
        // this case, so there is nothing to remove before releasing.
        let _ = regions.release(region_base);
        log_event(&AllocEvent::ArenaReleased {
            base: region_base,
            size,
        });
    } else {
        unsafe { free_list.insert(merged_addr) };
    }
}

/// If the block physically preceding `addr` exists and is free, remove it
/// from the free list, absorb `addr`'s block into it, and return the
/// absorbing block's address. Otherwise return `addr` unchanged.
///
/// # Safety
/// `addr` must be a live `BlockHeader` with state `Free`, not currently
/// linked into any free list.
unsafe fn try_merge_prev(
    free_list: &mut FreeListIndex,
    regions: &RegionRegistry,
    addr: usize,
) -> usize {
    let hdr = &*(addr as *const BlockHeader);
    let Some(prev_addr) = hdr.prev_phys_addr() else {
        return addr;
    };
    let prev_hdr = &*(prev_addr as *const BlockHeader);
    if prev_hdr.state() != BlockState::Free {
        return addr;
    }

    let this_total = hdr.total_size;
    free_list.remove(prev_addr);

    let prev_hdr = &mut *(prev_addr as *mut BlockHeader);
    let merged_total = prev_hdr.total_size + this_total;
    prev_hdr.total_size = merged_total;

    update_next_neighbor_back_link(regions, prev_addr, merged_total);

    prev_addr
}

/// If the block physically following `addr` exists (within the same
/// region), and is free, remove it from the free list and absorb it into
/// `addr`'s block. Returns `addr` unchanged either way (forward merges
/// never change the merged block's own address).
///
/// # Safety
/// Same requirements as [`try_merge_prev`].
unsafe fn try_merge_next(
    free_list: &mut FreeListIndex,
    regions: &RegionRegistry,
    addr: usize,
) -> usize {
    let hdr = &*(addr as *const BlockHeader);
    let next_addr = hdr.next_phys_addr();

    let in_region = regions
        .get(hdr.region_base)
        .map(|r| next_addr < r.end())
        .unwrap_or(false);
    if !in_region {
        return addr;
    }

    let next_hdr = &*(next_addr as *const BlockHeader);
    if next_hdr.state() != BlockState::Free {
        return addr;
    }

    let next_total = next_hdr.total_size;
    free_list.remove(next_addr);

    let hdr = &mut *(addr as *mut BlockHeader);
    hdr.total_size += next_total;

    update_next_neighbor_back_link(regions, addr, hdr.total_size);

    addr
}

/// The block now physically following the merged block, if one exists
/// within the same region, must have its `prev_phys_size` updated to point
/// at the new, larger merged block.
unsafe fn update_next_neighbor_back_link(regions: &RegionRegistry, merged_addr: usize, merged_total: usize) {
    let region_base = (*(merged_addr as *const BlockHeader)).region_base;
    let next_addr = merged_addr + merged_total;

    let in_region = regions
        .get(region_base)
        .map(|r| next_addr < r.end())
        .unwrap_or(false);
    if !in_region {
        return;
    }

    let next_hdr = &mut *(next_addr as *mut BlockHeader);
    next_hdr.prev_phys_size = merged_total;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{self, AllocationPolicy};
    use crate::heap::page::query_page_size;

    fn alloc(
        free_list: &mut FreeListIndex,
        regions: &mut RegionRegistry,
        config: &HeapConfig,
        page_size: usize,
        n: usize,
    ) -> usize {
        let policy = AllocationPolicy::new(page_size, config.arena_threshold_pages);
        let effective = policy.effective_block_size(n, config.min_alignment);
        allocator::arena::allocate(free_list, regions, config, page_size, effective).unwrap()
    }

    #[test]
    fn free_then_refree_adjacent_blocks_coalesces() {
        let mut free_list = FreeListIndex::new();
        let mut regions = RegionRegistry::new();
        let mut config = HeapConfig::default();
        config.arena_granularity = 4096;
        config.shrink_empty_arenas = false;
        let page_size = query_page_size();

        let a = alloc(&mut free_list, &mut regions, &config, page_size, 64);
        let b = alloc(&mut free_list, &mut regions, &config, page_size, 64);
        assert!(b > a, "second allocation should follow the first physically");

        deallocate(&mut free_list, &mut regions, &config, a).unwrap();
        deallocate(&mut free_list, &mut regions, &config, b).unwrap();

        // Only one region, and it should all now be free, coalesced into
        // no more free-list entries than the split residual structure
        // allows — specifically, freeing both a and b should not leave two
        // separate *adjacent* free entries.
        let hdr_a = unsafe { &*(a as *const BlockHeader) };
        assert_eq!(hdr_a.state(), BlockState::Free);
    }

    #[test]
    fn freeing_whole_arena_releases_region_when_configured() {
        let mut free_list = FreeListIndex::new();
        let mut regions = RegionRegistry::new();
        let mut config = HeapConfig::default();
        config.arena_granularity = 4096;
        config.shrink_empty_arenas = true;
        let page_size = query_page_size();

        let policy = AllocationPolicy::new(page_size, config.arena_threshold_pages);
        let effective = policy.effective_block_size(4096 - 64, config.min_alignment);
        let addr =
            allocator::arena::allocate(&mut free_list, &mut regions, &config, page_size, effective)
                .unwrap();

        assert_eq!(regions.len(), 1);
        deallocate(&mut free_list, &mut regions, &config, addr).unwrap();
        assert_eq!(regions.len(), 0, "fully-coalesced empty arena should be released");
    }

    #[test]
    fn large_block_free_releases_its_dedicated_region() {
        let mut free_list = FreeListIndex::new();
        let mut regions = RegionRegistry::new();
        let config = HeapConfig::default();
        let page_size = query_page_size();

        let addr =
            allocator::large::allocate(&mut regions, page_size, page_size * 8).unwrap();
        assert_eq!(regions.len(), 1);
        deallocate(&mut free_list, &mut regions, &config, addr).unwrap();
        assert_eq!(regions.len(), 0);
    }
}
