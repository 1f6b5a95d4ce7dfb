//! Large Object Allocation Path
//!
//! Requests whose effective block size exceeds the arena threshold get a
//! dedicated region sized exactly to the request, rounded up to a whole
//! number of OS pages. The region holds exactly one block, spanning it
//! completely — there is never a free list entry, split, or residual on
//! this path, since a second allocation would never fit in the leftover
//! space anyway (that space is the page-rounding slack, smaller than
//! [`crate::block::MIN_BLOCK`] in the common case and not worth tracking
//! even when it isn't).

use crate::block::{BlockHeader, BlockKind, BlockState};
use crate::error::Result;
use crate::heap::page::align_to_page;
use crate::heap::region::{RegionKind, RegionRegistry};
use crate::logging::{log_event, AllocEvent};

/// Map a dedicated region for a request of `effective_size` bytes and
/// return the address of its single `InUse` block.
pub fn allocate(
    regions: &mut RegionRegistry,
    page_size: usize,
    effective_size: usize,
) -> Result<usize> {
    let region_size = align_to_page(effective_size, page_size);
    let base = regions.acquire(region_size, RegionKind::Large)?;
    log_event(&AllocEvent::LargeRegionAcquired {
        base,
        size: region_size,
    });

    unsafe {
        let hdr = BlockHeader::init(base as *mut u8, region_size, 0, base, BlockKind::Large);
        (*hdr).set_state(BlockState::InUse);
    }

    Ok(base)
}

/// Release the dedicated region backing the large block at `addr`.
pub fn free(regions: &mut RegionRegistry, addr: usize) -> Result<()> {
    let size = regions.get(addr).map(|r| r.size());
    regions.release(addr)?;
    if let Some(size) = size {
        log_event(&AllocEvent::LargeRegionReleased { base: addr, size });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::page::query_page_size;

    #[test]
    fn allocate_maps_region_sized_to_request() {
        let mut regions = RegionRegistry::new();
        let page_size = query_page_size();
        let addr = allocate(&mut regions, page_size, page_size * 8).unwrap();
        let hdr = unsafe { &*(addr as *const BlockHeader) };
        assert_eq!(hdr.kind(), BlockKind::Large);
        assert_eq!(hdr.state(), BlockState::InUse);
        assert!(hdr.total_size >= page_size * 8);
    }

    #[test]
    fn free_releases_the_region() {
        let mut regions = RegionRegistry::new();
        let page_size = query_page_size();
        let addr = allocate(&mut regions, page_size, page_size * 8).unwrap();
        assert_eq!(regions.len(), 1);
        free(&mut regions, addr).unwrap();
        assert_eq!(regions.len(), 0);
    }
}
