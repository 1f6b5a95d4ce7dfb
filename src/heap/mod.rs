//! Heap
//!
//! [`Heap`] is the allocator's public entry point: it owns the region
//! registry, the segregated free-list index, the resolved allocation
//! policy, and the configuration it was started with. Every operation
//! takes `&mut self` — there is no internal locking; this allocator is
//! scoped to single-threaded use and the caller is expected to serialize
//! access, the same way a borrow-checked `&mut` API always does in Rust.

pub mod memory_mapping;
pub mod page;
pub mod region;

use crate::allocator::freelist::FreeListIndex;
use crate::allocator::{self, AllocationPolicy};
use crate::block::BlockHeader;
use crate::config::{ConfigError, HeapConfig};
use crate::dealloc;
use crate::error::{MallocError, Result};
use crate::leak::{self, LeakCursor, LeakDescriptor};
use crate::logging::{log_event, AllocEvent};
use crate::realloc::{self, ReallocOutcome};
use region::RegionRegistry;

/// Snapshot of heap-wide byte/region counters. Plain counters for capacity
/// planning, not a full observability layer (no histograms, no per-cycle
/// timers).
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapStats {
    pub region_count: usize,
    pub mapped_bytes: usize,
    pub mapped_pages: usize,
}

/// Outcome of [`Heap::destroy`]: always reports success, since destroying a
/// heap is not itself a failable operation, carrying the number of blocks
/// still in use at the time of destruction purely as diagnostic
/// information.
#[derive(Debug, Clone, Copy)]
pub struct DestroyOutcome {
    pub leaked_blocks: usize,
}

/// A single heap instance, backed directly by OS-mapped virtual memory
/// regions.
pub struct Heap {
    regions: RegionRegistry,
    free_list: FreeListIndex,
    config: HeapConfig,
    policy: AllocationPolicy,
    page_size: usize,
}

impl Heap {
    /// Start a new heap with default configuration.
    pub fn init() -> Result<Self> {
        Self::init_with_config(HeapConfig::default())
    }

    /// Start a new heap with a caller-supplied configuration, validating it
    /// first.
    pub fn init_with_config(config: HeapConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e: ConfigError| MallocError::Configuration(e.to_string()))?;

        let page_size = page::query_page_size();

        // Cross-field checks that depend on page_size (e.g. arena_threshold_pages
        // resolving to more bytes than the minimum block size) can only be made
        // once the heap's page size is known, so they run here rather than in
        // `HeapConfig::validate`.
        config
            .validate_with_page_size(page_size)
            .map_err(|e: ConfigError| MallocError::Configuration(e.to_string()))?;

        let policy = AllocationPolicy::new(page_size, config.arena_threshold_pages);

        if config.verbose {
            log::info!(
                "heap initialized: page_size={} arena_granularity={} arena_threshold_bytes={}",
                page_size,
                config.arena_granularity,
                policy.threshold_bytes()
            );
        }

        Ok(Self {
            regions: RegionRegistry::new(),
            free_list: FreeListIndex::new(),
            config,
            policy,
            page_size,
        })
    }

    /// Allocate `size` bytes, returning the user-visible payload pointer.
    ///
    /// A `size` of zero is not an error: per the allocator's zero-size rule,
    /// it returns a distinct, non-null pointer backed by a block sized to
    /// the minimum viable payload, which may later be freed or reallocated
    /// like any other allocation.
    pub fn allocate(&mut self, size: usize) -> Result<*mut u8> {
        let effective = self.policy.effective_block_size(size, self.config.min_alignment);
        let result = match self.policy.route(effective) {
            allocator::Route::Arena => allocator::arena::allocate(
                &mut self.free_list,
                &mut self.regions,
                &self.config,
                self.page_size,
                effective,
            ),
            allocator::Route::Large => {
                allocator::large::allocate(&mut self.regions, self.page_size, effective)
            }
        };

        match result {
            Ok(addr) => {
                let hdr = unsafe { &*(addr as *const BlockHeader) };
                Ok(hdr.payload_ptr())
            }
            Err(e) => {
                log_event(&AllocEvent::AllocationFailed { requested: size });
                Err(e)
            }
        }
    }

    /// Allocate `size` bytes, returning a null pointer on failure instead of
    /// an `Err`. Mirrors the C `malloc` calling convention for callers that
    /// want that surface instead of `Result`.
    pub fn allocate_or_null(&mut self, size: usize) -> *mut u8 {
        self.allocate(size).unwrap_or(std::ptr::null_mut())
    }

    /// Free a previously allocated pointer, or do nothing if `ptr` is null.
    /// Freeing the same pointer twice, or a pointer not returned by this
    /// heap, is undefined behavior, as with any in-band-header allocator —
    /// there is no tag to distinguish a live block from reused memory.
    ///
    /// # Safety
    /// `ptr` must be null, or a pointer returned by a prior
    /// `allocate`/`reallocate` call on this heap, not yet freed.
    pub unsafe fn deallocate(&mut self, ptr: *mut u8) -> Result<()> {
        if ptr.is_null() {
            return Ok(());
        }
        let hdr = BlockHeader::from_payload_ptr(ptr);
        let addr = hdr.as_ptr() as usize;
        dealloc::deallocate(&mut self.free_list, &mut self.regions, &self.config, addr)
    }

    /// Resize the allocation at `ptr` to `new_size` bytes, returning the
    /// (possibly unchanged) payload pointer. The contents up to
    /// `min(old_size, new_size)` are preserved.
    ///
    /// `ptr == null` behaves identically to `allocate(new_size)`. `new_size
    /// == 0` frees `ptr` and returns null, consistent with the allocator's
    /// zero-size rule.
    ///
    /// # Safety
    /// `ptr` must be null, or a pointer returned by a prior
    /// `allocate`/`reallocate` call on this heap, not yet freed.
    pub unsafe fn reallocate(&mut self, ptr: *mut u8, new_size: usize) -> Result<*mut u8> {
        if ptr.is_null() {
            return self.allocate(new_size);
        }
        if new_size == 0 {
            self.deallocate(ptr)?;
            return Ok(std::ptr::null_mut());
        }

        let hdr = BlockHeader::from_payload_ptr(ptr);
        let old_addr = hdr.as_ptr() as usize;

        let outcome = realloc::reallocate(
            &mut self.free_list,
            &mut self.regions,
            &self.config,
            &self.policy,
            self.page_size,
            old_addr,
            new_size,
        )?;

        let result_addr = match outcome {
            ReallocOutcome::SamePointer(addr) => addr,
            ReallocOutcome::Moved { new_addr, .. } => new_addr,
        };
        let result_hdr = &*(result_addr as *const BlockHeader);
        Ok(result_hdr.payload_ptr())
    }

    /// Advance a leak enumeration cursor by one in-use block.
    pub fn next_leak(&self, cursor: LeakCursor) -> (Option<LeakDescriptor>, LeakCursor) {
        leak::next_leak(&self.regions, cursor)
    }

    /// Count every currently in-use block. Convenience wrapper over a full
    /// cursor drain, for callers that just want a number.
    pub fn count_leaks(&self) -> usize {
        leak::count_leaks(&self.regions)
    }

    /// Snapshot region/byte counters.
    pub fn stats(&self) -> HeapStats {
        let mapped_bytes = self.regions.total_mapped_bytes();
        HeapStats {
            region_count: self.regions.len(),
            mapped_bytes,
            mapped_pages: page::bytes_to_pages(mapped_bytes, self.page_size),
        }
    }

    /// Destroy the heap, unmapping every region it owns. Consumes `self` by
    /// value so the type system statically prevents use of any pointer
    /// this heap ever returned after this call.
    ///
    /// Always reports success: destruction itself cannot fail, it is only
    /// ever informative about how many blocks were still in use.
    pub fn destroy(self) -> DestroyOutcome {
        let leaked_blocks = leak::count_leaks(&self.regions);
        // `self.regions` drops here, unmapping every region.
        DestroyOutcome { leaked_blocks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_report_mapped_pages_consistent_with_bytes() {
        let mut heap = Heap::init_with_config(HeapConfig {
            arena_granularity: 4096,
            ..Default::default()
        })
        .unwrap();
        let _ = heap.allocate(64).unwrap();

        let stats = heap.stats();
        assert_eq!(stats.region_count, 1);
        assert_eq!(stats.mapped_pages, page::bytes_to_pages(stats.mapped_bytes, heap.page_size));
        assert!(stats.mapped_pages > 0);
    }
}
