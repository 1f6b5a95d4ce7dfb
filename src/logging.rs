//! Allocator Event Logging
//!
//! Thin structured-logging layer over the `log` facade. The allocator itself
//! never decides how logs are rendered or where they go — that's up to
//! whatever logger the embedding application installs (`env_logger` in our
//! tests and benches).

/// An event worth logging at the allocator's discretion.
///
/// Kept intentionally small: no histograms, pause timers, or per-cycle
/// metrics, just the handful of events useful for diagnosing allocator
/// behavior.
#[derive(Debug, Clone)]
pub enum AllocEvent {
    /// A fresh arena region was mapped from the OS.
    ArenaAcquired { base: usize, size: usize },
    /// A fully-coalesced arena region was released back to the OS.
    ArenaReleased { base: usize, size: usize },
    /// A dedicated large-object region was mapped from the OS.
    LargeRegionAcquired { base: usize, size: usize },
    /// A dedicated large-object region was released back to the OS.
    LargeRegionReleased { base: usize, size: usize },
    /// An allocation request could not be satisfied.
    AllocationFailed { requested: usize },
    /// A reallocation fell back to allocate-copy-free instead of resizing
    /// in place.
    ReallocFallback { old_size: usize, new_size: usize },
}

/// Emit an [`AllocEvent`] at the appropriate log level.
pub fn log_event(event: &AllocEvent) {
    match event {
        AllocEvent::ArenaAcquired { base, size } => {
            log::debug!("arena region acquired: base={:#x} size={}", base, size);
        }
        AllocEvent::ArenaReleased { base, size } => {
            log::debug!("arena region released: base={:#x} size={}", base, size);
        }
        AllocEvent::LargeRegionAcquired { base, size } => {
            log::debug!("large region acquired: base={:#x} size={}", base, size);
        }
        AllocEvent::LargeRegionReleased { base, size } => {
            log::debug!("large region released: base={:#x} size={}", base, size);
        }
        AllocEvent::AllocationFailed { requested } => {
            log::warn!("allocation failed: requested {} bytes", requested);
        }
        AllocEvent::ReallocFallback { old_size, new_size } => {
            log::trace!(
                "realloc fallback: old_size={} new_size={}",
                old_size,
                new_size
            );
        }
    }
}
