//! OS Memory Provider
//!
//! Thin cross-platform wrapper around `memmap2` for anonymous, page-aligned,
//! zero-initialized memory ranges. This is the only module that talks to the
//! OS virtual memory primitives directly; everything above it (the Region
//! Registry) deals in [`MappedRegion`] handles instead of raw `mmap`/`munmap`
//! calls.
//!
//! This layer does no caching of its own — a `map` always asks the OS for a
//! fresh range, and an `unmap` always gives one back. The Region Registry is
//! the layer responsible for amortizing OS calls (arena granularity).

use crate::error::{MallocError, Result};
use memmap2::MmapMut;

/// A single OS-backed mapping, owning the underlying pages for as long as it
/// lives. Dropping a `MappedRegion` unmaps it — this is how `unmap` is
/// implemented: there is no separate "free" call, ownership transfer (drop)
/// *is* the unmap.
pub struct MappedRegion {
    mmap: MmapMut,
    base: usize,
    size: usize,
}

impl MappedRegion {
    /// Map a fresh, anonymous, zero-initialized region of at least `size`
    /// bytes, rounded up to a page multiple by the OS/`memmap2`.
    ///
    /// # Errors
    /// Returns [`MallocError::VirtualMemoryError`] if `size` is zero — not a
    /// failure the OS reports, but an invalid request this layer rejects
    /// before ever making the syscall. Returns [`MallocError::OutOfMemory`]
    /// if the OS itself refuses the mapping (out of address space, RLIMIT
    /// exceeded, etc) — per §4.1, "map(pages) ... fails with OutOfMemory".
    /// Per §4.1, this layer never retries; the caller (Region Registry)
    /// decides what to do next.
    pub fn map(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(MallocError::VirtualMemoryError(
                "cannot map a zero-byte region".to_string(),
            ));
        }

        let mmap = MmapMut::map_anon(size).map_err(|_| MallocError::OutOfMemory {
            requested: size,
            available: 0,
        })?;

        let base = mmap.as_ptr() as usize;

        Ok(Self {
            mmap,
            base,
            size,
        })
    }

    /// Base address of the mapping.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Size of the mapping in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Raw mutable pointer to the start of the mapping.
    ///
    /// # Safety
    /// The caller is responsible for confining all reads/writes through this
    /// pointer to `[ptr, ptr + size())`.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }
}

// `unmap` has no explicit method: dropping the `MmapMut` returns the pages to
// the OS. Keeping unmap implicit-via-Drop (rather than an explicit method
// callers must remember to invoke) is the whole point of owning the mapping
// inside the region that owns the blocks built on top of it.
