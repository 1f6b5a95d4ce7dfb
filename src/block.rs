//! Block Layout
//!
//! The in-band header every allocated or free block carries, and the dual
//! physical linkage that lets the [`crate::dealloc`] coalescer merge
//! neighbors in O(1) without ever scanning the heap.
//!
//! ```text
//!   +----------------+----------------+----------------+----------------+
//!   |  total_size    |  prev_phys     |  flags/region  |   payload...   |
//!   +----------------+----------------+----------------+----------------+
//!   ^ header starts here              ^ user pointer starts here
//! ```
//!
//! `total_size` is the size of header + payload, always a multiple of
//! [`WORD_ALIGN`]. Walking forward by `total_size` bytes from a block's own
//! address reaches the next block physically adjacent in memory (the "next
//! physical" link — never stored, always computed). `prev_phys` stores the
//! *size* of the previous physical block, which is enough to step backward:
//! `prev_block_addr = this_addr - prev_phys_size`. Together these give O(1)
//! coalescing in both directions without a boundary tag duplicated at the
//! tail of every block.
//!
//! When a block is free, the first two words of its payload are reclaimed to
//! store the intrusive free-list `next`/`prev` links (see
//! [`FreeLinks`]). This is why [`MIN_PAYLOAD`] exists: a block too small to
//! hold two pointers can never be put on a free list, so it can never be
//! split off as a separate free block either.

use std::mem::size_of;
use std::ptr::NonNull;

/// Word-level alignment every block address and size respects.
pub const WORD_ALIGN: usize = size_of::<usize>();

/// Size of [`BlockHeader`] in bytes — also the offset between a block's own
/// address and the user-visible payload pointer returned by `allocate`.
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Smallest payload that can ever be carved out as its own free block: large
/// enough to hold the intrusive free-list `next`/`prev` pointers.
pub const MIN_PAYLOAD: usize = 2 * WORD_ALIGN;

/// Smallest total block size the allocator will ever produce by splitting.
pub const MIN_BLOCK: usize = HEADER_SIZE + MIN_PAYLOAD;

/// Which region-kind a block was carved out of. Carried for leak reporting
/// and for the realloc policy's large-block fallback rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Carved from a segregated arena region, subject to split/coalesce.
    Arena,
    /// The sole block of a dedicated large-object region.
    Large,
}

/// In-use vs. free. Stored packed into [`BlockHeader::flags`] rather than as
/// its own field to keep the header to a single cache line for small blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Free,
    InUse,
}

const FLAG_FREE: usize = 0;
const FLAG_IN_USE: usize = 1;
const FLAG_KIND_LARGE: usize = 1 << 1;

/// The in-band block header. `#[repr(C)]` so field order and size are
/// stable across compilations — other code recovers a `*mut BlockHeader`
/// purely from a user pointer's address, so layout drift here would corrupt
/// every live allocation.
#[repr(C)]
pub struct BlockHeader {
    /// Header + payload size, in bytes. Always a multiple of [`WORD_ALIGN`].
    pub total_size: usize,
    /// Size of the physically-preceding block, or 0 if this is the first
    /// block in its region. Used to step backward for coalescing.
    pub prev_phys_size: usize,
    /// Identity of the owning region (its base address), used to find the
    /// region's bounds and kind during coalescing and leak enumeration.
    pub region_base: usize,
    /// Packed state: free/in-use bit plus the block-kind bit.
    flags: usize,
}

impl BlockHeader {
    /// Payload size usable by the caller: `total_size` minus the header.
    pub fn payload_size(&self) -> usize {
        self.total_size - HEADER_SIZE
    }

    pub fn state(&self) -> BlockState {
        if self.flags & FLAG_IN_USE != 0 {
            BlockState::InUse
        } else {
            BlockState::Free
        }
    }

    pub fn set_state(&mut self, state: BlockState) {
        match state {
            BlockState::Free => self.flags &= !FLAG_IN_USE,
            BlockState::InUse => self.flags |= FLAG_IN_USE,
        }
    }

    pub fn kind(&self) -> BlockKind {
        if self.flags & FLAG_KIND_LARGE != 0 {
            BlockKind::Large
        } else {
            BlockKind::Arena
        }
    }

    pub fn set_kind(&mut self, kind: BlockKind) {
        match kind {
            BlockKind::Arena => self.flags &= !FLAG_KIND_LARGE,
            BlockKind::Large => self.flags |= FLAG_KIND_LARGE,
        }
    }

    /// Initialize a header in place at `addr`, covering `total_size` bytes,
    /// inside the region based at `region_base`. Starts `Free`.
    ///
    /// # Safety
    /// `addr` must point to at least `total_size` writable, properly aligned
    /// bytes that are not currently interpreted as any other live object.
    pub unsafe fn init(
        addr: *mut u8,
        total_size: usize,
        prev_phys_size: usize,
        region_base: usize,
        kind: BlockKind,
    ) -> *mut BlockHeader {
        debug_assert!(total_size >= MIN_BLOCK);
        debug_assert_eq!(total_size % WORD_ALIGN, 0);

        let hdr = addr as *mut BlockHeader;
        let flags = FLAG_FREE
            | match kind {
                BlockKind::Arena => 0,
                BlockKind::Large => FLAG_KIND_LARGE,
            };
        hdr.write(BlockHeader {
            total_size,
            prev_phys_size,
            region_base,
            flags,
        });
        hdr
    }

    /// Address of this header.
    pub fn addr(&self) -> usize {
        self as *const BlockHeader as usize
    }

    /// User-visible payload pointer for an in-use block.
    pub fn payload_ptr(&self) -> *mut u8 {
        unsafe { (self as *const BlockHeader as *mut u8).add(HEADER_SIZE) }
    }

    /// Recover the owning `BlockHeader` from a user-visible payload pointer.
    ///
    /// # Safety
    /// `ptr` must be a pointer previously returned by this heap's
    /// `allocate`/`reallocate`, not yet freed.
    pub unsafe fn from_payload_ptr(ptr: *mut u8) -> NonNull<BlockHeader> {
        let hdr_ptr = ptr.sub(HEADER_SIZE) as *mut BlockHeader;
        NonNull::new_unchecked(hdr_ptr)
    }

    /// Address of the block physically following this one.
    pub fn next_phys_addr(&self) -> usize {
        self.addr() + self.total_size
    }

    /// Address of the block physically preceding this one, or `None` if
    /// this is the first block in its region.
    pub fn prev_phys_addr(&self) -> Option<usize> {
        if self.prev_phys_size == 0 {
            None
        } else {
            Some(self.addr() - self.prev_phys_size)
        }
    }
}

/// Intrusive free-list links, stored in the first two words of a free
/// block's payload. Never valid to read while the block is in use — reading
/// `FreeLinks` from an in-use block would read user data as if it were
/// pointers.
pub struct FreeLinks;

impl FreeLinks {
    /// Read the `next` link out of `hdr`'s payload.
    ///
    /// # Safety
    /// `hdr` must currently be `Free` and have payload_size >= [`MIN_PAYLOAD`].
    pub unsafe fn next(hdr: &BlockHeader) -> usize {
        let p = hdr.payload_ptr() as *const usize;
        p.read()
    }

    /// Read the `prev` link out of `hdr`'s payload.
    ///
    /// # Safety
    /// Same requirements as [`FreeLinks::next`].
    pub unsafe fn prev(hdr: &BlockHeader) -> usize {
        let p = (hdr.payload_ptr() as *const usize).add(1);
        p.read()
    }

    /// Write the `next` link into `hdr`'s payload.
    ///
    /// # Safety
    /// Same requirements as [`FreeLinks::next`].
    pub unsafe fn set_next(hdr: &mut BlockHeader, next: usize) {
        let p = hdr.payload_ptr() as *mut usize;
        p.write(next);
    }

    /// Write the `prev` link into `hdr`'s payload.
    ///
    /// # Safety
    /// Same requirements as [`FreeLinks::next`].
    pub unsafe fn set_prev(hdr: &mut BlockHeader, prev: usize) {
        let p = (hdr.payload_ptr() as *mut usize).add(1);
        p.write(prev);
    }
}
