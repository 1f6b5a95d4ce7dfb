//! Test Utilities for the gorilla-malloc Bug-Finding Test Suite
//!
//! Strict assertions, zero tolerance. These helpers exist to find bugs in
//! the allocator, not to make tests pass comfortably.

use gorilla_malloc::{Heap, HeapConfig};
use std::collections::HashSet;
use std::sync::Once;

static LOG_INIT: Once = Once::new();

/// Install `env_logger` once per test binary. Run with `RUST_LOG=debug` to
/// see allocator event logs (region acquisition, coalescing, allocation
/// failures) alongside a failing assertion.
fn init_logging() {
    LOG_INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// A heap configured with small arena granularity so tests can exhaust a
/// fresh region in a handful of allocations instead of thousands.
pub fn small_arena_heap() -> Heap {
    init_logging();
    let config = HeapConfig {
        arena_granularity: 4096,
        verbose: true,
        ..Default::default()
    };
    Heap::init_with_config(config).expect("heap init with valid config should succeed")
}

/// A heap with default configuration.
pub fn default_heap() -> Heap {
    init_logging();
    let config = HeapConfig {
        verbose: true,
        ..Default::default()
    };
    Heap::init_with_config(config).expect("heap init should succeed")
}

/// Fill `len` bytes starting at `ptr` with a byte pattern derived from
/// `seed`, one distinct value per call site so collisions are obvious.
///
/// # Safety
/// `ptr` must point to at least `len` writable bytes.
pub unsafe fn fill_pattern(ptr: *mut u8, len: usize, seed: u8) {
    for i in 0..len {
        ptr.add(i).write(seed.wrapping_add(i as u8));
    }
}

/// Verify that `len` bytes starting at `ptr` match the pattern written by
/// [`fill_pattern`] with the same `seed`.
///
/// # Safety
/// `ptr` must point to at least `len` readable bytes.
#[track_caller]
pub unsafe fn assert_pattern(ptr: *mut u8, len: usize, seed: u8, context: &str) {
    for i in 0..len {
        let expected = seed.wrapping_add(i as u8);
        let actual = ptr.add(i).read();
        assert_eq!(
            actual, expected,
            "{}: byte {} corrupted (expected {:#x}, got {:#x}) - write/read round-trip broken",
            context, i, expected, actual
        );
    }
}

/// Assert that every address in `addresses` is distinct.
///
/// **Bug this finds:** two live allocations aliasing the same memory.
#[track_caller]
pub fn assert_all_addresses_unique(addresses: &[usize], context: &str) {
    let unique: HashSet<_> = addresses.iter().collect();
    assert_eq!(
        unique.len(),
        addresses.len(),
        "{}: found {} duplicate address(es) out of {} live allocations - \
         two allocations are aliasing the same memory",
        context,
        addresses.len() - unique.len(),
        addresses.len()
    );
}

/// Assert that `address` is aligned to at least `alignment` bytes.
///
/// **Bug this finds:** a returned pointer that violates the allocator's
/// word-alignment contract.
#[track_caller]
pub fn assert_address_aligned(address: usize, alignment: usize, context: &str) {
    assert_eq!(
        address % alignment,
        0,
        "{}: address {:#x} is not {}-byte aligned",
        context,
        address,
        alignment
    );
}
