//! Configuration Module - Allocator Tuning Parameters
//!
//! Policy knobs for the allocator (arena granularity, the large-object
//! threshold, the minimum splittable residual, whether empty arenas are
//! released) live here, with defaults chosen to behave well at the
//! standard page size.

use thiserror::Error;

use crate::block::MIN_BLOCK;
use crate::util::alignment::Alignment;

/// Default arena region size: large enough to amortize OS mapping calls for
/// a long run of small/medium allocations, small enough that a single
/// mostly-empty arena doesn't waste much address space.
pub const DEFAULT_ARENA_GRANULARITY: usize = 1024 * 1024;

/// Default large-object threshold, expressed in OS pages. Allocations whose
/// effective block size exceeds `page_size * DEFAULT_ARENA_THRESHOLD_PAGES`
/// take the dedicated-region path instead of the arena path.
pub const DEFAULT_ARENA_THRESHOLD_PAGES: usize = 4;

/// Configuration for a [`crate::heap::Heap`].
///
/// # Examples
///
/// ```
/// use gorilla_malloc::config::HeapConfig;
///
/// let config = HeapConfig::default();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Minimum size (bytes) of a freshly acquired arena region, before
    /// rounding up to a page multiple. Large enough requests round this up
    /// further so a single request is never split across regions.
    pub arena_granularity: usize,

    /// Number of OS pages above which an allocation's effective block size
    /// is routed to the dedicated large-object path instead of the arena
    /// free-list path. The effective byte threshold is resolved against the
    /// heap's page size at `init` time.
    pub arena_threshold_pages: usize,

    /// Whether a fully-coalesced arena region (one free block spanning the
    /// entire region) is released back to the OS immediately, or kept
    /// around for reuse by later allocations.
    pub shrink_empty_arenas: bool,

    /// Minimum pointer alignment honored for every payload, in bytes. Must
    /// be a power of two and at least the platform word size.
    pub min_alignment: usize,

    /// Enable verbose allocator event logging via the `log` facade.
    pub verbose: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            arena_granularity: DEFAULT_ARENA_GRANULARITY,
            arena_threshold_pages: DEFAULT_ARENA_THRESHOLD_PAGES,
            shrink_empty_arenas: true,
            min_alignment: Alignment::DEFAULT,
            verbose: false,
        }
    }
}

/// Configuration validation error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid arena granularity: {0}")]
    InvalidArenaGranularity(String),

    #[error("invalid arena threshold: {0}")]
    InvalidArenaThreshold(String),

    #[error("invalid alignment: {0}")]
    InvalidAlignment(String),
}

impl HeapConfig {
    /// Validate that all configuration values are in range.
    ///
    /// # Examples
    ///
    /// ```
    /// use gorilla_malloc::config::HeapConfig;
    ///
    /// let config = HeapConfig { arena_granularity: 0, ..Default::default() };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arena_granularity == 0 {
            return Err(ConfigError::InvalidArenaGranularity(
                "arena_granularity must be > 0".to_string(),
            ));
        }

        if self.arena_threshold_pages == 0 {
            return Err(ConfigError::InvalidArenaThreshold(
                "arena_threshold_pages must be > 0".to_string(),
            ));
        }

        if self.min_alignment == 0 || !self.min_alignment.is_power_of_two() {
            return Err(ConfigError::InvalidAlignment(
                "min_alignment must be a power of two".to_string(),
            ));
        }

        if self.min_alignment < std::mem::size_of::<usize>() {
            return Err(ConfigError::InvalidAlignment(format!(
                "min_alignment must be at least the platform word size ({})",
                std::mem::size_of::<usize>()
            )));
        }

        Ok(())
    }

    /// Validate the cross-field constraints that only make sense once the
    /// heap's page size is known. Called by [`crate::heap::Heap::init_with_config`]
    /// after [`crate::heap::page::query_page_size`], in addition to (not instead
    /// of) [`Self::validate`].
    ///
    /// # Examples
    ///
    /// ```
    /// use gorilla_malloc::config::HeapConfig;
    ///
    /// let config = HeapConfig { arena_threshold_pages: 0, ..Default::default() };
    /// // arena_threshold_pages == 0 is already caught by `validate()`.
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate_with_page_size(&self, page_size: usize) -> Result<(), ConfigError> {
        let threshold_bytes = self.arena_threshold_pages.checked_mul(page_size).ok_or_else(|| {
            ConfigError::InvalidArenaThreshold(format!(
                "arena_threshold_pages ({}) * page_size ({}) overflows usize",
                self.arena_threshold_pages, page_size
            ))
        })?;

        if threshold_bytes <= MIN_BLOCK {
            return Err(ConfigError::InvalidArenaThreshold(format!(
                "arena_threshold_pages * page_size ({} bytes) must exceed the minimum \
                 block size ({} bytes), or every allocation would be routed to the \
                 large path regardless of size",
                threshold_bytes, MIN_BLOCK
            )));
        }

        if self
            .arena_granularity
            .checked_add(page_size.saturating_sub(1))
            .is_none()
        {
            return Err(ConfigError::InvalidArenaGranularity(format!(
                "arena_granularity ({}) overflows when rounded up to a multiple of \
                 page_size ({})",
                self.arena_granularity, page_size
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(HeapConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_granularity_is_rejected() {
        let config = HeapConfig {
            arena_granularity: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidArenaGranularity(
                "arena_granularity must be > 0".to_string()
            ))
        );
    }

    #[test]
    fn non_power_of_two_alignment_is_rejected() {
        let config = HeapConfig {
            min_alignment: 12,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn sub_word_alignment_is_rejected() {
        let config = HeapConfig {
            min_alignment: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_is_valid_with_page_size() {
        assert!(HeapConfig::default().validate_with_page_size(4096).is_ok());
    }

    #[test]
    fn threshold_below_min_block_is_rejected() {
        // 1 page at a tiny page size resolves to fewer bytes than MIN_BLOCK,
        // which would route every allocation - even zero-byte ones - to the
        // large path and silently defeat the arena/free-list machinery.
        let config = HeapConfig {
            arena_threshold_pages: 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate_with_page_size(8),
            Err(ConfigError::InvalidArenaThreshold(_))
        ));
    }

    #[test]
    fn threshold_comfortably_above_min_block_is_accepted() {
        let config = HeapConfig {
            arena_threshold_pages: 4,
            ..Default::default()
        };
        assert!(config.validate_with_page_size(4096).is_ok());
    }

    #[test]
    fn granularity_overflow_on_resolve_is_rejected() {
        let config = HeapConfig {
            arena_granularity: usize::MAX,
            ..Default::default()
        };
        assert!(matches!(
            config.validate_with_page_size(4096),
            Err(ConfigError::InvalidArenaGranularity(_))
        ));
    }
}
