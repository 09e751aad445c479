//! Explicit, constructor-supplied configuration. No global mutable config:
//! every component that needs a tunable gets it passed in.

use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const DEFAULT_NUM_PAGES: usize = 50;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_WAIT_GRANULARITY_MS: u64 = 50;

/// Tunables threaded through `Database::new` and the catalog loader.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Size in bytes of every page, on disk and in the buffer pool.
    pub page_size: usize,
    /// Maximum number of pages the buffer pool may cache at once.
    pub num_pages: usize,
    /// Total time a lock request may block before aborting its transaction.
    pub lock_timeout: Duration,
    /// How long the lock manager sleeps between grant re-checks.
    pub wait_granularity: Duration,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            page_size: DEFAULT_PAGE_SIZE,
            num_pages: DEFAULT_NUM_PAGES,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            wait_granularity: Duration::from_millis(DEFAULT_WAIT_GRANULARITY_MS),
        }
    }
}

impl EngineConfig {
    /// Build a config for tests: small page size, small pool, short timeouts
    /// so deadlock/timeout tests don't take a second of wall-clock time.
    pub fn for_tests(page_size: usize, num_pages: usize) -> EngineConfig {
        EngineConfig {
            page_size,
            num_pages,
            lock_timeout: Duration::from_millis(300),
            wait_granularity: Duration::from_millis(10),
        }
    }
}
