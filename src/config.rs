//! Engine configuration.

use std::path::{Path, PathBuf};

/// Default bytes per page, including the slot-bitmap header.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages the buffer pool caches.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Configuration for a [`Database`](crate::database::Database) instance.
///
/// Page size is a per-instance value, not a process global: tests that need
/// a small page construct their own `DbConfig` instead of mutating shared
/// state.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Bytes per page.
    pub page_size: usize,
    /// Buffer pool capacity in pages.
    pub num_pages: usize,
    /// Directory holding table files and the write-ahead log.
    pub data_dir: PathBuf,
}

impl DbConfig {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            num_pages: DEFAULT_POOL_PAGES,
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_pages(mut self, num_pages: usize) -> Self {
        self.num_pages = num_pages;
        self
    }
}
