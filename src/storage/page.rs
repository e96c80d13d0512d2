//! Page identity and the in-memory page representation.

pub mod heap_page;

use crate::transaction::TransactionId;
use serde::{Deserialize, Serialize};

pub use heap_page::HeapPage;

/// Identity of a page: owning table plus page number within its file.
/// Structural equality serves as the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId {
    pub table_id: u32,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: u32, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// A fixed-length byte block held in the buffer pool.
///
/// A cached page is the authoritative version of its contents; bytes reach
/// disk only through `BufferPool::flush_page`. The before-image is the last
/// clean on-disk content and feeds the WAL update record when the page is
/// flushed.
#[derive(Debug, Clone)]
pub struct Page {
    pid: PageId,
    data: Vec<u8>,
    before_image: Vec<u8>,
    dirtier: Option<TransactionId>,
}

impl Page {
    /// Wraps bytes freshly read from disk. The page starts clean and its
    /// before-image equals its contents.
    pub fn new(pid: PageId, data: Vec<u8>) -> Self {
        let before_image = data.clone();
        Self {
            pid,
            data,
            before_image,
            dirtier: None,
        }
    }

    /// A zeroed page: empty slot bitmap, no tuples.
    pub fn empty(pid: PageId, page_size: usize) -> Self {
        Self::new(pid, vec![0u8; page_size])
    }

    pub fn pid(&self) -> PageId {
        self.pid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The transaction that dirtied this page, if any.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    /// Marks the page dirtied by `tid`, or clean when `None`.
    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirtier = tid;
    }

    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }

    /// Snapshots the current contents as the new before-image. Called after
    /// a flush puts those bytes on disk.
    pub fn set_before_image(&mut self) {
        self.before_image = self.data.clone();
    }
}
