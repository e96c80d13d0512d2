//! Sequential scan over a heap file.

use crate::access::heap::HeapFile;
use crate::access::tuple::Tuple;
use crate::concurrency::lock::Permissions;
use crate::error::DbResult;
use crate::storage::buffer::BufferPool;
use crate::storage::page::heap_page::HeapPage;
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::collections::VecDeque;

/// Restartable cursor over all live tuples of a heap file.
///
/// Every page it touches is fetched through the buffer pool under shared
/// permission, so the scan participates in 2PL and can become a deadlock
/// victim like any other page access. Empty pages are skipped; `rewind`
/// restarts from page zero. The shared locks taken while scanning stay
/// held until the transaction completes.
pub struct HeapScan<'a> {
    file: &'a HeapFile,
    pool: &'a BufferPool,
    tid: TransactionId,
    num_pages: u32,
    next_page: u32,
    buffered: VecDeque<Tuple>,
    opened: bool,
}

impl<'a> HeapScan<'a> {
    pub(crate) fn new(file: &'a HeapFile, pool: &'a BufferPool, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            num_pages: 0,
            next_page: 0,
            buffered: VecDeque::new(),
            opened: false,
        }
    }

    /// Positions the cursor at page zero. The page count is snapshotted
    /// here; pages appended afterwards belong to a later scan.
    pub fn open(&mut self) -> DbResult<()> {
        self.num_pages = self.file.num_pages()?;
        self.next_page = 0;
        self.buffered.clear();
        self.opened = true;
        Ok(())
    }

    /// The next live tuple, or `None` when pages are exhausted. Opens the
    /// cursor on first use.
    pub fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.opened {
            self.open()?;
        }
        loop {
            if let Some(tuple) = self.buffered.pop_front() {
                return Ok(Some(tuple));
            }
            if self.next_page >= self.num_pages {
                return Ok(None);
            }
            let pid = PageId::new(self.file.table_id(), self.next_page);
            self.next_page += 1;

            let handle = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
            let mut page = handle.write();
            let heap = HeapPage::new(&mut page, self.file.desc());
            self.buffered.extend(heap.tuples()?);
        }
    }

    /// Equivalent to close followed by open.
    pub fn rewind(&mut self) -> DbResult<()> {
        self.close();
        self.open()
    }

    pub fn close(&mut self) {
        self.opened = false;
        self.buffered.clear();
    }

    /// Drains the remainder of the scan into a vector.
    pub fn collect_remaining(&mut self) -> DbResult<Vec<Tuple>> {
        let mut out = Vec::new();
        while let Some(tuple) = self.next()? {
            out.push(tuple);
        }
        Ok(out)
    }
}
