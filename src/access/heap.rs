//! Heap file: an unordered sequence of fixed-size pages holding tuples of
//! a single schema.
//!
//! Once a transaction exists, the heap file never reads pages from disk on
//! its own behalf; every page it works on comes through the buffer pool
//! under the required permission. Raw disk I/O here is limited to
//! `read_page`/`write_page` (called by the pool) and extending the file
//! with a fresh empty page.

use crate::access::scan::HeapScan;
use crate::access::tuple::{Tuple, TupleDesc};
use crate::concurrency::lock::Permissions;
use crate::error::{DbError, DbResult};
use crate::storage::buffer::{BufferPool, PageHandle};
use crate::storage::page::heap_page::HeapPage;
use crate::storage::page::{Page, PageId};
use crate::transaction::TransactionId;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// On-disk container of heap pages. The file is a bare concatenation of
/// pages, no header.
pub struct HeapFile {
    path: PathBuf,
    table_id: u32,
    desc: Arc<TupleDesc>,
    page_size: usize,
    file: Mutex<File>,
}

impl HeapFile {
    /// Opens (creating if absent) the heap file at `path`.
    pub fn open(path: impl AsRef<Path>, desc: Arc<TupleDesc>, page_size: usize) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;
        // Hash the absolute path so reopening the same file recovers the
        // same table id.
        let path = path.as_ref().canonicalize()?;
        let table_id = Self::table_id_for(&path);
        Ok(Self {
            path,
            table_id,
            desc,
            page_size,
            file: Mutex::new(file),
        })
    }

    fn table_id_for(path: &Path) -> u32 {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        hasher.finish() as u32
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of whole pages in the file (floor division).
    pub fn num_pages(&self) -> DbResult<u32> {
        let file = self.file.lock();
        let len = file.metadata()?.len();
        Ok((len / self.page_size as u64) as u32)
    }

    /// Reads one page directly from disk. Pure function of disk state; no
    /// locking. Fails with `InvalidPage` when the page lies past the end of
    /// the file.
    pub fn read_page(&self, pid: PageId) -> DbResult<Page> {
        if pid.table_id != self.table_id {
            return Err(DbError::InvalidPage {
                table_id: pid.table_id,
                page_no: pid.page_no,
            });
        }
        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        let end = (pid.page_no as u64 + 1) * self.page_size as u64;
        if end > len {
            return Err(DbError::InvalidPage {
                table_id: pid.table_id,
                page_no: pid.page_no,
            });
        }
        file.seek(SeekFrom::Start(pid.page_no as u64 * self.page_size as u64))?;
        let mut buf = vec![0u8; self.page_size];
        file.read_exact(&mut buf).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                DbError::InvalidPage {
                    table_id: pid.table_id,
                    page_no: pid.page_no,
                }
            } else {
                DbError::Io(e)
            }
        })?;
        Ok(Page::new(pid, buf))
    }

    /// Writes a page's serialized bytes at its offset. Called only by the
    /// buffer pool under flush.
    pub fn write_page(&self, page: &Page) -> DbResult<()> {
        let pid = page.pid();
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pid.page_no as u64 * self.page_size as u64))?;
        file.write_all(page.data())?;
        file.flush()?;
        Ok(())
    }

    /// Extends the file with a zeroed page through raw disk I/O and returns
    /// its id.
    fn append_empty_page(&self) -> DbResult<PageId> {
        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        let page_no = (len / self.page_size as u64) as u32;
        file.seek(SeekFrom::Start(page_no as u64 * self.page_size as u64))?;
        file.write_all(&vec![0u8; self.page_size])?;
        file.flush()?;
        Ok(PageId::new(self.table_id, page_no))
    }

    /// Inserts a tuple under `tid`, returning the pages it dirtied.
    ///
    /// Pages are probed under shared permission since looking for space is
    /// read-only; the chosen page is then re-requested exclusive, which
    /// upgrades in place when `tid` is the sole holder and otherwise waits
    /// out (or deadlock-aborts against) concurrent holders. Probe locks on
    /// full pages are released so the transaction does not pin read locks
    /// on pages it will never modify.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        mut tuple: Tuple,
    ) -> DbResult<Vec<PageHandle>> {
        for page_no in 0..self.num_pages()? {
            let pid = PageId::new(self.table_id, page_no);
            let handle = pool.get_page(tid, pid, Permissions::ReadOnly)?;
            let has_space = {
                let mut page = handle.write();
                HeapPage::new(&mut page, &self.desc).empty_slot_count() > 0
            };
            if !has_space {
                pool.release_shared(tid, pid);
                continue;
            }
            // The shared hold pins the page contents while the exclusive
            // request is in flight, so the space cannot vanish.
            let handle = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            {
                let mut page = handle.write();
                let mut heap = HeapPage::new(&mut page, &self.desc);
                heap.insert_tuple(&mut tuple)?;
                page.mark_dirty(Some(tid));
            }
            return Ok(vec![handle]);
        }

        // Every existing page is full: extend the file, then take the new
        // page exclusive through the pool.
        let pid = self.append_empty_page()?;
        let handle = pool.get_page(tid, pid, Permissions::ReadWrite)?;
        {
            let mut page = handle.write();
            let mut heap = HeapPage::new(&mut page, &self.desc);
            heap.insert_tuple(&mut tuple)?;
            page.mark_dirty(Some(tid));
        }
        Ok(vec![handle])
    }

    /// Deletes the tuple named by its record id, returning the dirtied page.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> DbResult<Vec<PageHandle>> {
        let rid = tuple.record_id().ok_or(DbError::MissingRecordId)?;
        let handle = pool.get_page(tid, rid.pid, Permissions::ReadWrite)?;
        {
            let mut page = handle.write();
            let mut heap = HeapPage::new(&mut page, &self.desc);
            heap.delete_tuple(rid)?;
            page.mark_dirty(Some(tid));
        }
        Ok(vec![handle])
    }

    /// A restartable cursor over all live tuples, fetching each page under
    /// shared permission so it inherits 2PL and deadlock behavior.
    pub fn scan<'a>(&'a self, pool: &'a BufferPool, tid: TransactionId) -> HeapScan<'a> {
        HeapScan::new(self, pool, tid)
    }
}
