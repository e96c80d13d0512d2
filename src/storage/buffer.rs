//! The buffer pool: bounded page cache and transaction coordinator.
//!
//! All page access goes through [`BufferPool::get_page`], which admits the
//! request through the lock manager, serves cache hits, and on a miss reads
//! the page from its heap file, evicting a clean victim when the cache is
//! full. Commit flushes a transaction's dirty pages through the write-ahead
//! log (STEAL/NO-FORCE: the update record is forced before the page write
//! lands); abort discards them and reloads the last committed image from
//! disk.

pub mod replacer;

use crate::catalog::Catalog;
use crate::concurrency::lock::{LockAttempt, LockManager, Permissions};
use crate::error::{DbError, DbResult};
use crate::storage::page::{Page, PageId};
use crate::storage::wal::LogFile;
use crate::transaction::TransactionId;
use log::{debug, error, warn};
use parking_lot::{Mutex, RwLock};
use replacer::LruReplacer;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Shared handle to a cached page.
pub type PageHandle = Arc<RwLock<Page>>;

/// Sleep between lock-acquisition retries; a fairness knob, not a timeout.
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

pub struct BufferPool {
    capacity: usize,
    catalog: Arc<Catalog>,
    log: Arc<LogFile>,
    lock_manager: LockManager,
    cache: Mutex<HashMap<PageId, PageHandle>>,
    replacer: Mutex<LruReplacer>,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, log: Arc<LogFile>, capacity: usize) -> Self {
        Self {
            capacity,
            catalog,
            log,
            lock_manager: LockManager::new(),
            cache: Mutex::new(HashMap::with_capacity(capacity)),
            replacer: Mutex::new(LruReplacer::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retrieves the page under the given permission, blocking (by bounded
    /// retry) until the lock is granted or the deadlock detector elects the
    /// transaction as a victim. A victim is rolled back, its locks are
    /// released, and `TransactionAborted` surfaces.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> DbResult<PageHandle> {
        loop {
            let attempt = match perm {
                Permissions::ReadOnly => self.lock_manager.acquire_shared(tid, pid),
                Permissions::ReadWrite => self.lock_manager.acquire_exclusive(tid, pid),
            };
            match attempt {
                LockAttempt::Granted => break,
                LockAttempt::Blocked => thread::sleep(RETRY_INTERVAL),
                LockAttempt::Deadlock => {
                    warn!("{} chosen as deadlock victim on page {}", tid, pid);
                    self.transaction_complete(tid, false)?;
                    return Err(DbError::TransactionAborted(tid));
                }
            }
        }

        let mut cache = self.cache.lock();
        if let Some(handle) = cache.get(&pid) {
            let handle = handle.clone();
            self.replacer.lock().update(pid)?;
            return Ok(handle);
        }

        if cache.len() >= self.capacity {
            self.evict_one(&mut cache)?;
        }
        let file = self.catalog.file(pid.table_id)?;
        let page = file.read_page(pid)?;
        let handle = Arc::new(RwLock::new(page));
        cache.insert(pid, handle.clone());
        self.replacer.lock().add(pid);
        Ok(handle)
    }

    /// Inserts a tuple into the table on behalf of `tid`, then installs the
    /// dirtied pages in the cache.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: u32,
        tuple: crate::access::tuple::Tuple,
    ) -> DbResult<()> {
        let file = self.catalog.file(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        self.admit_dirty(tid, pages)
    }

    /// Deletes the tuple named by its record id on behalf of `tid`.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &crate::access::tuple::Tuple,
    ) -> DbResult<()> {
        let rid = tuple.record_id().ok_or(DbError::MissingRecordId)?;
        let file = self.catalog.file(rid.pid.table_id)?;
        let pages = file.delete_tuple(self, tid, tuple)?;
        self.admit_dirty(tid, pages)
    }

    /// Marks pages dirtied by an access method and makes sure the cache and
    /// replacer see them: a cached page is touched at the MRU end, an
    /// uncached one (for example, evicted while still referenced by the
    /// access method) is re-installed, evicting if needed.
    fn admit_dirty(&self, tid: TransactionId, pages: Vec<PageHandle>) -> DbResult<()> {
        for handle in pages {
            let pid = {
                let mut page = handle.write();
                page.mark_dirty(Some(tid));
                page.pid()
            };
            let mut cache = self.cache.lock();
            if cache.contains_key(&pid) {
                self.replacer.lock().update(pid)?;
            } else {
                if cache.len() >= self.capacity {
                    self.evict_one(&mut cache)?;
                }
                cache.insert(pid, handle.clone());
                self.replacer.lock().add(pid);
            }
        }
        Ok(())
    }

    /// Commits or aborts `tid`. The transaction's locks are released even
    /// when a flush or rollback fails partway; the error still surfaces so
    /// the caller knows durability was not achieved. A commit that dirtied
    /// nothing (a read-only transaction, or one already rolled back by the
    /// deadlock detector) appends no log record.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> DbResult<()> {
        let result = if commit {
            let dirty = self.dirty_pages_of(tid);
            dirty
                .iter()
                .try_for_each(|&pid| self.flush_page(pid))
                .and_then(|()| {
                    if dirty.is_empty() {
                        Ok(())
                    } else {
                        self.log.log_commit(tid)
                    }
                })
        } else {
            self.rollback(tid).and_then(|()| self.log.log_abort(tid))
        };
        self.lock_manager.release_all(tid);
        result
    }

    fn dirty_pages_of(&self, tid: TransactionId) -> Vec<PageId> {
        let cache = self.cache.lock();
        cache
            .iter()
            .filter(|(_, handle)| handle.read().dirtier() == Some(tid))
            .map(|(pid, _)| *pid)
            .collect()
    }

    /// Discards every page dirtied by `tid` and reloads the on-disk
    /// original, clean. The disk image is the last committed version since
    /// updates are logged before pages are written.
    fn rollback(&self, tid: TransactionId) -> DbResult<()> {
        for pid in self.dirty_pages_of(tid) {
            debug!("rolling back page {} dirtied by {}", pid, tid);
            let file = self.catalog.file(pid.table_id)?;
            let page = file.read_page(pid)?;
            let mut cache = self.cache.lock();
            cache.insert(pid, Arc::new(RwLock::new(page)));
            self.replacer.lock().update(pid)?;
        }
        Ok(())
    }

    /// Flushes one page: appends a WAL update record with the dirtier's
    /// before- and after-images, forces the log, writes the page through
    /// its heap file, and drops it from the cache so later references
    /// re-read the on-disk bytes.
    pub fn flush_page(&self, pid: PageId) -> DbResult<()> {
        let handle = { self.cache.lock().get(&pid).cloned() };
        let Some(handle) = handle else {
            return Ok(());
        };
        let file = self.catalog.file(pid.table_id)?;
        {
            let mut page = handle.write();
            if let Some(dirtier) = page.dirtier() {
                self.log
                    .log_update(dirtier, pid, page.before_image(), page.data())?;
                self.log.force()?;
            }
            file.write_page(&page)?;
            page.mark_dirty(None);
            page.set_before_image();
        }
        let mut cache = self.cache.lock();
        cache.remove(&pid);
        self.replacer.lock().remove(pid);
        Ok(())
    }

    /// Flushes every cached page. Breaks atomicity under steal if any page
    /// is uncommitted; kept for tests and recovery. Disk failures are
    /// logged and the remaining pages still flushed.
    pub fn flush_all_pages(&self) {
        let pids: Vec<PageId> = { self.cache.lock().keys().copied().collect() };
        for pid in pids {
            if let Err(e) = self.flush_page(pid) {
                error!("failed to flush page {}: {}", pid, e);
            }
        }
    }

    /// Removes a page from cache and replacer without touching disk.
    pub fn discard_page(&self, pid: PageId) {
        let mut cache = self.cache.lock();
        cache.remove(&pid);
        self.replacer.lock().remove(pid);
    }

    /// Picks a clean victim and removes it from the cache. Clean pages need
    /// no write-back; dirty pages are never victims, and an all-dirty cache
    /// is an error the caller surfaces.
    fn evict_one(&self, cache: &mut HashMap<PageId, PageHandle>) -> DbResult<()> {
        let victim = self
            .replacer
            .lock()
            .evict(
                |pid| cache.get(&pid).is_some_and(|h| !h.read().is_dirty()),
                |pid| self.lock_manager.any_locked(pid),
            )
            .ok_or(DbError::AllPagesDirty)?;
        debug!("evicting clean page {}", victim);
        cache.remove(&victim);
        Ok(())
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds(tid, pid)
    }

    pub fn any_locked(&self, pid: PageId) -> bool {
        self.lock_manager.any_locked(pid)
    }

    pub fn release_shared(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release_shared(tid, pid);
    }

    pub fn release_exclusive(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release_exclusive(tid, pid);
    }

    /// Drops both lock modes on a page. Risky: releasing before commit
    /// forfeits 2PL guarantees for that page.
    pub fn unsafe_release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release_shared(tid, pid);
        self.lock_manager.release_exclusive(tid, pid);
    }

    /// Cached page count, for tests and introspection.
    pub fn cached_pages(&self) -> usize {
        self.cache.lock().len()
    }

    /// Cache keys and replacer entries, for invariant checks in tests.
    pub fn cache_snapshot(&self) -> (Vec<PageId>, Vec<PageId>) {
        let cache = self.cache.lock();
        let replacer = self.replacer.lock();
        (cache.keys().copied().collect(), replacer.entries())
    }
}
