//! LRU replacement policy over cached page ids.

use crate::error::{DbError, DbResult};
use crate::storage::page::PageId;
use std::collections::VecDeque;

/// Orders cached pages for eviction, least-recently-used at the front.
///
/// The replacer and the buffer pool's cache map move in lock-step: every
/// cache insert or remove has a matching call here, so the tracked entries
/// always equal the cache keys.
#[derive(Debug, Default)]
pub struct LruReplacer {
    queue: VecDeque<PageId>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Appends `pid` at the MRU end; a duplicate add is a no-op.
    pub fn add(&mut self, pid: PageId) {
        if !self.queue.contains(&pid) {
            self.queue.push_back(pid);
        }
    }

    /// Moves `pid` to the MRU end. An update of an untracked page is a
    /// caller error, never a silent no-op.
    pub fn update(&mut self, pid: PageId) -> DbResult<()> {
        match self.queue.iter().position(|&p| p == pid) {
            Some(idx) => {
                self.queue.remove(idx);
                self.queue.push_back(pid);
                Ok(())
            }
            None => Err(DbError::ReplacerUntracked(pid)),
        }
    }

    /// Drops `pid` if tracked.
    pub fn remove(&mut self, pid: PageId) {
        if let Some(idx) = self.queue.iter().position(|&p| p == pid) {
            self.queue.remove(idx);
        }
    }

    /// Picks and removes an eviction victim, scanning LRU toward MRU.
    /// Only clean pages qualify; among those, a page held under no
    /// transaction lock is preferred. Returns `None` when every tracked
    /// page is dirty, in which case the caller reports an all-dirty cache.
    pub fn evict(
        &mut self,
        is_clean: impl Fn(PageId) -> bool,
        is_locked: impl Fn(PageId) -> bool,
    ) -> Option<PageId> {
        let mut first_clean = None;
        for (idx, &pid) in self.queue.iter().enumerate() {
            if !is_clean(pid) {
                continue;
            }
            if !is_locked(pid) {
                self.queue.remove(idx);
                return Some(pid);
            }
            if first_clean.is_none() {
                first_clean = Some(idx);
            }
        }
        let idx = first_clean?;
        let pid = self.queue[idx];
        self.queue.remove(idx);
        Some(pid)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Tracked pages in LRU order, for invariant checks.
    pub fn entries(&self) -> Vec<PageId> {
        self.queue.iter().copied().collect()
    }
}
