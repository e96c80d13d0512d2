//! Page-level strict two-phase locking with deadlock detection.
//!
//! Transactions hold every lock they acquire until commit or abort, so the
//! schedule of committed transactions is serializable. Acquisition never
//! blocks inside the manager: a denied request records waits-for edges and
//! returns, and the caller retries. When a denial closes a cycle in the
//! waits-for graph, the requester is the victim, which guarantees that at
//! least one transaction in every cycle makes progress.

use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Permission a transaction requests on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

/// Outcome of a non-blocking lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAttempt {
    /// The lock is held; waits-for edges from the requester were cleared.
    Granted,
    /// A conflicting holder exists; edges were recorded, retry later.
    Blocked,
    /// The denial closed a waits-for cycle; the requester is the victim
    /// and its waits-for edges are already removed.
    Deadlock,
}

#[derive(Default)]
struct LockState {
    /// Pages each transaction holds shared.
    shared: HashMap<TransactionId, HashSet<PageId>>,
    /// Pages each transaction holds exclusive.
    exclusive: HashMap<TransactionId, HashSet<PageId>>,
    /// Waits-for multigraph: waiter -> holder -> contested pages.
    waits_for: HashMap<TransactionId, HashMap<TransactionId, HashSet<PageId>>>,
}

impl LockState {
    fn holds_shared(&self, tid: TransactionId, pid: PageId) -> bool {
        self.shared.get(&tid).is_some_and(|set| set.contains(&pid))
    }

    fn holds_exclusive(&self, tid: TransactionId, pid: PageId) -> bool {
        self.exclusive
            .get(&tid)
            .is_some_and(|set| set.contains(&pid))
    }

    fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.holds_shared(tid, pid) || self.holds_exclusive(tid, pid)
    }

    /// Transactions other than `tid` holding `pid` in the given table.
    fn other_holders(
        table: &HashMap<TransactionId, HashSet<PageId>>,
        tid: TransactionId,
        pid: PageId,
    ) -> Vec<TransactionId> {
        table
            .iter()
            .filter(|(holder, pids)| **holder != tid && pids.contains(&pid))
            .map(|(holder, _)| *holder)
            .collect()
    }

    fn add_edge(&mut self, waiter: TransactionId, holder: TransactionId, pid: PageId) {
        self.waits_for
            .entry(waiter)
            .or_default()
            .entry(holder)
            .or_default()
            .insert(pid);
    }

    /// Drops every outgoing edge of `tid`; called once its request is granted.
    fn clear_waiter(&mut self, tid: TransactionId) {
        self.waits_for.remove(&tid);
    }

    /// Drops edges labeled `pid` that pointed at `tid` as its holder.
    fn drop_edges_to_holder(&mut self, holder: TransactionId, pid: PageId) {
        for edges in self.waits_for.values_mut() {
            if let Some(labels) = edges.get_mut(&holder) {
                labels.remove(&pid);
                if labels.is_empty() {
                    edges.remove(&holder);
                }
            }
        }
        self.waits_for.retain(|_, edges| !edges.is_empty());
    }

    /// DFS cycle detection over the waits-for graph.
    fn has_cycle(&self) -> bool {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;

        fn visit(
            node: TransactionId,
            graph: &HashMap<TransactionId, HashMap<TransactionId, HashSet<PageId>>>,
            color: &mut HashMap<TransactionId, u8>,
        ) -> bool {
            color.insert(node, GRAY);
            if let Some(edges) = graph.get(&node) {
                for &next in edges.keys() {
                    match color.get(&next).copied().unwrap_or(WHITE) {
                        GRAY => return true,
                        WHITE => {
                            if visit(next, graph, color) {
                                return true;
                            }
                        }
                        _ => {}
                    }
                }
            }
            color.insert(node, BLACK);
            false
        }

        let mut color: HashMap<TransactionId, u8> = HashMap::new();
        for &node in self.waits_for.keys() {
            if color.get(&node).copied().unwrap_or(WHITE) == WHITE
                && visit(node, &self.waits_for, &mut color)
            {
                return true;
            }
        }
        false
    }
}

/// Grants shared and exclusive page locks under a single critical section.
pub struct LockManager {
    state: Mutex<LockState>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
        }
    }

    /// Tries to acquire `pid` shared for `tid`. Succeeds unless another
    /// transaction holds the page exclusive. Re-acquisition is idempotent,
    /// and a transaction already holding exclusive passes without a new
    /// record.
    pub fn acquire_shared(&self, tid: TransactionId, pid: PageId) -> LockAttempt {
        let mut state = self.state.lock();
        if state.holds_exclusive(tid, pid) {
            return LockAttempt::Granted;
        }
        let conflicts = LockState::other_holders(&state.exclusive, tid, pid);
        if !conflicts.is_empty() {
            for holder in conflicts {
                state.add_edge(tid, holder, pid);
            }
            if state.has_cycle() {
                // Electing the victim removes the cycle in the same
                // critical section, so a surviving waiter's retry never
                // observes it.
                state.clear_waiter(tid);
                return LockAttempt::Deadlock;
            }
            return LockAttempt::Blocked;
        }
        state.shared.entry(tid).or_default().insert(pid);
        state.clear_waiter(tid);
        LockAttempt::Granted
    }

    /// Tries to acquire `pid` exclusive for `tid`. Succeeds only when the
    /// sole holder, if any, is `tid`; a shared hold by `tid` upgrades in
    /// place so the two tables never both record the same (tid, pid).
    pub fn acquire_exclusive(&self, tid: TransactionId, pid: PageId) -> LockAttempt {
        let mut state = self.state.lock();
        if state.holds_exclusive(tid, pid) {
            return LockAttempt::Granted;
        }
        let mut conflicts = LockState::other_holders(&state.shared, tid, pid);
        conflicts.extend(LockState::other_holders(&state.exclusive, tid, pid));
        if !conflicts.is_empty() {
            for holder in conflicts {
                state.add_edge(tid, holder, pid);
            }
            if state.has_cycle() {
                state.clear_waiter(tid);
                return LockAttempt::Deadlock;
            }
            return LockAttempt::Blocked;
        }
        if let Some(set) = state.shared.get_mut(&tid) {
            set.remove(&pid);
            if set.is_empty() {
                state.shared.remove(&tid);
            }
        }
        state.exclusive.entry(tid).or_default().insert(pid);
        state.clear_waiter(tid);
        LockAttempt::Granted
    }

    /// Swaps a shared hold for an exclusive one in a single step. The caller
    /// must already be the sole shared holder; callers that cannot guarantee
    /// that go through `acquire_exclusive` instead, which waits out or
    /// deadlock-aborts against concurrent holders.
    pub fn upgrade(&self, tid: TransactionId, pid: PageId) {
        let mut state = self.state.lock();
        debug_assert!(state.holds_shared(tid, pid), "upgrade without shared hold");
        debug_assert!(
            LockState::other_holders(&state.shared, tid, pid).is_empty(),
            "upgrade with concurrent shared holders"
        );
        if let Some(set) = state.shared.get_mut(&tid) {
            set.remove(&pid);
            if set.is_empty() {
                state.shared.remove(&tid);
            }
        }
        state.exclusive.entry(tid).or_default().insert(pid);
    }

    pub fn release_shared(&self, tid: TransactionId, pid: PageId) {
        let mut state = self.state.lock();
        if let Some(set) = state.shared.get_mut(&tid) {
            set.remove(&pid);
            if set.is_empty() {
                state.shared.remove(&tid);
            }
        }
        if !state.holds(tid, pid) {
            state.drop_edges_to_holder(tid, pid);
        }
    }

    pub fn release_exclusive(&self, tid: TransactionId, pid: PageId) {
        let mut state = self.state.lock();
        if let Some(set) = state.exclusive.get_mut(&tid) {
            set.remove(&pid);
            if set.is_empty() {
                state.exclusive.remove(&tid);
            }
        }
        if !state.holds(tid, pid) {
            state.drop_edges_to_holder(tid, pid);
        }
    }

    /// Drops every hold of `tid` and every waits-for edge incident on it.
    pub fn release_all(&self, tid: TransactionId) {
        let mut state = self.state.lock();
        state.shared.remove(&tid);
        state.exclusive.remove(&tid);
        state.waits_for.remove(&tid);
        for edges in state.waits_for.values_mut() {
            edges.remove(&tid);
        }
        state.waits_for.retain(|_, edges| !edges.is_empty());
    }

    /// True when `tid` holds `pid` in either mode.
    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.state.lock().holds(tid, pid)
    }

    /// True when any transaction holds `pid` in either mode.
    pub fn any_locked(&self, pid: PageId) -> bool {
        let state = self.state.lock();
        state.shared.values().any(|set| set.contains(&pid))
            || state.exclusive.values().any(|set| set.contains(&pid))
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
