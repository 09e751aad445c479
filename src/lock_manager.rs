//! Per-page shared/exclusive locking with upgrade-in-place, a wait-for
//! graph for deadlock detection, and a timeout fallback.
//!
//! Modeled as a monitor: one mutex guards all lock state, and blocked
//! waiters park on a condvar that is re-checked every `wait_granularity`
//! instead of spinning.

use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{DbError, DbErrorKind};
use crate::page_id::PageId;
use crate::transaction_id::TransactionId;

/// The permission an operator requests a page under. `ReadOnly` maps to a
/// shared lock, `ReadWrite` to an exclusive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permissions> for LockMode {
    fn from(p: Permissions) -> LockMode {
        match p {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LockEntry {
    tid: TransactionId,
    mode: LockMode,
}

struct State {
    locks: HashMap<PageId, Vec<LockEntry>>,
    held_by: HashMap<TransactionId, HashSet<PageId>>,
    wait_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl State {
    fn new() -> State {
        State {
            locks: HashMap::new(),
            held_by: HashMap::new(),
            wait_for: HashMap::new(),
        }
    }

    /// Try to grant `(tid, pid, mode)` against current holders. On success,
    /// mutates lock state and returns `true`.
    fn try_grant(&mut self, tid: TransactionId, pid: PageId, mode: LockMode) -> bool {
        let entries = self.locks.entry(pid).or_insert_with(Vec::new);

        let grantable = match mode {
            LockMode::Shared => entries
                .iter()
                .all(|e| e.mode == LockMode::Shared || e.tid == tid),
            LockMode::Exclusive => {
                let others: Vec<&LockEntry> = entries.iter().filter(|e| e.tid != tid).collect();
                if others.is_empty() {
                    true
                } else {
                    // tid holds the sole lock on pid -> upgrade in place.
                    entries.len() == 1 && entries[0].tid == tid
                }
            }
        };

        if !grantable {
            return false;
        }

        match mode {
            LockMode::Shared => {
                if !entries.iter().any(|e| e.tid == tid) {
                    entries.push(LockEntry { tid, mode });
                }
            }
            LockMode::Exclusive => {
                entries.retain(|e| e.tid != tid);
                entries.push(LockEntry { tid, mode });
            }
        }

        self.held_by.entry(tid).or_insert_with(HashSet::new).insert(pid);
        self.wait_for.remove(&tid);
        true
    }

    fn holders_other_than(&self, pid: PageId, tid: TransactionId) -> HashSet<TransactionId> {
        self.locks
            .get(&pid)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.tid != tid)
                    .map(|e| e.tid)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// DFS from `start` through the wait-for graph; a back-edge to `start`
    /// means a cycle exists.
    fn has_cycle_from(&self, start: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        let mut first = true;
        while let Some(node) = stack.pop() {
            if node == start && !first {
                return true;
            }
            first = false;
            if !visited.insert(node) {
                continue;
            }
            if let Some(next) = self.wait_for.get(&node) {
                for &n in next {
                    if n == start {
                        return true;
                    }
                    stack.push(n);
                }
            }
        }
        false
    }

    fn release(&mut self, tid: TransactionId, pid: PageId) {
        if let Some(entries) = self.locks.get_mut(&pid) {
            entries.retain(|e| e.tid != tid);
            if entries.is_empty() {
                self.locks.remove(&pid);
            }
        }
        if let Some(held) = self.held_by.get_mut(&tid) {
            held.remove(&pid);
            if held.is_empty() {
                self.held_by.remove(&tid);
            }
        }
    }

    fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks
            .get(&pid)
            .map(|entries| entries.iter().any(|e| e.tid == tid))
            .unwrap_or(false)
    }
}

pub struct LockManager {
    state: Mutex<State>,
    cond: Condvar,
    timeout: Duration,
    wait_granularity: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration, wait_granularity: Duration) -> LockManager {
        LockManager {
            state: Mutex::new(State::new()),
            cond: Condvar::new(),
            timeout,
            wait_granularity,
        }
    }

    /// Acquire `pid` for `tid` under `mode`, blocking as needed. Returns
    /// `TransactionAborted` if a deadlock cycle is detected or the request
    /// exceeds `timeout`.
    pub fn acquire_lock(
        &self,
        tid: TransactionId,
        pid: PageId,
        mode: LockMode,
    ) -> Result<(), DbError> {
        let start = Instant::now();
        let mut guard = self.state.lock().unwrap();

        loop {
            if guard.try_grant(tid, pid, mode) {
                debug!("lock granted: tid={} pid={} mode={:?}", tid, pid, mode);
                return Ok(());
            }

            let holders = guard.holders_other_than(pid, tid);
            for holder in &holders {
                guard
                    .wait_for
                    .entry(tid)
                    .or_insert_with(HashSet::new)
                    .insert(*holder);
            }

            if guard.has_cycle_from(tid) {
                guard.wait_for.remove(&tid);
                warn!(
                    "deadlock detected, aborting tid={} waiting on pid={}",
                    tid, pid
                );
                return Err(DbError::new(
                    DbErrorKind::TransactionAborted,
                    "deadlock detected in wait-for graph",
                ));
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                guard.wait_for.remove(&tid);
                warn!("lock timeout: tid={} pid={} mode={:?}", tid, pid, mode);
                return Err(DbError::new(
                    DbErrorKind::TransactionAborted,
                    "timed out waiting for lock",
                ));
            }

            debug!("lock blocked: tid={} pid={} mode={:?}", tid, pid, mode);
            let remaining = self.timeout - elapsed;
            let wait_for = self.wait_granularity.min(remaining);
            let (g, _) = self.cond.wait_timeout(guard, wait_for).unwrap();
            guard = g;
        }
    }

    /// Release `tid`'s lock on `pid`, if any, and wake waiters.
    pub fn release_lock(&self, tid: TransactionId, pid: PageId) {
        let mut guard = self.state.lock().unwrap();
        guard.release(tid, pid);
        self.cond.notify_all();
    }

    /// Release every lock `tid` holds.
    pub fn release_all_locks(&self, tid: TransactionId) {
        let mut guard = self.state.lock().unwrap();
        let held: Vec<PageId> = guard
            .held_by
            .get(&tid)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        for pid in held {
            guard.release(tid, pid);
        }
        self.cond.notify_all();
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.state.lock().unwrap().holds_lock(tid, pid)
    }
}
