//! A bounded, shared cache of pages with a NO-STEAL eviction policy: a
//! dirty page is never evicted, since that would write an uncommitted
//! transaction's changes to disk with no way to undo them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use log::{debug, trace, warn};

use crate::catalog::Catalog;
use crate::error::{DbError, DbErrorKind};
use crate::lock_manager::{LockManager, LockMode, Permissions};
use crate::page::HeapPage;
use crate::page_id::PageId;
use crate::transaction_id::TransactionId;
use crate::tuple::Tuple;

type Pod<T> = Arc<RwLock<T>>;

struct Slot {
    page: Pod<HeapPage>,
    last_used: Instant,
}

pub struct BufferPool {
    catalog: Arc<RwLock<Catalog>>,
    lock_manager: Arc<LockManager>,
    max_pages: usize,
    pages: RwLock<HashMap<PageId, Slot>>,
}

impl BufferPool {
    pub fn new(catalog: Arc<RwLock<Catalog>>, lock_manager: Arc<LockManager>, max_pages: usize) -> BufferPool {
        BufferPool {
            catalog,
            lock_manager,
            max_pages,
            pages: RwLock::new(HashMap::new()),
        }
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    /// Fetch `pid` under `perm`, acquiring the matching lock first. Loads
    /// from disk through the owning `HeapFile` on a cache miss, evicting a
    /// clean page if the pool is full.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<Pod<HeapPage>, DbError> {
        self.lock_manager
            .acquire_lock(tid, pid, LockMode::from(perm))?;

        // A cache hit still needs a write lock on `pages`: recency has to be
        // refreshed or `evict_one`'s `min_by_key(last_used)` keeps treating
        // this entry as the oldest one, degrading LRU into FIFO-by-insertion.
        let mut pages = self.pages.write().unwrap();
        if let Some(slot) = pages.get_mut(&pid) {
            trace!("buffer pool hit for {}", pid);
            slot.last_used = Instant::now();
            return Ok(Arc::clone(&slot.page));
        }

        if pages.len() >= self.max_pages {
            self.evict_one(&mut pages)?;
        }

        let file = self.catalog.read().unwrap().get_table(pid.table_id)?;
        let page = file.read_page(pid)?;
        let pod = Arc::new(RwLock::new(page));
        pages.insert(
            pid,
            Slot {
                page: Arc::clone(&pod),
                last_used: Instant::now(),
            },
        );
        debug!("loaded page {} into buffer pool", pid);
        Ok(pod)
    }

    /// Evict the least-recently-used clean page. `BufferFull` if every
    /// resident page is dirty.
    fn evict_one(&self, pages: &mut HashMap<PageId, Slot>) -> Result<(), DbError> {
        let victim = pages
            .iter()
            .filter(|(_, slot)| slot.page.read().unwrap().is_dirty().is_none())
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(pid, _)| *pid);

        match victim {
            Some(pid) => {
                pages.remove(&pid);
                debug!("evicted clean page {}", pid);
                Ok(())
            }
            None => {
                warn!("buffer pool full and every resident page is dirty");
                Err(DbError::new(
                    DbErrorKind::BufferFull,
                    "buffer pool is full and all pages are dirty",
                ))
            }
        }
    }

    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: i32,
        tuple: &mut Tuple,
    ) -> Result<(), DbError> {
        let file = self.catalog.read().unwrap().get_table(table_id)?;
        file.insert_tuple(self, tid, tuple)?;
        Ok(())
    }

    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<(), DbError> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| DbError::new(DbErrorKind::NotOnThisPage, "tuple has no record id"))?;
        let file = self.catalog.read().unwrap().get_table(rid.page_id.table_id)?;
        file.delete_tuple(self, tid, tuple)?;
        Ok(())
    }

    /// On commit, flush `tid`'s dirty pages and refresh their before-images.
    /// On abort, roll every dirty page it touched back to its before-image
    /// instead. Either way, release its locks afterward.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<(), DbError> {
        let mut pages = self.pages.write().unwrap();
        for (pid, slot) in pages.iter_mut() {
            let is_dirty = {
                let page = slot.page.read().unwrap();
                page.is_dirty() == Some(tid)
            };
            if !is_dirty {
                continue;
            }

            if commit {
                let file = self.catalog.read().unwrap().get_table(pid.table_id)?;
                let mut page = slot.page.write().unwrap();
                file.write_page(&page)?;
                page.set_before_image();
                page.mark_dirty(false, tid);
            } else {
                let mut page = slot.page.write().unwrap();
                let restored = page.to_before_image_page()?;
                *page = restored;
            }
        }
        drop(pages);

        self.lock_manager.release_all_locks(tid);
        debug!(
            "transaction {} {}",
            tid,
            if commit { "committed" } else { "aborted" }
        );
        Ok(())
    }

    pub fn flush_page(&self, pid: PageId) -> Result<(), DbError> {
        let pages = self.pages.read().unwrap();
        if let Some(slot) = pages.get(&pid) {
            let file = self.catalog.read().unwrap().get_table(pid.table_id)?;
            let mut page = slot.page.write().unwrap();
            file.write_page(&page)?;
            page.set_before_image();
            page.clear_dirty();
        }
        Ok(())
    }

    pub fn flush_all_pages(&self) -> Result<(), DbError> {
        let pids: Vec<PageId> = self.pages.read().unwrap().keys().copied().collect();
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Flush every cached page dirtied by `tid`, without touching its locks.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<(), DbError> {
        let pids: Vec<PageId> = self
            .pages
            .read()
            .unwrap()
            .iter()
            .filter(|(_, slot)| slot.page.read().unwrap().is_dirty() == Some(tid))
            .map(|(pid, _)| *pid)
            .collect();
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// PageIds currently resident in the pool, in no particular order.
    pub fn resident_pages(&self) -> Vec<PageId> {
        self.pages.read().unwrap().keys().copied().collect()
    }

    pub fn discard_page(&self, pid: PageId) {
        self.pages.write().unwrap().remove(&pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    /// Release `tid`'s lock on `pid` without flushing or discarding the
    /// page. Pass-through to the `LockManager`, for callers that manage
    /// page lifetime themselves.
    pub fn unsafe_release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release_lock(tid, pid);
    }

    /// Drop every resident page without flushing. Callers that want dirty
    /// data persisted first should flush (e.g. `Database::close`) before
    /// calling this.
    pub fn clear(&self) {
        self.pages.write().unwrap().clear();
    }
}
