//! Database: the single context object that wires together the catalog,
//! buffer pool, and lock manager for one engine instance.

use std::path::Path;
use std::sync::{Arc, RwLock};

use log::warn;
use once_cell::sync::OnceCell;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::DbError;
use crate::lock_manager::LockManager;
use crate::page_id::PageId;
use crate::transaction_id::TransactionId;

static GLOBAL: OnceCell<Database> = OnceCell::new();

/// Owns the catalog, buffer pool, and lock manager for one engine instance.
/// Cloning is cheap: every field is an `Arc`, so clones share state.
#[derive(Clone)]
pub struct Database {
    catalog: Arc<RwLock<Catalog>>,
    buffer_pool: Arc<BufferPool>,
    lock_manager: Arc<LockManager>,
}

impl Database {
    pub fn new(config: EngineConfig) -> Database {
        let catalog = Arc::new(RwLock::new(Catalog::new()));
        let lock_manager = Arc::new(LockManager::new(config.lock_timeout, config.wait_granularity));
        let buffer_pool = Arc::new(BufferPool::new(
            Arc::clone(&catalog),
            Arc::clone(&lock_manager),
            config.num_pages,
        ));
        Database {
            catalog,
            buffer_pool,
            lock_manager,
        }
    }

    /// Build a `Database` and load its catalog from `dir/catalog.txt`.
    pub fn from_catalog_dir(dir: impl AsRef<Path>, config: EngineConfig) -> Result<Database, DbError> {
        let db = Database::new(config);
        db.catalog.write().unwrap().load_schema(dir, config.page_size)?;
        Ok(db)
    }

    pub fn catalog(&self) -> &Arc<RwLock<Catalog>> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn begin_transaction(&self) -> TransactionId {
        TransactionId::new()
    }

    pub fn commit_transaction(&self, tid: TransactionId) -> Result<(), DbError> {
        self.buffer_pool.transaction_complete(tid, true)
    }

    pub fn abort_transaction(&self, tid: TransactionId) -> Result<(), DbError> {
        self.buffer_pool.transaction_complete(tid, false)
    }

    /// Tear down this instance: best-effort flush of every dirty page
    /// (a failure to flush one page is logged and does not stop the rest),
    /// then the cache is dropped. Safe to call more than once.
    pub fn close(&self) {
        let pids: Vec<PageId> = self.buffer_pool.resident_pages();
        for pid in pids {
            if let Err(e) = self.buffer_pool.flush_page(pid) {
                warn!("close: failed to flush page {}: {}", pid, e);
            }
        }
        self.buffer_pool.clear();
    }

    /// Install `self` as the process-wide default. Fails silently (returns
    /// the existing instance untouched) if one is already installed;
    /// callers that need to know should check `Database::try_global()`.
    pub fn install_global(self) -> Database {
        match GLOBAL.set(self) {
            Ok(()) => GLOBAL.get().unwrap().clone(),
            Err(_) => GLOBAL.get().unwrap().clone(),
        }
    }

    pub fn global() -> Option<&'static Database> {
        GLOBAL.get()
    }
}
