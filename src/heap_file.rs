//! HeapFile: a table stored as a gap-free sequence of fixed-size pages in
//! one local file.

use std::collections::hash_map::DefaultHasher;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use crate::buffer_pool::BufferPool;
use crate::error::{DbError, DbErrorKind};
use crate::lock_manager::Permissions;
use crate::operator::OpIterator;
use crate::page::HeapPage;
use crate::page_id::PageId;
use crate::schema::TupleDesc;
use crate::transaction_id::TransactionId;
use crate::tuple::Tuple;

/// Hash an absolute path down to a 32-bit table id. Truncating a 64-bit
/// hash admits collisions in principle; `Catalog::add_table` additionally
/// rejects inserts that would collide two distinct paths onto one id.
pub fn path_to_table_id(path: &Path) -> i32 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    (hasher.finish() & 0xFFFF_FFFF) as i32
}

pub struct HeapFile {
    path: PathBuf,
    id: i32,
    schema: TupleDesc,
    page_size: usize,
    file: Mutex<File>,
}

impl HeapFile {
    pub fn new(path: impl AsRef<Path>, schema: TupleDesc, page_size: usize) -> Result<HeapFile, DbError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let absolute = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        Ok(HeapFile {
            path: path.to_path_buf(),
            id: path_to_table_id(&absolute),
            schema,
            page_size,
            file: Mutex::new(file),
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// Build a `HeapFile` whose id is forced rather than derived from its
    /// path. Only exists to let `Catalog`'s id-collision rejection be
    /// exercised directly, without needing to brute-force an actual
    /// 32-bit path-hash collision.
    #[cfg(test)]
    pub(crate) fn new_with_forced_id(
        path: impl AsRef<Path>,
        schema: TupleDesc,
        page_size: usize,
        id: i32,
    ) -> Result<HeapFile, DbError> {
        let mut file = HeapFile::new(path, schema, page_size)?;
        file.id = id;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &TupleDesc {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_pages(&self) -> usize {
        let file = self.file.lock().unwrap();
        let len = file.metadata().map(|m| m.len()).unwrap_or(0);
        (len as usize) / self.page_size
    }

    pub fn read_page(&self, pid: PageId) -> Result<HeapPage, DbError> {
        if pid.table_id != self.id || pid.page_number >= self.num_pages() {
            return Err(DbError::new(
                DbErrorKind::PageOutOfRange,
                format!("page {} out of range for table {}", pid.page_number, self.id),
            ));
        }
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((pid.page_number * self.page_size) as u64))?;
        let mut buf = vec![0u8; self.page_size];
        file.read_exact(&mut buf)?;
        HeapPage::new(pid, self.schema.clone(), self.page_size, buf)
    }

    pub fn write_page(&self, page: &HeapPage) -> Result<(), DbError> {
        let pid = page.id();
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((pid.page_number * self.page_size) as u64))?;
        file.write_all(&page.serialize())?;
        file.flush()?;
        Ok(())
    }

    /// Append one all-zero page and return its PageId.
    fn append_empty_page(&self) -> Result<PageId, DbError> {
        let blank = HeapPage::empty(PageId::new(self.id, 0), self.schema.clone(), self.page_size)?;
        let mut file = self.file.lock().unwrap();
        let page_number = (file.metadata()?.len() as usize) / self.page_size;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&blank.serialize())?;
        file.flush()?;
        Ok(PageId::new(self.id, page_number))
    }

    /// Insert `tuple`, reusing the first page with a free slot or
    /// appending a new one. Returns the pages that were modified.
    pub fn insert_tuple(
        &self,
        buffer_pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageId>, DbError> {
        let existing = self.num_pages();
        for page_number in 0..existing {
            let pid = PageId::new(self.id, page_number);
            let pod = buffer_pool.get_page(tid, pid, Permissions::ReadWrite)?;
            let mut page = pod.write().unwrap();
            // Re-check freeness: another transaction may have filled this
            // page between our scan and acquiring its write lock.
            if page.get_num_empty_slots() > 0 {
                page.insert_tuple(tuple)?;
                page.mark_dirty(true, tid);
                debug!("inserted tuple into existing page {}", pid);
                return Ok(vec![pid]);
            }
        }

        let new_pid = self.append_empty_page()?;
        let pod = buffer_pool.get_page(tid, new_pid, Permissions::ReadWrite)?;
        {
            let mut page = pod.write().unwrap();
            page.insert_tuple(tuple)?;
            page.mark_dirty(true, tid);
        }
        debug!("inserted tuple into newly appended page {}", new_pid);
        Ok(vec![new_pid])
    }

    /// Delete the tuple identified by its RecordId. Returns the page that
    /// was modified.
    pub fn delete_tuple(
        &self,
        buffer_pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>, DbError> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| DbError::new(DbErrorKind::NotOnThisPage, "tuple has no record id"))?;
        let pod = buffer_pool.get_page(tid, rid.page_id, Permissions::ReadWrite)?;
        {
            let mut page = pod.write().unwrap();
            page.delete_tuple(tuple)?;
            page.mark_dirty(true, tid);
        }
        Ok(vec![rid.page_id])
    }
}

/// Pull iterator over every live tuple in the file, in `(pageNumber,
/// slotIndex)` order.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    buffer_pool: &'a BufferPool,
    tid: TransactionId,
    page_number: usize,
    buffer: Vec<Tuple>,
    index: usize,
    opened: bool,
    closed: bool,
}

impl<'a> HeapFileIterator<'a> {
    pub fn new(file: &'a HeapFile, buffer_pool: &'a BufferPool, tid: TransactionId) -> Self {
        HeapFileIterator {
            file,
            buffer_pool,
            tid,
            page_number: 0,
            buffer: Vec::new(),
            index: 0,
            opened: false,
            closed: false,
        }
    }

    fn load_page(&mut self, page_number: usize) -> Result<bool, DbError> {
        if page_number >= self.file.num_pages() {
            self.buffer.clear();
            return Ok(false);
        }
        let pid = PageId::new(self.file.id(), page_number);
        let pod = self
            .buffer_pool
            .get_page(self.tid, pid, Permissions::ReadOnly)?;
        let page = pod.read().unwrap();
        self.buffer = page.iter_tuples().cloned().collect();
        self.index = 0;
        Ok(true)
    }

    fn require_open(&self) -> Result<(), DbError> {
        if !self.opened || self.closed {
            return Err(DbError::new(
                DbErrorKind::IllegalState,
                "iterator used before open or after close",
            ));
        }
        Ok(())
    }

    fn advance_to_next_nonempty_page(&mut self) -> Result<(), DbError> {
        while self.index >= self.buffer.len() {
            self.page_number += 1;
            if !self.load_page(self.page_number)? {
                break;
            }
        }
        Ok(())
    }
}

impl<'a> OpIterator for HeapFileIterator<'a> {
    fn open(&mut self) -> Result<(), DbError> {
        self.page_number = 0;
        self.load_page(0)?;
        self.opened = true;
        self.closed = false;
        self.advance_to_next_nonempty_page()
    }

    fn has_next(&mut self) -> Result<bool, DbError> {
        self.require_open()?;
        Ok(self.index < self.buffer.len())
    }

    fn next(&mut self) -> Result<Tuple, DbError> {
        self.require_open()?;
        if self.index >= self.buffer.len() {
            return Err(DbError::new(DbErrorKind::NoSuchElement, "no more tuples"));
        }
        let tuple = self.buffer[self.index].clone();
        self.index += 1;
        self.advance_to_next_nonempty_page()?;
        Ok(tuple)
    }

    fn rewind(&mut self) -> Result<(), DbError> {
        self.require_open()?;
        self.open()
    }

    fn close(&mut self) {
        self.buffer.clear();
        self.opened = false;
        self.closed = true;
    }

    fn schema(&self) -> &TupleDesc {
        self.file.schema()
    }
}
