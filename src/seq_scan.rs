//! SeqScan: the leaf operator that walks one table's HeapFile in full,
//! exposing each tuple under an alias-prefixed schema.

use std::sync::Arc;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::error::{DbError, DbErrorKind};
use crate::field::Type;
use crate::heap_file::HeapFile;
use crate::lock_manager::Permissions;
use crate::operator::OpIterator;
use crate::page_id::PageId;
use crate::schema::TupleDesc;
use crate::transaction_id::TransactionId;
use crate::tuple::Tuple;

/// Prefix every field name in `schema` with `alias.`. A field with no name
/// becomes `alias.null`; an empty alias leaves the field as `null.field`.
fn alias_schema(schema: &TupleDesc, alias: &str) -> Result<TupleDesc, DbError> {
    let fields: Vec<(Type, Option<String>)> = (0..schema.num_fields())
        .map(|i| {
            let name = match schema.field_name(i) {
                Some(n) => format!("{}.{}", alias, n),
                None => format!("{}.null", alias),
            };
            (schema.field_type(i), Some(name))
        })
        .collect();
    TupleDesc::new(fields)
}

/// Iterates the table's HeapFile page by page through the buffer pool,
/// same traversal order as `HeapFileIterator`, but with its own buffered
/// tuples so it can own its `Arc<HeapFile>` rather than borrow it.
pub struct SeqScan<'a> {
    file: Arc<HeapFile>,
    buffer_pool: &'a BufferPool,
    tid: TransactionId,
    alias: String,
    schema: TupleDesc,
    page_number: usize,
    buffer: Vec<Tuple>,
    index: usize,
    opened: bool,
}

impl<'a> SeqScan<'a> {
    pub fn new(
        catalog: &Catalog,
        buffer_pool: &'a BufferPool,
        tid: TransactionId,
        table_name: &str,
        alias: &str,
    ) -> Result<SeqScan<'a>, DbError> {
        let table_id = catalog.get_table_id(table_name)?;
        let file = catalog.get_table(table_id)?;
        let schema = alias_schema(file.schema(), alias)?;
        Ok(SeqScan {
            file,
            buffer_pool,
            tid,
            alias: alias.to_string(),
            schema,
            page_number: 0,
            buffer: Vec::new(),
            index: 0,
            opened: false,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
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
        if !self.opened {
            return Err(DbError::new(DbErrorKind::IllegalState, "seq scan not open"));
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

impl<'a> OpIterator for SeqScan<'a> {
    fn open(&mut self) -> Result<(), DbError> {
        self.page_number = 0;
        self.load_page(0)?;
        self.opened = true;
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
    }

    fn schema(&self) -> &TupleDesc {
        &self.schema
    }
}
