//! HeapPage: the on-disk layout (bitmap header + packed fixed-size slots)
//! and its in-memory counterpart (dirty bit, before-image snapshot).

use log::trace;

use crate::error::{DbError, DbErrorKind};
use crate::page_id::{PageId, RecordId};
use crate::schema::TupleDesc;
use crate::transaction_id::TransactionId;
use crate::tuple::Tuple;

/// Number of tuple slots that fit in one page of the given size for a
/// schema whose on-disk row width is `row_size` bytes.
///
/// `numSlots = floor((pageSize * 8) / (schemaSize * 8 + 1))`: each slot
/// costs its own bytes plus one occupancy bit.
pub fn num_slots(page_size: usize, row_size: usize) -> usize {
    (page_size * 8) / (row_size * 8 + 1)
}

fn header_len(slots: usize) -> usize {
    (slots + 7) / 8
}

#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    schema: TupleDesc,
    page_size: usize,
    num_slots: usize,
    header: Vec<u8>,
    slots: Vec<Option<Tuple>>,
    dirty: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Parse `page_size` bytes into a page. `bytes.len()` must equal
    /// `page_size`.
    pub fn new(
        pid: PageId,
        schema: TupleDesc,
        page_size: usize,
        bytes: Vec<u8>,
    ) -> Result<HeapPage, DbError> {
        if bytes.len() != page_size {
            return Err(DbError::new(
                DbErrorKind::IoError,
                format!("expected {} bytes, got {}", page_size, bytes.len()),
            ));
        }

        let row_size = schema.size();
        let slot_count = num_slots(page_size, row_size);
        let hdr_len = header_len(slot_count);
        let header = bytes[..hdr_len].to_vec();

        let mut slots = Vec::with_capacity(slot_count);
        let mut offset = hdr_len;
        for i in 0..slot_count {
            let used = is_bit_set(&header, i);
            if used {
                let mut tuple = Tuple::deserialize(&schema, &bytes[offset..offset + row_size])?;
                tuple.set_record_id(Some(RecordId::new(pid, i)));
                slots.push(Some(tuple));
            } else {
                slots.push(None);
            }
            offset += row_size;
        }

        Ok(HeapPage {
            pid,
            schema,
            page_size,
            num_slots: slot_count,
            header,
            slots,
            dirty: None,
            before_image: bytes,
        })
    }

    /// A fresh all-zero page of `page_size` bytes (used when a HeapFile
    /// extends itself by one page).
    pub fn empty(pid: PageId, schema: TupleDesc, page_size: usize) -> Result<HeapPage, DbError> {
        HeapPage::new(pid, schema, page_size, vec![0u8; page_size])
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn schema(&self) -> &TupleDesc {
        &self.schema
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn get_num_empty_slots(&self) -> usize {
        (0..self.num_slots).filter(|&i| !self.is_slot_used(i)).count()
    }

    pub fn is_slot_used(&self, i: usize) -> bool {
        is_bit_set(&self.header, i)
    }

    pub fn mark_slot_used(&mut self, i: usize, used: bool) {
        set_bit(&mut self.header, i, used);
    }

    /// Serialize this page back to exactly `page_size` bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.page_size);
        buf.extend_from_slice(&self.header);

        let row_size = self.schema.size();
        for slot in &self.slots {
            match slot {
                Some(t) => buf.extend_from_slice(&t.serialize()),
                None => buf.resize(buf.len() + row_size, 0),
            }
        }
        buf.resize(self.page_size, 0);
        buf
    }

    /// Insert `tuple` into the lowest-indexed free slot, assigning its
    /// RecordId. Fails with `SchemaMismatch` or `PageFull`.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<(), DbError> {
        if tuple.schema() != &self.schema {
            return Err(DbError::new(
                DbErrorKind::SchemaMismatch,
                "tuple schema does not match page schema",
            ));
        }

        let slot = (0..self.num_slots)
            .find(|&i| !self.is_slot_used(i))
            .ok_or_else(|| DbError::new(DbErrorKind::PageFull, "no empty slot on this page"))?;

        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        self.slots[slot] = Some(tuple.clone());
        self.mark_slot_used(slot, true);
        trace!("inserted tuple into {:?} slot {}", self.pid, slot);
        Ok(())
    }

    /// Remove the tuple identified by `tuple.record_id()`. Fails with
    /// `NotOnThisPage` or `SlotEmpty`.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<(), DbError> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| DbError::new(DbErrorKind::NotOnThisPage, "tuple has no record id"))?;
        if rid.page_id != self.pid {
            return Err(DbError::new(
                DbErrorKind::NotOnThisPage,
                "tuple's record id does not reference this page",
            ));
        }
        if !self.is_slot_used(rid.slot_index) {
            return Err(DbError::new(DbErrorKind::SlotEmpty, "slot is already empty"));
        }
        self.slots[rid.slot_index] = None;
        self.mark_slot_used(rid.slot_index, false);
        trace!("deleted tuple from {:?} slot {}", self.pid, rid.slot_index);
        Ok(())
    }

    /// Live tuples in slot-index order.
    pub fn iter_tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirty = if dirty { Some(tid) } else { None };
    }

    /// Clear the dirty bit without naming a transaction, for the case
    /// (flushing a page outside any particular transaction) where there is
    /// no `tid` to attribute the clean state to.
    pub fn clear_dirty(&mut self) {
        self.dirty = None;
    }

    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirty
    }

    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }

    pub fn set_before_image(&mut self) {
        self.before_image = self.serialize();
    }

    /// Reconstruct the page as it existed at its last commit/load.
    pub fn to_before_image_page(&self) -> Result<HeapPage, DbError> {
        HeapPage::new(
            self.pid,
            self.schema.clone(),
            self.page_size,
            self.before_image.clone(),
        )
    }
}

fn is_bit_set(header: &[u8], i: usize) -> bool {
    let byte = header[i / 8];
    (byte >> (i % 8)) & 1 == 1
}

fn set_bit(header: &mut [u8], i: usize, value: bool) {
    let mask = 1u8 << (i % 8);
    if value {
        header[i / 8] |= mask;
    } else {
        header[i / 8] &= !mask;
    }
}
