//! PageId: `(tableId, pageNumber)`, structural equality.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: i32,
    pub page_number: usize,
}

impl PageId {
    pub fn new(table_id: i32, page_number: usize) -> PageId {
        PageId {
            table_id,
            page_number,
        }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PageId(table={}, page={})", self.table_id, self.page_number)
    }
}

/// `(PageId, slotIndex)`, structural equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_index: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_index: usize) -> RecordId {
        RecordId {
            page_id,
            slot_index,
        }
    }
}
