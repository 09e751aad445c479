//! Shared scaffolding for the integration tests: log setup and small
//! helpers for building throwaway tables backed by a temp directory.

use std::path::Path;
use std::sync::{Arc, RwLockReadGuard};

use rand::Rng;
use tempfile::TempDir;
use small_db::Catalog;

use small_db::{
    Database, EngineConfig, Field, HeapFile, PageId, RecordId, Tuple, TupleDesc, Type,
};

#[allow(dead_code)]
pub fn setup() {
    small_db::logging::init();
}

/// A schema of `columns` int fields named `f0`, `f1`, ...
#[allow(dead_code)]
pub fn int_schema(columns: usize) -> TupleDesc {
    let fields: Vec<(Type, Option<String>)> = (0..columns)
        .map(|i| (Type::Int, Some(format!("f{}", i))))
        .collect();
    TupleDesc::new(fields).unwrap()
}

#[allow(dead_code)]
pub fn int_tuple(schema: TupleDesc, values: &[i32]) -> Tuple {
    let fields = values.iter().map(|v| Field::Int(*v)).collect();
    Tuple::new(schema, fields).unwrap()
}

/// A fresh `Database` plus the `TempDir` its heap files live in. The
/// `TempDir` must stay alive for as long as the database is used.
#[allow(dead_code)]
pub struct TestDb {
    pub dir: TempDir,
    pub db: Database,
    pub table_id: i32,
}

/// Build a `Database` with one int-only table registered, ready for
/// inserts. Uses a small page size so a handful of rows span multiple
/// pages, which matters for the heap-file and buffer-pool tests.
#[allow(dead_code)]
pub fn new_test_db(table_name: &str, columns: usize, page_size: usize, num_pages: usize) -> TestDb {
    setup();
    let dir = TempDir::new().expect("create temp dir");
    let db = Database::new(EngineConfig::for_tests(page_size, num_pages));

    let schema = int_schema(columns);
    let path = dir.path().join(format!("{}.dat", table_name));
    let file = Arc::new(HeapFile::new(path, schema, page_size).unwrap());
    let table_id = file.id();
    db.catalog()
        .write()
        .unwrap()
        .add_table(file, table_name, None)
        .unwrap();

    TestDb { dir, db, table_id }
}

impl TestDb {
    #[allow(dead_code)]
    pub fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.db.catalog().read().unwrap()
    }
}

/// Writes a populated `.dat` file straight to disk: no `BufferPool`, no
/// `HeapFile::insert_tuple`. Scan/aggregate tests can assert against these
/// fixtures without their correctness depending on the insert path.
#[allow(dead_code)]
pub fn random_heap_table(
    dir: &Path,
    table_name: &str,
    columns: usize,
    page_size: usize,
    num_rows: usize,
) -> (HeapFile, Vec<Tuple>) {
    let schema = int_schema(columns);
    let row_size = schema.size();
    let slots_per_page = small_db::page::num_slots(page_size, row_size);
    assert!(slots_per_page > 0, "page too small to hold a single row");
    let header_len = (slots_per_page + 7) / 8;
    let num_pages = ((num_rows + slots_per_page - 1) / slots_per_page).max(1);

    let mut rng = rand::thread_rng();
    let mut bytes = Vec::with_capacity(num_pages * page_size);
    let mut expected = Vec::with_capacity(num_rows);
    let mut row = 0;

    for page_number in 0..num_pages {
        let mut header = vec![0u8; header_len];
        let mut body = Vec::with_capacity(slots_per_page * row_size);
        for slot in 0..slots_per_page {
            if row < num_rows {
                let values: Vec<i32> = (0..columns).map(|_| rng.gen_range(-1000, 1000)).collect();
                let tuple = int_tuple(schema.clone(), &values);
                body.extend_from_slice(&tuple.serialize());
                header[slot / 8] |= 1 << (slot % 8);

                let mut recorded = tuple;
                recorded.set_record_id(Some(RecordId::new(PageId::new(0, page_number), slot)));
                expected.push(recorded);
                row += 1;
            } else {
                body.resize(body.len() + row_size, 0);
            }
        }
        let mut page_buf = header;
        page_buf.extend_from_slice(&body);
        page_buf.resize(page_size, 0);
        bytes.extend_from_slice(&page_buf);
    }

    let path = dir.join(format!("{}.dat", table_name));
    std::fs::write(&path, &bytes).expect("write random heap file");
    let file = HeapFile::new(&path, schema, page_size).expect("open random heap file");

    let table_id = file.id();
    for tuple in expected.iter_mut() {
        let rid = tuple.record_id().unwrap();
        tuple.set_record_id(Some(RecordId::new(
            PageId::new(table_id, rid.page_id.page_number),
            rid.slot_index,
        )));
    }

    (file, expected)
}
