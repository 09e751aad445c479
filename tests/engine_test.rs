mod common;

use small_db::{AggOp, Aggregate, Field, OpIterator, Permissions, SeqScan};

/// Insert a handful of rows across a transaction, commit, then scan them
/// back with a fresh transaction.
#[test]
fn insert_scan_commit_round_trip() {
    let t = common::new_test_db("widgets", 2, 256, 10);
    let bp = t.db.buffer_pool();
    let tid = t.db.begin_transaction();

    for i in 0..20 {
        let schema = common::int_schema(2);
        let mut tuple = common::int_tuple(schema, &[i, i * 2]);
        bp.insert_tuple(tid, t.table_id, &mut tuple).unwrap();
    }
    t.db.commit_transaction(tid).unwrap();

    let read_tid = t.db.begin_transaction();
    let catalog = t.catalog();
    let mut scan = SeqScan::new(&catalog, bp, read_tid, "widgets", "w").unwrap();
    scan.open().unwrap();

    let mut seen = Vec::new();
    while scan.has_next().unwrap() {
        let tuple = scan.next().unwrap();
        if let Field::Int(v) = tuple.field(0) {
            seen.push(*v);
        }
    }
    scan.close();
    seen.sort();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
    t.db.commit_transaction(read_tid).unwrap();
}

/// Aborting a transaction must restore every page it touched to its
/// before-image, leaving no trace of the insert.
#[test]
fn abort_rolls_back_inserts() {
    let t = common::new_test_db("widgets", 2, 256, 10);
    let bp = t.db.buffer_pool();

    let tid1 = t.db.begin_transaction();
    for i in 0..5 {
        let schema = common::int_schema(2);
        let mut tuple = common::int_tuple(schema, &[i, i]);
        bp.insert_tuple(tid1, t.table_id, &mut tuple).unwrap();
    }
    t.db.commit_transaction(tid1).unwrap();

    let tid2 = t.db.begin_transaction();
    let schema = common::int_schema(2);
    let mut tuple = common::int_tuple(schema, &[999, 999]);
    bp.insert_tuple(tid2, t.table_id, &mut tuple).unwrap();
    t.db.abort_transaction(tid2).unwrap();

    let tid3 = t.db.begin_transaction();
    let catalog = t.catalog();
    let mut scan = SeqScan::new(&catalog, bp, tid3, "widgets", "w").unwrap();
    scan.open().unwrap();
    let mut seen = Vec::new();
    while scan.has_next().unwrap() {
        let tuple = scan.next().unwrap();
        if let Field::Int(v) = tuple.field(0) {
            seen.push(*v);
        }
    }
    scan.close();
    seen.sort();
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    t.db.commit_transaction(tid3).unwrap();
}

/// Grouped AVG over an int column, computed with integer division.
#[test]
fn grouped_average_aggregate() {
    let t = common::new_test_db("sales", 2, 4096, 50);
    let bp = t.db.buffer_pool();
    let tid = t.db.begin_transaction();

    let rows = [(1, 10), (1, 20), (2, 7), (2, 8), (2, 9)];
    for (group, amount) in rows.iter() {
        let schema = common::int_schema(2);
        let mut tuple = common::int_tuple(schema, &[*group, *amount]);
        bp.insert_tuple(tid, t.table_id, &mut tuple).unwrap();
    }
    t.db.commit_transaction(tid).unwrap();

    let tid2 = t.db.begin_transaction();
    let catalog = t.catalog();
    let scan = SeqScan::new(&catalog, bp, tid2, "sales", "s").unwrap();
    let mut agg = Aggregate::new(Box::new(scan), Some(0), 1, AggOp::Avg).unwrap();
    agg.open().unwrap();

    let mut groups = std::collections::HashMap::new();
    while agg.has_next().unwrap() {
        let tuple = agg.next().unwrap();
        let group = match tuple.field(0) {
            Field::Int(v) => *v,
            _ => panic!("expected int group"),
        };
        let avg = match tuple.field(1) {
            Field::Int(v) => *v,
            _ => panic!("expected int avg"),
        };
        groups.insert(group, avg);
    }
    agg.close();

    assert_eq!(groups.get(&1), Some(&15));
    assert_eq!(groups.get(&2), Some(&8));
    t.db.commit_transaction(tid2).unwrap();
}

/// A buffer pool sized for exactly one page must evict the older page to
/// make room for a new one, once that older page has been committed
/// (hence clean). Filling page 0 exactly, committing, then inserting one
/// more row forces a load of page 1 that can only succeed by evicting
/// page 0.
#[test]
fn lru_evicts_clean_page_when_full() {
    let page_size = 128;
    let t = common::new_test_db("tiny", 1, page_size, 1);
    let bp = t.db.buffer_pool();
    let slots_per_page = small_db::page::num_slots(page_size, small_db::Type::Int.len());

    let tid1 = t.db.begin_transaction();
    for i in 0..slots_per_page {
        let mut tuple = common::int_tuple(common::int_schema(1), &[i as i32]);
        bp.insert_tuple(tid1, t.table_id, &mut tuple).unwrap();
    }
    t.db.commit_transaction(tid1).unwrap();

    let tid2 = t.db.begin_transaction();
    let mut tuple = common::int_tuple(common::int_schema(1), &[999]);
    bp.insert_tuple(tid2, t.table_id, &mut tuple).unwrap();
    t.db.commit_transaction(tid2).unwrap();

    let tid3 = t.db.begin_transaction();
    let catalog = t.catalog();
    let mut scan = SeqScan::new(&catalog, bp, tid3, "tiny", "x").unwrap();
    scan.open().unwrap();
    let mut count = 0;
    while scan.has_next().unwrap() {
        scan.next().unwrap();
        count += 1;
    }
    scan.close();
    assert_eq!(count, slots_per_page + 1);
    t.db.commit_transaction(tid3).unwrap();
}

/// Re-accessing a cached page must refresh its LRU recency, not just its
/// first load: with capacity 2 and pages loaded in order [0, 1], touching
/// page 0 again makes page 1 the older entry, so a third page load evicts
/// page 1 and keeps {0, 2} resident.
#[test]
fn lru_recency_refreshes_on_cache_hit() {
    let page_size = 128;
    let t = common::new_test_db("lru", 1, page_size, 2);
    let bp = t.db.buffer_pool();
    let table_id = t.table_id;

    let tid0 = t.db.begin_transaction();
    let mut tuple = common::int_tuple(common::int_schema(1), &[0]);
    bp.insert_tuple(tid0, table_id, &mut tuple).unwrap();
    t.db.commit_transaction(tid0).unwrap();

    let tid1 = t.db.begin_transaction();
    let mut tuple = common::int_tuple(common::int_schema(1), &[1]);
    bp.insert_tuple(tid1, table_id, &mut tuple).unwrap();
    t.db.commit_transaction(tid1).unwrap();

    // Re-touch page 0, which should make it the most recently used page.
    let tid_touch = t.db.begin_transaction();
    bp.get_page(tid_touch, small_db::PageId::new(table_id, 0), Permissions::ReadOnly)
        .unwrap();
    t.db.commit_transaction(tid_touch).unwrap();

    let tid2 = t.db.begin_transaction();
    let mut tuple = common::int_tuple(common::int_schema(1), &[2]);
    bp.insert_tuple(tid2, table_id, &mut tuple).unwrap();
    t.db.commit_transaction(tid2).unwrap();

    let mut resident: Vec<usize> = bp
        .resident_pages()
        .into_iter()
        .filter(|pid| pid.table_id == table_id)
        .map(|pid| pid.page_number)
        .collect();
    resident.sort();
    assert_eq!(resident, vec![0, 2]);
}

/// An ungrouped COUNT or SUM over zero input rows still yields one row of
/// 0 (there is exactly one group: the whole, empty, table).
#[test]
fn empty_ungrouped_count_and_sum_yield_zero_row() {
    let t = common::new_test_db("empty", 2, 4096, 10);
    let bp = t.db.buffer_pool();

    for op in [AggOp::Count, AggOp::Sum] {
        let tid = t.db.begin_transaction();
        let catalog = t.catalog();
        let scan = SeqScan::new(&catalog, bp, tid, "empty", "e").unwrap();
        let mut agg = Aggregate::new(Box::new(scan), None, 1, op).unwrap();
        agg.open().unwrap();

        assert!(agg.has_next().unwrap());
        let tuple = agg.next().unwrap();
        assert_eq!(tuple.field(0), &Field::Int(0));
        assert!(!agg.has_next().unwrap());
        agg.close();
        t.db.commit_transaction(tid).unwrap();
    }
}

/// An ungrouped MIN/MAX/AVG over zero input rows has no sensible zero and
/// correctly yields no row at all.
#[test]
fn empty_ungrouped_min_max_avg_yield_no_row() {
    let t = common::new_test_db("empty2", 2, 4096, 10);
    let bp = t.db.buffer_pool();

    for op in [AggOp::Min, AggOp::Max, AggOp::Avg] {
        let tid = t.db.begin_transaction();
        let catalog = t.catalog();
        let scan = SeqScan::new(&catalog, bp, tid, "empty2", "e").unwrap();
        let mut agg = Aggregate::new(Box::new(scan), None, 1, op).unwrap();
        agg.open().unwrap();

        assert!(!agg.has_next().unwrap());
        agg.close();
        t.db.commit_transaction(tid).unwrap();
    }
}

/// A table built by writing its `.dat` file directly (bypassing the
/// engine entirely) must scan identically to one built through
/// `insertTuple`, since `SeqScan` only cares about what's on disk.
#[test]
fn scan_over_randomly_built_table_matches_fixture() {
    common::setup();
    let dir = tempfile::TempDir::new().unwrap();
    let page_size = 256;
    let (file, expected) = common::random_heap_table(dir.path(), "fixture", 3, page_size, 37);

    let db = small_db::Database::new(small_db::EngineConfig::for_tests(page_size, 10));
    db.catalog()
        .write()
        .unwrap()
        .add_table(std::sync::Arc::new(file), "fixture", None)
        .unwrap();

    let tid = db.begin_transaction();
    let bp = db.buffer_pool();
    let catalog = db.catalog().read().unwrap();
    let mut scan = SeqScan::new(&catalog, bp, tid, "fixture", "f").unwrap();
    scan.open().unwrap();

    let mut seen = Vec::new();
    while scan.has_next().unwrap() {
        seen.push(scan.next().unwrap());
    }
    scan.close();
    drop(catalog);

    assert_eq!(seen.len(), expected.len());
    for (got, want) in seen.iter().zip(expected.iter()) {
        for i in 0..3 {
            assert_eq!(got.field(i), want.field(i));
        }
    }
    db.commit_transaction(tid).unwrap();
    db.close();
}

/// Buffer pool exhaustion with every resident page dirty must surface as
/// `BufferFull`, not silently evict uncommitted data.
#[test]
fn buffer_full_when_every_page_is_dirty() {
    let page_size = 128;
    let t = common::new_test_db("tiny", 1, page_size, 1);
    let bp = t.db.buffer_pool();
    let slots_per_page = small_db::page::num_slots(page_size, small_db::Type::Int.len());

    let tid = t.db.begin_transaction();
    // Fill page 0 within this still-open transaction, so it stays dirty.
    for i in 0..slots_per_page {
        let mut tuple = common::int_tuple(common::int_schema(1), &[i as i32]);
        bp.insert_tuple(tid, t.table_id, &mut tuple).unwrap();
    }

    // One more row forces a page 1 load; page 0 is dirty and owned by
    // this same transaction, so there is nothing evictable.
    let mut tuple = common::int_tuple(common::int_schema(1), &[999]);
    let err = bp.insert_tuple(tid, t.table_id, &mut tuple).unwrap_err();
    assert_eq!(err.kind(), small_db::DbErrorKind::BufferFull);
}
