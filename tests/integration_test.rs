//! End-to-end exercises of the storage core: transactions, locking,
//! eviction, and the write-ahead log working together.

use pagedb::access::tuple::{Tuple, TupleDesc};
use pagedb::access::value::{Field, FieldType};
use pagedb::concurrency::Permissions;
use pagedb::storage::wal::LogRecord;
use pagedb::{Database, DbConfig, DbError, PageId};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};

fn int_desc() -> TupleDesc {
    TupleDesc::new(vec![FieldType::Int, FieldType::Int])
}

fn setup(page_size: usize, pool_pages: usize) -> anyhow::Result<(TempDir, Arc<Database>, u32)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir()?;
    let config = DbConfig::new(dir.path())
        .with_page_size(page_size)
        .with_pool_pages(pool_pages);
    let db = Arc::new(Database::new(config)?);
    let table_id = db.create_table("t", int_desc())?;
    Ok((dir, db, table_id))
}

fn insert(db: &Database, tid: pagedb::TransactionId, table_id: u32, a: i32, b: i32) -> anyhow::Result<()> {
    let desc = db.catalog().file(table_id)?.desc().clone();
    let tuple = Tuple::new(desc, vec![Field::Int(a), Field::Int(b)])?;
    db.buffer_pool().insert_tuple(tid, table_id, tuple)?;
    Ok(())
}

fn scan_all(db: &Database, tid: pagedb::TransactionId, table_id: u32) -> anyhow::Result<Vec<(i32, i32)>> {
    let file = db.catalog().file(table_id)?;
    let mut scan = file.scan(db.buffer_pool(), tid);
    let rows = scan.collect_remaining()?;
    Ok(rows
        .iter()
        .map(|t| {
            let a = match t.field(0) {
                Field::Int(v) => *v,
                other => panic!("unexpected field {other}"),
            };
            let b = match t.field(1) {
                Field::Int(v) => *v,
                other => panic!("unexpected field {other}"),
            };
            (a, b)
        })
        .collect())
}

#[test]
fn test_committed_inserts_visible_in_order() -> anyhow::Result<()> {
    let (_dir, db, table_id) = setup(4096, 50)?;

    let t1 = db.begin();
    insert(&db, t1, table_id, 1, 10)?;
    insert(&db, t1, table_id, 2, 20)?;
    insert(&db, t1, table_id, 3, 30)?;
    db.commit(t1)?;

    let t2 = db.begin();
    let rows = scan_all(&db, t2, table_id)?;
    assert_eq!(rows, vec![(1, 10), (2, 20), (3, 30)]);
    db.commit(t2)?;
    Ok(())
}

#[test]
fn test_wal_update_precedes_commit() -> anyhow::Result<()> {
    let (_dir, db, table_id) = setup(4096, 50)?;

    let t1 = db.begin();
    insert(&db, t1, table_id, 1, 10)?;
    db.commit(t1)?;

    let records = db.log().records()?;
    let update_idx = records
        .iter()
        .position(|r| matches!(r, LogRecord::Update { tid, .. } if *tid == t1))
        .expect("update record for the committed transaction");
    let commit_idx = records
        .iter()
        .position(|r| matches!(r, LogRecord::Commit { tid } if *tid == t1))
        .expect("commit record for the committed transaction");
    assert!(update_idx < commit_idx);
    Ok(())
}

#[test]
fn test_concurrent_readers_share_a_page() -> anyhow::Result<()> {
    let (_dir, db, table_id) = setup(4096, 50)?;

    let t0 = db.begin();
    insert(&db, t0, table_id, 1, 10)?;
    db.commit(t0)?;

    let pid = PageId::new(table_id, 0);
    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let db = db.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || -> anyhow::Result<bool> {
            let tid = db.begin();
            barrier.wait();
            db.buffer_pool().get_page(tid, pid, Permissions::ReadOnly)?;
            let held = db.buffer_pool().holds_lock(tid, pid);
            // Hold the lock long enough for the peer to acquire alongside.
            thread::sleep(Duration::from_millis(50));
            db.commit(tid)?;
            Ok(held)
        }));
    }
    for handle in handles {
        assert!(handle.join().unwrap()?);
    }
    Ok(())
}

#[test]
fn test_reader_blocks_until_writer_commits() -> anyhow::Result<()> {
    let (_dir, db, table_id) = setup(4096, 50)?;

    let t0 = db.begin();
    insert(&db, t0, table_id, 1, 10)?;
    db.commit(t0)?;

    // Writer dirties page 0 and holds its exclusive lock.
    let writer = db.begin();
    insert(&db, writer, table_id, 2, 20)?;
    let pid = PageId::new(table_id, 0);
    assert!(db.buffer_pool().holds_lock(writer, pid));

    let reader_db = db.clone();
    let reader = thread::spawn(move || -> anyhow::Result<Duration> {
        let tid = reader_db.begin();
        let start = Instant::now();
        reader_db
            .buffer_pool()
            .get_page(tid, pid, Permissions::ReadOnly)?;
        let waited = start.elapsed();
        reader_db.commit(tid)?;
        Ok(waited)
    });

    thread::sleep(Duration::from_millis(100));
    db.commit(writer)?;

    let waited = reader.join().unwrap()?;
    assert!(waited >= Duration::from_millis(50), "reader did not block: {waited:?}");
    Ok(())
}

#[test]
fn test_deadlock_victim_aborts_and_peer_proceeds() -> anyhow::Result<()> {
    let (_dir, db, table_id) = setup(64, 50)?;

    // Two full pages of committed data.
    let t0 = db.begin();
    for i in 0..8 {
        insert(&db, t0, table_id, i, i)?;
    }
    db.commit(t0)?;
    let p0 = PageId::new(table_id, 0);
    let p1 = PageId::new(table_id, 1);

    let t1 = db.begin();
    let t2 = db.begin();
    db.buffer_pool().get_page(t1, p0, Permissions::ReadWrite)?;
    db.buffer_pool().get_page(t2, p1, Permissions::ReadWrite)?;

    // T1 waits on T2's page from a second thread.
    let peer_db = db.clone();
    let peer = thread::spawn(move || -> anyhow::Result<()> {
        peer_db.buffer_pool().get_page(t1, p1, Permissions::ReadWrite)?;
        peer_db.commit(t1)?;
        Ok(())
    });

    // Give T1 time to register its wait, then close the cycle: T2 is the
    // victim, already rolled back when the error surfaces.
    thread::sleep(Duration::from_millis(100));
    let result = db.buffer_pool().get_page(t2, p0, Permissions::ReadWrite);
    match result {
        Err(DbError::TransactionAborted(victim)) => assert_eq!(victim, t2),
        other => panic!("expected deadlock abort, got {other:?}"),
    }
    assert!(!db.buffer_pool().holds_lock(t2, p1));

    // With the victim gone, T1 acquires the page and commits.
    peer.join().unwrap()?;
    Ok(())
}

#[test]
fn test_all_dirty_pool_rejects_new_page() -> anyhow::Result<()> {
    let (_dir, db, table_id) = setup(64, 3)?;

    // Four committed pages; committing after each page keeps the small
    // pool from filling with uncommitted pages during setup.
    for page in 0..4 {
        let tid = db.begin();
        for i in 0..7 {
            insert(&db, tid, table_id, page * 7 + i, 0)?;
        }
        db.commit(tid)?;
    }
    assert_eq!(db.catalog().file(table_id)?.num_pages()?, 4);

    // One transaction dirties three pages, filling the pool.
    let t1 = db.begin();
    let rows = {
        let file = db.catalog().file(table_id)?;
        let mut scan = file.scan(db.buffer_pool(), t1);
        scan.collect_remaining()?
    };
    for page_no in 0..3 {
        let victim = rows
            .iter()
            .find(|t| t.record_id().unwrap().pid.page_no == page_no)
            .expect("tuple on page");
        db.buffer_pool().delete_tuple(t1, victim)?;
    }

    // A fourth page cannot enter the pool: every cached page is dirty.
    let t2 = db.begin();
    let result = db
        .buffer_pool()
        .get_page(t2, PageId::new(table_id, 3), Permissions::ReadOnly);
    assert!(matches!(result, Err(DbError::AllPagesDirty)));

    db.abort(t1)?;
    db.abort(t2)?;
    Ok(())
}

#[test]
fn test_abort_rolls_back_insert() -> anyhow::Result<()> {
    let (_dir, db, table_id) = setup(4096, 50)?;

    let t1 = db.begin();
    insert(&db, t1, table_id, 1, 10)?;
    db.commit(t1)?;

    let t2 = db.begin();
    insert(&db, t2, table_id, 9, 99)?;
    db.abort(t2)?;

    let t3 = db.begin();
    let rows = scan_all(&db, t3, table_id)?;
    assert_eq!(rows, vec![(1, 10)]);
    db.commit(t3)?;

    // The log records the abort.
    assert!(db
        .log()
        .records()?
        .iter()
        .any(|r| matches!(r, LogRecord::Abort { tid } if *tid == t2)));
    Ok(())
}

#[test]
fn test_delete_then_commit_persists() -> anyhow::Result<()> {
    let (_dir, db, table_id) = setup(4096, 50)?;

    let t1 = db.begin();
    insert(&db, t1, table_id, 1, 10)?;
    insert(&db, t1, table_id, 2, 20)?;
    db.commit(t1)?;

    let t2 = db.begin();
    let rows = {
        let file = db.catalog().file(table_id)?;
        let mut scan = file.scan(db.buffer_pool(), t2);
        scan.collect_remaining()?
    };
    let doomed = rows.iter().find(|t| t.field(0) == &Field::Int(1)).unwrap();
    db.buffer_pool().delete_tuple(t2, doomed)?;
    db.commit(t2)?;

    let t3 = db.begin();
    assert_eq!(scan_all(&db, t3, table_id)?, vec![(2, 20)]);
    db.commit(t3)?;
    Ok(())
}

#[test]
fn test_inserts_spill_across_pages() -> anyhow::Result<()> {
    // 64-byte pages hold seven 8-byte tuples each.
    let (_dir, db, table_id) = setup(64, 50)?;

    let t1 = db.begin();
    for i in 0..20 {
        insert(&db, t1, table_id, i, i * 10)?;
    }
    db.commit(t1)?;
    assert_eq!(db.catalog().file(table_id)?.num_pages()?, 3);

    let t2 = db.begin();
    let rows = scan_all(&db, t2, table_id)?;
    assert_eq!(rows.len(), 20);
    assert_eq!(rows[0], (0, 0));
    assert_eq!(rows[19], (19, 190));
    db.commit(t2)?;
    Ok(())
}

#[test]
fn test_string_fields_round_trip() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db = Database::new(DbConfig::new(dir.path()))?;
    let desc = TupleDesc::new(vec![FieldType::Int, FieldType::Str(16)]);
    let table_id = db.create_table("named", desc)?;

    let t1 = db.begin();
    let desc = db.catalog().file(table_id)?.desc().clone();
    let tuple = Tuple::new(
        desc,
        vec![Field::Int(7), Field::Str("alice".to_string())],
    )?;
    db.buffer_pool().insert_tuple(t1, table_id, tuple)?;
    db.commit(t1)?;

    let t2 = db.begin();
    let file = db.catalog().file(table_id)?;
    let rows = file.scan(db.buffer_pool(), t2).collect_remaining()?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].field(1), &Field::Str("alice".to_string()));
    db.commit(t2)?;
    Ok(())
}

#[test]
fn test_concurrent_inserters_all_land() -> anyhow::Result<()> {
    let (_dir, db, table_id) = setup(4096, 50)?;

    let barrier = Arc::new(Barrier::new(4));
    let mut handles = Vec::new();
    for worker in 0..4 {
        let db = db.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || -> anyhow::Result<()> {
            barrier.wait();
            for i in 0..10 {
                // A deadlock victim is already rolled back when the error
                // surfaces; retry under a fresh transaction.
                loop {
                    let tid = db.begin();
                    match insert(&db, tid, table_id, worker * 10 + i, worker) {
                        Ok(()) => {
                            db.commit(tid)?;
                            break;
                        }
                        Err(e)
                            if matches!(
                                e.downcast_ref::<DbError>(),
                                Some(DbError::TransactionAborted(_))
                            ) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
            Ok(())
        }));
    }
    for handle in handles {
        handle.join().unwrap()?;
    }

    let tid = db.begin();
    let rows = scan_all(&db, tid, table_id)?;
    assert_eq!(rows.len(), 40);
    db.commit(tid)?;
    Ok(())
}
