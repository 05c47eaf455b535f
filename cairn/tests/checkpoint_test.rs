use cairn::journal::{JournalEntry, JournalOp, ENTRY_SIZE};
use cairn::{failpoint, StorageEngine, JOURNAL_FILE};
use std::path::Path;
use tempfile::tempdir;

fn read_journal(dir: &Path) -> Vec<JournalEntry> {
    let raw = std::fs::read(dir.join(JOURNAL_FILE)).unwrap();
    assert_eq!(raw.len() % ENTRY_SIZE, 0, "torn journal");
    raw.chunks_exact(ENTRY_SIZE)
        .map(|chunk| JournalEntry::from_bytes(chunk.try_into().unwrap()).unwrap())
        .collect()
}

#[test]
fn every_mutation_is_bracketed_by_intent_and_commit() {
    let dir = tempdir().unwrap();
    let mut db = StorageEngine::open(dir.path()).unwrap();

    assert!(db.insert("k", "v").unwrap());
    assert!(db.update("k", "v2").unwrap());
    assert!(db.remove("k").unwrap());

    let entries = read_journal(dir.path());
    let ops: Vec<JournalOp> = entries.iter().map(|e| e.op).collect();
    assert_eq!(
        ops,
        vec![
            JournalOp::Insert,
            JournalOp::Commit,
            JournalOp::Update,
            JournalOp::Commit,
            JournalOp::Delete,
            JournalOp::Commit,
        ]
    );

    assert_eq!(entries[0].key(), "k");
    assert_eq!(entries[0].value(), "v");
    assert_eq!(entries[0].page_id, 0);
    assert_eq!(entries[2].value(), "v2");
    assert_eq!(entries[2].page_id, 1);
    assert_eq!(entries[4].op, JournalOp::Delete);
    assert_eq!(entries[4].value(), "");
    assert_eq!(entries[4].page_id, 1);
}

#[test]
fn rejected_operations_log_nothing() {
    let dir = tempdir().unwrap();
    let mut db = StorageEngine::open(dir.path()).unwrap();

    assert!(db.insert("k", "v").unwrap());
    assert!(!db.insert("k", "other").unwrap());
    assert!(!db.update("ghost", "v").unwrap());
    assert!(!db.remove("ghost").unwrap());

    let entries = read_journal(dir.path());
    assert_eq!(entries.len(), 2);
}

#[test]
fn checkpoint_truncates_the_journal_and_clears_dirty_pages() {
    let dir = tempdir().unwrap();
    let mut db = StorageEngine::open(dir.path()).unwrap();

    assert!(db.insert("a", "1").unwrap());
    assert!(db.insert("b", "2").unwrap());
    assert!(!read_journal(dir.path()).is_empty());

    db.flush_all().unwrap();
    let journal = dir.path().join(JOURNAL_FILE);
    assert_eq!(std::fs::metadata(&journal).unwrap().len(), 0);

    // A second checkpoint has nothing to do and is equally fine.
    db.flush_all().unwrap();
    assert_eq!(std::fs::metadata(&journal).unwrap().len(), 0);

    assert_eq!(db.get("a").unwrap(), Some("1".to_string()));
}

#[test]
fn dropping_the_engine_checkpoints() {
    let dir = tempdir().unwrap();
    {
        let mut db = StorageEngine::open(dir.path()).unwrap();
        assert!(db.insert("k", "v").unwrap());
    }
    assert_eq!(
        std::fs::metadata(dir.path().join(JOURNAL_FILE)).unwrap().len(),
        0
    );
}

#[test]
fn failed_journal_append_aborts_the_insert() {
    let dir = tempdir().unwrap();
    let mut db = StorageEngine::open(dir.path()).unwrap();

    let guard = failpoint::FailGuard::new("journal_append");
    assert!(db.insert("k", "v").is_err());
    drop(guard);

    assert_eq!(db.get("k").unwrap(), None);
    assert_eq!(db.linear_scan("k").unwrap(), None);
    assert_eq!(read_journal(dir.path()).len(), 0);
}

#[test]
fn failed_page_write_leaves_the_key_unindexed() {
    let dir = tempdir().unwrap();
    let mut db = StorageEngine::open(dir.path()).unwrap();

    let guard = failpoint::FailGuard::new("pager_write");
    assert!(db.insert("k", "v").is_err());
    drop(guard);

    // The intent reached the journal but no COMMIT followed, and the index
    // never learned the key.
    assert_eq!(db.get("k").unwrap(), None);
    let entries = read_journal(dir.path());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].op, JournalOp::Insert);

    // The engine stays usable.
    assert!(db.insert("k", "v").unwrap());
    assert_eq!(db.get("k").unwrap(), Some("v".to_string()));
}
