//! Crash-gap recovery: the replay log is written before the store upsert,
//! so after a crash between the two the log is a superset of the store and
//! replaying it restores every missing row.

use rowvec_core::{
    BackupLog, FilteredBatch, MemoryVectorStore, PersistedBatch, RowMetadata, VectorStore,
};
use tempfile::TempDir;

fn batch(start_id: u64, rows: usize) -> (FilteredBatch, Vec<Vec<f32>>) {
    let ids: Vec<String> = (start_id..start_id + rows as u64)
        .map(|i| i.to_string())
        .collect();
    let texts: Vec<String> = ids.iter().map(|id| format!("doc {id}")).collect();
    let metadatas = ids
        .iter()
        .map(|_| RowMetadata {
            title: "t".to_string(),
            class_index: None,
        })
        .collect();
    let vectors = (0..rows).map(|i| vec![i as f32, 0.5]).collect();
    (
        FilteredBatch {
            ids,
            texts,
            metadatas,
        },
        vectors,
    )
}

#[test]
fn replay_recovers_store_after_crash_between_log_and_upsert() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("backup.log");

    // Batch one made it to both targets; batch two reached only the log
    // before the simulated crash.
    let mut store = MemoryVectorStore::new();
    let mut log = BackupLog::open(&path).expect("open log");

    let (first, first_vectors) = batch(0, 2);
    let first_persisted = PersistedBatch::new(first, first_vectors).expect("batch");
    log.append(&first_persisted).expect("append");
    store.upsert(&first_persisted).expect("upsert");

    let (second, second_vectors) = batch(2, 3);
    let second_persisted = PersistedBatch::new(second, second_vectors).expect("batch");
    log.append(&second_persisted).expect("append");
    drop(log); // crash before the store upsert

    assert_eq!(store.count().expect("count"), 2);

    let replayed = BackupLog::replay_into(&path, &mut store).expect("replay");
    assert_eq!(replayed, 2);
    assert_eq!(store.count().expect("count"), 5);
    assert_eq!(store.get("4").expect("item").document, "doc 4");
}

#[test]
fn replay_is_idempotent() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("backup.log");

    let mut log = BackupLog::open(&path).expect("open log");
    let (filtered, vectors) = batch(0, 3);
    log.append(&PersistedBatch::new(filtered, vectors).expect("batch"))
        .expect("append");
    drop(log);

    let mut store = MemoryVectorStore::new();
    BackupLog::replay_into(&path, &mut store).expect("first replay");
    BackupLog::replay_into(&path, &mut store).expect("second replay");
    assert_eq!(store.count().expect("count"), 3);
}
