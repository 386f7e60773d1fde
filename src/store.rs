//! Vector store seam and the dual-target writer (replay log + store).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::batch::{FilteredBatch, RowMetadata};
use crate::error::{Result, RowvecError};
use crate::io::backup::BackupLog;

/// The unit persisted to both targets: four parallel arrays, one entry per
/// embedded row of the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedBatch {
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub documents: Vec<String>,
    pub metadatas: Vec<RowMetadata>,
}

impl PersistedBatch {
    /// Combine a filtered batch with its order-aligned vectors.
    ///
    /// Alignment is the embedding client's contract; a mismatch here means a
    /// caller bypassed it.
    pub fn new(batch: FilteredBatch, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if embeddings.len() != batch.ids.len() {
            return Err(RowvecError::EmbeddingShape {
                expected: batch.ids.len(),
                actual: embeddings.len(),
            });
        }
        Ok(Self {
            ids: batch.ids,
            embeddings,
            documents: batch.texts,
            metadatas: batch.metadatas,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Narrow interface onto the vector database: keyed upsert plus a total
/// count. Upsert overwrites entries with the same id rather than erroring.
pub trait VectorStore {
    fn upsert(&mut self, batch: &PersistedBatch) -> Result<()>;
    fn count(&self) -> Result<u64>;
}

impl<V: VectorStore + ?Sized> VectorStore for &mut V {
    fn upsert(&mut self, batch: &PersistedBatch) -> Result<()> {
        (**self).upsert(batch)
    }

    fn count(&self) -> Result<u64> {
        (**self).count()
    }
}

/// One stored row of the in-memory reference store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: RowMetadata,
}

/// In-memory `VectorStore` used by tests and as the reference semantics for
/// real backends.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    items: BTreeMap<String, StoredItem>,
}

impl MemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StoredItem> {
        self.items.get(id)
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.items.keys().map(String::as_str).collect()
    }
}

impl VectorStore for MemoryVectorStore {
    fn upsert(&mut self, batch: &PersistedBatch) -> Result<()> {
        for (((id, embedding), document), metadata) in batch
            .ids
            .iter()
            .zip(&batch.embeddings)
            .zip(&batch.documents)
            .zip(&batch.metadatas)
        {
            self.items.insert(
                id.clone(),
                StoredItem {
                    embedding: embedding.clone(),
                    document: document.clone(),
                    metadata: metadata.clone(),
                },
            );
        }
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.items.len() as u64)
    }
}

/// Persists each embedded batch to the replay log first, then upserts into
/// the vector store.
///
/// The two writes are not transactional. Log-first ordering means a crash
/// between them leaves the log a superset of the store, so
/// [`BackupLog::replay_into`] restores the store; idempotent upsert makes
/// the replay safe to repeat.
pub struct StoreWriter<V> {
    store: V,
    backup: BackupLog,
}

impl<V: VectorStore> StoreWriter<V> {
    pub fn new(store: V, backup: BackupLog) -> Self {
        Self { store, backup }
    }

    /// Write one batch to both targets, log first.
    pub fn persist(&mut self, batch: FilteredBatch, embeddings: Vec<Vec<f32>>) -> Result<()> {
        let persisted = PersistedBatch::new(batch, embeddings)?;
        self.backup.append(&persisted)?;
        self.store.upsert(&persisted)?;
        Ok(())
    }

    /// Total item count currently held by the store.
    pub fn store_count(&self) -> Result<u64> {
        self.store.count()
    }

    /// Release both targets, returning the store to the caller.
    #[must_use]
    pub fn into_store(self) -> V {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn filtered(ids: &[u64], text: &str) -> FilteredBatch {
        FilteredBatch {
            ids: ids.iter().map(u64::to_string).collect(),
            texts: vec![text.to_string(); ids.len()],
            metadatas: vec![
                RowMetadata {
                    title: "t".to_string(),
                    class_index: None,
                };
                ids.len()
            ],
        }
    }

    fn vectors(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![i as f32, 1.0]).collect()
    }

    #[test]
    fn upsert_overwrites_same_id() {
        let mut store = MemoryVectorStore::new();
        let first = PersistedBatch::new(filtered(&[5], "old"), vectors(1)).expect("batch");
        let second = PersistedBatch::new(filtered(&[5], "new"), vectors(1)).expect("batch");
        store.upsert(&first).expect("upsert");
        store.upsert(&second).expect("upsert");

        assert_eq!(store.count().expect("count"), 1);
        assert_eq!(store.get("5").expect("item").document, "new");
    }

    #[test]
    fn misaligned_embeddings_rejected() {
        let err = PersistedBatch::new(filtered(&[1, 2], "x"), vectors(1)).expect_err("must fail");
        assert!(matches!(err, RowvecError::EmbeddingShape { .. }));
    }

    #[test]
    fn persist_writes_log_then_store() {
        let dir = tempdir().expect("tmp");
        let path = dir.path().join("backup.log");
        let backup = BackupLog::open(&path).expect("open log");
        let mut writer = StoreWriter::new(MemoryVectorStore::new(), backup);

        writer
            .persist(filtered(&[0, 1], "doc"), vectors(2))
            .expect("persist");

        assert_eq!(writer.store_count().expect("count"), 2);
        let logged = BackupLog::read_all(&path).expect("read log");
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].ids, vec!["0", "1"]);
        assert_eq!(logged[0].documents, vec!["doc", "doc"]);
    }
}
