//! Append-only, checksummed replay log for persisted batches.
//!
//! Each entry is `[len: u32 LE][blake3 checksum: 32 bytes][bincode payload]`.
//! Appends never truncate or rewrite earlier entries and are fsynced before
//! returning, so the log is a durable superset of the vector store under the
//! pipeline's log-first write ordering.

use std::io::{Read, Write};
use std::path::Path;

use bincode::config::{self, Config};
use fs_err::File;
use fs_err::OpenOptions;

use crate::error::{Result, RowvecError};
use crate::store::{PersistedBatch, VectorStore};

// [len: u32][checksum: 32 bytes]
const ENTRY_HEADER_SIZE: usize = 36;

fn log_config() -> impl Config {
    config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
}

fn frame_len(payload_len: usize) -> Result<u32> {
    u32::try_from(payload_len).map_err(|_| RowvecError::BackupOversize { len: payload_len })
}

/// Append-only writer over the replay-log file. One writer per run; the
/// handle is held open in append mode for the life of the pipeline.
#[derive(Debug)]
pub struct BackupLog {
    file: File,
    entries_appended: u64,
}

impl BackupLog {
    /// Open (or create) the log at `path` for appending.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            file,
            entries_appended: 0,
        })
    }

    /// Append one batch and fsync. Returns the number of entries this writer
    /// has appended so far.
    pub fn append(&mut self, batch: &PersistedBatch) -> Result<u64> {
        let payload = bincode::serde::encode_to_vec(batch, log_config())?;
        let payload_len = frame_len(payload.len())?;
        let digest = blake3::hash(&payload);

        let mut entry = Vec::with_capacity(ENTRY_HEADER_SIZE + payload.len());
        entry.extend_from_slice(&payload_len.to_le_bytes());
        entry.extend_from_slice(digest.as_bytes());
        entry.extend_from_slice(&payload);

        self.file.write_all(&entry)?;
        self.file.sync_all()?;

        self.entries_appended += 1;
        tracing::debug!(
            backup.entries = self.entries_appended,
            backup.payload_len = payload.len(),
            "backup log append"
        );
        Ok(self.entries_appended)
    }

    /// Read every entry back, verifying lengths and checksums. Corruption is
    /// reported with the byte offset of the failing entry.
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<PersistedBatch>> {
        let mut file = File::open(path.as_ref())?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut batches = Vec::new();
        let mut cursor = 0usize;
        while cursor < bytes.len() {
            if cursor + ENTRY_HEADER_SIZE > bytes.len() {
                return Err(RowvecError::BackupCorruption {
                    offset: cursor as u64,
                    reason: "truncated entry header".into(),
                });
            }
            let len_bytes: [u8; 4] = bytes[cursor..cursor + 4]
                .try_into()
                .map_err(|_| RowvecError::BackupCorruption {
                    offset: cursor as u64,
                    reason: "invalid entry length header".into(),
                })?;
            let payload_len = u32::from_le_bytes(len_bytes) as usize;
            let checksum = &bytes[cursor + 4..cursor + ENTRY_HEADER_SIZE];

            let payload_start = cursor + ENTRY_HEADER_SIZE;
            let payload_end = payload_start + payload_len;
            if payload_len == 0 || payload_end > bytes.len() {
                return Err(RowvecError::BackupCorruption {
                    offset: cursor as u64,
                    reason: "entry length exceeds file".into(),
                });
            }

            let payload = &bytes[payload_start..payload_end];
            if blake3::hash(payload).as_bytes() != checksum {
                return Err(RowvecError::BackupCorruption {
                    offset: cursor as u64,
                    reason: "entry checksum mismatch".into(),
                });
            }

            let (batch, _) = bincode::serde::decode_from_slice(payload, log_config())?;
            batches.push(batch);
            cursor = payload_end;
        }

        Ok(batches)
    }

    /// Re-apply every logged batch to `store`, in log order.
    ///
    /// Safe after a crash between log append and store upsert: the log is a
    /// superset and upsert-by-id overwrites rather than duplicating. Returns
    /// the number of batches replayed.
    pub fn replay_into<P, V>(path: P, store: &mut V) -> Result<u64>
    where
        P: AsRef<Path>,
        V: VectorStore,
    {
        let batches = Self::read_all(path)?;
        let replayed = batches.len() as u64;
        for batch in &batches {
            store.upsert(batch)?;
        }
        tracing::info!(backup.batches = replayed, "backup log replayed into store");
        Ok(replayed)
    }

    /// Entries appended by this writer.
    #[must_use]
    pub fn entries_appended(&self) -> u64 {
        self.entries_appended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::RowMetadata;
    use crate::store::MemoryVectorStore;
    use tempfile::tempdir;

    fn batch(id: u64, document: &str) -> PersistedBatch {
        PersistedBatch {
            ids: vec![id.to_string()],
            embeddings: vec![vec![0.5, 1.5]],
            documents: vec![document.to_string()],
            metadatas: vec![RowMetadata {
                title: "t".to_string(),
                class_index: Some("1".to_string()),
            }],
        }
    }

    #[test]
    fn append_then_read_back_in_order() {
        let dir = tempdir().expect("tmp");
        let path = dir.path().join("backup.log");

        let mut log = BackupLog::open(&path).expect("open");
        assert_eq!(log.append(&batch(0, "first")).expect("append"), 1);
        assert_eq!(log.append(&batch(1, "second")).expect("append"), 2);
        drop(log);

        let entries = BackupLog::read_all(&path).expect("read");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].documents, vec!["first"]);
        assert_eq!(entries[1].documents, vec!["second"]);
        assert_eq!(entries[1].metadatas[0].class_index.as_deref(), Some("1"));
    }

    #[test]
    fn reopen_appends_without_truncating() {
        let dir = tempdir().expect("tmp");
        let path = dir.path().join("backup.log");

        let mut log = BackupLog::open(&path).expect("open");
        log.append(&batch(0, "first")).expect("append");
        drop(log);

        let mut reopened = BackupLog::open(&path).expect("reopen");
        reopened.append(&batch(1, "second")).expect("append");
        drop(reopened);

        let entries = BackupLog::read_all(&path).expect("read");
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn corrupted_payload_reports_offset() {
        use std::io::{Seek, SeekFrom, Write};

        let dir = tempdir().expect("tmp");
        let path = dir.path().join("backup.log");

        let mut log = BackupLog::open(&path).expect("open");
        log.append(&batch(0, "first")).expect("append");
        let first_entry_end = fs_err::metadata(&path).expect("meta").len();
        log.append(&batch(1, "second")).expect("append");
        drop(log);

        // Flip a payload byte inside the second entry.
        let mut file = fs_err::OpenOptions::new()
            .write(true)
            .open(&path)
            .expect("open raw");
        file.seek(SeekFrom::Start(first_entry_end + ENTRY_HEADER_SIZE as u64 + 2))
            .expect("seek");
        file.write_all(&[0xFF]).expect("corrupt");
        file.sync_all().expect("sync");

        let err = BackupLog::read_all(&path).expect_err("must fail");
        match err {
            RowvecError::BackupCorruption { offset, reason } => {
                assert_eq!(offset, first_entry_end);
                assert!(reason.contains("checksum"), "reason: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn truncated_file_reports_offset() {
        let dir = tempdir().expect("tmp");
        let path = dir.path().join("backup.log");

        let mut log = BackupLog::open(&path).expect("open");
        log.append(&batch(0, "first")).expect("append");
        drop(log);

        let full = fs_err::read(&path).expect("read");
        fs_err::write(&path, &full[..full.len() - 3]).expect("truncate");

        let err = BackupLog::read_all(&path).expect_err("must fail");
        assert!(matches!(err, RowvecError::BackupCorruption { .. }));
    }

    #[test]
    fn oversized_entry_rejected_before_write() {
        assert!(frame_len(usize::try_from(u32::MAX).expect("fits")).is_ok());
        let err = frame_len(usize::MAX).expect_err("must reject");
        assert!(matches!(err, RowvecError::BackupOversize { len } if len == usize::MAX));
    }

    #[test]
    fn replay_restores_store() {
        let dir = tempdir().expect("tmp");
        let path = dir.path().join("backup.log");

        let mut log = BackupLog::open(&path).expect("open");
        log.append(&batch(0, "first")).expect("append");
        log.append(&batch(1, "second")).expect("append");
        drop(log);

        let mut store = MemoryVectorStore::new();
        let replayed = BackupLog::replay_into(&path, &mut store).expect("replay");
        assert_eq!(replayed, 2);
        assert_eq!(store.count().expect("count"), 2);
        assert_eq!(store.get("1").expect("item").document, "second");
    }
}
