//! Crate-wide error type and `Result` alias.

use thiserror::Error;

/// Convenience alias used by every fallible API in the crate.
pub type Result<T> = std::result::Result<T, RowvecError>;

/// All failure modes surfaced by the ingestion pipeline.
///
/// The pipeline is fail-fast: apart from the bounded retry loop inside the
/// embedding client, none of these are caught internally — they propagate to
/// the caller and halt the run.
#[derive(Debug, Error)]
pub enum RowvecError {
    /// Invalid configuration, rejected at startup before any I/O.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// The underlying record stream could not be opened or is malformed
    /// beyond per-row recovery.
    #[error("record source failed: {reason}")]
    SourceRead { reason: String },

    /// The embedding HTTP client could not be constructed.
    #[error("embedding transport failed: {reason}")]
    Transport { reason: String },

    /// Every embedding attempt for one batch failed.
    #[error("embedding failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The service returned a different number of embeddings than inputs.
    /// A contract violation, never retried.
    #[error("embedding response shape mismatch: expected {expected} vectors, got {actual}")]
    EmbeddingShape { expected: usize, actual: usize },

    /// A replay-log entry failed its length or checksum check.
    #[error("backup log corrupt at offset {offset}: {reason}")]
    BackupCorruption { offset: u64, reason: String },

    /// An encoded batch is too large to frame as a single replay-log entry.
    #[error("backup log entry of {len} bytes exceeds the u32 frame limit")]
    BackupOversize { len: usize },

    /// The vector store rejected an upsert or count.
    #[error("vector store failed: {reason}")]
    Store { reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("deserialization failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}
