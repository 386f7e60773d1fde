#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::items_after_statements)]
// Counters and lengths stay well inside u64/f32 bounds for realistic runs.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

//! Batch ingestion pipeline: tabular records in, embedding vectors out.
//!
//! Rows from a tabular source are grouped into fixed-size batches, rows with
//! no embeddable text are filtered out, the remaining texts are embedded via
//! a remote service (blocking HTTPS with bounded retry and linear backoff),
//! and each embedded batch is appended to a durable replay log before being
//! upserted into a vector store. Execution is strictly sequential and
//! fail-fast.

/// The rowvec-core crate version (matches `Cargo.toml`).
pub const ROWVEC_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod batch;
pub mod config;
pub mod embed;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod source;
pub mod store;

pub use batch::{BatchScheduler, FilteredBatch, RowMetadata, ScheduledBatch};
pub use config::{
    API_KEY_ENV, DEFAULT_BACKOFF_BASE, DEFAULT_BATCH_SIZE, DEFAULT_ENDPOINT, DEFAULT_MAX_RETRIES,
    DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT, IngestConfig, IngestConfigBuilder,
};
pub use embed::{
    AttemptError, EmbeddingClient, EmbeddingRequest, EmbeddingResponse, EmbeddingTransport,
    HttpTransport, RealSleeper, RetryPolicy, Sleeper,
};
pub use error::{Result, RowvecError};
pub use io::backup::BackupLog;
pub use pipeline::{IngestReport, Pipeline};
pub use source::{
    CLASS_INDEX_FIELD, DEFAULT_TITLE, DESCRIPTION_FIELD, RawRow, Record, RecordSource,
    TITLE_FIELD, WorkbookSource,
};
pub use store::{MemoryVectorStore, PersistedBatch, StoreWriter, StoredItem, VectorStore};
