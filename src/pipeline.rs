//! The orchestrator: drives source → scheduler → embedder → writer, one
//! batch at a time.

use crate::batch::BatchScheduler;
use crate::embed::{EmbeddingClient, EmbeddingTransport, Sleeper};
use crate::error::Result;
use crate::source::Record;
use crate::store::{StoreWriter, VectorStore};

/// Final summary of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Records consumed from the source after the resume offset, counting
    /// filtered-out rows.
    pub rows_processed: u64,
    /// Rows actually embedded and persisted.
    pub rows_embedded: u64,
    /// Batches written to the store and replay log.
    pub batches_persisted: u64,
    /// Windows skipped because every description was blank.
    pub batches_skipped: u64,
    /// Total item count held by the vector store at completion.
    pub store_count: u64,
}

/// Owns single instances of every stage and runs them strictly in sequence:
/// one batch is fully embedded and persisted before the next is read.
///
/// Fail-fast: the first fatal error from any stage propagates immediately;
/// no later batch is attempted and no partial write occurs for the batch
/// that failed.
pub struct Pipeline<I, T, S, V> {
    scheduler: BatchScheduler<I>,
    embedder: EmbeddingClient<T, S>,
    writer: StoreWriter<V>,
}

impl<I, T, S, V> Pipeline<I, T, S, V>
where
    I: Iterator<Item = Result<Record>>,
    T: EmbeddingTransport,
    S: Sleeper,
    V: VectorStore,
{
    pub fn new(
        scheduler: BatchScheduler<I>,
        embedder: EmbeddingClient<T, S>,
        writer: StoreWriter<V>,
    ) -> Self {
        Self {
            scheduler,
            embedder,
            writer,
        }
    }

    /// Process every batch, returning the run summary.
    pub fn run(mut self) -> Result<(IngestReport, V)> {
        let mut report = IngestReport {
            rows_processed: 0,
            rows_embedded: 0,
            batches_persisted: 0,
            batches_skipped: 0,
            store_count: 0,
        };

        while let Some(scheduled) = self.scheduler.next() {
            let scheduled = scheduled?;
            report.rows_processed += scheduled.window_len as u64;

            match scheduled.filtered {
                Some(batch) => {
                    let batch_len = batch.len() as u64;
                    let first_id = batch.ids.first().cloned().unwrap_or_default();
                    let embeddings =
                        self.embedder.embed_batch(&batch.texts).inspect_err(|err| {
                            tracing::error!(
                                stage = "embed",
                                batch_first_id = %first_id,
                                rows_embedded = report.rows_embedded,
                                error = %err,
                                "batch failed; halting run"
                            );
                        })?;
                    self.writer.persist(batch, embeddings).inspect_err(|err| {
                        tracing::error!(
                            stage = "persist",
                            batch_first_id = %first_id,
                            rows_embedded = report.rows_embedded,
                            error = %err,
                            "batch failed; halting run"
                        );
                    })?;
                    report.rows_embedded += batch_len;
                    report.batches_persisted += 1;
                    tracing::info!(
                        rows_processed = report.rows_processed,
                        rows_embedded = report.rows_embedded,
                        batch_rows = batch_len,
                        "batch persisted"
                    );
                }
                None => {
                    report.batches_skipped += 1;
                    tracing::debug!(
                        rows_processed = report.rows_processed,
                        window_len = scheduled.window_len,
                        "window skipped: no embeddable text"
                    );
                }
            }
        }

        report.store_count = self.writer.store_count()?;
        tracing::info!(
            rows_processed = report.rows_processed,
            rows_embedded = report.rows_embedded,
            batches_persisted = report.batches_persisted,
            batches_skipped = report.batches_skipped,
            store_count = report.store_count,
            "ingestion finished"
        );
        Ok((report, self.writer.into_store()))
    }
}
