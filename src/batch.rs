//! Groups records into fixed-size windows and filters out rows with no
//! embeddable text.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RowvecError};
use crate::source::Record;

/// Per-row metadata persisted alongside each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMetadata {
    pub title: String,
    pub class_index: Option<String>,
}

/// The embeddable subset of one window: parallel arrays of ids, texts and
/// metadata, index-aligned at all times.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredBatch {
    pub ids: Vec<String>,
    pub texts: Vec<String>,
    pub metadatas: Vec<RowMetadata>,
}

impl FilteredBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// One scheduled window. `filtered` is `None` when every description in the
/// window was blank — the skip signal. `window_len` is always the pre-filter
/// length, which is what progress accounting advances by.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBatch {
    pub window_len: usize,
    pub filtered: Option<FilteredBatch>,
}

/// Consumes a record sequence in fixed windows of `batch_size`, assigning
/// each record an id equal to the decimal string of its absolute source
/// position (`start_offset + index within the run`).
///
/// Ids are a pure function of absolute position, so the same source row maps
/// to the same id regardless of which offset a run starts from; repeats
/// across runs land as overwrites through the store's idempotent upsert.
#[derive(Debug)]
pub struct BatchScheduler<I> {
    records: I,
    batch_size: usize,
    next_position: u64,
}

impl<I> BatchScheduler<I>
where
    I: Iterator<Item = Result<Record>>,
{
    /// Fails with [`RowvecError::Config`] if `batch_size` is zero.
    pub fn new(records: I, batch_size: usize, start_offset: u64) -> Result<Self> {
        if batch_size < 1 {
            return Err(RowvecError::Config {
                reason: "batch_size must be at least 1".into(),
            });
        }
        Ok(Self {
            records,
            batch_size,
            next_position: start_offset,
        })
    }

    fn schedule(&mut self, window: Vec<Record>) -> ScheduledBatch {
        let window_len = window.len();
        let mut ids = Vec::new();
        let mut texts = Vec::new();
        let mut metadatas = Vec::new();

        for record in window {
            let position = self.next_position;
            self.next_position += 1;
            if record.description.trim().is_empty() {
                continue;
            }
            ids.push(position.to_string());
            texts.push(record.description);
            metadatas.push(RowMetadata {
                title: record.title,
                class_index: record.class_index,
            });
        }

        let filtered = if ids.is_empty() {
            None
        } else {
            Some(FilteredBatch {
                ids,
                texts,
                metadatas,
            })
        };
        ScheduledBatch {
            window_len,
            filtered,
        }
    }
}

impl<I> Iterator for BatchScheduler<I>
where
    I: Iterator<Item = Result<Record>>,
{
    type Item = Result<ScheduledBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut window = Vec::with_capacity(self.batch_size);
        while window.len() < self.batch_size {
            match self.records.next() {
                Some(Ok(record)) => window.push(record),
                Some(Err(err)) => return Some(Err(err)),
                None => break,
            }
        }
        if window.is_empty() {
            return None;
        }
        Some(Ok(self.schedule(window)))
    }
}
