//! Record sources: lazy row streams with resume-offset skipping and
//! field defaulting.

use std::collections::BTreeMap;
use std::io::Cursor;

use calamine::{DataType, Reader as CalamineReader, Xlsx};

use crate::error::{Result, RowvecError};

/// Field name carrying the record title.
pub const TITLE_FIELD: &str = "Title";
/// Field name carrying the embeddable text.
pub const DESCRIPTION_FIELD: &str = "Description";
/// Field name carrying the opaque class label.
pub const CLASS_INDEX_FIELD: &str = "Class Index";
/// Placeholder substituted when a row has no title.
pub const DEFAULT_TITLE: &str = "Untitled";

/// One raw tabular row: named fields as read from the source.
pub type RawRow = BTreeMap<String, String>;

/// One input record after field defaulting.
///
/// Created per row and consumed immediately by the scheduler; a missing
/// title becomes [`DEFAULT_TITLE`], a missing description becomes the empty
/// string, a missing class index stays `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub title: String,
    pub description: String,
    pub class_index: Option<String>,
}

impl Record {
    /// Build a record from a raw row, applying the defaulting rules.
    #[must_use]
    pub fn from_raw(mut row: RawRow) -> Self {
        let title = row
            .remove(TITLE_FIELD)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let description = row.remove(DESCRIPTION_FIELD).unwrap_or_default();
        let class_index = row.remove(CLASS_INDEX_FIELD);
        Self {
            title,
            description,
            class_index,
        }
    }
}

/// Lazy sequence of [`Record`]s over any raw-row stream, omitting the first
/// `skip` rows (the resume offset).
///
/// Reading is the only side effect; errors from the underlying stream pass
/// through as [`RowvecError::SourceRead`].
pub struct RecordSource<I> {
    rows: I,
    remaining_skip: u64,
}

impl<I> RecordSource<I>
where
    I: Iterator<Item = Result<RawRow>>,
{
    pub fn new(rows: I, skip: u64) -> Self {
        Self {
            rows,
            remaining_skip: skip,
        }
    }
}

impl<I> Iterator for RecordSource<I>
where
    I: Iterator<Item = Result<RawRow>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining_skip > 0 {
            match self.rows.next()? {
                Ok(_) => self.remaining_skip -= 1,
                Err(err) => return Some(Err(err)),
            }
        }
        match self.rows.next()? {
            Ok(row) => Some(Ok(Record::from_raw(row))),
            Err(err) => Some(Err(err)),
        }
    }
}

/// Tabular source backed by the first sheet of an XLSX workbook.
///
/// Row 1 names the fields; every later row becomes a [`RawRow`] keyed by
/// those names. Cells beyond the header width are dropped, missing trailing
/// cells are absent from the row map.
#[derive(Debug)]
pub struct WorkbookSource {
    header: Vec<String>,
    rows: std::vec::IntoIter<Vec<String>>,
}

impl WorkbookSource {
    /// Open a workbook from raw XLSX bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let cursor = Cursor::new(bytes);
        let mut workbook = Xlsx::new(cursor).map_err(|err| RowvecError::SourceRead {
            reason: format!("failed to read xlsx workbook: {err}"),
        })?;

        let sheet_names: Vec<String> = workbook.sheet_names().clone();
        let first = sheet_names.first().ok_or_else(|| RowvecError::SourceRead {
            reason: "workbook has no sheets".into(),
        })?;
        let range = workbook
            .worksheet_range(first)
            .ok_or_else(|| RowvecError::SourceRead {
                reason: format!("sheet '{first}' is missing"),
            })?
            .map_err(|err| RowvecError::SourceRead {
                reason: format!("sheet '{first}' is unreadable: {err}"),
            })?;

        let mut rows = range.rows().map(|row| {
            row.iter()
                .map(render_cell)
                .collect::<Vec<String>>()
        });
        let header = rows.next().ok_or_else(|| RowvecError::SourceRead {
            reason: format!("sheet '{first}' has no header row"),
        })?;

        Ok(Self {
            header,
            rows: rows.collect::<Vec<_>>().into_iter(),
        })
    }

    /// Open a workbook file from disk.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let bytes = fs_err::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Field names from the header row.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }
}

impl Iterator for WorkbookSource {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let cells = self.rows.next()?;
        let row: RawRow = self
            .header
            .iter()
            .zip(cells)
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.clone(), value))
            .collect();
        Some(Ok(row))
    }
}

fn render_cell(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Float(v) | DataType::DateTime(v) | DataType::Duration(v) => format!("{v}"),
        DataType::Int(v) => format!("{v}"),
        DataType::Bool(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        DataType::DateTimeIso(s) | DataType::DurationIso(s) => s.clone(),
        DataType::Error(e) => format!("#{e:?}"),
        DataType::Empty => String::new(),
    }
}
