use crate::file::csv::{
    error::FileError,
    metadata::{ColumnLayout, FieldLimits, resolve_columns},
};
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use model::{
    execution::errors::RowError,
    records::{batch::ParsedRow, product::ProductRecord},
};
use std::{
    fs::File,
    io::{self, Read},
    path::Path,
};
use tracing::warn;

/// Streams product records out of CSV input, one row in memory at a time.
///
/// The header row is read and checked when the reader is built, so a missing
/// required column fails before any row is produced. After that, rows that
/// fail validation are yielded as [`RowError`]s and reading continues. Only
/// an I/O failure of the underlying input stops the stream early.
pub struct ProductCsvReader<R: Read> {
    reader: csv::Reader<R>,
    layout: ColumnLayout,
    limits: FieldLimits,
    record: StringRecord,
    /// Data rows consumed so far, including malformed ones.
    rows_read: u64,
    finished: bool,
    fatal: Option<FileError>,
}

impl<R: Read> ProductCsvReader<R> {
    pub fn new(input: R, limits: FieldLimits) -> Result<Self, FileError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let headers = reader.headers()?.clone();
        let layout = resolve_columns(&headers)?;

        Ok(ProductCsvReader {
            reader,
            layout,
            limits,
            record: StringRecord::new(),
            rows_read: 0,
            finished: false,
            fatal: None,
        })
    }

    pub fn layout(&self) -> ColumnLayout {
        self.layout
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Reads the next row. `Ok(None)` marks the end of input.
    pub fn read_row(&mut self) -> Result<Option<ParsedRow>, FileError> {
        if self.finished {
            return Ok(None);
        }

        match self.reader.read_record(&mut self.record) {
            Ok(true) => {
                self.rows_read += 1;
                Ok(Some(self.validate()))
            }
            Ok(false) => {
                self.finished = true;
                Ok(None)
            }
            Err(err) if err.is_io_error() => {
                self.finished = true;
                Err(FileError::ReadError {
                    row: self.rows_read + 1,
                    message: err.to_string(),
                })
            }
            Err(err) => {
                self.rows_read += 1;
                Ok(Some(Err(RowError::at_row(
                    self.rows_read,
                    format!("malformed row: {err}"),
                ))))
            }
        }
    }

    /// The error that ended iteration early, if any.
    pub fn take_fatal(&mut self) -> Option<FileError> {
        self.fatal.take()
    }

    fn validate(&self) -> ParsedRow {
        let row = self.rows_read;
        let cell = |idx: usize| self.record.get(idx).unwrap_or("");

        let name = cell(self.layout.name).trim();
        let sku = cell(self.layout.sku).trim();
        let description = self.layout.description.map(cell).unwrap_or("");

        let mut missing = Vec::new();
        if name.is_empty() {
            missing.push("name");
        }
        if sku.is_empty() {
            missing.push("sku");
        }
        if !missing.is_empty() {
            return Err(RowError::at_row(
                row,
                format!("missing required field: {}", missing.join(", ")),
            ));
        }

        let name_len = name.chars().count();
        if name_len > self.limits.max_name_len {
            return Err(RowError::at_row(
                row,
                format!(
                    "name is {name_len} characters long, limit is {}",
                    self.limits.max_name_len
                ),
            ));
        }

        let sku_len = sku.chars().count();
        if sku_len > self.limits.max_sku_len {
            return Err(RowError::at_row(
                row,
                format!(
                    "sku is {sku_len} characters long, limit is {}",
                    self.limits.max_sku_len
                ),
            ));
        }

        Ok(ProductRecord::new(name, sku, description, row))
    }
}

impl<R: Read> Iterator for ProductCsvReader<R> {
    type Item = ParsedRow;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_row() {
            Ok(row) => row,
            Err(err) => {
                warn!(error = %err, rows_read = self.rows_read, "CSV stream ended early");
                self.fatal = Some(err);
                None
            }
        }
    }
}

/// Counts data records without keeping them, for progress totals.
pub fn count_records<R: Read>(input: R) -> Result<u64, FileError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);
    let mut record = ByteRecord::new();
    let mut count = 0;
    while reader.read_byte_record(&mut record)? {
        count += 1;
    }
    Ok(count)
}

/// Opens an upload from disk, accepting only `.csv` files.
pub fn open_upload(path: &Path) -> Result<File, FileError> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(FileError::InvalidFormat(path.display().to_string()));
    }

    File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => FileError::NotFound(path.display().to_string()),
        _ => FileError::IoError(err),
    })
}
