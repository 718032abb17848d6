use connectors::file::csv::{
    error::FileError,
    source::{count_records, open_upload},
};
use std::{fmt, io::Read, path::Path};

/// An upload handed to the orchestrator.
pub struct ImportSource {
    pub reader: Box<dyn Read + Send>,
    /// Data rows in the upload, when known up front.
    pub total: Option<u64>,
    /// Shown in logs and reports, usually the file name.
    pub label: String,
}

impl ImportSource {
    pub fn new(reader: impl Read + Send + 'static, label: impl Into<String>) -> Self {
        ImportSource {
            reader: Box::new(reader),
            total: None,
            label: label.into(),
        }
    }

    /// An in-memory upload. The total is counted from the bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, label: impl Into<String>) -> Self {
        let bytes = bytes.into();
        let total = count_records(bytes.as_slice()).ok();
        ImportSource {
            reader: Box::new(std::io::Cursor::new(bytes)),
            total,
            label: label.into(),
        }
    }

    /// Opens a `.csv` file, counting its rows in a first pass.
    pub fn from_path(path: &Path) -> Result<Self, FileError> {
        let total = count_records(open_upload(path)?)?;
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(ImportSource {
            reader: Box::new(open_upload(path)?),
            total: Some(total),
            label,
        })
    }

    pub fn with_total(mut self, total: Option<u64>) -> Self {
        self.total = total;
        self
    }
}

impl fmt::Debug for ImportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportSource")
            .field("label", &self.label)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}
