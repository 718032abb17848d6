use crate::file::csv::error::FileError;
use csv::StringRecord;
use serde::Serialize;

pub const NAME_COLUMN: &str = "name";
pub const SKU_COLUMN: &str = "sku";
pub const DESCRIPTION_COLUMN: &str = "description";

/// Positions of the product columns within a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnLayout {
    pub name: usize,
    pub sku: usize,
    pub description: Option<usize>,
}

/// Per-field length limits, counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldLimits {
    pub max_name_len: usize,
    pub max_sku_len: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        FieldLimits {
            max_name_len: 255,
            max_sku_len: 100,
        }
    }
}

pub fn normalize_col_name(name: &str) -> String {
    name.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Locates the required columns, matching names case-insensitively in any order.
/// The first occurrence wins when a column name repeats.
pub fn resolve_columns(headers: &StringRecord) -> Result<ColumnLayout, FileError> {
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(FileError::MissingHeader);
    }

    let position = |wanted: &str| {
        headers
            .iter()
            .position(|h| normalize_col_name(h) == wanted)
    };

    let name = position(NAME_COLUMN);
    let sku = position(SKU_COLUMN);

    match (name, sku) {
        (Some(name), Some(sku)) => Ok(ColumnLayout {
            name,
            sku,
            description: position(DESCRIPTION_COLUMN),
        }),
        (name, sku) => {
            let mut missing = Vec::new();
            if name.is_none() {
                missing.push(NAME_COLUMN.to_string());
            }
            if sku.is_none() {
                missing.push(SKU_COLUMN.to_string());
            }
            Err(FileError::MissingColumns(missing))
        }
    }
}
