//! Spreadsheet-backed configuration tables with hot reload
//!
//! Each workbook is a domain (`nlp`, `navigation`, ...). Every sheet is laid
//! out as a header row, a description row, a type row, then data rows keyed by
//! the first column.

use std::sync::PoisonError;

use thiserror::Error;

pub mod reader;
pub mod validate;
pub mod value;
mod loader;

pub use loader::{convert_sheet, ConfigTable, ConfigTables, FreshnessDetail, FreshnessReport};
pub use reader::{ExcelDirectory, MemoryWorkbooks, RawSheet, WorkbookReader};
pub use validate::{SheetValidation, ValidationReport};
pub use value::{CellValue, ConfigRecord, ConfigSheet, ConfigValue};

/// Error type for the configuration loader
#[derive(Error, Debug)]
pub enum ConfigTableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Workbook not found: {0}")]
    NotFound(String),

    #[error("Workbook {domain} is invalid: {}", errors.join("; "))]
    Invalid { domain: String, errors: Vec<String> },

    #[error("Lock error: {0}")]
    Lock(String),
}

impl<T> From<PoisonError<T>> for ConfigTableError {
    fn from(error: PoisonError<T>) -> Self {
        ConfigTableError::Lock(error.to_string())
    }
}
