//! Error taxonomy for report generation
//!
//! Load-time failures abort a run before any filtering starts. Row-level data
//! problems (bad dates, non-numeric revenue) are never errors; those rows are
//! excluded where they would matter.

use std::path::PathBuf;
use thiserror::Error;

/// A lookup workbook is missing or malformed
#[derive(Error, Debug)]
pub enum SchemaLoadError {
    #[error("No {workbook} file found at {}. Please make sure {workbook} is in the lookup directory.", path.display())]
    WorkbookNotFound { workbook: String, path: PathBuf },

    #[error("Error reading sheet name for {workbook}! Please make sure the tab is named \"{sheet}\".")]
    SheetNotFound { workbook: String, sheet: String },

    #[error("Sheet \"{sheet}\" in {workbook} is malformed: {reason}")]
    Malformed {
        workbook: String,
        sheet: String,
        reason: String,
    },

    #[error("Failed to read sheet \"{sheet}\" in {workbook}: {source}")]
    Read {
        workbook: String,
        sheet: String,
        #[source]
        source: csv::Error,
    },
}

/// The dataset lacks columns required by the report columns schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Required columns not found: {}", missing.join(", "))]
pub struct MissingColumnsError {
    /// Every missing column, in schema order
    pub missing: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    SchemaLoad(#[from] SchemaLoadError),

    #[error(transparent)]
    MissingColumns(#[from] MissingColumnsError),

    #[error("Failed to read dataset {}: {source}", path.display())]
    Dataset {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("A report is already running; wait for it to finish")]
    Busy,
}

pub type ReportResult<T> = Result<T, ReportError>;
