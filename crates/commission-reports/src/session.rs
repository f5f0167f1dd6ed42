//! The selected commissions file and its loaded dataset

use log::{info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants;
use crate::error::{MissingColumnsError, ReportError, ReportResult};
use crate::reference::ReferenceData;
use crate::table::Table;

/// Filter values offered for a dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Distinct customer identifiers, sorted
    pub customers: Vec<String>,
    /// Distinct principal full names, sorted
    pub principals: Vec<String>,
}

/// A loaded commissions dataset. Read-only once opened.
#[derive(Debug, Clone)]
pub struct Session {
    path: PathBuf,
    dataset: Arc<Table>,
}

impl Session {
    /// Load a commissions CSV, check it against the schema and normalize its date columns
    pub fn open(path: &Path, reference: &ReferenceData) -> ReportResult<Self> {
        let dataset = Table::from_csv_path(path).map_err(|source| ReportError::Dataset {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_table(path, dataset, reference)
    }

    /// Build a session from an already loaded table
    pub fn from_table(path: &Path, mut dataset: Table, reference: &ReferenceData) -> ReportResult<Self> {
        let missing = reference.schema.missing_from(&dataset);
        if !missing.is_empty() {
            return Err(MissingColumnsError { missing }.into());
        }

        let date_sources: Vec<&str> = constants::DATE_COLUMNS
            .iter()
            .filter_map(|display| reference.schema.source_of(display))
            .collect();
        let unparsed = dataset.normalize_dates(&date_sources);
        if unparsed > 0 {
            warn!("{} date value(s) could not be parsed and were cleared", unparsed);
        }

        info!(
            "File load complete: {} ({} rows)",
            path.file_name().unwrap_or(path.as_os_str()).to_string_lossy(),
            dataset.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            dataset: Arc::new(dataset),
        })
    }

    pub fn dataset(&self) -> &Table {
        &self.dataset
    }

    /// Shared handle to the dataset for a background job
    pub fn shared_dataset(&self) -> Arc<Table> {
        Arc::clone(&self.dataset)
    }

    /// File name without extension, used as the report name prefix
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string())
    }

    /// Customers and principals that can be selected for this dataset.
    /// Principal abbreviations without a full name are left out.
    pub fn options(&self, reference: &ReferenceData) -> QueryOptions {
        let source_of = |display: &'static str| reference.schema.source_of(display).unwrap_or(display);

        let distinct = |column: &str| -> BTreeSet<String> {
            self.dataset
                .column_values(column)
                .map(|values| {
                    values
                        .filter(|v| !v.is_empty())
                        .map(|v| v.to_display_string())
                        .collect()
                })
                .unwrap_or_default()
        };

        let customers = distinct(source_of(constants::CUSTOMER_COLUMN)).into_iter().collect();

        let mut principals = BTreeSet::new();
        for abbreviation in distinct(source_of(constants::PRINCIPAL_COLUMN)) {
            match reference.principals.to_full_name(&abbreviation) {
                Some(name) => {
                    principals.insert(name.to_string());
                }
                None => warn!("Principal abbreviation '{}' has no full name", abbreviation),
            }
        }

        QueryOptions {
            customers,
            principals: principals.into_iter().collect(),
        }
    }
}
