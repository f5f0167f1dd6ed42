//! Reference lookups: the report columns schema and the principal abbreviation map
//!
//! A lookup workbook is a directory under the lookup directory with one CSV
//! file per sheet, e.g. `lookup/principalList/Inactive.csv`.

use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::config::LookupConfig;
use crate::constants;
use crate::error::SchemaLoadError;
use crate::table::Table;

// =============================================================================
// Lookup Sources
// =============================================================================

/// One sheet of a lookup workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSource {
    pub dir: PathBuf,
    pub workbook: String,
    pub sheet: String,
}

impl LookupSource {
    pub fn new(dir: impl Into<PathBuf>, workbook: &str, sheet: &str) -> Self {
        Self {
            dir: dir.into(),
            workbook: workbook.to_string(),
            sheet: sheet.to_string(),
        }
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.dir.join(&self.workbook)
    }

    pub fn sheet_path(&self) -> PathBuf {
        self.workbook_path()
            .join(format!("{}.{}", self.sheet, constants::SHEET_EXTENSION))
    }

    /// Read the sheet into a table
    pub fn read(&self) -> Result<Table, SchemaLoadError> {
        let workbook_path = self.workbook_path();
        if !workbook_path.is_dir() {
            return Err(SchemaLoadError::WorkbookNotFound {
                workbook: self.workbook.clone(),
                path: workbook_path,
            });
        }

        let sheet_path = self.sheet_path();
        if !sheet_path.is_file() {
            return Err(SchemaLoadError::SheetNotFound {
                workbook: self.workbook.clone(),
                sheet: self.sheet.clone(),
            });
        }

        debug!("Reading lookup sheet {}", sheet_path.display());
        Table::from_csv_path(&sheet_path).map_err(|source| SchemaLoadError::Read {
            workbook: self.workbook.clone(),
            sheet: self.sheet.clone(),
            source,
        })
    }

    fn malformed(&self, reason: impl Into<String>) -> SchemaLoadError {
        SchemaLoadError::Malformed {
            workbook: self.workbook.clone(),
            sheet: self.sheet.clone(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Report Columns Schema
// =============================================================================

/// A dataset column kept in the report
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaColumn {
    /// Column name in the commissions dataset
    pub source: String,
    /// Column name in the report
    pub display: String,
    /// Display width in the exported sheet
    pub width: f64,
}

impl SchemaColumn {
    pub fn new(source: &str, display: &str, width: f64) -> Self {
        Self {
            source: source.to_string(),
            display: display.to_string(),
            width,
        }
    }
}

/// Ordered projection/rename/width list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<SchemaColumn>,
}

impl Schema {
    pub fn new(columns: Vec<SchemaColumn>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn display_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.display.clone()).collect()
    }

    /// Width of the column shown under `display`
    pub fn width_of(&self, display: &str) -> Option<f64> {
        self.columns.iter().find(|c| c.display == display).map(|c| c.width)
    }

    /// Dataset column shown under `display`
    pub fn source_of(&self, display: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.display == display)
            .map(|c| c.source.as_str())
    }

    /// Source columns absent from `table`, in schema order
    pub fn missing_from(&self, table: &Table) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !table.has_column(&c.source))
            .map(|c| c.source.clone())
            .collect()
    }

    /// Engine columns the schema does not produce
    pub fn missing_key_columns(&self) -> Vec<&'static str> {
        constants::KEY_COLUMNS
            .into_iter()
            .filter(|key| !self.columns.iter().any(|c| c.display == *key))
            .collect()
    }
}

/// Load the report columns schema.
///
/// The sheet header holds source column names, the first row display names
/// and the second row numeric widths.
pub fn load_schema(source: &LookupSource) -> Result<Schema, SchemaLoadError> {
    let sheet = source.read()?;

    if sheet.columns().is_empty() {
        return Err(source.malformed("no header row"));
    }
    if sheet.len() < 2 {
        return Err(source.malformed(format!(
            "expected a display name row and a width row, found {} row(s)",
            sheet.len()
        )));
    }

    let display_row = &sheet.rows()[0];
    let width_row = &sheet.rows()[1];
    let mut columns = Vec::with_capacity(sheet.columns().len());
    let mut seen = HashSet::new();

    for (idx, source_name) in sheet.columns().iter().enumerate() {
        if source_name.trim().is_empty() {
            return Err(source.malformed(format!("column {} has no source name", idx + 1)));
        }

        let display = display_row[idx].to_display_string().trim().to_string();
        if display.is_empty() {
            return Err(source.malformed(format!("no display name for \"{}\"", source_name)));
        }
        if !seen.insert(display.clone()) {
            return Err(source.malformed(format!("display name \"{}\" is used twice", display)));
        }

        let width = width_row[idx]
            .as_number()
            .ok_or_else(|| source.malformed(format!("width for \"{}\" is not a number", source_name)))?;

        columns.push(SchemaColumn {
            source: source_name.clone(),
            display,
            width,
        });
    }

    let schema = Schema::new(columns);
    let missing = schema.missing_key_columns();
    if !missing.is_empty() {
        return Err(source.malformed(format!(
            "no column is displayed as {}",
            missing.join(", ")
        )));
    }

    Ok(schema)
}

// =============================================================================
// Principal Map
// =============================================================================

/// A principal and its short code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalEntry {
    pub name: String,
    pub abbreviation: String,
}

impl PrincipalEntry {
    pub fn new(name: &str, abbreviation: &str) -> Self {
        Self {
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
        }
    }
}

/// Invertible principal name <-> abbreviation lookup.
///
/// Entries keep load order (active before inactive). When a name or an
/// abbreviation appears more than once, the first entry wins.
#[derive(Debug, Clone, Default)]
pub struct PrincipalMap {
    entries: Vec<PrincipalEntry>,
    by_name: HashMap<String, usize>,
    by_abbreviation: HashMap<String, usize>,
}

impl PrincipalMap {
    pub fn from_entries(entries: impl IntoIterator<Item = PrincipalEntry>) -> Self {
        let mut map = Self::default();

        for entry in entries {
            let idx = map.entries.len();
            if map.by_name.contains_key(&entry.name) {
                debug!("Duplicate principal '{}' ignored for name lookup", entry.name);
            } else {
                map.by_name.insert(entry.name.clone(), idx);
            }
            if map.by_abbreviation.contains_key(&entry.abbreviation) {
                debug!(
                    "Duplicate abbreviation '{}' ignored for full-name lookup",
                    entry.abbreviation
                );
            } else {
                map.by_abbreviation.insert(entry.abbreviation.clone(), idx);
            }
            map.entries.push(entry);
        }

        map
    }

    pub fn to_abbreviation(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(name)
            .map(|&idx| self.entries[idx].abbreviation.as_str())
    }

    pub fn to_full_name(&self, abbreviation: &str) -> Option<&str> {
        self.by_abbreviation
            .get(abbreviation)
            .map(|&idx| self.entries[idx].name.as_str())
    }

    pub fn entries(&self) -> &[PrincipalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Principal entries of one sheet; rows missing either cell are skipped
fn read_principal_entries(source: &LookupSource) -> Result<Vec<PrincipalEntry>, SchemaLoadError> {
    let sheet = source.read()?;

    let name_idx = sheet.column_index(constants::PRINCIPAL_NAME_HEADER);
    let abbrev_idx = sheet.column_index(constants::ABBREVIATION_HEADER);
    let (Some(name_idx), Some(abbrev_idx)) = (name_idx, abbrev_idx) else {
        return Err(source.malformed(format!(
            "expected \"{}\" and \"{}\" columns",
            constants::PRINCIPAL_NAME_HEADER,
            constants::ABBREVIATION_HEADER
        )));
    };

    let mut entries = Vec::with_capacity(sheet.len());
    for row in sheet.rows() {
        let name = row[name_idx].to_display_string();
        let abbreviation = row[abbrev_idx].to_display_string();
        let (name, abbreviation) = (name.trim(), abbreviation.trim());
        if name.is_empty() || abbreviation.is_empty() {
            continue;
        }
        entries.push(PrincipalEntry::new(name, abbreviation));
    }

    Ok(entries)
}

/// Load active then inactive principals into one map
pub fn load_principal_map(
    active: &LookupSource,
    inactive: &LookupSource,
) -> Result<PrincipalMap, SchemaLoadError> {
    let active_entries = read_principal_entries(active)?;
    let inactive_entries = read_principal_entries(inactive)?;
    debug!(
        "Principals: {} active, {} inactive",
        active_entries.len(),
        inactive_entries.len()
    );
    Ok(PrincipalMap::from_entries(
        active_entries.into_iter().chain(inactive_entries),
    ))
}

// =============================================================================
// Reference Data
// =============================================================================

/// Lookups loaded once per run and shared read-only
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub schema: Schema,
    pub principals: PrincipalMap,
}

impl ReferenceData {
    pub fn load(lookup: &LookupConfig) -> Result<Self, SchemaLoadError> {
        let schema = load_schema(&lookup.report_columns())?;
        let principals = load_principal_map(&lookup.active_principals(), &lookup.inactive_principals())?;

        info!(
            "Loaded {} report columns and {} principals from {}",
            schema.len(),
            principals.len(),
            lookup.dir.display()
        );

        Ok(Self { schema, principals })
    }
}
