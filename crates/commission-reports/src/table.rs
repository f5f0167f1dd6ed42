//! In-memory table of named columns
//!
//! Datasets are loaded whole from CSV. Every cell starts as text or empty;
//! date columns are normalized into `Value::Date` after loading.

use chrono::NaiveDate;
use std::io::Read;
use std::path::Path;

use crate::constants;

/// Accepted date formats, tried in order
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%Y/%m/%d", "%d-%b-%Y"];

/// Accepted datetime formats; the time part is dropped
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Value {
    /// Build a cell from raw CSV text; blank means no value
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Value::Empty
        } else {
            Value::Text(raw.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Numeric coercion. Text must parse as a finite number; anything else is `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Date coercion. Text is parsed with the accepted formats.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Text(s) => parse_date(s),
            _ => None,
        }
    }

    /// Exact equality against text, without allocating for text cells
    pub fn matches_text(&self, text: &str) -> bool {
        match self {
            Value::Text(s) => s == text,
            other => other.to_display_string() == text,
        }
    }

    /// Text used for equality matching and display. Empty is "".
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Text(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Date(d) => d.format(constants::EXPORT_DATE_FORMAT).to_string(),
        }
    }
}

impl From<&str> for Value {
    fn from(raw: &str) -> Self {
        Value::from_raw(raw)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// Whole numbers print without a fractional part
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Expand a quarter string `Q<q><yyyy>` to the first day of the quarter
fn expand_quarter(s: &str) -> Option<NaiveDate> {
    let rest = s.strip_prefix('Q')?;
    let mut chars = rest.chars();
    let quarter = chars.next()?.to_digit(10)?;
    let year_str = chars.as_str();
    if !(1..=4).contains(&quarter) || year_str.len() != 4 || !year_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year_str.parse().ok()?;
    NaiveDate::from_ymd_opt(year, 3 * quarter - 2, 1)
}

/// Parse a date cell. Returns `None` for anything unrecognized.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(date) = expand_quarter(s) {
        return Some(date);
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }

    // Year-month only, e.g. a commission month of "2024-03"
    NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").ok()
}

/// Rows of values under a list of column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from column names and rows.
    /// Short rows are padded with `Value::Empty`, long rows truncated.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Empty);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Values of one column, top to bottom
    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value> + use<'a>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// New table with only the rows accepted by `keep`, order preserved
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// Apply `f` to every cell of the named column. Missing columns are ignored.
    pub fn map_column<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        let Some(idx) = self.column_index(name) else {
            return;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }

    /// Convert the named columns to `Value::Date`, unparseable cells to `Value::Empty`.
    /// Returns how many non-empty cells could not be parsed.
    pub fn normalize_dates(&mut self, columns: &[&str]) -> usize {
        let mut unparsed = 0;
        for name in columns {
            self.map_column(name, |value| match value.as_date() {
                Some(date) => Value::Date(date),
                None => {
                    if !value.is_empty() {
                        unparsed += 1;
                    }
                    Value::Empty
                }
            });
        }
        unparsed
    }

    /// Load a table from CSV with a header row
    pub fn from_csv_reader<R: Read>(reader: R) -> csv::Result<Table> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        let mut table = Table::new(columns);

        for result in rdr.records() {
            let record = result?;
            // Skip fully blank lines
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            table.push_row(record.iter().map(Value::from_raw).collect());
        }

        Ok(table)
    }

    pub fn from_csv_path(path: &Path) -> csv::Result<Table> {
        let file = std::fs::File::open(path).map_err(csv::Error::from)?;
        Self::from_csv_reader(file)
    }
}
