//! Report generation (CSV sheets and console summary)

use csv::Writer;
use log::{debug, info};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::settings::Style;
use tabled::{Table as TextTable, Tabled};

use crate::constants;
use crate::error::ReportResult;
use crate::filter::FilterSpec;
use crate::query::{QueryEngine, QueryOutput, RankedCustomer};
use crate::reference::{ReferenceData, Schema};
use crate::session::Session;
use crate::table::{Table, Value};

// =============================================================================
// Assembly
// =============================================================================

/// One exported sheet
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub widths: Vec<f64>,
    pub rows: Vec<Vec<Value>>,
}

/// Both sheets of a finished report
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub data: Sheet,
    pub ranked: Sheet,
}

impl Report {
    pub fn sheets(&self) -> [&Sheet; 2] {
        [&self.data, &self.ranked]
    }
}

/// Shape query output into exportable sheets.
///
/// Date columns become display strings, with no value written as "".
pub fn assemble(output: &QueryOutput, schema: &Schema) -> Report {
    let mut table: Table = output.table.clone();
    for column in constants::DATE_COLUMNS {
        table.map_column(column, |value| Value::Text(value.to_display_string()));
    }

    let widths = table
        .columns()
        .iter()
        .map(|c| schema.width_of(c).unwrap_or(constants::DEFAULT_COLUMN_WIDTH))
        .collect();

    let data = Sheet {
        name: constants::DATA_SHEET.to_string(),
        columns: table.columns().to_vec(),
        widths,
        rows: table.rows().to_vec(),
    };

    let ranked_columns = [constants::CUSTOMER_COLUMN, constants::REVENUE_COLUMN];
    let ranked = Sheet {
        name: constants::RANKED_SHEET.to_string(),
        columns: ranked_columns.iter().map(|c| c.to_string()).collect(),
        widths: ranked_columns
            .iter()
            .map(|c| schema.width_of(c).unwrap_or(constants::DEFAULT_COLUMN_WIDTH))
            .collect(),
        rows: output
            .ranked
            .iter()
            .map(|r| vec![Value::Text(r.customer.clone()), Value::Number(r.total_revenue)])
            .collect(),
    };

    Report { data, ranked }
}

// =============================================================================
// Export
// =============================================================================

/// What happened to an export attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Files written
    Saved(Vec<PathBuf>),
    /// A target is open elsewhere; nothing was written
    Locked(PathBuf),
}

/// Writes a report somewhere. `base` is the output path without sheet suffix or extension.
///
/// `Sheet::widths` is for exporters that lay out columns; `CsvExporter` has no
/// column widths and ignores it.
pub trait ReportExporter {
    fn export(&self, report: &Report, base: &Path) -> ReportResult<ExportOutcome>;
}

/// Writes each sheet as `<base>_<sheet name>.csv`
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvExporter;

impl CsvExporter {
    pub fn sheet_path(base: &Path, sheet: &Sheet) -> PathBuf {
        let mut name = base.as_os_str().to_os_string();
        name.push(format!("_{}.{}", sheet.name, constants::SHEET_EXTENSION));
        PathBuf::from(name)
    }

    fn write_sheet(path: &Path, sheet: &Sheet) -> ReportResult<()> {
        let mut wtr = Writer::from_path(path)?;
        wtr.write_record(&sheet.columns)?;
        for row in &sheet.rows {
            wtr.write_record(row.iter().map(Value::to_display_string))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Replace characters that cannot appear in a file name with `_`
pub fn file_name_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// An existing file that cannot be opened for writing counts as locked
fn is_locked(path: &Path) -> bool {
    match OpenOptions::new().append(true).open(path) {
        Ok(_) => false,
        Err(e) => e.kind() != io::ErrorKind::NotFound,
    }
}

impl ReportExporter for CsvExporter {
    fn export(&self, report: &Report, base: &Path) -> ReportResult<ExportOutcome> {
        let paths: Vec<PathBuf> = report
            .sheets()
            .iter()
            .map(|sheet| Self::sheet_path(base, sheet))
            .collect();

        // Check every target before writing any of them
        if let Some(locked) = paths.iter().find(|p| is_locked(p)) {
            return Ok(ExportOutcome::Locked(locked.clone()));
        }

        for (sheet, path) in report.sheets().iter().zip(&paths) {
            Self::write_sheet(path, sheet)?;
            debug!("Wrote sheet '{}' ({} rows)", sheet.name, sheet.rows.len());
        }

        Ok(ExportOutcome::Saved(paths))
    }
}

// =============================================================================
// Orchestration
// =============================================================================

/// Result of one report run
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub outcome: ExportOutcome,
    pub row_count: usize,
    pub ranked: Vec<RankedCustomer>,
}

/// Everything one report run needs, owned so it can move to a worker
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub reference: Arc<ReferenceData>,
    pub dataset: Arc<Table>,
    pub file_stem: String,
    pub spec: FilterSpec,
    pub output_dir: PathBuf,
}

impl ReportJob {
    pub fn new(reference: Arc<ReferenceData>, session: &Session, spec: FilterSpec, output_dir: &Path) -> Self {
        Self {
            reference,
            dataset: session.shared_dataset(),
            file_stem: session.file_stem(),
            spec,
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Output path without sheet suffix, e.g. `output/Master_{ALL-ALL-NA}`
    pub fn output_base(&self) -> PathBuf {
        let name = format!(
            "{}_{}",
            self.file_stem,
            self.spec.run_tag(&self.reference.principals)
        );
        self.output_dir.join(file_name_safe(&name))
    }

    /// Query, assemble and export
    pub fn run(&self, exporter: &dyn ReportExporter) -> ReportResult<ReportSummary> {
        info!(
            "Running report: customer={}, principal={}, date={}",
            self.spec.customer, self.spec.principal, self.spec.date_basis
        );

        let output = QueryEngine::new(&self.reference).run(&self.dataset, &self.spec)?;
        if output.table.is_empty() {
            info!("No rows matched the selected filters; exporting an empty report");
        }

        let report = assemble(&output, &self.reference.schema);

        std::fs::create_dir_all(&self.output_dir)?;
        let outcome = exporter.export(&report, &self.output_base())?;
        match &outcome {
            ExportOutcome::Saved(paths) => {
                for path in paths {
                    info!("New file saved at: {}", path.display());
                }
            }
            ExportOutcome::Locked(path) => {
                info!("File NOT saved, {} is open elsewhere", path.display());
            }
        }

        Ok(ReportSummary {
            outcome,
            row_count: output.table.len(),
            ranked: output.ranked,
        })
    }
}

/// Run one report on the calling thread
pub fn generate_report(
    reference: Arc<ReferenceData>,
    session: &Session,
    spec: FilterSpec,
    exporter: &dyn ReportExporter,
    output_dir: &Path,
) -> ReportResult<ReportSummary> {
    ReportJob::new(reference, session, spec, output_dir).run(exporter)
}

// =============================================================================
// Console Summary
// =============================================================================

/// Round to whole dollars with thousands separators, e.g. `$1,234`
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{}", rounded.abs() as u64);

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

#[derive(Tabled)]
struct RankedRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "T-End Cust")]
    customer: String,
    #[tabled(rename = "Revenue")]
    revenue: String,
}

/// Print the ranked customers and where the report went
pub fn print_summary(summary: &ReportSummary) {
    println!("\n============================================================");
    println!("                    CUSTOMERS RANKED");
    println!("============================================================\n");

    if summary.ranked.is_empty() {
        println!("  No customers matched the selected filters.");
    } else {
        let rows = summary.ranked.iter().enumerate().map(|(i, r)| RankedRow {
            rank: i + 1,
            customer: r.customer.clone(),
            revenue: format_currency(r.total_revenue),
        });
        let mut table = TextTable::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        let total: f64 = summary.ranked.iter().map(|r| r.total_revenue).sum();
        println!("\n  Total Revenue:  {}", format_currency(total));
    }

    println!("  Report rows:    {}", summary.row_count);

    match &summary.outcome {
        ExportOutcome::Saved(paths) => {
            println!("\n> File successfully saved!");
            for path in paths {
                println!("  Generated: {}", path.display());
            }
        }
        ExportOutcome::Locked(path) => {
            println!("\n> File NOT successfully saved.");
            println!("> Make sure to close {} and try again.", path.display());
        }
    }
    println!("============================================================");
}
