//! Commission report engine
//!
//! Loads a commissions dataset, projects it through the report columns schema,
//! filters by date, principal and customer, ranks customers by revenue and
//! exports a two-sheet report.

pub mod config;
pub mod constants;
pub mod error;
pub mod filter;
pub mod query;
pub mod reference;
pub mod reports;
pub mod runner;
pub mod session;
pub mod table;

pub use config::{Config, FileConfig, LookupConfig};
pub use error::{MissingColumnsError, ReportError, ReportResult, SchemaLoadError};
pub use filter::{CustomerSelector, DateBasis, DateRange, FilterSpec, PrincipalSelector, Tier};
pub use query::{QueryEngine, QueryOutput, RankedCustomer};
pub use reference::{PrincipalMap, ReferenceData, Schema};
pub use reports::{CsvExporter, ExportOutcome, Report, ReportExporter, ReportJob, ReportSummary, generate_report};
pub use runner::ReportRunner;
pub use session::{QueryOptions, Session};
pub use table::{Table, Value};
