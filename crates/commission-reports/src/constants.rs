//! Centralized constants for the commission report generator
//!
//! Column names here are the *display* names produced by the report columns
//! schema. Lookup workbook and sheet names are defaults; config.toml can
//! override them.

// =============================================================================
// Report Columns (display names after projection)
// =============================================================================

/// Customer identifier column
pub const CUSTOMER_COLUMN: &str = "T-End Cust";

/// Paid-on revenue column
pub const REVENUE_COLUMN: &str = "Revenue";

/// Principal abbreviation column
pub const PRINCIPAL_COLUMN: &str = "Principal";

/// Paid date column (used by the PAID date basis)
pub const PAID_DATE_COLUMN: &str = "Comm Month";

/// Invoice date column (used by the INVOICE date basis)
pub const INVOICE_DATE_COLUMN: &str = "Invoice Date";

/// Columns the query engine reads; the schema must produce all of them
pub const KEY_COLUMNS: [&str; 5] = [
    CUSTOMER_COLUMN,
    REVENUE_COLUMN,
    PRINCIPAL_COLUMN,
    PAID_DATE_COLUMN,
    INVOICE_DATE_COLUMN,
];

/// Columns holding dates, normalized on load and stringified on export
pub const DATE_COLUMNS: [&str; 2] = [INVOICE_DATE_COLUMN, PAID_DATE_COLUMN];

// =============================================================================
// Lookup Workbooks
// =============================================================================

/// Default directory holding the lookup workbooks
pub const DEFAULT_LOOKUP_DIR: &str = "./lookup";

/// Report columns workbook
pub const REPORT_COLUMNS_WORKBOOK: &str = "ReportColumns";

/// Sheet with source names, display names and widths
pub const REPORT_COLUMNS_SHEET: &str = "Columns";

/// Principal abbreviation workbook
pub const PRINCIPAL_WORKBOOK: &str = "principalList";

/// Active principals sheet
pub const ACTIVE_PRINCIPALS_SHEET: &str = "Principals";

/// Inactive principals sheet
pub const INACTIVE_PRINCIPALS_SHEET: &str = "Inactive";

/// Principal full-name header in the principal sheets
pub const PRINCIPAL_NAME_HEADER: &str = "Principal";

/// Abbreviation header in the principal sheets
pub const ABBREVIATION_HEADER: &str = "Abbreviation";

/// Extension of a single sheet file inside a workbook directory
pub const SHEET_EXTENSION: &str = "csv";

// =============================================================================
// Output
// =============================================================================

/// Default directory for generated reports
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Primary sheet with the filtered rows
pub const DATA_SHEET: &str = "Data";

/// Secondary sheet with customers ranked by revenue
pub const RANKED_SHEET: &str = "Customers Ranked";

/// Width used for a ranked sheet column the schema does not size
pub const DEFAULT_COLUMN_WIDTH: f64 = 15.0;

/// Date format written to exported cells
pub const EXPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Date format used inside the run tag
pub const TAG_DATE_FORMAT: &str = "%m.%d.%y";

/// Run tag principal segment when the selected name has no abbreviation
pub const UNMAPPED_PRINCIPAL_TAG: &str = "UNK";
