//! Query engine: projection, filtering, revenue ranking and tier cutoff
//!
//! A run goes project -> build predicate -> filter -> rank -> tier cutoff ->
//! finalize. The tier is applied after ranking because "top N" is defined over
//! the date/principal filtered rows, not the raw dataset.

use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

use crate::constants;
use crate::error::MissingColumnsError;
use crate::filter::{CustomerSelector, DateRange, FilterSpec, PrincipalSelector, Tier};
use crate::reference::{PrincipalMap, ReferenceData, Schema};
use crate::table::{Table, Value};

/// Customer and summed revenue
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCustomer {
    pub customer: String,
    pub total_revenue: f64,
}

/// Result of one query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    /// Filtered rows restricted to kept customers
    pub table: Table,
    /// Ranked customers surviving the tier cutoff
    pub ranked: Vec<RankedCustomer>,
}

/// Indices of `names` in `table`, or every name that is missing
fn require_columns<const N: usize>(table: &Table, names: [&str; N]) -> Result<[usize; N], MissingColumnsError> {
    let mut indices = [0; N];
    let mut missing = Vec::new();
    for (slot, name) in indices.iter_mut().zip(names) {
        match table.column_index(name) {
            Some(idx) => *slot = idx,
            None => missing.push(name.to_string()),
        }
    }
    if missing.is_empty() {
        Ok(indices)
    } else {
        Err(MissingColumnsError { missing })
    }
}

// =============================================================================
// Projection
// =============================================================================

/// Keep exactly the schema's source columns, renamed and in schema order.
/// Every missing source column is reported at once.
pub fn project(dataset: &Table, schema: &Schema) -> Result<Table, MissingColumnsError> {
    let missing = schema.missing_from(dataset);
    if !missing.is_empty() {
        return Err(MissingColumnsError { missing });
    }

    let indices: Vec<usize> = schema
        .columns()
        .iter()
        .filter_map(|c| dataset.column_index(&c.source))
        .collect();

    let rows = dataset
        .rows()
        .iter()
        .map(|row| indices.iter().map(|&idx| row[idx].clone()).collect())
        .collect();

    Ok(Table::from_rows(schema.display_names(), rows))
}

// =============================================================================
// Predicate
// =============================================================================

/// One AND-ed condition of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Date column within the inclusive range; blank or bad dates never match
    DateRange { column: &'static str, range: DateRange },
    /// Principal abbreviation equality; `None` (unmapped principal) matches nothing
    Principal { abbreviation: Option<String> },
    /// Customer identifier equality
    Customer { name: String },
}

impl Clause {
    pub fn column(&self) -> &str {
        match self {
            Clause::DateRange { column, .. } => column,
            Clause::Principal { .. } => constants::PRINCIPAL_COLUMN,
            Clause::Customer { .. } => constants::CUSTOMER_COLUMN,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Clause::DateRange { range, .. } => value.as_date().is_some_and(|d| range.contains(d)),
            Clause::Principal { abbreviation } => abbreviation
                .as_deref()
                .is_some_and(|abbrev| value.matches_text(abbrev)),
            Clause::Customer { name } => value.matches_text(name),
        }
    }
}

/// Conjunction of clauses, evaluated in insertion order. No clauses matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Resolve clause columns against a table header
    pub fn bind(&self, table: &Table) -> Result<BoundPredicate<'_>, MissingColumnsError> {
        let mut bound = Vec::with_capacity(self.clauses.len());
        let mut missing = Vec::new();

        for clause in &self.clauses {
            match table.column_index(clause.column()) {
                Some(idx) => bound.push((idx, clause)),
                None => missing.push(clause.column().to_string()),
            }
        }

        if missing.is_empty() {
            Ok(BoundPredicate { clauses: bound })
        } else {
            Err(MissingColumnsError { missing })
        }
    }
}

/// Predicate with column indices resolved
#[derive(Debug)]
pub struct BoundPredicate<'a> {
    clauses: Vec<(usize, &'a Clause)>,
}

impl BoundPredicate<'_> {
    pub fn matches(&self, row: &[Value]) -> bool {
        self.clauses.iter().all(|(idx, clause)| clause.matches(&row[*idx]))
    }
}

/// Build the row predicate for a filter spec.
///
/// Clause order is date range, principal, customer. Tier selectors add no
/// clause; they are applied after ranking.
pub fn build_predicate(spec: &FilterSpec, principals: &PrincipalMap) -> Predicate {
    let mut predicate = Predicate::default();

    // Date range first, it narrows the rows the most
    if let Some(column) = spec.date_basis.column() {
        predicate = predicate.and(Clause::DateRange {
            column,
            range: spec.date_range,
        });
    }

    if let PrincipalSelector::Named(name) = &spec.principal {
        let abbreviation = principals.to_abbreviation(name).map(str::to_string);
        if abbreviation.is_none() {
            warn!("Principal '{}' has no abbreviation; no rows will match", name);
        }
        predicate = predicate.and(Clause::Principal { abbreviation });
    }

    if let CustomerSelector::ExactName(name) = &spec.customer {
        predicate = predicate.and(Clause::Customer { name: name.clone() });
    }

    predicate
}

/// Rows matching the predicate, order preserved
pub fn apply_filter(table: &Table, predicate: &Predicate) -> Result<Table, MissingColumnsError> {
    if predicate.is_empty() {
        return Ok(table.clone());
    }
    let bound = predicate.bind(table)?;
    Ok(table.filter_rows(|row| bound.matches(row)))
}

// =============================================================================
// Ranking
// =============================================================================

/// Sum numeric revenue per customer and sort descending.
///
/// Non-numeric or blank revenue is left out of the sum; a customer with no
/// numeric revenue does not appear. Equal totals keep first-appearance order.
pub fn rank_customers(table: &Table) -> Result<Vec<RankedCustomer>, MissingColumnsError> {
    let [customer_idx, revenue_idx] =
        require_columns(table, [constants::CUSTOMER_COLUMN, constants::REVENUE_COLUMN])?;

    // Position is fixed at a customer's first row, numeric revenue or not
    let mut totals: Vec<(String, Option<f64>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in table.rows() {
        let customer = row[customer_idx].to_display_string();
        let pos = match positions.get(&customer) {
            Some(&pos) => pos,
            None => {
                positions.insert(customer.clone(), totals.len());
                totals.push((customer, None));
                totals.len() - 1
            }
        };
        if let Some(revenue) = row[revenue_idx].as_number() {
            let total = &mut totals[pos].1;
            *total = Some(total.unwrap_or(0.0) + revenue);
        }
    }

    let mut ranked: Vec<RankedCustomer> = totals
        .into_iter()
        .filter_map(|(customer, total)| {
            total.map(|total_revenue| RankedCustomer {
                customer,
                total_revenue,
            })
        })
        .collect();

    // sort_by is stable, so ties stay in first-appearance order
    ranked.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
    Ok(ranked)
}

/// Keep the first N ranked customers for a tier; no tier keeps all
pub fn apply_tier_cutoff(mut ranked: Vec<RankedCustomer>, tier: Option<Tier>) -> Vec<RankedCustomer> {
    if let Some(tier) = tier {
        ranked.truncate(tier.limit());
    }
    ranked
}

/// Rows whose customer is in `kept`
pub fn finalize(table: &Table, kept: &HashSet<String>) -> Result<Table, MissingColumnsError> {
    let [customer_idx] = require_columns(table, [constants::CUSTOMER_COLUMN])?;
    Ok(table.filter_rows(|row| kept.contains(&row[customer_idx].to_display_string())))
}

// =============================================================================
// Engine
// =============================================================================

/// Runs queries against immutable reference data
pub struct QueryEngine<'a> {
    reference: &'a ReferenceData,
}

impl<'a> QueryEngine<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self { reference }
    }

    pub fn run(&self, dataset: &Table, spec: &FilterSpec) -> Result<QueryOutput, MissingColumnsError> {
        let projected = project(dataset, &self.reference.schema)?;

        let predicate = build_predicate(spec, &self.reference.principals);
        let filtered = apply_filter(&projected, &predicate)?;
        debug!(
            "Filter ({} clause(s)): {} -> {} rows",
            predicate.clauses().len(),
            projected.len(),
            filtered.len()
        );

        let ranked = rank_customers(&filtered)?;
        let total_customers = ranked.len();
        let ranked = apply_tier_cutoff(ranked, spec.customer.tier());
        debug!("Ranking: kept {} of {} customers", ranked.len(), total_customers);

        let kept: HashSet<String> = ranked.iter().map(|r| r.customer.clone()).collect();
        let table = finalize(&filtered, &kept)?;

        if table.is_empty() {
            info!("Query matched no rows");
        }

        Ok(QueryOutput { table, ranked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DateBasis;
    use crate::reference::{PrincipalEntry, SchemaColumn};
    use chrono::NaiveDate;

    const COLUMNS: [&str; 6] = [
        "T-End Cust",
        "Paid-On Revenue",
        "Principal",
        "Comm Month",
        "Invoice Date",
        "Internal Notes",
    ];

    fn reference() -> ReferenceData {
        ReferenceData {
            schema: Schema::new(vec![
                SchemaColumn::new("Principal", "Principal", 8.0),
                SchemaColumn::new("T-End Cust", "T-End Cust", 30.0),
                SchemaColumn::new("Paid-On Revenue", "Revenue", 12.0),
                SchemaColumn::new("Comm Month", "Comm Month", 10.0),
                SchemaColumn::new("Invoice Date", "Invoice Date", 10.0),
            ]),
            principals: PrincipalMap::from_entries([
                PrincipalEntry::new("Acme Components", "ACM"),
                PrincipalEntry::new("Beta Semiconductor", "BET"),
            ]),
        }
    }

    /// Rows of (customer, revenue, principal, comm month, invoice date)
    fn dataset(rows: &[(&str, &str, &str, &str, &str)]) -> Table {
        Table::from_rows(
            COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|(c, r, p, cm, inv)| {
                    vec![
                        Value::from(*c),
                        Value::from(*r),
                        Value::from(*p),
                        Value::from(*cm),
                        Value::from(*inv),
                        Value::from("note"),
                    ]
                })
                .collect(),
        )
    }

    fn sample() -> Table {
        dataset(&[
            ("X", "60", "ACM", "2024-01-31", "2023-12-15"),
            ("Y", "80", "BET", "2024-02-29", "2024-01-20"),
            ("Z", "50", "ACM", "2024-03-31", "2024-02-10"),
            ("X", "40", "BET", "2024-04-30", "2024-03-05"),
        ])
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn year_2024() -> DateRange {
        DateRange::new(date(2024, 1, 1), date(2024, 12, 31))
    }

    fn spec(customer: CustomerSelector) -> FilterSpec {
        FilterSpec {
            customer,
            ..FilterSpec::all(year_2024())
        }
    }

    fn customers(table: &Table) -> Vec<String> {
        table
            .column_values(constants::CUSTOMER_COLUMN)
            .unwrap()
            .map(Value::to_display_string)
            .collect()
    }

    fn names(ranked: &[RankedCustomer]) -> Vec<&str> {
        ranked.iter().map(|r| r.customer.as_str()).collect()
    }

    #[test]
    fn test_project_renames_and_orders() {
        let reference = reference();
        let projected = project(&sample(), &reference.schema).unwrap();

        assert_eq!(
            projected.columns(),
            &["Principal", "T-End Cust", "Revenue", "Comm Month", "Invoice Date"]
        );
        assert_eq!(projected.len(), 4);
        assert_eq!(projected.rows()[0][0], Value::from("ACM"));
        assert_eq!(projected.rows()[0][2], Value::from("60"));
    }

    #[test]
    fn test_project_reports_all_missing_columns() {
        let reference = reference();
        let table = Table::from_rows(
            vec!["T-End Cust".to_string(), "Comm Month".to_string()],
            vec![vec![Value::from("X"), Value::from("2024-01-01")]],
        );

        let err = project(&table, &reference.schema).unwrap_err();
        assert_eq!(err.missing, vec!["Principal", "Paid-On Revenue", "Invoice Date"]);
    }

    #[test]
    fn test_engine_rejects_dataset_before_filtering() {
        let reference = reference();
        let table = Table::new(vec!["T-End Cust".to_string()]);
        let err = QueryEngine::new(&reference)
            .run(&table, &FilterSpec::all(year_2024()))
            .unwrap_err();
        assert_eq!(err.missing.len(), 4);
    }

    #[test]
    fn test_build_predicate_clause_order() {
        let reference = reference();
        let spec = FilterSpec {
            customer: CustomerSelector::ExactName("X".to_string()),
            principal: PrincipalSelector::Named("Beta Semiconductor".to_string()),
            date_basis: DateBasis::Invoice,
            date_range: year_2024(),
        };

        let predicate = build_predicate(&spec, &reference.principals);

        assert_eq!(
            predicate.clauses(),
            &[
                Clause::DateRange {
                    column: "Invoice Date",
                    range: year_2024()
                },
                Clause::Principal {
                    abbreviation: Some("BET".to_string())
                },
                Clause::Customer { name: "X".to_string() },
            ]
        );
    }

    #[test]
    fn test_tier_adds_no_clause() {
        let reference = reference();
        let predicate = build_predicate(&spec(CustomerSelector::Tier(Tier::Top10)), &reference.principals);
        assert!(predicate.is_empty());
    }

    #[test]
    fn test_empty_predicate_is_identity() {
        let reference = reference();
        let projected = project(&sample(), &reference.schema).unwrap();
        let predicate = build_predicate(&FilterSpec::all(year_2024()), &reference.principals);

        let filtered = apply_filter(&projected, &predicate).unwrap();
        assert_eq!(filtered, projected);
    }

    #[test]
    fn test_paid_date_filter_inclusive() {
        let reference = reference();
        let spec = FilterSpec {
            date_basis: DateBasis::Paid,
            date_range: DateRange::new(date(2024, 2, 29), date(2024, 3, 31)),
            ..FilterSpec::all(year_2024())
        };

        let output = QueryEngine::new(&reference).run(&sample(), &spec).unwrap();
        assert_eq!(customers(&output.table), vec!["Y", "Z"]);
    }

    #[test]
    fn test_bad_dates_are_excluded() {
        let reference = reference();
        let table = dataset(&[
            ("X", "10", "ACM", "", "2024-01-02"),
            ("Y", "10", "ACM", "sometime", "2024-01-02"),
            ("Z", "10", "ACM", "Q12024", "2024-01-02"),
        ]);
        let spec = FilterSpec {
            date_basis: DateBasis::Paid,
            ..FilterSpec::all(year_2024())
        };

        let output = QueryEngine::new(&reference).run(&table, &spec).unwrap();
        assert_eq!(customers(&output.table), vec!["Z"]);
    }

    #[test]
    fn test_inverted_range_is_empty_not_error() {
        let reference = reference();
        let spec = FilterSpec {
            date_basis: DateBasis::Paid,
            date_range: DateRange::new(date(2024, 12, 31), date(2024, 1, 1)),
            ..FilterSpec::all(year_2024())
        };

        let output = QueryEngine::new(&reference).run(&sample(), &spec).unwrap();
        assert!(output.table.is_empty());
        assert!(output.ranked.is_empty());
    }

    #[test]
    fn test_principal_filter() {
        let reference = reference();
        let spec = FilterSpec {
            principal: PrincipalSelector::Named("Acme Components".to_string()),
            ..FilterSpec::all(year_2024())
        };

        let output = QueryEngine::new(&reference).run(&sample(), &spec).unwrap();
        assert_eq!(customers(&output.table), vec!["X", "Z"]);
        assert_eq!(names(&output.ranked), vec!["X", "Z"]);
        assert_eq!(output.ranked[0].total_revenue, 60.0);
    }

    #[test]
    fn test_exact_customer_filter() {
        let reference = reference();
        let output = QueryEngine::new(&reference)
            .run(&sample(), &spec(CustomerSelector::ExactName("X".to_string())))
            .unwrap();

        assert_eq!(customers(&output.table), vec!["X", "X"]);
        assert_eq!(
            output.ranked,
            vec![RankedCustomer {
                customer: "X".to_string(),
                total_revenue: 100.0
            }]
        );
    }

    #[test]
    fn test_scenario_top10_with_three_customers() {
        let reference = reference();
        let output = QueryEngine::new(&reference)
            .run(&sample(), &spec(CustomerSelector::Tier(Tier::Top10)))
            .unwrap();

        assert_eq!(names(&output.ranked), vec!["X", "Y", "Z"]);
        let totals: Vec<f64> = output.ranked.iter().map(|r| r.total_revenue).collect();
        assert_eq!(totals, vec![100.0, 80.0, 50.0]);
        assert_eq!(output.table.len(), 4);
    }

    #[test]
    fn test_scenario_top25_keeps_all_when_fewer() {
        let reference = reference();
        let output = QueryEngine::new(&reference)
            .run(&sample(), &spec(CustomerSelector::Tier(Tier::Top25)))
            .unwrap();
        assert_eq!(output.ranked.len(), 3);
        assert_eq!(output.table.len(), 4);
    }

    #[test]
    fn test_scenario_invoice_range_excludes_everything() {
        let reference = reference();
        let spec = FilterSpec {
            date_basis: DateBasis::Invoice,
            date_range: DateRange::new(date(2030, 1, 1), date(2030, 12, 31)),
            ..FilterSpec::all(year_2024())
        };

        let output = QueryEngine::new(&reference).run(&sample(), &spec).unwrap();
        assert!(output.table.is_empty());
        assert!(output.ranked.is_empty());
        // Projection survives an empty result
        assert_eq!(output.table.columns().len(), 5);
    }

    #[test]
    fn test_scenario_unmapped_principal_fails_closed() {
        let reference = reference();
        let spec = FilterSpec {
            principal: PrincipalSelector::Named("Acme".to_string()),
            ..FilterSpec::all(year_2024())
        };

        let output = QueryEngine::new(&reference).run(&sample(), &spec).unwrap();
        assert!(output.table.is_empty());
        assert!(output.ranked.is_empty());
    }

    #[test]
    fn test_scenario_non_numeric_revenue() {
        let reference = reference();
        let table = dataset(&[
            ("X", "100", "ACM", "2024-01-31", "2024-01-02"),
            ("X", "N/A", "ACM", "2024-01-31", "2024-01-02"),
            ("W", "N/A", "ACM", "2024-01-31", "2024-01-02"),
            ("V", "", "ACM", "2024-01-31", "2024-01-02"),
            ("V", "5", "ACM", "2024-01-31", "2024-01-02"),
        ]);

        let output = QueryEngine::new(&reference)
            .run(&table, &FilterSpec::all(year_2024()))
            .unwrap();

        assert_eq!(names(&output.ranked), vec!["X", "V"]);
        assert_eq!(output.ranked[0].total_revenue, 100.0);
        assert_eq!(output.ranked[1].total_revenue, 5.0);
        // W had no numeric revenue, so its rows are dropped too
        assert_eq!(customers(&output.table), vec!["X", "X", "V", "V"]);
    }

    #[test]
    fn test_rank_ties_keep_first_appearance() {
        let reference = reference();
        let table = dataset(&[
            ("B", "50", "ACM", "", ""),
            ("A", "50", "ACM", "", ""),
            ("C", "70", "ACM", "", ""),
            ("D", "50", "ACM", "", ""),
        ]);
        let projected = project(&table, &reference.schema).unwrap();

        let ranked = rank_customers(&projected).unwrap();
        assert_eq!(names(&ranked), vec!["C", "B", "A", "D"]);

        let cut = apply_tier_cutoff(ranked.clone(), Some(Tier::Top10));
        assert_eq!(cut, ranked);
    }

    #[test]
    fn test_rank_ties_count_non_numeric_first_rows() {
        let reference = reference();
        let table = dataset(&[
            ("B", "N/A", "ACM", "", ""),
            ("A", "50", "ACM", "", ""),
            ("B", "50", "ACM", "", ""),
            ("W", "", "ACM", "", ""),
        ]);
        let projected = project(&table, &reference.schema).unwrap();

        let ranked = rank_customers(&projected).unwrap();
        assert_eq!(names(&ranked), vec!["B", "A"]);
        assert_eq!(ranked[0].total_revenue, 50.0);
    }

    #[test]
    fn test_tier_cutoff_is_exact_prefix() {
        let ranked: Vec<RankedCustomer> = (0..60)
            .map(|i| RankedCustomer {
                customer: format!("C{:02}", i),
                total_revenue: 1000.0 - i as f64,
            })
            .collect();

        for (tier, n) in [(Tier::Top10, 10), (Tier::Top25, 25), (Tier::Top50, 50)] {
            let cut = apply_tier_cutoff(ranked.clone(), Some(tier));
            assert_eq!(cut.len(), n);
            assert_eq!(cut[..], ranked[..n]);
        }
        assert_eq!(apply_tier_cutoff(ranked.clone(), None).len(), 60);
        assert_eq!(apply_tier_cutoff(ranked[..3].to_vec(), Some(Tier::Top50)).len(), 3);
    }

    #[test]
    fn test_top10_restricts_rows_to_kept_customers() {
        let reference = reference();
        let rows: Vec<(String, String)> = (1..=12)
            .flat_map(|i| {
                let name = format!("Cust{:02}", i);
                vec![(name.clone(), format!("{}", i * 10)), (name, "1".to_string())]
            })
            .collect();
        let borrowed: Vec<(&str, &str, &str, &str, &str)> = rows
            .iter()
            .map(|(c, r)| (c.as_str(), r.as_str(), "ACM", "2024-05-01", "2024-05-01"))
            .collect();
        let table = dataset(&borrowed);

        let output = QueryEngine::new(&reference)
            .run(&table, &spec(CustomerSelector::Tier(Tier::Top10)))
            .unwrap();

        assert_eq!(output.ranked.len(), 10);
        assert_eq!(output.ranked[0].customer, "Cust12");
        assert_eq!(output.ranked[0].total_revenue, 121.0);
        assert!(output.ranked.windows(2).all(|w| w[0].total_revenue >= w[1].total_revenue));

        let kept: HashSet<String> = output.ranked.iter().map(|r| r.customer.clone()).collect();
        assert_eq!(output.table.len(), 20);
        assert!(customers(&output.table).iter().all(|c| kept.contains(c)));
        assert!(!kept.contains("Cust01"));
        assert!(!kept.contains("Cust02"));
    }

    #[test]
    fn test_finalize_is_membership_filter() {
        let reference = reference();
        let projected = project(&sample(), &reference.schema).unwrap();
        let kept: HashSet<String> = ["Z", "X"].iter().map(|s| s.to_string()).collect();

        let finalized = finalize(&projected, &kept).unwrap();
        assert_eq!(customers(&finalized), vec!["X", "Z", "X"]);
    }

    #[test]
    fn test_runs_are_idempotent() {
        let reference = reference();
        let dataset = sample();
        let spec = FilterSpec {
            customer: CustomerSelector::Tier(Tier::Top10),
            principal: PrincipalSelector::All,
            date_basis: DateBasis::Invoice,
            date_range: year_2024(),
        };
        let engine = QueryEngine::new(&reference);

        let first = engine.run(&dataset, &spec).unwrap();
        let second = engine.run(&dataset, &spec).unwrap();
        assert_eq!(first, second);
    }
}
