//! Background execution of report runs
//!
//! At most one report runs at a time. A second submission while one is in
//! flight is rejected with `ReportError::Busy` rather than queued.

use log::debug;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{ReportError, ReportResult};
use crate::reports::{ReportExporter, ReportJob, ReportSummary};

/// Single-slot runner for blocking report work
#[derive(Debug, Clone)]
pub struct ReportRunner {
    slot: Arc<Semaphore>,
}

impl Default for ReportRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRunner {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Start `work` on the blocking pool. The slot frees when `work` returns.
    pub fn submit<F, T>(&self, work: F) -> ReportResult<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.slot)
            .try_acquire_owned()
            .map_err(|_| ReportError::Busy)?;

        Ok(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        }))
    }

    /// Start a report job with the given exporter
    pub fn submit_report<E>(&self, job: ReportJob, exporter: E) -> ReportResult<JoinHandle<ReportResult<ReportSummary>>>
    where
        E: ReportExporter + Send + 'static,
    {
        debug!("Submitting report for {}", job.file_stem);
        self.submit(move || job.run(&exporter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{DateRange, FilterSpec};
    use crate::reference::{PrincipalMap, ReferenceData, Schema, SchemaColumn};
    use crate::reports::{CsvExporter, ExportOutcome};
    use crate::session::Session;
    use crate::table::{Table, Value};
    use chrono::NaiveDate;
    use std::path::Path;
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_second_submission_is_busy() {
        let runner = ReportRunner::new();
        let (release, wait) = mpsc::channel::<()>();

        let first = runner
            .submit(move || {
                wait.recv().unwrap();
                1
            })
            .unwrap();
        assert!(runner.is_busy());

        let second = runner.submit(|| 2);
        assert!(matches!(second, Err(ReportError::Busy)));

        release.send(()).unwrap();
        assert_eq!(first.await.unwrap(), 1);

        assert!(!runner.is_busy());
        let third = runner.submit(|| 3).unwrap();
        assert_eq!(third.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_clones_share_the_slot() {
        let runner = ReportRunner::default();
        let other = runner.clone();
        let (release, wait) = mpsc::channel::<()>();

        let running = runner.submit(move || wait.recv().unwrap()).unwrap();
        assert!(matches!(other.submit(|| ()), Err(ReportError::Busy)));

        release.send(()).unwrap();
        running.await.unwrap();
        assert!(!other.is_busy());
    }

    #[tokio::test]
    async fn test_submit_report() {
        let dir = TempDir::new().unwrap();
        let reference = Arc::new(ReferenceData {
            schema: Schema::new(vec![
                SchemaColumn::new("T-End Cust", "T-End Cust", 30.0),
                SchemaColumn::new("Revenue", "Revenue", 12.0),
                SchemaColumn::new("Principal", "Principal", 8.0),
                SchemaColumn::new("Comm Month", "Comm Month", 10.0),
                SchemaColumn::new("Invoice Date", "Invoice Date", 10.0),
            ]),
            principals: PrincipalMap::default(),
        });
        let table = Table::from_rows(
            reference.schema.display_names(),
            vec![vec![
                Value::from("Zeta Corp"),
                Value::from("10"),
                Value::from("ACM"),
                Value::from("2024-01-31"),
                Value::from("2024-01-02"),
            ]],
        );
        let session = Session::from_table(Path::new("cms.csv"), table, &reference).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let job = ReportJob::new(
            Arc::clone(&reference),
            &session,
            FilterSpec::all(DateRange::new(day, day)),
            dir.path(),
        );

        let runner = ReportRunner::new();
        let summary = runner.submit_report(job, CsvExporter).unwrap().await.unwrap().unwrap();

        assert_eq!(summary.row_count, 1);
        assert!(matches!(summary.outcome, ExportOutcome::Saved(ref paths) if paths.len() == 2));
        assert!(!runner.is_busy());
    }
}
