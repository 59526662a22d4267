use super::{to_csv, ReportOptions};
use crate::adapters::storage::ReportFile;
use crate::domain::model::Circuit;
use crate::domain::ports::{Pipeline, Storage, TrackingStore};
use crate::domain::tracking::{
    detect_enablements, plan_import, read_tracking_csv, EnablementReport, ImportPlan, TrackingRow,
};
use crate::utils::error::Result;
use chrono::NaiveDate;
use std::sync::Arc;

pub const STATUS_CHANGES_REPORT: &str = "status_changes.csv";
pub const ENABLEMENTS_REPORT: &str = "daily_enablements.csv";

pub struct TrackingInput {
    pub today: Vec<TrackingRow>,
    pub previous: Option<Vec<TrackingRow>>,
    pub existing: Vec<Circuit>,
}

#[derive(Debug)]
pub struct TrackingResult {
    pub plan: ImportPlan,
    pub enablements: EnablementReport,
}

/// Imports the daily DSR tracking export and records new enablements.
pub struct TrackingPipeline<T: TrackingStore, S: Storage> {
    store: Arc<T>,
    source: S,
    storage: S,
    csv_path: String,
    previous_csv_path: Option<String>,
    date: NaiveDate,
    report: ReportOptions,
    dry_run: bool,
}

impl<T: TrackingStore, S: Storage> TrackingPipeline<T, S> {
    /// `source` resolves the CSV paths, `storage` receives the reports.
    pub fn new(store: Arc<T>, source: S, storage: S, csv_path: &str, date: NaiveDate) -> Self {
        Self {
            store,
            source,
            storage,
            csv_path: csv_path.to_string(),
            previous_csv_path: None,
            date,
            report: ReportOptions::default(),
            dry_run: false,
        }
    }

    pub fn with_previous(mut self, previous_csv_path: Option<String>) -> Self {
        self.previous_csv_path = previous_csv_path;
        self
    }

    pub fn with_report_options(mut self, report: ReportOptions) -> Self {
        self.report = report;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    async fn read_rows(&self, path: &str) -> Result<Vec<TrackingRow>> {
        let data = self.source.read_file(path).await?;
        read_tracking_csv(data.as_slice())
    }
}

#[async_trait::async_trait]
impl<T: TrackingStore, S: Storage> Pipeline for TrackingPipeline<T, S> {
    type Extracted = TrackingInput;
    type Transformed = TrackingResult;

    fn name(&self) -> &str {
        "tracking-import"
    }

    async fn extract(&self) -> Result<TrackingInput> {
        let today = self.read_rows(&self.csv_path).await?;
        let previous = match &self.previous_csv_path {
            Some(path) => Some(self.read_rows(path).await?),
            None => None,
        };
        let existing = self.store.all_circuits().await?;

        tracing::info!(
            "📥 {} tracking rows from {}, {} circuits on record",
            today.len(),
            self.source.location(&self.csv_path),
            existing.len()
        );

        Ok(TrackingInput {
            today,
            previous,
            existing,
        })
    }

    async fn transform(&self, data: TrackingInput) -> Result<TrackingResult> {
        let plan = plan_import(&data.today, &data.existing);
        let enablements = detect_enablements(self.date, &data.today, data.previous.as_deref());

        for change in &plan.status_changes {
            tracing::info!(
                "🔀 {} ({}): {} -> {}",
                change.record_number,
                change.site_name,
                change.old_status,
                change.new_status
            );
        }
        tracing::info!(
            "🔄 {} new, {} updated, {} unchanged, {} skipped; {} new enablements, {} ready",
            plan.stats.inserted,
            plan.stats.updated,
            plan.stats.unchanged,
            plan.stats.skipped_no_record_number
                + plan.stats.skipped_duplicate
                + plan.stats.skipped_manual_override,
            enablements.new_enablements.len(),
            enablements.ready_count
        );

        Ok(TrackingResult { plan, enablements })
    }

    async fn load(&self, result: TrackingResult) -> Result<String> {
        if self.dry_run {
            tracing::info!(
                "🧪 Dry run: {} inserts and {} updates not applied",
                result.plan.inserts.len(),
                result.plan.updates.len()
            );
        } else {
            let inserted = self.store.insert_circuits(&result.plan.inserts).await?;
            let updated = self.store.update_circuits(&result.plan.updates).await?;
            self.store.record_enablements(&result.enablements).await?;
            tracing::info!("💾 {} circuits inserted, {} updated", inserted, updated);
        }

        let files = vec![
            ReportFile::new(STATUS_CHANGES_REPORT, to_csv(&result.plan.status_changes)?),
            ReportFile::new(ENABLEMENTS_REPORT, to_csv(&result.enablements.new_enablements)?),
        ];
        let location = self.report.write(&self.storage, files).await?;

        Ok(format!(
            "{} new enablements on {}, report: {}",
            result.enablements.new_enablements.len(),
            self.date,
            location
        ))
    }
}
