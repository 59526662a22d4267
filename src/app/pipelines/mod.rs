pub mod enrichment_pipeline;
pub mod hardware_pipeline;
pub mod inventory_pipeline;
pub mod match_report_pipeline;
pub mod tracking_pipeline;

pub use enrichment_pipeline::EnrichmentPipeline;
pub use hardware_pipeline::HardwarePipeline;
pub use inventory_pipeline::InventoryPipeline;
pub use match_report_pipeline::MatchReportPipeline;
pub use tracking_pipeline::TrackingPipeline;

use crate::adapters::storage::write_reports;
use crate::adapters::storage::ReportFile;
use crate::domain::ports::Storage;
use crate::utils::error::{DsrError, Result};
use serde::Serialize;

/// Where and how a pipeline writes its report files.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub compress: bool,
    pub bundle_name: String,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            compress: false,
            bundle_name: "dsr_circuits_reports.zip".to_string(),
        }
    }
}

impl ReportOptions {
    pub async fn write<S: Storage>(&self, storage: &S, files: Vec<ReportFile>) -> Result<String> {
        let written = write_reports(storage, files, self.compress, &self.bundle_name).await?;
        Ok(written.join(", "))
    }
}

pub(crate) fn to_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| DsrError::IoError(e.into_error()))
}
