use super::{to_csv, ReportOptions};
use crate::adapters::storage::ReportFile;
use crate::domain::hardware::{DeviceEntities, DeviceInventory, DeviceSummary, InventoryClassifier};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::Result;
use serde::Serialize;

pub const COMPONENTS_REPORT: &str = "hardware_components.csv";
pub const SUMMARY_REPORT: &str = "hardware_summary.json";

#[derive(Debug, Default)]
pub struct HardwareResult {
    pub devices: Vec<DeviceInventory>,
    pub skipped_devices: usize,
    pub duplicates_skipped: usize,
    pub fex_models_fixed: usize,
}

#[derive(Serialize)]
struct ComponentRow<'a> {
    hostname: &'a str,
    ip: &'a str,
    component_type: &'static str,
    entity_id: &'a str,
    model: &'a str,
    serial: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct SummaryEntry<'a> {
    hostname: &'a str,
    ip: &'a str,
    #[serde(flatten)]
    summary: DeviceSummary,
}

/// Turns an entity-MIB dump into a physical component inventory.
pub struct HardwarePipeline<S: Storage> {
    source: S,
    storage: S,
    input_path: String,
    report: ReportOptions,
}

impl<S: Storage> HardwarePipeline<S> {
    pub fn new(source: S, storage: S, input_path: &str) -> Self {
        Self {
            source,
            storage,
            input_path: input_path.to_string(),
            report: ReportOptions::default(),
        }
    }

    pub fn with_report_options(mut self, report: ReportOptions) -> Self {
        self.report = report;
        self
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for HardwarePipeline<S> {
    type Extracted = Vec<DeviceEntities>;
    type Transformed = HardwareResult;

    fn name(&self) -> &str {
        "hardware-inventory"
    }

    async fn extract(&self) -> Result<Vec<DeviceEntities>> {
        let data = self.source.read_file(&self.input_path).await?;
        let devices: Vec<DeviceEntities> = serde_json::from_slice(&data)?;
        tracing::info!("📥 {} devices in {}", devices.len(), self.source.location(&self.input_path));
        Ok(devices)
    }

    async fn transform(&self, data: Vec<DeviceEntities>) -> Result<HardwareResult> {
        let mut classifier = InventoryClassifier::new();
        let mut result = HardwareResult::default();

        for device in &data {
            if !device.is_collected() {
                result.skipped_devices += 1;
                continue;
            }
            result.devices.push(classifier.classify_device(device));
        }

        result.duplicates_skipped = classifier.duplicates_skipped;
        result.fex_models_fixed = classifier.fex_models_fixed;
        tracing::info!(
            "🔄 {} devices classified, {} skipped, {} duplicate serials, {} FEX models fixed",
            result.devices.len(),
            result.skipped_devices,
            result.duplicates_skipped,
            result.fex_models_fixed
        );
        Ok(result)
    }

    async fn load(&self, result: HardwareResult) -> Result<String> {
        let rows: Vec<ComponentRow> = result
            .devices
            .iter()
            .flat_map(|device| {
                device.components.iter().map(move |c| ComponentRow {
                    hostname: &device.hostname,
                    ip: &device.ip,
                    component_type: c.component_type.as_str(),
                    entity_id: &c.entity_id,
                    model: &c.model,
                    serial: &c.serial,
                    description: &c.description,
                })
            })
            .collect();

        let summaries: Vec<SummaryEntry> = result
            .devices
            .iter()
            .map(|device| SummaryEntry {
                hostname: &device.hostname,
                ip: &device.ip,
                summary: device.summary(),
            })
            .collect();

        let files = vec![
            ReportFile::new(COMPONENTS_REPORT, to_csv(&rows)?),
            ReportFile::new(SUMMARY_REPORT, serde_json::to_vec_pretty(&summaries)?),
        ];
        let location = self.report.write(&self.storage, files).await?;
        Ok(format!("{} components, report: {}", rows.len(), location))
    }
}
