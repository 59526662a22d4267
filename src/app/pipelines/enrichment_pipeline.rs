use super::{to_csv, ReportOptions};
use crate::adapters::storage::ReportFile;
use crate::domain::enrichment::{EnrichOutcome, EnrichedSite, Enricher, EnrichmentSettings, Exclusion};
use crate::domain::model::{Circuit, EnrichedCircuit, MerakiDevice};
use crate::domain::ports::{CircuitStore, Pipeline, Storage};
use crate::domain::provider::{AliasTable, MappingIndex, MatchStats, MatcherSettings, ProviderMatcher};
use crate::utils::error::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub const ENRICHMENT_REPORT: &str = "enriched_circuits.csv";

pub struct EnrichmentInput {
    pub devices: Vec<MerakiDevice>,
    pub circuits_by_site: HashMap<String, Vec<Circuit>>,
    pub previous: HashMap<String, EnrichedCircuit>,
    pub enricher: Enricher,
}

#[derive(Debug, Default)]
pub struct EnrichmentResult {
    pub sites: Vec<EnrichedSite>,
    /// Rows that differ from what is stored.
    pub changed: Vec<EnrichedCircuit>,
    pub excluded: Vec<(String, Exclusion)>,
    pub match_stats: MatchStats,
}

#[derive(Serialize)]
struct ReportRow<'a> {
    network_name: &'a str,
    wan1_provider: &'a str,
    wan1_speed: &'a str,
    wan1_cost: &'a str,
    wan1_role: &'a str,
    wan1_confirmed: bool,
    wan1_source: &'static str,
    wan2_provider: &'a str,
    wan2_speed: &'a str,
    wan2_cost: &'a str,
    wan2_role: &'a str,
    wan2_confirmed: bool,
    wan2_source: &'static str,
}

impl<'a> From<&'a EnrichedSite> for ReportRow<'a> {
    fn from(site: &'a EnrichedSite) -> Self {
        let row = &site.row;
        Self {
            network_name: &row.network_name,
            wan1_provider: &row.wan1_provider,
            wan1_speed: &row.wan1_speed,
            wan1_cost: &row.wan1_cost,
            wan1_role: &row.wan1_role,
            wan1_confirmed: row.wan1_confirmed,
            wan1_source: site.wan1_source.as_str(),
            wan2_provider: &row.wan2_provider,
            wan2_speed: &row.wan2_speed,
            wan2_cost: &row.wan2_cost,
            wan2_role: &row.wan2_role,
            wan2_confirmed: row.wan2_confirmed,
            wan2_source: site.wan2_source.as_str(),
        }
    }
}

pub(crate) fn site_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Rebuilds `enriched_circuits` from DSR circuits, device notes and ARIN data.
pub struct EnrichmentPipeline<C: CircuitStore, S: Storage> {
    store: Arc<C>,
    storage: S,
    aliases: AliasTable,
    matcher_settings: MatcherSettings,
    settings: EnrichmentSettings,
    report: ReportOptions,
    dry_run: bool,
}

impl<C: CircuitStore, S: Storage> EnrichmentPipeline<C, S> {
    pub fn new(store: Arc<C>, storage: S, aliases: AliasTable, settings: EnrichmentSettings) -> Self {
        Self {
            store,
            storage,
            aliases,
            matcher_settings: MatcherSettings::default(),
            settings,
            report: ReportOptions::default(),
            dry_run: false,
        }
    }

    pub fn with_matcher_settings(mut self, settings: MatcherSettings) -> Self {
        self.matcher_settings = settings;
        self
    }

    pub fn with_report_options(mut self, report: ReportOptions) -> Self {
        self.report = report;
        self
    }

    /// Computes and reports without touching the database.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[async_trait::async_trait]
impl<C: CircuitStore, S: Storage> Pipeline for EnrichmentPipeline<C, S> {
    type Extracted = EnrichmentInput;
    type Transformed = EnrichmentResult;

    fn name(&self) -> &str {
        "enrichment"
    }

    async fn extract(&self) -> Result<EnrichmentInput> {
        let devices = self.store.mx_devices().await?;
        let circuits = self.store.enabled_circuits().await?;
        let previous = self.store.enriched_circuits().await?;
        let mappings = MappingIndex::from_rows(self.store.provider_mappings().await?);

        tracing::info!(
            "📥 Loaded {} MX devices, {} enabled circuits, {} existing rows, {} provider mappings",
            devices.len(),
            circuits.len(),
            previous.len(),
            mappings.len()
        );

        let mut circuits_by_site: HashMap<String, Vec<Circuit>> = HashMap::new();
        for circuit in circuits {
            circuits_by_site
                .entry(site_key(&circuit.site_name))
                .or_default()
                .push(circuit);
        }

        let matcher = ProviderMatcher::new(
            self.aliases.clone(),
            mappings,
            self.matcher_settings.clone(),
        );

        Ok(EnrichmentInput {
            devices,
            circuits_by_site,
            previous: previous
                .into_iter()
                .map(|row| (site_key(&row.network_name), row))
                .collect(),
            enricher: Enricher::new(Arc::new(matcher), self.settings.clone()),
        })
    }

    async fn transform(&self, data: EnrichmentInput) -> Result<EnrichmentResult> {
        let mut result = EnrichmentResult::default();

        for device in &data.devices {
            let key = site_key(&device.network_name);
            let circuits = data
                .circuits_by_site
                .get(&key)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let previous = data.previous.get(&key);

            match data.enricher.enrich(device, circuits, previous) {
                EnrichOutcome::Excluded(reason) => {
                    tracing::debug!("⏭️ Skipping {}: {}", device.network_name, reason);
                    result.excluded.push((device.network_name.clone(), reason));
                }
                EnrichOutcome::Enriched(site) => {
                    let unchanged = previous.is_some_and(|p| p.same_content(&site.row));
                    if !unchanged {
                        result.changed.push(site.row.clone());
                    }
                    result.sites.push(site);
                }
            }
        }

        result.match_stats = data.enricher.matcher().stats();
        tracing::info!(
            "🔄 Enriched {} sites ({} changed, {} excluded)",
            result.sites.len(),
            result.changed.len(),
            result.excluded.len()
        );
        Ok(result)
    }

    async fn load(&self, result: EnrichmentResult) -> Result<String> {
        let written = if self.dry_run {
            tracing::info!("🧪 Dry run: {} rows would be updated", result.changed.len());
            0
        } else {
            self.store.upsert_enriched(&result.changed).await?
        };

        let rows: Vec<ReportRow> = result.sites.iter().map(ReportRow::from).collect();
        let report = ReportFile::new(ENRICHMENT_REPORT, to_csv(&rows)?);
        let location = self.report.write(&self.storage, vec![report]).await?;

        Ok(format!(
            "{} of {} sites written, report: {}",
            written,
            result.sites.len(),
            location
        ))
    }
}
