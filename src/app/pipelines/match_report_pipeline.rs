use super::enrichment_pipeline::site_key;
use super::{to_csv, ReportOptions};
use crate::adapters::storage::ReportFile;
use crate::domain::model::{Circuit, MerakiDevice, ProviderMapping, WanPort};
use crate::domain::ports::{CircuitStore, Pipeline, Storage};
use crate::domain::provider::{
    is_blank_provider, normalize_provider, suggest_mapping, AliasTable, MappingIndex, MatchStats,
    MatchStatus, MatcherSettings, ProviderMatcher,
};
use crate::utils::error::Result;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const MATCH_REPORT: &str = "provider_match_report.csv";
pub const SUGGESTED_MAPPINGS: &str = "suggested_mappings.csv";

pub struct MatchReportInput {
    pub pairs: Vec<(Circuit, MerakiDevice)>,
    pub matcher: ProviderMatcher,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReportRow {
    pub site_name: String,
    pub site_id: String,
    pub circuit_purpose: String,
    pub dsr_provider: String,
    pub dsr_normalized: String,
    pub arin_provider: String,
    pub arin_normalized: String,
    pub status: MatchStatus,
    pub score: u8,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct MatchReport {
    pub rows: Vec<MatchReportRow>,
    pub suggestions: Vec<ProviderMapping>,
    pub stats: MatchStats,
    pub skipped_no_arin: usize,
}

/// ARIN provider for the WAN carrying the circuit's IP, else WAN1, else WAN2.
pub fn arin_for_circuit<'a>(circuit: &Circuit, device: &'a MerakiDevice) -> Option<&'a str> {
    let usable = |port: WanPort| device.arin_provider(port).filter(|p| !is_blank_provider(p));

    if let Some(ip) = circuit
        .ip_address_start
        .as_deref()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        for port in [WanPort::Wan1, WanPort::Wan2] {
            if device.wan_ip(port).map(str::trim) == Some(ip) {
                if let Some(provider) = usable(port) {
                    return Some(provider);
                }
            }
        }
    }

    usable(WanPort::Wan1).or_else(|| usable(WanPort::Wan2))
}

/// DSR provider vs ARIN provider for every enabled circuit.
pub struct MatchReportPipeline<C: CircuitStore, S: Storage> {
    store: Arc<C>,
    storage: S,
    aliases: AliasTable,
    settings: MatcherSettings,
    report: ReportOptions,
}

impl<C: CircuitStore, S: Storage> MatchReportPipeline<C, S> {
    pub fn new(store: Arc<C>, storage: S, aliases: AliasTable, settings: MatcherSettings) -> Self {
        Self {
            store,
            storage,
            aliases,
            settings,
            report: ReportOptions::default(),
        }
    }

    pub fn with_report_options(mut self, report: ReportOptions) -> Self {
        self.report = report;
        self
    }
}

#[async_trait::async_trait]
impl<C: CircuitStore, S: Storage> Pipeline for MatchReportPipeline<C, S> {
    type Extracted = MatchReportInput;
    type Transformed = MatchReport;

    fn name(&self) -> &str {
        "match-report"
    }

    async fn extract(&self) -> Result<MatchReportInput> {
        let circuits = self.store.enabled_circuits().await?;
        let devices: HashMap<String, MerakiDevice> = self
            .store
            .mx_devices()
            .await?
            .into_iter()
            .map(|d| (site_key(&d.network_name), d))
            .collect();
        let mappings = MappingIndex::from_rows(self.store.provider_mappings().await?);

        let pairs: Vec<(Circuit, MerakiDevice)> = circuits
            .into_iter()
            .filter_map(|c| {
                let device = devices.get(&site_key(&c.site_name))?.clone();
                Some((c, device))
            })
            .collect();
        tracing::info!("📥 {} enabled circuits have a matching MX device", pairs.len());

        Ok(MatchReportInput {
            pairs,
            matcher: ProviderMatcher::new(self.aliases.clone(), mappings, self.settings.clone()),
        })
    }

    async fn transform(&self, data: MatchReportInput) -> Result<MatchReport> {
        let mut report = MatchReport::default();
        let mut suggested: HashSet<(String, String)> = HashSet::new();

        for (circuit, device) in &data.pairs {
            let Some(arin) = arin_for_circuit(circuit, device) else {
                report.skipped_no_arin += 1;
                continue;
            };

            let dsr = circuit.provider();
            let outcome = data.matcher.match_providers(dsr, arin, circuit.purpose());

            if outcome.status == MatchStatus::NoMatch
                && !is_blank_provider(dsr)
                && suggested.insert((dsr.to_lowercase(), arin.to_lowercase()))
            {
                report
                    .suggestions
                    .push(suggest_mapping(dsr, arin, outcome.confidence));
            }

            report.rows.push(MatchReportRow {
                site_name: circuit.site_name.clone(),
                site_id: circuit.site_id.clone().unwrap_or_default(),
                circuit_purpose: circuit.circuit_purpose.clone().unwrap_or_default(),
                dsr_provider: dsr.to_string(),
                dsr_normalized: normalize_provider(dsr),
                arin_provider: arin.to_string(),
                arin_normalized: normalize_provider(arin),
                status: outcome.status,
                score: outcome.confidence,
                reason: outcome.reason,
            });
        }

        report.stats = data.matcher.stats();
        tracing::info!(
            "📊 Match rate {:.1}% ({} of {}): direct {}, mapping {}, canonical {}, conflict {}, fuzzy {}, possible {}, none {}",
            report.stats.match_rate(),
            report.stats.matched(),
            report.stats.total,
            report.stats.direct,
            report.stats.mapping,
            report.stats.canonical,
            report.stats.conflict,
            report.stats.fuzzy,
            report.stats.possible,
            report.stats.no_match
        );
        if report.skipped_no_arin > 0 {
            tracing::info!("⏭️ {} circuits skipped without ARIN data", report.skipped_no_arin);
        }
        Ok(report)
    }

    async fn load(&self, report: MatchReport) -> Result<String> {
        let files = vec![
            ReportFile::new(MATCH_REPORT, to_csv(&report.rows)?),
            ReportFile::new(SUGGESTED_MAPPINGS, to_csv(&report.suggestions)?),
        ];
        self.report.write(&self.storage, files).await
    }
}
