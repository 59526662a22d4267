//! Per-device enrichment: decides the final provider, speed, cost and role of
//! each WAN port from DSR circuits, device notes and ARIN data.

use crate::domain::model::{
    Circuit, EnrichedCircuit, MerakiDevice, WanAssignment, WanPort,
};
use crate::domain::notes::{normalize_tracking_speed, parse_raw_notes, reformat_speed, ParsedNotes};
use crate::domain::provider::{
    is_blank_provider, normalize_provider, AliasTable, MatchOutcome, ProviderMatcher,
};
use crate::domain::similarity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// ARIN answers that carry no provider information.
const NON_PROVIDER_ARIN: &[&str] = &["unknown", "private ip"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    pub excluded_tags: Vec<String>,
    pub excluded_name_patterns: Vec<String>,
    pub excluded_note_patterns: Vec<String>,
    pub preserve_confirmed: bool,
    pub notes_match_threshold: u8,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            excluded_tags: to_strings(&["hub", "lab", "voice"]),
            excluded_name_patterns: to_strings(&[
                "hub",
                "lab",
                "voice",
                "datacenter",
                "test",
                "store in a box",
                "sib",
            ]),
            excluded_note_patterns: to_strings(&[
                "test store",
                "test site",
                "lab site",
                "hub site",
                "voice site",
            ]),
            preserve_confirmed: true,
            notes_match_threshold: 80,
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    Tag(String),
    NetworkName(String),
    Notes(String),
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Tag(tag) => write!(f, "excluded tag '{}'", tag),
            Exclusion::NetworkName(pattern) => write!(f, "network name matches '{}'", pattern),
            Exclusion::Notes(pattern) => write!(f, "notes mention '{}'", pattern),
        }
    }
}

pub fn exclusion_reason(settings: &EnrichmentSettings, device: &MerakiDevice) -> Option<Exclusion> {
    if let Some(tag) = device.device_tags.iter().find(|tag| {
        settings
            .excluded_tags
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(tag.trim()))
    }) {
        return Some(Exclusion::Tag(tag.clone()));
    }

    let network = device.network_name.to_lowercase();
    if let Some(pattern) = settings
        .excluded_name_patterns
        .iter()
        .find(|p| network.contains(&p.to_lowercase()))
    {
        return Some(Exclusion::NetworkName(pattern.clone()));
    }

    let notes = device.device_notes.as_deref().unwrap_or("").to_lowercase();
    settings
        .excluded_note_patterns
        .iter()
        .find(|p| notes.contains(&p.to_lowercase()))
        .map(|p| Exclusion::Notes(p.clone()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderComparison {
    Match,
    NoMatch,
}

/// Notes provider vs ARIN provider, both canonicalized through the alias table.
pub fn compare_notes_arin(
    aliases: &AliasTable,
    notes_provider: &str,
    arin_provider: &str,
    threshold: u8,
) -> ProviderComparison {
    let notes = normalize_provider(&aliases.canonical(notes_provider));
    let arin = normalize_provider(&aliases.canonical(arin_provider));

    if notes.is_empty() || arin.is_empty() {
        return ProviderComparison::NoMatch;
    }
    if notes == arin || similarity::ratio(&notes, &arin) >= threshold {
        ProviderComparison::Match
    } else {
        ProviderComparison::NoMatch
    }
}

/// `$x.xx`, with a missing or zero cost shown as `$0.00`.
pub fn format_cost(cost: Option<f64>) -> String {
    match cost {
        Some(value) if value.is_finite() && value != 0.0 => format!("${:.2}", value),
        _ => "$0.00".to_string(),
    }
}

fn usable_arin(arin: Option<&str>) -> Option<&str> {
    arin.map(str::trim).filter(|a| {
        !a.is_empty() && !NON_PROVIDER_ARIN.contains(&a.to_lowercase().as_str())
    })
}

/// How a DSR circuit was tied to a WAN port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitLink {
    IpAddress,
    ProviderName { confidence: u8 },
}

/// Where the final value of a WAN port came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WanSource {
    Dsr,
    Preserved,
    Arin,
    Notes,
    Empty,
}

impl WanSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WanSource::Dsr => "dsr",
            WanSource::Preserved => "preserved",
            WanSource::Arin => "arin",
            WanSource::Notes => "notes",
            WanSource::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedSite {
    pub row: EnrichedCircuit,
    pub wan1_source: WanSource,
    pub wan2_source: WanSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    Excluded(Exclusion),
    Enriched(EnrichedSite),
}

pub struct Enricher {
    matcher: Arc<ProviderMatcher>,
    settings: EnrichmentSettings,
}

impl Enricher {
    pub fn new(matcher: Arc<ProviderMatcher>, settings: EnrichmentSettings) -> Self {
        Self { matcher, settings }
    }

    pub fn settings(&self) -> &EnrichmentSettings {
        &self.settings
    }

    pub fn matcher(&self) -> &ProviderMatcher {
        &self.matcher
    }

    /// Picks the site circuit backing one WAN port, skipping `taken`.
    pub fn pick_circuit(
        &self,
        circuits: &[Circuit],
        wan_ip: Option<&str>,
        provider_hint: Option<&str>,
        taken: Option<usize>,
    ) -> Option<(usize, CircuitLink)> {
        let available = || {
            circuits
                .iter()
                .enumerate()
                .filter(move |(idx, _)| Some(*idx) != taken)
        };

        if let Some(ip) = wan_ip.map(str::trim).filter(|ip| !ip.is_empty()) {
            if let Some((idx, _)) = available().find(|(_, c)| {
                c.ip_address_start.as_deref().map(str::trim) == Some(ip)
            }) {
                return Some((idx, CircuitLink::IpAddress));
            }
        }

        // 以名稱挑選線路時不套用 Secondary 衝突規則
        let hint = provider_hint.filter(|p| !is_blank_provider(p))?;
        let mut best: Option<(usize, MatchOutcome)> = None;
        let mut closest: Option<MatchOutcome> = None;
        for (idx, circuit) in available() {
            let outcome = self.matcher.compare(circuit.provider(), hint);
            if !outcome.status.is_accepted() {
                if closest.as_ref().map_or(true, |c| outcome.confidence > c.confidence) {
                    closest = Some(outcome);
                }
                continue;
            }
            if best.as_ref().map_or(true, |(_, b)| outcome.confidence > b.confidence) {
                best = Some((idx, outcome));
            }
        }

        // one stats entry per WAN decision
        match best {
            Some((idx, outcome)) => {
                self.matcher.record(&outcome);
                Some((
                    idx,
                    CircuitLink::ProviderName {
                        confidence: outcome.confidence,
                    },
                ))
            }
            None => {
                if let Some(outcome) = closest {
                    self.matcher.record(&outcome);
                }
                None
            }
        }
    }

    fn from_circuit(circuit: &Circuit, notes_speed: &str) -> WanAssignment {
        let provider = circuit.provider().to_string();
        let dsr_speed = circuit
            .details_ordered_service_speed
            .as_deref()
            .map(normalize_tracking_speed)
            .filter(|s| !s.is_empty());
        let speed = dsr_speed.unwrap_or_else(|| notes_speed.to_string());

        WanAssignment {
            speed: reformat_speed(&speed, &provider),
            cost: format_cost(circuit.billing_monthly_cost),
            role: circuit
                .circuit_purpose
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_default(),
            confirmed: true,
            provider,
        }
    }

    fn from_notes_and_arin(
        &self,
        port: WanPort,
        notes_provider: &str,
        notes_speed: &str,
        arin: Option<&str>,
    ) -> (WanAssignment, WanSource) {
        let notes_provider = notes_provider.trim();
        let arin_raw = arin.map(str::trim).unwrap_or("");

        let (provider, source) = if notes_provider.is_empty() {
            if arin_raw.is_empty() {
                (String::new(), WanSource::Empty)
            } else {
                (arin_raw.to_string(), WanSource::Arin)
            }
        } else {
            match usable_arin(arin) {
                None => (notes_provider.to_string(), WanSource::Notes),
                Some(arin) => match compare_notes_arin(
                    self.matcher.aliases(),
                    notes_provider,
                    arin,
                    self.settings.notes_match_threshold,
                ) {
                    ProviderComparison::Match => (arin.to_string(), WanSource::Arin),
                    ProviderComparison::NoMatch => (notes_provider.to_string(), WanSource::Notes),
                },
            }
        };

        let assignment = WanAssignment {
            speed: reformat_speed(notes_speed, &provider),
            provider,
            cost: format_cost(None),
            role: port.default_role().as_str().to_string(),
            confirmed: false,
        };
        (assignment, source)
    }

    fn decide_wan(
        &self,
        port: WanPort,
        device: &MerakiDevice,
        notes: &ParsedNotes,
        circuit: Option<&Circuit>,
        previous: Option<&EnrichedCircuit>,
    ) -> (WanAssignment, WanSource) {
        let (notes_provider, notes_speed) = match port {
            WanPort::Wan1 => (notes.wan1_provider.as_str(), notes.wan1_speed.as_str()),
            WanPort::Wan2 => (notes.wan2_provider.as_str(), notes.wan2_speed.as_str()),
        };

        if let Some(circuit) = circuit {
            return (Self::from_circuit(circuit, notes_speed), WanSource::Dsr);
        }

        if self.settings.preserve_confirmed {
            if let Some(kept) = previous.map(|p| p.wan(port)).filter(|w| w.confirmed) {
                return (kept, WanSource::Preserved);
            }
        }

        self.from_notes_and_arin(port, notes_provider, notes_speed, device.arin_provider(port))
    }

    pub fn enrich(
        &self,
        device: &MerakiDevice,
        circuits: &[Circuit],
        previous: Option<&EnrichedCircuit>,
    ) -> EnrichOutcome {
        if let Some(exclusion) = exclusion_reason(&self.settings, device) {
            return EnrichOutcome::Excluded(exclusion);
        }

        let notes = parse_raw_notes(device.device_notes.as_deref().unwrap_or(""));

        let hint = |port: WanPort, notes_provider: &str| -> Option<String> {
            if !is_blank_provider(notes_provider) {
                Some(notes_provider.to_string())
            } else {
                usable_arin(device.arin_provider(port)).map(str::to_string)
            }
        };

        let wan1_hint = hint(WanPort::Wan1, &notes.wan1_provider);
        let wan1_pick = self.pick_circuit(
            circuits,
            device.wan_ip(WanPort::Wan1),
            wan1_hint.as_deref(),
            None,
        );

        let wan2_hint = hint(WanPort::Wan2, &notes.wan2_provider);
        let wan2_pick = self.pick_circuit(
            circuits,
            device.wan_ip(WanPort::Wan2),
            wan2_hint.as_deref(),
            wan1_pick.map(|(idx, _)| idx),
        );

        let (wan1, wan1_source) = self.decide_wan(
            WanPort::Wan1,
            device,
            &notes,
            wan1_pick.map(|(idx, _)| &circuits[idx]),
            previous,
        );
        let (wan2, wan2_source) = self.decide_wan(
            WanPort::Wan2,
            device,
            &notes,
            wan2_pick.map(|(idx, _)| &circuits[idx]),
            previous,
        );

        EnrichOutcome::Enriched(EnrichedSite {
            row: EnrichedCircuit::new(device.network_name.clone(), wan1, wan2),
            wan1_source,
            wan2_source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider::{MappingIndex, MatcherSettings};
    use chrono::Utc;

    fn enricher() -> Enricher {
        let matcher = ProviderMatcher::new(
            AliasTable::with_defaults(),
            MappingIndex::default(),
            MatcherSettings::default(),
        );
        Enricher::new(Arc::new(matcher), EnrichmentSettings::default())
    }

    fn device(notes: &str) -> MerakiDevice {
        MerakiDevice {
            device_serial: "Q2XX-AAAA-0001".to_string(),
            network_name: "CAL 24".to_string(),
            network_id: Some("L_1".to_string()),
            device_model: "MX68".to_string(),
            device_name: Some("CAL 24 MX".to_string()),
            device_tags: vec![],
            device_notes: Some(notes.to_string()),
            wan1_ip: Some("24.1.1.10".to_string()),
            wan1_arin_provider: Some("Charter Communications".to_string()),
            wan2_ip: Some("107.1.1.20".to_string()),
            wan2_arin_provider: Some("AT&T".to_string()),
            last_updated: Utc::now(),
        }
    }

    fn circuit(provider: &str, purpose: &str, ip: Option<&str>, cost: f64) -> Circuit {
        Circuit {
            record_number: Some(format!("DSR-{}", provider)),
            site_name: "CAL 24".to_string(),
            site_id: Some("CAL 24".to_string()),
            circuit_purpose: Some(purpose.to_string()),
            status: Some("Enabled".to_string()),
            provider_name: Some(provider.to_string()),
            details_ordered_service_speed: Some("300.0M x 30.0M".to_string()),
            billing_monthly_cost: Some(cost),
            ip_address_start: ip.map(str::to_string),
            manual_override: false,
        }
    }

    fn enriched(outcome: EnrichOutcome) -> EnrichedSite {
        match outcome {
            EnrichOutcome::Enriched(site) => site,
            EnrichOutcome::Excluded(reason) => panic!("unexpectedly excluded: {}", reason),
        }
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(Some(125.5)), "$125.50");
        assert_eq!(format_cost(Some(0.0)), "$0.00");
        assert_eq!(format_cost(None), "$0.00");
    }

    #[test]
    fn test_exclusions() {
        let settings = EnrichmentSettings::default();
        let mut hub = device("");
        hub.device_tags = vec!["Hub".to_string()];
        assert_eq!(exclusion_reason(&settings, &hub), Some(Exclusion::Tag("Hub".to_string())));

        let mut lab = device("");
        lab.network_name = "Lab Network".to_string();
        assert!(matches!(exclusion_reason(&settings, &lab), Some(Exclusion::NetworkName(_))));

        let test_site = device("Test site - do not enrich");
        assert!(matches!(exclusion_reason(&settings, &test_site), Some(Exclusion::Notes(_))));

        assert_eq!(exclusion_reason(&settings, &device("WAN1 Spectrum")), None);
    }

    #[test]
    fn test_ip_match_wins_and_is_confirmed() {
        let circuits = vec![
            circuit("Spectrum", "Primary", Some("24.1.1.10"), 89.99),
            circuit("AT&T Broadband II", "Secondary", None, 45.0),
        ];
        let site = enriched(enricher().enrich(&device("WAN1 Comcast WAN2 AT&T"), &circuits, None));

        assert_eq!(site.wan1_source, WanSource::Dsr);
        assert_eq!(site.row.wan1_provider, "Spectrum");
        assert_eq!(site.row.wan1_cost, "$89.99");
        assert_eq!(site.row.wan1_speed, "300.0M x 30.0M");
        assert!(site.row.wan1_confirmed);

        assert_eq!(site.wan2_source, WanSource::Dsr);
        assert_eq!(site.row.wan2_provider, "AT&T Broadband II");
        assert_eq!(site.row.wan2_role, "Secondary");
    }

    #[test]
    fn test_circuit_not_reused_across_wans() {
        let circuits = vec![circuit("Spectrum", "Primary", Some("24.1.1.10"), 89.99)];
        let mut dev = device("WAN1 Spectrum WAN2 Spectrum");
        dev.wan2_arin_provider = Some("Charter Communications".to_string());
        let site = enriched(enricher().enrich(&dev, &circuits, None));

        assert_eq!(site.wan1_source, WanSource::Dsr);
        assert_ne!(site.wan2_source, WanSource::Dsr);
        assert!(!site.row.wan2_confirmed);
    }

    #[test]
    fn test_secondary_circuit_not_claimed_by_other_carrier() {
        let circuits = vec![circuit("Comcast", "Secondary", None, 60.0)];
        let mut dev = device("WAN1 AT&T 100M x 10M WAN2 Comcast 300M x 30M");
        dev.wan1_arin_provider = Some("AT&T".to_string());
        dev.wan2_arin_provider = Some("Comcast".to_string());
        let site = enriched(enricher().enrich(&dev, &circuits, None));

        assert_eq!(site.wan1_source, WanSource::Arin);
        assert_eq!(site.row.wan1_provider, "AT&T");
        assert_eq!(site.row.wan1_role, "Primary");
        assert!(!site.row.wan1_confirmed);

        assert_eq!(site.wan2_source, WanSource::Dsr);
        assert_eq!(site.row.wan2_provider, "Comcast");
        assert_eq!(site.row.wan2_role, "Secondary");
        assert!(site.row.wan2_confirmed);
    }

    #[test]
    fn test_stats_count_one_entry_per_wan() {
        let circuits = vec![
            circuit("Spectrum", "Primary", None, 89.99),
            circuit("AT&T", "Secondary", None, 45.0),
            circuit("Cox", "Primary", None, 70.0),
        ];
        let enricher = enricher();
        enricher.enrich(&device("WAN1 Spectrum WAN2 AT&T"), &circuits, None);

        let stats = enricher.matcher().stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.direct, 2);
    }

    #[test]
    fn test_notes_vs_arin_without_dsr() {
        // notes agree with ARIN through the alias table -> ARIN name
        let site = enriched(enricher().enrich(&device("WAN1 Spectrum 300M x 30M WAN2 VZW Cell"), &[], None));
        assert_eq!(site.row.wan1_provider, "Charter Communications");
        assert_eq!(site.wan1_source, WanSource::Arin);
        assert_eq!(site.row.wan1_role, "Primary");
        assert_eq!(site.row.wan1_cost, "$0.00");
        assert!(!site.row.wan1_confirmed);

        // notes disagree with ARIN -> notes win
        assert_eq!(site.row.wan2_provider, "VZW Cell");
        assert_eq!(site.wan2_source, WanSource::Notes);
        assert_eq!(site.row.wan2_role, "Secondary");
    }

    #[test]
    fn test_empty_notes_fall_back_to_arin() {
        let site = enriched(enricher().enrich(&device(""), &[], None));
        assert_eq!(site.row.wan1_provider, "Charter Communications");
        assert_eq!(site.row.wan2_provider, "AT&T");
    }

    #[test]
    fn test_private_arin_keeps_notes() {
        let mut dev = device("WAN1 Starlink 100M x 20M");
        dev.wan1_arin_provider = Some("Private IP".to_string());
        let site = enriched(enricher().enrich(&dev, &[], None));
        assert_eq!(site.row.wan1_provider, "Starlink");
        assert_eq!(site.row.wan1_speed, "Satellite");
    }

    #[test]
    fn test_previous_confirmed_value_is_preserved() {
        let previous = EnrichedCircuit::new(
            "CAL 24".to_string(),
            WanAssignment {
                provider: "Spectrum".to_string(),
                speed: "600.0M x 35.0M".to_string(),
                cost: "$99.00".to_string(),
                role: "Primary".to_string(),
                confirmed: true,
            },
            WanAssignment {
                provider: "AT&T".to_string(),
                speed: "".to_string(),
                cost: "$0.00".to_string(),
                role: "Secondary".to_string(),
                confirmed: false,
            },
        );
        let site = enriched(enricher().enrich(&device("WAN1 Comcast WAN2 AT&T"), &[], Some(&previous)));
        assert_eq!(site.wan1_source, WanSource::Preserved);
        assert_eq!(site.row.wan1_provider, "Spectrum");
        assert_eq!(site.row.wan1_cost, "$99.00");
        assert_ne!(site.wan2_source, WanSource::Preserved);
    }
}
