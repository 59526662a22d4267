use super::alias::AliasTable;
use super::mapping::MappingIndex;
use super::normalize::{is_blank_provider, normalize_provider};
use crate::domain::model::{CircuitPurpose, ProviderMapping};
use crate::domain::similarity::FuzzyScores;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

pub const DEFAULT_MATCH_THRESHOLD: u8 = 80;
pub const DEFAULT_POSSIBLE_THRESHOLD: u8 = 60;
pub const DEFAULT_CONFLICT_CONFIDENCE: u8 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    #[serde(rename = "Match")]
    Match,
    #[serde(rename = "Possible Match")]
    PossibleMatch,
    #[serde(rename = "No Match")]
    NoMatch,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Match => "Match",
            MatchStatus::PossibleMatch => "Possible Match",
            MatchStatus::NoMatch => "No Match",
        }
    }

    pub fn is_accepted(&self) -> bool {
        !matches!(self, MatchStatus::NoMatch)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which step of the cascade produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMethod {
    MissingData,
    Direct,
    Mapping,
    Normalized,
    Canonical,
    SecondaryConflict,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub status: MatchStatus,
    pub confidence: u8,
    pub reason: String,
    pub method: MatchMethod,
}

impl MatchOutcome {
    fn new(status: MatchStatus, confidence: u8, reason: impl Into<String>, method: MatchMethod) -> Self {
        Self {
            status,
            confidence,
            reason: reason.into(),
            method,
        }
    }

    pub fn is_match(&self) -> bool {
        self.status == MatchStatus::Match
    }
}

/// Secondary circuits are often billed under one carrier and delivered over
/// another; for these pairs the DSR record is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryConflictRule {
    pub dsr_keyword: String,
    pub arin_providers: Vec<String>,
    #[serde(default = "default_conflict_confidence")]
    pub confidence: u8,
}

fn default_conflict_confidence() -> u8 {
    DEFAULT_CONFLICT_CONFIDENCE
}

impl SecondaryConflictRule {
    pub fn new(dsr_keyword: &str, arin_providers: &[&str]) -> Self {
        Self {
            dsr_keyword: dsr_keyword.to_string(),
            arin_providers: arin_providers.iter().map(|p| p.to_string()).collect(),
            confidence: DEFAULT_CONFLICT_CONFIDENCE,
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("comcast", &["AT&T"]),
            Self::new("cox", &["AT&T", "Verizon"]),
            Self::new("spectrum", &["AT&T"]),
        ]
    }

    fn applies(&self, dsr_normalized: &str, arin: &str) -> bool {
        dsr_normalized.contains(&self.dsr_keyword.to_lowercase())
            && self
                .arin_providers
                .iter()
                .any(|p| p.trim().eq_ignore_ascii_case(arin.trim()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatcherSettings {
    pub match_threshold: u8,
    pub possible_threshold: u8,
    pub secondary_conflicts: Vec<SecondaryConflictRule>,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            possible_threshold: DEFAULT_POSSIBLE_THRESHOLD,
            secondary_conflicts: SecondaryConflictRule::defaults(),
        }
    }
}

/// Running counters per cascade step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub total: usize,
    pub direct: usize,
    pub mapping: usize,
    pub canonical: usize,
    pub conflict: usize,
    pub fuzzy: usize,
    pub possible: usize,
    pub no_match: usize,
}

impl MatchStats {
    pub fn record(&mut self, outcome: &MatchOutcome) {
        self.total += 1;
        match (outcome.method, outcome.status) {
            (MatchMethod::MissingData, _) | (_, MatchStatus::NoMatch) => self.no_match += 1,
            (MatchMethod::Direct | MatchMethod::Normalized, _) => self.direct += 1,
            (MatchMethod::Mapping, _) => self.mapping += 1,
            (MatchMethod::Canonical, _) => self.canonical += 1,
            (MatchMethod::SecondaryConflict, _) => self.conflict += 1,
            (MatchMethod::Fuzzy, MatchStatus::PossibleMatch) => self.possible += 1,
            (MatchMethod::Fuzzy, _) => self.fuzzy += 1,
        }
    }

    pub fn matched(&self) -> usize {
        self.total - self.no_match - self.possible
    }

    pub fn match_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matched() as f64 * 100.0 / self.total as f64
    }
}

/// Reconciles a DSR provider name with an ARIN provider name.
#[derive(Debug, Default)]
pub struct ProviderMatcher {
    aliases: AliasTable,
    mappings: MappingIndex,
    settings: MatcherSettings,
    stats: Mutex<MatchStats>,
}

impl ProviderMatcher {
    pub fn new(aliases: AliasTable, mappings: MappingIndex, settings: MatcherSettings) -> Self {
        Self {
            aliases,
            mappings,
            settings,
            stats: Mutex::new(MatchStats::default()),
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn settings(&self) -> &MatcherSettings {
        &self.settings
    }

    pub fn stats(&self) -> MatchStats {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn match_providers(
        &self,
        dsr_provider: &str,
        arin_provider: &str,
        purpose: Option<CircuitPurpose>,
    ) -> MatchOutcome {
        let outcome = self.evaluate(dsr_provider, arin_provider, purpose);
        self.record(&outcome);
        outcome
    }

    /// Name-only comparison: no Secondary conflict rules, nothing recorded.
    pub fn compare(&self, dsr_provider: &str, arin_provider: &str) -> MatchOutcome {
        self.evaluate(dsr_provider, arin_provider, None)
    }

    pub fn record(&self, outcome: &MatchOutcome) {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record(outcome);
    }

    fn evaluate(
        &self,
        dsr_provider: &str,
        arin_provider: &str,
        purpose: Option<CircuitPurpose>,
    ) -> MatchOutcome {
        if is_blank_provider(dsr_provider) || is_blank_provider(arin_provider) {
            return MatchOutcome::new(
                MatchStatus::NoMatch,
                0,
                "Missing provider data",
                MatchMethod::MissingData,
            );
        }

        let dsr = dsr_provider.trim();
        let arin = arin_provider.trim();

        if dsr.to_lowercase() == arin.to_lowercase() {
            return MatchOutcome::new(MatchStatus::Match, 100, "Direct match", MatchMethod::Direct);
        }

        if let Some(hit) = self.mappings.lookup(dsr, arin) {
            return MatchOutcome::new(MatchStatus::Match, hit.confidence, hit.reason(), MatchMethod::Mapping);
        }

        let dsr_norm = normalize_provider(dsr);
        let arin_norm = normalize_provider(arin);

        if !dsr_norm.is_empty() && dsr_norm == arin_norm {
            return MatchOutcome::new(MatchStatus::Match, 95, "Normalized match", MatchMethod::Normalized);
        }

        if let Some(hit) = self.mappings.lookup(&dsr_norm, &arin_norm) {
            return MatchOutcome::new(
                MatchStatus::Match,
                hit.confidence,
                format!("Normalized {}", hit.reason()),
                MatchMethod::Mapping,
            );
        }

        if let (Some(dsr_canonical), Some(arin_canonical)) =
            (self.aliases.lookup(dsr), self.aliases.lookup(arin))
        {
            if dsr_canonical.eq_ignore_ascii_case(arin_canonical) {
                return MatchOutcome::new(
                    MatchStatus::Match,
                    95,
                    format!("Canonical match: {}", dsr_canonical),
                    MatchMethod::Canonical,
                );
            }
        }

        if purpose == Some(CircuitPurpose::Secondary) {
            if let Some(rule) = self
                .settings
                .secondary_conflicts
                .iter()
                .find(|rule| rule.applies(&dsr_norm, arin))
            {
                return MatchOutcome::new(
                    MatchStatus::Match,
                    rule.confidence,
                    "Secondary circuit conflict (trust DSR)",
                    MatchMethod::SecondaryConflict,
                );
            }
        }

        let scores = FuzzyScores::compute(&dsr_norm, &arin_norm);
        let best = scores.best();
        if best >= self.settings.match_threshold {
            MatchOutcome::new(
                MatchStatus::Match,
                best,
                format!("Fuzzy match ({})", scores),
                MatchMethod::Fuzzy,
            )
        } else if best >= self.settings.possible_threshold {
            MatchOutcome::new(
                MatchStatus::PossibleMatch,
                best,
                format!("Low confidence fuzzy ({})", scores),
                MatchMethod::Fuzzy,
            )
        } else {
            MatchOutcome::new(
                MatchStatus::NoMatch,
                best,
                format!("Low similarity ({})", scores),
                MatchMethod::Fuzzy,
            )
        }
    }
}

/// Proposes a `provider_mappings` row for a pair the cascade could not match.
pub fn suggest_mapping(dsr_provider: &str, arin_provider: &str, score: u8) -> ProviderMapping {
    let lowered = dsr_provider.to_lowercase();
    let mapping_type = if lowered.contains("eb2-") {
        "eb2_prefix"
    } else if ["dsl", "fiber", "cable", "broadband"]
        .iter()
        .any(|suffix| lowered.contains(suffix))
    {
        "service_suffix"
    } else if ["business", "workplace", "/"]
        .iter()
        .any(|word| lowered.contains(word))
    {
        "division"
    } else {
        "alias"
    };

    ProviderMapping {
        dsr_provider: dsr_provider.trim().to_string(),
        arin_provider: arin_provider.trim().to_string(),
        mapping_type: mapping_type.to_string(),
        confidence_score: i32::from(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> ProviderMatcher {
        ProviderMatcher::new(
            AliasTable::with_defaults(),
            MappingIndex::default(),
            MatcherSettings::default(),
        )
    }

    #[test]
    fn test_missing_data() {
        let outcome = matcher().match_providers("", "AT&T", None);
        assert_eq!(outcome.status, MatchStatus::NoMatch);
        assert_eq!(outcome.confidence, 0);
        assert_eq!(outcome.reason, "Missing provider data");
    }

    #[test]
    fn test_direct_match_is_case_insensitive() {
        let outcome = matcher().match_providers("AT&T", "at&t", None);
        assert_eq!(outcome.status, MatchStatus::Match);
        assert_eq!(outcome.confidence, 100);
        assert_eq!(outcome.method, MatchMethod::Direct);
    }

    #[test]
    fn test_normalized_match() {
        let outcome = matcher().match_providers("DSR AT&T", "AT&T", None);
        assert_eq!(outcome.confidence, 95);
        assert_eq!(outcome.reason, "Normalized match");
    }

    #[test]
    fn test_canonical_match() {
        let outcome = matcher().match_providers("EB2-Cox Business/BOI", "Cox Communications", None);
        assert_eq!(outcome.status, MatchStatus::Match);
        assert_eq!(outcome.confidence, 95);
        assert_eq!(outcome.reason, "Canonical match: Cox Communications");
    }

    #[test]
    fn test_secondary_conflict_only_for_secondary() {
        let m = matcher();
        let secondary = m.match_providers("Comcast", "AT&T", Some(CircuitPurpose::Secondary));
        assert_eq!(secondary.status, MatchStatus::Match);
        assert_eq!(secondary.confidence, 70);
        assert_eq!(secondary.reason, "Secondary circuit conflict (trust DSR)");

        let primary = m.match_providers("Comcast", "AT&T", Some(CircuitPurpose::Primary));
        assert_eq!(primary.status, MatchStatus::NoMatch);
    }

    #[test]
    fn test_mapping_short_circuits_fuzzy() {
        let mappings = MappingIndex::from_rows(vec![ProviderMapping {
            dsr_provider: "Allo".to_string(),
            arin_provider: "Nebraska Central Telephone".to_string(),
            mapping_type: "manual".to_string(),
            confidence_score: 100,
        }]);
        let m = ProviderMatcher::new(AliasTable::with_defaults(), mappings, MatcherSettings::default());
        let outcome = m.match_providers("Allo", "Nebraska Central Telephone", None);
        assert_eq!(outcome.status, MatchStatus::Match);
        assert_eq!(outcome.confidence, 100);
        assert_eq!(outcome.method, MatchMethod::Mapping);
        assert_eq!(outcome.reason, "Mapped via manual");
    }

    #[test]
    fn test_unrelated_providers_no_match() {
        let outcome = matcher().match_providers("Sparklight", "Windstream", None);
        assert_eq!(outcome.status, MatchStatus::NoMatch);
        assert!(outcome.reason.starts_with("Low similarity (scores: "));
    }

    #[test]
    fn test_broadband_ii_suffix_matches_base_carrier() {
        let outcome = matcher().match_providers("AT&T Broadband II", "AT&T", None);
        assert_eq!(outcome.status, MatchStatus::Match);
        assert_eq!(outcome.confidence, 95);
        assert_eq!(outcome.method, MatchMethod::Normalized);
    }

    #[test]
    fn test_mapping_row_turns_no_match_into_match() {
        let before = matcher().match_providers("Sparklight", "Charter Communications", None);
        assert_eq!(before.status, MatchStatus::NoMatch);
        assert!(before.confidence < 60);

        let mappings = MappingIndex::from_rows(vec![ProviderMapping {
            dsr_provider: "Sparklight".to_string(),
            arin_provider: "Charter Communications".to_string(),
            mapping_type: "manual".to_string(),
            confidence_score: 90,
        }]);
        let m = ProviderMatcher::new(AliasTable::with_defaults(), mappings, MatcherSettings::default());
        let after = m.match_providers("Sparklight", "Charter Communications", None);
        assert_eq!(after.status, MatchStatus::Match);
        assert_eq!(after.confidence, 90);
        assert_eq!(after.reason, "Mapped via manual");
    }

    #[test]
    fn test_compare_skips_secondary_conflict_and_stats() {
        let m = matcher();
        let outcome = m.compare("Comcast", "AT&T");
        assert_eq!(outcome.status, MatchStatus::NoMatch);
        assert_eq!(m.stats().total, 0);
    }

    #[test]
    fn test_stats_accumulate() {
        let m = matcher();
        m.match_providers("AT&T", "AT&T", None);
        m.match_providers("DSR AT&T", "AT&T", None);
        m.match_providers("Spectrum", "Charter Communications", None);
        m.match_providers("", "Comcast", None);
        let stats = m.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.direct, 2);
        assert_eq!(stats.canonical, 1);
        assert_eq!(stats.no_match, 1);
        assert_eq!(stats.matched(), 3);
    }

    #[test]
    fn test_suggest_mapping_types() {
        assert_eq!(suggest_mapping("EB2-Windstream", "Windstream Communications", 55).mapping_type, "eb2_prefix");
        assert_eq!(suggest_mapping("Allo Fiber", "Nebraska Central", 30).mapping_type, "service_suffix");
        assert_eq!(suggest_mapping("Acme Business", "Acme Holdings", 50).mapping_type, "division");
        assert_eq!(suggest_mapping("Allo", "Nebraska Central", 20).mapping_type, "alias");
    }
}
