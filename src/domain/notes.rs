//! Parser for the free-text Meraki device notes, e.g.
//! `"WAN 1\nSpectrum\n300M x 30M\nWAN 2\nAT&T Cell"`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static WAN1_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:WAN1|WAN\s*1)\s*:?\s*").expect("valid regex"));

static WAN2_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:WAN2|WAN\s*2)\s*:?\s*").expect("valid regex"));

static SPEED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*([MG]B?)\s*x\s*(\d+(?:\.\d+)?)\s*([MG]B?)")
        .expect("valid regex")
});

static PROVIDER_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.&|\-]").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static GIGABIT_SPEED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*G\b").expect("valid regex"));

const CELLULAR_MARKERS: &[&str] = &["vzw cell", "verizon cell", "digi", "inseego"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedNotes {
    pub wan1_provider: String,
    pub wan1_speed: String,
    pub wan2_provider: String,
    pub wan2_speed: String,
}

impl ParsedNotes {
    pub fn is_empty(&self) -> bool {
        self.wan1_provider.is_empty()
            && self.wan1_speed.is_empty()
            && self.wan2_provider.is_empty()
            && self.wan2_speed.is_empty()
    }
}

pub fn parse_raw_notes(raw: &str) -> ParsedNotes {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParsedNotes::default();
    }

    let text = WHITESPACE.replace_all(trimmed, " ");
    let (wan1_text, wan2_text) = split_wan_sections(&text);

    let (wan1_provider, wan1_speed) = provider_and_speed(wan1_text);
    let (wan2_provider, wan2_speed) = provider_and_speed(wan2_text);

    ParsedNotes {
        wan1_provider,
        wan1_speed,
        wan2_provider,
        wan2_speed,
    }
}

fn split_wan_sections(text: &str) -> (&str, &str) {
    if let Some(wan1) = WAN1_MARKER.find(text) {
        let after_wan1 = &text[wan1.end()..];
        return match WAN2_MARKER.find(after_wan1) {
            Some(wan2) => (
                after_wan1[..wan2.start()].trim(),
                after_wan1[wan2.end()..].trim(),
            ),
            None => (after_wan1.trim(), ""),
        };
    }

    match WAN2_MARKER.find(text) {
        Some(wan2) => ("", text[wan2.end()..].trim()),
        None => (text.trim(), ""),
    }
}

fn clean_provider(segment: &str) -> String {
    let cleaned = PROVIDER_NOISE.replace_all(segment, " ");
    WHITESPACE.replace_all(cleaned.trim(), " ").trim().to_string()
}

fn to_megabits(value: &str, unit: &str) -> f64 {
    let amount: f64 = value.parse().unwrap_or(0.0);
    if unit.to_ascii_uppercase().starts_with('G') {
        amount * 1000.0
    } else {
        amount
    }
}

fn provider_and_speed(segment: &str) -> (String, String) {
    if segment.is_empty() {
        return (String::new(), String::new());
    }

    match SPEED.captures(segment) {
        Some(caps) => {
            let down = to_megabits(&caps[1], &caps[2]);
            let up = to_megabits(&caps[3], &caps[4]);
            let speed = format!("{:.1}M x {:.1}M", down, up);
            let start = caps.get(0).map_or(0, |m| m.start());
            (clean_provider(&segment[..start]), speed)
        }
        None => (clean_provider(segment), String::new()),
    }
}

/// Display speed for a provider: cellular and satellite links get a fixed
/// label instead of a bandwidth figure.
pub fn reformat_speed(speed: &str, provider: &str) -> String {
    if speed.trim().is_empty() {
        return String::new();
    }

    let provider = provider.to_lowercase();
    if CELLULAR_MARKERS.iter().any(|m| provider.contains(m)) {
        return "Cell".to_string();
    }
    if provider.contains("starlink") {
        return "Satellite".to_string();
    }

    speed.trim().to_string()
}

/// Rewrites gigabit figures in a DSR speed string as megabits
/// (`"1G x 1G"` becomes `"1000M x 1000M"`).
pub fn normalize_tracking_speed(value: &str) -> String {
    GIGABIT_SPEED
        .replace_all(value.trim(), |caps: &regex::Captures| {
            let amount: f64 = caps[1].parse().unwrap_or(0.0);
            let megabits = amount * 1000.0;
            if megabits.fract() == 0.0 {
                format!("{}M", megabits as u64)
            } else {
                format!("{}M", megabits)
            }
        })
        .into_owned()
}
