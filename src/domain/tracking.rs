//! DSR tracking CSV import and enablement detection.

use crate::domain::model::{Circuit, EnablementEvent};
use crate::domain::notes::normalize_tracking_speed;
use crate::utils::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Read;

pub const READY_FOR_ENABLEMENT: &str = "ready for enablement";

/// One tracking-export row. Column names are matched after
/// [`normalize_header`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TrackingRow {
    #[serde(default)]
    pub record_number: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub circuit_purpose: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub substatus: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub details_ordered_service_speed: Option<String>,
    #[serde(default)]
    pub billing_monthly_cost: Option<String>,
    #[serde(default)]
    pub ip_address_start: Option<String>,
    #[serde(default, alias = "sctask_assignee")]
    pub assigned_to: Option<String>,
    #[serde(default, alias = "sctask_number")]
    pub sctask: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| {
        !v.is_empty() && !v.eq_ignore_ascii_case("nan")
    })
}

impl TrackingRow {
    pub fn record_number(&self) -> Option<&str> {
        non_empty(&self.record_number)
    }

    pub fn site_id(&self) -> Option<&str> {
        non_empty(&self.site_id)
    }

    pub fn status(&self) -> &str {
        non_empty(&self.status).unwrap_or("")
    }

    /// `"$1,234.50"` and `"1234.5"` both parse; anything else is `None`.
    pub fn monthly_cost(&self) -> Option<f64> {
        non_empty(&self.billing_monthly_cost)
            .map(|raw| raw.replace(['$', ','], ""))
            .and_then(|raw| raw.trim().parse().ok())
    }

    pub fn to_circuit(&self) -> Option<Circuit> {
        let record_number = self.record_number()?.to_string();
        Some(Circuit {
            record_number: Some(record_number),
            site_name: non_empty(&self.site_name).unwrap_or("").to_string(),
            site_id: non_empty(&self.site_id).map(str::to_string),
            circuit_purpose: non_empty(&self.circuit_purpose).map(str::to_string),
            status: non_empty(&self.status).map(str::to_string),
            provider_name: non_empty(&self.provider_name).map(str::to_string),
            details_ordered_service_speed: non_empty(&self.details_ordered_service_speed)
                .map(normalize_tracking_speed),
            billing_monthly_cost: self.monthly_cost(),
            ip_address_start: non_empty(&self.ip_address_start).map(str::to_string),
            manual_override: false,
        })
    }
}

/// `"Site ID"` becomes `"site_id"`.
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

pub fn read_tracking_csv<R: Read>(reader: R) -> Result<Vec<TrackingRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: csv::StringRecord = csv_reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();
    csv_reader.set_headers(headers);

    let mut rows = Vec::new();
    for row in csv_reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Status text counts as enabled when it says so and is not a "ready" state.
pub fn is_enabled_status(status: &str) -> bool {
    let status = status.to_lowercase();
    status.contains("enabled") && !status.contains("ready")
}

pub fn is_ready_status(status: &str) -> bool {
    status.trim().eq_ignore_ascii_case(READY_FOR_ENABLEMENT)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub record_number: String,
    pub site_name: String,
    pub old_status: String,
    pub new_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub total_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_no_record_number: usize,
    pub skipped_duplicate: usize,
    pub skipped_manual_override: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportPlan {
    pub inserts: Vec<Circuit>,
    pub updates: Vec<Circuit>,
    pub status_changes: Vec<StatusChange>,
    pub stats: ImportStats,
}

/// Splits tracking rows into inserts and updates against the stored circuits.
pub fn plan_import(rows: &[TrackingRow], existing: &[Circuit]) -> ImportPlan {
    let by_record: HashMap<&str, &Circuit> = existing
        .iter()
        .filter_map(|c| c.record_number.as_deref().map(|r| (r, c)))
        .collect();

    let mut plan = ImportPlan::default();
    let mut seen = HashSet::new();

    for row in rows {
        plan.stats.total_rows += 1;

        let Some(incoming) = row.to_circuit() else {
            plan.stats.skipped_no_record_number += 1;
            continue;
        };
        let record_number = incoming.record_number.clone().unwrap_or_default();

        if !seen.insert(record_number.clone()) {
            plan.stats.skipped_duplicate += 1;
            continue;
        }

        match by_record.get(record_number.as_str()) {
            Some(current) if current.manual_override => {
                tracing::info!(
                    "⏭️ Skipping {} ({}) - manual override active",
                    record_number,
                    current.site_name
                );
                plan.stats.skipped_manual_override += 1;
            }
            Some(current) => {
                if **current == incoming {
                    plan.stats.unchanged += 1;
                    continue;
                }
                let old_status = current.status.clone().unwrap_or_default();
                let new_status = incoming.status.clone().unwrap_or_default();
                if old_status != new_status {
                    plan.status_changes.push(StatusChange {
                        record_number: record_number.clone(),
                        site_name: incoming.site_name.clone(),
                        old_status,
                        new_status,
                    });
                }
                plan.stats.updated += 1;
                plan.updates.push(incoming);
            }
            None => {
                plan.stats.inserted += 1;
                plan.inserts.push(incoming);
            }
        }
    }

    plan
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnablementReport {
    pub date: NaiveDate,
    pub ready_count: usize,
    pub new_enablements: Vec<EnablementEvent>,
}

fn enabled_site_ids(rows: &[TrackingRow]) -> HashSet<&str> {
    rows.iter()
        .filter(|r| is_enabled_status(r.status()))
        .filter_map(TrackingRow::site_id)
        .collect()
}

/// Compares today's snapshot with the previous one. Without a previous
/// snapshot every enabled site counts as new.
pub fn detect_enablements(
    date: NaiveDate,
    today: &[TrackingRow],
    previous: Option<&[TrackingRow]>,
) -> EnablementReport {
    let ready_count = today.iter().filter(|r| is_ready_status(r.status())).count();
    let enabled_before = previous.map(enabled_site_ids).unwrap_or_default();

    let mut reported = HashSet::new();
    let mut new_enablements = Vec::new();
    for row in today.iter().filter(|r| is_enabled_status(r.status())) {
        let Some(site_id) = row.site_id() else {
            continue;
        };
        if enabled_before.contains(site_id) || !reported.insert(site_id) {
            continue;
        }
        new_enablements.push(EnablementEvent {
            date,
            site_id: site_id.to_string(),
            site_name: non_empty(&row.site_name).unwrap_or("").to_string(),
            circuit_purpose: non_empty(&row.circuit_purpose).unwrap_or("").to_string(),
            provider_name: non_empty(&row.provider_name).unwrap_or("").to_string(),
            previous_status: "Not Enabled".to_string(),
            current_status: row.status().to_string(),
            assigned_to: non_empty(&row.assigned_to).unwrap_or("").to_string(),
            sctask: non_empty(&row.sctask).unwrap_or("").to_string(),
        });
    }

    EnablementReport {
        date,
        ready_count,
        new_enablements,
    }
}
