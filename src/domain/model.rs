use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WanPort {
    Wan1,
    Wan2,
}

impl WanPort {
    pub fn as_str(&self) -> &'static str {
        match self {
            WanPort::Wan1 => "WAN1",
            WanPort::Wan2 => "WAN2",
        }
    }

    /// Role assumed for a port when no DSR circuit backs it.
    pub fn default_role(&self) -> CircuitPurpose {
        match self {
            WanPort::Wan1 => CircuitPurpose::Primary,
            WanPort::Wan2 => CircuitPurpose::Secondary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitPurpose {
    Primary,
    Secondary,
}

impl CircuitPurpose {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" => Some(CircuitPurpose::Primary),
            "secondary" => Some(CircuitPurpose::Secondary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitPurpose::Primary => "Primary",
            CircuitPurpose::Secondary => "Secondary",
        }
    }
}

/// A `circuits` row: one DSR-tracked circuit.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Circuit {
    pub record_number: Option<String>,
    pub site_name: String,
    pub site_id: Option<String>,
    pub circuit_purpose: Option<String>,
    pub status: Option<String>,
    pub provider_name: Option<String>,
    pub details_ordered_service_speed: Option<String>,
    pub billing_monthly_cost: Option<f64>,
    pub ip_address_start: Option<String>,
    pub manual_override: bool,
}

impl Circuit {
    pub fn purpose(&self) -> Option<CircuitPurpose> {
        self.circuit_purpose.as_deref().and_then(CircuitPurpose::parse)
    }

    pub fn provider(&self) -> &str {
        self.provider_name.as_deref().unwrap_or("").trim()
    }

    pub fn is_enabled(&self) -> bool {
        self.status.as_deref() == Some("Enabled")
    }
}

/// A `meraki_inventory` row, refreshed nightly from the Meraki API.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MerakiDevice {
    pub device_serial: String,
    pub network_name: String,
    pub network_id: Option<String>,
    pub device_model: String,
    pub device_name: Option<String>,
    pub device_tags: Vec<String>,
    pub device_notes: Option<String>,
    pub wan1_ip: Option<String>,
    pub wan1_arin_provider: Option<String>,
    pub wan2_ip: Option<String>,
    pub wan2_arin_provider: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl MerakiDevice {
    pub fn is_mx(&self) -> bool {
        self.device_model.starts_with("MX")
    }

    pub fn wan_ip(&self, port: WanPort) -> Option<&str> {
        match port {
            WanPort::Wan1 => self.wan1_ip.as_deref(),
            WanPort::Wan2 => self.wan2_ip.as_deref(),
        }
        .filter(|ip| !ip.trim().is_empty())
    }

    pub fn arin_provider(&self, port: WanPort) -> Option<&str> {
        match port {
            WanPort::Wan1 => self.wan1_arin_provider.as_deref(),
            WanPort::Wan2 => self.wan2_arin_provider.as_deref(),
        }
        .filter(|p| !p.trim().is_empty())
    }
}

/// Final provider/speed/cost/role decision for one WAN port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WanAssignment {
    pub provider: String,
    pub speed: String,
    pub cost: String,
    pub role: String,
    pub confirmed: bool,
}

/// An `enriched_circuits` row keyed by network name.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct EnrichedCircuit {
    pub network_name: String,
    pub wan1_provider: String,
    pub wan1_speed: String,
    pub wan1_cost: String,
    pub wan1_role: String,
    pub wan1_confirmed: bool,
    pub wan2_provider: String,
    pub wan2_speed: String,
    pub wan2_cost: String,
    pub wan2_role: String,
    pub wan2_confirmed: bool,
    pub last_updated: DateTime<Utc>,
}

impl EnrichedCircuit {
    pub fn new(network_name: String, wan1: WanAssignment, wan2: WanAssignment) -> Self {
        Self {
            network_name,
            wan1_provider: wan1.provider,
            wan1_speed: wan1.speed,
            wan1_cost: wan1.cost,
            wan1_role: wan1.role,
            wan1_confirmed: wan1.confirmed,
            wan2_provider: wan2.provider,
            wan2_speed: wan2.speed,
            wan2_cost: wan2.cost,
            wan2_role: wan2.role,
            wan2_confirmed: wan2.confirmed,
            last_updated: Utc::now(),
        }
    }

    pub fn wan(&self, port: WanPort) -> WanAssignment {
        match port {
            WanPort::Wan1 => WanAssignment {
                provider: self.wan1_provider.clone(),
                speed: self.wan1_speed.clone(),
                cost: self.wan1_cost.clone(),
                role: self.wan1_role.clone(),
                confirmed: self.wan1_confirmed,
            },
            WanPort::Wan2 => WanAssignment {
                provider: self.wan2_provider.clone(),
                speed: self.wan2_speed.clone(),
                cost: self.wan2_cost.clone(),
                role: self.wan2_role.clone(),
                confirmed: self.wan2_confirmed,
            },
        }
    }

    /// Equality ignoring `last_updated`; drives the write-only-on-change rule.
    pub fn same_content(&self, other: &EnrichedCircuit) -> bool {
        self.network_name == other.network_name
            && self.wan(WanPort::Wan1) == other.wan(WanPort::Wan1)
            && self.wan(WanPort::Wan2) == other.wan(WanPort::Wan2)
    }
}

/// A `provider_mappings` row.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ProviderMapping {
    pub dsr_provider: String,
    pub arin_provider: String,
    pub mapping_type: String,
    pub confidence_score: i32,
}

/// One new enablement found by comparing tracking snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnablementEvent {
    pub date: NaiveDate,
    pub site_id: String,
    pub site_name: String,
    pub circuit_purpose: String,
    pub provider_name: String,
    pub previous_status: String,
    pub current_status: String,
    pub assigned_to: String,
    pub sctask: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(provider: &str, confirmed: bool) -> WanAssignment {
        WanAssignment {
            provider: provider.to_string(),
            speed: "300.0M x 30.0M".to_string(),
            cost: "$0.00".to_string(),
            role: "Primary".to_string(),
            confirmed,
        }
    }

    #[test]
    fn test_same_content_ignores_timestamp() {
        let a = EnrichedCircuit::new(
            "CAL 24".to_string(),
            assignment("Spectrum", true),
            assignment("AT&T", false),
        );
        let mut b = a.clone();
        b.last_updated = a.last_updated - chrono::Duration::days(3);
        assert!(a.same_content(&b));

        b.wan2_confirmed = true;
        assert!(!a.same_content(&b));
    }

    #[test]
    fn test_circuit_purpose_parse() {
        assert_eq!(CircuitPurpose::parse(" secondary "), Some(CircuitPurpose::Secondary));
        assert_eq!(CircuitPurpose::parse("Primary"), Some(CircuitPurpose::Primary));
        assert_eq!(CircuitPurpose::parse("Backup"), None);
    }
}
