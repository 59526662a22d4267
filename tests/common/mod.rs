#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use dsr_circuits::domain::model::{Circuit, EnrichedCircuit, MerakiDevice, ProviderMapping};
use dsr_circuits::domain::ports::{CircuitStore, InventoryStore, RdapCache, TrackingStore};
use dsr_circuits::domain::tracking::EnablementReport;
use dsr_circuits::Result;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory stand-in for the Postgres store.
#[derive(Default)]
pub struct InMemoryStore {
    pub circuits: Mutex<Vec<Circuit>>,
    pub devices: Mutex<Vec<MerakiDevice>>,
    pub enriched: Mutex<Vec<EnrichedCircuit>>,
    pub mappings: Mutex<Vec<ProviderMapping>>,
    pub rdap: Mutex<HashMap<String, String>>,
    pub enablement_reports: Mutex<Vec<EnablementReport>>,
    pub enriched_writes: Mutex<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_circuits(self, circuits: Vec<Circuit>) -> Self {
        *self.circuits.lock().unwrap() = circuits;
        self
    }

    pub fn with_devices(self, devices: Vec<MerakiDevice>) -> Self {
        *self.devices.lock().unwrap() = devices;
        self
    }

    pub fn with_mappings(self, mappings: Vec<ProviderMapping>) -> Self {
        *self.mappings.lock().unwrap() = mappings;
        self
    }

    pub fn enriched_row(&self, network_name: &str) -> Option<EnrichedCircuit> {
        self.enriched
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.network_name == network_name)
            .cloned()
    }

    pub fn circuit(&self, record_number: &str) -> Option<Circuit> {
        self.circuits
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.record_number.as_deref() == Some(record_number))
            .cloned()
    }
}

#[async_trait]
impl CircuitStore for InMemoryStore {
    async fn enabled_circuits(&self) -> Result<Vec<Circuit>> {
        Ok(self
            .circuits
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_enabled() && !c.provider().is_empty())
            .cloned()
            .collect())
    }

    async fn mx_devices(&self) -> Result<Vec<MerakiDevice>> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.is_mx())
            .cloned()
            .collect())
    }

    async fn enriched_circuits(&self) -> Result<Vec<EnrichedCircuit>> {
        Ok(self.enriched.lock().unwrap().clone())
    }

    async fn upsert_enriched(&self, rows: &[EnrichedCircuit]) -> Result<usize> {
        let mut enriched = self.enriched.lock().unwrap();
        for row in rows {
            enriched.retain(|r| r.network_name != row.network_name);
            enriched.push(row.clone());
        }
        *self.enriched_writes.lock().unwrap() += rows.len();
        Ok(rows.len())
    }

    async fn provider_mappings(&self) -> Result<Vec<ProviderMapping>> {
        Ok(self.mappings.lock().unwrap().clone())
    }

    async fn upsert_provider_mapping(&self, mapping: &ProviderMapping) -> Result<()> {
        let mut mappings = self.mappings.lock().unwrap();
        mappings.retain(|m| {
            !(m.dsr_provider == mapping.dsr_provider && m.arin_provider == mapping.arin_provider)
        });
        mappings.push(mapping.clone());
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn upsert_devices(&self, devices: &[MerakiDevice]) -> Result<usize> {
        let mut stored = self.devices.lock().unwrap();
        for device in devices {
            stored.retain(|d| d.device_serial != device.device_serial);
            stored.push(device.clone());
        }
        Ok(devices.len())
    }
}

#[async_trait]
impl RdapCache for InMemoryStore {
    async fn cached_provider(&self, ip: &str) -> Result<Option<String>> {
        Ok(self.rdap.lock().unwrap().get(ip).cloned())
    }

    async fn cache_provider(&self, ip: &str, provider: &str) -> Result<()> {
        self.rdap
            .lock()
            .unwrap()
            .insert(ip.to_string(), provider.to_string());
        Ok(())
    }
}

#[async_trait]
impl TrackingStore for InMemoryStore {
    async fn all_circuits(&self) -> Result<Vec<Circuit>> {
        Ok(self
            .circuits
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.record_number.is_some())
            .cloned()
            .collect())
    }

    async fn insert_circuits(&self, circuits: &[Circuit]) -> Result<usize> {
        self.circuits.lock().unwrap().extend(circuits.iter().cloned());
        Ok(circuits.len())
    }

    async fn update_circuits(&self, circuits: &[Circuit]) -> Result<usize> {
        let mut stored = self.circuits.lock().unwrap();
        let mut updated = 0;
        for incoming in circuits {
            if let Some(existing) = stored
                .iter_mut()
                .find(|c| c.record_number == incoming.record_number && !c.manual_override)
            {
                *existing = incoming.clone();
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn record_enablements(&self, report: &EnablementReport) -> Result<()> {
        self.enablement_reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

pub fn circuit(site: &str, purpose: &str, provider: &str, ip: Option<&str>) -> Circuit {
    Circuit {
        record_number: Some(format!("DISC{}-{}", site.replace(' ', ""), purpose)),
        site_name: site.to_string(),
        site_id: Some(site.replace(' ', "")),
        circuit_purpose: Some(purpose.to_string()),
        status: Some("Enabled".to_string()),
        provider_name: Some(provider.to_string()),
        details_ordered_service_speed: Some("300.0M x 30.0M".to_string()),
        billing_monthly_cost: Some(125.5),
        ip_address_start: ip.map(str::to_string),
        manual_override: false,
    }
}

pub fn mx_device(network: &str, notes: &str) -> MerakiDevice {
    MerakiDevice {
        device_serial: format!("Q2XX-{}", network.replace(' ', "")),
        network_name: network.to_string(),
        network_id: Some(format!("L_{}", network.replace(' ', ""))),
        device_model: "MX68".to_string(),
        device_name: Some(format!("{} MX", network)),
        device_tags: Vec::new(),
        device_notes: Some(notes.to_string()),
        wan1_ip: None,
        wan1_arin_provider: None,
        wan2_ip: None,
        wan2_arin_provider: None,
        last_updated: Utc::now(),
    }
}

pub fn with_wan1(mut device: MerakiDevice, ip: &str, arin: &str) -> MerakiDevice {
    device.wan1_ip = Some(ip.to_string());
    device.wan1_arin_provider = Some(arin.to_string());
    device
}

pub fn with_wan2(mut device: MerakiDevice, ip: &str, arin: &str) -> MerakiDevice {
    device.wan2_ip = Some(ip.to_string());
    device.wan2_arin_provider = Some(arin.to_string());
    device
}
