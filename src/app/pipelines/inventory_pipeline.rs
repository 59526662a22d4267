use super::ReportOptions;
use crate::adapters::meraki::{Device, MerakiClient, Network, UplinkStatus};
use crate::adapters::rdap::RdapClient;
use crate::adapters::storage::ReportFile;
use crate::domain::model::MerakiDevice;
use crate::domain::ports::{InventoryStore, Pipeline, RdapCache, Storage};
use crate::utils::error::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

pub const INVENTORY_SNAPSHOT: &str = "meraki_inventory.json";

pub struct InventoryInput {
    pub devices: Vec<(Network, Device)>,
    pub uplinks: HashMap<String, UplinkStatus>,
}

/// Refreshes `meraki_inventory` from the Dashboard API and ARIN RDAP.
pub struct InventoryPipeline<I: InventoryStore, R: RdapCache, S: Storage> {
    meraki: MerakiClient,
    rdap: RdapClient<R>,
    store: Arc<I>,
    storage: S,
    org_name: String,
    report: ReportOptions,
}

impl<I: InventoryStore, R: RdapCache, S: Storage> InventoryPipeline<I, R, S> {
    pub fn new(
        meraki: MerakiClient,
        rdap: RdapClient<R>,
        store: Arc<I>,
        storage: S,
        org_name: &str,
    ) -> Self {
        Self {
            meraki,
            rdap,
            store,
            storage,
            org_name: org_name.to_string(),
            report: ReportOptions::default(),
        }
    }

    pub fn with_report_options(mut self, report: ReportOptions) -> Self {
        self.report = report;
        self
    }

    async fn arin_provider(&self, ip: Option<&str>) -> Result<Option<String>> {
        match ip {
            Some(ip) => Ok(Some(self.rdap.provider_for_ip(ip).await?)),
            None => Ok(None),
        }
    }
}

fn is_mx_model(model: &str) -> bool {
    model.trim().to_uppercase().starts_with("MX")
}

#[async_trait::async_trait]
impl<I: InventoryStore, R: RdapCache, S: Storage> Pipeline for InventoryPipeline<I, R, S> {
    type Extracted = InventoryInput;
    type Transformed = Vec<MerakiDevice>;

    fn name(&self) -> &str {
        "meraki-inventory"
    }

    async fn extract(&self) -> Result<InventoryInput> {
        let org_id = self.meraki.organization_id(&self.org_name).await?;
        tracing::info!("🏢 Organization '{}' -> {}", self.org_name, org_id);

        let networks = self.meraki.networks(&org_id).await?;
        tracing::info!("📡 {} networks", networks.len());

        let uplinks: HashMap<String, UplinkStatus> = self
            .meraki
            .uplink_statuses(&org_id)
            .await?
            .into_iter()
            .map(|status| (status.serial.clone(), status))
            .collect();

        let mut devices = Vec::new();
        for network in networks {
            let network_devices = self.meraki.network_devices(&network.id).await?;
            for device in network_devices.into_iter().filter(|d| is_mx_model(&d.model)) {
                devices.push((network.clone(), device));
            }
        }
        tracing::info!("📥 {} MX devices, {} uplink records", devices.len(), uplinks.len());

        Ok(InventoryInput { devices, uplinks })
    }

    async fn transform(&self, data: InventoryInput) -> Result<Vec<MerakiDevice>> {
        let mut rows = Vec::with_capacity(data.devices.len());

        for (network, device) in data.devices {
            let uplink = data.uplinks.get(&device.serial);
            let wan1_ip = uplink.and_then(|u| u.public_ip("wan1"));
            let wan2_ip = uplink.and_then(|u| u.public_ip("wan2"));

            let wan1_arin_provider = self.arin_provider(wan1_ip.as_deref()).await?;
            let wan2_arin_provider = self.arin_provider(wan2_ip.as_deref()).await?;

            rows.push(MerakiDevice {
                device_serial: device.serial,
                network_name: network.name,
                network_id: Some(network.id),
                device_model: device.model,
                device_name: device.name,
                device_tags: device.tags,
                device_notes: device.notes,
                wan1_ip,
                wan1_arin_provider,
                wan2_ip,
                wan2_arin_provider,
                last_updated: Utc::now(),
            });
        }

        tracing::info!("🔄 Resolved providers for {} devices", rows.len());
        Ok(rows)
    }

    async fn load(&self, devices: Vec<MerakiDevice>) -> Result<String> {
        let upserted = self.store.upsert_devices(&devices).await?;
        let snapshot = serde_json::to_vec_pretty(&devices)?;
        let location = self
            .report
            .write(&self.storage, vec![ReportFile::new(INVENTORY_SNAPSHOT, snapshot)])
            .await?;
        Ok(format!("{} devices upserted, snapshot: {}", upserted, location))
    }
}
