//! PostgreSQL implementation of the store ports.

use crate::domain::model::{Circuit, EnrichedCircuit, MerakiDevice, ProviderMapping};
use crate::domain::ports::{CircuitStore, InventoryStore, RdapCache, TrackingStore};
use crate::domain::tracking::EnablementReport;
use crate::utils::error::Result;
use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;

const CIRCUIT_COLUMNS: &str = "record_number, site_name, site_id, circuit_purpose, status, \
     provider_name, details_ordered_service_speed, billing_monthly_cost, ip_address_start, \
     manual_override";

const DEVICE_COLUMNS: &str = "device_serial, network_name, network_id, device_model, device_name, \
     device_tags, device_notes, wan1_ip, wan1_arin_provider, wan2_ip, wan2_arin_provider, \
     last_updated";

const ENRICHED_COLUMNS: &str = "network_name, wan1_provider, wan1_speed, wan1_cost, wan1_role, \
     wan1_confirmed, wan2_provider, wan2_speed, wan2_cost, wan2_role, wan2_confirmed, \
     last_updated";

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Applies the SQL files under `migrations_dir`.
pub async fn run_migrations(pool: &PgPool, migrations_dir: &str) -> Result<()> {
    let migrator = Migrator::new(Path::new(migrations_dir)).await?;
    migrator.run(pool).await?;
    Ok(())
}

fn count_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CircuitStore for PgStore {
    async fn enabled_circuits(&self) -> Result<Vec<Circuit>> {
        let query = format!(
            "SELECT {CIRCUIT_COLUMNS} FROM circuits \
             WHERE status = 'Enabled' AND provider_name IS NOT NULL AND provider_name <> '' \
             ORDER BY site_name, circuit_purpose"
        );
        let rows = sqlx::query_as::<_, Circuit>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn mx_devices(&self) -> Result<Vec<MerakiDevice>> {
        let query = format!(
            "SELECT DISTINCT ON (network_name) {DEVICE_COLUMNS} FROM meraki_inventory \
             WHERE device_model LIKE 'MX%' \
             ORDER BY network_name, last_updated DESC"
        );
        let rows = sqlx::query_as::<_, MerakiDevice>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn enriched_circuits(&self) -> Result<Vec<EnrichedCircuit>> {
        let query = format!("SELECT {ENRICHED_COLUMNS} FROM enriched_circuits ORDER BY network_name");
        let rows = sqlx::query_as::<_, EnrichedCircuit>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn upsert_enriched(&self, rows: &[EnrichedCircuit]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let query = format!(
            "INSERT INTO enriched_circuits ({ENRICHED_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (network_name) DO UPDATE SET \
                wan1_provider = EXCLUDED.wan1_provider, \
                wan1_speed = EXCLUDED.wan1_speed, \
                wan1_cost = EXCLUDED.wan1_cost, \
                wan1_role = EXCLUDED.wan1_role, \
                wan1_confirmed = EXCLUDED.wan1_confirmed, \
                wan2_provider = EXCLUDED.wan2_provider, \
                wan2_speed = EXCLUDED.wan2_speed, \
                wan2_cost = EXCLUDED.wan2_cost, \
                wan2_role = EXCLUDED.wan2_role, \
                wan2_confirmed = EXCLUDED.wan2_confirmed, \
                last_updated = EXCLUDED.last_updated"
        );

        for row in rows {
            sqlx::query(&query)
                .bind(&row.network_name)
                .bind(&row.wan1_provider)
                .bind(&row.wan1_speed)
                .bind(&row.wan1_cost)
                .bind(&row.wan1_role)
                .bind(row.wan1_confirmed)
                .bind(&row.wan2_provider)
                .bind(&row.wan2_speed)
                .bind(&row.wan2_cost)
                .bind(&row.wan2_role)
                .bind(row.wan2_confirmed)
                .bind(row.last_updated)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(rows.len())
    }

    async fn provider_mappings(&self) -> Result<Vec<ProviderMapping>> {
        let rows = sqlx::query_as::<_, ProviderMapping>(
            "SELECT dsr_provider, arin_provider, mapping_type, confidence_score \
             FROM provider_mappings ORDER BY confidence_score DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_provider_mapping(&self, mapping: &ProviderMapping) -> Result<()> {
        sqlx::query(
            "INSERT INTO provider_mappings (dsr_provider, arin_provider, mapping_type, confidence_score) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (dsr_provider, arin_provider) DO UPDATE SET \
                mapping_type = EXCLUDED.mapping_type, \
                confidence_score = EXCLUDED.confidence_score",
        )
        .bind(&mapping.dsr_provider)
        .bind(&mapping.arin_provider)
        .bind(&mapping.mapping_type)
        .bind(mapping.confidence_score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn upsert_devices(&self, devices: &[MerakiDevice]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let query = format!(
            "INSERT INTO meraki_inventory ({DEVICE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (device_serial) DO UPDATE SET \
                network_name = EXCLUDED.network_name, \
                network_id = EXCLUDED.network_id, \
                device_model = EXCLUDED.device_model, \
                device_name = EXCLUDED.device_name, \
                device_tags = EXCLUDED.device_tags, \
                device_notes = EXCLUDED.device_notes, \
                wan1_ip = EXCLUDED.wan1_ip, \
                wan1_arin_provider = EXCLUDED.wan1_arin_provider, \
                wan2_ip = EXCLUDED.wan2_ip, \
                wan2_arin_provider = EXCLUDED.wan2_arin_provider, \
                last_updated = EXCLUDED.last_updated"
        );

        for device in devices {
            sqlx::query(&query)
                .bind(&device.device_serial)
                .bind(&device.network_name)
                .bind(&device.network_id)
                .bind(&device.device_model)
                .bind(&device.device_name)
                .bind(&device.device_tags)
                .bind(&device.device_notes)
                .bind(&device.wan1_ip)
                .bind(&device.wan1_arin_provider)
                .bind(&device.wan2_ip)
                .bind(&device.wan2_arin_provider)
                .bind(device.last_updated)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(devices.len())
    }
}

#[async_trait]
impl RdapCache for PgStore {
    async fn cached_provider(&self, ip: &str) -> Result<Option<String>> {
        let provider: Option<String> =
            sqlx::query_scalar("SELECT provider_name FROM rdap_cache WHERE ip_address = $1")
                .bind(ip)
                .fetch_optional(&self.pool)
                .await?;
        Ok(provider)
    }

    async fn cache_provider(&self, ip: &str, provider: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO rdap_cache (ip_address, provider_name, last_queried) VALUES ($1, $2, NOW()) \
             ON CONFLICT (ip_address) DO UPDATE SET \
                provider_name = EXCLUDED.provider_name, last_queried = NOW()",
        )
        .bind(ip)
        .bind(provider)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TrackingStore for PgStore {
    async fn all_circuits(&self) -> Result<Vec<Circuit>> {
        let query = format!("SELECT {CIRCUIT_COLUMNS} FROM circuits WHERE record_number IS NOT NULL");
        let rows = sqlx::query_as::<_, Circuit>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn insert_circuits(&self, circuits: &[Circuit]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for circuit in circuits {
            let result = sqlx::query(
                "INSERT INTO circuits (record_number, site_name, site_id, circuit_purpose, status, \
                    provider_name, details_ordered_service_speed, billing_monthly_cost, ip_address_start) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (record_number) DO NOTHING",
            )
            .bind(&circuit.record_number)
            .bind(&circuit.site_name)
            .bind(&circuit.site_id)
            .bind(&circuit.circuit_purpose)
            .bind(&circuit.status)
            .bind(&circuit.provider_name)
            .bind(&circuit.details_ordered_service_speed)
            .bind(circuit.billing_monthly_cost)
            .bind(&circuit.ip_address_start)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn update_circuits(&self, circuits: &[Circuit]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for circuit in circuits {
            let result = sqlx::query(
                "UPDATE circuits SET site_name = $2, site_id = $3, circuit_purpose = $4, status = $5, \
                    provider_name = $6, details_ordered_service_speed = $7, billing_monthly_cost = $8, \
                    ip_address_start = $9, updated_at = NOW() \
                 WHERE record_number = $1 AND manual_override IS NOT TRUE",
            )
            .bind(&circuit.record_number)
            .bind(&circuit.site_name)
            .bind(&circuit.site_id)
            .bind(&circuit.circuit_purpose)
            .bind(&circuit.status)
            .bind(&circuit.provider_name)
            .bind(&circuit.details_ordered_service_speed)
            .bind(circuit.billing_monthly_cost)
            .bind(&circuit.ip_address_start)
            .execute(&mut *tx)
            .await?;
            updated += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn record_enablements(&self, report: &EnablementReport) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO ready_queue_daily (summary_date, ready_count, created_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (summary_date) DO UPDATE SET ready_count = EXCLUDED.ready_count, created_at = NOW()",
        )
        .bind(report.date)
        .bind(count_i32(report.ready_count))
        .execute(&mut *tx)
        .await?;

        for event in &report.new_enablements {
            sqlx::query(
                "INSERT INTO daily_enablements (date, site_id, site_name, circuit_purpose, provider_name, \
                    previous_status, current_status, assigned_to, sctask) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (date, site_id) DO UPDATE SET \
                    current_status = EXCLUDED.current_status, \
                    assigned_to = EXCLUDED.assigned_to, \
                    sctask = EXCLUDED.sctask",
            )
            .bind(event.date)
            .bind(&event.site_id)
            .bind(&event.site_name)
            .bind(&event.circuit_purpose)
            .bind(&event.provider_name)
            .bind(&event.previous_status)
            .bind(&event.current_status)
            .bind(&event.assigned_to)
            .bind(&event.sctask)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO enablement_summary (summary_date, daily_count, created_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (summary_date) DO UPDATE SET daily_count = EXCLUDED.daily_count, created_at = NOW()",
        )
        .bind(report.date)
        .bind(count_i32(report.new_enablements.len()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
