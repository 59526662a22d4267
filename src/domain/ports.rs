use crate::domain::model::{
    Circuit, EnrichedCircuit, MerakiDevice, ProviderMapping,
};
use crate::domain::tracking::EnablementReport;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Location a relative path resolves to, for log output.
    fn location(&self, path: &str) -> String;
}

/// Reads and writes for the circuit reconciliation tables.
#[async_trait]
pub trait CircuitStore: Send + Sync {
    /// `circuits` rows with status `Enabled` and a provider name.
    async fn enabled_circuits(&self) -> Result<Vec<Circuit>>;
    /// Latest MX device per network.
    async fn mx_devices(&self) -> Result<Vec<MerakiDevice>>;
    async fn enriched_circuits(&self) -> Result<Vec<EnrichedCircuit>>;
    async fn upsert_enriched(&self, rows: &[EnrichedCircuit]) -> Result<usize>;
    async fn provider_mappings(&self) -> Result<Vec<ProviderMapping>>;
    async fn upsert_provider_mapping(&self, mapping: &ProviderMapping) -> Result<()>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn upsert_devices(&self, devices: &[MerakiDevice]) -> Result<usize>;
}

/// Persistent IP → provider cache in front of RDAP.
#[async_trait]
pub trait RdapCache: Send + Sync {
    async fn cached_provider(&self, ip: &str) -> Result<Option<String>>;
    async fn cache_provider(&self, ip: &str, provider: &str) -> Result<()>;
}

#[async_trait]
impl<T: RdapCache + ?Sized> RdapCache for std::sync::Arc<T> {
    async fn cached_provider(&self, ip: &str) -> Result<Option<String>> {
        (**self).cached_provider(ip).await
    }

    async fn cache_provider(&self, ip: &str, provider: &str) -> Result<()> {
        (**self).cache_provider(ip, provider).await
    }
}

#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn all_circuits(&self) -> Result<Vec<Circuit>>;
    async fn insert_circuits(&self, circuits: &[Circuit]) -> Result<usize>;
    /// Updates by record number; rows under manual override are left alone.
    async fn update_circuits(&self, circuits: &[Circuit]) -> Result<usize>;
    async fn record_enablements(&self, report: &EnablementReport) -> Result<()>;
}

/// Extract → transform → load, driven by `core::etl::EtlEngine`.
#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: Send;
    type Transformed: Send;

    fn name(&self) -> &str;
    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Transformed>;
    /// Persists the result and returns a one-line summary (usually the report path).
    async fn load(&self, result: Self::Transformed) -> Result<String>;
}
