use crate::domain::ports::RdapCache;
use crate::domain::rdap::{
    classify_ip, parse_arin_response, IpClass, PRIVATE_IP_PROVIDER, UNKNOWN_PROVIDER,
    VERIZON_BUSINESS,
};
use crate::utils::error::Result;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// ARIN RDAP lookups with a persistent cache in front.
pub struct RdapClient<C: RdapCache> {
    client: Client,
    base_url: String,
    cache: C,
    static_ips: HashMap<String, String>,
}

impl<C: RdapCache> RdapClient<C> {
    pub fn new(base_url: &str, cache: C, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
            static_ips: HashMap::new(),
        })
    }

    /// Known IPs whose owner RDAP reports wrongly (e.g. reseller blocks).
    pub fn with_static_ips(mut self, static_ips: HashMap<String, String>) -> Self {
        self.static_ips = static_ips;
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub async fn provider_for_ip(&self, ip: &str) -> Result<String> {
        let ip = ip.trim();

        if let Some(cached) = self.cache.cached_provider(ip).await? {
            tracing::debug!("💾 RDAP cache hit for {}: {}", ip, cached);
            return Ok(cached);
        }

        let public = match classify_ip(ip) {
            IpClass::Invalid => return Ok(UNKNOWN_PROVIDER.to_string()),
            IpClass::VerizonBusiness => return Ok(VERIZON_BUSINESS.to_string()),
            IpClass::Private => None,
            IpClass::Public(addr) => Some(addr),
        };

        if let Some(provider) = self.static_ips.get(ip) {
            return Ok(provider.clone());
        }
        let Some(addr) = public else {
            return Ok(PRIVATE_IP_PROVIDER.to_string());
        };

        let url = format!("{}/{}", self.base_url, addr);
        let provider = match self.fetch(&url).await {
            Ok(rdap) => parse_arin_response(&rdap),
            Err(e) => {
                // 查詢失敗不寫入快取，下次重試
                tracing::warn!("⚠️ RDAP lookup failed for {}: {}", ip, e);
                return Ok(UNKNOWN_PROVIDER.to_string());
            }
        };

        self.cache.cache_provider(ip, &provider).await?;
        tracing::debug!("🔎 RDAP {} -> {}", ip, provider);
        Ok(provider)
    }

    async fn fetch(&self, url: &str) -> Result<serde_json::Value> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}
