//! Read-only Meraki Dashboard API client.

use crate::utils::error::{DsrError, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const API_KEY_HEADER: &str = "X-Cisco-Meraki-API-Key";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay for the first retry; doubles on every attempt.
    pub backoff_base: Duration,
    /// Minimum spacing between two requests.
    pub min_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base: Duration::from_secs(1),
            min_interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub serial: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub network_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Uplink {
    pub interface: String,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkStatus {
    pub serial: String,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub uplinks: Vec<Uplink>,
}

impl UplinkStatus {
    /// Public IP of `wan1`/`wan2`, falling back to the interface address.
    pub fn public_ip(&self, interface: &str) -> Option<String> {
        self.uplinks
            .iter()
            .find(|u| u.interface.eq_ignore_ascii_case(interface))
            .and_then(|u| u.public_ip.clone().or_else(|| u.ip.clone()))
            .filter(|ip| !ip.trim().is_empty())
    }
}

pub struct MerakiClient {
    client: Client,
    base_url: String,
    api_key: String,
    per_page: usize,
    retry: RetryPolicy,
    last_request: Mutex<Option<Instant>>,
}

impl MerakiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        per_page: usize,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            per_page: per_page.max(1),
            retry,
            last_request: Mutex::new(None),
        })
    }

    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.retry.min_interval {
                tokio::time::sleep(self.retry.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// GET with 429/transient retry and exponential backoff.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let attempts = self.retry.max_retries.max(1);

        for attempt in 0..attempts {
            self.pace().await;
            tracing::debug!("🌐 GET {} (attempt {}/{})", url, attempt + 1, attempts);

            let response = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .query(query)
                .send()
                .await;

            let last_attempt = attempt + 1 == attempts;
            match response {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if last_attempt {
                        break;
                    }
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!("⏳ Rate limited by Meraki, backing off for {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Ok(resp) if resp.status().is_server_error() && !last_attempt => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!("⚠️ {} from {}, retrying in {:?}", resp.status(), url, delay);
                    tokio::time::sleep(delay).await;
                }
                Ok(resp) if !resp.status().is_success() => {
                    return Err(DsrError::HttpStatusError {
                        status: resp.status().as_u16(),
                        url,
                    });
                }
                Ok(resp) => return Ok(resp.json::<T>().await?),
                Err(e) if (e.is_timeout() || e.is_connect()) && !last_attempt => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!("⚠️ Request to {} failed: {}, retrying in {:?}", url, e, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(DsrError::RateLimitError { url, attempts })
    }

    /// Follows `perPage`/`startingAfter` pagination until a short page.
    async fn get_paginated<T, F>(&self, path: &str, cursor_of: F) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> Option<String>,
    {
        let mut all = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut query = vec![("perPage", self.per_page.to_string())];
            if let Some(cursor) = &starting_after {
                query.push(("startingAfter", cursor.clone()));
            }

            let page: Vec<T> = self.get_json(path, &query).await?;
            let page_len = page.len();
            let next = page.last().and_then(&cursor_of);
            all.extend(page);
            tracing::debug!("📄 {}: fetched {} items, {} total", path, page_len, all.len());

            if page_len < self.per_page {
                break;
            }
            match next {
                Some(cursor) if Some(&cursor) != starting_after.as_ref() => {
                    starting_after = Some(cursor);
                }
                _ => break,
            }
        }

        Ok(all)
    }

    pub async fn organization_id(&self, org_name: &str) -> Result<String> {
        let orgs: Vec<Organization> = self.get_json("/organizations", &[]).await?;
        orgs.into_iter()
            .find(|org| org.name == org_name)
            .map(|org| org.id)
            .ok_or_else(|| DsrError::ConfigValidationError {
                field: "meraki.org_name".to_string(),
                message: format!("Organization '{}' not found", org_name),
            })
    }

    pub async fn networks(&self, org_id: &str) -> Result<Vec<Network>> {
        self.get_paginated(&format!("/organizations/{}/networks", org_id), |n: &Network| {
            Some(n.id.clone())
        })
        .await
    }

    pub async fn network_devices(&self, network_id: &str) -> Result<Vec<Device>> {
        self.get_json(&format!("/networks/{}/devices", network_id), &[])
            .await
    }

    pub async fn uplink_statuses(&self, org_id: &str) -> Result<Vec<UplinkStatus>> {
        self.get_paginated(
            &format!("/organizations/{}/appliance/uplink/statuses", org_id),
            |s: &UplinkStatus| Some(s.serial.clone()),
        )
        .await
    }
}
