use crate::adapters::meraki::RetryPolicy;
use crate::domain::enrichment::EnrichmentSettings;
use crate::domain::provider::{AliasTable, MatcherSettings, SecondaryConflictRule};
use crate::utils::error::{DsrError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "dsr-circuits.toml";

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub meraki: MerakiConfig,
    #[serde(default)]
    pub arin: ArinConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub enrichment: EnrichmentSettings,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MerakiConfig {
    pub base_url: String,
    pub api_key: String,
    pub org_name: String,
    pub per_page: usize,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub request_interval_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for MerakiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.meraki.com/api/v1".to_string(),
            api_key: String::new(),
            org_name: String::new(),
            per_page: 1000,
            max_retries: 5,
            backoff_base_ms: 1000,
            request_interval_ms: 1000,
            timeout_seconds: 30,
        }
    }
}

impl MerakiConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            min_interval: Duration::from_millis(self.request_interval_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArinConfig {
    pub rdap_url: String,
    pub timeout_seconds: u64,
    /// IP → provider overrides for blocks RDAP attributes to the wrong owner.
    pub static_ips: HashMap<String, String>,
}

impl Default for ArinConfig {
    fn default() -> Self {
        Self {
            rdap_url: "https://rdap.arin.net/registry/ip".to_string(),
            timeout_seconds: 10,
            static_ips: HashMap::new(),
        }
    }
}

impl ArinConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub match_threshold: u8,
    pub possible_threshold: u8,
    /// Extra aliases on top of the built-in table.
    pub aliases: HashMap<String, String>,
    pub secondary_conflicts: Vec<SecondaryConflictRule>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        let defaults = MatcherSettings::default();
        Self {
            match_threshold: defaults.match_threshold,
            possible_threshold: defaults.possible_threshold,
            aliases: HashMap::new(),
            secondary_conflicts: defaults.secondary_conflicts,
        }
    }
}

impl MatchingConfig {
    pub fn matcher_settings(&self) -> MatcherSettings {
        MatcherSettings {
            match_threshold: self.match_threshold,
            possible_threshold: self.possible_threshold,
            secondary_conflicts: self.secondary_conflicts.clone(),
        }
    }

    pub fn alias_table(&self) -> AliasTable {
        let mut table = AliasTable::with_defaults();
        table.extend(&self.aliases);
        table
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Daily tracking export; the nightly run imports it when set.
    pub csv_path: Option<String>,
    /// Yesterday's export, for enablement detection.
    pub previous_csv_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub compress: bool,
    pub bundle_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
            compress: false,
            bundle_name: "dsr_circuits_reports.zip".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

fn default_max_connections() -> u32 {
    5
}

fn default_migrations_dir() -> String {
    "migrations".to_string()
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| DsrError::ConfigError {
            message: format!("Cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// Like `from_file`, but a missing file is `Ok(None)`.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        if !path.as_ref().exists() {
            return Ok(None);
        }
        Self::from_file(path).map(Some)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| DsrError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Checks only what the inventory refresh needs on top of `validate`.
    pub fn validate_meraki(&self) -> Result<()> {
        if self.meraki.api_key.trim().is_empty() || self.meraki.api_key.contains("${") {
            return Err(DsrError::MissingConfigError {
                field: "meraki.api_key".to_string(),
            });
        }
        validation::validate_non_empty_string("meraki.org_name", &self.meraki.org_name)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }
}

/// 替換環境變數 (例如 ${MERAKI_API_KEY})；未設定的保留原樣
pub fn substitute_env_vars(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_database_url("database.url", &self.database.url)?;
        validation::validate_positive_number(
            "database.max_connections",
            self.database.max_connections as usize,
            1,
        )?;

        validation::validate_url("meraki.base_url", &self.meraki.base_url)?;
        // Meraki 分頁上限 1000
        validation::validate_range("meraki.per_page", self.meraki.per_page, 3, 1000)?;
        validation::validate_positive_number(
            "meraki.max_retries",
            self.meraki.max_retries as usize,
            1,
        )?;

        validation::validate_url("arin.rdap_url", &self.arin.rdap_url)?;

        validation::validate_range("matching.match_threshold", self.matching.match_threshold, 1, 100)?;
        validation::validate_range(
            "matching.possible_threshold",
            self.matching.possible_threshold,
            1,
            self.matching.match_threshold,
        )?;
        for rule in &self.matching.secondary_conflicts {
            validation::validate_non_empty_string(
                "matching.secondary_conflicts.dsr_keyword",
                &rule.dsr_keyword,
            )?;
        }

        validation::validate_range(
            "enrichment.notes_match_threshold",
            self.enrichment.notes_match_threshold,
            1,
            100,
        )?;

        let csv_files: Vec<String> = self
            .tracking
            .csv_path
            .iter()
            .chain(self.tracking.previous_csv_path.iter())
            .cloned()
            .collect();
        validation::validate_file_extensions("tracking.csv_path", &csv_files, &["csv"])?;

        validation::validate_path("output.path", &self.output.path)?;
        if self.output.compress {
            validation::validate_file_extensions(
                "output.bundle_name",
                std::slice::from_ref(&self.output.bundle_name),
                &["zip"],
            )?;
        }

        Ok(())
    }
}
