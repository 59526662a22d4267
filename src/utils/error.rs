use thiserror::Error;

#[derive(Error, Debug)]
pub enum DsrError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP {status} from {url}")]
    HttpStatusError { status: u16, url: String },

    #[error("Rate limited by {url} after {attempts} attempts")]
    RateLimitError { url: String, attempts: u32 },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Stage '{stage}' failed: {details}")]
    TransformationError { stage: String, details: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Job '{running}' is still running")]
    JobAlreadyRunning { running: String },

    #[error("Unknown job id {id}")]
    JobNotFound { id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Database,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DsrError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DsrError::ApiError(_)
            | DsrError::HttpStatusError { .. }
            | DsrError::RateLimitError { .. } => ErrorCategory::Network,
            DsrError::DatabaseError(_) | DsrError::MigrationError(_) => ErrorCategory::Database,
            DsrError::CsvError(_)
            | DsrError::SerializationError(_)
            | DsrError::ProcessingError { .. }
            | DsrError::TransformationError { .. }
            | DsrError::ValidationError { .. } => ErrorCategory::Data,
            DsrError::ConfigError { .. }
            | DsrError::ConfigValidationError { .. }
            | DsrError::InvalidConfigValueError { .. }
            | DsrError::MissingConfigError { .. } => ErrorCategory::Configuration,
            DsrError::ZipError(_)
            | DsrError::IoError(_)
            | DsrError::JobAlreadyRunning { .. }
            | DsrError::JobNotFound { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DsrError::JobAlreadyRunning { .. } => ErrorSeverity::Low,
            DsrError::ApiError(_)
            | DsrError::HttpStatusError { .. }
            | DsrError::RateLimitError { .. } => ErrorSeverity::Medium,
            DsrError::MigrationError(_) | DsrError::IoError(_) | DsrError::ZipError(_) => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    /// 429 與連線錯誤可以重試，其餘直接失敗
    pub fn is_retryable(&self) -> bool {
        match self {
            DsrError::RateLimitError { .. } => true,
            DsrError::HttpStatusError { status, .. } => *status == 429 || *status >= 500,
            DsrError::ApiError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check network access to the Meraki/ARIN endpoints and the API key, then rerun"
            }
            ErrorCategory::Database => {
                "Check database.url and that migrations were applied (dsr-circuits migrate)"
            }
            ErrorCategory::Data => "Inspect the offending input record; other rows were not affected",
            ErrorCategory::Configuration => "Fix the configuration file and rerun",
            ErrorCategory::System => "Check file permissions and free disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DsrError::MissingConfigError { field } => {
                format!("Configuration value '{}' is required", field)
            }
            DsrError::RateLimitError { url, .. } => {
                format!("The API kept rate limiting requests to {}", url)
            }
            DsrError::JobAlreadyRunning { running } => {
                format!("Another job ('{}') is already running", running)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DsrError>;
