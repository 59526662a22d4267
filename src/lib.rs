pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::storage::LocalStorage;
pub use config::AppConfig;
pub use core::{etl::EtlEngine, jobs::JobRegistry};
pub use domain::provider::{MatchOutcome, MatchStatus, ProviderMatcher};
pub use utils::error::{DsrError, Result};
