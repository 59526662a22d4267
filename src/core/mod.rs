pub mod etl;
pub mod jobs;

pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
pub use etl::EtlEngine;
pub use jobs::{JobId, JobRegistry, JobSnapshot, JobState};
