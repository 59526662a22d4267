//! Background job registry.
//!
//! At most one job is active at a time. Each job moves through
//! `Submitted -> Running -> Completed | Failed` and keeps the lines it
//! produced so callers can poll progress.

use crate::utils::error::{DsrError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

pub type JobId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Running,
    Completed,
    Failed(String),
}

impl JobState {
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Submitted | JobState::Running)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Submitted => write!(f, "submitted"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: JobId,
    pub name: String,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub output_lines: usize,
}

struct JobEntry {
    name: String,
    state: JobState,
    output: Vec<String>,
    submitted_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobEntry {
    fn snapshot(&self, id: JobId) -> JobSnapshot {
        JobSnapshot {
            id,
            name: self.name.clone(),
            state: self.state.clone(),
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            output_lines: self.output.len(),
        }
    }
}

#[derive(Default)]
struct Inner {
    next_id: JobId,
    active: Option<JobId>,
    jobs: HashMap<JobId, JobEntry>,
    handles: HashMap<JobId, JoinHandle<()>>,
}

#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Mutex<Inner>>,
}

/// Handed to a running job so it can append output lines.
#[derive(Clone)]
pub struct JobOutput {
    registry: JobRegistry,
    id: JobId,
}

impl JobOutput {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn line(&self, line: impl Into<String>) {
        let line = line.into();
        let mut inner = self.registry.lock();
        if let Some(job) = inner.jobs.get_mut(&self.id) {
            job.output.push(line);
        }
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // 任務 panic 不影響其他任務的紀錄
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers and starts a job; fails while another job is active.
    pub fn submit<F, Fut>(&self, name: &str, job: F) -> Result<JobId>
    where
        F: FnOnce(JobOutput) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut inner = self.lock();

        if let Some(active_id) = inner.active {
            if let Some(active) = inner.jobs.get(&active_id) {
                if active.state.is_active() {
                    return Err(DsrError::JobAlreadyRunning {
                        running: active.name.clone(),
                    });
                }
            }
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.jobs.insert(
            id,
            JobEntry {
                name: name.to_string(),
                state: JobState::Submitted,
                output: Vec::new(),
                submitted_at: Utc::now(),
                started_at: None,
                finished_at: None,
            },
        );
        inner.active = Some(id);
        tracing::info!("📋 Job {} '{}' submitted", id, name);

        let registry = self.clone();
        let output = JobOutput {
            registry: self.clone(),
            id,
        };
        let handle = tokio::spawn(async move {
            registry.transition(id, JobState::Running);
            // 內層 task 接住 panic，確保 active 一定會被清除
            let run = tokio::spawn(async move { job(output).await });
            let state = match run.await {
                Ok(Ok(())) => JobState::Completed,
                Ok(Err(e)) => {
                    tracing::error!("❌ Job {} failed: {}", id, e);
                    JobState::Failed(e.to_string())
                }
                Err(e) => {
                    tracing::error!("❌ Job {} panicked: {}", id, e);
                    JobState::Failed(format!("job task aborted: {}", e))
                }
            };
            registry.transition(id, state);
        });
        inner.handles.insert(id, handle);

        Ok(id)
    }

    /// Runs an external program as a job, capturing stdout and stderr lines.
    pub fn spawn_command(&self, name: &str, program: &str, args: &[String]) -> Result<JobId> {
        let program = program.to_string();
        let args = args.to_vec();

        self.submit(name, move |output| async move {
            let mut child = Command::new(&program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()?;

            let stdout = child.stdout.take();
            let stderr = child.stderr.take();
            tokio::join!(
                forward_lines(stdout, output.clone(), ""),
                forward_lines(stderr, output.clone(), "[stderr] "),
            );

            let status = child.wait().await?;
            if status.success() {
                Ok(())
            } else {
                Err(DsrError::ProcessingError {
                    message: format!("{} exited with {}", program, status),
                })
            }
        })
    }

    fn transition(&self, id: JobId, state: JobState) {
        let mut inner = self.lock();
        let finished = !state.is_active();
        if let Some(job) = inner.jobs.get_mut(&id) {
            match state {
                JobState::Running => job.started_at = Some(Utc::now()),
                _ if finished => job.finished_at = Some(Utc::now()),
                _ => {}
            }
            tracing::info!("📋 Job {} '{}' -> {}", id, job.name, state);
            job.state = state;
        }
        if finished && inner.active == Some(id) {
            inner.active = None;
        }
    }

    pub fn status(&self, id: JobId) -> Result<JobSnapshot> {
        let inner = self.lock();
        inner
            .jobs
            .get(&id)
            .map(|job| job.snapshot(id))
            .ok_or(DsrError::JobNotFound { id })
    }

    pub fn output(&self, id: JobId) -> Result<Vec<String>> {
        let inner = self.lock();
        inner
            .jobs
            .get(&id)
            .map(|job| job.output.clone())
            .ok_or(DsrError::JobNotFound { id })
    }

    pub fn active(&self) -> Option<JobSnapshot> {
        let inner = self.lock();
        inner
            .active
            .and_then(|id| inner.jobs.get(&id).map(|job| job.snapshot(id)))
    }

    pub fn list(&self) -> Vec<JobSnapshot> {
        let inner = self.lock();
        let mut jobs: Vec<JobSnapshot> = inner
            .jobs
            .iter()
            .map(|(id, job)| job.snapshot(*id))
            .collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    /// Waits for the job to reach a final state.
    pub async fn wait(&self, id: JobId) -> Result<JobSnapshot> {
        let handle = {
            let mut inner = self.lock();
            if !inner.jobs.contains_key(&id) {
                return Err(DsrError::JobNotFound { id });
            }
            inner.handles.remove(&id)
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                self.transition(id, JobState::Failed(format!("job task aborted: {}", e)));
            }
        }

        self.status(id)
    }
}

async fn forward_lines<R>(reader: Option<R>, output: JobOutput, prefix: &str)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::debug!("📜 job {}: {}{}", output.id(), prefix, line);
                output.line(format!("{}{}", prefix, line));
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("⚠️ job {}: output stream error: {}", output.id(), e);
                break;
            }
        }
    }
}
