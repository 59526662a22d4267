#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub cpu_percent: f32,
    pub rss_mb: u64,
    pub peak_rss_mb: u64,
    /// Time since the previous sample.
    pub phase_time: Duration,
    pub total_time: Duration,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    peak_rss_mb: u64,
    last_sample: Instant,
}

/// Samples this process between pipeline phases (extract / transform / load).
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    state: Option<Mutex<MonitorState>>,
    pid: Option<Pid>,
    started: Instant,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if enabled && pid.is_none() {
            tracing::warn!("⚠️ Could not determine current PID, monitoring disabled");
        }

        let started = Instant::now();
        let state = (enabled && pid.is_some()).then(|| {
            Mutex::new(MonitorState {
                system: System::new_with_specifics(
                    RefreshKind::nothing().with_processes(ProcessRefreshKind::everything()),
                ),
                peak_rss_mb: 0,
                last_sample: started,
            })
        });

        Self {
            state,
            pid,
            started,
        }
    }

    pub fn sample(&self, phase: &str) -> Option<PhaseStats> {
        let pid = self.pid?;
        let mut state = self.state.as_ref()?.lock().ok()?;

        state
            .system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let (rss_mb, cpu_percent) = {
            let process = state.system.process(pid)?;
            (process.memory() / 1024 / 1024, process.cpu_usage())
        };
        state.peak_rss_mb = state.peak_rss_mb.max(rss_mb);

        let now = Instant::now();
        let phase_time = now.duration_since(state.last_sample);
        state.last_sample = now;

        Some(PhaseStats {
            phase: phase.to_string(),
            cpu_percent,
            rss_mb,
            peak_rss_mb: state.peak_rss_mb,
            phase_time,
            total_time: now.duration_since(self.started),
        })
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(stats) = self.sample(phase) {
            tracing::info!(
                "📊 {} took {:?} - CPU: {:.1}%, RSS: {}MB (peak {}MB)",
                stats.phase,
                stats.phase_time,
                stats.cpu_percent,
                stats.rss_mb,
                stats.peak_rss_mb
            );
        }
    }

    pub fn log_final_stats(&self) {
        if let Some(stats) = self.sample("final") {
            tracing::info!(
                "📊 Run finished in {:?}, peak RSS {}MB",
                stats.total_time,
                stats.peak_rss_mb
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 非 CLI 建置沒有 sysinfo
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _phase: &str) {}

    pub fn log_final_stats(&self) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}
