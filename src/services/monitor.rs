//! Operation timing and resource instrumentation.
//!
//! Every pipeline stage runs inside [`PerformanceMonitor::measure`] (or its
//! sync twin). A [`MeasureGuard`] records the operation when it is dropped,
//! so early returns, panics and cancelled futures all leave a record behind.

use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::models::DEFAULT_MAX_HISTORY;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = BYTES_PER_MB * 1024.0;

/// Number of failures reported in [`MetricsSummary::recent_errors`].
pub const RECENT_ERROR_LIMIT: usize = 5;

/// One measured operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: f64,
    /// Resident memory change of the process over the operation
    pub memory_delta_mb: f64,
    /// Process CPU usage sampled when the operation finished
    pub cpu_percent: f32,
    pub success: bool,
    pub error: Option<String>,
}

/// A failure listed in a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub operation: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate over the recorded history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub operation: Option<String>,
    pub total_operations: usize,
    /// Percentage of successful operations (0-100)
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub avg_memory_delta_mb: f64,
    pub max_memory_delta_mb: f64,
    pub recent_errors: Vec<ErrorRecord>,
}

/// Host resource snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub cpu_percent: f32,
    pub memory_percent: f64,
    pub memory_available_gb: f64,
    pub disk_usage_percent: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct MetricsExport<'a> {
    exported_at: DateTime<Utc>,
    max_history: usize,
    summary: Option<MetricsSummary>,
    records: &'a [OperationRecord],
}

/// Bounded in-memory history of measured operations.
pub struct PerformanceMonitor {
    history: Mutex<VecDeque<OperationRecord>>,
    max_history: usize,
    system: Mutex<System>,
    pid: Pid,
}

impl PerformanceMonitor {
    /// Create a monitor keeping at most `max_history` records.
    pub fn new(max_history: usize) -> Self {
        let max_history = max_history.max(1);
        Self {
            history: Mutex::new(VecDeque::with_capacity(max_history)),
            max_history,
            system: Mutex::new(System::new()),
            pid: Pid::from_u32(std::process::id()),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Start measuring `operation`. The record is written when the guard drops.
    pub fn start(&self, operation: impl Into<String>) -> MeasureGuard<'_> {
        let (start_rss, _) = self.sample_process();
        MeasureGuard {
            monitor: self,
            operation: operation.into(),
            started_at: Utc::now(),
            start: Instant::now(),
            start_rss,
            outcome: None,
        }
    }

    /// Measure an async operation. Its result is returned unchanged.
    pub async fn measure<T, E, F>(&self, operation: &str, future: F) -> Result<T, E>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        let mut guard = self.start(operation);
        let result = future.await;
        match &result {
            Ok(_) => guard.succeed(),
            Err(e) => guard.fail(e.to_string()),
        }
        result
    }

    /// Measure a blocking operation. Its result is returned unchanged.
    pub fn measure_sync<T, E, F>(&self, operation: &str, f: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        let mut guard = self.start(operation);
        let result = f();
        match &result {
            Ok(_) => guard.succeed(),
            Err(e) => guard.fail(e.to_string()),
        }
        result
    }

    fn record(&self, record: OperationRecord) {
        if !record.success {
            tracing::debug!(
                operation = %record.operation,
                error = record.error.as_deref().unwrap_or(""),
                "operation failed"
            );
        }
        let mut history = self.history.lock();
        while history.len() >= self.max_history {
            history.pop_front();
        }
        history.push_back(record);
    }

    /// Resident memory (bytes) and CPU usage (%) of this process.
    fn sample_process(&self) -> (u64, f32) {
        let mut sys = self.system.lock();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        sys.process(self.pid)
            .map(|process| (process.memory(), process.cpu_usage()))
            .unwrap_or((0, 0.0))
    }

    /// Summarize the history, optionally restricted to one operation name
    /// and to records started within `window`.
    ///
    /// Returns `None` when nothing matches.
    pub fn summary(&self, operation: Option<&str>, window: Option<Duration>) -> Option<MetricsSummary> {
        let cutoff = window
            .and_then(|w| TimeDelta::from_std(w).ok())
            .and_then(|w| Utc::now().checked_sub_signed(w));

        let records: Vec<OperationRecord> = self
            .records()
            .into_iter()
            .filter(|r| operation.is_none_or(|op| r.operation == op))
            .filter(|r| cutoff.is_none_or(|c| r.started_at >= c))
            .collect();

        if records.is_empty() {
            return None;
        }

        let total = records.len();
        let successes = records.iter().filter(|r| r.success).count();
        let durations = records.iter().map(|r| r.duration_ms);
        let memory = records.iter().map(|r| r.memory_delta_mb);

        let failures: Vec<&OperationRecord> = records.iter().filter(|r| !r.success).collect();
        let recent_errors: Vec<ErrorRecord> = failures
            [failures.len().saturating_sub(RECENT_ERROR_LIMIT)..]
            .iter()
            .map(|r| ErrorRecord {
                operation: r.operation.clone(),
                message: r.error.clone().unwrap_or_default(),
                timestamp: r.finished_at,
            })
            .collect();

        Some(MetricsSummary {
            operation: operation.map(str::to_string),
            total_operations: total,
            success_rate: successes as f64 / total as f64 * 100.0,
            avg_duration_ms: durations.clone().sum::<f64>() / total as f64,
            min_duration_ms: durations.clone().fold(f64::INFINITY, f64::min),
            max_duration_ms: durations.fold(f64::NEG_INFINITY, f64::max),
            avg_memory_delta_mb: memory.clone().sum::<f64>() / total as f64,
            max_memory_delta_mb: memory.fold(f64::NEG_INFINITY, f64::max),
            recent_errors,
        })
    }

    /// Current host CPU, memory and disk usage.
    pub fn system_info(&self) -> SystemSnapshot {
        let (cpu_percent, memory_percent, memory_available_gb) = {
            let mut sys = self.system.lock();
            sys.refresh_cpu_usage();
            sys.refresh_memory();
            let total = sys.total_memory();
            let available = sys.available_memory();
            let memory_percent = if total == 0 {
                0.0
            } else {
                (total - available.min(total)) as f64 / total as f64 * 100.0
            };
            (
                sys.global_cpu_usage(),
                memory_percent,
                available as f64 / BYTES_PER_GB,
            )
        };

        SystemSnapshot {
            cpu_percent,
            memory_percent,
            memory_available_gb,
            disk_usage_percent: root_disk_usage(),
            timestamp: Utc::now(),
        }
    }

    /// Snapshot of the recorded history, oldest first.
    pub fn records(&self) -> Vec<OperationRecord> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }

    pub fn clear(&self) {
        self.history.lock().clear();
    }

    /// Write the history and its summary as pretty JSON.
    pub fn export(&self, path: &Path) -> std::io::Result<()> {
        let records = self.records();
        let export = MetricsExport {
            exported_at: Utc::now(),
            max_history: self.max_history,
            summary: self.summary(None, None),
            records: &records,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&export).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("records", &self.len())
            .field("max_history", &self.max_history)
            .finish()
    }
}

/// Usage of the disk mounted at `/`, or of the first disk found.
fn root_disk_usage() -> f64 {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first());

    match disk {
        Some(d) if d.total_space() > 0 => {
            let used = d.total_space() - d.available_space().min(d.total_space());
            used as f64 / d.total_space() as f64 * 100.0
        }
        _ => 0.0,
    }
}

/// Records one operation when dropped.
///
/// A guard dropped without [`succeed`](Self::succeed) or
/// [`fail`](Self::fail) counts as a failure.
pub struct MeasureGuard<'a> {
    monitor: &'a PerformanceMonitor,
    operation: String,
    started_at: DateTime<Utc>,
    start: Instant,
    start_rss: u64,
    outcome: Option<Result<(), String>>,
}

impl MeasureGuard<'_> {
    pub fn succeed(&mut self) {
        self.outcome = Some(Ok(()));
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.outcome = Some(Err(message.into()));
    }
}

impl Drop for MeasureGuard<'_> {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let (end_rss, cpu_percent) = self.monitor.sample_process();

        let outcome = self.outcome.take().unwrap_or_else(|| {
            if std::thread::panicking() {
                Err("operation panicked".to_string())
            } else {
                Err("operation did not complete".to_string())
            }
        });

        self.monitor.record(OperationRecord {
            operation: std::mem::take(&mut self.operation),
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            memory_delta_mb: (end_rss as f64 - self.start_rss as f64) / BYTES_PER_MB,
            cpu_percent,
            success: outcome.is_ok(),
            error: outcome.err(),
        });
    }
}
