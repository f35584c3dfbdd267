//! Stage time monitor
//!
//! Every stage execution in a pipeline records its name, the kind of work
//! done, the elapsed time and the number of items processed. Clones of a
//! [`TimeMonitor`] share one log so that all trials of a search end up in the
//! same report.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// The kind of work a stage performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageOperation {
    Fit,
    /// Transform output was computed by the stage
    TransformComputed,
    /// Transform output was served from the stage cache
    TransformCached,
    Predict,
}

impl fmt::Display for StageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageOperation::Fit => "fit",
            StageOperation::TransformComputed => "transform_computed",
            StageOperation::TransformCached => "transform_cached",
            StageOperation::Predict => "predict",
        };
        f.write_str(name)
    }
}

/// A single timing measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTiming {
    pub stage: String,
    pub operation: StageOperation,
    pub duration: Duration,
    pub n_items: usize,
}

/// Aggregated timings for one (stage, operation) pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingSummary {
    pub calls: usize,
    pub items: usize,
    pub total: Duration,
}

/// Thread-safe, shareable stage timing log.
#[derive(Debug, Clone, Default)]
pub struct TimeMonitor {
    entries: Arc<Mutex<Vec<StageTiming>>>,
}

impl TimeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished measurement.
    pub fn record(&self, stage: &str, operation: StageOperation, duration: Duration, n_items: usize) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push(StageTiming { stage: stage.to_string(), operation, duration, n_items });
    }

    /// Run a closure and record how long it took.
    #[inline]
    pub fn measure<F, R>(&self, stage: &str, operation: StageOperation, n_items: usize, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(stage, operation, start.elapsed(), n_items);
        result
    }

    /// Snapshot of all measurements in recording order.
    pub fn entries(&self) -> Vec<StageTiming> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of measurements for one stage and operation.
    pub fn count(&self, stage: &str, operation: StageOperation) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.stage == stage && e.operation == operation)
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Aggregate measurements per stage and operation.
    pub fn summary(&self) -> BTreeMap<(String, StageOperation), TimingSummary> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut totals: BTreeMap<(String, StageOperation), TimingSummary> = BTreeMap::new();
        for e in entries.iter() {
            let slot = totals.entry((e.stage.clone(), e.operation)).or_default();
            slot.calls += 1;
            slot.items += e.n_items;
            slot.total += e.duration;
        }
        totals
    }

    /// Render a text table of time spent per stage.
    pub fn report(&self) -> String {
        let totals = self.summary();
        if totals.is_empty() {
            return "No stage timings recorded".to_string();
        }

        let total_time: Duration = totals.values().map(|s| s.total).sum();
        let rule = "─".repeat(78);
        let mut output = format!("Stage time report (total {total_time:.2?})\n{rule}\n");
        output.push_str(&format!(
            "{:<24} | {:<18} | {:>6} | {:>8} | {:>12}\n",
            "Stage", "Operation", "Calls", "Items", "Duration"
        ));
        output.push_str(&format!("{rule}\n"));

        let mut rows: Vec<_> = totals.iter().collect();
        rows.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        for ((stage, operation), s) in rows {
            output.push_str(&format!(
                "{:<24} | {:<18} | {:>6} | {:>8} | {:>12.2?}\n",
                stage,
                operation.to_string(),
                s.calls,
                s.items,
                s.total
            ));
        }
        output.push_str(&rule);
        output.push('\n');
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(StageOperation::Fit.to_string(), "fit");
        assert_eq!(StageOperation::TransformComputed.to_string(), "transform_computed");
        assert_eq!(StageOperation::TransformCached.to_string(), "transform_cached");
        assert_eq!(StageOperation::Predict.to_string(), "predict");
    }

    #[test]
    fn test_measure_records_entry() {
        let monitor = TimeMonitor::new();
        let value = monitor.measure("scaler", StageOperation::Fit, 10, || 42);
        assert_eq!(value, 42);
        let entries = monitor.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].stage, "scaler");
        assert_eq!(entries[0].n_items, 10);
    }

    #[test]
    fn test_clones_share_log() {
        let monitor = TimeMonitor::new();
        let other = monitor.clone();
        other.record("clf", StageOperation::Predict, Duration::from_millis(3), 5);
        assert_eq!(monitor.len(), 1);
        assert_eq!(monitor.count("clf", StageOperation::Predict), 1);
        monitor.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_summary_aggregates() {
        let monitor = TimeMonitor::new();
        monitor.record("a", StageOperation::Fit, Duration::from_millis(2), 4);
        monitor.record("a", StageOperation::Fit, Duration::from_millis(3), 6);
        monitor.record("a", StageOperation::TransformCached, Duration::from_millis(1), 4);
        let summary = monitor.summary();
        let fit = summary[&("a".to_string(), StageOperation::Fit)];
        assert_eq!(fit.calls, 2);
        assert_eq!(fit.items, 10);
        assert_eq!(fit.total, Duration::from_millis(5));
    }

    #[test]
    fn test_report() {
        let monitor = TimeMonitor::new();
        assert!(monitor.report().contains("No stage timings"));
        monitor.record("scaler", StageOperation::TransformComputed, Duration::from_millis(1), 3);
        let report = monitor.report();
        assert!(report.contains("scaler"));
        assert!(report.contains("transform_computed"));
    }
}
