//! Stage timing history
//!
//! Bounded in-memory record of per-stage durations with statistical
//! summaries. Filled by the pipeline's measurement decorator when
//! `record_history` is enabled, read by reporting collaborators.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use instant::Instant;
use std::time::Duration;
use uuid::Uuid;

const MAX_MEASUREMENTS: usize = 10_000;

/// Individual performance measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMeasurement {
    pub operation: String,
    pub duration_ms: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub correlation_id: Option<Uuid>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Statistical summary of performance measurements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub operation: String,
    pub count: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Thread-safe metrics collector
pub struct MetricsCollector {
    measurements: Mutex<Vec<PerformanceMeasurement>>,
    enabled: bool,
}

impl MetricsCollector {
    pub fn new(enabled: bool) -> Self {
        Self {
            measurements: Mutex::new(Vec::new()),
            enabled,
        }
    }

    pub fn record(&self, operation: &str, duration: Duration, correlation_id: Option<Uuid>) {
        self.record_with_metadata(operation, duration, correlation_id, HashMap::new());
    }

    pub fn record_with_metadata(
        &self,
        operation: &str,
        duration: Duration,
        correlation_id: Option<Uuid>,
        metadata: HashMap<String, serde_json::Value>,
    ) {
        if !self.enabled {
            return;
        }

        let measurement = PerformanceMeasurement {
            operation: operation.to_string(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            timestamp: chrono::Utc::now(),
            correlation_id,
            metadata,
        };

        if let Ok(mut measurements) = self.measurements.lock() {
            measurements.push(measurement);

            // Keep the most recent half once the cap is hit
            if measurements.len() > MAX_MEASUREMENTS {
                measurements.drain(0..MAX_MEASUREMENTS / 2);
            }
        }
    }

    pub fn get_measurements(&self, operation: &str) -> Vec<PerformanceMeasurement> {
        match self.measurements.lock() {
            Ok(measurements) => measurements
                .iter()
                .filter(|m| m.operation == operation)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Names of every operation seen so far, in first-seen order
    pub fn operations(&self) -> Vec<String> {
        let mut seen = Vec::new();
        if let Ok(measurements) = self.measurements.lock() {
            for m in measurements.iter() {
                if !seen.contains(&m.operation) {
                    seen.push(m.operation.clone());
                }
            }
        }
        seen
    }

    pub fn calculate_stats(&self, operation: &str) -> Option<PerformanceStats> {
        let measurements = self.get_measurements(operation);
        if measurements.is_empty() {
            return None;
        }

        let mut durations: Vec<f64> = measurements.iter().map(|m| m.duration_ms).collect();
        durations.sort_by(|a, b| a.total_cmp(b));

        let count = durations.len();
        let mean = durations.iter().sum::<f64>() / count as f64;

        let variance = durations
            .iter()
            .map(|d| {
                let diff = d - mean;
                diff * diff
            })
            .sum::<f64>()
            / count as f64;

        let median = if count % 2 == 0 {
            (durations[count / 2 - 1] + durations[count / 2]) / 2.0
        } else {
            durations[count / 2]
        };

        let p95_index = ((count as f64) * 0.95) as usize;
        let p99_index = ((count as f64) * 0.99) as usize;

        Some(PerformanceStats {
            operation: operation.to_string(),
            count,
            mean_ms: mean,
            median_ms: median,
            std_dev_ms: variance.sqrt(),
            min_ms: durations[0],
            max_ms: durations[count - 1],
            p95_ms: durations[p95_index.min(count - 1)],
            p99_ms: durations[p99_index.min(count - 1)],
        })
    }

    pub fn clear(&self) {
        if let Ok(mut measurements) = self.measurements.lock() {
            measurements.clear();
        }
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Every retained measurement, oldest first
    pub fn export_to_json(&self) -> Result<String, serde_json::Error> {
        match self.measurements.lock() {
            Ok(measurements) => serde_json::to_string_pretty(&*measurements),
            Err(_) => Ok("[]".to_string()),
        }
    }
}

/// Stopwatch that optionally reports into a [`MetricsCollector`] when stopped
pub struct Timer {
    start: Instant,
    operation: &'static str,
    correlation_id: Option<Uuid>,
    collector: Option<Arc<MetricsCollector>>,
}

impl Timer {
    pub fn start(operation: &'static str, correlation_id: Option<Uuid>) -> Self {
        Self {
            start: Instant::now(),
            operation,
            correlation_id,
            collector: None,
        }
    }

    pub fn start_with_collector(
        operation: &'static str,
        correlation_id: Option<Uuid>,
        collector: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            collector,
            ..Self::start(operation, correlation_id)
        }
    }

    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();

        if let Some(collector) = &self.collector {
            collector.record(self.operation, duration, self.correlation_id);
        }

        tracing::debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            correlation_id = ?self.correlation_id,
            "Stage completed"
        );

        duration
    }
}
