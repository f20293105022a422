use crate::logging::{MetricsCollector, Timer};
use crate::pipeline::types::{FrameMetrics, RegistrationMode};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Timed steps of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationStage {
    Preprocess,
    Detection,
    Description,
    Matching,
    Filtering,
    Homography,
    Correlation,
}

impl RegistrationStage {
    pub fn name(self) -> &'static str {
        match self {
            RegistrationStage::Preprocess => "preprocess",
            RegistrationStage::Detection => "detection",
            RegistrationStage::Description => "description",
            RegistrationStage::Matching => "matching",
            RegistrationStage::Filtering => "filtering",
            RegistrationStage::Homography => "homography",
            RegistrationStage::Correlation => "correlation",
        }
    }

    pub const ALL: [RegistrationStage; 7] = [
        RegistrationStage::Preprocess,
        RegistrationStage::Detection,
        RegistrationStage::Description,
        RegistrationStage::Matching,
        RegistrationStage::Filtering,
        RegistrationStage::Homography,
        RegistrationStage::Correlation,
    ];
}

/// Measurement decorator around stage calls.
///
/// Times each closure, stores the duration in the frame's [`FrameMetrics`],
/// forwards it to the optional history and emits a trace event. Stage code
/// itself stays free of timing.
pub struct StageRecorder {
    metrics: FrameMetrics,
    collector: Option<Arc<MetricsCollector>>,
    correlation_id: Uuid,
}

impl StageRecorder {
    pub fn new(mode: RegistrationMode, collector: Option<Arc<MetricsCollector>>, correlation_id: Uuid) -> Self {
        Self {
            metrics: FrameMetrics::new(mode),
            collector,
            correlation_id,
        }
    }

    pub fn measure<T>(&mut self, stage: RegistrationStage, f: impl FnOnce() -> T) -> T {
        let timer = Timer::start_with_collector(stage.name(), Some(self.correlation_id), self.collector.clone());
        let output = f();
        let elapsed = timer.stop();
        self.record(stage, elapsed);
        output
    }

    fn record(&mut self, stage: RegistrationStage, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let slot = match stage {
            RegistrationStage::Preprocess => return,
            RegistrationStage::Detection => &mut self.metrics.detection_ms,
            RegistrationStage::Description => &mut self.metrics.description_ms,
            RegistrationStage::Matching => &mut self.metrics.matching_ms,
            RegistrationStage::Filtering => &mut self.metrics.filtering_ms,
            RegistrationStage::Homography => &mut self.metrics.homography_ms,
            RegistrationStage::Correlation => &mut self.metrics.correlation_ms,
        };
        *slot += ms;
    }

    pub fn metrics_mut(&mut self) -> &mut FrameMetrics {
        &mut self.metrics
    }

    /// Stamp the whole-frame time and hand the metrics out
    pub fn finish(mut self, total: Duration) -> FrameMetrics {
        self.metrics.finish(total.as_secs_f64() * 1000.0);
        self.metrics
    }
}
