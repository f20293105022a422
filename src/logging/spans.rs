//! Structured spans for per-frame and template logging
//!
//! Every span carries a correlation id so stage events and metrics history
//! from one frame can be tied together.

use instant::Instant;
use tracing::{field, span, Level, Span};
use uuid::Uuid;

/// Span covering one `process` call
pub struct FrameSpan {
    span: Span,
    start_time: Instant,
    correlation_id: Uuid,
}

impl FrameSpan {
    pub fn new(mode: &str, frame_size: (u32, u32), correlation_id: Uuid) -> Self {
        let span = span!(
            Level::DEBUG,
            "frame",
            mode = mode,
            width = frame_size.0,
            height = frame_size.1,
            correlation_id = %correlation_id,
            keypoints = field::Empty,
            matches = field::Empty,
            overlay = field::Empty,
        );

        Self {
            span,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn record_keypoints(&self, keypoints: usize) {
        self.span.record("keypoints", keypoints);
    }

    /// Record the outcome of matching and filtering
    pub fn record_matching(&self, raw_matches: usize, surviving: usize, distance_limit: u32) {
        self.span.record("matches", surviving);
        tracing::debug!(
            parent: &self.span,
            raw_matches,
            surviving,
            distance_limit,
            "Descriptor matches filtered"
        );
    }

    pub fn record_overlay(&self, blended: bool, inliers: usize, degenerate: bool) {
        self.span.record("overlay", blended);
        if degenerate {
            tracing::debug!(parent: &self.span, inliers, "Degenerate homography, overlay may be garbled");
        } else {
            tracing::trace!(parent: &self.span, blended, inliers, "Overlay stage finished");
        }
    }

    pub fn record_completion(&self, matches: usize) {
        tracing::trace!(
            parent: &self.span,
            matches,
            elapsed_us = self.start_time.elapsed().as_micros() as u64,
            "Frame processed"
        );
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Span around a template load
pub struct TemplateSpan {
    span: Span,
    start_time: Instant,
}

impl TemplateSpan {
    pub fn new(source_size: (u32, u32)) -> Self {
        let span = span!(
            Level::INFO,
            "template_load",
            source_width = source_size.0,
            source_height = source_size.1,
            keypoints = field::Empty,
        );

        Self {
            span,
            start_time: Instant::now(),
        }
    }

    pub fn record_loaded(&self, size: (u32, u32), keypoints: usize) {
        self.span.record("keypoints", keypoints);
        tracing::info!(
            parent: &self.span,
            width = size.0,
            height = size.1,
            keypoints,
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            "Template loaded"
        );
    }

    pub fn record_failure(&self, error: &dyn std::error::Error) {
        tracing::warn!(parent: &self.span, error = %error, "Template load failed, keeping previous template");
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}
