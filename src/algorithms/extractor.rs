use crate::algorithms::fast::{self, FastDetector};
use crate::algorithms::orb::{BriefDescriptor, OrbDetector};
use crate::config::{DescriptorConfig, DescriptorKind, DetectorConfig, DetectorKind};
use crate::pipeline::{DescriptorComputer, FeatureSet, Keypoint, KeypointDetector};
use image::GrayImage;
use std::sync::Arc;

/// Detector and descriptor pair fixed at construction.
///
/// Cloning is cheap and yields an extractor with identical behaviour, which
/// lets template loading run outside the processor lock.
#[derive(Clone)]
pub struct FeatureExtractor {
    detector: Arc<dyn KeypointDetector>,
    descriptor: Arc<dyn DescriptorComputer>,
}

impl FeatureExtractor {
    pub fn new(detector: Arc<dyn KeypointDetector>, descriptor: Arc<dyn DescriptorComputer>) -> Self {
        Self { detector, descriptor }
    }

    pub fn from_config(detector: &DetectorConfig, descriptor: &DescriptorConfig) -> Self {
        let detector_impl: Arc<dyn KeypointDetector> = match detector.kind {
            DetectorKind::Orb => Arc::new(OrbDetector {
                threshold: detector.threshold,
                non_max_suppression: detector.non_max_suppression,
                max_features: detector.max_features,
                pyramid_levels: detector.pyramid_levels.max(1),
                scale_factor: detector.scale_factor,
                edge_threshold: detector.edge_threshold,
                patch_size: descriptor.patch_size,
            }),
            DetectorKind::Fast => Arc::new(FastDetector {
                threshold: detector.threshold,
                non_max_suppression: detector.non_max_suppression,
                max_features: detector.max_features,
                border: fast::MIN_BORDER,
            }),
        };

        let descriptor_impl: Arc<dyn DescriptorComputer> = Arc::new(BriefDescriptor {
            steered: descriptor.kind == DescriptorKind::Orb,
            patch_size: descriptor.patch_size,
            scale_factor: detector.scale_factor,
            blur_sigma: descriptor.blur_sigma,
        });

        tracing::debug!(
            detector = detector_impl.name(),
            descriptor = descriptor_impl.name(),
            threshold = detector.threshold,
            max_features = detector.max_features,
            "Feature extractor configured"
        );

        Self::new(detector_impl, descriptor_impl)
    }

    pub fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        self.detector.detect(image)
    }

    pub fn describe(&self, image: &GrayImage, keypoints: &[Keypoint]) -> FeatureSet {
        self.descriptor.compute(image, keypoints)
    }

    pub fn detect_and_describe(&self, image: &GrayImage) -> FeatureSet {
        let keypoints = self.detect(image);
        self.describe(image, &keypoints)
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn descriptor_name(&self) -> &'static str {
        self.descriptor.name()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::from_config(&DetectorConfig::default(), &DescriptorConfig::default())
    }
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("detector", &self.detector.name())
            .field("descriptor", &self.descriptor.name())
            .finish()
    }
}
