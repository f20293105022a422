use crate::pipeline::types::{FeatureSet, Keypoint};
use image::GrayImage;

/// Finds keypoints on a grayscale image
pub trait KeypointDetector: Send + Sync {
    /// Returns the name of the detector
    fn name(&self) -> &'static str;

    /// Detect keypoints in level-0 image coordinates. Must not modify the image.
    fn detect(&self, image: &GrayImage) -> Vec<Keypoint>;
}

/// Computes binary descriptors for detected keypoints
pub trait DescriptorComputer: Send + Sync {
    /// Returns the name of the descriptor
    fn name(&self) -> &'static str;

    /// Describe `keypoints`. Keypoints that cannot be described are left out
    /// together with their descriptor, so the returned set stays aligned.
    fn compute(&self, image: &GrayImage, keypoints: &[Keypoint]) -> FeatureSet;
}
