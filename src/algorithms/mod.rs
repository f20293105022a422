//! Feature extraction, matching and geometric registration
pub mod aligner;
pub mod extractor;
pub mod fast;
pub mod homography;
pub mod matcher;
pub mod orb;
pub mod phase_correlation;
pub mod warp;

pub use aligner::{AlignOutcome, Aligner, MIN_CORRESPONDENCES};
pub use extractor::FeatureExtractor;
pub use homography::{estimate_homography_dlt, Homography};
pub use matcher::{hamming_distance, DescriptorMatcher};
pub use phase_correlation::PhaseCorrelator;
pub use warp::{blend_into, warp_perspective_into};
