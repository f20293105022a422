use crate::algorithms::homography::Homography;
use crate::algorithms::warp::{blend_into, warp_perspective_into};
use crate::config::RansacConfig;
use crate::pipeline::Correspondences;
use crate::utils::ransac::find_homography_ransac;
use image::GrayImage;

/// Fewest correspondences a homography can be estimated from
pub const MIN_CORRESPONDENCES: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum AlignOutcome {
    /// Too few correspondences; the canvas was left untouched
    Skipped { correspondences: usize },
    /// The warped template was blended onto the canvas
    Blended {
        homography: Homography,
        inliers: usize,
        degenerate: bool,
    },
}

impl AlignOutcome {
    pub fn is_blended(&self) -> bool {
        matches!(self, AlignOutcome::Blended { .. })
    }
}

/// Estimates the template-to-scene homography and overlays the warped template
pub struct Aligner {
    ransac: RansacConfig,
    blend_alpha: f32,
    scratch: GrayImage,
}

impl Aligner {
    pub fn new(ransac: RansacConfig, blend_alpha: f32) -> Self {
        Self {
            ransac,
            blend_alpha,
            scratch: GrayImage::new(0, 0),
        }
    }

    /// Reallocate the warp buffer for a new view size
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.scratch.dimensions() != (width, height) {
            self.scratch = GrayImage::new(width, height);
        }
    }

    pub fn align(&mut self, correspondences: &Correspondences, template: &GrayImage, canvas: &mut GrayImage) -> AlignOutcome {
        if correspondences.len() < MIN_CORRESPONDENCES {
            return AlignOutcome::Skipped {
                correspondences: correspondences.len(),
            };
        }

        let estimate = find_homography_ransac(&correspondences.template, &correspondences.scene, &self.ransac);
        if estimate.degenerate {
            tracing::debug!(
                correspondences = correspondences.len(),
                "No consistent homography, blending fallback estimate"
            );
        }

        let (width, height) = canvas.dimensions();
        self.resize(width, height);
        warp_perspective_into(template, &estimate.homography, &mut self.scratch);
        blend_into(canvas, &self.scratch, self.blend_alpha);

        AlignOutcome::Blended {
            homography: estimate.homography,
            inliers: estimate.inlier_count,
            degenerate: estimate.degenerate,
        }
    }
}
