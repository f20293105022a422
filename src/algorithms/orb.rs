//! Oriented FAST and rotated BRIEF
//!
//! Detection runs FAST on every level of a scale pyramid, ranks the corners
//! by Harris response and assigns an orientation from the intensity centroid.
//! Description compares pixel pairs from a fixed Gaussian sampling pattern,
//! optionally rotated by the keypoint angle, on a smoothed pyramid level.

use crate::algorithms::fast;
use crate::pipeline::{Descriptor, DescriptorComputer, FeatureSet, Keypoint, KeypointDetector};
use image::{imageops, GrayImage};
use lazy_static::lazy_static;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Patch size the sampling pattern is laid out for
const PATTERN_PATCH_SIZE: f32 = 31.0;
const PATTERN_CLIP: f32 = 13.0;
const PATTERN_SEED: u64 = 0x0b_1e_f0;
const HARRIS_K: f32 = 0.04;
const HARRIS_BLOCK: i32 = 7;

lazy_static! {
    /// 256 test pairs `(x1, y1, x2, y2)` drawn from an isotropic Gaussian, sigma = patch / 5
    static ref BRIEF_PATTERN: Vec<[f32; 4]> = {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let sigma = PATTERN_PATCH_SIZE / 5.0;
        (0..256)
            .map(|_| {
                let mut pair = [0.0f32; 4];
                for coordinate in pair.iter_mut() {
                    let z: f32 = StandardNormal.sample(&mut rng);
                    *coordinate = (z * sigma).round().clamp(-PATTERN_CLIP, PATTERN_CLIP);
                }
                pair
            })
            .collect()
    };
}

/// One pyramid level and its scale relative to the input image
pub struct PyramidLevel {
    pub image: GrayImage,
    pub scale: f32,
}

/// Build up to `levels` downscaled copies, stopping once a level drops below `min_side`
pub fn build_pyramid(image: &GrayImage, levels: u8, scale_factor: f32, min_side: u32) -> Vec<PyramidLevel> {
    let mut pyramid = Vec::with_capacity(levels as usize);
    pyramid.push(PyramidLevel {
        image: image.clone(),
        scale: 1.0,
    });

    let mut scale = 1.0f32;
    for _ in 1..levels {
        scale *= scale_factor;
        let width = (image.width() as f32 / scale).round() as u32;
        let height = (image.height() as f32 / scale).round() as u32;
        if width < min_side || height < min_side {
            break;
        }

        let level = imageops::resize(image, width, height, imageops::FilterType::Triangle);
        pyramid.push(PyramidLevel { image: level, scale });
    }

    pyramid
}

/// Per-level feature quota, geometrically decreasing with scale
fn level_quotas(total: usize, levels: usize, scale_factor: f32) -> Vec<usize> {
    let inv = 1.0 / scale_factor;
    let mut per_level = total as f32 * (1.0 - inv) / (1.0 - inv.powi(levels as i32));
    let mut quotas = Vec::with_capacity(levels);
    let mut assigned = 0usize;

    for _ in 0..levels.saturating_sub(1) {
        let quota = per_level.round() as usize;
        quotas.push(quota);
        assigned += quota;
        per_level *= inv;
    }
    quotas.push(total.saturating_sub(assigned));
    quotas
}

/// Harris corner measure over a 7x7 block of Sobel gradients
pub fn harris_response(image: &GrayImage, x: u32, y: u32) -> f32 {
    let r = HARRIS_BLOCK / 2;
    let (width, height) = (image.width() as i32, image.height() as i32);
    let (x, y) = (x as i32, y as i32);
    if x - r - 1 < 0 || y - r - 1 < 0 || x + r + 1 >= width || y + r + 1 >= height {
        return 0.0;
    }

    let at = |px: i32, py: i32| image.get_pixel(px as u32, py as u32)[0] as f32;
    let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
    for py in (y - r)..=(y + r) {
        for px in (x - r)..=(x + r) {
            let ix = (at(px + 1, py - 1) + 2.0 * at(px + 1, py) + at(px + 1, py + 1))
                - (at(px - 1, py - 1) + 2.0 * at(px - 1, py) + at(px - 1, py + 1));
            let iy = (at(px - 1, py + 1) + 2.0 * at(px, py + 1) + at(px + 1, py + 1))
                - (at(px - 1, py - 1) + 2.0 * at(px, py - 1) + at(px + 1, py - 1));
            a += ix * ix;
            b += iy * iy;
            c += ix * iy;
        }
    }

    // Normalize so the measure does not depend on the block size
    let norm = 1.0 / (4.0 * HARRIS_BLOCK as f32 * 255.0);
    let (a, b, c) = (a * norm * norm, b * norm * norm, c * norm * norm);
    a * b - c * c - HARRIS_K * (a + b) * (a + b)
}

/// Orientation of the intensity centroid within a disc of `radius`
pub fn intensity_centroid_angle(image: &GrayImage, x: u32, y: u32, radius: i32) -> f32 {
    let (mut m01, mut m10) = (0.0f32, 0.0f32);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let px = x as i32 + dx;
            let py = y as i32 + dy;
            if px < 0 || py < 0 || px as u32 >= image.width() || py as u32 >= image.height() {
                continue;
            }
            let intensity = image.get_pixel(px as u32, py as u32)[0] as f32;
            m10 += intensity * dx as f32;
            m01 += intensity * dy as f32;
        }
    }
    m01.atan2(m10)
}

/// Multi-scale FAST detector with Harris ranking and centroid orientation
#[derive(Debug, Clone)]
pub struct OrbDetector {
    pub threshold: u8,
    pub non_max_suppression: bool,
    pub max_features: usize,
    pub pyramid_levels: u8,
    pub scale_factor: f32,
    pub edge_threshold: u32,
    pub patch_size: u32,
}

impl OrbDetector {
    fn detect_level(&self, level: &PyramidLevel, octave: u8, quota: usize) -> Vec<Keypoint> {
        let corners = fast::detect_corners(&level.image, self.threshold, self.non_max_suppression, self.edge_threshold);

        let mut ranked: Vec<(fast::FastCorner, f32)> = corners
            .into_par_iter()
            .map(|corner| {
                let response = harris_response(&level.image, corner.x, corner.y);
                (corner, response)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked.truncate(quota);

        let radius = (self.patch_size / 2) as i32;
        ranked
            .into_par_iter()
            .map(|(corner, response)| Keypoint {
                x: corner.x as f32 * level.scale,
                y: corner.y as f32 * level.scale,
                response,
                angle: intensity_centroid_angle(&level.image, corner.x, corner.y, radius),
                octave,
                size: self.patch_size as f32 * level.scale,
            })
            .collect()
    }
}

impl KeypointDetector for OrbDetector {
    fn name(&self) -> &'static str {
        "orb"
    }

    fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        let min_side = 2 * self.edge_threshold + 1;
        let pyramid = build_pyramid(image, self.pyramid_levels, self.scale_factor, min_side);
        let quotas = level_quotas(self.max_features, pyramid.len(), self.scale_factor);

        let mut keypoints: Vec<Keypoint> = pyramid
            .iter()
            .zip(quotas)
            .enumerate()
            .flat_map(|(octave, (level, quota))| self.detect_level(level, octave as u8, quota))
            .collect();

        if keypoints.len() > self.max_features {
            keypoints.sort_by(|a, b| b.response.partial_cmp(&a.response).unwrap_or(Ordering::Equal));
            keypoints.truncate(self.max_features);
        }

        log::trace!("orb detected {} keypoints over {} levels", keypoints.len(), pyramid.len());
        keypoints
    }
}

/// BRIEF descriptor; `steered` rotates the pattern by each keypoint angle
#[derive(Debug, Clone)]
pub struct BriefDescriptor {
    pub steered: bool,
    pub patch_size: u32,
    pub scale_factor: f32,
    pub blur_sigma: f32,
}

impl BriefDescriptor {
    fn pattern_scale(&self) -> f32 {
        self.patch_size as f32 / PATTERN_PATCH_SIZE
    }

    /// Distance from the keypoint a rotated sample may reach, rounded outwards
    fn sampling_radius(&self) -> i32 {
        let reach = if self.steered {
            PATTERN_CLIP * std::f32::consts::SQRT_2
        } else {
            PATTERN_CLIP
        };
        (reach * self.pattern_scale()).ceil() as i32 + 1
    }

    fn smoothed_pyramid(&self, image: &GrayImage, levels: u8) -> Vec<PyramidLevel> {
        build_pyramid(image, levels, self.scale_factor, 1)
            .into_par_iter()
            .map(|level| {
                let image = if self.blur_sigma > 0.0 {
                    imageproc::filter::gaussian_blur_f32(&level.image, self.blur_sigma)
                } else {
                    level.image
                };
                PyramidLevel {
                    image,
                    scale: level.scale,
                }
            })
            .collect()
    }

    fn describe_one(&self, level: &PyramidLevel, keypoint: &Keypoint) -> Option<Descriptor> {
        let cx = (keypoint.x / level.scale).round() as i32;
        let cy = (keypoint.y / level.scale).round() as i32;
        let radius = self.sampling_radius();
        let (width, height) = (level.image.width() as i32, level.image.height() as i32);
        if cx - radius < 0 || cy - radius < 0 || cx + radius >= width || cy + radius >= height {
            return None;
        }

        let (sin, cos) = if self.steered {
            keypoint.angle.sin_cos()
        } else {
            (0.0, 1.0)
        };
        let scale = self.pattern_scale();
        let sample = |dx: f32, dy: f32| {
            let (dx, dy) = (dx * scale, dy * scale);
            let px = cx + (dx * cos - dy * sin).round() as i32;
            let py = cy + (dx * sin + dy * cos).round() as i32;
            level.image.get_pixel(px as u32, py as u32)[0]
        };

        let mut descriptor = [0u8; 32];
        for (byte, tests) in descriptor.iter_mut().zip(BRIEF_PATTERN.chunks(8)) {
            for (bit, &[x1, y1, x2, y2]) in tests.iter().enumerate() {
                if sample(x1, y1) < sample(x2, y2) {
                    *byte |= 1 << bit;
                }
            }
        }
        Some(descriptor)
    }
}

impl DescriptorComputer for BriefDescriptor {
    fn name(&self) -> &'static str {
        if self.steered {
            "orb"
        } else {
            "brief"
        }
    }

    fn compute(&self, image: &GrayImage, keypoints: &[Keypoint]) -> FeatureSet {
        let Some(deepest) = keypoints.iter().map(|kp| kp.octave).max() else {
            return FeatureSet::new();
        };
        let pyramid = self.smoothed_pyramid(image, deepest.saturating_add(1));

        let described: Vec<Option<Descriptor>> = keypoints
            .par_iter()
            .map(|keypoint| {
                let level = pyramid.get(keypoint.octave as usize)?;
                self.describe_one(level, keypoint)
            })
            .collect();

        let mut features = FeatureSet::with_capacity(keypoints.len());
        for (keypoint, descriptor) in keypoints.iter().zip(described) {
            if let Some(descriptor) = descriptor {
                features.push(*keypoint, descriptor);
            }
        }

        let dropped = keypoints.len() - features.len();
        if dropped > 0 {
            log::trace!("dropped {} keypoints too close to the border to describe", dropped);
        }
        features
    }
}
