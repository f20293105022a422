use crate::algorithms::homography::{estimate_homography_dlt, has_collinear_triple, Homography};
use crate::config::RansacConfig;
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::SeedableRng;

const SAMPLE_SIZE: usize = 4;

/// Result of robust homography estimation
#[derive(Clone, Debug)]
pub struct HomographyEstimate {
    pub homography: Homography,
    /// Inlier flag per correspondence
    pub inliers: Vec<bool>,
    pub inlier_count: usize,
    /// No consensus model could be fitted; `homography` is a fallback
    pub degenerate: bool,
}

/// Estimate the homography mapping `template` points onto `scene` points.
///
/// Never fails: when no sample yields a model, the DLT over all points and
/// then the identity are used, with `degenerate` set.
pub fn find_homography_ransac(
    template: &[Point2<f32>],
    scene: &[Point2<f32>],
    config: &RansacConfig,
) -> HomographyEstimate {
    let src: Vec<Point2<f64>> = template.iter().map(|p| p.cast::<f64>()).collect();
    let dst: Vec<Point2<f64>> = scene.iter().map(|p| p.cast::<f64>()).collect();
    let n = src.len().min(dst.len());
    let threshold_sq = config.reprojection_threshold * config.reprojection_threshold;

    let mut best: Option<(Homography, usize)> = None;

    if n >= SAMPLE_SIZE {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut required = config.max_iterations;
        let mut iteration = 0;

        while iteration < required {
            iteration += 1;

            let sample = rand::seq::index::sample(&mut rng, n, SAMPLE_SIZE);
            let sample_src: Vec<Point2<f64>> = sample.iter().map(|i| src[i]).collect();
            let sample_dst: Vec<Point2<f64>> = sample.iter().map(|i| dst[i]).collect();
            if has_collinear_triple(&sample_src) || has_collinear_triple(&sample_dst) {
                continue;
            }

            let Some(model) = estimate_homography_dlt(&sample_src, &sample_dst) else {
                continue;
            };

            let count = count_inliers(&model, &src[..n], &dst[..n], threshold_sq);
            if best.as_ref().map_or(true, |(_, best_count)| count > *best_count) {
                best = Some((model, count));
                required = adaptive_iterations(count, n, config.confidence, config.max_iterations).max(iteration);
            }
        }

        log::trace!("ransac ran {} of at most {} iterations", iteration, config.max_iterations);
    }

    match best {
        Some((model, count)) if count >= SAMPLE_SIZE => {
            let mut homography = model;
            if config.refine {
                let inliers = inlier_mask(&model, &src[..n], &dst[..n], threshold_sq);
                let (in_src, in_dst) = select(&src[..n], &dst[..n], &inliers);
                if let Some(refined) = estimate_homography_dlt(&in_src, &in_dst) {
                    // keep the refit only if it does not lose support
                    if count_inliers(&refined, &src[..n], &dst[..n], threshold_sq) >= count {
                        homography = refined;
                    }
                }
            }
            finish(homography, &src, &dst, n, threshold_sq, false)
        }
        _ => {
            let homography = estimate_homography_dlt(&src[..n], &dst[..n]).unwrap_or_else(|| {
                log::debug!("no homography fits {} correspondences, falling back to identity", n);
                Homography::identity()
            });
            finish(homography, &src, &dst, n, threshold_sq, true)
        }
    }
}

fn finish(
    homography: Homography,
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    n: usize,
    threshold_sq: f64,
    degenerate: bool,
) -> HomographyEstimate {
    let mut inliers = inlier_mask(&homography, &src[..n], &dst[..n], threshold_sq);
    inliers.resize(src.len().max(dst.len()), false);
    let inlier_count = inliers.iter().filter(|&&inlier| inlier).count();

    HomographyEstimate {
        homography,
        inliers,
        inlier_count,
        degenerate,
    }
}

/// Iterations needed to draw an all-inlier sample with the given confidence
fn adaptive_iterations(inliers: usize, total: usize, confidence: f64, max_iterations: usize) -> usize {
    let ratio = inliers as f64 / total as f64;
    let p_good_sample = ratio.powi(SAMPLE_SIZE as i32);
    if p_good_sample >= 1.0 {
        return 1;
    }
    if p_good_sample <= 0.0 {
        return max_iterations;
    }

    let needed = (1.0 - confidence).ln() / (1.0 - p_good_sample).ln();
    if needed.is_finite() && needed >= 0.0 {
        (needed.ceil() as usize).min(max_iterations)
    } else {
        max_iterations
    }
}

fn inlier_mask(model: &Homography, src: &[Point2<f64>], dst: &[Point2<f64>], threshold_sq: f64) -> Vec<bool> {
    src.iter()
        .zip(dst.iter())
        .map(|(s, d)| model.transfer_error_sq(s, d) <= threshold_sq)
        .collect()
}

fn count_inliers(model: &Homography, src: &[Point2<f64>], dst: &[Point2<f64>], threshold_sq: f64) -> usize {
    src.iter()
        .zip(dst.iter())
        .filter(|(s, d)| model.transfer_error_sq(s, d) <= threshold_sq)
        .count()
}

fn select(src: &[Point2<f64>], dst: &[Point2<f64>], mask: &[bool]) -> (Vec<Point2<f64>>, Vec<Point2<f64>>) {
    src.iter()
        .zip(dst.iter())
        .zip(mask.iter())
        .filter(|(_, keep)| **keep)
        .map(|((s, d), _)| (*s, *d))
        .unzip()
}
