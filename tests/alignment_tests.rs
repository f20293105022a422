use image::{GrayImage, Luma};
use nalgebra::{Matrix3, Point2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use recapture::algorithms::{estimate_homography_dlt, AlignOutcome, Aligner, Homography, MIN_CORRESPONDENCES};
use recapture::config::RansacConfig;
use recapture::pipeline::{filter_matches, Correspondences, Keypoint, Match};
use recapture::utils::find_homography_ransac;

fn known_homography() -> Homography {
    Homography::from_matrix(Matrix3::new(
        0.95, 0.08, 40.0, //
        -0.06, 1.02, 25.0, //
        0.0002, -0.0001, 1.0,
    ))
}

fn grid_points(n: usize) -> Vec<Point2<f64>> {
    (0..n)
        .map(|i| Point2::new(10.0 + (i % 6) as f64 * 23.0, 8.0 + (i / 6) as f64 * 19.0 + (i % 3) as f64 * 2.5))
        .collect()
}

fn project(h: &Homography, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    points.iter().map(|p| h.apply(*p).unwrap()).collect()
}

fn to_f32(points: &[Point2<f64>]) -> Vec<Point2<f32>> {
    points.iter().map(|p| p.cast::<f32>()).collect()
}

fn assert_maps_close(estimated: &Homography, expected: &Homography, points: &[Point2<f64>], tolerance: f64) {
    for p in points {
        let a = estimated.apply(*p).unwrap();
        let b = expected.apply(*p).unwrap();
        assert!((a - b).norm() < tolerance, "{:?} maps to {:?}, expected {:?}", p, a, b);
    }
}

#[test]
fn test_dlt_recovers_exact_homography() {
    let h = known_homography();
    let src = grid_points(12);
    let dst = project(&h, &src);

    let estimated = estimate_homography_dlt(&src, &dst).unwrap();
    assert_maps_close(&estimated, &h, &src, 1e-6);
}

#[test]
fn test_dlt_needs_four_points() {
    let src = grid_points(3);
    let dst = src.clone();
    assert!(estimate_homography_dlt(&src, &dst).is_none());
}

#[test]
fn test_ransac_tolerates_outliers() {
    let h = known_homography();
    let src = grid_points(40);
    let mut dst = project(&h, &src);

    let mut rng = StdRng::seed_from_u64(99);
    let outliers: Vec<usize> = (0..40).filter(|i| i % 10 < 3).collect();
    for &i in &outliers {
        dst[i] = Point2::new(rng.gen_range(0.0..400.0), rng.gen_range(0.0..300.0));
    }

    let estimate = find_homography_ransac(&to_f32(&src), &to_f32(&dst), &RansacConfig::default());
    assert!(!estimate.degenerate);
    assert_eq!(estimate.inliers.len(), 40);
    assert!(estimate.inlier_count >= 28, "only {} inliers", estimate.inlier_count);

    let clean: Vec<Point2<f64>> = (0..40).filter(|i| !outliers.contains(i)).map(|i| src[i]).collect();
    assert_maps_close(&estimate.homography, &h, &clean, 0.5);
}

#[test]
fn test_ransac_is_reproducible_with_fixed_seed() {
    let h = known_homography();
    let src = grid_points(24);
    let mut dst = project(&h, &src);
    dst[3] = Point2::new(300.0, 2.0);
    dst[17] = Point2::new(5.0, 250.0);

    let config = RansacConfig::default();
    let first = find_homography_ransac(&to_f32(&src), &to_f32(&dst), &config);
    let second = find_homography_ransac(&to_f32(&src), &to_f32(&dst), &config);
    assert_eq!(first.homography, second.homography);
    assert_eq!(first.inliers, second.inliers);
}

#[test]
fn test_collinear_points_fall_back_without_panicking() {
    let src: Vec<Point2<f32>> = (0..8).map(|i| Point2::new(i as f32 * 10.0, i as f32 * 5.0)).collect();
    let dst = src.clone();

    let estimate = find_homography_ransac(&src, &dst, &RansacConfig::default());
    assert!(estimate.degenerate);
    assert!(estimate.homography.is_finite());
}

#[test]
fn test_coincident_points_fall_back_to_finite_model() {
    let src = vec![Point2::new(5.0f32, 5.0); 6];
    let dst = vec![Point2::new(50.0f32, 40.0); 6];

    let estimate = find_homography_ransac(&src, &dst, &RansacConfig::default());
    assert!(estimate.degenerate);
    assert!(estimate.homography.is_finite());
}

#[test]
fn test_homography_inverse_round_trip() {
    let h = known_homography();
    let inverse = h.try_inverse().unwrap();
    for p in grid_points(10) {
        let back = inverse.apply(h.apply(p).unwrap()).unwrap();
        assert!((back - p).norm() < 1e-9);
    }
}

#[test]
fn test_aligner_skips_three_correspondences() {
    let mut aligner = Aligner::new(RansacConfig::default(), 0.5);
    let template = GrayImage::from_pixel(40, 40, Luma([255]));
    let mut canvas = GrayImage::from_pixel(120, 90, Luma([0]));

    let mut correspondences = Correspondences::default();
    for p in grid_points(MIN_CORRESPONDENCES - 1) {
        correspondences.push(p.cast::<f32>(), p.cast::<f32>());
    }

    let outcome = aligner.align(&correspondences, &template, &mut canvas);
    assert!(!outcome.is_blended());
    assert!(canvas.pixels().all(|p| p[0] == 0));
}

#[test]
fn test_twelve_of_thirty_matches_survive_and_blend() {
    let template = GrayImage::from_fn(64, 48, |x, y| Luma([if (x / 8 + y / 8) % 2 == 0 { 250 } else { 120 }]));
    let mut canvas = GrayImage::from_pixel(200, 150, Luma([0]));
    let (tx, ty) = (70.0f32, 50.0f32);

    // 50 template keypoints, the scene holds each of them translated by (tx, ty)
    let template_keypoints: Vec<Keypoint> = (0..50)
        .map(|i| Keypoint::new(2.0 + (i % 10) as f32 * 6.5, 2.0 + (i / 10) as f32 * 9.0 + (i % 3) as f32))
        .collect();
    let scene_keypoints: Vec<Keypoint> = template_keypoints
        .iter()
        .map(|kp| Keypoint::new(kp.x + tx, kp.y + ty))
        .collect();

    // 30 matches, only the first 12 within the distance limit
    let matches: Vec<Match> = (0..30)
        .map(|i| Match {
            query_idx: i,
            train_idx: i,
            distance: if i < 12 { 5 + i as u32 } else { 21 + i as u32 },
        })
        .collect();

    let correspondences = filter_matches(&matches, &scene_keypoints, &template_keypoints, 20);
    assert_eq!(correspondences.len(), 12);

    let mut aligner = Aligner::new(RansacConfig::default(), 0.5);
    aligner.resize(200, 150);
    let outcome = aligner.align(&correspondences, &template, &mut canvas);

    match outcome {
        AlignOutcome::Blended { inliers, degenerate, homography } => {
            assert_eq!(inliers, 12);
            assert!(!degenerate);
            let mapped = homography.apply(Point2::new(0.0, 0.0)).unwrap();
            assert!((mapped.x - tx as f64).abs() < 1e-3);
            assert!((mapped.y - ty as f64).abs() < 1e-3);
        }
        other => panic!("expected a blend, got {:?}", other),
    }

    // Inside the warped footprint the canvas is half template, outside it stays black
    assert_eq!(canvas.get_pixel(70 + 4, 50 + 4)[0], 125);
    assert_eq!(canvas.get_pixel(10, 10)[0], 0);
    assert_eq!(canvas.get_pixel(190, 140)[0], 0);
}
