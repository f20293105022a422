use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use nalgebra::{Matrix3, Point2};
use recapture::algorithms::{hamming_distance, warp_perspective_into, DescriptorMatcher, FeatureExtractor, Homography};
use recapture::config::{DescriptorConfig, DescriptorKind, DetectorConfig, DetectorKind, MatcherConfig};
use recapture::pipeline::{filter_matches, Descriptor};

fn create_block_texture(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let blocks_x = width.div_ceil(8);
    let blocks_y = height.div_ceil(8);
    let values: Vec<u8> = (0..blocks_x * blocks_y).map(|_| rng.gen()).collect();
    GrayImage::from_fn(width, height, |x, y| Luma([values[((y / 8) * blocks_x + x / 8) as usize]]))
}

fn create_square_grid(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        // isolated bright squares so every square corner is a FAST corner
        let inside = x % 32 >= 8 && x % 32 < 24 && y % 32 >= 8 && y % 32 < 24;
        Luma([if inside { 230 } else { 30 }])
    })
}

/// Rotation by `degrees` about the centre of a `size` x `size` image
fn rotation_about_center(size: u32, degrees: f64) -> Homography {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let c = size as f64 / 2.0;
    Homography::from_matrix(Matrix3::new(
        cos, -sin, c - cos * c + sin * c,
        sin, cos, c - sin * c - cos * c,
        0.0, 0.0, 1.0,
    ))
}

fn create_rotated_pattern(source: &GrayImage, rotation: &Homography) -> GrayImage {
    let mut rotated = GrayImage::new(source.width(), source.height());
    assert!(warp_perspective_into(source, rotation, &mut rotated));
    rotated
}

#[test]
fn test_flat_image_has_no_features() {
    let image = GrayImage::from_pixel(200, 150, Luma([90]));
    let extractor = FeatureExtractor::default();
    assert!(extractor.detect(&image).is_empty());
    assert!(extractor.detect_and_describe(&image).is_empty());
}

#[test]
fn test_default_extractor_is_orb() {
    let extractor = FeatureExtractor::default();
    assert_eq!(extractor.detector_name(), "orb");
    assert_eq!(extractor.descriptor_name(), "orb");
}

#[test]
fn test_orb_finds_texture_corners() {
    let image = create_block_texture(240, 180, 7);
    let extractor = FeatureExtractor::default();
    let features = extractor.detect_and_describe(&image);

    assert!(features.len() > 20, "only {} features", features.len());
    assert!(features.len() <= DetectorConfig::default().max_features);
    assert_eq!(features.keypoints().len(), features.descriptors().len());
    for kp in features.keypoints() {
        assert!(kp.x >= 0.0 && kp.x < 240.0);
        assert!(kp.y >= 0.0 && kp.y < 180.0);
        assert!(kp.response.is_finite());
    }
}

#[test]
fn test_max_features_is_respected() {
    let image = create_block_texture(320, 240, 11);
    let detector = DetectorConfig {
        max_features: 50,
        ..DetectorConfig::default()
    };
    let extractor = FeatureExtractor::from_config(&detector, &DescriptorConfig::default());
    let keypoints = extractor.detect(&image);
    assert!(!keypoints.is_empty());
    assert!(keypoints.len() <= 50);
}

#[test]
fn test_fast_brief_combination() {
    let image = create_square_grid(160, 160);
    let detector = DetectorConfig {
        kind: DetectorKind::Fast,
        ..DetectorConfig::default()
    };
    let descriptor = DescriptorConfig {
        kind: DescriptorKind::Brief,
        ..DescriptorConfig::default()
    };
    let extractor = FeatureExtractor::from_config(&detector, &descriptor);
    assert_eq!(extractor.detector_name(), "fast");
    assert_eq!(extractor.descriptor_name(), "brief");

    let keypoints = extractor.detect(&image);
    assert!(!keypoints.is_empty());
    assert!(keypoints.iter().all(|kp| kp.octave == 0));

    // Keypoints too close to the border for the sampling pattern are dropped
    let features = extractor.describe(&image, &keypoints);
    assert!(features.len() <= keypoints.len());
    assert!(!features.is_empty());
}

#[test]
fn test_extraction_is_deterministic() {
    let image = create_block_texture(200, 160, 3);
    let extractor = FeatureExtractor::default();
    let first = extractor.detect_and_describe(&image);
    let second = extractor.detect_and_describe(&image);

    assert_eq!(first.len(), second.len());
    assert_eq!(first.descriptors(), second.descriptors());
}

#[test]
fn test_identical_images_match_at_zero_distance() {
    let image = create_block_texture(200, 160, 21);
    let extractor = FeatureExtractor::default();
    let features = extractor.detect_and_describe(&image);
    assert!(!features.is_empty());

    let matcher = DescriptorMatcher::new(&MatcherConfig::default());
    let matches = matcher.try_match(features.descriptors(), features.descriptors()).unwrap();

    assert_eq!(matches.len(), features.len());
    assert!(matches.iter().all(|m| m.distance == 0));
    for m in &matches {
        let query = &features.descriptors()[m.query_idx];
        let train = &features.descriptors()[m.train_idx];
        assert_eq!(hamming_distance(query, train), 0);
    }
}

#[test]
fn test_matcher_rejects_empty_inputs() {
    let matcher = DescriptorMatcher::new(&MatcherConfig::default());
    let some: Vec<Descriptor> = vec![[0u8; 32]; 3];

    assert!(matcher.try_match(&[], &some).is_err());
    assert!(matcher.try_match(&some, &[]).is_err());
    assert!(matcher.match_or_empty(&[], &some).is_empty());
}

#[test]
fn test_cross_check_keeps_mutual_pairs_only() {
    let mut a = [0u8; 32];
    a[0] = 0b0000_0001;
    let mut b = [0u8; 32];
    b[0] = 0b0000_0011;
    let far = [0xffu8; 32];

    // Both template descriptors are closest to scene[0]; only one pair is mutual
    let scene = vec![a, far];
    let template = vec![a, b];

    let plain = DescriptorMatcher::new(&MatcherConfig::default());
    let all = plain.try_match(&scene, &template).unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|m| m.train_idx == 0));

    let checked = DescriptorMatcher::new(&MatcherConfig {
        cross_check: true,
        ..MatcherConfig::default()
    });
    let mutual = checked.try_match(&scene, &template).unwrap();
    assert_eq!(mutual.len(), 1);
    assert_eq!((mutual[0].query_idx, mutual[0].train_idx, mutual[0].distance), (0, 0, 0));
}

#[test]
fn test_steered_descriptors_survive_rotation() {
    let original = create_block_texture(320, 320, 33);
    let rotation = rotation_about_center(320, 30.0);
    let rotated = create_rotated_pattern(&original, &rotation);

    let extractor = FeatureExtractor::default();
    let template = extractor.detect_and_describe(&original);
    let scene = extractor.detect_and_describe(&rotated);

    let matcher = DescriptorMatcher::new(&MatcherConfig::default());
    let matches = matcher.try_match(scene.descriptors(), template.descriptors()).unwrap();
    let correspondences = filter_matches(&matches, scene.keypoints(), template.keypoints(), 30);
    assert!(correspondences.len() >= 30, "only {} matches survived", correspondences.len());

    let correct = correspondences
        .iter()
        .filter(|(scene_point, template_point)| {
            let expected = rotation
                .apply(Point2::new(template_point.x as f64, template_point.y as f64))
                .unwrap();
            let dx = expected.x - scene_point.x as f64;
            let dy = expected.y - scene_point.y as f64;
            (dx * dx + dy * dy).sqrt() <= 5.0
        })
        .count();

    assert!(
        correct * 10 >= correspondences.len() * 7,
        "{correct} of {} matches agree with the rotation",
        correspondences.len()
    );
}
