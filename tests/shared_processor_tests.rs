use image::{imageops, GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use recapture::config::Config;
use recapture::pipeline::{RegistrationMode, SharedProcessor};
use std::thread;
use std::time::Duration;

fn create_block_texture(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let blocks_x = width.div_ceil(8);
    let blocks_y = height.div_ceil(8);
    let values: Vec<u8> = (0..blocks_x * blocks_y).map(|_| rng.gen()).collect();
    GrayImage::from_fn(width, height, |x, y| Luma([values[((y / 8) * blocks_x + x / 8) as usize]]))
}

fn shared_with_view(width: u32, height: u32) -> SharedProcessor {
    let mut config = Config::default();
    config.registration.template_max_dimension = None;
    let shared = SharedProcessor::new(&config);
    shared.set_view_size(width, height).unwrap();
    shared
}

#[test]
fn test_frames_from_several_threads() {
    let shared = shared_with_view(160, 120);
    let template = create_block_texture(80, 80, 4);
    shared.load_template(&template).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let shared = shared.clone();
            let template = template.clone();
            thread::spawn(move || {
                let mut scene = GrayImage::new(160, 120);
                imageops::replace(&mut scene, &template, 20 + i as i64 * 5, 10);
                (0..3)
                    .map(|_| shared.process(&scene, |frame, metrics| (frame.dimensions(), metrics.total_ms)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for (dimensions, total_ms) in handle.join().unwrap() {
            assert_eq!(dimensions, (160, 120));
            assert!(total_ms >= 0.0);
        }
    }

    let history = shared.metrics_history().unwrap();
    assert_eq!(history.get_measurements("preprocess").len(), 12);
}

#[test]
fn test_settings_are_visible_across_clones() {
    let shared = shared_with_view(64, 48);
    let other = shared.clone();

    other.set_distance_limit(42);
    assert_eq!(shared.distance_limit(), 42);

    assert_eq!(other.toggle_mode(), RegistrationMode::AreaBased);
    assert_eq!(shared.mode(), RegistrationMode::AreaBased);
    shared.set_mode(RegistrationMode::FeatureBased);
    assert_eq!(other.mode(), RegistrationMode::FeatureBased);

    other.deliver_touch_event(1.0, 2.0);
    assert_eq!(shared.distance_limit(), 42);
}

#[test]
fn test_template_swap_while_processing() {
    let shared = shared_with_view(160, 120);
    let scene = create_block_texture(160, 120, 9);

    let loader = {
        let shared = shared.clone();
        thread::spawn(move || {
            for seed in 0..3 {
                shared.load_template(&create_block_texture(96, 96, seed)).unwrap();
            }
            shared.clear_template();
        })
    };

    for _ in 0..5 {
        let size = shared.process(&scene, |frame, _| frame.dimensions()).unwrap();
        assert_eq!(size, (160, 120));
    }
    loader.join().unwrap();
    assert!(!shared.has_template());
}

#[test]
fn test_failed_load_through_handle_keeps_template() {
    let shared = shared_with_view(64, 48);
    shared.load_template(&create_block_texture(96, 96, 1)).unwrap();

    let flat = GrayImage::from_pixel(96, 96, Luma([50]));
    assert!(shared.load_template(&flat).is_err());
    assert!(shared.has_template());
}

#[test]
fn test_missing_template_file_is_reported() {
    let shared = shared_with_view(64, 48);
    let dir = tempfile::tempdir().unwrap();
    assert!(shared.load_template_from_path(dir.path().join("missing.png")).is_err());
    assert!(!shared.has_template());
}

#[test]
fn test_clear_during_slow_load_wins() {
    let shared = shared_with_view(64, 48);
    let large = create_block_texture(2400, 2400, 21);

    let loader = {
        let shared = shared.clone();
        thread::spawn(move || shared.load_template(&large))
    };

    thread::sleep(Duration::from_millis(30));
    shared.clear_template();

    assert!(loader.join().unwrap().is_ok());
    assert!(!shared.has_template());
}

#[test]
fn test_earlier_load_finishing_late_is_discarded() {
    let shared = shared_with_view(64, 48);
    let large = create_block_texture(2400, 2400, 22);

    let loader = {
        let shared = shared.clone();
        thread::spawn(move || shared.load_template(&large).unwrap())
    };

    thread::sleep(Duration::from_millis(30));
    let small = shared.load_template(&create_block_texture(96, 96, 23)).unwrap();
    let stale = loader.join().unwrap();

    assert_eq!(stale.width, 2400);
    assert_eq!(shared.template_summary(), Some(small));
}
