use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{imageops, GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use recapture::algorithms::{DescriptorMatcher, FeatureExtractor, PhaseCorrelator};
use recapture::config::{Config, MatcherConfig};
use recapture::pipeline::{FrameProcessor, RegistrationMode};

fn block_texture(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let blocks_x = width.div_ceil(8);
    let values: Vec<u8> = (0..blocks_x * height.div_ceil(8)).map(|_| rng.gen()).collect();
    GrayImage::from_fn(width, height, |x, y| Luma([values[((y / 8) * blocks_x + x / 8) as usize]]))
}

fn scene(template: &GrayImage, width: u32, height: u32) -> GrayImage {
    let mut scene = GrayImage::from_pixel(width, height, Luma([20]));
    imageops::replace(&mut scene, template, 120, 80);
    scene
}

fn bench_extraction(c: &mut Criterion) {
    let extractor = FeatureExtractor::default();
    let mut group = c.benchmark_group("extraction");
    for (width, height) in [(320u32, 240u32), (680, 460)] {
        let image = block_texture(width, height, 1);
        group.bench_with_input(BenchmarkId::new("orb", format!("{}x{}", width, height)), &image, |b, image| {
            b.iter(|| extractor.detect_and_describe(black_box(image)))
        });
    }
    group.finish();
}

fn bench_matching(c: &mut Criterion) {
    let extractor = FeatureExtractor::default();
    let template = extractor.detect_and_describe(&block_texture(340, 240, 2));
    let frame = extractor.detect_and_describe(&scene(&block_texture(340, 240, 2), 680, 460));
    let matcher = DescriptorMatcher::new(&MatcherConfig::default());

    c.bench_function("matching/brute_force_hamming", |b| {
        b.iter(|| matcher.match_or_empty(black_box(frame.descriptors()), black_box(template.descriptors())))
    });
}

fn bench_correlation(c: &mut Criterion) {
    let template = block_texture(240, 160, 3);
    let frame = scene(&template, 680, 460);
    let mut correlator = PhaseCorrelator::new(680, 460, false);

    c.bench_function("correlation/680x460", |b| {
        b.iter(|| correlator.correlate(black_box(&frame), black_box(&template)))
    });
}

fn bench_frame(c: &mut Criterion) {
    let template = block_texture(240, 160, 4);
    let frame = scene(&template, 680, 460);

    let mut config = Config::default();
    config.registration.template_max_dimension = None;
    config.registration.record_history = false;

    let mut group = c.benchmark_group("frame");
    for mode in [RegistrationMode::FeatureBased, RegistrationMode::AreaBased] {
        let mut processor = FrameProcessor::new(&config);
        processor.set_view_size(680, 460).ok();
        processor.load_template(&template).ok();
        processor.set_mode(mode);

        group.bench_function(mode.name(), |b| {
            b.iter(|| processor.process(black_box(&frame)).map(|output| output.metrics.matches))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extraction, bench_matching, bench_correlation, bench_frame);
criterion_main!(benches);
