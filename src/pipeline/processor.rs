use crate::algorithms::{AlignOutcome, Aligner, DescriptorMatcher, FeatureExtractor, PhaseCorrelator};
use crate::config::{Config, RegistrationConfig};
use crate::error::RegistrationError;
use crate::logging::{self, FrameSpan, MetricsCollector};
use crate::pipeline::filter::filter_matches;
use crate::pipeline::stage::{RegistrationStage, StageRecorder};
use crate::pipeline::template::{Template, TemplateSummary};
use crate::pipeline::types::{FrameMetrics, RegistrationMode};
use crate::utils::drawing;
use crate::utils::image_conversion::to_gray_into;
use image::{GenericImageView, GrayImage, Pixel};
use instant::Instant;
use std::path::Path;
use std::sync::Arc;

/// Annotated frame plus the metrics of the call that produced it
#[derive(Debug)]
pub struct FrameOutput<'a> {
    pub frame: &'a GrayImage,
    pub metrics: FrameMetrics,
}

/// Buffers that depend on the view size
struct ViewBuffers {
    canvas: GrayImage,
    correlator: PhaseCorrelator,
}

/// Per-frame registration of the active template against camera frames
pub struct FrameProcessor {
    mode: RegistrationMode,
    distance_limit: u32,
    registration: RegistrationConfig,
    extractor: FeatureExtractor,
    matcher: DescriptorMatcher,
    aligner: Aligner,
    buffers: Option<ViewBuffers>,
    template: Option<Arc<Template>>,
    // Bumped by every load and clear; a load installs only if still current
    template_generation: u64,
    history: Option<Arc<MetricsCollector>>,
}

impl FrameProcessor {
    pub fn new(config: &Config) -> Self {
        let registration = config.registration.clone();
        let history = registration
            .record_history
            .then(|| Arc::new(MetricsCollector::new(true)));

        Self {
            mode: registration.mode,
            distance_limit: registration.distance_limit,
            extractor: FeatureExtractor::from_config(&config.detector, &config.descriptor),
            matcher: DescriptorMatcher::new(&config.matcher),
            aligner: Aligner::new(config.ransac.clone(), registration.blend_alpha),
            buffers: None,
            template: None,
            template_generation: 0,
            history,
            registration,
        }
    }

    /// Allocate the frame buffers. Must be called before the first frame.
    pub fn set_view_size(&mut self, width: u32, height: u32) -> Result<(), RegistrationError> {
        if width == 0 || height == 0 {
            return Err(RegistrationError::InvalidViewSize { width, height });
        }
        if self.view_size() == Some((width, height)) {
            return Ok(());
        }

        self.buffers = Some(ViewBuffers {
            canvas: GrayImage::new(width, height),
            correlator: PhaseCorrelator::new(width, height, self.registration.hanning_window),
        });
        self.aligner.resize(width, height);
        tracing::info!(width, height, "View size set");
        Ok(())
    }

    pub fn view_size(&self) -> Option<(u32, u32)> {
        self.buffers.as_ref().map(|buffers| buffers.canvas.dimensions())
    }

    /// Run one frame through the pipeline and return the annotated canvas.
    ///
    /// Fails only when the view size is unset or the frame does not match it;
    /// matching and geometry problems degrade to a frame without overlay.
    pub fn process<I>(&mut self, frame: &I) -> Result<FrameOutput<'_>, RegistrationError>
    where
        I: GenericImageView + Sync,
        I::Pixel: Pixel<Subpixel = u8>,
    {
        let start = Instant::now();
        let Self {
            mode,
            distance_limit,
            registration,
            extractor,
            matcher,
            aligner,
            buffers,
            template,
            history,
            template_generation: _,
        } = self;

        let buffers = buffers.as_mut().ok_or(RegistrationError::ViewSizeNotSet)?;
        let (width, height) = buffers.canvas.dimensions();
        if frame.dimensions() != (width, height) {
            let (actual_width, actual_height) = frame.dimensions();
            tracing::warn!(actual_width, actual_height, width, height, "Frame does not match the view size");
            return Err(RegistrationError::FrameSizeMismatch {
                expected_width: width,
                expected_height: height,
                actual_width,
                actual_height,
            });
        }

        let mode = *mode;
        let distance_limit = *distance_limit;
        let template = template.clone();
        let canvas = &mut buffers.canvas;
        let correlator = &mut buffers.correlator;

        let span = FrameSpan::new(mode.name(), (width, height), logging::new_correlation_id());
        let _entered = span.enter();
        let mut recorder = StageRecorder::new(mode, history.clone(), span.correlation_id());

        recorder.measure(RegistrationStage::Preprocess, || to_gray_into(frame, canvas))?;

        match (mode, template) {
            (RegistrationMode::FeatureBased, None) => {
                let keypoints = recorder.measure(RegistrationStage::Detection, || extractor.detect(canvas));
                span.record_keypoints(keypoints.len());
                recorder.metrics_mut().keypoints = keypoints.len();
                drawing::draw_keypoints(canvas, &keypoints, registration.keypoint_radius);
            }
            (RegistrationMode::FeatureBased, Some(template)) => {
                let keypoints = recorder.measure(RegistrationStage::Detection, || extractor.detect(canvas));
                let scene = recorder.measure(RegistrationStage::Description, || extractor.describe(canvas, &keypoints));
                span.record_keypoints(scene.len());

                let matches = recorder.measure(RegistrationStage::Matching, || {
                    matcher.match_or_empty(scene.descriptors(), template.features().descriptors())
                });

                let correspondences = recorder.measure(RegistrationStage::Filtering, || {
                    let correspondences = filter_matches(
                        &matches,
                        scene.keypoints(),
                        template.features().keypoints(),
                        distance_limit,
                    );
                    if registration.annotate_matches {
                        drawing::draw_correspondences(canvas, &correspondences, registration.marker_radius);
                    }
                    correspondences
                });
                span.record_matching(matches.len(), correspondences.len(), distance_limit);

                let outcome = recorder.measure(RegistrationStage::Homography, || {
                    aligner.align(&correspondences, template.image(), canvas)
                });

                let metrics = recorder.metrics_mut();
                metrics.keypoints = scene.len();
                metrics.matches = correspondences.len();
                match outcome {
                    AlignOutcome::Skipped { .. } => {
                        span.record_overlay(false, 0, false);
                    }
                    AlignOutcome::Blended { inliers, degenerate, .. } => {
                        metrics.overlay_blended = true;
                        span.record_overlay(true, inliers, degenerate);
                    }
                }
            }
            (RegistrationMode::AreaBased, None) => {}
            (RegistrationMode::AreaBased, Some(template)) => {
                let shift = recorder.measure(RegistrationStage::Correlation, || {
                    correlator.correlate(canvas, template.image())
                });

                let (tw, th) = template.image().dimensions();
                let cx = tw as f64 / 2.0 + shift.dx;
                let cy = th as f64 / 2.0 + shift.dy;
                if !drawing::draw_location(canvas, cx, cy) {
                    tracing::trace!(cx, cy, "Translated template centre outside the frame");
                }
                recorder.metrics_mut().correlation = Some(shift);
            }
        }

        let metrics = recorder.finish(start.elapsed());
        span.record_completion(metrics.matches);

        Ok(FrameOutput {
            frame: canvas,
            metrics,
        })
    }

    /// Replace the active template. On failure the previous template stays active.
    pub fn load_template<I>(&mut self, image: &I) -> Result<TemplateSummary, RegistrationError>
    where
        I: GenericImageView + Sync,
        I::Pixel: Pixel<Subpixel = u8>,
    {
        let generation = self.begin_template_load();
        let template = Template::build(image, &self.extractor, self.registration.template_max_dimension)?;
        let summary = template.summary();
        self.install_template(Arc::new(template), generation);
        Ok(summary)
    }

    pub fn load_template_from_path<P: AsRef<Path>>(&mut self, path: P) -> Result<TemplateSummary, RegistrationError> {
        let image = image::open(path.as_ref())?;
        self.load_template(&image)
    }

    /// Start a template load and return the generation it must still hold to install
    pub(crate) fn begin_template_load(&mut self) -> u64 {
        self.template_generation = self.template_generation.wrapping_add(1);
        self.template_generation
    }

    /// Install `template` unless a later load or clear has started since `generation`
    pub(crate) fn install_template(&mut self, template: Arc<Template>, generation: u64) -> bool {
        if generation != self.template_generation {
            tracing::debug!(generation, current = self.template_generation, "Superseded template load discarded");
            return false;
        }
        self.template = Some(template);
        true
    }

    pub fn clear_template(&mut self) {
        self.template_generation = self.template_generation.wrapping_add(1);
        if self.template.take().is_some() {
            tracing::info!("Template cleared");
        }
    }

    pub fn template(&self) -> Option<&Arc<Template>> {
        self.template.as_ref()
    }

    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    pub fn set_distance_limit(&mut self, limit: u32) {
        tracing::debug!(previous = self.distance_limit, limit, "Distance limit changed");
        self.distance_limit = limit;
    }

    pub fn distance_limit(&self) -> u32 {
        self.distance_limit
    }

    /// Switch between feature- and area-based registration, effective from the next frame
    pub fn toggle_mode(&mut self) -> RegistrationMode {
        self.set_mode(self.mode.toggled());
        self.mode
    }

    pub fn set_mode(&mut self, mode: RegistrationMode) {
        if mode != self.mode {
            tracing::info!(mode = mode.name(), "Registration mode changed");
        }
        self.mode = mode;
    }

    pub fn mode(&self) -> RegistrationMode {
        self.mode
    }

    /// Touch input has no effect on registration
    pub fn deliver_touch_event(&mut self, x: f32, y: f32) {
        tracing::trace!(x, y, "Touch event ignored");
    }

    pub fn metrics_history(&self) -> Option<Arc<MetricsCollector>> {
        self.history.clone()
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn template_max_dimension(&self) -> Option<u32> {
        self.registration.template_max_dimension
    }
}

impl std::fmt::Debug for FrameProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProcessor")
            .field("mode", &self.mode)
            .field("distance_limit", &self.distance_limit)
            .field("view_size", &self.view_size())
            .field("template", &self.template.as_ref().map(|t| t.summary()))
            .field("extractor", &self.extractor)
            .finish()
    }
}
