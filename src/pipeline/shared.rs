use crate::config::Config;
use crate::error::RegistrationError;
use crate::logging::MetricsCollector;
use crate::pipeline::processor::FrameProcessor;
use crate::pipeline::template::{Template, TemplateSummary};
use crate::pipeline::types::{FrameMetrics, RegistrationMode};
use image::{GenericImageView, GrayImage, Pixel};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle for driving one [`FrameProcessor`] from several threads.
///
/// Every operation takes the same lock, so a frame never observes a half
/// applied change. Template loads do their feature extraction outside the
/// lock and only swap the template under it. A load that a later load or
/// [`clear_template`](Self::clear_template) overtook is discarded.
#[derive(Clone)]
pub struct SharedProcessor {
    inner: Arc<Mutex<FrameProcessor>>,
}

impl SharedProcessor {
    pub fn new(config: &Config) -> Self {
        Self::from_processor(FrameProcessor::new(config))
    }

    pub fn from_processor(processor: FrameProcessor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(processor)),
        }
    }

    // A panic inside a previous call leaves no field half-updated
    fn lock(&self) -> MutexGuard<'_, FrameProcessor> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Process a frame and hand the annotated canvas to `consume` while the lock is held
    pub fn process<I, F, R>(&self, frame: &I, consume: F) -> Result<R, RegistrationError>
    where
        I: GenericImageView + Sync,
        I::Pixel: Pixel<Subpixel = u8>,
        F: FnOnce(&GrayImage, &FrameMetrics) -> R,
    {
        let mut processor = self.lock();
        let output = processor.process(frame)?;
        Ok(consume(output.frame, &output.metrics))
    }

    pub fn set_view_size(&self, width: u32, height: u32) -> Result<(), RegistrationError> {
        self.lock().set_view_size(width, height)
    }

    pub fn load_template<I>(&self, image: &I) -> Result<TemplateSummary, RegistrationError>
    where
        I: GenericImageView + Sync,
        I::Pixel: Pixel<Subpixel = u8>,
    {
        let (extractor, max_dimension, generation) = {
            let mut processor = self.lock();
            let generation = processor.begin_template_load();
            (processor.extractor().clone(), processor.template_max_dimension(), generation)
        };

        let template = Template::build(image, &extractor, max_dimension)?;
        let summary = template.summary();
        self.lock().install_template(Arc::new(template), generation);
        Ok(summary)
    }

    pub fn load_template_from_path<P: AsRef<Path>>(&self, path: P) -> Result<TemplateSummary, RegistrationError> {
        let image = image::open(path.as_ref())?;
        self.load_template(&image)
    }

    pub fn clear_template(&self) {
        self.lock().clear_template();
    }

    pub fn has_template(&self) -> bool {
        self.lock().has_template()
    }

    pub fn template_summary(&self) -> Option<TemplateSummary> {
        self.lock().template().map(|template| template.summary())
    }

    pub fn set_distance_limit(&self, limit: u32) {
        self.lock().set_distance_limit(limit);
    }

    pub fn distance_limit(&self) -> u32 {
        self.lock().distance_limit()
    }

    pub fn toggle_mode(&self) -> RegistrationMode {
        self.lock().toggle_mode()
    }

    pub fn set_mode(&self, mode: RegistrationMode) {
        self.lock().set_mode(mode);
    }

    pub fn mode(&self) -> RegistrationMode {
        self.lock().mode()
    }

    pub fn deliver_touch_event(&self, x: f32, y: f32) {
        self.lock().deliver_touch_event(x, y);
    }

    pub fn metrics_history(&self) -> Option<Arc<MetricsCollector>> {
        self.lock().metrics_history()
    }
}
