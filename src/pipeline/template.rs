use crate::algorithms::FeatureExtractor;
use crate::error::RegistrationError;
use crate::logging::TemplateSpan;
use crate::pipeline::types::FeatureSet;
use crate::utils::image_conversion::{resize_to_max_dimension, to_gray};
use image::{GenericImageView, GrayImage, Pixel};
use serde::Serialize;

/// Immutable grayscale template with its cached features
#[derive(Debug, Clone)]
pub struct Template {
    image: GrayImage,
    features: FeatureSet,
    source_size: (u32, u32),
}

/// What a successful template load produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateSummary {
    pub source_width: u32,
    pub source_height: u32,
    pub width: u32,
    pub height: u32,
    pub keypoints: usize,
}

impl Template {
    /// Grayscale, rescale and extract features once.
    ///
    /// Fails without side effects for empty images and for images that yield
    /// no describable keypoints.
    pub fn build<I>(source: &I, extractor: &FeatureExtractor, max_dimension: Option<u32>) -> Result<Self, RegistrationError>
    where
        I: GenericImageView + Sync,
        I::Pixel: Pixel<Subpixel = u8>,
    {
        let source_size = source.dimensions();
        let span = TemplateSpan::new(source_size);
        let _entered = span.enter();

        let result = Self::extract(source, extractor, max_dimension);
        match &result {
            Ok(template) => span.record_loaded(template.image.dimensions(), template.features.len()),
            Err(e) => span.record_failure(e),
        }
        result
    }

    fn extract<I>(source: &I, extractor: &FeatureExtractor, max_dimension: Option<u32>) -> Result<Self, RegistrationError>
    where
        I: GenericImageView + Sync,
        I::Pixel: Pixel<Subpixel = u8>,
    {
        let source_size = source.dimensions();
        if source_size.0 == 0 || source_size.1 == 0 {
            return Err(RegistrationError::EmptyTemplate);
        }

        let gray = to_gray(source);
        let image = match max_dimension {
            Some(max_dimension) => resize_to_max_dimension(&gray, max_dimension),
            None => gray,
        };

        let features = extractor.detect_and_describe(&image);
        if features.is_empty() {
            return Err(RegistrationError::NoTemplateFeatures {
                width: image.width(),
                height: image.height(),
            });
        }

        Ok(Self {
            image,
            features,
            source_size,
        })
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            source_width: self.source_size.0,
            source_height: self.source_size.1,
            width: self.image.width(),
            height: self.image.height(),
            keypoints: self.features.len(),
        }
    }
}
