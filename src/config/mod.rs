use crate::logging::LoggingConfig;
use crate::pipeline::RegistrationMode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorConfig,
    pub descriptor: DescriptorConfig,
    pub matcher: MatcherConfig,
    pub ransac: RansacConfig,
    pub registration: RegistrationConfig,
    pub logging: LoggingConfig,
}

/// Keypoint detection algorithm, fixed when the extractor is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Multi-scale FAST with Harris ranking and intensity-centroid orientation
    #[default]
    Orb,
    /// Single-scale FAST, no orientation
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    /// Steered (rotation-aware) BRIEF
    #[default]
    Orb,
    Brief,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    #[default]
    BruteForceHamming,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub kind: DetectorKind,
    /// FAST intensity threshold
    pub threshold: u8,
    pub non_max_suppression: bool,
    pub max_features: usize,
    pub pyramid_levels: u8,
    pub scale_factor: f32,
    /// Pixels at each pyramid level border where no keypoint is reported
    pub edge_threshold: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    pub kind: DescriptorKind,
    pub patch_size: u32,
    /// Smoothing applied to each pyramid level before the binary tests
    pub blur_sigma: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub kind: MatcherKind,
    pub cross_check: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    pub max_iterations: usize,
    /// Maximum reprojection error in pixels for a correspondence to count as inlier
    pub reprojection_threshold: f64,
    pub confidence: f64,
    /// Refit the winning model on all of its inliers
    pub refine: bool,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub mode: RegistrationMode,
    pub distance_limit: u32,
    /// Weight of the scene in the overlay blend; the warped template gets the rest
    pub blend_alpha: f32,
    pub annotate_matches: bool,
    pub marker_radius: i32,
    pub keypoint_radius: i32,
    /// Longer side the template is rescaled to on load; `None` keeps it as-is
    pub template_max_dimension: Option<u32>,
    pub hanning_window: bool,
    pub record_history: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kind: DetectorKind::Orb,
            threshold: 20,
            non_max_suppression: true,
            max_features: 500,
            pyramid_levels: 8,
            scale_factor: 1.2,
            edge_threshold: 31,
        }
    }
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            kind: DescriptorKind::Orb,
            patch_size: 31,
            blur_sigma: 2.0,
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            kind: MatcherKind::BruteForceHamming,
            cross_check: false,
        }
    }
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            reprojection_threshold: 10.0,
            confidence: 0.995,
            refine: true,
            seed: 0x5eed_0f_4a11,
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            mode: RegistrationMode::FeatureBased,
            distance_limit: 20,
            blend_alpha: 0.5,
            annotate_matches: true,
            marker_radius: 5,
            keypoint_radius: 3,
            template_max_dimension: Some(680),
            hanning_window: false,
            record_history: true,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;

        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> crate::Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path.as_ref(), content)
            .with_context(|| format!("writing config {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.detector.max_features == 0 {
            errors.push("detector max_features must be positive".to_string());
        }

        if self.detector.pyramid_levels == 0 {
            errors.push("detector pyramid_levels must be at least 1".to_string());
        }

        if self.detector.scale_factor <= 1.0 {
            errors.push("detector scale_factor must be greater than 1.0".to_string());
        }

        if self.descriptor.patch_size < 9 {
            errors.push("descriptor patch_size must be at least 9".to_string());
        }

        if self.descriptor.blur_sigma < 0.0 {
            errors.push("descriptor blur_sigma must be non-negative".to_string());
        }

        if self.ransac.max_iterations == 0 {
            errors.push("ransac max_iterations must be positive".to_string());
        }

        if self.ransac.reprojection_threshold <= 0.0 {
            errors.push("ransac reprojection_threshold must be positive".to_string());
        }

        if !(0.0..1.0).contains(&self.ransac.confidence) {
            errors.push("ransac confidence must be in [0, 1)".to_string());
        }

        if !(0.0..=1.0).contains(&self.registration.blend_alpha) {
            errors.push("registration blend_alpha must be in [0, 1]".to_string());
        }

        if self.registration.template_max_dimension == Some(0) {
            errors.push("registration template_max_dimension must be positive".to_string());
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

/// Load `config_path`, falling back to defaults when it is missing, unreadable or invalid.
///
/// Returns the problems found alongside the config so they can be reported
/// once logging is up; logging itself is configured from the result.
pub fn load_config(config_path: Option<&Path>) -> (Config, Vec<String>) {
    let Some(path) = config_path else {
        return (Config::default(), Vec::new());
    };

    match Config::load_from_file(path) {
        Ok(config) => match config.validate() {
            Ok(()) => (config, Vec::new()),
            Err(errors) => {
                let problems = errors
                    .into_iter()
                    .map(|error| format!("{}: {}", path.display(), error))
                    .collect();
                (Config::default(), problems)
            }
        },
        Err(e) => (Config::default(), vec![format!("{}: {:#}", path.display(), e)]),
    }
}
