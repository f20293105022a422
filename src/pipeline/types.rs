use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 256-bit binary descriptor
pub type Descriptor = [u8; 32];

/// Which registration branch runs for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationMode {
    /// Keypoints, descriptors, matching and homography overlay
    #[default]
    FeatureBased,
    /// Phase-correlation translation estimate
    AreaBased,
}

impl RegistrationMode {
    pub fn toggled(self) -> Self {
        match self {
            RegistrationMode::FeatureBased => RegistrationMode::AreaBased,
            RegistrationMode::AreaBased => RegistrationMode::FeatureBased,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RegistrationMode::FeatureBased => "feature_based",
            RegistrationMode::AreaBased => "area_based",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Position in full-resolution image coordinates
    pub x: f32,
    pub y: f32,
    pub response: f32,
    /// Orientation in radians
    pub angle: f32,
    /// Pyramid level the keypoint was detected on
    pub octave: u8,
    /// Diameter of the described neighbourhood at full resolution
    pub size: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            response: 0.0,
            angle: 0.0,
            octave: 0,
            size: 31.0,
        }
    }

    pub fn point(&self) -> Point2<f32> {
        Point2::new(self.x, self.y)
    }
}

/// Keypoints with their descriptors; row `i` of `descriptors` describes `keypoints[i]`
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    keypoints: Vec<Keypoint>,
    descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keypoints: Vec::with_capacity(capacity),
            descriptors: Vec::with_capacity(capacity),
        }
    }

    /// Appending pairs is the only way in, which keeps both sequences aligned
    pub fn push(&mut self, keypoint: Keypoint, descriptor: Descriptor) {
        self.keypoints.push(keypoint);
        self.descriptors.push(descriptor);
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

impl FromIterator<(Keypoint, Descriptor)> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = (Keypoint, Descriptor)>>(iter: T) -> Self {
        let (keypoints, descriptors) = iter.into_iter().unzip();
        Self {
            keypoints,
            descriptors,
        }
    }
}

/// Nearest scene descriptor for one template descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Index into the template descriptors
    pub query_idx: usize,
    /// Index into the scene descriptors
    pub train_idx: usize,
    /// Hamming distance in bits
    pub distance: u32,
}

/// Surviving point pairs; `scene[i]` corresponds to `template[i]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correspondences {
    pub scene: Vec<Point2<f32>>,
    pub template: Vec<Point2<f32>>,
}

impl Correspondences {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scene: Vec::with_capacity(capacity),
            template: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, scene: Point2<f32>, template: Point2<f32>) {
        self.scene.push(scene);
        self.template.push(template);
    }

    pub fn len(&self) -> usize {
        self.scene.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scene.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Point2<f32>, &Point2<f32>)> {
        self.scene.iter().zip(self.template.iter())
    }
}

/// Translation between scene and template estimated by phase correlation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseShift {
    pub dx: f64,
    pub dy: f64,
    /// Height of the normalized correlation peak
    pub response: f64,
}

/// Timings and counts for one processed frame. All durations are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub mode: RegistrationMode,
    pub detection_ms: f64,
    pub description_ms: f64,
    pub matching_ms: f64,
    pub filtering_ms: f64,
    pub homography_ms: f64,
    pub correlation_ms: f64,
    pub total_ms: f64,
    pub keypoints: usize,
    /// Correspondences that survived the distance filter
    pub matches: usize,
    pub overlay_blended: bool,
    pub correlation: Option<PhaseShift>,
    /// Frames per second implied by `total_ms`; `None` when the frame took no measurable time
    pub display_rate: Option<f64>,
}

impl FrameMetrics {
    pub fn new(mode: RegistrationMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub(crate) fn finish(&mut self, total_ms: f64) {
        self.total_ms = total_ms.max(0.0);
        self.display_rate = if self.total_ms > 0.0 {
            Some(1000.0 / self.total_ms)
        } else {
            None
        };
    }
}

impl fmt::Display for FrameMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display_rate {
            Some(rate) => writeln!(f, "FPS: {:.0}", rate)?,
            None => writeln!(f, "FPS: -")?,
        }
        writeln!(f, "Detection: {:.1}ms", self.detection_ms)?;
        writeln!(f, "Description: {:.1}ms", self.description_ms)?;
        writeln!(f, "Matching: {:.1}ms", self.matching_ms)?;
        writeln!(f, "Good Matches: {}", self.matches)?;
        writeln!(f, "Filter: {:.1}ms", self.filtering_ms)?;
        write!(f, "Homography: {:.1}ms", self.homography_ms)?;
        if let Some(shift) = self.correlation {
            write!(
                f,
                "\nPhase shift: ({:.1}, {:.1}) in {:.1}ms",
                shift.dx, shift.dy, self.correlation_ms
            )?;
        }
        Ok(())
    }
}
