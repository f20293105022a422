//! Live template registration: detects, matches and aligns a captured
//! template against camera frames and overlays it onto the scene.
pub mod algorithms;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod utils;

pub use config::Config;
pub use error::{MatchError, RegistrationError};
pub use pipeline::{FrameMetrics, FrameOutput, FrameProcessor, RegistrationMode, SharedProcessor};

pub type Result<T> = anyhow::Result<T>;
