//! Per-frame registration pipeline
pub mod filter;
pub mod processor;
pub mod shared;
pub mod stage;
pub mod template;
pub mod traits;
pub mod types;

pub use filter::filter_matches;
pub use processor::{FrameOutput, FrameProcessor};
pub use shared::SharedProcessor;
pub use stage::{RegistrationStage, StageRecorder};
pub use template::{Template, TemplateSummary};
pub use traits::*;
pub use types::*;
