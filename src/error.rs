use thiserror::Error;

/// Errors surfaced to the collaborators driving a [`crate::pipeline::FrameProcessor`].
///
/// Per-frame faults inside the pipeline (failed matching, degenerate geometry)
/// are logged and degrade to "no overlay"; only setup problems, template
/// loading and caller precondition violations end up here.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("view size has not been set; call set_view_size before processing frames")]
    ViewSizeNotSet,

    #[error("invalid view size {width}x{height}")]
    InvalidViewSize { width: u32, height: u32 },

    #[error("frame is {actual_width}x{actual_height} but the view size is {expected_width}x{expected_height}")]
    FrameSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("failed to decode template image: {0}")]
    TemplateDecode(#[from] image::ImageError),

    #[error("template image is empty")]
    EmptyTemplate,

    #[error("template {width}x{height} produced no usable features")]
    NoTemplateFeatures { width: u32, height: u32 },
}

/// Failure of the descriptor matcher. Never raised past the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("cannot match {scene} scene descriptors against {template} template descriptors")]
    EmptyDescriptors { scene: usize, template: usize },
}
