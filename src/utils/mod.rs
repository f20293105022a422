pub mod drawing;
pub mod image_conversion;
pub mod ransac;

pub use image_conversion::{load_image, resize_to_max_dimension, to_gray, to_gray_into};
pub use ransac::{find_homography_ransac, HomographyEstimate};
