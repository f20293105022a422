use crate::pipeline::{Correspondences, Keypoint};
use image::{GrayImage, Luma};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut};

const MARKER: Luma<u8> = Luma([255]);

/// Hollow circle around every keypoint
pub fn draw_keypoints(canvas: &mut GrayImage, keypoints: &[Keypoint], radius: i32) {
    for keypoint in keypoints {
        let center = (keypoint.x.round() as i32, keypoint.y.round() as i32);
        draw_hollow_circle_mut(canvas, center, radius, MARKER);
    }
}

/// Hollow circle at every surviving scene point
pub fn draw_correspondences(canvas: &mut GrayImage, correspondences: &Correspondences, radius: i32) {
    for point in &correspondences.scene {
        let center = (point.x.round() as i32, point.y.round() as i32);
        draw_hollow_circle_mut(canvas, center, radius, MARKER);
    }
}

/// Cross at a location, skipped when it lies outside the canvas
pub fn draw_location(canvas: &mut GrayImage, x: f64, y: f64) -> bool {
    let inside = x >= 0.0 && y >= 0.0 && x < canvas.width() as f64 && y < canvas.height() as f64;
    if inside {
        draw_cross_mut(canvas, MARKER, x.round() as i32, y.round() as i32);
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn test_markers_are_drawn_in_white() {
        let mut canvas = GrayImage::new(40, 40);
        let mut correspondences = Correspondences::default();
        correspondences.push(Point2::new(20.0, 20.0), Point2::new(0.0, 0.0));

        draw_correspondences(&mut canvas, &correspondences, 5);
        assert_eq!(canvas.get_pixel(25, 20)[0], 255);
        assert_eq!(canvas.get_pixel(20, 20)[0], 0);
    }

    #[test]
    fn test_location_outside_canvas_is_skipped() {
        let mut canvas = GrayImage::new(10, 10);
        assert!(!draw_location(&mut canvas, -3.0, 4.0));
        assert!(canvas.pixels().all(|p| p[0] == 0));
        assert!(draw_location(&mut canvas, 5.0, 5.0));
        assert_eq!(canvas.get_pixel(5, 5)[0], 255);
    }
}
