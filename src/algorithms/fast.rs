//! FAST-9 segment test corner detection
//!
//! A pixel is a corner when 9 contiguous pixels on the Bresenham circle of
//! radius 3 around it are all brighter than `center + threshold` or all darker
//! than `center - threshold`.

use crate::pipeline::{Keypoint, KeypointDetector};
use image::GrayImage;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Circle offsets in clockwise order, starting at twelve o'clock
const CIRCLE: [(i32, i32); 16] = [
    (0, -3), (1, -3), (2, -2), (3, -1), (3, 0), (3, 1), (2, 2), (1, 3),
    (0, 3), (-1, 3), (-2, 2), (-3, 1), (-3, 0), (-3, -1), (-2, -2), (-1, -3),
];

const ARC_LENGTH: usize = 9;

/// Smallest border the circle test needs
pub const MIN_BORDER: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FastCorner {
    pub x: u32,
    pub y: u32,
    pub score: f32,
}

/// Detect FAST-9 corners at least `border` pixels away from every edge.
///
/// With `non_max_suppression` a corner survives only if its score is the
/// maximum of its 3x3 neighbourhood; ties go to the first corner in raster order.
pub fn detect_corners(image: &GrayImage, threshold: u8, non_max_suppression: bool, border: u32) -> Vec<FastCorner> {
    let (width, height) = image.dimensions();
    let border = border.max(MIN_BORDER);
    if width <= 2 * border || height <= 2 * border {
        return Vec::new();
    }

    let mut scores = vec![0.0f32; (width * height) as usize];
    scores
        .par_chunks_mut(width as usize)
        .enumerate()
        .filter(|(y, _)| *y as u32 >= border && (*y as u32) < height - border)
        .for_each(|(y, row)| {
            for x in border..(width - border) {
                row[x as usize] = corner_score(image, x, y as u32, threshold).unwrap_or(0.0);
            }
        });

    let mut corners = Vec::new();
    for y in border..(height - border) {
        for x in border..(width - border) {
            let score = scores[(y * width + x) as usize];
            if score <= 0.0 {
                continue;
            }
            if non_max_suppression && !is_local_maximum(&scores, width, x, y, score) {
                continue;
            }
            corners.push(FastCorner { x, y, score });
        }
    }

    corners
}

/// FAST score of a pixel, `None` when it fails the segment test
pub fn corner_score(image: &GrayImage, x: u32, y: u32, threshold: u8) -> Option<f32> {
    let center = image.get_pixel(x, y)[0] as i16;
    let threshold = threshold as i16;
    let ring = sample_ring(image, x, y);

    // Any 9-arc covers at least two of the four cardinal pixels
    let cardinal = [ring[0], ring[4], ring[8], ring[12]];
    let bright_cardinal = cardinal.iter().filter(|&&p| p > center + threshold).count();
    let dark_cardinal = cardinal.iter().filter(|&&p| p < center - threshold).count();
    if bright_cardinal < 2 && dark_cardinal < 2 {
        return None;
    }

    let mut bright_mask = 0u32;
    let mut dark_mask = 0u32;
    let mut bright_sum = 0i32;
    let mut dark_sum = 0i32;
    for (i, &p) in ring.iter().enumerate() {
        if p > center + threshold {
            bright_mask |= 1 << i;
            bright_sum += (p - center - threshold) as i32;
        } else if p < center - threshold {
            dark_mask |= 1 << i;
            dark_sum += (center - threshold - p) as i32;
        }
    }

    let bright = has_arc(bright_mask);
    let dark = has_arc(dark_mask);
    match (bright, dark) {
        (true, true) => Some(bright_sum.max(dark_sum) as f32),
        (true, false) => Some(bright_sum as f32),
        (false, true) => Some(dark_sum as f32),
        (false, false) => None,
    }
}

fn sample_ring(image: &GrayImage, x: u32, y: u32) -> [i16; 16] {
    let mut ring = [0i16; 16];
    for (value, &(dx, dy)) in ring.iter_mut().zip(CIRCLE.iter()) {
        let px = (x as i32 + dx) as u32;
        let py = (y as i32 + dy) as u32;
        *value = image.get_pixel(px, py)[0] as i16;
    }
    ring
}

/// True when the 16-bit circular mask holds a run of at least `ARC_LENGTH` set bits
fn has_arc(mask: u32) -> bool {
    let mut run = mask | (mask << 16);
    for _ in 1..ARC_LENGTH {
        run &= run >> 1;
    }
    run != 0
}

fn is_local_maximum(scores: &[f32], width: u32, x: u32, y: u32, score: f32) -> bool {
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = (x as i32 + dx) as u32;
            let ny = (y as i32 + dy) as u32;
            let neighbour = scores[(ny * width + nx) as usize];
            let precedes = dy < 0 || (dy == 0 && dx < 0);
            if neighbour > score || (precedes && neighbour == score) {
                return false;
            }
        }
    }
    true
}

/// Single-scale FAST detector; the FAST score is the response and every angle is 0
#[derive(Debug, Clone)]
pub struct FastDetector {
    pub threshold: u8,
    pub non_max_suppression: bool,
    pub max_features: usize,
    pub border: u32,
}

impl KeypointDetector for FastDetector {
    fn name(&self) -> &'static str {
        "fast"
    }

    fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        let mut corners = detect_corners(image, self.threshold, self.non_max_suppression, self.border);
        corners.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        corners.truncate(self.max_features);

        corners
            .into_iter()
            .map(|corner| Keypoint {
                response: corner.score,
                ..Keypoint::new(corner.x as f32, corner.y as f32)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn square_image() -> GrayImage {
        GrayImage::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (10..30).contains(&y) {
                Luma([220])
            } else {
                Luma([30])
            }
        })
    }

    #[test]
    fn test_arc_detection_wraps_around() {
        // bits 12..15 and 0..4 form a 9-long run across the wrap point
        let mask = 0b1111_0000_0001_1111;
        assert!(has_arc(mask));
        assert!(!has_arc(0b0000_0000_1111_1111));
    }

    #[test]
    fn test_flat_image_has_no_corners() {
        let image = GrayImage::from_pixel(32, 32, Luma([128]));
        assert!(detect_corners(&image, 20, true, 3).is_empty());
    }

    #[test]
    fn test_square_corners_detected() {
        let image = square_image();
        let corners = detect_corners(&image, 20, true, 3);
        assert!(!corners.is_empty());

        for (cx, cy) in [(10, 10), (29, 10), (10, 29), (29, 29)] {
            assert!(
                corners.iter().any(|c| (c.x as i32 - cx).abs() <= 2 && (c.y as i32 - cy).abs() <= 2),
                "no corner near ({cx}, {cy})"
            );
        }
    }

    #[test]
    fn test_border_is_respected() {
        let image = square_image();
        let corners = detect_corners(&image, 20, false, 12);
        assert!(corners.iter().all(|c| c.x >= 12 && c.y >= 12 && c.x < 28 && c.y < 28));
    }
}
