use crate::algorithms::homography::Homography;
use image::GrayImage;
use nalgebra::Vector3;
use rayon::prelude::*;

/// Warp `src` through `homography` into `dst` by inverse mapping with bilinear sampling.
///
/// Pixels of `dst` whose preimage falls outside `src` are set to 0. Returns
/// `false` and leaves `dst` black when the homography is not invertible.
pub fn warp_perspective_into(src: &GrayImage, homography: &Homography, dst: &mut GrayImage) -> bool {
    let width = dst.width() as usize;
    let Some(inverse) = homography.try_inverse() else {
        dst.fill(0);
        return false;
    };
    let inverse = inverse.0;
    let (src_w, src_h) = (src.width() as f64, src.height() as f64);

    let pixels: &mut [u8] = dst;
    pixels.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let p = inverse * Vector3::new(x as f64, y as f64, 1.0);
            *out = if p.z.abs() < f64::EPSILON {
                0
            } else {
                let (u, v) = (p.x / p.z, p.y / p.z);
                if u < 0.0 || v < 0.0 || u > src_w - 1.0 || v > src_h - 1.0 {
                    0
                } else {
                    sample_bilinear(src, u, v)
                }
            };
        }
    });

    true
}

/// Bilinear interpolation at a point inside the image
fn sample_bilinear(image: &GrayImage, u: f64, v: f64) -> u8 {
    let x0 = u.floor() as u32;
    let y0 = v.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);
    let fx = u - x0 as f64;
    let fy = v - y0 as f64;

    let p = |x: u32, y: u32| image.get_pixel(x, y)[0] as f64;
    let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
    let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
    (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
}

/// `canvas = alpha * canvas + (1 - alpha) * overlay`, rounded and saturated
pub fn blend_into(canvas: &mut GrayImage, overlay: &GrayImage, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let beta = 1.0 - alpha;
    let pixels: &mut [u8] = canvas;
    pixels
        .par_iter_mut()
        .zip(overlay.as_raw().par_iter())
        .for_each(|(c, &o)| {
            *c = (alpha * *c as f32 + beta * o as f32).round().clamp(0.0, 255.0) as u8;
        });
}
