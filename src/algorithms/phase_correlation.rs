//! Translation estimate by phase correlation
//!
//! The normalized cross-power spectrum of scene and template has an inverse
//! transform that peaks at the shift between them.

use crate::pipeline::PhaseShift;
use image::GrayImage;
use ndarray::Array2;
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

const MAGNITUDE_FLOOR: f32 = 1e-10;

/// FFT plans and buffers for one view size
pub struct PhaseCorrelator {
    width: usize,
    height: usize,
    window: Option<Array2<f32>>,
    fft_row: Arc<dyn Fft<f32>>,
    fft_col: Arc<dyn Fft<f32>>,
    ifft_row: Arc<dyn Fft<f32>>,
    ifft_col: Arc<dyn Fft<f32>>,
    scene: Array2<Complex<f32>>,
    template: Array2<Complex<f32>>,
    column: Vec<Complex<f32>>,
}

impl PhaseCorrelator {
    pub fn new(width: u32, height: u32, hanning_window: bool) -> Self {
        let (width, height) = (width.max(1) as usize, height.max(1) as usize);
        let mut planner = FftPlanner::new();

        Self {
            width,
            height,
            window: hanning_window.then(|| hanning(width, height)),
            fft_row: planner.plan_fft_forward(width),
            fft_col: planner.plan_fft_forward(height),
            ifft_row: planner.plan_fft_inverse(width),
            ifft_col: planner.plan_fft_inverse(height),
            scene: Array2::zeros((height, width)),
            template: Array2::zeros((height, width)),
            column: vec![Complex::new(0.0, 0.0); height],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    /// Shift `d` such that `scene(x) ≈ template(x - d)`.
    ///
    /// The template is placed at the origin of a scene-sized buffer, cropped
    /// where it is larger and zero-padded where it is smaller. The scene must
    /// have the correlator's dimensions.
    pub fn correlate(&mut self, scene: &GrayImage, template: &GrayImage) -> PhaseShift {
        let (w, h) = (self.width, self.height);

        load_at_origin(&mut self.scene, scene, w, h);
        load_at_origin(&mut self.template, template, w, h);

        if let Some(window) = &self.window {
            self.scene.zip_mut_with(window, |v, &k| *v *= k);
            self.template.zip_mut_with(window, |v, &k| *v *= k);
        }

        fft_2d(&mut self.scene, self.fft_row.as_ref(), self.fft_col.as_ref(), &mut self.column);
        fft_2d(&mut self.template, self.fft_row.as_ref(), self.fft_col.as_ref(), &mut self.column);

        // Cross-power spectrum, written into the scene buffer
        self.scene.zip_mut_with(&self.template, |s, t| {
            let product = *s * t.conj();
            let magnitude = product.norm();
            *s = if magnitude > MAGNITUDE_FLOOR {
                product / magnitude
            } else {
                Complex::new(0.0, 0.0)
            };
        });

        fft_2d(&mut self.scene, self.ifft_row.as_ref(), self.ifft_col.as_ref(), &mut self.column);
        let norm = 1.0 / (w * h) as f32;

        let (peak_x, peak_y, peak) = find_peak(&self.scene);
        let (dx, dy) = refine_peak(&self.scene, peak_x, peak_y);

        PhaseShift {
            dx: wrap(peak_x as f64 + dx, w),
            dy: wrap(peak_y as f64 + dy, h),
            response: (peak * norm) as f64,
        }
    }
}

/// Copy at most the top-left `w` x `h` region of `image` into `buffer`, mean-subtracted; the rest is zeroed
fn load_at_origin(buffer: &mut Array2<Complex<f32>>, image: &GrayImage, w: usize, h: usize) {
    buffer.fill(Complex::new(0.0, 0.0));
    let w = w.min(image.width() as usize);
    let h = h.min(image.height() as usize);
    if w == 0 || h == 0 {
        return;
    }

    let mut sum = 0.0f64;
    for y in 0..h {
        for x in 0..w {
            sum += image.get_pixel(x as u32, y as u32)[0] as f64;
        }
    }
    let mean = (sum / (w * h) as f64) as f32;

    for y in 0..h {
        for x in 0..w {
            let value = image.get_pixel(x as u32, y as u32)[0] as f32 - mean;
            buffer[[y, x]] = Complex::new(value, 0.0);
        }
    }
}

/// Separable 2D transform: every row in one batch, then every column through `column`
fn fft_2d(buffer: &mut Array2<Complex<f32>>, row_fft: &dyn Fft<f32>, col_fft: &dyn Fft<f32>, column: &mut [Complex<f32>]) {
    if let Some(data) = buffer.as_slice_mut() {
        row_fft.process(data);
    }

    for mut col in buffer.columns_mut() {
        for (dst, src) in column.iter_mut().zip(col.iter()) {
            *dst = *src;
        }
        col_fft.process(column);
        for (dst, src) in col.iter_mut().zip(column.iter()) {
            *dst = *src;
        }
    }
}

fn find_peak(correlation: &Array2<Complex<f32>>) -> (usize, usize, f32) {
    let mut best = (0, 0, f32::NEG_INFINITY);
    for ((y, x), value) in correlation.indexed_iter() {
        if value.re > best.2 {
            best = (x, y, value.re);
        }
    }
    best
}

/// Sub-pixel offset of the peak from the weighted centroid of its 3x3 neighbourhood
fn refine_peak(correlation: &Array2<Complex<f32>>, peak_x: usize, peak_y: usize) -> (f64, f64) {
    let (h, w) = correlation.dim();
    let (mut sum, mut sx, mut sy) = (0.0f64, 0.0f64, 0.0f64);

    for oy in -1i64..=1 {
        for ox in -1i64..=1 {
            let x = (peak_x as i64 + ox).rem_euclid(w as i64) as usize;
            let y = (peak_y as i64 + oy).rem_euclid(h as i64) as usize;
            let weight = correlation[[y, x]].re.max(0.0) as f64;
            sum += weight;
            sx += weight * ox as f64;
            sy += weight * oy as f64;
        }
    }

    if sum > 0.0 {
        (sx / sum, sy / sum)
    } else {
        (0.0, 0.0)
    }
}

/// Map a cyclic position to a signed shift
fn wrap(position: f64, size: usize) -> f64 {
    if position > size as f64 / 2.0 {
        position - size as f64
    } else {
        position
    }
}

fn hanning(width: usize, height: usize) -> Array2<f32> {
    let taper = |i: usize, n: usize| {
        if n < 2 {
            1.0
        } else {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32).cos())
        }
    };
    Array2::from_shape_fn((height, width), |(y, x)| taper(x, width) * taper(y, height))
}
