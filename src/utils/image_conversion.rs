use crate::error::RegistrationError;
use crate::Result;
use image::{imageops, GenericImageView, GrayImage, Pixel};
use rayon::prelude::*;

// BT.601 luma weights in 14-bit fixed point
const WEIGHT_R: u32 = 4899;
const WEIGHT_G: u32 = 9617;
const WEIGHT_B: u32 = 1868;
const SHIFT: u32 = 14;
const ROUND: u32 = 1 << (SHIFT - 1);

/// Write the luminance of `input` into `dst`, which must have the same size.
///
/// Gray inputs are copied, color inputs are weighted by the fixed BT.601
/// coefficients. Alpha is ignored.
pub fn to_gray_into<I>(input: &I, dst: &mut GrayImage) -> std::result::Result<(), RegistrationError>
where
    I: GenericImageView + Sync,
    I::Pixel: Pixel<Subpixel = u8>,
{
    let (width, height) = input.dimensions();
    if dst.dimensions() != (width, height) {
        return Err(RegistrationError::FrameSizeMismatch {
            expected_width: dst.width(),
            expected_height: dst.height(),
            actual_width: width,
            actual_height: height,
        });
    }
    if width == 0 {
        return Ok(());
    }

    let pixels: &mut [u8] = dst;
    pixels.par_chunks_mut(width as usize).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            *out = luma(&input.get_pixel(x as u32, y as u32));
        }
    });

    Ok(())
}

fn luma<P: Pixel<Subpixel = u8>>(pixel: &P) -> u8 {
    let channels = pixel.channels();
    if P::CHANNEL_COUNT < 3 {
        return channels[0];
    }
    let (r, g, b) = (channels[0] as u32, channels[1] as u32, channels[2] as u32);
    ((r * WEIGHT_R + g * WEIGHT_G + b * WEIGHT_B + ROUND) >> SHIFT) as u8
}

/// Convert any image to a freshly allocated grayscale buffer
pub fn to_gray<I>(input: &I) -> GrayImage
where
    I: GenericImageView + Sync,
    I::Pixel: Pixel<Subpixel = u8>,
{
    let (width, height) = input.dimensions();
    let mut gray = GrayImage::new(width, height);
    // sizes match by construction
    let _ = to_gray_into(input, &mut gray);
    gray
}

/// Rescale so the longer side equals `max_dimension`, keeping the aspect ratio
pub fn resize_to_max_dimension(image: &GrayImage, max_dimension: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    let longer = width.max(height);
    if longer == 0 || longer == max_dimension || max_dimension == 0 {
        return image.clone();
    }

    let scale = max_dimension as f64 / longer as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);
    imageops::resize(image, new_width, new_height, imageops::FilterType::Triangle)
}

/// Load and validate an image from path as grayscale
pub fn load_image(path: &std::path::Path) -> Result<GrayImage> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Image file does not exist: {}",
            path.display()
        ));
    }

    let img = image::open(path)?;
    let gray_img = to_gray(&img);

    validate_image_size(&gray_img)?;
    Ok(gray_img)
}

/// Validate that image has reasonable dimensions
pub fn validate_image_size(image: &GrayImage) -> Result<()> {
    validate_image_size_with_limits(image, 10, 10000)
}

/// Validate image size with custom limits
pub fn validate_image_size_with_limits(
    image: &GrayImage,
    min_size: u32,
    max_size: u32,
) -> Result<()> {
    let (width, height) = image.dimensions();

    if width < min_size || height < min_size {
        return Err(anyhow::anyhow!(
            "Image too small: {}x{}, minimum: {}x{}",
            width,
            height,
            min_size,
            min_size
        ));
    }

    if width > max_size || height > max_size {
        return Err(anyhow::anyhow!(
            "Image too large: {}x{}, maximum: {}x{}",
            width,
            height,
            max_size,
            max_size
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, LumaA, Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn test_color_weights() {
        let image = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([255, 255, 255]),
        });
        let gray = to_gray(&image);
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 150);
        assert_eq!(gray.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_alpha_is_ignored() {
        let opaque = RgbaImage::from_pixel(2, 2, Rgba([10, 200, 30, 255]));
        let clear = RgbaImage::from_pixel(2, 2, Rgba([10, 200, 30, 0]));
        assert_eq!(to_gray(&opaque), to_gray(&clear));

        let gray_alpha = image::ImageBuffer::from_pixel(2, 2, LumaA([77u8, 0]));
        assert_eq!(to_gray(&gray_alpha).get_pixel(1, 1), &Luma([77]));
    }

    #[test]
    fn test_size_mismatch_is_reported() {
        let input = GrayImage::new(4, 4);
        let mut dst = GrayImage::new(5, 4);
        assert!(matches!(
            to_gray_into(&input, &mut dst),
            Err(RegistrationError::FrameSizeMismatch { actual_width: 4, .. })
        ));
    }

    #[test]
    fn test_resize_to_max_dimension() {
        let image = GrayImage::new(1360, 920);
        let resized = resize_to_max_dimension(&image, 680);
        assert_eq!(resized.dimensions(), (680, 460));

        let small = GrayImage::new(100, 340);
        assert_eq!(resize_to_max_dimension(&small, 680).dimensions(), (200, 680));
    }
}
