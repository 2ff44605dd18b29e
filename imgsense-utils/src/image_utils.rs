use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage, imageops::FilterType};
use ndarray::Array3;

use crate::config::ChannelOrder;

/// Load an image from disk into memory.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

/// Decode an encoded image (JPEG, PNG, ...) held in memory.
///
/// The container format is sniffed from the leading bytes.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    anyhow::ensure!(!bytes.is_empty(), "image buffer is empty");
    image::load_from_memory(bytes).context("failed to decode image bytes")
}

/// Resize an image to the requested resolution using the provided filter.
///
/// The aspect ratio is not preserved; the network expects an exact input size.
pub fn resize_image(image: &DynamicImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    image.resize_exact(width, height, filter).to_rgb8()
}

#[inline]
fn channel_values(pixel: &image::Rgb<u8>, order: ChannelOrder) -> [f32; 3] {
    let [r, g, b] = pixel.0;
    match order {
        ChannelOrder::Rgb => [r as f32, g as f32, b as f32],
        ChannelOrder::Bgr => [b as f32, g as f32, r as f32],
    }
}

/// Convert an RGB image into an interleaved `[H, W, 3]` float array.
pub fn rgb_to_hwc(image: &RgbImage, order: ChannelOrder) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((height as usize, width as usize, 3));
    for (x, y, pixel) in image.enumerate_pixels() {
        let values = channel_values(pixel, order);
        for (c, value) in values.into_iter().enumerate() {
            array[(y as usize, x as usize, c)] = value;
        }
    }
    array
}

/// Convert an RGB image into a planar `[3, H, W]` float array.
pub fn rgb_to_chw(image: &RgbImage, order: ChannelOrder) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let values = channel_values(pixel, order);
        for (c, value) in values.into_iter().enumerate() {
            array[(c, y as usize, x as usize)] = value;
        }
    }
    array
}

/// Compute scale factors used to reproject detections from model space to original space.
///
/// # Arguments
///
/// * `original` - The original image's (width, height).
/// * `target` - The resized image's (width, height).
pub fn compute_resize_scales(original: (u32, u32), target: (u32, u32)) -> Result<(f32, f32)> {
    let (orig_w, orig_h) = original;
    let (target_w, target_h) = target;
    anyhow::ensure!(
        target_w > 0 && target_h > 0,
        "target dimensions must be non-zero"
    );
    anyhow::ensure!(
        orig_w > 0 && orig_h > 0,
        "original dimensions must be non-zero"
    );
    Ok((
        orig_w as f32 / target_w as f32,
        orig_h as f32 / target_h as f32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> RgbImage {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, image::Rgb([0, 128, 255]));
        image.put_pixel(1, 0, image::Rgb([255, 128, 0]));
        image.put_pixel(0, 1, image::Rgb([64, 64, 64]));
        image.put_pixel(1, 1, image::Rgb([255, 255, 255]));
        image
    }

    #[test]
    fn bgr_chw_swaps_channels() {
        let array = rgb_to_chw(&sample(), ChannelOrder::Bgr);
        assert_eq!(array.shape(), &[3, 2, 2]);
        assert_eq!(array[(0, 0, 0)], 255.0);
        assert_eq!(array[(2, 0, 0)], 0.0);
        assert_eq!(array[(1, 0, 1)], 128.0);
    }

    #[test]
    fn rgb_to_hwc_keeps_pixels_interleaved() {
        let array = rgb_to_hwc(&sample(), ChannelOrder::Rgb);
        assert_eq!(array.shape(), &[2, 2, 3]);
        assert_eq!(array[(0, 0, 0)], 0.0);
        assert_eq!(array[(0, 0, 2)], 255.0);
        assert_eq!(array[(0, 1, 0)], 255.0);
        assert_eq!(array[(1, 0, 1)], 64.0);
    }

    #[test]
    fn decodes_png_bytes() {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(sample())
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .expect("encode png");
        let decoded = decode_image_bytes(&buffer).expect("decode");
        assert_eq!(decoded.to_rgb8(), sample());
    }

    #[test]
    fn rejects_empty_and_garbage_bytes() {
        assert!(decode_image_bytes(&[]).is_err());
        assert!(decode_image_bytes(b"definitely not an image").is_err());
    }

    #[test]
    fn compute_resize_scales_returns_expected_values() {
        let (sx, sy) = compute_resize_scales((640, 480), (320, 240)).unwrap();
        assert_eq!(sx, 2.0);
        assert_eq!(sy, 2.0);
    }

    #[test]
    fn compute_resize_scales_rejects_zero() {
        assert!(compute_resize_scales((0, 480), (320, 240)).is_err());
        assert!(compute_resize_scales((640, 480), (0, 240)).is_err());
    }
}
