//! Drawing detected faces onto images.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use imgsense_core::FaceRegion;

/// Outline color for detected faces.
pub const FACE_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Return a copy of `image` with a hollow rectangle around every face.
///
/// Regions are clipped to the image; those entirely outside it are skipped.
pub fn annotate_faces(image: &DynamicImage, faces: &[FaceRegion]) -> RgbaImage {
    let mut canvas = image.to_rgba8();
    let (img_w, img_h) = canvas.dimensions();
    for face in faces {
        if let Some((x, y, width, height)) = face.clamped_rect(img_w, img_h) {
            let rect = Rect::at(x as i32, y as i32).of_size(width, height);
            draw_hollow_rect_mut(&mut canvas, rect, FACE_COLOR);
        }
    }
    canvas
}

/// Save an annotated image; the format follows the file extension.
pub fn save_annotated(image: &RgbaImage, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save(output_path)
        .with_context(|| format!("failed to save annotated image {}", output_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::tempdir;

    fn gray(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, Rgb([90, 90, 90])))
    }

    #[test]
    fn draws_green_outline_only() {
        let annotated = annotate_faces(&gray(40, 40), &[FaceRegion::new(10.0, 10.0, 20.0, 20.0)]);
        assert_eq!(annotated.get_pixel(10, 10), &FACE_COLOR);
        assert_eq!(annotated.get_pixel(29, 29), &FACE_COLOR);
        assert_eq!(annotated.get_pixel(20, 10), &FACE_COLOR);
        // Interior and exterior stay untouched.
        assert_eq!(annotated.get_pixel(20, 20), &Rgba([90, 90, 90, 255]));
        assert_eq!(annotated.get_pixel(5, 5), &Rgba([90, 90, 90, 255]));
    }

    #[test]
    fn no_faces_leaves_image_unchanged() {
        let source = gray(16, 8);
        assert_eq!(annotate_faces(&source, &[]), source.to_rgba8());
    }

    #[test]
    fn out_of_bounds_regions_are_clipped_or_skipped() {
        let annotated = annotate_faces(
            &gray(20, 20),
            &[
                FaceRegion::new(-5.0, -5.0, 10.0, 10.0),
                FaceRegion::new(50.0, 50.0, 10.0, 10.0),
            ],
        );
        assert_eq!(annotated.get_pixel(0, 0), &FACE_COLOR);
        assert_eq!(annotated.get_pixel(4, 4), &FACE_COLOR);
        assert_eq!(annotated.get_pixel(19, 19), &Rgba([90, 90, 90, 255]));
    }

    #[test]
    fn saves_png_to_nested_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/output.png");
        let annotated = annotate_faces(&gray(8, 8), &[FaceRegion::new(1.0, 1.0, 4.0, 4.0)]);
        save_annotated(&annotated, &path).unwrap();
        let reloaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(reloaded, annotated);
    }
}
