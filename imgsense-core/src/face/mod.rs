//! Face detection behind a single [`FaceDetector`] seam.
//!
//! Two engines are available: YuNet (ONNX, run through tract) and, when the `opencv` feature is
//! enabled, OpenCV's Haar cascade classifier. The model file extension picks the engine.

pub mod postprocess;
pub mod yunet;

#[cfg(feature = "opencv")]
pub mod cascade;

use std::path::Path;

use anyhow::Result;
use image::DynamicImage;
use imgsense_utils::config::FaceSettings;
use serde::Serialize;

pub use yunet::YuNetDetector;

#[cfg(feature = "opencv")]
pub use cascade::CascadeDetector;

/// Axis-aligned face rectangle in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detector confidence. Haar cascades do not report one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl FaceRegion {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another region.
    pub fn iou(&self, other: &Self) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if intersection <= 0.0 {
            return 0.0;
        }

        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Integer pixel rectangle `(x, y, width, height)` clipped to a `width x height` image.
    ///
    /// Returns `None` when nothing of the region lies inside the image.
    pub fn clamped_rect(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        let left = self.x.round().max(0.0);
        let top = self.y.round().max(0.0);
        let right = (self.x + self.width).round().min(image_width as f32);
        let bottom = (self.y + self.height).round().min(image_height as f32);
        if !(right > left && bottom > top) {
            return None;
        }
        Some((
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

/// Anything that can find faces in an image.
pub trait FaceDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceRegion>>;
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        (**self).detect(image)
    }
}

/// Detection engine implied by a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceModelKind {
    YuNet,
    HaarCascade,
}

impl FaceModelKind {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("onnx") => Ok(FaceModelKind::YuNet),
            Some("xml") => Ok(FaceModelKind::HaarCascade),
            _ => anyhow::bail!(
                "cannot infer face model type of {} (expected .onnx or .xml)",
                path.display()
            ),
        }
    }
}

/// Build the detector named by `settings.model_path`.
pub fn build_face_detector(settings: &FaceSettings) -> Result<Box<dyn FaceDetector>> {
    let path = Path::new(&settings.model_path);
    match FaceModelKind::from_path(path)? {
        FaceModelKind::YuNet => Ok(Box::new(YuNetDetector::from_settings(settings)?)),
        #[cfg(feature = "opencv")]
        FaceModelKind::HaarCascade => Ok(Box::new(CascadeDetector::new(
            path,
            settings.cascade.clone(),
        )?)),
        #[cfg(not(feature = "opencv"))]
        FaceModelKind::HaarCascade => anyhow::bail!(
            "{} is a Haar cascade; rebuild with the `opencv` feature to use it",
            path.display()
        ),
    }
}
