//! Haar cascade face detection through OpenCV.

use std::{cell::RefCell, io::Cursor, path::Path};

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use imgsense_utils::{config::CascadeSettings, telemetry::timing_guard};
use log::debug;
use opencv::{
    core::{Rect, Size, Vector},
    imgcodecs,
    objdetect::CascadeClassifier,
    prelude::*,
};

use super::{FaceDetector, FaceRegion};

/// OpenCV `CascadeClassifier` loaded from a trained XML file.
pub struct CascadeDetector {
    // detect_multi_scale needs `&mut`; detection itself is single threaded.
    classifier: RefCell<CascadeClassifier>,
    settings: CascadeSettings,
}

impl std::fmt::Debug for CascadeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeDetector")
            .field("settings", &self.settings)
            .finish()
    }
}

impl CascadeDetector {
    pub fn new<P: AsRef<Path>>(path: P, settings: CascadeSettings) -> Result<Self> {
        let path = path.as_ref();
        anyhow::ensure!(path.exists(), "cascade file not found: {}", path.display());
        let path_str = path
            .to_str()
            .with_context(|| format!("cascade path is not valid UTF-8: {}", path.display()))?;
        let classifier = CascadeClassifier::new(path_str)
            .with_context(|| format!("failed to load cascade {}", path.display()))?;
        anyhow::ensure!(
            !classifier.empty()?,
            "cascade {} contains no classifier",
            path.display()
        );
        Ok(Self {
            classifier: RefCell::new(classifier),
            settings,
        })
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        let _guard = timing_guard("imgsense_core::detect_faces_cascade", log::Level::Debug);

        // Hand OpenCV a lossless grayscale PNG and let it decode into a Mat.
        let mut png = Vec::new();
        image
            .to_luma8()
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("failed to encode image for OpenCV")?;
        let gray = imgcodecs::imdecode(&Vector::<u8>::from_slice(&png), imgcodecs::IMREAD_GRAYSCALE)
            .context("OpenCV could not decode the image")?;

        let min = self.settings.min_size as i32;
        let mut found = Vector::<Rect>::new();
        self.classifier
            .borrow_mut()
            .detect_multi_scale(
                &gray,
                &mut found,
                self.settings.scale_factor,
                self.settings.min_neighbors,
                0,
                Size::new(min, min),
                Size::new(0, 0),
            )
            .context("cascade detection failed")?;

        debug!("Cascade found {} faces", found.len());
        Ok(found
            .iter()
            .map(|r| FaceRegion::new(r.x as f32, r.y as f32, r.width as f32, r.height as f32))
            .collect())
    }
}
