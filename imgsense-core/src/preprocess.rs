//! Preprocessing utilities that turn an image into a batched network input tensor.
//!
//! The pipeline decodes, resizes to the network resolution with a bilinear (or nearest) filter,
//! casts to `f32`, normalizes each channel value as `(value - mean) / scale` and adds a batch
//! dimension of one. The result also carries the scale factors needed to map model-space
//! coordinates back onto the source image.

use std::{borrow::Cow, path::Path};

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView, RgbImage, imageops::FilterType};
use imgsense_utils::{
    compute_resize_scales,
    config::{
        ChannelOrder, ClassifierSettings, InputDimensions, NormalizationSettings, ResizeQuality,
        TensorLayout,
    },
    decode_image_bytes, load_image, resize_image, rgb_to_chw, rgb_to_hwc,
    telemetry::timing_guard,
};
use tract_onnx::prelude::Tensor;

/// Desired input resolution of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self::new(224, 224)
    }
}

/// Configuration for preprocessing an image before inference.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    /// The target input size for the model.
    pub input_size: InputSize,
    /// Resize filter preference controlling the quality vs speed trade-off.
    pub resize_quality: ResizeQuality,
    /// Subtracted from every channel value.
    pub mean: f32,
    /// Divides every channel value after the mean is removed.
    pub scale: f32,
    pub layout: TensorLayout,
    pub channel_order: ChannelOrder,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        let normalization = NormalizationSettings::default();
        Self {
            input_size: InputSize::default(),
            resize_quality: ResizeQuality::Quality,
            mean: normalization.mean,
            scale: normalization.scale,
            layout: normalization.layout,
            channel_order: normalization.channel_order,
        }
    }
}

impl PreprocessConfig {
    /// Raw BGR planar blob as YuNet expects it (no mean removal).
    pub fn yunet(dimensions: &InputDimensions) -> Self {
        Self {
            input_size: dimensions.into(),
            resize_quality: dimensions.resize_quality,
            mean: 0.0,
            scale: 1.0,
            layout: TensorLayout::Nchw,
            channel_order: ChannelOrder::Bgr,
        }
    }

    /// Shape of the produced tensor, batch dimension included.
    pub fn tensor_shape(&self) -> [usize; 4] {
        let (w, h) = (
            self.input_size.width as usize,
            self.input_size.height as usize,
        );
        match self.layout {
            TensorLayout::Nhwc => [1, h, w, 3],
            TensorLayout::Nchw => [1, 3, h, w],
        }
    }

    fn resize_filter(&self) -> FilterType {
        match self.resize_quality {
            ResizeQuality::Quality => FilterType::Triangle,
            ResizeQuality::Speed => FilterType::Nearest,
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.input_size.width > 0 && self.input_size.height > 0,
            "input dimensions must be greater than zero"
        );
        anyhow::ensure!(
            self.scale.is_finite() && self.scale != 0.0,
            "normalization scale must be finite and non-zero, got {}",
            self.scale
        );
        anyhow::ensure!(
            self.mean.is_finite(),
            "normalization mean must be finite, got {}",
            self.mean
        );
        Ok(())
    }
}

impl From<&ClassifierSettings> for PreprocessConfig {
    fn from(settings: &ClassifierSettings) -> Self {
        let NormalizationSettings {
            mean,
            scale,
            layout,
            channel_order,
        } = settings.normalization;
        Self {
            input_size: (&settings.input).into(),
            resize_quality: settings.input.resize_quality,
            mean,
            scale,
            layout,
            channel_order,
        }
    }
}

impl From<InputDimensions> for InputSize {
    fn from(dimensions: InputDimensions) -> Self {
        InputSize::new(dimensions.width, dimensions.height)
    }
}

impl From<&InputDimensions> for InputSize {
    fn from(dimensions: &InputDimensions) -> Self {
        (*dimensions).into()
    }
}

/// Output of preprocessing: tensor plus metadata for rescaling model-space coordinates.
#[derive(Debug)]
pub struct PreprocessOutput {
    pub tensor: Tensor,
    /// Horizontal factor from model space to original image space.
    pub scale_x: f32,
    /// Vertical factor from model space to original image space.
    pub scale_y: f32,
    pub original_size: (u32, u32),
}

/// Abstraction over preprocessing backends.
pub trait Preprocessor: Send + Sync + std::fmt::Debug {
    /// Convert the provided image into a network-ready tensor.
    fn preprocess(&self, image: &DynamicImage, config: &PreprocessConfig)
    -> Result<PreprocessOutput>;
}

/// Default CPU implementation backed by `image` + ndarray utilities.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuPreprocessor;

impl Preprocessor for CpuPreprocessor {
    fn preprocess(
        &self,
        image: &DynamicImage,
        config: &PreprocessConfig,
    ) -> Result<PreprocessOutput> {
        cpu_preprocess(image, config)
    }
}

/// Preprocess an image file.
pub fn preprocess_image<P: AsRef<Path>>(
    path: P,
    config: &PreprocessConfig,
) -> Result<PreprocessOutput> {
    let _guard = timing_guard("imgsense_core::preprocess_image", log::Level::Debug);
    let path_ref = path.as_ref();
    let image = load_image(path_ref)
        .with_context(|| format!("failed to load image from {}", path_ref.display()))?;
    CpuPreprocessor.preprocess(&image, config)
}

/// Preprocess encoded image bytes (JPEG, PNG, ...).
pub fn preprocess_image_bytes(bytes: &[u8], config: &PreprocessConfig) -> Result<PreprocessOutput> {
    let image = decode_image_bytes(bytes)?;
    CpuPreprocessor.preprocess(&image, config)
}

/// Preprocess an already decoded image.
pub fn preprocess_dynamic_image(
    image: &DynamicImage,
    config: &PreprocessConfig,
) -> Result<PreprocessOutput> {
    CpuPreprocessor.preprocess(image, config)
}

fn cpu_preprocess(image: &DynamicImage, config: &PreprocessConfig) -> Result<PreprocessOutput> {
    let _guard = timing_guard("imgsense_core::preprocess_dynamic_image", log::Level::Trace);
    config.validate()?;
    let input_w = config.input_size.width;
    let input_h = config.input_size.height;

    let (orig_w, orig_h) = image.dimensions();
    anyhow::ensure!(
        orig_w > 0 && orig_h > 0,
        "source image dimensions must be greater than zero"
    );
    let resized_rgb: Cow<'_, RgbImage> = if orig_w == input_w && orig_h == input_h {
        match image.as_rgb8() {
            Some(rgb) => Cow::Borrowed(rgb),
            None => Cow::Owned(image.to_rgb8()),
        }
    } else {
        Cow::Owned(resize_image(
            image,
            input_w,
            input_h,
            config.resize_filter(),
        ))
    };

    let mut array = match config.layout {
        TensorLayout::Nhwc => rgb_to_hwc(&resized_rgb, config.channel_order),
        TensorLayout::Nchw => rgb_to_chw(&resized_rgb, config.channel_order),
    };
    if config.mean != 0.0 || config.scale != 1.0 {
        let (mean, scale) = (config.mean, config.scale);
        array.mapv_inplace(|v| (v - mean) / scale);
    }

    let shape = config.tensor_shape();
    let (data, offset) = array.into_raw_vec_and_offset();
    debug_assert_eq!(offset, Some(0), "expected contiguous array");
    let tensor = Tensor::from_shape(&shape, &data)
        .map_err(|e| anyhow::anyhow!("failed to build tensor: {e}"))?;

    let (scale_x, scale_y) = compute_resize_scales((orig_w, orig_h), (input_w, input_h))?;

    Ok(PreprocessOutput {
        tensor,
        scale_x,
        scale_y,
        original_size: (orig_w, orig_h),
    })
}
