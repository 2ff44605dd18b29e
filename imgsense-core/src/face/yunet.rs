//! YuNet face detection on top of the tract engine.

use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;
use imgsense_utils::{config::FaceSettings, telemetry::timing_guard};
use log::debug;
use tract_onnx::prelude::Tensor;

use super::{
    FaceDetector, FaceRegion,
    postprocess::{PostprocessConfig, YUNET_COLS, apply_postprocess},
};
use crate::{
    model::{GraphOptions, TractEngine},
    preprocess::{InputSize, PreprocessConfig, preprocess_dynamic_image},
};

const STRIDES: [usize; 3] = [8, 16, 32];
const OUTPUTS_PER_STRIDE: usize = 4; // cls, obj, bbox, kps

/// YuNet model coupled with its preprocessing and postprocessing settings.
#[derive(Debug)]
pub struct YuNetDetector {
    engine: TractEngine,
    preprocess: PreprocessConfig,
    postprocess: PostprocessConfig,
}

impl YuNetDetector {
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        preprocess: PreprocessConfig,
        postprocess: PostprocessConfig,
    ) -> Result<Self> {
        let options = GraphOptions {
            input_shape: Some(preprocess.tensor_shape().to_vec()),
            ..GraphOptions::onnx()
        };
        let engine = TractEngine::load(model_path, &options)?;
        Ok(Self {
            engine,
            preprocess,
            postprocess,
        })
    }

    pub fn from_settings(settings: &FaceSettings) -> Result<Self> {
        Self::new(
            &settings.model_path,
            PreprocessConfig::yunet(&settings.input),
            (&settings.detection).into(),
        )
        .with_context(|| format!("failed to load YuNet model {}", settings.model_path))
    }

    pub fn postprocess_config(&self) -> &PostprocessConfig {
        &self.postprocess
    }
}

impl FaceDetector for YuNetDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        let _guard = timing_guard("imgsense_core::detect_faces", log::Level::Debug);
        let prep = preprocess_dynamic_image(image, &self.preprocess)?;
        let outputs = self.engine.run_all(prep.tensor)?;
        let raw = fuse_outputs(outputs, self.preprocess.input_size)?;
        let faces = apply_postprocess(&raw, prep.scale_x, prep.scale_y, &self.postprocess)?;
        debug!("YuNet kept {} faces", faces.len());
        Ok(faces)
    }
}

/// Accept either an already fused `[N, 15]` output or the twelve raw per-stride heads.
fn fuse_outputs(mut outputs: Vec<Tensor>, input_size: InputSize) -> Result<Tensor> {
    match outputs.len() {
        0 => anyhow::bail!("YuNet model produced no outputs"),
        1 => outputs
            .pop()
            .ok_or_else(|| anyhow::anyhow!("YuNet model produced no outputs")),
        len if len == STRIDES.len() * OUTPUTS_PER_STRIDE => {
            decode_yunet_outputs(&outputs, input_size)
        }
        other => anyhow::bail!(
            "unexpected number of YuNet outputs: expected 1 or {}, got {}",
            STRIDES.len() * OUTPUTS_PER_STRIDE,
            other
        ),
    }
}

/// Decode the per-stride heads into `[N, 15]` rows of
/// `[x, y, w, h, 5 landmark pairs, score]` in model input coordinates.
///
/// Outputs are ordered `cls_8, cls_16, cls_32, obj_*, bbox_*, kps_*`.
pub(crate) fn decode_yunet_outputs(outputs: &[Tensor], input_size: InputSize) -> Result<Tensor> {
    anyhow::ensure!(
        outputs.len() == STRIDES.len() * OUTPUTS_PER_STRIDE,
        "YuNet decode expects {} tensors, got {}",
        STRIDES.len() * OUTPUTS_PER_STRIDE,
        outputs.len()
    );

    let pad_w = (input_size.width as usize).div_ceil(32) * 32;
    let pad_h = (input_size.height as usize).div_ceil(32) * 32;

    let total_cells: usize = STRIDES
        .iter()
        .map(|stride| (pad_w / stride) * (pad_h / stride))
        .sum();
    let mut fused = Vec::with_capacity(total_cells * YUNET_COLS);

    for (stride_index, &stride) in STRIDES.iter().enumerate() {
        let cols = pad_w / stride;
        let rows = pad_h / stride;
        let cell_count = rows * cols;
        let stride_f = stride as f32;

        let head = |kind: usize, name| {
            head_slice(
                &outputs[stride_index + STRIDES.len() * kind],
                name,
                cell_count * [1, 1, 4, 10][kind],
            )
        };
        let cls = head(0, "cls")?;
        let obj = head(1, "obj")?;
        let bbox = head(2, "bbox")?;
        let kps = head(3, "kps")?;

        for row in 0..rows {
            for col in 0..cols {
                let idx = row * cols + col;
                let mut score = (cls[idx].clamp(0.0, 1.0) * obj[idx].clamp(0.0, 1.0)).sqrt();
                if !score.is_finite() {
                    score = 0.0;
                }

                let b = &bbox[idx * 4..idx * 4 + 4];
                let cx = (col as f32 + b[0]) * stride_f;
                let cy = (row as f32 + b[1]) * stride_f;
                let w = b[2].exp() * stride_f;
                let h = b[3].exp() * stride_f;
                fused.extend_from_slice(&[
                    (-0.5f32).mul_add(w, cx),
                    (-0.5f32).mul_add(h, cy),
                    w,
                    h,
                ]);

                let k = &kps[idx * 10..idx * 10 + 10];
                for pair in k.chunks_exact(2) {
                    fused.push((pair[0] + col as f32) * stride_f);
                    fused.push((pair[1] + row as f32) * stride_f);
                }

                fused.push(score);
            }
        }
    }

    let rows = fused.len() / YUNET_COLS;
    Tensor::from_shape(&[rows, YUNET_COLS], &fused)
        .map_err(|e| anyhow::anyhow!("failed to build fused YuNet tensor: {e}"))
}

fn head_slice<'a>(tensor: &'a Tensor, name: &str, expected: usize) -> Result<&'a [f32]> {
    let slice = tensor
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("{name} output not f32: {e}"))?;
    anyhow::ensure!(
        slice.len() == expected,
        "{name} length mismatch: expected {expected}, got {}",
        slice.len()
    );
    Ok(slice)
}
