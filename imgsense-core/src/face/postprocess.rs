use std::cmp::Ordering;

use anyhow::Result;
use imgsense_utils::config::DetectionSettings;
use tract_onnx::prelude::{Tensor, tract_ndarray::ArrayView2};

use super::FaceRegion;

/// Columns per decoded YuNet row: bbox (4) + landmarks (10) + score (1).
pub const YUNET_COLS: usize = 15;

/// Score filtering and non-maximum suppression parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PostprocessConfig {
    pub score_threshold: f32,
    /// IoU above which the lower scoring of two overlapping boxes is dropped.
    pub nms_threshold: f32,
    /// Maximum number of candidates kept, by score, before NMS. Zero keeps all.
    pub top_k: usize,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        DetectionSettings::default().into()
    }
}

impl From<DetectionSettings> for PostprocessConfig {
    fn from(settings: DetectionSettings) -> Self {
        PostprocessConfig {
            score_threshold: settings.score_threshold,
            nms_threshold: settings.nms_threshold,
            top_k: settings.top_k,
        }
    }
}

impl From<&DetectionSettings> for PostprocessConfig {
    fn from(settings: &DetectionSettings) -> Self {
        settings.clone().into()
    }
}

/// Turn decoded YuNet rows into face regions in original image coordinates.
///
/// Rows below the score threshold or with an empty box are dropped; the rest are scaled by
/// `(scale_x, scale_y)`, sorted by score, capped at `top_k` and passed through NMS.
pub fn apply_postprocess(
    output: &Tensor,
    scale_x: f32,
    scale_y: f32,
    config: &PostprocessConfig,
) -> Result<Vec<FaceRegion>> {
    let rows = detection_rows(output)?;

    let mut faces = Vec::with_capacity(rows.nrows());
    for row in rows.rows() {
        let score = row[14];
        if !score.is_finite() || score < config.score_threshold {
            continue;
        }

        let region = FaceRegion::new(
            row[0] * scale_x,
            row[1] * scale_y,
            row[2] * scale_x,
            row[3] * scale_y,
        )
        .with_score(score);
        if region.width <= 0.0 || region.height <= 0.0 {
            continue;
        }
        faces.push(region);
    }

    faces.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
    });

    if config.top_k > 0 && faces.len() > config.top_k {
        faces.truncate(config.top_k);
    }

    if config.nms_threshold > 0.0 && faces.len() > 1 {
        faces = non_max_suppression(faces, config.nms_threshold);
    }

    Ok(faces)
}

fn detection_rows(output: &Tensor) -> Result<ArrayView2<'_, f32>> {
    let rows = match output.shape() {
        [rows, YUNET_COLS] => *rows,
        [1, rows, YUNET_COLS] => *rows,
        other => anyhow::bail!(
            "YuNet output must have shape [N, 15] or [1, N, 15] (got {:?})",
            other
        ),
    };

    let slice = output
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("YuNet output is not f32: {e}"))?;

    ArrayView2::from_shape((rows, YUNET_COLS), slice)
        .map_err(|_| anyhow::anyhow!("YuNet output data is not contiguous"))
}

/// Greedy NMS over score-sorted regions.
fn non_max_suppression(faces: Vec<FaceRegion>, threshold: f32) -> Vec<FaceRegion> {
    let mut kept: Vec<FaceRegion> = Vec::with_capacity(faces.len());
    for face in faces {
        if kept.iter().all(|k| face.iou(k) <= threshold) {
            kept.push(face);
        }
    }
    kept
}
