//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use imgsense_utils::{
    config::{AppSettings, default_settings_path},
    normalize_path,
};
use log::info;

use crate::args::{ClassifyArgs, Cli, DetectArgs};

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply the global telemetry flags.
pub fn apply_telemetry_overrides(settings: &mut AppSettings, cli: &Cli) {
    if cli.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = cli.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
            settings.telemetry.level = lower;
        }
    }
}

pub fn apply_classify_overrides(settings: &mut AppSettings, args: &ClassifyArgs) {
    let classifier = &mut settings.classifier;
    if let Some(model) = args.model.as_ref() {
        classifier.model_path = model.display().to_string();
    }
    if let Some(labels) = args.labels.as_ref() {
        classifier.labels_path = labels.display().to_string();
    }
    if let Some(top_k) = args.top_k {
        classifier.top_k = top_k;
    }
    if let Some(width) = args.width {
        classifier.input.width = width;
    }
    if let Some(height) = args.height {
        classifier.input.height = height;
    }
    if let Some(mode) = args.resize_quality {
        classifier.input.resize_quality = mode;
    }
    if args.allow_unlabeled {
        classifier.allow_unlabeled_outputs = true;
    }
}

pub fn apply_detect_overrides(settings: &mut AppSettings, args: &DetectArgs) {
    let face = &mut settings.face;
    if let Some(model) = args.model.as_ref() {
        face.model_path = model.display().to_string();
    }
    if let Some(score) = args.score_threshold {
        face.detection.score_threshold = score;
    }
    if let Some(nms) = args.nms_threshold {
        face.detection.nms_threshold = nms;
    }
}
