//! Console and JSON reports for classification and face detection runs.

use std::{
    fs::{self, File},
    path::Path,
};

use anyhow::{Context, Result};
use imgsense_core::{FaceRegion, LabelScore};
use log::info;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ClassificationReport {
    pub image: String,
    pub model: String,
    pub best: LabelScore,
    pub top_k: usize,
    pub top: Vec<LabelScore>,
}

impl ClassificationReport {
    /// Lines printed to stdout, best match first, then the top-K listing and its summary.
    pub fn console_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.top.len() + 2);
        lines.push(format!(
            "BEST MATCH: {} ({:.2}% likely)",
            self.best.label,
            self.best.percent()
        ));
        for score in &self.top {
            lines.push(format!(
                "TOP {} BEST MATCHES: {} ({:.2}% likely)",
                self.top_k,
                score.label,
                score.percent()
            ));
        }
        lines.push(format!("Labeling result: {}", self.labeling_result()));
        lines
    }

    /// Selected labels in rank order, joined with `", "`.
    pub fn labeling_result(&self) -> String {
        self.top
            .iter()
            .map(|score| score.label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Serialize)]
pub struct FaceReport {
    pub image: String,
    pub output: String,
    pub faces: Vec<FaceRegion>,
}

impl FaceReport {
    pub fn console_lines(&self) -> Vec<String> {
        vec![
            format!("Detected {} faces", self.faces.len()),
            format!("Writing {}", self.output),
        ]
    }
}

/// Serialize `report` as pretty JSON into `path`, creating parent directories as needed.
pub fn write_json<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("failed to write JSON report to {}", path.display()))?;
    info!("Wrote report to {}", path.display());
    Ok(())
}
