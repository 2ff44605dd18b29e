//! Shared configuration types consumed across the imgsense workspace.
//!
//! These structures describe the classifier, the face detector and the telemetry preferences.
//! They serialize to a single JSON document that the CLI can load from disk and override from
//! command-line flags.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Default location of the pre-trained Inception graph.
pub const DEFAULT_CLASSIFIER_MODEL: &str = "models/inception5h/tensorflow_inception_graph.pb";
/// Default location of the label list that ships with the Inception graph.
pub const DEFAULT_LABELS: &str = "models/inception5h/imagenet_comp_graph_label_strings.txt";
/// Default YuNet face detection model.
pub const DEFAULT_YUNET_MODEL: &str = "models/face_detection_yunet_2023mar.onnx";
/// Default Haar cascade used when OpenCV support is compiled in.
pub const DEFAULT_CASCADE_MODEL: &str = "models/haarcascade_frontalface_alt.xml";

/// Returns the face model used when nothing else is configured.
///
/// Builds with the `opencv` feature default to the frontal-face Haar cascade, other builds to
/// YuNet.
pub fn default_face_model() -> &'static str {
    if cfg!(feature = "opencv") {
        DEFAULT_CASCADE_MODEL
    } else {
        DEFAULT_YUNET_MODEL
    }
}

/// Resize filter preference used when scaling images to the network input size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeQuality {
    /// Bilinear (Triangle) filtering.
    #[default]
    Quality,
    /// Nearest-neighbour filtering.
    Speed,
}

impl fmt::Display for ResizeQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResizeQuality::Quality => "quality",
            ResizeQuality::Speed => "speed",
        })
    }
}

impl FromStr for ResizeQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality" | "bilinear" => Ok(ResizeQuality::Quality),
            "speed" | "nearest" => Ok(ResizeQuality::Speed),
            other => Err(format!(
                "invalid resize quality '{other}'; expected 'quality' or 'speed'"
            )),
        }
    }
}

/// Memory layout of the batched image tensor handed to the network.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// `[1, H, W, C]`, the TensorFlow convention.
    #[default]
    Nhwc,
    /// `[1, C, H, W]`, the ONNX/OpenCV blob convention.
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nhwc" => Ok(TensorLayout::Nhwc),
            "nchw" => Ok(TensorLayout::Nchw),
            other => Err(format!(
                "invalid tensor layout '{other}'; expected 'nhwc' or 'nchw'"
            )),
        }
    }
}

/// Channel order written into the tensor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Network input resolution in pixels (width x height).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputDimensions {
    pub width: u32,
    pub height: u32,
    /// Choose between quality-focused or speed-focused resizing.
    pub resize_quality: ResizeQuality,
}

impl InputDimensions {
    pub const fn new(width: u32, height: u32, resize_quality: ResizeQuality) -> Self {
        Self {
            width,
            height,
            resize_quality,
        }
    }
}

impl Default for InputDimensions {
    fn default() -> Self {
        Self::new(224, 224, ResizeQuality::Quality)
    }
}

/// Pixel normalization applied after resizing: `(value - mean) / scale`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizationSettings {
    pub mean: f32,
    pub scale: f32,
    pub layout: TensorLayout,
    pub channel_order: ChannelOrder,
}

impl Default for NormalizationSettings {
    fn default() -> Self {
        // Inception5h was trained on (value - 117) / 1 in RGB, NHWC.
        Self {
            mean: 117.0,
            scale: 1.0,
            layout: TensorLayout::Nhwc,
            channel_order: ChannelOrder::Rgb,
        }
    }
}

/// Image classification settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Frozen TensorFlow graph (`.pb`) or ONNX model (`.onnx`).
    pub model_path: String,
    /// Newline-delimited label list aligned with the model output.
    pub labels_path: String,
    /// Graph node fed with the image tensor (TensorFlow graphs only).
    pub input_node: String,
    /// Graph node fetched as the probability vector (TensorFlow graphs only).
    pub output_node: String,
    pub input: InputDimensions,
    pub normalization: NormalizationSettings,
    /// Number of labels reported by the top-K listing.
    pub top_k: usize,
    /// Accept models that emit more scores than there are labels, naming the extra classes
    /// `unknown`. Off by default: a label count mismatch is an error.
    pub allow_unlabeled_outputs: bool,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_CLASSIFIER_MODEL.to_string(),
            labels_path: DEFAULT_LABELS.to_string(),
            input_node: "input".to_string(),
            output_node: "output".to_string(),
            input: InputDimensions::default(),
            normalization: NormalizationSettings::default(),
            top_k: 5,
            allow_unlabeled_outputs: false,
        }
    }
}

/// YuNet postprocessing parameters.
///
/// These settings directly control score filtering and non-maximum suppression (NMS).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum confidence score for a detection to be considered valid.
    pub score_threshold: f32,
    /// IoU threshold above which overlapping boxes are suppressed.
    pub nms_threshold: f32,
    /// The maximum number of detections kept before NMS.
    pub top_k: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.9,
            nms_threshold: 0.3,
            top_k: 5_000,
        }
    }
}

/// Haar cascade parameters, mirroring OpenCV's `detectMultiScale` defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CascadeSettings {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    /// Smallest face edge in pixels; 0 lets the cascade decide.
    pub min_size: u32,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 3,
            min_size: 0,
        }
    }
}

/// Face detection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FaceSettings {
    /// YuNet ONNX model or Haar cascade XML.
    pub model_path: String,
    /// YuNet input resolution.
    pub input: InputDimensions,
    pub detection: DetectionSettings,
    pub cascade: CascadeSettings,
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self {
            model_path: default_face_model().to_string(),
            input: InputDimensions::new(640, 640, ResizeQuality::Speed),
            detection: DetectionSettings::default(),
            cascade: CascadeSettings::default(),
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent application settings consumed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppSettings {
    pub classifier: ClassifierSettings,
    pub face: FaceSettings,
    pub telemetry: TelemetrySettings,
}

impl AppSettings {
    /// Load settings from a JSON file. Missing fields fall back to their defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}

/// Returns the default path for persisted settings (`config/imgsense.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/imgsense.json"))
        .unwrap_or_else(|_| PathBuf::from("config/imgsense.json"))
}
