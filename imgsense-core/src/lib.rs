//! Core imgsense inference primitives.
//!
//! This crate ranks classifier outputs, pairs them with labels, prepares image tensors, runs
//! TensorFlow and ONNX graphs through `tract`, and detects faces with YuNet or an OpenCV Haar
//! cascade.

/// Image classification pipeline.
pub mod classifier;
/// Typed errors returned at the crate boundary.
pub mod error;
/// Face detection engines.
pub mod face;
/// Label list loading.
pub mod labels;
/// Graph loading and execution.
pub mod model;
/// Image pre-processing (resizing, normalization, tensor conversion).
pub mod preprocess;
/// Labelled probability vectors.
pub mod result;
/// Top-K selection over score vectors.
pub mod topk;

pub use classifier::{ImageClassifier, UNLABELED, classify_image, probabilities_from_output};
pub use error::{ClassifyError, SelectionError};
pub use face::{FaceDetector, FaceModelKind, FaceRegion, YuNetDetector, build_face_detector};
pub use labels::LabelSet;
pub use model::{GraphFormat, GraphOptions, InferenceEngine, TractEngine};
pub use preprocess::{
    CpuPreprocessor, InputSize, PreprocessConfig, PreprocessOutput, Preprocessor,
    preprocess_dynamic_image, preprocess_image, preprocess_image_bytes,
};
pub use result::{ClassificationResult, LabelScore};
pub use topk::{best_match, top_k};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
