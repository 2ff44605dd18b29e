//! Image classification: preprocess, run the network, pair scores with labels.

use std::path::Path;

use image::DynamicImage;
use imgsense_utils::{config::ClassifierSettings, decode_image_bytes, load_image};
use log::{debug, info};
use tract_onnx::prelude::Tensor;

use crate::{
    error::ClassifyError,
    labels::LabelSet,
    model::{GraphFormat, GraphOptions, InferenceEngine, TractEngine},
    preprocess::{CpuPreprocessor, PreprocessConfig, Preprocessor},
    result::{ClassificationResult, LabelScore},
};

/// Label given to output classes beyond the end of a short label file.
pub const UNLABELED: &str = "unknown";

/// A loaded network plus its label set, ready to classify any number of images.
#[derive(Debug)]
pub struct ImageClassifier<E: InferenceEngine = TractEngine> {
    engine: E,
    labels: LabelSet,
    preprocess: PreprocessConfig,
    allow_unlabeled_outputs: bool,
}

impl ImageClassifier<TractEngine> {
    /// Load the model and labels named by `settings`.
    pub fn from_settings(settings: &ClassifierSettings) -> Result<Self, ClassifyError> {
        let model_path = Path::new(&settings.model_path);
        let labels = LabelSet::load(&settings.labels_path)?;
        let preprocess = PreprocessConfig::from(settings);

        let format = GraphFormat::from_path(model_path).map_err(ClassifyError::Inference)?;
        let options = graph_options(format, settings, &preprocess);
        let bytes =
            std::fs::read(model_path).map_err(|err| ClassifyError::resource(model_path, err))?;
        let engine = TractEngine::from_bytes(&bytes, &options).map_err(ClassifyError::Inference)?;
        info!(
            "Classifier ready: {} ({} labels)",
            model_path.display(),
            labels.len()
        );

        Ok(Self::new(engine, labels, preprocess)
            .allow_unlabeled_outputs(settings.allow_unlabeled_outputs))
    }
}

impl<E: InferenceEngine> ImageClassifier<E> {
    pub fn new(engine: E, labels: LabelSet, preprocess: PreprocessConfig) -> Self {
        Self {
            engine,
            labels,
            preprocess,
            allow_unlabeled_outputs: false,
        }
    }

    /// Accept outputs wider than the label set, naming the extra classes [`UNLABELED`].
    pub fn allow_unlabeled_outputs(mut self, allow: bool) -> Self {
        self.allow_unlabeled_outputs = allow;
        self
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }

    /// Classify encoded image bytes (JPEG, PNG, ...).
    pub fn classify_bytes(&self, image_bytes: &[u8]) -> Result<ClassificationResult, ClassifyError> {
        let image = decode_image_bytes(image_bytes).map_err(ClassifyError::InvalidImage)?;
        self.classify_image(&image)
    }

    /// Classify an image file.
    pub fn classify_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<ClassificationResult, ClassifyError> {
        let path = path.as_ref();
        let image = load_image(path).map_err(|err| ClassifyError::resource(path, err))?;
        debug!("Classifying {}", path.display());
        self.classify_image(&image)
    }

    pub fn classify_image(
        &self,
        image: &DynamicImage,
    ) -> Result<ClassificationResult, ClassifyError> {
        let input = CpuPreprocessor
            .preprocess(image, &self.preprocess)
            .map_err(ClassifyError::InvalidImage)?;
        let output = self
            .engine
            .run(input.tensor)
            .map_err(ClassifyError::Inference)?;

        let width = output_width(&output, self.labels.len())?;
        if self.allow_unlabeled_outputs && width > self.labels.len() {
            debug!(
                "Model emits {} scores for {} labels; padding with '{}'",
                width,
                self.labels.len(),
                UNLABELED
            );
            let labels = self.labels.padded_to(width, UNLABELED);
            let probabilities = probabilities_from_output(&output, labels.len())?;
            return ClassificationResult::new(labels, probabilities);
        }

        let probabilities = probabilities_from_output(&output, self.labels.len())?;
        ClassificationResult::new(self.labels.clone(), probabilities)
    }
}

/// The input is pinned to the preprocessed shape; TensorFlow graphs are also wired by node name.
fn graph_options(
    format: GraphFormat,
    settings: &ClassifierSettings,
    preprocess: &PreprocessConfig,
) -> GraphOptions {
    match format {
        GraphFormat::TensorFlow => GraphOptions::tensorflow(
            &settings.input_node,
            &settings.output_node,
            &preprocess.tensor_shape(),
        ),
        GraphFormat::Onnx => GraphOptions {
            input_shape: Some(preprocess.tensor_shape().to_vec()),
            ..GraphOptions::onnx()
        },
    }
}

fn output_width(output: &Tensor, label_count: usize) -> Result<usize, ClassifyError> {
    match output.shape() {
        [1, width] => Ok(*width),
        shape => Err(ClassifyError::UnexpectedShape {
            shape: shape.to_vec(),
            labels: label_count,
        }),
    }
}

/// Extract the probability vector from a `[1, N]` output, where `N` must equal `label_count`.
pub fn probabilities_from_output(
    output: &Tensor,
    label_count: usize,
) -> Result<Vec<f32>, ClassifyError> {
    let shape = output.shape();
    if shape.len() != 2 || shape[0] != 1 || shape[1] != label_count {
        return Err(ClassifyError::UnexpectedShape {
            shape: shape.to_vec(),
            labels: label_count,
        });
    }
    let values = output
        .as_slice::<f32>()
        .map_err(|e| ClassifyError::Inference(anyhow::anyhow!("output is not f32: {e}")))?;
    Ok(values.to_vec())
}

/// One-shot classification of encoded image bytes against a serialized graph.
///
/// Returns the `top_k` best labels in descending order of probability.
pub fn classify_image(
    graph_bytes: &[u8],
    format: GraphFormat,
    labels: &LabelSet,
    image_bytes: &[u8],
    settings: &ClassifierSettings,
) -> Result<Vec<LabelScore>, ClassifyError> {
    let preprocess = PreprocessConfig::from(settings);
    let options = graph_options(format, settings, &preprocess);
    let engine = TractEngine::from_bytes(graph_bytes, &options).map_err(ClassifyError::Inference)?;
    ImageClassifier::new(engine, labels.clone(), preprocess)
        .allow_unlabeled_outputs(settings.allow_unlabeled_outputs)
        .classify_bytes(image_bytes)?
        .top(settings.top_k)
}
