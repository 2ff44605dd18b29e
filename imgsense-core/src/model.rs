use std::{fmt::Write, fs, io::Cursor, path::Path};

use anyhow::{Context, Result};
use log::{debug, warn};
use tract_onnx::prelude::*;

use imgsense_utils::telemetry::timing_guard;

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Seam between the pipeline and whatever executes the network.
///
/// Implementations take one batched input tensor and return the first output tensor.
pub trait InferenceEngine: Send + Sync {
    fn run(&self, input: Tensor) -> Result<Tensor>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn run(&self, input: Tensor) -> Result<Tensor> {
        (**self).run(input)
    }
}

/// Serialization format of a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    /// Frozen TensorFlow `GraphDef` protobuf.
    TensorFlow,
    Onnx,
}

impl GraphFormat {
    /// Guess the format from the file extension (`.pb` or `.onnx`).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pb") => Ok(GraphFormat::TensorFlow),
            Some("onnx") => Ok(GraphFormat::Onnx),
            _ => anyhow::bail!(
                "cannot infer model format of {} (expected a .pb or .onnx file)",
                path.display()
            ),
        }
    }
}

/// How to wire a graph for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphOptions {
    pub format: GraphFormat,
    /// Node fed with the input tensor. Only used for TensorFlow graphs.
    pub input_node: String,
    /// Node fetched as the result. Only used for TensorFlow graphs.
    pub output_node: String,
    /// Pin the input to this concrete `f32` shape. `None` keeps the shape declared by the file.
    pub input_shape: Option<Vec<usize>>,
}

impl GraphOptions {
    pub fn tensorflow(input_node: &str, output_node: &str, input_shape: &[usize]) -> Self {
        Self {
            format: GraphFormat::TensorFlow,
            input_node: input_node.to_string(),
            output_node: output_node.to_string(),
            input_shape: Some(input_shape.to_vec()),
        }
    }

    pub fn onnx() -> Self {
        Self {
            format: GraphFormat::Onnx,
            input_node: String::new(),
            output_node: String::new(),
            input_shape: None,
        }
    }
}

/// tract-backed inference engine for TensorFlow and ONNX graphs.
#[derive(Debug)]
pub struct TractEngine {
    runnable: RunnableModel,
    format: GraphFormat,
}

impl TractEngine {
    /// Read and optimize a graph from disk.
    pub fn load<P: AsRef<Path>>(model_path: P, options: &GraphOptions) -> Result<Self> {
        let path = model_path.as_ref();
        anyhow::ensure!(path.exists(), "model file not found: {}", path.display());
        let bytes =
            fs::read(path).with_context(|| format!("failed to read model {}", path.display()))?;
        let engine = Self::from_bytes(&bytes, options)
            .with_context(|| format!("failed to load model {}", path.display()))?;
        debug!("Loaded {:?} model {}", engine.format, path.display());
        Ok(engine)
    }

    /// Build an engine from the serialized graph bytes.
    ///
    /// The optimized plan is tried first; if tract cannot optimize the graph the decluttered plan
    /// is used instead, which runs noticeably slower.
    pub fn from_bytes(bytes: &[u8], options: &GraphOptions) -> Result<Self> {
        let _guard = timing_guard("imgsense_core::load_model", log::Level::Debug);
        let runnable = match load_runnable_model(bytes, options, true) {
            Ok(model) => model,
            Err(opt_err) => {
                let optimize_msg = format!("{opt_err}");
                let mut chain_msg = String::new();
                for cause in opt_err.chain() {
                    let _ = writeln!(&mut chain_msg, "  - {cause}");
                }
                warn!(
                    "Optimized load failed ({}); falling back to decluttered graph.\nError chain:\n{}",
                    optimize_msg,
                    chain_msg.trim_end()
                );
                load_runnable_model(bytes, options, false).with_context(|| {
                    format!("fallback to decluttered graph failed after optimize error: {optimize_msg}")
                })?
            }
        };

        Ok(Self {
            runnable,
            format: options.format,
        })
    }

    pub fn format(&self) -> GraphFormat {
        self.format
    }

    /// Execute the graph and return every output tensor.
    pub fn run_all(&self, input: Tensor) -> Result<Vec<Tensor>> {
        let _guard = timing_guard("imgsense_core::inference", log::Level::Debug);
        let outputs = self
            .runnable
            .run(tvec![input.into()])
            .map_err(|e| anyhow::anyhow!("model execution failed: {e}"))?;
        Ok(outputs
            .into_iter()
            .map(|value| value.into_tensor())
            .collect())
    }
}

impl InferenceEngine for TractEngine {
    fn run(&self, input: Tensor) -> Result<Tensor> {
        self.run_all(input)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("model produced no outputs"))
    }
}

fn parse_model(bytes: &[u8], options: &GraphOptions) -> Result<InferenceModel> {
    let mut reader = Cursor::new(bytes);
    let mut model = match options.format {
        GraphFormat::TensorFlow => tract_tensorflow::tensorflow()
            .model_for_read(&mut reader)
            .context("failed to parse TensorFlow graph")?
            .with_input_names([options.input_node.as_str()])
            .with_context(|| format!("graph has no input node '{}'", options.input_node))?
            .with_output_names([options.output_node.as_str()])
            .with_context(|| format!("graph has no output node '{}'", options.output_node))?,
        GraphFormat::Onnx => tract_onnx::onnx()
            .model_for_read(&mut reader)
            .context("failed to parse ONNX graph")?,
    };
    if let Some(shape) = &options.input_shape {
        let fact: InferenceFact = f32::fact(shape.iter().copied()).into();
        model = model
            .with_input_fact(0, fact)
            .with_context(|| format!("cannot pin model input to shape {shape:?}"))?;
    }
    Ok(model)
}

fn load_runnable_model(
    bytes: &[u8],
    options: &GraphOptions,
    optimized: bool,
) -> Result<RunnableModel> {
    let model = parse_model(bytes, options)?;
    if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make graph runnable: {e}"))
    } else {
        model
            .into_typed()
            .map_err(|e| anyhow::anyhow!("unable to type-check graph: {e}"))?
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make graph runnable: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            GraphFormat::from_path("models/graph.pb").unwrap(),
            GraphFormat::TensorFlow
        );
        assert_eq!(
            GraphFormat::from_path("Model.ONNX").unwrap(),
            GraphFormat::Onnx
        );
        assert!(GraphFormat::from_path("cascade.xml").is_err());
        assert!(GraphFormat::from_path("no_extension").is_err());
    }

    #[test]
    fn loading_missing_model_fails() {
        let err = TractEngine::load("missing.onnx", &GraphOptions::onnx()).unwrap_err();
        assert!(format!("{err}").contains("model file not found"));
    }

    #[test]
    fn invalid_onnx_produces_useful_error() {
        let mut temp = NamedTempFile::new().expect("temp file");
        temp.write_all(b"not a real onnx file")
            .expect("write mock model");

        let err = TractEngine::load(temp.path(), &GraphOptions::onnx())
            .expect_err("invalid ONNX should fail");
        let message = format!("{err:#}");
        assert!(
            message.contains("failed to parse ONNX") || message.contains("unable to optimize"),
            "Unexpected error message: {message}"
        );
    }

    #[test]
    fn invalid_tensorflow_graph_fails() {
        let options = GraphOptions::tensorflow("input", "output", &[1, 224, 224, 3]);
        assert!(TractEngine::from_bytes(b"\x01\x02garbage", &options).is_err());
    }
}
