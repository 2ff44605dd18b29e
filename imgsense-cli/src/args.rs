//! Command-line argument definitions for imgsense.

use clap::{ArgAction, Args, Parser, Subcommand};
use imgsense_utils::config::ResizeQuality;
use std::path::PathBuf;

/// Classify images and detect faces with pre-trained models.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional settings JSON. Defaults to `config/imgsense.json` when present, otherwise built-in parameters.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, global = true, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Label an image with a pre-trained classification network.
    Classify(ClassifyArgs),
    /// Find faces in an image and write a copy with the faces outlined.
    DetectFaces(DetectArgs),
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Image to classify.
    #[arg(short, long, default_value = "jack.jpg")]
    pub image: PathBuf,

    /// Frozen TensorFlow graph (.pb) or ONNX model (.onnx).
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Label list, one label per line, aligned with the model output.
    #[arg(short, long)]
    pub labels: Option<PathBuf>,

    /// Number of labels listed in the top-K report.
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Override input width (pixels).
    #[arg(long)]
    pub width: Option<u32>,

    /// Override input height (pixels).
    #[arg(long)]
    pub height: Option<u32>,

    /// Resize quality mode: `quality` (bilinear) or `speed` (nearest).
    #[arg(long, value_name = "MODE")]
    pub resize_quality: Option<ResizeQuality>,

    /// Name output classes beyond the end of the label file `unknown` instead of failing.
    #[arg(long, action = ArgAction::SetTrue)]
    pub allow_unlabeled: bool,

    /// Write the report to a JSON file instead of stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Image to search for faces.
    #[arg(short, long, default_value = "ja.jpg")]
    pub image: PathBuf,

    /// YuNet ONNX model, or a Haar cascade XML when built with `opencv`.
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Where to write the annotated image.
    #[arg(short, long, default_value = "output.png")]
    pub output: PathBuf,

    /// Override score threshold.
    #[arg(long)]
    pub score_threshold: Option<f32>,

    /// Override NMS threshold.
    #[arg(long)]
    pub nms_threshold: Option<f32>,

    /// Write detections to a JSON file as well.
    #[arg(long)]
    pub json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_defaults_to_bundled_sample() {
        let cli = Cli::try_parse_from(["imgsense", "classify"]).unwrap();
        let Command::Classify(args) = cli.command else {
            panic!("expected classify");
        };
        assert_eq!(args.image, PathBuf::from("jack.jpg"));
        assert!(args.model.is_none());
        assert!(args.top_k.is_none());
    }

    #[test]
    fn detect_defaults_and_global_flags() {
        let cli = Cli::try_parse_from([
            "imgsense",
            "detect-faces",
            "--telemetry",
            "--score-threshold",
            "0.5",
        ])
        .unwrap();
        assert!(cli.telemetry);
        let Command::DetectFaces(args) = cli.command else {
            panic!("expected detect-faces");
        };
        assert_eq!(args.image, PathBuf::from("ja.jpg"));
        assert_eq!(args.output, PathBuf::from("output.png"));
        assert_eq!(args.score_threshold, Some(0.5));
    }

    #[test]
    fn rejects_bad_resize_quality() {
        assert!(
            Cli::try_parse_from(["imgsense", "classify", "--resize-quality", "blurry"]).is_err()
        );
        let cli =
            Cli::try_parse_from(["imgsense", "classify", "--resize-quality", "speed"]).unwrap();
        let Command::Classify(args) = cli.command else {
            panic!("expected classify");
        };
        assert_eq!(args.resize_quality, Some(ResizeQuality::Speed));
    }
}
