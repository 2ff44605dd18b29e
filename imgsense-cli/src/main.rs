mod annotate;
mod args;
mod config;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use imgsense_core::{FaceDetector, ImageClassifier, build_face_detector};
use imgsense_utils::{config::AppSettings, configure_telemetry, init_logging, load_image};
use log::info;

use crate::{
    annotate::{annotate_faces, save_annotated},
    args::{ClassifyArgs, Cli, Command, DetectArgs},
    config::{
        apply_classify_overrides, apply_detect_overrides, apply_telemetry_overrides,
        load_settings,
    },
    report::{ClassificationReport, FaceReport, write_json},
};

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_ref())?;
    apply_telemetry_overrides(&mut settings, &cli);
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    match &cli.command {
        Command::Classify(args) => {
            apply_classify_overrides(&mut settings, args);
            run_classify(&settings, args)
        }
        Command::DetectFaces(args) => {
            apply_detect_overrides(&mut settings, args);
            run_detect(&settings, args)
        }
    }
}

fn run_classify(settings: &AppSettings, args: &ClassifyArgs) -> Result<()> {
    let classifier_settings = &settings.classifier;
    info!(
        "Loading classifier {} with labels {}",
        classifier_settings.model_path, classifier_settings.labels_path
    );
    let classifier = ImageClassifier::from_settings(classifier_settings)?;
    let result = classifier.classify_path(&args.image)?;

    let top_k = classifier_settings.top_k;
    let report = ClassificationReport {
        image: args.image.display().to_string(),
        model: classifier_settings.model_path.clone(),
        best: result.best()?,
        top_k,
        top: result.top(top_k)?,
    };

    if let Some(json_path) = args.json.as_ref() {
        write_json(&report, json_path)?;
    } else {
        for line in report.console_lines() {
            println!("{line}");
        }
    }
    Ok(())
}

fn run_detect(settings: &AppSettings, args: &DetectArgs) -> Result<()> {
    let face_settings = &settings.face;
    info!("Loading face model {}", face_settings.model_path);
    let detector = build_face_detector(face_settings)?;

    let image = load_image(&args.image)
        .with_context(|| format!("failed to read [{}]", args.image.display()))?;
    let faces = detector.detect(&image)?;

    let report = FaceReport {
        image: args.image.display().to_string(),
        output: args.output.display().to_string(),
        faces,
    };
    for line in report.console_lines() {
        println!("{line}");
    }
    let annotated = annotate_faces(&image, &report.faces);
    save_annotated(&annotated, &args.output)?;

    if let Some(json_path) = args.json.as_ref() {
        write_json(&report, json_path)?;
    }
    Ok(())
}
