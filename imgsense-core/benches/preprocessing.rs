use std::{hint::black_box, io::Cursor};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imgsense_core::preprocess::{
    CpuPreprocessor, InputSize, PreprocessConfig, Preprocessor, preprocess_image_bytes,
};
use imgsense_utils::config::{InputDimensions, ResizeQuality, TensorLayout};

/// Deterministic gradient so resizing has real work to do.
fn synthetic_image(width: u32, height: u32) -> DynamicImage {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    });
    DynamicImage::ImageRgb8(image)
}

fn preprocess_configs() -> Vec<(&'static str, PreprocessConfig)> {
    vec![
        ("inception_nhwc", PreprocessConfig::default()),
        (
            "inception_nchw",
            PreprocessConfig {
                layout: TensorLayout::Nchw,
                ..Default::default()
            },
        ),
        (
            "inception_speed",
            PreprocessConfig {
                resize_quality: ResizeQuality::Speed,
                ..Default::default()
            },
        ),
        (
            "yunet_640",
            PreprocessConfig::yunet(&InputDimensions::new(640, 640, ResizeQuality::Speed)),
        ),
    ]
}

fn benchmark_preprocessing(c: &mut Criterion) {
    let image = synthetic_image(1280, 960);
    let mut jpeg = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .expect("encode benchmark jpeg");

    let mut dyn_group = c.benchmark_group("preprocess_dynamic_image");
    for (label, config) in preprocess_configs().iter() {
        dyn_group.bench_with_input(BenchmarkId::new("cpu", label), config, |b, cfg| {
            b.iter(|| {
                CpuPreprocessor
                    .preprocess(black_box(&image), cfg)
                    .expect("dynamic preprocessing should succeed");
            });
        });
    }
    dyn_group.finish();

    let mut bytes_group = c.benchmark_group("preprocess_image_bytes");
    let config = PreprocessConfig::default();
    bytes_group.bench_function("jpeg_1280x960", |b| {
        b.iter(|| {
            preprocess_image_bytes(black_box(&jpeg), &config)
                .expect("jpeg preprocessing should succeed");
        });
    });
    bytes_group.finish();

    let native = synthetic_image(224, 224);
    c.bench_function("preprocess_no_resize", |b| {
        let config = PreprocessConfig {
            input_size: InputSize::new(224, 224),
            ..Default::default()
        };
        b.iter(|| {
            CpuPreprocessor
                .preprocess(black_box(&native), &config)
                .expect("preprocessing should succeed");
        });
    });
}

criterion_group!(benches, benchmark_preprocessing);
criterion_main!(benches);
