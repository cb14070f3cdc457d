#![allow(dead_code)]

use candle_core::{DType, Device, Tensor};
use color_classifier::config::HistogramConfig;
use color_classifier::models::{weights, ColorClassifier, Variant};
use color_classifier::Config;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 所有权重置零、running_var 置一，分类头偏置指定；网络输出与输入无关
pub fn write_constant_weights(dir: &Path, variant: Variant, classifier_bias: &[f32]) -> PathBuf {
    let bias = Tensor::new(classifier_bias, &Device::Cpu).unwrap();
    write_weights(
        dir,
        variant,
        classifier_bias.len(),
        HashMap::from([("classifier.bias".to_string(), bias)]),
    )
}

/// 以零权重为底，按名称覆盖部分参数后写成 safetensors
pub fn write_weights(
    dir: &Path,
    variant: Variant,
    num_classes: usize,
    mut overrides: HashMap<String, Tensor>,
) -> PathBuf {
    let manifest =
        weights::parameter_manifest(variant, num_classes, HistogramConfig::default()).unwrap();

    let mut tensors = HashMap::new();
    for (name, shape) in manifest {
        let tensor = match overrides.remove(&name) {
            Some(tensor) => {
                assert_eq!(tensor.dims(), shape.as_slice(), "override shape for {}", name);
                tensor
            }
            None if name.ends_with("running_var") => {
                Tensor::ones(shape, DType::F32, &Device::Cpu).unwrap()
            }
            None => Tensor::zeros(shape, DType::F32, &Device::Cpu).unwrap(),
        };
        tensors.insert(name, tensor);
    }
    assert!(overrides.is_empty(), "unknown parameters: {:?}", overrides.keys());

    let path = dir.join(format!("{}.safetensors", variant.as_str().to_lowercase()));
    candle_core::safetensors::save(&tensors, &path).unwrap();
    path
}

pub fn cpu_config(model_path: &Path, variant: Variant) -> Config {
    Config::new(model_path, variant, None, true).unwrap()
}

/// 4 类 XXS 分类器，logits 恒为 [5, 0, 0, 0]
pub fn black_biased_classifier(dir: &Path) -> ColorClassifier {
    let path = write_constant_weights(dir, Variant::Xxs, &[5.0, 0.0, 0.0, 0.0]);
    ColorClassifier::new(&cpu_config(&path, Variant::Xxs)).unwrap()
}

pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// e^5 / (e^5 + 3)
pub fn expected_black_confidence() -> f32 {
    let e5 = 5.0f32.exp();
    e5 / (e5 + 3.0)
}
