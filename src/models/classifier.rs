use super::network::ColorMobileViT;
use super::variant::Variant;
use super::weights;
use crate::config::DevicePreference;
use crate::image::postprocessing::{ModelInfo, Prediction};
use crate::image::{ImageLoader, ImagePreprocessor, ResultFormatter};
use crate::utils::error::ClassifierError;
use crate::{Config, Result};
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::VarBuilder;
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;

/// 颜色分类推理服务
///
/// 构造即完成模型实例化、权重读取与校验；构造成功后只读，可在多线程间共享。
pub struct ColorClassifier {
    model: ColorMobileViT,
    device: Device,
    variant: Variant,
    class_names: Vec<String>,
    preprocessor: ImagePreprocessor,
}

impl ColorClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = &config.model_path;

        if !model_path.is_file() {
            return Err(ClassifierError::Config(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        let device = select_device(config.device)?;
        let num_classes = config.num_classes();

        tracing::info!(
            "Loading {} color model from: {}",
            config.variant,
            model_path.display()
        );
        let start = Instant::now();

        let manifest =
            weights::parameter_manifest(config.variant, num_classes, config.histogram_config)?;
        let params = weights::read_parameters(model_path, &device)?;
        weights::validate_parameters(&manifest, &params)?;

        let vb = VarBuilder::from_tensors(params, DType::F32, &device);
        let model = ColorMobileViT::load(vb, config.variant, num_classes, config.histogram_config)
            .map_err(|e| ClassifierError::ModelLoad(format!("Failed to build network: {}", e)))?;

        tracing::info!(
            "Color model ready: variant={}, classes={:?}, device={}, parameters={}, time={:.3}s",
            config.variant,
            config.class_names,
            device_name(&device),
            manifest.len(),
            start.elapsed().as_secs_f32()
        );

        Ok(Self {
            model,
            device,
            variant: config.variant,
            class_names: config.class_names.clone(),
            preprocessor: ImagePreprocessor::new(config.preprocess_config.clone()),
        })
    }

    /// 对图像文件分类
    pub fn predict(&self, image_path: impl AsRef<Path>) -> Result<Prediction> {
        let image = ImageLoader::from_path(image_path)?;
        self.predict_image(&image)
    }

    /// 对已编码的图像字节分类
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Prediction> {
        let image = ImageLoader::from_bytes(bytes)?;
        self.predict_image(&image)
    }

    pub fn predict_image(&self, image: &DynamicImage) -> Result<Prediction> {
        let input = self.preprocessor.to_tensor(image, &self.device)?;
        let logits = self.logits(&input)?;

        let probabilities = candle_nn::ops::softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_vec1::<f32>()?;

        ResultFormatter::format_prediction(&probabilities, &self.class_names)
    }

    /// 前向传播，输入 (B, 3, H, W)，输出 logits (B, num_classes)
    pub fn logits(&self, input: &Tensor) -> Result<Tensor> {
        self.model
            .forward(input)
            .map_err(|e| ClassifierError::Inference(format!("Forward pass failed: {}", e)))
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            variant: self.variant.to_string(),
            classes: self.class_names.clone(),
            device: device_name(&self.device).to_string(),
        }
    }
}

fn select_device(preference: DevicePreference) -> Result<Device> {
    match preference {
        DevicePreference::Cpu => Ok(Device::Cpu),
        DevicePreference::Auto => Device::cuda_if_available(0)
            .map_err(|e| ClassifierError::Config(format!("Failed to select device: {}", e))),
    }
}

fn device_name(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}
