use super::{ImageLoader, ImageTransforms};
use crate::config::PreprocessConfig;
use crate::Result;
use candle_core::{Device, Tensor};
use image::DynamicImage;
use ndarray::Array3;

/// 推理预处理：缩放 -> [0, 1] -> 按通道标准化
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn image_size(&self) -> usize {
        self.config.image_size
    }

    /// 输出 CHW 数组，形状 (3, size, size)
    pub fn preprocess(&self, image: &DynamicImage) -> Result<Array3<f32>> {
        let size = self.config.image_size as u32;
        let resized = ImageTransforms::resize(image, size, size);
        let hwc = ImageLoader::to_array3(&resized);

        ImageTransforms::to_chw_normalized(&hwc, &self.config.mean, &self.config.std)
    }

    /// 输出带 batch 维的张量，形状 (1, 3, size, size)
    pub fn to_tensor(&self, image: &DynamicImage, device: &Device) -> Result<Tensor> {
        let chw = self.preprocess(image)?;
        let (c, h, w) = chw.dim();
        let data: Vec<f32> = chw.iter().copied().collect();

        Ok(Tensor::from_vec(data, (1, c, h, w), device)?)
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(PreprocessConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn black_image_maps_to_negative_mean_over_std() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(128, 128));
        let chw = ImagePreprocessor::default().preprocess(&image).unwrap();

        assert_eq!(chw.dim(), (3, 128, 128));
        let expected = [-0.485 / 0.229, -0.456 / 0.224, -0.406 / 0.225];
        for (c, value) in expected.iter().enumerate() {
            assert!((chw[[c, 10, 10]] - value).abs() < 1e-5);
        }
    }

    #[test]
    fn any_size_becomes_input_size() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(512, 512, Rgb([255, 255, 255])));
        let tensor = ImagePreprocessor::default()
            .to_tensor(&image, &Device::Cpu)
            .unwrap();

        assert_eq!(tensor.dims4().unwrap(), (1, 3, 128, 128));

        let white_red = (1.0 - 0.485) / 0.229;
        let first = tensor.flatten_all().unwrap().get(0).unwrap().to_scalar::<f32>().unwrap();
        assert!((first - white_red).abs() < 1e-5);
    }

    #[test]
    fn tensor_layout_matches_array() {
        let mut pixels = RgbImage::new(128, 128);
        pixels.put_pixel(3, 7, Rgb([255, 0, 0]));
        let image = DynamicImage::ImageRgb8(pixels);

        let preprocessor = ImagePreprocessor::default();
        let chw = preprocessor.preprocess(&image).unwrap();
        let tensor = preprocessor.to_tensor(&image, &Device::Cpu).unwrap();

        let value = tensor
            .squeeze(0)
            .unwrap()
            .get(0)
            .unwrap()
            .get(7)
            .unwrap()
            .get(3)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert_eq!(value, chw[[0, 7, 3]]);
    }
}
