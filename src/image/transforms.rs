use crate::utils::error::ClassifierError;
use crate::Result;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array3;

/// 图像变换工具集
pub struct ImageTransforms;

impl ImageTransforms {
    /// 缩放到固定尺寸（不保持宽高比），双线性插值
    pub fn resize(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        if image.width() == width && image.height() == height {
            return image.clone();
        }
        image.resize_exact(width, height, FilterType::Triangle)
    }

    /// HWC (0-255) 转为 CHW，先缩放到 [0, 1] 再按通道标准化
    pub fn to_chw_normalized(
        image: &Array3<f32>,
        mean: &[f32; 3],
        std: &[f32; 3],
    ) -> Result<Array3<f32>> {
        let (height, width, channels) = image.dim();
        if channels != 3 {
            return Err(ClassifierError::InvalidInput(format!(
                "Expected 3 color channels, got {}",
                channels
            )));
        }
        if std.iter().any(|s| *s <= 0.0) {
            return Err(ClassifierError::Config(
                "Normalization std must be positive".to_string(),
            ));
        }

        Ok(Array3::from_shape_fn((channels, height, width), |(c, h, w)| {
            (image[[h, w, c]] / 255.0 - mean[c]) / std[c]
        }))
    }
}
