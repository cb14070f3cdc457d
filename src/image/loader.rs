use crate::utils::error::ClassifierError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use ndarray::Array3;
use std::io::Cursor;
use std::path::Path;

/// 单张图像最大字节数
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50MB

/// 单边最大像素数
const MAX_DIMENSION: u32 = 8192;

pub struct ImageLoader;

impl ImageLoader {
    /// 从文件路径加载图像，按文件内容而非扩展名识别格式
    pub fn from_path(path: impl AsRef<Path>) -> Result<DynamicImage> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ClassifierError::InvalidInput(format!(
                "Image file not found: {}",
                path.display()
            )));
        }

        let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Self::validate_dimensions(&image)?;

        Ok(image)
    }

    /// 从字节流加载图像
    pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(ClassifierError::InvalidInput("Empty image data".to_string()));
        }

        // 检查文件大小
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ClassifierError::FileTooLarge(bytes.len(), MAX_IMAGE_BYTES));
        }

        if let Some(format) = Self::detect_format(bytes) {
            if !Self::is_supported_format(format) {
                return Err(ClassifierError::UnsupportedFormat(format!("{:?}", format)));
            }
        }

        let image = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .decode()?;
        Self::validate_dimensions(&image)?;

        Ok(image)
    }

    /// 从base64字符串加载图像
    pub fn from_base64(base64_data: &str) -> Result<DynamicImage> {
        // 检测并移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = match base64_data.trim().strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => base64_data.trim(),
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean)?;

        Self::from_bytes(&image_bytes)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Bmp
                | ImageFormat::Gif
                | ImageFormat::Tiff
                | ImageFormat::WebP
        )
    }

    /// 转换DynamicImage为ndarray::Array3<f32> (HWC格式，取值 0-255)
    pub fn to_array3(image: &DynamicImage) -> Array3<f32> {
        let rgb_image = image.to_rgb8();
        let (width, height) = rgb_image.dimensions();

        Array3::from_shape_fn((height as usize, width as usize, 3), |(h, w, c)| {
            rgb_image.get_pixel(w as u32, h as u32)[c] as f32
        })
    }

    /// 验证图像尺寸
    pub fn validate_dimensions(image: &DynamicImage) -> Result<()> {
        let (width, height) = image.dimensions();

        if width == 0 || height == 0 {
            return Err(ClassifierError::InvalidInput(format!(
                "Image has no pixels: {}x{}",
                width, height
            )));
        }

        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(ClassifierError::InvalidInput(format!(
                "Image too large: {}x{}, maximum {}x{}",
                width, height, MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;
    use image::{Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn missing_path_is_input_error() {
        let err = ImageLoader::from_path("/definitely/not/here.png").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn corrupt_file_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"this is not an image").unwrap();

        let err = ImageLoader::from_path(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn decodes_bytes_and_base64() {
        let bytes = png_bytes(4, 3, [10, 20, 30]);
        assert_eq!(ImageLoader::detect_format(&bytes), Some(ImageFormat::Png));

        let image = ImageLoader::from_bytes(&bytes).unwrap();
        assert_eq!(image.dimensions(), (4, 3));

        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let data_url = format!("data:image/png;base64,{}", encoded);
        assert_eq!(ImageLoader::from_base64(&data_url).unwrap().dimensions(), (4, 3));
        assert_eq!(ImageLoader::from_base64(&encoded).unwrap().dimensions(), (4, 3));
    }

    #[test]
    fn bad_base64_is_input_error() {
        let err = ImageLoader::from_base64("@@@not-base64@@@").unwrap_err();
        assert_eq!(err.error_code(), "BASE64_DECODE_ERROR");
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn empty_bytes_rejected() {
        assert!(ImageLoader::from_bytes(&[]).is_err());
    }

    #[test]
    fn to_array3_is_hwc() {
        let bytes = png_bytes(2, 5, [1, 2, 3]);
        let image = ImageLoader::from_bytes(&bytes).unwrap();
        let array = ImageLoader::to_array3(&image);

        assert_eq!(array.dim(), (5, 2, 3));
        assert_eq!(array[[4, 1, 0]], 1.0);
        assert_eq!(array[[4, 1, 2]], 3.0);
    }
}
