use crate::classify::{BatchItem, BatchOutput, ClassifyOutput, ImageUpload, Prediction};
use crate::image::ImageLoader;
use crate::models::ColorClassifier;
use crate::Result;
use std::path::Path;
use std::time::Instant;

/// 分类处理流水线：计时、日志与输出封装
pub struct ClassifyPipeline;

impl ClassifyPipeline {
    /// 处理图像文件
    pub fn process_path(classifier: &ColorClassifier, path: &Path) -> Result<ClassifyOutput> {
        let source = path.display().to_string();
        Self::run(classifier, &source, || classifier.predict(path))
    }

    /// 处理字节流图像
    pub fn process_bytes(classifier: &ColorClassifier, bytes: &[u8]) -> Result<ClassifyOutput> {
        Self::run(classifier, "upload", || classifier.predict_bytes(bytes))
    }

    /// 处理base64图像
    pub fn process_base64(
        classifier: &ColorClassifier,
        base64_data: &str,
    ) -> Result<ClassifyOutput> {
        Self::run(classifier, "base64", || {
            let image = ImageLoader::from_base64(base64_data)?;
            classifier.predict_image(&image)
        })
    }

    /// 逐个处理多张图像，单个文件失败记录在结果中
    pub fn process_batch(classifier: &ColorClassifier, files: Vec<ImageUpload>) -> BatchOutput {
        let start_time = Instant::now();
        let total_images = files.len();
        let mut results = Vec::with_capacity(total_images);

        for (i, file) in files.into_iter().enumerate() {
            tracing::debug!("Processing file {}/{}: {}", i + 1, total_images, file.filename);

            let item = match classifier.predict_bytes(&file.data) {
                Ok(prediction) => BatchItem {
                    filename: file.filename,
                    success: true,
                    result: Some(prediction),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!("Classification failed for {}: {}", file.filename, e);
                    BatchItem {
                        filename: file.filename,
                        success: false,
                        result: None,
                        error: Some(e.to_payload().error),
                    }
                }
            };
            results.push(item);
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        let elapsed = start_time.elapsed();

        tracing::info!(
            "Batch classification completed: files={}, succeeded={}, total_time={:.3}s",
            total_images,
            succeeded,
            elapsed.as_secs_f32()
        );

        BatchOutput {
            success: true,
            total_images,
            succeeded,
            results,
            model_info: classifier.model_info(),
            processing_time_ms: elapsed.as_millis() as u64,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn run<F>(classifier: &ColorClassifier, source: &str, predict: F) -> Result<ClassifyOutput>
    where
        F: FnOnce() -> Result<Prediction>,
    {
        let start_time = Instant::now();
        let prediction = predict()?;
        let elapsed = start_time.elapsed();

        tracing::info!(
            "Classification completed: source={}, class={}, confidence={:.4}, time={:.3}s",
            source,
            prediction.predicted_class,
            prediction.confidence,
            elapsed.as_secs_f32()
        );

        Ok(ClassifyOutput {
            success: true,
            prediction,
            model_info: classifier.model_info(),
            processing_time_ms: elapsed.as_millis() as u64,
        })
    }
}
