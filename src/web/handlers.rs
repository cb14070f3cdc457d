use crate::{
    classify::{BatchOutput, ClassifyOutput, ClassifyPipeline, ImageUpload},
    utils::error::ClassifierError,
    web::{
        extractors::{RequestId, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    extract::{multipart::Field, Multipart, State},
    response::Json,
};
use serde::Deserialize;
use std::time::Instant;

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct ClassifyJsonRequest {
    /// Base64编码的图像数据，可带 data URL 前缀
    pub image: String,
}

/// 在阻塞线程池中执行推理，避免占用异步工作线程
async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ClassifierError::Internal(format!("Inference task failed: {}", e)))?
}

fn is_image_field(field: &Field<'_>) -> bool {
    match field.content_type() {
        Some(content_type) => {
            content_type.starts_with("image/") || content_type == "application/octet-stream"
        }
        None => true,
    }
}

/// JSON base64上传处理器
pub async fn classify_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<ClassifyJsonRequest>,
) -> Result<Json<ClassifyOutput>> {
    let start_time = Instant::now();

    tracing::info!(
        "Processing JSON classify request: request_id={}, payload={} chars",
        request_id,
        request.image.len()
    );

    let classifier = state.classifier.clone();
    let output =
        run_blocking(move || ClassifyPipeline::process_base64(&classifier, &request.image))
            .await?;

    tracing::info!(
        "JSON classify completed: request_id={}, class={}, time={:.3}s",
        request_id,
        output.prediction.predicted_class,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(output))
}

/// Multipart单文件上传处理器（字段名 image）
pub async fn classify_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<ClassifyOutput>> {
    let start_time = Instant::now();

    tracing::info!("Processing multipart classify request: request_id={}", request_id);

    let mut image_data: Option<axum::body::Bytes> = None;

    // 解析multipart数据
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ClassifierError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "image" => {
                // 验证内容类型
                if !is_image_field(&field) {
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    return Err(ClassifierError::UnsupportedFormat(content_type));
                }

                let data = field.bytes().await.map_err(|e| {
                    ClassifierError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(ClassifierError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let image_data = image_data
        .ok_or_else(|| ClassifierError::InvalidInput("No image file provided".to_string()))?;

    let classifier = state.classifier.clone();
    let output =
        run_blocking(move || ClassifyPipeline::process_bytes(&classifier, &image_data)).await?;

    tracing::info!(
        "Upload classify completed: request_id={}, class={}, time={:.3}s",
        request_id,
        output.prediction.predicted_class,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(output))
}

/// 批处理上传处理器（字段名 images，可重复）
pub async fn classify_batch_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<BatchOutput>> {
    let max_files = state.config.server_config.max_batch_files;

    tracing::info!("Processing batch classify request: request_id={}", request_id);

    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ClassifierError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some("images") {
            continue;
        }

        if !is_image_field(&field) {
            tracing::debug!("Skipping non-image field in batch {}", request_id);
            continue;
        }

        if files.len() == max_files {
            return Err(ClassifierError::InvalidInput(format!(
                "Too many files, at most {} images per batch",
                max_files
            )));
        }

        let filename = field.file_name().unwrap_or("unknown").to_string();
        let data = field.bytes().await.map_err(|e| {
            ClassifierError::InvalidInput(format!("Failed to read file data: {}", e))
        })?;

        if !data.is_empty() {
            files.push(ImageUpload { filename, data });
        }
    }

    if files.is_empty() {
        return Err(ClassifierError::InvalidInput(
            "No image files provided".to_string(),
        ));
    }

    let classifier = state.classifier.clone();
    let output =
        run_blocking(move || Ok(ClassifyPipeline::process_batch(&classifier, files))).await?;

    tracing::info!(
        "Batch classify completed: request_id={}, files={}, succeeded={}",
        request_id,
        output.total_images,
        output.succeeded
    );

    Ok(Json(output))
}
