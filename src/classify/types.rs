use crate::utils::error::ErrorBody;
use serde::Serialize;

/// 单张图像的完整输出
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyOutput {
    pub success: bool,
    /// 预测结果
    pub prediction: Prediction,
    /// 模型信息
    pub model_info: ModelInfo,
    /// 处理耗时（毫秒）
    pub processing_time_ms: u64,
}

/// 批量上传中的单个文件
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub data: axum::body::Bytes,
}

/// 批量处理中单个文件的结果，失败不影响其他文件
#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub filename: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// 批量处理输出
#[derive(Debug, Serialize)]
pub struct BatchOutput {
    pub success: bool,
    pub total_images: usize,
    pub succeeded: usize,
    pub results: Vec<BatchItem>,
    pub model_info: ModelInfo,
    pub processing_time_ms: u64,
    pub timestamp: String,
}

// 重新导出主要类型
pub use crate::image::postprocessing::{ModelInfo, Prediction};
