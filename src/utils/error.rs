use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Tensor backend error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// 错误大类，调用方据此区分配置、加载、输入与推理失败
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Load,
    Input,
    Inference,
    Internal,
}

impl ClassifierError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifierError::Config(_) => ErrorKind::Configuration,
            ClassifierError::ModelLoad(_) => ErrorKind::Load,
            ClassifierError::InvalidInput(_)
            | ClassifierError::Validation(_)
            | ClassifierError::FileTooLarge(_, _)
            | ClassifierError::UnsupportedFormat(_)
            | ClassifierError::Io(_)
            | ClassifierError::Json(_)
            | ClassifierError::Base64(_)
            | ClassifierError::ImageDecode(_) => ErrorKind::Input,
            ClassifierError::Inference(_) | ClassifierError::Candle(_) => ErrorKind::Inference,
            ClassifierError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ClassifierError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            ClassifierError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ClassifierError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => match self.kind() {
                ErrorKind::Input => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ClassifierError::Config(_) => "CONFIG_ERROR",
            ClassifierError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            ClassifierError::InvalidInput(_) => "INVALID_INPUT",
            ClassifierError::Validation(_) => "VALIDATION_ERROR",
            ClassifierError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            ClassifierError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ClassifierError::Inference(_) => "INFERENCE_ERROR",
            ClassifierError::Io(_) => "IO_ERROR",
            ClassifierError::Json(_) => "JSON_ERROR",
            ClassifierError::Base64(_) => "BASE64_DECODE_ERROR",
            ClassifierError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            ClassifierError::Candle(_) => "TENSOR_BACKEND_ERROR",
            ClassifierError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 机器可读的错误结构，CLI与HTTP共用
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            success: false,
            error: ErrorBody {
                kind: self.kind(),
                code: self.error_code(),
                message: self.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for ClassifierError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        tracing::error!("Request failed: {} ({})", self, status);

        (status, axum::Json(self.to_payload())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_failure_stage() {
        assert_eq!(ClassifierError::Config("x".into()).kind(), ErrorKind::Configuration);
        assert_eq!(ClassifierError::ModelLoad("x".into()).kind(), ErrorKind::Load);
        assert_eq!(ClassifierError::InvalidInput("x".into()).kind(), ErrorKind::Input);
        assert_eq!(ClassifierError::Inference("x".into()).kind(), ErrorKind::Inference);

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(ClassifierError::from(io).kind(), ErrorKind::Input);
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            ClassifierError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ClassifierError::FileTooLarge(20, 10).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ClassifierError::ModelLoad("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ClassifierError::Inference("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn payload_is_tagged() {
        let payload = ClassifierError::ModelLoad("bad shapes".into()).to_payload();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "load");
        assert_eq!(json["error"]["code"], "MODEL_LOAD_ERROR");
        assert_eq!(json["error"]["message"], "Model loading failed: bad shapes");
    }
}
