use crate::{utils::error::ClassifierError, Result};
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

/// 请求ID头
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 解析后立即校验的JSON提取器，失败统一为 `ClassifierError::Validation`
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ClassifierError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| ClassifierError::Validation(err.body_text()))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl Validate for crate::web::handlers::ClassifyJsonRequest {
    fn validate(&self) -> Result<()> {
        let image = self.image.trim();
        if image.is_empty() {
            return Err(ClassifierError::Validation(
                "Image data cannot be empty".to_string(),
            ));
        }

        // data URL 只接受图像类型
        if let Some(rest) = image.strip_prefix("data:") {
            let mime = rest.split([';', ',']).next().unwrap_or_default();
            if !mime.starts_with("image/") {
                return Err(ClassifierError::Validation(format!(
                    "Data URL must carry an image, got '{}'",
                    mime
                )));
            }
        }

        Ok(())
    }
}

/// 请求ID，由日志中间件保证存在
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| RequestId(request_id_from_headers(&parts.headers)));

        Ok(request_id)
    }
}

/// 读取客户端提供的请求ID，缺失时生成新的
pub fn request_id_from_headers(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
