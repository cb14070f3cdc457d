use crate::web::extractors::{request_id_from_headers, RequestId, REQUEST_ID_HEADER};
use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// 请求日志：分配请求ID、记录耗时，并在响应头中回传ID
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let request_id = request_id_from_headers(req.headers());
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start_time = Instant::now();

    tracing::debug!("[{}] {} {} started", request_id, method, path);

    let mut response = next.run(req).await;
    let status = response.status();
    let elapsed_ms = start_time.elapsed().as_millis();

    if status.is_server_error() {
        tracing::warn!("[{}] {} {} -> {} in {}ms", request_id, method, path, status, elapsed_ms);
    } else {
        tracing::info!("[{}] {} {} -> {} in {}ms", request_id, method, path, status, elapsed_ms);
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// 安全响应头
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;

    let headers = response.headers_mut();
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

    response
}
