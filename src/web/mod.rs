pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{models::ColorClassifier, utils::error::ClassifierError, Config, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 处理器共享状态：只读的分类服务与配置
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<ColorClassifier>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, classifier: ColorClassifier) -> Self {
        Self {
            classifier: Arc::new(classifier),
            config: Arc::new(config),
        }
    }
}

pub async fn serve(config: Config) -> Result<()> {
    // 加载模型（同步计算，放到阻塞线程池）
    let classifier = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || ColorClassifier::new(&config))
            .await
            .map_err(|e| ClassifierError::Internal(format!("Model loading task failed: {}", e)))??
    };

    // 解析绑定地址
    let bind_addr = config.server_config.bind_addr.clone();
    let addr: SocketAddr = bind_addr.parse().map_err(|e| {
        ClassifierError::Config(format!("Invalid bind address {}: {}", bind_addr, e))
    })?;

    let app = create_app(AppState::new(config, classifier));

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /classify        - Multipart image upload (field: image)");
    tracing::info!("  POST /classify/json   - JSON base64 upload");
    tracing::info!("  POST /classify-batch  - Multipart batch upload (field: images)");
    tracing::info!("  GET  /health          - Health check");
    tracing::info!("  GET  /api/info        - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        ClassifierError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ClassifierError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = state.config.server_config.clone();

    Router::new()
        // 分类API路由
        .route("/classify", post(handlers::classify_upload_handler))
        .route("/classify/json", post(handlers::classify_json_handler))
        .route("/classify-batch", post(handlers::classify_batch_handler))
        // 系统路由
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .fallback(not_found_handler)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(DefaultBodyLimit::max(server_config.max_request_size))
        .layer(RequestBodyLimitLayer::new(server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server_config.request_timeout)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 健康检查端点
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "message": "Color Classification API is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 服务信息端点
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let server_config = &state.config.server_config;

    Json(json!({
        "service": "Color Classification Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": state.classifier.model_info(),
        "limits": {
            "max_request_size": server_config.max_request_size,
            "max_batch_files": server_config.max_batch_files,
            "request_timeout_secs": server_config.request_timeout
        }
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": {
                "kind": "input",
                "code": "NOT_FOUND",
                "message": "The requested endpoint does not exist"
            }
        })),
    )
}
