pub mod handlers;
pub mod middleware;

use crate::{
    classify::ClassifyPipeline,
    models::{LabelVocabulary, ModelCache, ModelSource},
    utils::error::ClassifyError,
    Config, Result,
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<ClassifyPipeline>,
}

impl AppState {
    /// 按配置组装流水线：加载词表，创建模型缓存（模型在第一次推理时加载）
    pub fn from_config(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ClassifyError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let vocabulary = LabelVocabulary::from_path(&config.labels_path)?;
        let cache = Arc::new(ModelCache::new(
            ModelSource::parse(&config.model_source),
            client.clone(),
            Duration::from_secs(config.server_config.fetch_timeout),
        ));
        let pipeline = Arc::new(ClassifyPipeline::new(&config, cache, vocabulary, client));

        Ok(Self { config, pipeline })
    }
}

pub async fn serve(config: Config) -> Result<()> {
    let state = AppState::from_config(config.clone())?;

    // 构建应用路由
    let app = create_app(state);

    // 解析绑定地址
    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        ClassifyError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /classify        - JSON upload (url, data URI or base64)");
    tracing::info!("  POST /classify/upload - Multipart file upload");
    tracing::info!("  GET  /health          - Health check");
    tracing::info!("  GET  /api/info        - Service information");

    // 启动服务器
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ClassifyError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ClassifyError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = state.config.server_config.clone();

    Router::new()
        .route("/classify", post(handlers::classify_json_handler))
        .route("/classify/upload", post(handlers::classify_upload_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(RequestBodyLimitLayer::new(server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server_config.request_timeout)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 健康检查端点
async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "model_loaded": state.pipeline.invoker().model_loaded(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 服务信息端点
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let onnx = state.pipeline.invoker().onnx_config();
    Json(json!({
        "service": "ONNX Image Classification Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": {
            "source": state.config.model_source,
            "input_name": state.config.input_name,
            "output_name": state.pipeline.invoker().output_name(),
            "loaded": state.pipeline.invoker().model_loaded(),
            "labels": state.pipeline.vocabulary().len(),
        },
        "runtime": {
            "backend": onnx.backend,
            "optimization_level": onnx.optimization_level,
            "execution_mode": onnx.execution_mode,
            "intra_threads": onnx.intra_threads,
            "inter_threads": onnx.inter_threads,
            "session_strategy": onnx.session_strategy,
        },
        "default_top_k": state.pipeline.default_top_k(),
    }))
}
