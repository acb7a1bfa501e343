use crate::{
    classify::{ClassifyOptions, DetectionResult},
    image::ImageSource,
    utils::error::ClassifyError,
    web::AppState,
    Result,
};
use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// JSON请求体
#[derive(Debug, Deserialize)]
pub struct ClassifyJsonRequest {
    /// 图像：http(s) URL、data URI 或 base64 编码的数据
    pub image: String,

    #[serde(flatten)]
    pub options: ClassifyOptions,
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: String,
    pub request_id: String,
}

/// 错误信息：`code` 与 `ClassifyError::error_code` 一致
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }

    /// 错误响应，由 `ClassifyError` 的 `IntoResponse` 使用
    pub fn error(code: String, message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError { code, message }),
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// JSON 上传处理器
pub async fn classify_json_handler(
    State(state): State<AppState>,
    Json(request): Json<ClassifyJsonRequest>,
) -> Result<Json<ApiResponse<DetectionResult>>> {
    let start_time = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    let source = ImageSource::from_request_field(&request.image)?;
    tracing::info!(
        "Processing JSON classify request: request_id={}, source={}, top_k={:?}",
        request_id,
        source.kind(),
        request.options.top_k
    );

    let result = state.pipeline.classify(source, request.options.top_k).await.map_err(|e| {
        tracing::warn!("Classification failed: request_id={}, error={}", request_id, e);
        e
    })?;

    tracing::info!(
        "JSON classify completed: request_id={}, predictions={}, time={:.3}s",
        request_id,
        result.predictions.len(),
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(result, request_id)))
}

/// Multipart文件上传处理器
pub async fn classify_upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<DetectionResult>>> {
    let start_time = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    tracing::info!("Processing multipart classify request: request_id={}", request_id);

    let mut image_data: Option<bytes::Bytes> = None;
    let mut top_k: Option<usize> = None;

    // 解析multipart数据
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ClassifyError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                // 验证内容类型
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("image/") {
                        return Err(ClassifyError::UnsupportedFormat(content_type.to_string()));
                    }
                }

                let data = field.bytes().await.map_err(|e| {
                    ClassifyError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(ClassifyError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            "top_k" => {
                let value = field.text().await.map_err(|e| {
                    ClassifyError::InvalidInput(format!("Failed to read top_k field: {}", e))
                })?;
                top_k = Some(value.trim().parse().map_err(|_| {
                    ClassifyError::InvalidInput(format!("Invalid top_k: {}", value))
                })?);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    // 验证必需的图像数据
    let image_data = image_data
        .ok_or_else(|| ClassifyError::InvalidInput("No image file provided".to_string()))?;

    let result = state
        .pipeline
        .classify(ImageSource::Bytes(image_data), top_k)
        .await?;

    tracing::info!(
        "Upload classify completed: request_id={}, predictions={}, time={:.3}s",
        request_id,
        result.predictions.len(),
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(result, request_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_top_k_is_optional() {
        let req: ClassifyJsonRequest = serde_json::from_str(r#"{"image": "abc"}"#).unwrap();
        assert_eq!(req.options.top_k, None);
        let req: ClassifyJsonRequest = serde_json::from_str(r#"{"image": "abc", "top_k": 10}"#).unwrap();
        assert_eq!(req.options.top_k, Some(10));
    }

    #[test]
    fn error_response_omits_data() {
        let resp = ApiResponse::<()>::error("DECODE_ERROR".to_string(), "bad".to_string());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["error"]["code"], "DECODE_ERROR");
    }
}
