use crate::web::handlers::ApiResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Inference engine initialization failed: {0}")]
    EngineInit(String),

    #[error("Unexpected model output: {0}")]
    OutputShape(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Dimension mismatch: {scores} scores vs {labels} labels")]
    DimensionMismatch { scores: usize, labels: usize },

    #[error("Model fetch failed: {0}")]
    ModelFetch(String),

    #[error("Label vocabulary load failed: {0}")]
    LabelLoad(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<base64::DecodeError> for ClassifyError {
    fn from(e: base64::DecodeError) -> Self {
        ClassifyError::Decode(format!("invalid base64 payload: {}", e))
    }
}

impl From<image::ImageError> for ClassifyError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Unsupported(inner) => {
                ClassifyError::UnsupportedFormat(inner.to_string())
            }
            other => ClassifyError::Decode(other.to_string()),
        }
    }
}

impl ClassifyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ClassifyError::Decode(_) => StatusCode::BAD_REQUEST,
            ClassifyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ClassifyError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            ClassifyError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ClassifyError::ModelFetch(_) => StatusCode::BAD_GATEWAY,
            ClassifyError::EngineInit(_) => StatusCode::SERVICE_UNAVAILABLE,
            ClassifyError::LabelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ClassifyError::Decode(_) => "DECODE_ERROR",
            ClassifyError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ClassifyError::EngineInit(_) => "ENGINE_INIT_ERROR",
            ClassifyError::OutputShape(_) => "OUTPUT_SHAPE_ERROR",
            ClassifyError::Inference(_) => "INFERENCE_ERROR",
            ClassifyError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            ClassifyError::ModelFetch(_) => "MODEL_FETCH_ERROR",
            ClassifyError::LabelLoad(_) => "LABEL_LOAD_ERROR",
            ClassifyError::InvalidInput(_) => "INVALID_INPUT",
            ClassifyError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            ClassifyError::Config(_) => "CONFIG_ERROR",
            ClassifyError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ClassifyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiResponse::<()>::error(self.error_code().to_string(), self.to_string());

        tracing::error!(
            "Request failed: request_id={}, {} ({})",
            body.request_id,
            self,
            status
        );

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_errors_split_into_decode_and_unsupported() {
        let err: ClassifyError = image::load_from_memory(b"not an image").unwrap_err().into();
        assert!(matches!(
            err,
            ClassifyError::Decode(_) | ClassifyError::UnsupportedFormat(_)
        ));
    }

    #[test]
    fn dimension_mismatch_maps_to_internal_error() {
        let err = ClassifyError::DimensionMismatch { scores: 3, labels: 2 };
        assert_eq!(err.error_code(), "DIMENSION_MISMATCH");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Dimension mismatch: 3 scores vs 2 labels");
    }

    #[tokio::test]
    async fn error_response_uses_api_envelope() {
        let resp = ClassifyError::Decode("truncated".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert!(body.get("data").is_none());
        assert_eq!(body["error"]["code"], "DECODE_ERROR");
        assert_eq!(body["error"]["message"], "Image decode failed: truncated");
        assert!(!body["request_id"].as_str().unwrap().is_empty());
        assert!(body["timestamp"].is_string());
    }

    #[test]
    fn client_errors_are_bad_request() {
        assert_eq!(
            ClassifyError::Decode("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ClassifyError::UnsupportedFormat("x".into()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }
}
