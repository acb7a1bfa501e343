use crate::utils::error::ClassifyError;
use crate::Result;
use bytes::{Bytes, BytesMut};

/// 读取响应体，超过 `limit` 字节立即停止
///
/// 先检查 `Content-Length`，再按块读取，已读字节数一旦超限就返回
/// `FileTooLarge`，不会把整个响应缓存在内存里。
pub async fn read_body_capped(
    mut resp: reqwest::Response,
    limit: usize,
    read_err: impl Fn(reqwest::Error) -> ClassifyError,
) -> Result<Bytes> {
    if let Some(len) = resp.content_length() {
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        if len > limit {
            return Err(ClassifyError::FileTooLarge(len, limit));
        }
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = resp.chunk().await.map_err(&read_err)? {
        let total = body.len() + chunk.len();
        if total > limit {
            return Err(ClassifyError::FileTooLarge(total, limit));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tokio::net::TcpListener;

    async fn serve_bytes(len: usize) -> String {
        let app = Router::new().route("/blob", get(move || async move { vec![7u8; len] }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/blob", addr)
    }

    fn read_err(e: reqwest::Error) -> ClassifyError {
        ClassifyError::InvalidInput(e.to_string())
    }

    #[tokio::test]
    async fn body_within_limit_is_returned() {
        let url = serve_bytes(1000).await;
        let resp = reqwest::get(&url).await.unwrap();
        let body = read_body_capped(resp, 1000, read_err).await.unwrap();
        assert_eq!(body.len(), 1000);
        assert!(body.iter().all(|&b| b == 7));
    }

    #[tokio::test]
    async fn body_over_limit_is_rejected() {
        let url = serve_bytes(1000).await;
        let resp = reqwest::get(&url).await.unwrap();
        let err = read_body_capped(resp, 999, read_err).await.unwrap_err();
        assert!(matches!(err, ClassifyError::FileTooLarge(1000, 999)));
    }
}
