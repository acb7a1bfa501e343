use crate::utils::error::ClassifyError;
use crate::utils::http::read_body_capped;
use crate::Result;
use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::OnceCell;

/// ONNX 模型的 protobuf 上限是 2GB
pub const MAX_MODEL_BYTES: usize = i32::MAX as usize;

/// 模型文件来源
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    Url(String),
    Path(PathBuf),
    /// 预先读入内存的模型（测试或嵌入式场景）
    Memory(Bytes),
}

impl ModelSource {
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            ModelSource::Url(source.to_string())
        } else {
            ModelSource::Path(PathBuf::from(source))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ModelSource::Url(url) => url.clone(),
            ModelSource::Path(path) => path.display().to_string(),
            ModelSource::Memory(bytes) => format!("<memory: {} bytes>", bytes.len()),
        }
    }
}

/// 模型字节缓存：首次访问时加载，之后一直复用
///
/// 并发的首次请求只会触发一次下载，其他请求等待同一个结果。
/// 加载失败不会写入缓存，下次调用会重新尝试。
pub struct ModelCache {
    source: ModelSource,
    client: reqwest::Client,
    fetch_timeout: Duration,
    bytes: OnceCell<Bytes>,
}

impl ModelCache {
    pub fn new(source: ModelSource, client: reqwest::Client, fetch_timeout: Duration) -> Self {
        Self {
            source,
            client,
            fetch_timeout,
            bytes: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.bytes.initialized()
    }

    /// 获取模型字节，未缓存时加载
    pub async fn get(&self) -> Result<Bytes> {
        let bytes = self
            .bytes
            .get_or_try_init(|| async {
                tracing::info!("Loading model from: {}", self.source.describe());
                let bytes = self.fetch().await?;
                if bytes.is_empty() {
                    return Err(ClassifyError::ModelFetch(format!(
                        "Model source {} is empty",
                        self.source.describe()
                    )));
                }
                tracing::info!("Model cached: {} bytes", bytes.len());
                Ok(bytes)
            })
            .await?;

        Ok(bytes.clone())
    }

    async fn fetch(&self) -> Result<Bytes> {
        match &self.source {
            ModelSource::Memory(bytes) => Ok(bytes.clone()),
            ModelSource::Path(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| {
                    ClassifyError::ModelFetch(format!("Failed to read {}: {}", path.display(), e))
                }),
            ModelSource::Url(url) => {
                let mut req = self.client.get(url);
                if self.fetch_timeout > Duration::ZERO {
                    req = req.timeout(self.fetch_timeout);
                }
                let resp = req
                    .send()
                    .await
                    .and_then(|resp| resp.error_for_status())
                    .map_err(|e| ClassifyError::ModelFetch(format!("Failed to fetch {}: {}", url, e)))?;
                read_body_capped(resp, MAX_MODEL_BYTES, |e| {
                    ClassifyError::ModelFetch(format!("Failed to read body of {}: {}", url, e))
                })
                .await
                .map_err(|e| match e {
                    ClassifyError::FileTooLarge(..) => {
                        ClassifyError::ModelFetch(format!("Model at {} is too large: {}", url, e))
                    }
                    other => other,
                })
            }
        }
    }
}
