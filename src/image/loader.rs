use crate::utils::error::ClassifyError;
use crate::utils::http::read_body_capped;
use crate::Result;
use base64::Engine;
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::PathBuf;
use std::time::Duration;

/// 单张图片的最大字节数
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// 图像输入来源
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// http(s) 地址
    Url(String),
    /// 本地文件路径
    Path(PathBuf),
    /// 已经在内存中的原始字节
    Bytes(Bytes),
    /// `data:<mime>;base64,<payload>` 形式的字符串
    DataUri(String),
}

impl ImageSource {
    /// 解析命令行传入的字符串：URL、data URI，其余视为文件路径
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with("data:") {
            ImageSource::DataUri(trimmed.to_string())
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ImageSource::Url(trimmed.to_string())
        } else {
            ImageSource::Path(PathBuf::from(trimmed))
        }
    }

    /// 解析 HTTP 请求中的图像字段：URL、data URI 或裸 base64，不允许本地路径
    pub fn from_request_field(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ClassifyError::InvalidInput("Empty image data".to_string()));
        }

        match Self::parse(trimmed) {
            ImageSource::Path(_) => {
                let bytes = base64::engine::general_purpose::STANDARD.decode(trimmed)?;
                Ok(ImageSource::Bytes(Bytes::from(bytes)))
            }
            other => Ok(other),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImageSource::Url(_) => "url",
            ImageSource::Path(_) => "path",
            ImageSource::Bytes(_) => "bytes",
            ImageSource::DataUri(_) => "data_uri",
        }
    }
}

/// 负责把各类来源统一读成字节，再解码成图像
#[derive(Clone)]
pub struct ImageLoader {
    client: reqwest::Client,
    fetch_timeout: Duration,
}

impl ImageLoader {
    pub fn new(client: reqwest::Client, fetch_timeout: Duration) -> Self {
        Self {
            client,
            fetch_timeout,
        }
    }

    /// 读取图像来源的原始字节
    pub async fn read(&self, source: ImageSource) -> Result<Bytes> {
        let bytes = match source {
            ImageSource::Url(url) => self.fetch_url(&url).await?,
            ImageSource::Path(path) => Bytes::from(tokio::fs::read(&path).await.map_err(|e| {
                ClassifyError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
            })?),
            ImageSource::Bytes(bytes) => bytes,
            ImageSource::DataUri(uri) => Self::decode_data_uri(&uri)?,
        };

        Self::check_size(bytes.len())?;
        Ok(bytes)
    }

    async fn fetch_url(&self, url: &str) -> Result<Bytes> {
        let mut req = self.client.get(url);
        if self.fetch_timeout > Duration::ZERO {
            req = req.timeout(self.fetch_timeout);
        }

        let resp = req
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| ClassifyError::InvalidInput(format!("Failed to fetch {}: {}", url, e)))?;

        read_body_capped(resp, MAX_IMAGE_BYTES, |e| {
            ClassifyError::InvalidInput(format!("Failed to read body of {}: {}", url, e))
        })
        .await
    }

    /// 解码 data URI（仅支持 base64 编码）
    pub fn decode_data_uri(uri: &str) -> Result<Bytes> {
        let (metadata, data) = uri
            .split_once(',')
            .ok_or_else(|| ClassifyError::Decode("missing comma in data URI".to_string()))?;

        if !metadata.ends_with(";base64") {
            return Err(ClassifyError::UnsupportedFormat(
                "only base64 encoded data URIs are supported".to_string(),
            ));
        }

        let decoded = base64::engine::general_purpose::STANDARD.decode(data.trim())?;
        Ok(Bytes::from(decoded))
    }

    fn check_size(len: usize) -> Result<()> {
        if len > MAX_IMAGE_BYTES {
            return Err(ClassifyError::FileTooLarge(len, MAX_IMAGE_BYTES));
        }
        Ok(())
    }

    /// 把字节解码为图像
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(ClassifyError::Decode("empty image buffer".to_string()));
        }
        Self::check_size(bytes.len())?;

        let format = Self::detect_format(bytes)
            .ok_or_else(|| ClassifyError::Decode("unrecognized image data".to_string()))?;
        if !Self::is_supported_format(format) {
            return Err(ClassifyError::UnsupportedFormat(format!("{:?}", format)));
        }

        let image = image::load_from_memory_with_format(bytes, format)?;
        Self::validate_dimensions(&image)?;

        Ok(image)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp | ImageFormat::Tiff | ImageFormat::WebP
        )
    }

    /// 验证图像尺寸
    pub fn validate_dimensions(image: &DynamicImage) -> Result<()> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ClassifyError::UnsupportedFormat(format!(
                "Decoded image has zero dimension: {}x{}",
                width, height
            )));
        }
        Ok(())
    }
}
