use crate::utils::error::ClassifyError;
use crate::Result;
use clap::ValueEnum;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 模型来源（文件路径或 http(s) URL）
    pub model_source: String,

    /// 标签词表文件
    pub labels_path: PathBuf,

    /// 模型输入张量名称
    pub input_name: String,

    /// 模型输出张量名称（按节点名查找，必须显式配置）
    pub output_name: String,

    /// 默认返回的 top-k 数量
    pub default_top_k: usize,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 预处理配置
    pub preprocess_config: PreprocessConfig,

    /// 服务器配置
    pub server_config: ServerConfig,
}

/// 执行后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Cpu,
    Cuda,
}

/// 图执行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

/// 每次推理新建会话，或复用同一个会话
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStrategy {
    Fresh,
    Reuse,
}

/// 缩放滤波器，会影响输出数值
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResizeFilter> for image::imageops::FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => image::imageops::FilterType::Nearest,
            ResizeFilter::Triangle => image::imageops::FilterType::Triangle,
            ResizeFilter::CatmullRom => image::imageops::FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// 执行后端
    pub backend: Backend,

    /// 优化级别 (0-3)
    pub optimization_level: u8,

    /// 执行模式
    pub execution_mode: ExecutionMode,

    /// 算子内线程数
    pub intra_threads: usize,

    /// 算子间线程数（仅并行模式生效）
    pub inter_threads: usize,

    /// CPU 内存池
    pub enable_memory_arena: bool,

    /// 内存复用模式
    pub enable_memory_pattern: bool,

    /// 会话策略
    pub session_strategy: SessionStrategy,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        let cpu_cores = num_cpus::get();
        Self {
            backend: Backend::Cpu,
            optimization_level: 3,
            execution_mode: ExecutionMode::Sequential,
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            inter_threads: 1,
            enable_memory_arena: true,
            enable_memory_pattern: true,
            session_strategy: SessionStrategy::Fresh,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub filter: ResizeFilter,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            filter: ResizeFilter::Triangle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,

    /// 远程资源（模型、图片）下载超时（秒）
    pub fetch_timeout: u64,
}

impl Config {
    pub fn new(
        bind_addr: String,
        model_source: String,
        labels_path: String,
        output_name: String,
        dev_mode: bool,
    ) -> Result<Self> {
        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 }, // 开发模式更长超时
            max_request_size: 20 * 1024 * 1024, // 20MB
            fetch_timeout: 30,
        };

        let config = Self {
            bind_addr,
            model_source,
            labels_path: PathBuf::from(labels_path),
            input_name: "data".to_string(),
            output_name,
            default_top_k: 3,
            dev_mode,
            onnx_config: OnnxConfig::default(),
            preprocess_config: PreprocessConfig::default(),
            server_config,
        };
        config.validate()?;

        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.model_source.trim().is_empty() {
            return Err(ClassifyError::Config("Model source must not be empty".to_string()));
        }
        if self.input_name.trim().is_empty() {
            return Err(ClassifyError::Config("Input name must not be empty".to_string()));
        }
        if self.output_name.trim().is_empty() {
            return Err(ClassifyError::Config("Output name must not be empty".to_string()));
        }
        if self.default_top_k == 0 {
            return Err(ClassifyError::Config("Default top-k must be at least 1".to_string()));
        }
        if self.onnx_config.optimization_level > 3 {
            return Err(ClassifyError::Config(format!(
                "Optimization level must be 0-3, got {}",
                self.onnx_config.optimization_level
            )));
        }
        if self.onnx_config.intra_threads == 0 || self.onnx_config.inter_threads == 0 {
            return Err(ClassifyError::Config("Thread counts must be at least 1".to_string()));
        }
        Ok(())
    }
}
