use crate::config::{Backend, ExecutionMode, OnnxConfig, SessionStrategy};
use crate::image::preprocessing::NormalizedTensor;
use crate::models::cache::ModelCache;
use crate::utils::error::ClassifyError;
use crate::Result;
use ort::{
    execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch},
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;

/// 一次前向推理的结果
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    /// 每个类别的 logit
    pub scores: Vec<f32>,
    /// 只包含 `run` 调用本身的耗时
    pub execution_time_ms: f64,
}

/// 分类模型前向推理
pub struct InferenceInvoker {
    cache: Arc<ModelCache>,
    onnx_config: OnnxConfig,
    input_name: String,
    output_name: String,
    session: OnceCell<Arc<Mutex<Session>>>, // 仅 Reuse 策略使用
}

impl InferenceInvoker {
    pub fn new(
        cache: Arc<ModelCache>,
        onnx_config: OnnxConfig,
        input_name: impl Into<String>,
        output_name: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            onnx_config,
            input_name: input_name.into(),
            output_name: output_name.into(),
            session: OnceCell::new(),
        }
    }

    pub fn onnx_config(&self) -> &OnnxConfig {
        &self.onnx_config
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn model_loaded(&self) -> bool {
        self.cache.is_loaded()
    }

    /// 执行一次前向推理
    pub async fn invoke(&self, tensor: NormalizedTensor) -> Result<InferenceOutput> {
        let model_bytes = self.cache.get().await?;
        let input_name = self.input_name.clone();
        let output_name = self.output_name.clone();

        match self.onnx_config.session_strategy {
            SessionStrategy::Fresh => {
                let config = self.onnx_config.clone();
                tokio::task::spawn_blocking(move || {
                    let mut session = build_session(&config, &model_bytes, &output_name)?;
                    run_session(&mut session, &input_name, &output_name, tensor)
                })
                .await
                .map_err(|e| ClassifyError::Internal(format!("Inference task failed: {}", e)))?
            }
            SessionStrategy::Reuse => {
                let session = self.shared_session(model_bytes).await?;
                tokio::task::spawn_blocking(move || {
                    let mut session = session.lock();
                    run_session(&mut session, &input_name, &output_name, tensor)
                })
                .await
                .map_err(|e| ClassifyError::Internal(format!("Inference task failed: {}", e)))?
            }
        }
    }

    async fn shared_session(&self, model_bytes: bytes::Bytes) -> Result<Arc<Mutex<Session>>> {
        let session = self
            .session
            .get_or_try_init(|| async {
                let config = self.onnx_config.clone();
                let output_name = self.output_name.clone();
                let session = tokio::task::spawn_blocking(move || {
                    build_session(&config, &model_bytes, &output_name)
                })
                .await
                .map_err(|e| ClassifyError::Internal(format!("Session build task failed: {}", e)))??;
                tracing::info!("Inference session cached for reuse");
                Ok::<_, ClassifyError>(Arc::new(Mutex::new(session)))
            })
            .await?;

        Ok(Arc::clone(session))
    }
}

fn optimization_level(level: u8) -> GraphOptimizationLevel {
    match level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

fn init_err(e: impl std::fmt::Display) -> ClassifyError {
    ClassifyError::EngineInit(e.to_string())
}

fn execution_providers(config: &OnnxConfig) -> Vec<ExecutionProviderDispatch> {
    let cpu = CPUExecutionProvider::default()
        .with_arena_allocator(config.enable_memory_arena)
        .build();
    match config.backend {
        Backend::Cpu => vec![cpu],
        // CUDA 不可用时回退到 CPU
        Backend::Cuda => vec![CUDAExecutionProvider::default().build(), cpu],
    }
}

/// 从模型字节构建推理会话，并确认输出张量存在
pub fn build_session(config: &OnnxConfig, model_bytes: &[u8], output_name: &str) -> Result<Session> {
    let mut builder = Session::builder()
        .map_err(init_err)?
        .with_execution_providers(execution_providers(config))
        .map_err(init_err)?
        .with_optimization_level(optimization_level(config.optimization_level))
        .map_err(init_err)?
        .with_intra_threads(config.intra_threads)
        .map_err(init_err)?
        .with_memory_pattern(config.enable_memory_pattern)
        .map_err(init_err)?;

    if config.execution_mode == ExecutionMode::Parallel {
        builder = builder
            .with_parallel_execution(true)
            .map_err(init_err)?
            .with_inter_threads(config.inter_threads)
            .map_err(init_err)?;
    }

    let session = builder.commit_from_memory(model_bytes).map_err(init_err)?;

    for (i, output) in session.outputs.iter().enumerate() {
        tracing::debug!("Model output[{}]: '{}'", i, output.name);
    }
    if !session.outputs.iter().any(|o| o.name == output_name) {
        let available: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        return Err(ClassifyError::OutputShape(format!(
            "Output '{}' not found. Available outputs: {:?}",
            output_name, available
        )));
    }

    Ok(session)
}

/// 在已有会话上执行推理，计时只包含 `run`
pub fn run_session(
    session: &mut Session,
    input_name: &str,
    output_name: &str,
    tensor: NormalizedTensor,
) -> Result<InferenceOutput> {
    let input = Tensor::from_array(tensor.into_batch()?)
        .map_err(|e| ClassifyError::Inference(format!("Failed to create input tensor: {}", e)))?;

    let start = Instant::now();
    let outputs = session
        .run(inputs![input_name => input])
        .map_err(|e| ClassifyError::Inference(e.to_string()))?;
    let execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    let output = match outputs.get(output_name) {
        Some(output) => output,
        None => {
            let available: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
            return Err(ClassifyError::OutputShape(format!(
                "Output '{}' not found. Available outputs: {:?}",
                output_name, available
            )));
        }
    };

    let array = output.try_extract_array::<f32>().map_err(|e| {
        ClassifyError::OutputShape(format!("Output '{}' is not a float32 tensor: {}", output_name, e))
    })?;

    let shape = array.shape();
    if shape.len() > 1 && shape[0] != 1 {
        return Err(ClassifyError::OutputShape(format!(
            "Expected batch size 1, got output shape {:?}",
            shape
        )));
    }
    let scores: Vec<f32> = array.iter().copied().collect();

    tracing::debug!(
        "Inference finished: {} scores in {:.2}ms",
        scores.len(),
        execution_time_ms
    );

    Ok(InferenceOutput {
        scores,
        execution_time_ms,
    })
}
