use crate::{
    classify::{ClassifyStats, DetectionResult},
    config::Config,
    image::{ImageLoader, ImagePreprocessor, ImageSource, ResultFormatter},
    models::{InferenceInvoker, LabelVocabulary, ModelCache},
    utils::error::ClassifyError,
    Result,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 分类流水线：加载 → 预处理 → 推理 → 后处理
pub struct ClassifyPipeline {
    loader: ImageLoader,
    preprocessor: ImagePreprocessor,
    invoker: InferenceInvoker,
    vocabulary: LabelVocabulary,
    default_top_k: usize,
}

impl ClassifyPipeline {
    pub fn new(
        config: &Config,
        cache: Arc<ModelCache>,
        vocabulary: LabelVocabulary,
        client: reqwest::Client,
    ) -> Self {
        let loader = ImageLoader::new(
            client,
            Duration::from_secs(config.server_config.fetch_timeout),
        );
        let invoker = InferenceInvoker::new(
            cache,
            config.onnx_config.clone(),
            config.input_name.clone(),
            config.output_name.clone(),
        );

        Self {
            loader,
            preprocessor: ImagePreprocessor::new(config.preprocess_config.filter),
            invoker,
            vocabulary,
            default_top_k: config.default_top_k,
        }
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    pub fn invoker(&self) -> &InferenceInvoker {
        &self.invoker
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// 使用内置词表分类
    pub async fn classify(&self, source: ImageSource, top_k: Option<usize>) -> Result<DetectionResult> {
        let k = top_k.unwrap_or(self.default_top_k);
        self.classify_with_vocabulary(source, &self.vocabulary, k).await
    }

    /// 使用指定词表分类，任一阶段失败都不会返回部分结果
    pub async fn classify_with_vocabulary(
        &self,
        source: ImageSource,
        vocabulary: &LabelVocabulary,
        k: usize,
    ) -> Result<DetectionResult> {
        if k == 0 {
            return Err(ClassifyError::InvalidInput("top_k must be at least 1".to_string()));
        }

        let start_time = Instant::now();
        let source_kind = source.kind();
        let mut stats = ClassifyStats::default();

        // 读取图像
        let bytes = self.loader.read(source).await?;
        stats.load_time_ms = elapsed_ms(start_time);

        // 解码 + 预处理
        let preprocess_start = Instant::now();
        let preprocessor = self.preprocessor;
        let tensor = tokio::task::spawn_blocking(move || preprocessor.preprocess(&bytes))
            .await
            .map_err(|e| ClassifyError::Internal(format!("Preprocess task failed: {}", e)))??;
        stats.preprocess_time_ms = elapsed_ms(preprocess_start);

        // 推理
        let output = self.invoker.invoke(tensor).await?;
        stats.inference_time_ms = output.execution_time_ms;

        // 后处理
        let postprocess_start = Instant::now();
        let predictions = ResultFormatter::postprocess(&output.scores, vocabulary, k)?;
        stats.postprocess_time_ms = elapsed_ms(postprocess_start);

        stats.total_time_ms = elapsed_ms(start_time);
        tracing::debug!(
            "Stage timings: load={:.2}ms preprocess={:.2}ms inference={:.2}ms postprocess={:.2}ms",
            stats.load_time_ms,
            stats.preprocess_time_ms,
            stats.inference_time_ms,
            stats.postprocess_time_ms
        );
        tracing::info!(
            "Classification completed: source={}, top={:?}, total_time={:.2}ms",
            source_kind,
            predictions.first().map(|p| p.label.as_str()),
            stats.total_time_ms
        );

        Ok(DetectionResult {
            predictions,
            execution_time_ms: stats.total_time_ms,
        })
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
