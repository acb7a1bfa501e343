use serde::{Deserialize, Serialize};

pub use crate::image::postprocessing::Prediction;

/// 一次分类请求的完整结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// 按概率降序排列的预测
    pub predictions: Vec<Prediction>,
    /// 整个流水线的耗时（毫秒）
    pub execution_time_ms: f64,
}

/// 分类处理选项
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifyOptions {
    /// 返回的类别数量，缺省时使用服务配置
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// 各阶段耗时（毫秒）
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassifyStats {
    pub load_time_ms: f64,
    pub preprocess_time_ms: f64,
    pub inference_time_ms: f64,
    pub postprocess_time_ms: f64,
    pub total_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_result_serializes_camel_case() {
        let result = DetectionResult {
            predictions: vec![Prediction {
                label: "tabby".to_string(),
                score: 0.5,
                index: 281,
            }],
            execution_time_ms: 12.5,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["executionTimeMs"], 12.5);
        assert_eq!(json["predictions"][0]["label"], "tabby");
        assert_eq!(json["predictions"][0]["index"], 281);
    }

    #[test]
    fn options_default_to_service_top_k() {
        let options: ClassifyOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.top_k, None);
    }
}
