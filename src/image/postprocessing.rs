use crate::models::LabelVocabulary;
use crate::utils::error::ClassifyError;
use crate::Result;
use serde::{Deserialize, Serialize};

/// 单个分类结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 类别名称
    pub label: String,
    /// 概率 (0.0 - 1.0)
    pub score: f32,
    /// 类别下标
    pub index: usize,
}

/// 结果后处理：softmax + top-k
pub struct ResultFormatter;

impl ResultFormatter {
    /// 把 logits 转为排序后的 top-k 预测
    pub fn postprocess(
        scores: &[f32],
        vocabulary: &LabelVocabulary,
        k: usize,
    ) -> Result<Vec<Prediction>> {
        if scores.len() != vocabulary.len() {
            return Err(ClassifyError::DimensionMismatch {
                scores: scores.len(),
                labels: vocabulary.len(),
            });
        }
        if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
            return Err(ClassifyError::Inference(format!(
                "Model produced a non-finite score at index {}: {}",
                index, scores[index]
            )));
        }

        let probabilities = Self::softmax(scores);
        let predictions = Self::rank(&probabilities)
            .into_iter()
            .take(k)
            .map(|index| Prediction {
                label: vocabulary[index].clone(),
                score: probabilities[index],
                index,
            })
            .collect();

        Ok(predictions)
    }

    /// 数值稳定的 softmax，先减去最大值再取指数
    pub fn softmax(scores: &[f32]) -> Vec<f32> {
        if scores.is_empty() {
            return Vec::new();
        }

        let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
        let sum: f32 = exps.iter().sum();

        exps.into_iter().map(|e| e / sum).collect()
    }

    /// 按概率降序返回下标，概率相同时下标小的在前
    pub fn rank(probabilities: &[f32]) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..probabilities.len()).collect();
        // sort_by 是稳定排序
        indices.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));
        indices
    }
}
