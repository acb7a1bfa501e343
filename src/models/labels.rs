use crate::utils::error::ClassifyError;
use crate::Result;
use std::ops::Index;
use std::path::Path;
use std::sync::Arc;

/// 有序类别名称表，下标与模型输出对齐
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVocabulary {
    labels: Arc<[String]>,
}

impl LabelVocabulary {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            labels: labels.into(),
        }
    }

    /// 从文件加载：`.json` 按字符串数组解析，其他扩展名按每行一个标签解析
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifyError::LabelLoad(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let vocabulary = if is_json {
            Self::parse_json(&content)?
        } else {
            Self::parse_lines(&content)?
        };

        tracing::info!(
            "Loaded {} labels from {}",
            vocabulary.len(),
            path.display()
        );
        Ok(vocabulary)
    }

    pub fn parse_json(content: &str) -> Result<Self> {
        let labels: Vec<String> = serde_json::from_str(content)
            .map_err(|e| ClassifyError::LabelLoad(format!("Invalid JSON label list: {}", e)))?;
        Self::non_empty(labels)
    }

    pub fn parse_lines(content: &str) -> Result<Self> {
        let mut labels: Vec<String> = content
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();
        // 去掉末尾空行
        while labels.last().is_some_and(|l| l.trim().is_empty()) {
            labels.pop();
        }
        Self::non_empty(labels)
    }

    fn non_empty(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(ClassifyError::LabelLoad("Label vocabulary is empty".to_string()));
        }
        Ok(Self::new(labels))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Index<usize> for LabelVocabulary {
    type Output = String;

    fn index(&self, index: usize) -> &Self::Output {
        &self.labels[index]
    }
}
