use crate::utils::error::ClassifierError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单张图像的分类结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    /// 预测类别
    pub predicted_class: String,
    /// 置信度 (0.0 - 1.0)，即最大类别概率
    pub confidence: f32,
    /// 各类别概率
    pub probabilities: BTreeMap<String, f32>,
}

/// 模型信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    /// 模型尺寸预设
    pub variant: String,
    /// 类别列表（按输出索引排列）
    pub classes: Vec<String>,
    /// 计算设备
    pub device: String,
}

/// 结果格式化器
pub struct ResultFormatter;

impl ResultFormatter {
    /// 由 softmax 概率生成预测结果，取第一个最大值为预测类别
    pub fn format_prediction(probabilities: &[f32], class_names: &[String]) -> Result<Prediction> {
        if probabilities.len() != class_names.len() {
            return Err(ClassifierError::Inference(format!(
                "Model produced {} scores for {} classes",
                probabilities.len(),
                class_names.len()
            )));
        }

        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(ClassifierError::Inference(
                "Model produced non-finite probabilities".to_string(),
            ));
        }

        let (best_idx, best_prob) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
            .ok_or_else(|| ClassifierError::Inference("Model produced no scores".to_string()))?;

        let probabilities = class_names
            .iter()
            .cloned()
            .zip(probabilities.iter().copied())
            .collect();

        Ok(Prediction {
            predicted_class: class_names[best_idx].clone(),
            confidence: best_prob,
            probabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        ["black", "grey", "red", "white"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn picks_argmax() {
        let prediction =
            ResultFormatter::format_prediction(&[0.1, 0.2, 0.6, 0.1], &labels()).unwrap();

        assert_eq!(prediction.predicted_class, "red");
        assert_eq!(prediction.confidence, 0.6);
        assert_eq!(prediction.probabilities.len(), 4);
        assert_eq!(prediction.probabilities["grey"], 0.2);
    }

    #[test]
    fn ties_resolve_to_first_index() {
        let prediction =
            ResultFormatter::format_prediction(&[0.4, 0.4, 0.1, 0.1], &labels()).unwrap();
        assert_eq!(prediction.predicted_class, "black");
    }

    #[test]
    fn length_mismatch_is_inference_error() {
        let err = ResultFormatter::format_prediction(&[0.5, 0.5], &labels()).unwrap_err();
        assert_eq!(err.error_code(), "INFERENCE_ERROR");
    }

    #[test]
    fn nan_is_rejected() {
        assert!(ResultFormatter::format_prediction(&[f32::NAN, 0.0, 0.0, 0.0], &labels()).is_err());
    }
}
