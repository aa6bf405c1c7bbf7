//! Classification metrics over encoded 0/1 labels

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fraction of matching predictions (0.0 for empty input)
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Precision/recall/F1 for one class (or an average)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class report keyed by class label, plus overall accuracy and averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    #[serde(flatten)]
    pub classes: BTreeMap<String, ClassMetrics>,
    pub accuracy: f64,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassMetrics,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Build from encoded labels; `class_names[i]` names encoded class `i`
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, class_names: &[String]) -> Self {
        let cm = ConfusionMatrix::compute(y_true, y_pred, class_names);
        let mut classes = BTreeMap::new();
        let mut per_class = Vec::with_capacity(2);

        for k in 0..2 {
            let tp = cm.counts[k][k] as f64;
            let predicted = (cm.counts[0][k] + cm.counts[1][k]) as f64;
            let support = cm.counts[k][0] + cm.counts[k][1];

            let precision = safe_div(tp, predicted);
            let recall = safe_div(tp, support as f64);
            let f1_score = safe_div(2.0 * precision * recall, precision + recall);
            let metrics = ClassMetrics {
                precision,
                recall,
                f1_score,
                support,
            };
            classes.insert(cm.labels[k].clone(), metrics);
            per_class.push(metrics);
        }

        let total: usize = per_class.iter().map(|m| m.support).sum();
        let average = |weights: [f64; 2]| {
            let w_sum: f64 = weights.iter().sum();
            let avg = |f: fn(&ClassMetrics) -> f64| {
                safe_div(per_class.iter().zip(weights.iter()).map(|(m, w)| f(m) * w).sum(), w_sum)
            };
            ClassMetrics {
                precision: avg(|m| m.precision),
                recall: avg(|m| m.recall),
                f1_score: avg(|m| m.f1_score),
                support: total,
            }
        };

        let macro_avg = average([1.0, 1.0]);
        let weighted_avg = average([per_class[0].support as f64, per_class[1].support as f64]);

        Self {
            classes,
            accuracy: accuracy(y_true, y_pred),
            macro_avg,
            weighted_avg,
        }
    }
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// 2x2 confusion matrix; `counts[true][predicted]` in `labels` order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, labels: &[String]) -> Self {
        let mut counts = [[0usize; 2]; 2];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            counts[usize::from(t > 0.5)][usize::from(p > 0.5)] += 1;
        }
        Self {
            labels: labels.to_vec(),
            counts,
        }
    }

    /// Reorder so the rows/columns follow `order` (labels not in the matrix are ignored)
    pub fn reordered(&self, order: &[&str]) -> Self {
        if order.len() != 2 || !order.iter().all(|o| self.labels.iter().any(|l| l == o)) {
            return self.clone();
        }
        if self.labels[0] == order[0] {
            return self.clone();
        }
        let c = &self.counts;
        Self {
            labels: vec![self.labels[1].clone(), self.labels[0].clone()],
            counts: [[c[1][1], c[1][0]], [c[0][1], c[0][0]]],
        }
    }
}

/// Receiver operating characteristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
    pub auc: f64,
    pub positive_label: String,
}

/// ROC curve of `scores` against binary truth `is_positive`.
///
/// Collinear intermediate points are dropped. The first point is `(0, 0)` at
/// threshold `max(score) + 1`. Returns `None` unless both classes are present.
pub fn roc_curve(is_positive: &[bool], scores: &Array1<f64>, positive_label: &str) -> Option<RocCurve> {
    let n_pos = is_positive.iter().filter(|&&p| p).count();
    let n_neg = is_positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || scores.len() != is_positive.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    // Cumulative counts at each distinct threshold
    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let mut thresholds = Vec::new();
    let (mut tp, mut fp) = (0usize, 0usize);
    for (pos, &i) in order.iter().enumerate() {
        if is_positive[i] {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_value = pos + 1 == order.len() || scores[order[pos + 1]] != scores[i];
        if last_of_value {
            tps.push(tp as f64);
            fps.push(fp as f64);
            thresholds.push(scores[i]);
        }
    }

    // Keep the endpoints and every point where the slope changes
    let keep: Vec<usize> = (0..tps.len())
        .filter(|&k| {
            if k == 0 || k + 1 == tps.len() {
                return true;
            }
            let d_fp = fps[k + 1] - 2.0 * fps[k] + fps[k - 1];
            let d_tp = tps[k + 1] - 2.0 * tps[k] + tps[k - 1];
            d_fp != 0.0 || d_tp != 0.0
        })
        .collect();

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut kept_thresholds = vec![thresholds[0] + 1.0];
    for k in keep {
        fpr.push(fps[k] / n_neg as f64);
        tpr.push(tps[k] / n_pos as f64);
        kept_thresholds.push(thresholds[k]);
    }

    let auc = auc(&fpr, &tpr);
    Some(RocCurve {
        fpr,
        tpr,
        thresholds: kept_thresholds,
        auc,
        positive_label: positive_label.to_string(),
    })
}

/// Trapezoidal area under a monotone curve
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// One entry of a feature-importance ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Top `top_k` features by importance, descending; ties keep feature order
pub fn rank_importances(names: &[String], importances: &Array1<f64>, top_k: usize) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(importances.iter())
        .map(|(name, &importance)| FeatureImportance {
            feature: name.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels() -> Vec<String> {
        vec!["Not Overloaded".to_string(), "Overloaded".to_string()]
    }

    #[test]
    fn test_accuracy() {
        let y_true = array![1.0, 0.0, 1.0, 1.0];
        let y_pred = array![1.0, 0.0, 0.0, 1.0];
        assert!((accuracy(&y_true, &y_pred) - 0.75).abs() < 1e-12);
        assert_eq!(accuracy(&Array1::zeros(0), &Array1::zeros(0)), 0.0);
    }

    #[test]
    fn test_classification_report() {
        let y_true = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let y_pred = array![0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0];
        let report = ClassificationReport::compute(&y_true, &y_pred, &labels());

        let over = report.classes["Overloaded"];
        assert!((over.precision - 0.8).abs() < 1e-12);
        assert!((over.recall - 0.8).abs() < 1e-12);
        assert_eq!(over.support, 5);

        let not_over = report.classes["Not Overloaded"];
        assert!((not_over.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(not_over.support, 3);

        assert!((report.accuracy - 0.75).abs() < 1e-12);
        assert_eq!(report.macro_avg.support, 8);
        let expected_weighted = (3.0 * not_over.f1_score + 5.0 * over.f1_score) / 8.0;
        assert!((report.weighted_avg.f1_score - expected_weighted).abs() < 1e-12);

        let yaml = serde_yaml::to_string(&report).unwrap();
        assert!(yaml.contains("macro avg"));
        assert!(yaml.contains("f1-score"));
        let restored: ClassificationReport = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(restored.classes.len(), 2);
    }

    #[test]
    fn test_report_zero_division() {
        let y_true = array![0.0, 1.0];
        let y_pred = array![0.0, 0.0];
        let report = ClassificationReport::compute(&y_true, &y_pred, &labels());
        assert_eq!(report.classes["Overloaded"].precision, 0.0);
        assert_eq!(report.classes["Overloaded"].f1_score, 0.0);
    }

    #[test]
    fn test_confusion_matrix_and_reorder() {
        let y_true = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let y_pred = array![0.0, 1.0, 1.0, 1.0, 0.0];
        let cm = ConfusionMatrix::compute(&y_true, &y_pred, &labels());
        assert_eq!(cm.counts, [[1, 1], [1, 2]]);

        let flipped = cm.reordered(&["Overloaded", "Not Overloaded"]);
        assert_eq!(flipped.labels[0], "Overloaded");
        assert_eq!(flipped.counts, [[2, 1], [1, 1]]);
        assert_eq!(cm.reordered(&["Not Overloaded", "Overloaded"]), cm);
    }

    #[test]
    fn test_roc_curve_perfect_and_random() {
        let truth = [false, false, true, true];
        let perfect = roc_curve(&truth, &array![0.1, 0.2, 0.8, 0.9], "Overloaded").unwrap();
        assert!((perfect.auc - 1.0).abs() < 1e-12);
        assert_eq!(perfect.fpr[0], 0.0);
        assert_eq!(*perfect.fpr.last().unwrap(), 1.0);
        assert!((perfect.thresholds[0] - 1.9).abs() < 1e-12);

        let tied = roc_curve(&truth, &array![0.5, 0.5, 0.5, 0.5], "Overloaded").unwrap();
        assert!((tied.auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_roc_curve_known_auc() {
        let truth = [false, false, true, true];
        let roc = roc_curve(&truth, &array![0.1, 0.4, 0.35, 0.8], "Overloaded").unwrap();
        assert!((roc.auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_requires_both_classes() {
        assert!(roc_curve(&[true, true], &array![0.2, 0.9], "Overloaded").is_none());
    }

    #[test]
    fn test_rank_importances() {
        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let ranked = rank_importances(&names, &array![0.2, 0.5, 0.3], 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].feature, "b");
        assert_eq!(ranked[1].feature, "c");
    }
}
