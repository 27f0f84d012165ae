use std::fmt;

use tastebud_domain::{Result, TasteError};

/// 2x2 confusion matrix indexed `[actual][predicted]`.
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize]) -> [[usize; 2]; 2] {
    let mut matrix = [[0usize; 2]; 2];
    for (&actual, &predicted) in y_true.iter().zip(y_pred.iter()) {
        matrix[actual.min(1)][predicted.min(1)] += 1;
    }
    matrix
}

/// F1 of the positive class (label 1).
pub fn f1_score(y_true: &[usize], y_pred: &[usize]) -> f64 {
    let matrix = confusion_matrix(y_true, y_pred);
    let true_positive = matrix[1][1] as f64;
    let false_positive = matrix[0][1] as f64;
    let false_negative = matrix[1][0] as f64;
    let denominator = 2.0 * true_positive + false_positive + false_negative;
    if denominator == 0.0 {
        0.0
    } else {
        2.0 * true_positive / denominator
    }
}

/// Area under the ROC curve via the rank statistic, with average ranks
/// for tied scores. Requires both classes to be present.
pub fn roc_auc(y_true: &[usize], scores: &[f64]) -> Result<f64> {
    let positives = y_true.iter().filter(|&&y| y == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(TasteError::schema(
            "ROC AUC needs both classes in the evaluation set",
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(std::cmp::Ordering::Equal));

    // Average rank over tied score runs.
    let mut ranks = vec![0.0f64; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &index in &order[start..=end] {
            ranks[index] = rank;
        }
        start = end + 1;
    }

    let positive_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(&y, _)| y == 1)
        .map(|(_, &rank)| rank)
        .sum();
    let positives = positives as f64;
    let negatives = negatives as f64;
    Ok((positive_rank_sum - positives * (positives + 1.0) / 2.0) / (positives * negatives))
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 plus overall accuracy, printable in the
/// familiar tabular form.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<(String, ClassMetrics)>,
    pub accuracy: f64,
}

pub fn classification_report(
    y_true: &[usize],
    y_pred: &[usize],
    class_names: &[String],
) -> ClassificationReport {
    let matrix = confusion_matrix(y_true, y_pred);
    let total = y_true.len().max(1);
    let mut classes = Vec::with_capacity(class_names.len());
    for (index, name) in class_names.iter().enumerate().take(2) {
        let true_positive = matrix[index][index] as f64;
        let predicted: f64 = (matrix[0][index] + matrix[1][index]) as f64;
        let support = matrix[index][0] + matrix[index][1];
        let precision = if predicted == 0.0 {
            0.0
        } else {
            true_positive / predicted
        };
        let recall = if support == 0 {
            0.0
        } else {
            true_positive / support as f64
        };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        classes.push((
            name.clone(),
            ClassMetrics {
                precision,
                recall,
                f1,
                support,
            },
        ));
    }
    let correct = matrix[0][0] + matrix[1][1];
    ClassificationReport {
        classes,
        accuracy: correct as f64 / total as f64,
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (name, metrics) in &self.classes {
            writeln!(
                f,
                "{:>12} {:>10.3} {:>10.3} {:>10.3} {:>10}",
                name, metrics.precision, metrics.recall, metrics.f1, metrics.support
            )?;
        }
        let support: usize = self.classes.iter().map(|(_, m)| m.support).sum();
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10.3} {:>10}",
            "accuracy", "", "", self.accuracy, support
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn confusion_matrix_counts() {
        let y_true = vec![0, 0, 1, 1, 1];
        let y_pred = vec![0, 1, 1, 1, 0];
        let matrix = confusion_matrix(&y_true, &y_pred);
        assert_eq!(matrix, [[1, 1], [1, 2]]);
    }

    #[test]
    fn f1_matches_hand_computation() {
        let y_true = vec![0, 0, 1, 1, 1];
        let y_pred = vec![0, 1, 1, 1, 0];
        // precision 2/3, recall 2/3 -> f1 = 2/3
        assert_abs_diff_eq!(f1_score(&y_true, &y_pred), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn auc_is_one_for_perfect_separation() {
        let y_true = vec![0, 0, 1, 1];
        let scores = vec![0.1, 0.2, 0.8, 0.9];
        assert_abs_diff_eq!(roc_auc(&y_true, &scores).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn auc_is_half_for_constant_scores() {
        let y_true = vec![0, 1, 0, 1];
        let scores = vec![0.5, 0.5, 0.5, 0.5];
        assert_abs_diff_eq!(roc_auc(&y_true, &scores).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn auc_requires_both_classes() {
        assert!(roc_auc(&[1, 1], &[0.4, 0.6]).is_err());
    }

    #[test]
    fn report_accuracy_and_supports() {
        let y_true = vec![0, 0, 1, 1, 1];
        let y_pred = vec![0, 1, 1, 1, 0];
        let names = vec!["alice".to_string(), "bob".to_string()];
        let report = classification_report(&y_true, &y_pred, &names);
        assert_abs_diff_eq!(report.accuracy, 0.6, epsilon = 1e-12);
        assert_eq!(report.classes[0].1.support, 2);
        assert_eq!(report.classes[1].1.support, 3);
        let rendered = report.to_string();
        assert!(rendered.contains("alice"));
        assert!(rendered.contains("precision"));
    }
}
