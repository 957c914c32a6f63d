//! Evaluation metrics for the held-out partition

use serde::Serialize;

/// Root mean squared error: sqrt(mean((pred - actual)²))
pub fn rmse(predictions: &[f64], actual: &[f64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let mse = predictions
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a) * (p - a))
        .sum::<f64>()
        / predictions.len() as f64;
    mse.sqrt()
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
}

/// Fraction of predictions equal to the actual label
pub fn accuracy<L: PartialEq>(predictions: &[L], actual: &[L]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let correct = predictions.iter().zip(actual).filter(|(p, a)| p == a).count();
    correct as f64 / predictions.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics<L> {
    pub label: L,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of held-out rows whose actual label is this class
    pub support: usize,
}

/// Per-class precision, recall and F1 plus overall accuracy
///
/// A ratio with a zero denominator is reported as 0.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport<L> {
    pub classes: Vec<ClassMetrics<L>>,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    pub support: usize,
}

impl<L: Ord + Clone> ClassificationReport<L> {
    /// Report over the union of `labels` and every label seen in the data
    pub fn compute(labels: &[L], predictions: &[L], actual: &[L]) -> Self {
        let mut all: Vec<L> = labels.to_vec();
        all.extend(actual.iter().cloned());
        all.extend(predictions.iter().cloned());
        all.sort();
        all.dedup();

        let classes: Vec<ClassMetrics<L>> = all
            .into_iter()
            .map(|label| {
                let mut tp = 0usize;
                let mut predicted = 0usize;
                let mut support = 0usize;
                for (p, a) in predictions.iter().zip(actual) {
                    let hit_p = *p == label;
                    let hit_a = *a == label;
                    predicted += usize::from(hit_p);
                    support += usize::from(hit_a);
                    tp += usize::from(hit_p && hit_a);
                }
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let total = actual.len();
        let macro_f1 = if classes.is_empty() {
            0.0
        } else {
            classes.iter().map(|c| c.f1).sum::<f64>() / classes.len() as f64
        };
        let weighted_f1 = if total == 0 {
            0.0
        } else {
            classes.iter().map(|c| c.f1 * c.support as f64).sum::<f64>() / total as f64
        };

        Self {
            classes,
            accuracy: accuracy(predictions, actual),
            macro_f1,
            weighted_f1,
            support: total,
        }
    }

    pub fn class(&self, label: &L) -> Option<&ClassMetrics<L>> {
        self.classes.iter().find(|c| &c.label == label)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
