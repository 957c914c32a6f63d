//! Prediction response shapes and post-processing
//!
//! Raw model outputs stay untouched inside the ensembles. Clamping,
//! rounding and risk derivation happen here, at the serving boundary.

use crate::forest::ClassPrediction;
use crate::models::DiseaseLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STATUS_SUCCESS: &str = "success";

/// Round `value` to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldPrediction {
    pub predicted_milk_yield_liters: f64,
    pub status: String,
}

impl YieldPrediction {
    /// Clamp a raw regression output at zero and round to 2 decimals
    pub fn from_raw(raw: f64) -> Self {
        let liters = round_to(raw, 2);
        Self {
            predicted_milk_yield_liters: if liters > 0.0 { liters } else { 0.0 },
            status: STATUS_SUCCESS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Low,
}

impl RiskLevel {
    /// Anything other than a healthy prediction is high risk
    pub fn for_label(label: DiseaseLabel) -> Self {
        if label == DiseaseLabel::Healthy {
            RiskLevel::Low
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseasePrediction {
    pub predicted_condition: DiseaseLabel,
    pub risk_assessment: RiskLevel,
    /// Vote share per label, as a percentage rounded to 2 decimals
    pub confidence_scores: BTreeMap<String, f64>,
    pub status: String,
}

impl DiseasePrediction {
    pub fn from_raw(prediction: &ClassPrediction<DiseaseLabel>) -> Self {
        Self {
            predicted_condition: prediction.label,
            risk_assessment: RiskLevel::for_label(prediction.label),
            confidence_scores: confidence_percentages(prediction),
            status: STATUS_SUCCESS.to_string(),
        }
    }

    pub fn confidence_of(&self, label: DiseaseLabel) -> f64 {
        self.confidence_scores
            .get(label.as_str())
            .copied()
            .unwrap_or(0.0)
    }
}

pub fn confidence_percentages(prediction: &ClassPrediction<DiseaseLabel>) -> BTreeMap<String, f64> {
    prediction
        .confidences
        .iter()
        .map(|(label, share)| (label.as_str().to_string(), round_to(share * 100.0, 2)))
        .collect()
}
