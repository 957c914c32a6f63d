//! One-hot encoding of categorical columns

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Position of a value inside a fitted vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryCode {
    Known(usize),
    /// Not seen at fit time; encoded as all zeros
    Unknown,
}

/// Sorted set of values observed for one column at fit time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    values: Vec<String>,
}

impl Vocabulary {
    pub fn from_observed(observed: BTreeSet<String>) -> Self {
        Self {
            values: observed.into_iter().collect(),
        }
    }

    pub fn encode(&self, value: &str) -> CategoryCode {
        match self.values.binary_search_by(|v| v.as_str().cmp(value)) {
            Ok(index) => CategoryCode::Known(index),
            Err(_) => CategoryCode::Unknown,
        }
    }

    /// Write the one-hot block for `value` into `out`, which must be
    /// exactly `len()` wide and zeroed
    pub fn one_hot_into(&self, value: &str, out: &mut [f64]) {
        if let CategoryCode::Known(index) = self.encode(value) {
            out[index] = 1.0;
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(values: &[&str]) -> Vocabulary {
        Vocabulary::from_observed(values.iter().map(|v| v.to_string()).collect())
    }

    #[test]
    fn test_vocabulary_is_sorted_regardless_of_input_order() {
        let a = vocab(&["Summer", "Winter", "Monsoon"]);
        let b = vocab(&["Monsoon", "Summer", "Winter", "Summer"]);
        assert_eq!(a, b);
        assert_eq!(a.values(), &["Monsoon", "Summer", "Winter"]);
    }

    #[test]
    fn test_encode_known_and_unknown() {
        let v = vocab(&["Gir", "Holstein", "Jersey"]);
        assert_eq!(v.encode("Holstein"), CategoryCode::Known(1));
        assert_eq!(v.encode("Brown Swiss"), CategoryCode::Unknown);
    }

    #[test]
    fn test_one_hot_unknown_is_all_zero() {
        let v = vocab(&["Average", "Poor", "Well Ventilated"]);
        let mut out = vec![0.0; v.len()];
        v.one_hot_into("Poor", &mut out);
        assert_eq!(out, vec![0.0, 1.0, 0.0]);

        let mut out = vec![0.0; v.len()];
        v.one_hot_into("Collapsed", &mut out);
        assert_eq!(out, vec![0.0, 0.0, 0.0]);
    }
}
