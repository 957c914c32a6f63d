//! Seeded train/test partitions

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Row indices of each partition, ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    fn from_test_mask(test_mask: &[bool]) -> Self {
        let (test, train): (Vec<usize>, Vec<usize>) =
            (0..test_mask.len()).partition(|&i| test_mask[i]);
        Self { train, test }
    }
}

/// Shuffle `0..n` and hold out `ceil(n * test_fraction)` rows
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);

    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let mut test_mask = vec![false; n];
    for &i in indices.iter().take(n_test.min(n)) {
        test_mask[i] = true;
    }
    Split::from_test_mask(&test_mask)
}

/// Hold out `round(count * test_fraction)` rows of every class
///
/// Classes are visited in sorted order and shuffled with one shared RNG, so
/// the result depends only on the labels and the seed.
pub fn stratified_split<L: Ord>(labels: &[L], test_fraction: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut by_class: BTreeMap<&L, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut test_mask = vec![false; labels.len()];
    for members in by_class.values_mut() {
        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64) * test_fraction).round() as usize;
        for &i in members.iter().take(n_test) {
            test_mask[i] = true;
        }
    }
    Split::from_test_mask(&test_mask)
}
