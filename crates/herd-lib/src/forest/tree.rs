//! CART decision tree shared by both ensembles

use super::{FeatureMatrix, ForestConfig};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Impurities below this are treated as a pure node
const PURITY_EPSILON: f64 = 1e-12;

/// Split criterion: accumulates target statistics for one side of a split
pub(crate) trait Criterion: Sync {
    type Target: Copy + Send + Sync;
    type Leaf: Copy + Send + Sync;
    type Stats: Clone;

    fn empty(&self) -> Self::Stats;
    fn push(&self, stats: &mut Self::Stats, target: Self::Target);
    fn pop(&self, stats: &mut Self::Stats, target: Self::Target);
    /// Node impurity multiplied by the node's sample count
    fn weighted_impurity(&self, stats: &Self::Stats) -> f64;
    fn leaf(&self, stats: &Self::Stats) -> Self::Leaf;
}

/// Squared-error criterion; leaves hold the mean target
pub(crate) struct Variance;

#[derive(Debug, Clone, Default)]
pub(crate) struct SumStats {
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl Criterion for Variance {
    type Target = f64;
    type Leaf = f64;
    type Stats = SumStats;

    fn empty(&self) -> SumStats {
        SumStats::default()
    }

    fn push(&self, stats: &mut SumStats, target: f64) {
        stats.count += 1;
        stats.sum += target;
        stats.sum_sq += target * target;
    }

    fn pop(&self, stats: &mut SumStats, target: f64) {
        stats.count -= 1;
        stats.sum -= target;
        stats.sum_sq -= target * target;
    }

    fn weighted_impurity(&self, stats: &SumStats) -> f64 {
        if stats.count == 0 {
            return 0.0;
        }
        (stats.sum_sq - stats.sum * stats.sum / stats.count as f64).max(0.0)
    }

    fn leaf(&self, stats: &SumStats) -> f64 {
        if stats.count == 0 {
            0.0
        } else {
            stats.sum / stats.count as f64
        }
    }
}

/// Gini criterion over class indices; leaves hold the majority class
pub(crate) struct Gini {
    pub n_classes: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct ClassCounts {
    counts: Vec<usize>,
    total: usize,
}

impl Criterion for Gini {
    type Target = usize;
    type Leaf = usize;
    type Stats = ClassCounts;

    fn empty(&self) -> ClassCounts {
        ClassCounts {
            counts: vec![0; self.n_classes],
            total: 0,
        }
    }

    fn push(&self, stats: &mut ClassCounts, target: usize) {
        stats.counts[target] += 1;
        stats.total += 1;
    }

    fn pop(&self, stats: &mut ClassCounts, target: usize) {
        stats.counts[target] -= 1;
        stats.total -= 1;
    }

    fn weighted_impurity(&self, stats: &ClassCounts) -> f64 {
        if stats.total == 0 {
            return 0.0;
        }
        let sum_sq: f64 = stats.counts.iter().map(|&c| (c * c) as f64).sum();
        stats.total as f64 - sum_sq / stats.total as f64
    }

    fn leaf(&self, stats: &ClassCounts) -> usize {
        argmax(&stats.counts)
    }
}

/// Index of the largest count; ties go to the lowest index
pub(crate) fn argmax(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Node<L> {
    Leaf(L),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DecisionTree<L> {
    nodes: Vec<Node<L>>,
}

impl<L: Copy> DecisionTree<L> {
    /// Rows must have the fitted width; the caller checks it
    pub fn predict(&self, row: &[f64]) -> L {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count()
    }

    #[cfg(test)]
    pub fn depth(&self) -> usize {
        fn walk<L>(nodes: &[Node<L>], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// Grows one tree on a sample of row indices
pub(crate) struct TreeBuilder<'a, C: Criterion> {
    pub criterion: &'a C,
    pub features: &'a FeatureMatrix,
    pub targets: &'a [C::Target],
    pub config: &'a ForestConfig,
}

impl<'a, C: Criterion> TreeBuilder<'a, C> {
    /// Draw the bootstrap sample (or all rows) and grow the tree
    pub fn grow(&self, rng: &mut StdRng) -> DecisionTree<C::Leaf> {
        let n = self.features.n_rows();
        let mut sample: Vec<usize> = if self.config.bootstrap {
            (0..n).map(|_| rng.gen_range(0..n)).collect()
        } else {
            (0..n).collect()
        };
        let mut nodes = Vec::new();
        self.build(&mut sample, 0, &mut nodes, rng);
        DecisionTree { nodes }
    }

    fn stats_for(&self, rows: &[usize]) -> C::Stats {
        let mut stats = self.criterion.empty();
        for &r in rows {
            self.criterion.push(&mut stats, self.targets[r]);
        }
        stats
    }

    fn build(
        &self,
        rows: &mut [usize],
        depth: usize,
        nodes: &mut Vec<Node<C::Leaf>>,
        rng: &mut StdRng,
    ) -> usize {
        let stats = self.stats_for(rows);
        let id = nodes.len();
        nodes.push(Node::Leaf(self.criterion.leaf(&stats)));

        let depth_exhausted = self.config.max_depth.map_or(false, |d| depth >= d);
        if depth_exhausted
            || rows.len() < self.config.min_samples_split
            || rows.len() < 2 * self.config.min_samples_leaf
            || self.criterion.weighted_impurity(&stats) <= PURITY_EPSILON
        {
            return id;
        }

        let Some(split) = self.best_split(rows, &stats, rng) else {
            return id;
        };

        let mid = partition(rows, |r| {
            self.features.value(r, split.feature) <= split.threshold
        });
        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left = self.build(left_rows, depth + 1, nodes, rng);
        let right = self.build(right_rows, depth + 1, nodes, rng);
        nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(
        &self,
        rows: &[usize],
        parent: &C::Stats,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = rows.len();
        let n_features = self.features.n_features();
        let k = self.config.max_features.resolve(n_features);
        let min_leaf = self.config.min_samples_leaf;
        let mut best: Option<SplitCandidate> = None;
        let mut column: Vec<(f64, C::Target)> = Vec::with_capacity(n);

        // Features are visited in random order. Constant columns do not count
        // towards `k`, so the search continues past `k` until some split exists.
        let mut visited = 0;
        for feature in index::sample(rng, n_features, n_features).into_iter() {
            if visited >= k && best.is_some() {
                break;
            }
            column.clear();
            column.extend(
                rows.iter()
                    .map(|&r| (self.features.value(r, feature), self.targets[r])),
            );
            column.sort_by(|a, b| a.0.total_cmp(&b.0));
            if column[0].0 >= column[n - 1].0 {
                continue;
            }
            visited += 1;

            let mut left = self.criterion.empty();
            let mut right = parent.clone();
            for pos in 0..n - 1 {
                let (value, target) = column[pos];
                self.criterion.push(&mut left, target);
                self.criterion.pop(&mut right, target);

                let n_left = pos + 1;
                if n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }
                let next = column[pos + 1].0;
                if next <= value {
                    continue;
                }
                let impurity = self.criterion.weighted_impurity(&left)
                    + self.criterion.weighted_impurity(&right);
                if best.as_ref().map_or(true, |b| impurity < b.impurity - PURITY_EPSILON) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }
        best
    }
}

/// Reorder so rows satisfying `pred` come first; returns their count
fn partition(rows: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..rows.len() {
        if pred(rows[i]) {
            rows.swap(i, mid);
            mid += 1;
        }
    }
    mid
}
