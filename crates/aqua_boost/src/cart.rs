//! CART regression tree builder
//!
//! Second-order (gradient/hessian) exact-greedy construction. Split candidates
//! are either every midpoint between distinct sorted values or, in binned mode,
//! precomputed quantile edges per feature.

use crate::tree::{Node, Tree};

/// Parameters for a single tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction required to split
    pub min_split_gain: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 1,
            reg_lambda: 1.0,
            min_split_gain: 0.0,
        }
    }
}

/// Where split thresholds may be placed
#[derive(Clone, Debug, PartialEq)]
pub enum SplitCandidates {
    /// Midpoint between any two adjacent distinct values
    Exact,
    /// Sorted bin edges per feature
    Binned(Vec<Vec<f64>>),
}

/// Quantile bin edges for one feature column.
///
/// With at most `max_bins` distinct values every midpoint becomes an edge;
/// otherwise edges sit between the distinct values at evenly spaced ranks.
pub fn quantile_edges(values: &[f64], max_bins: usize) -> Vec<f64> {
    let mut distinct: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();

    if distinct.len() < 2 || max_bins < 2 {
        return Vec::new();
    }

    let midpoint = |i: usize| split_point(distinct[i - 1], distinct[i]);

    if distinct.len() <= max_bins {
        return (1..distinct.len()).map(midpoint).collect();
    }

    let mut edges: Vec<f64> = (1..max_bins)
        .map(|b| midpoint((b * distinct.len() / max_bins).max(1)))
        .collect();
    edges.dedup();
    edges
}

/// A threshold strictly below `hi` and not below `lo`.
fn split_point(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid < hi {
        mid
    } else {
        lo
    }
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Builds one regression tree over a subset of rows and features
pub struct CartBuilder<'a> {
    config: &'a TreeConfig,
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    candidates: &'a SplitCandidates,
    allowed_features: &'a [usize],
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        config: &'a TreeConfig,
        features: &'a [Vec<f64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        candidates: &'a SplitCandidates,
        allowed_features: &'a [usize],
    ) -> Self {
        debug_assert_eq!(features.len(), gradients.len());
        debug_assert_eq!(features.len(), hessians.len());

        Self {
            config,
            features,
            gradients,
            hessians,
            candidates,
            allowed_features,
        }
    }

    /// Build a tree from the given training rows. Leaves hold raw (unshrunk)
    /// values; the caller decides the tree weight.
    pub fn build(&self, rows: &[usize], weight: f64) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(rows, 0, &mut nodes);
        Tree::new(nodes, weight)
    }

    fn build_node(&self, rows: &[usize], depth: usize, nodes: &mut Vec<Node>) -> i32 {
        let current = nodes.len() as i32;
        let leaf = Node::leaf(current, self.leaf_value(rows)).with_cover(rows.len());

        if depth >= self.config.max_depth || rows.len() < 2 * self.config.min_samples_leaf.max(1)
        {
            nodes.push(leaf);
            return current;
        }

        let split = match self.find_best_split(rows) {
            Some(split) => split,
            None => {
                nodes.push(leaf);
                return current;
            }
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.features[r][split.feature_idx] <= split.threshold);

        // Reserve the slot, children are appended after it.
        nodes.push(
            Node::internal(current, split.feature_idx as i32, split.threshold, 0, 0)
                .with_cover(rows.len()),
        );

        let left = self.build_node(&left_rows, depth + 1, nodes);
        let right = self.build_node(&right_rows, depth + 1, nodes);

        nodes[current as usize].left = left;
        nodes[current as usize].right = right;

        current
    }

    fn find_best_split(&self, rows: &[usize]) -> Option<SplitCandidate> {
        let (g_total, h_total) = self.sum_gradients_hessians(rows);
        let lambda = self.config.reg_lambda;
        let parent_score = g_total * g_total / (h_total + lambda);
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;
        let mut order: Vec<usize> = rows.to_vec();

        for &feature_idx in self.allowed_features {
            order.sort_by(|&a, &b| {
                self.features[a][feature_idx]
                    .total_cmp(&self.features[b][feature_idx])
                    .then(a.cmp(&b))
            });

            let mut g_left = 0.0;
            let mut h_left = 0.0;

            for i in 0..order.len() - 1 {
                let row = order[i];
                g_left += self.gradients[row];
                h_left += self.hessians[row];

                let left_count = i + 1;
                if left_count < min_leaf || order.len() - left_count < min_leaf {
                    continue;
                }

                let lo = self.features[row][feature_idx];
                let hi = self.features[order[i + 1]][feature_idx];
                if lo == hi {
                    continue;
                }

                let threshold = match self.candidates {
                    SplitCandidates::Exact => split_point(lo, hi),
                    SplitCandidates::Binned(edges) => {
                        let edges = &edges[feature_idx];
                        let at = edges.partition_point(|&e| e < lo);
                        match edges.get(at) {
                            Some(&edge) if edge < hi => edge,
                            _ => continue,
                        }
                    }
                };

                let g_right = g_total - g_left;
                let h_right = h_total - h_left;
                let gain = 0.5
                    * (g_left * g_left / (h_left + lambda) + g_right * g_right / (h_right + lambda)
                        - parent_score)
                    - self.config.min_split_gain;

                if !gain.is_finite() || gain <= 0.0 {
                    continue;
                }

                // Strict comparison: on ties the first candidate in
                // (feature, threshold) order wins.
                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }

    fn sum_gradients_hessians(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &r| {
            (g + self.gradients[r], h + self.hessians[r])
        })
    }

    /// Optimal leaf weight: -G / (H + λ)
    fn leaf_value(&self, rows: &[usize]) -> f64 {
        let (g, h) = self.sum_gradients_hessians(rows);
        let denom = h + self.config.reg_lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        -g / denom
    }
}
