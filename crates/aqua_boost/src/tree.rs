//! Regression tree structures
//!
//! Trees are flat node arrays with node 0 as the root. Traversal goes left when
//! `feature <= threshold`, which keeps evaluation identical between the trainer
//! and every later prediction.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes `feature_idx >= 0` and `left`/`right` index into the
/// tree's node array. Leaves carry `feature_idx == -1` and a `leaf` value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: i32,
    pub left: i32,
    pub right: i32,
    pub feature_idx: i32,
    pub threshold: f64,
    pub leaf: Option<f64>,
    /// Number of training rows that reached this node
    #[serde(default)]
    pub cover: u32,
}

impl Node {
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
            cover: 0,
        }
    }

    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
            cover: 0,
        }
    }

    pub fn with_cover(mut self, cover: usize) -> Self {
        self.cover = cover.min(u32::MAX as usize) as u32;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single regression tree with its ensemble weight (shrinkage)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    pub nodes: Vec<Node>,
    pub weight: f64,
}

impl Tree {
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Raw leaf output for a feature vector, before the tree weight is applied.
    ///
    /// Structural problems evaluate to 0.0; `validate` is the place to catch them.
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        loop {
            let node = match self.nodes.get(idx) {
                Some(node) => node,
                None => return 0.0,
            };

            if node.is_leaf() {
                return node.leaf.unwrap_or(0.0);
            }

            let value = match features.get(node.feature_idx as usize) {
                Some(v) => *v,
                None => return 0.0,
            };

            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return 0.0;
            }
            idx = next as usize;
        }
    }

    /// Weighted contribution of this tree to the ensemble prediction
    pub fn contribution(&self, features: &[f64]) -> f64 {
        self.weight * self.evaluate(features)
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    1 + walk(nodes, node.left as usize).max(walk(nodes, node.right as usize))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        if !self.weight.is_finite() {
            return Err(format!("Tree weight is not finite: {}", self.weight));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                match node.leaf {
                    Some(v) if v.is_finite() => {}
                    Some(v) => return Err(format!("Leaf node {i} has non-finite value {v}")),
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                }
                continue;
            }

            // Children are always appended after their parent.
            for child in [node.left, node.right] {
                if child <= i as i32 || child as usize >= self.nodes.len() {
                    return Err(format!("Node {i} has invalid child: {child}"));
                }
            }
            if node.feature_idx < 0 {
                return Err(format!(
                    "Internal node {i} has invalid feature index: {}",
                    node.feature_idx
                ));
            }
            if !node.threshold.is_finite() {
                return Err(format!("Internal node {i} has non-finite threshold"));
            }
        }

        Ok(())
    }
}
