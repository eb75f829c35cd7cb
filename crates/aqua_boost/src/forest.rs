//! Trained tree ensemble shared by every tree backend

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::tree::Tree;

/// Additive ensemble: `base_score + Σ weight_t · leaf_t(x)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forest {
    /// Format version (always 1 for now)
    pub version: i32,
    pub base_score: f64,
    pub feature_count: usize,
    pub trees: Vec<Tree>,
}

impl Forest {
    pub fn new(base_score: f64, feature_count: usize, trees: Vec<Tree>) -> Self {
        Self {
            version: 1,
            base_score,
            feature_count,
            trees,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.version != 1 {
            return Err(EngineError::InvalidModel(format!(
                "Unsupported forest version: {}",
                self.version
            )));
        }
        if !self.base_score.is_finite() {
            return Err(EngineError::InvalidModel("base score is not finite".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|e| EngineError::InvalidModel(format!("Tree {i}: {e}")))?;
            if let Some(node) = tree
                .nodes
                .iter()
                .find(|n| !n.is_leaf() && n.feature_idx as usize >= self.feature_count)
            {
                return Err(EngineError::InvalidModel(format!(
                    "Tree {i} splits on feature {} but the forest has {} features",
                    node.feature_idx, self.feature_count
                )));
            }
        }
        Ok(())
    }

    pub fn predict_row(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.contribution(features))
    }

    /// Predict a batch of rows, rejecting rows of the wrong width.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, EngineError> {
        rows.iter()
            .enumerate()
            .map(|(row, features)| {
                if features.len() != self.feature_count {
                    return Err(EngineError::FeatureCountMismatch {
                        row,
                        expected: self.feature_count,
                        actual: features.len(),
                    });
                }
                Ok(self.predict_row(features))
            })
            .collect()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    fn two_tree_forest() -> Forest {
        let tree1 = Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 1, 2),
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            1.0,
        );
        let tree2 = Tree::new(
            vec![
                Node::internal(0, 1, 30.0, 1, 2),
                Node::leaf(1, -50.0),
                Node::leaf(2, 50.0),
            ],
            0.5,
        );
        Forest::new(10.0, 2, vec![tree1, tree2])
    }

    #[test]
    fn test_forest_inference() {
        let forest = two_tree_forest();
        // 10 + 100 + 0.5 * -50
        assert_eq!(forest.predict_row(&[30.0, 20.0]), 85.0);
        // 10 + 200 + 0.5 * 50
        assert_eq!(forest.predict_row(&[60.0, 40.0]), 235.0);
    }

    #[test]
    fn test_feature_count_is_enforced() {
        let forest = two_tree_forest();
        let err = forest.predict(&[vec![1.0]]).unwrap_err();
        assert_eq!(
            err,
            EngineError::FeatureCountMismatch {
                row: 0,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_validate_rejects_out_of_range_feature() {
        let mut forest = two_tree_forest();
        forest.feature_count = 1;
        assert!(forest.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_preserves_predictions() {
        let forest = two_tree_forest();
        let json = serde_json::to_string(&forest).unwrap();
        let restored: Forest = serde_json::from_str(&json).unwrap();
        assert_eq!(forest, restored);
        assert_eq!(
            forest.predict_row(&[42.0, 12.0]),
            restored.predict_row(&[42.0, 12.0])
        );
    }
}
