use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ml::features::{FEATURE_LEN, FEATURE_VERSION};

/// One node of a regression tree, stored in a flat array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    /// Feature index used for the split; unused on leaves.
    pub feature_index: u16,
    /// Threshold in feature units; `feature <= threshold` goes left.
    pub threshold: f32,
    /// Index of the left child in the node array.
    pub left: u32,
    /// Index of the right child in the node array.
    pub right: u32,
    /// Output value; meaningful only on leaves.
    pub value: f32,
    /// Whether this node is a leaf.
    pub leaf: bool,
}

/// Depth-limited regression tree used as a weak learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    /// Nodes in pre-order; children always come after their parent.
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Predict the tree value for a feature vector.
    pub fn predict(&self, features: &[f32]) -> f32 {
        let mut idx = 0usize;
        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };
            if node.leaf {
                return node.value;
            }
            let value = features.get(node.feature_index as usize).copied().unwrap_or(0.0);
            idx = if value <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }
}

/// Gradient-boosted regression-tree ensemble for reimbursement estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbrtModel {
    /// Model format version.
    pub model_version: i64,
    /// Feature layout version expected by this model.
    pub feature_version: i64,
    /// Number of `f32` values per feature vector.
    pub feature_len: usize,
    /// Prediction before any boosting rounds (mean training target).
    pub base_score: f32,
    /// Learning rate applied to each tree's output.
    pub learning_rate: f32,
    /// Fitted trees, one per boosting round.
    pub trees: Vec<RegressionTree>,
}

impl GbrtModel {
    /// Validate structural invariants of the model.
    pub fn validate(&self) -> Result<(), String> {
        if self.feature_len == 0 {
            return Err("Model must declare a non-zero feature length".to_string());
        }
        if !self.base_score.is_finite() {
            return Err("Model base_score must be finite".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err("Model learning_rate must be a positive, finite number".to_string());
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(format!("Tree {tree_idx} has no nodes"));
            }
            for (node_idx, node) in tree.nodes.iter().enumerate() {
                if node.leaf {
                    if !node.value.is_finite() {
                        return Err(format!(
                            "Tree {tree_idx} node {node_idx} has a non-finite leaf value"
                        ));
                    }
                    continue;
                }
                if node.feature_index as usize >= self.feature_len {
                    return Err(format!(
                        "Tree {tree_idx} node {node_idx} splits on feature {} but feature_len is {}",
                        node.feature_index, self.feature_len
                    ));
                }
                if !node.threshold.is_finite() {
                    return Err(format!(
                        "Tree {tree_idx} node {node_idx} has a non-finite threshold"
                    ));
                }
                let left = node.left as usize;
                let right = node.right as usize;
                // Children must point forward so prediction walks terminate.
                if left <= node_idx || right <= node_idx {
                    return Err(format!(
                        "Tree {tree_idx} node {node_idx} has backward child links"
                    ));
                }
                if left >= tree.nodes.len() || right >= tree.nodes.len() {
                    return Err(format!(
                        "Tree {tree_idx} node {node_idx} has out-of-range child links"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Load a model artifact from a JSON file.
    ///
    /// Rejects artifacts whose feature layout does not match the one compiled
    /// into this binary; applying such a model would silently mis-predict.
    pub fn load_json(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path)
            .map_err(|err| format!("Failed to read model artifact {}: {err}", path.display()))?;
        let model: Self = serde_json::from_slice(&bytes)
            .map_err(|err| format!("Failed to parse model artifact {}: {err}", path.display()))?;
        model.validate()?;
        if model.feature_version != FEATURE_VERSION {
            return Err(format!(
                "Model was fitted against feature layout version {} (expected {})",
                model.feature_version, FEATURE_VERSION
            ));
        }
        if model.feature_len != FEATURE_LEN {
            return Err(format!(
                "Model expects {} features per row (expected {})",
                model.feature_len, FEATURE_LEN
            ));
        }
        Ok(model)
    }

    /// Predict the reimbursement estimate for a feature vector.
    pub fn predict(&self, features: &[f32]) -> f32 {
        let mut raw = self.base_score;
        for tree in &self.trees {
            raw += self.learning_rate * tree.predict(features);
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: f32) -> TreeNode {
        TreeNode {
            feature_index: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value,
            leaf: true,
        }
    }

    fn split(feature_index: u16, threshold: f32, left: u32, right: u32) -> TreeNode {
        TreeNode {
            feature_index,
            threshold,
            left,
            right,
            value: 0.0,
            leaf: false,
        }
    }

    fn two_leaf_model() -> GbrtModel {
        GbrtModel {
            model_version: 1,
            feature_version: 1,
            feature_len: 2,
            base_score: 10.0,
            learning_rate: 0.5,
            trees: vec![RegressionTree {
                nodes: vec![split(0, 1.5, 1, 2), leaf(-2.0), leaf(4.0)],
            }],
        }
    }

    #[test]
    fn tree_predict_follows_threshold() {
        let model = two_leaf_model();
        let tree = &model.trees[0];
        assert_eq!(tree.predict(&[1.0, 0.0]), -2.0);
        assert_eq!(tree.predict(&[1.5, 0.0]), -2.0);
        assert_eq!(tree.predict(&[2.0, 0.0]), 4.0);
    }

    #[test]
    fn model_predict_scales_by_learning_rate() {
        let model = two_leaf_model();
        assert_eq!(model.predict(&[1.0, 0.0]), 9.0);
        assert_eq!(model.predict(&[2.0, 0.0]), 12.0);
    }

    #[test]
    fn validate_accepts_well_formed_model() {
        assert!(two_leaf_model().validate().is_ok());
    }

    #[test]
    fn validate_rejects_backward_child_links() {
        let mut model = two_leaf_model();
        model.trees[0].nodes[0].left = 0;
        assert!(model.validate().is_err());
    }

    #[test]
    fn validate_rejects_split_feature_out_of_range() {
        let mut model = two_leaf_model();
        model.trees[0].nodes[0].feature_index = 7;
        assert!(model.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_tree() {
        let mut model = two_leaf_model();
        model.trees.push(RegressionTree { nodes: Vec::new() });
        assert!(model.validate().is_err());
    }
}
