//! Random-forest predictor (§4.6). A loaded ensemble of fixed-depth binary
//! decision trees over a template's `input_sizes` feature vector; training
//! happens externally and is out of scope here.

use serde::{Deserialize, Serialize};

/// One node of a decision tree. `Leaf` holds a probability vector over
/// candidate template indices; `Split` compares `feature` against
/// `threshold` and recurses left/right.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf { probabilities: Vec<f64> },
    Split { feature: usize, threshold: f64, left: Box<TreeNode>, right: Box<TreeNode> },
}

impl TreeNode {
    fn predict(&self, features: &[f64]) -> &[f64] {
        match self {
            TreeNode::Leaf { probabilities } => probabilities,
            TreeNode::Split { feature, threshold, left, right } => {
                let value = features.get(*feature).copied().unwrap_or(0.0);
                if value <= *threshold {
                    left.predict(features)
                } else {
                    right.predict(features)
                }
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionTree {
    pub root: TreeNode,
}

/// The forest's output is the element-wise mean of every tree's leaf
/// probability vector (§4.6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Forest {
    pub trees: Vec<DecisionTree>,
    /// Feature-vector width the trees were trained against; `predict` pads
    /// with zero or truncates the caller's `input_sizes` to this length.
    pub feature_width: usize,
}

impl Forest {
    pub fn predict(&self, input_sizes: &[i64]) -> Vec<f64> {
        let mut features = vec![0.0f64; self.feature_width];
        for (slot, value) in features.iter_mut().zip(input_sizes.iter()) {
            *slot = *value as f64;
        }

        let mut sum: Option<Vec<f64>> = None;
        for tree in &self.trees {
            let leaf = tree.root.predict(&features);
            sum = Some(match sum {
                None => leaf.to_vec(),
                Some(mut acc) => {
                    for (a, b) in acc.iter_mut().zip(leaf.iter()) {
                        *a += b;
                    }
                    acc
                }
            });
        }

        let mut out = sum.unwrap_or_default();
        let n = self.trees.len().max(1) as f64;
        for v in &mut out {
            *v /= n;
        }
        out
    }

    /// Candidate indices ordered best-first by predicted probability,
    /// ties broken by index (§4.4 "argmax ... try the next best").
    pub fn ranked_candidates(&self, input_sizes: &[i64]) -> Vec<usize> {
        let mut scored: Vec<(usize, f64)> = self.predict(input_sizes).into_iter().enumerate().collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(i, _)| i).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_split_tree_routes_by_feature_zero() {
        let forest = Forest {
            feature_width: 1,
            trees: vec![DecisionTree {
                root: TreeNode::Split {
                    feature: 0,
                    threshold: 100.0,
                    left: Box::new(TreeNode::Leaf { probabilities: vec![0.9, 0.1] }),
                    right: Box::new(TreeNode::Leaf { probabilities: vec![0.1, 0.9] }),
                },
            }],
        };
        assert_eq!(forest.ranked_candidates(&[10])[0], 0);
        assert_eq!(forest.ranked_candidates(&[1000])[0], 1);
    }

    #[test]
    fn mean_of_two_trees_is_averaged() {
        let leaf_a = TreeNode::Leaf { probabilities: vec![1.0, 0.0] };
        let leaf_b = TreeNode::Leaf { probabilities: vec![0.0, 1.0] };
        let forest =
            Forest { feature_width: 1, trees: vec![DecisionTree { root: leaf_a }, DecisionTree { root: leaf_b }] };
        assert_eq!(forest.predict(&[1]), vec![0.5, 0.5]);
    }
}
