//! Deterministic gradient-boosted regression-tree ensemble.
//!
//! This is a lightweight regressor that avoids external ML dependencies while
//! still supporting:
//! - Squared-error boosting with depth-limited trees and binned split search.
//! - Reproducible JSON model export/load with a versioned feature layout.

mod model;
mod train;

pub use model::{GbrtModel, RegressionTree, TreeNode};
pub use train::{TrainDataset, TrainOptions, train_gbrt};
