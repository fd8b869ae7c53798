use super::model::{GbrtModel, RegressionTree, TreeNode};

/// Training hyperparameters for tree boosting.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Number of boosting rounds (trees).
    pub rounds: usize,
    /// Learning rate applied per round.
    pub learning_rate: f32,
    /// Maximum depth of each tree.
    pub max_depth: usize,
    /// Number of bins used for split search.
    pub bins: usize,
    /// Minimum number of samples on each side of a split.
    pub min_leaf: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            rounds: 300,
            learning_rate: 0.05,
            max_depth: 4,
            bins: 64,
            min_leaf: 4,
        }
    }
}

/// In-memory dataset used for training and evaluation.
#[derive(Debug, Clone)]
pub struct TrainDataset {
    /// Number of `f32` values in each feature vector.
    pub feature_len: usize,
    /// Feature layout version.
    pub feature_version: i64,
    /// Feature matrix, row-major.
    pub x: Vec<Vec<f32>>,
    /// Regression targets aligned with `x`.
    pub y: Vec<f32>,
}

/// Train a gradient-boosted regression-tree ensemble on squared error.
///
/// Fully deterministic: no sampling, no RNG, exact binned split search. Each
/// round fits one depth-limited tree to the current residuals and folds it
/// into the running prediction scaled by the learning rate.
pub fn train_gbrt(dataset: &TrainDataset, options: &TrainOptions) -> Result<GbrtModel, String> {
    if dataset.x.len() != dataset.y.len() {
        return Err("Mismatched feature/target lengths".to_string());
    }
    if dataset.x.is_empty() {
        return Err("Empty training dataset".to_string());
    }
    if dataset.feature_len == 0 {
        return Err("Dataset must declare a non-zero feature length".to_string());
    }
    if options.rounds == 0 {
        return Err("Training requires at least one boosting round".to_string());
    }
    if !(options.learning_rate > 0.0 && options.learning_rate.is_finite()) {
        return Err("Learning rate must be a positive, finite number".to_string());
    }
    if options.max_depth == 0 {
        return Err("Maximum tree depth must be at least 1".to_string());
    }
    if options.min_leaf == 0 {
        return Err("Minimum leaf size must be at least 1".to_string());
    }
    if dataset.y.iter().any(|v| !v.is_finite()) {
        return Err("Training targets must be finite".to_string());
    }
    if dataset.x.iter().flatten().any(|v| !v.is_finite()) {
        return Err("Training features must be finite".to_string());
    }

    let n = dataset.x.len();
    let bins = options.bins.clamp(2, 256);
    let (mins, maxs) = compute_feature_min_max(&dataset.x, dataset.feature_len);
    let binned = bin_features(&dataset.x, &mins, &maxs, bins);

    let base_score = (dataset.y.iter().map(|&v| v as f64).sum::<f64>() / n as f64) as f32;
    let mut predictions = vec![base_score; n];
    let mut residuals = vec![0.0f32; n];
    let mut trees = Vec::with_capacity(options.rounds);

    for _round in 0..options.rounds {
        for i in 0..n {
            residuals[i] = dataset.y[i] - predictions[i];
        }
        let ctx = SplitContext {
            binned: &binned,
            x: &dataset.x,
            mins: &mins,
            maxs: &maxs,
            residuals: &residuals,
            bins,
            max_depth: options.max_depth,
            min_leaf: options.min_leaf,
        };
        let tree = fit_tree(&ctx);
        for i in 0..n {
            predictions[i] += options.learning_rate * tree.predict(&dataset.x[i]);
        }
        trees.push(tree);
    }

    Ok(GbrtModel {
        model_version: 1,
        feature_version: dataset.feature_version,
        feature_len: dataset.feature_len,
        base_score,
        learning_rate: options.learning_rate,
        trees,
    })
}

struct SplitContext<'a> {
    binned: &'a [Vec<u8>],
    x: &'a [Vec<f32>],
    mins: &'a [f32],
    maxs: &'a [f32],
    residuals: &'a [f32],
    bins: usize,
    max_depth: usize,
    min_leaf: usize,
}

fn fit_tree(ctx: &SplitContext) -> RegressionTree {
    let samples: Vec<u32> = (0..ctx.x.len() as u32).collect();
    let mut nodes = Vec::new();
    grow_node(ctx, &samples, 0, &mut nodes);
    RegressionTree { nodes }
}

/// Append the subtree for `samples` and return its root index.
///
/// A leaf carrying the mean residual is pushed first; it is replaced by a
/// split node only once both children grow successfully, so children always
/// sit after their parent in the node array.
fn grow_node(ctx: &SplitContext, samples: &[u32], depth: usize, nodes: &mut Vec<TreeNode>) -> u32 {
    let node_idx = nodes.len() as u32;
    nodes.push(leaf_node(mean_residual(ctx.residuals, samples)));
    if depth >= ctx.max_depth || samples.len() < ctx.min_leaf.saturating_mul(2) {
        return node_idx;
    }
    let Some(best) = best_split(ctx, samples) else {
        return node_idx;
    };
    let threshold = threshold_for_bin(
        ctx.mins[best.feature_index],
        ctx.maxs[best.feature_index],
        best.split_bin,
        ctx.bins,
    );
    let (left_samples, right_samples) =
        partition_samples(ctx.x, samples, best.feature_index, threshold);
    // Bin boundaries are approximate; re-check the actual partition.
    if left_samples.len() < ctx.min_leaf || right_samples.len() < ctx.min_leaf {
        return node_idx;
    }
    let left = grow_node(ctx, &left_samples, depth + 1, nodes);
    let right = grow_node(ctx, &right_samples, depth + 1, nodes);
    nodes[node_idx as usize] = TreeNode {
        feature_index: best.feature_index as u16,
        threshold,
        left,
        right,
        value: 0.0,
        leaf: false,
    };
    node_idx
}

fn leaf_node(value: f32) -> TreeNode {
    TreeNode {
        feature_index: 0,
        threshold: 0.0,
        left: 0,
        right: 0,
        value,
        leaf: true,
    }
}

fn mean_residual(residuals: &[f32], samples: &[u32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&i| residuals[i as usize] as f64).sum();
    (sum / samples.len() as f64) as f32
}

#[derive(Debug, Clone)]
struct BestSplit {
    score: f64,
    feature_index: usize,
    split_bin: usize,
}

fn best_split(ctx: &SplitContext, samples: &[u32]) -> Option<BestSplit> {
    let parent_sse = node_sse(ctx.residuals, samples);
    let mut best: Option<BestSplit> = None;
    for feature_idx in 0..ctx.mins.len() {
        let Some(split) = best_split_for_feature(ctx, samples, feature_idx) else {
            continue;
        };
        if best.as_ref().is_none_or(|b| split.score < b.score) {
            best = Some(split);
        }
    }
    // Keep the split only if it actually reduces the node's squared error.
    best.filter(|b| b.score < parent_sse)
}

fn best_split_for_feature(
    ctx: &SplitContext,
    samples: &[u32],
    feature_idx: usize,
) -> Option<BestSplit> {
    let bins = ctx.bins;
    let mut counts = vec![0u32; bins];
    let mut sums = vec![0f64; bins];
    let mut sums_sq = vec![0f64; bins];
    for &i in samples {
        let b = ctx.binned[i as usize]
            .get(feature_idx)
            .copied()
            .unwrap_or(0) as usize;
        let r = ctx.residuals[i as usize] as f64;
        counts[b] += 1;
        sums[b] += r;
        sums_sq[b] += r * r;
    }
    let total_count: u32 = counts.iter().sum();
    let total_sum: f64 = sums.iter().sum();
    let total_sum_sq: f64 = sums_sq.iter().sum();

    let mut best: Option<BestSplit> = None;
    let mut left_count = 0u32;
    let mut left_sum = 0f64;
    let mut left_sum_sq = 0f64;

    for split_bin in 0..(bins - 1) {
        left_count += counts[split_bin];
        left_sum += sums[split_bin];
        left_sum_sq += sums_sq[split_bin];
        let right_count = total_count - left_count;
        if (left_count as usize) < ctx.min_leaf || (right_count as usize) < ctx.min_leaf {
            continue;
        }
        let right_sum = total_sum - left_sum;
        let right_sum_sq = total_sum_sq - left_sum_sq;
        let left_sse = left_sum_sq - (left_sum * left_sum) / left_count as f64;
        let right_sse = right_sum_sq - (right_sum * right_sum) / right_count as f64;
        let score = left_sse + right_sse;
        if best.as_ref().is_none_or(|b| score < b.score) {
            best = Some(BestSplit {
                score,
                feature_index: feature_idx,
                split_bin,
            });
        }
    }
    best
}

fn node_sse(residuals: &[f32], samples: &[u32]) -> f64 {
    let mut sum = 0f64;
    let mut sum_sq = 0f64;
    for &i in samples {
        let r = residuals[i as usize] as f64;
        sum += r;
        sum_sq += r * r;
    }
    if samples.is_empty() {
        return 0.0;
    }
    sum_sq - (sum * sum) / samples.len() as f64
}

fn partition_samples(
    x: &[Vec<f32>],
    samples: &[u32],
    feature_idx: usize,
    threshold: f32,
) -> (Vec<u32>, Vec<u32>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &i in samples {
        let v = x[i as usize].get(feature_idx).copied().unwrap_or(0.0);
        if v <= threshold {
            left.push(i);
        } else {
            right.push(i);
        }
    }
    (left, right)
}

fn threshold_for_bin(min: f32, max: f32, split_bin: usize, bins: usize) -> f32 {
    let t = ((split_bin + 1) as f32) / bins as f32;
    min + t * (max - min)
}

fn compute_feature_min_max(x: &[Vec<f32>], feature_len: usize) -> (Vec<f32>, Vec<f32>) {
    let mut mins = vec![f32::INFINITY; feature_len];
    let mut maxs = vec![f32::NEG_INFINITY; feature_len];
    for row in x {
        for (j, &v) in row.iter().take(feature_len).enumerate() {
            if v.is_finite() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }
    }
    for j in 0..feature_len {
        if !mins[j].is_finite() || !maxs[j].is_finite() {
            mins[j] = 0.0;
            maxs[j] = 0.0;
        }
        if mins[j] == maxs[j] {
            maxs[j] = mins[j] + 1.0;
        }
    }
    (mins, maxs)
}

fn bin_features(x: &[Vec<f32>], mins: &[f32], maxs: &[f32], bins: usize) -> Vec<Vec<u8>> {
    let bins_f = bins as f32;
    let mut out: Vec<Vec<u8>> = Vec::with_capacity(x.len());
    for row in x {
        let mut binned = Vec::with_capacity(mins.len());
        for (j, &min) in mins.iter().enumerate() {
            let max = maxs[j];
            let v = row.get(j).copied().unwrap_or(0.0);
            let t = if max > min {
                ((v - min) / (max - min)).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let b = (t * (bins_f - 1.0)).round() as u8;
            binned.push(b);
        }
        out.push(binned);
    }
    out
}
