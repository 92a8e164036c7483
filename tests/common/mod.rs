//! Synthetic corpora and assertion helpers for the training scenarios.

#![allow(dead_code)]

use std::path::PathBuf;

use half::f16;

use bodyparts::tree::{left_child, right_child, RdTree};
use bodyparts::{Candidates, Corpus, TrainParams};

/// Field of view chosen so pixels-per-meter is 4 at height 8:
/// ppm = (8 / 2) / tan(pi/4) = 4.
pub const FOV_PPM4: f32 = std::f32::consts::FRAC_PI_2;

/// 8x8 frame at uniform 1m depth; left half label 0, right half label 1,
/// background label 2 (not present in the frame).
pub fn halves_corpus() -> Corpus {
    let depth = vec![f16::from_f32(1.0); 64];
    let mut labels = Vec::with_capacity(64);
    for _y in 0..8 {
        for x in 0..8 {
            labels.push(if x < 4 { 0u8 } else { 1u8 });
        }
    }
    Corpus::from_parts(8, 8, FOV_PPM4, 3, 2, depth, labels).unwrap()
}

/// Candidate space that splits [`halves_corpus`] perfectly at the root: the
/// U probe looks 4px right, the V probe 4px left, so the gradient is
/// -999 on the left half and +999 on the right. Only the middle threshold
/// (zero) separates anything.
pub fn halves_candidates() -> Candidates {
    Candidates::new(vec![[4.0, 0.0, -4.0, 0.0]], vec![-1500.0, 0.0, 1500.0])
}

/// 8x8 frame with one label per column (background 8) and a per-column
/// depth ramp 0.1(x+1), so the gradient of [`columns_candidates`] encodes
/// the column.
pub fn columns_corpus() -> Corpus {
    let mut depth = Vec::with_capacity(64);
    let mut labels = Vec::with_capacity(64);
    for _y in 0..8 {
        for x in 0..8u8 {
            depth.push(f16::from_f32(0.1 * (x as f32 + 1.0)));
            labels.push(x);
        }
    }
    Corpus::from_parts(8, 8, FOV_PPM4, 9, 8, depth, labels).unwrap()
}

/// One candidate whose U probe reads the pixel's own depth and whose V
/// probe falls off the frame (reading the background depth), giving
/// gradient `depth(x) - 1000`; thresholds are the given cuts.
pub fn columns_candidates(cuts: &[f32]) -> Candidates {
    Candidates::new(vec![[0.0, 0.0, 1000.0, 0.0]], cuts.to_vec())
}

/// Small-corpus training parameters.
pub fn params(max_depth: usize, n_pixels: usize) -> TrainParams {
    TrainParams {
        n_pixels,
        n_thresholds: 2,
        n_uv: 1,
        max_depth,
        seed: 0,
        n_threads: 2,
        verbosity: bodyparts::Verbosity::Silent,
        ..Default::default()
    }
}

/// Unique temp path for container round-trips.
pub fn temp_tree_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "bodyparts-test-{tag}-{}.rdt",
        std::process::id()
    ))
}

/// Index of the most probable label.
pub fn argmax(probs: &[f32]) -> usize {
    probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap()
}

/// Walk every reachable node and check the structural invariants: each is
/// interior or a valid leaf (never untrained, never both), leaves point
/// inside the table list and their probabilities sum to one, and no leaf
/// sits deeper than the tree's depth.
pub fn assert_tree_invariants(tree: &RdTree) {
    let n_tables = tree.n_pr_tables();
    let mut stack = vec![(0usize, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let node = tree.node(id);
        assert!(
            depth < tree.depth() as usize,
            "node {id} sits at depth {depth} beyond the tree depth"
        );
        if node.is_interior() {
            stack.push((left_child(id), depth + 1));
            stack.push((right_child(id), depth + 1));
        } else {
            assert!(
                node.is_leaf(),
                "reachable node {id} is neither interior nor leaf"
            );
            let idx = node.label_pr_idx as usize;
            assert!(
                idx >= 1 && idx <= n_tables,
                "leaf {id} points at table {idx} of {n_tables}"
            );
            let sum: f32 = tree.pr_table(node.label_pr_idx).iter().sum();
            assert!(
                (sum - 1.0).abs() < 1e-5,
                "leaf {id} probabilities sum to {sum}"
            );
        }
    }
}
