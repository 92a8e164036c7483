//! Worker pool and breadth-first training driver.
//!
//! Training is driven by a FIFO queue of pending nodes. For each node the
//! driver dispatches one job to a pool of long-lived workers; each worker
//! owns a disjoint slice of the uv candidate axis and scores every
//! (uv, threshold) split in its slice over the node's pixels. The driver
//! reduces the per-worker bests, writes the node into the packed array and
//! either enqueues the two children of a split or records a leaf
//! probability table.
//!
//! The pool is a dedicated `rayon::ThreadPool`; each node is dispatched
//! with [`rayon::ThreadPool::broadcast`], which rendezvouses every worker
//! at the start and end of the job, the broadcast-channel equivalent of a
//! ready/finished barrier pair. Worker results come back indexed by worker,
//! and the reduction scans them in ascending order with a strict
//! comparison, so the lowest slice wins equal gains.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::corpus::Corpus;
use crate::tree::{left_child, n_nodes_for_depth, right_child, Node, RdTree};

use super::checkpoint;
use super::histogram::{
    accumulate_uvt_lr_histograms, lr_buffer_len, normalize_histogram, shannon_entropy,
};
use super::partition::partition_pixels;
use super::sampler::{sample_training_pixels, PixelSample};
use super::split::{best_split_in_slice, SliceBest};
use super::{
    Candidates, InterruptFlag, TrainError, TrainOutcome, TrainParams, TrainingLogger,
};

/// A node waiting in the training queue, owning its pixel list.
#[derive(Debug)]
pub(crate) struct NodeTrainData {
    /// Breadth-first slot index in the packed tree.
    pub id: usize,
    /// Depth at which the node sits; the root is 0.
    pub depth: usize,
    pub pixels: Vec<PixelSample>,
}

/// Buffers a worker allocates once and reuses for every node.
struct WorkerScratch {
    root_histogram: Vec<u32>,
    lr_histograms: Vec<u32>,
    nhistogram: Vec<f32>,
    root_nhistogram: Vec<f32>,
}

/// One worker's output for one node.
struct WorkerResult {
    best: SliceBest,
    /// Worker 0 publishes the normalized root histogram for leaf emission.
    root_nhistogram: Option<Vec<f32>>,
}

/// Partition the uv axis: even shares, last worker absorbs the remainder.
fn uv_slices(n_uv: usize, n_workers: usize) -> Vec<(usize, usize)> {
    let per = n_uv / n_workers;
    (0..n_workers)
        .map(|i| {
            let lo = i * per;
            let hi = if i == n_workers - 1 { n_uv } else { (i + 1) * per };
            (lo, hi)
        })
        .collect()
}

/// Score one node over `[uv_lo, uv_hi)`: accumulate histograms, then scan
/// for the slice's best split unless the node is single-label or sits on
/// the last trainable depth.
#[allow(clippy::too_many_arguments)]
fn scan_node(
    corpus: &Corpus,
    candidates: &Candidates,
    node: &NodeTrainData,
    max_depth: usize,
    uv_lo: usize,
    uv_hi: usize,
    scratch: &mut WorkerScratch,
    publish_root: bool,
    interrupt: &InterruptFlag,
) -> WorkerResult {
    scratch.root_histogram.fill(0);
    scratch.lr_histograms.fill(0);

    accumulate_uvt_lr_histograms(
        corpus,
        candidates,
        &node.pixels,
        node.depth,
        max_depth,
        uv_lo,
        uv_hi,
        &mut scratch.root_histogram,
        &mut scratch.lr_histograms,
        interrupt,
    );

    let (root_n, labels_present) =
        normalize_histogram(&scratch.root_histogram, &mut scratch.root_nhistogram);

    let mut best = SliceBest::default();
    if labels_present > 1 && node.depth + 1 < max_depth {
        let entropy = shannon_entropy(&scratch.root_nhistogram);
        best = best_split_in_slice(
            entropy,
            root_n,
            corpus.n_labels() as usize,
            candidates.n_thresholds(),
            uv_lo,
            uv_hi,
            &scratch.lr_histograms,
            &mut scratch.nhistogram,
            interrupt,
        );
    }

    WorkerResult {
        best,
        root_nhistogram: if publish_root {
            Some(scratch.root_nhistogram.clone())
        } else {
            None
        },
    }
}

pub(crate) fn train_tree(
    params: &TrainParams,
    corpus: &Corpus,
    candidates: &Candidates,
    checkpoint_tree: Option<&RdTree>,
    interrupt: &InterruptFlag,
) -> Result<TrainOutcome, TrainError> {
    let n_labels = corpus.n_labels() as usize;
    let max_depth = params.max_depth;
    let n_workers = params.resolved_threads();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_workers)
        .thread_name(|i| format!("bodyparts-worker-{i}"))
        .build()?;

    let slices = uv_slices(candidates.n_uv(), n_workers);
    let scratches: Vec<Mutex<WorkerScratch>> = slices
        .iter()
        .map(|&(lo, hi)| {
            Mutex::new(WorkerScratch {
                root_histogram: vec![0; n_labels],
                lr_histograms: vec![
                    0;
                    lr_buffer_len(hi - lo, candidates.n_thresholds(), n_labels)
                ],
                nhistogram: vec![0.0; n_labels],
                root_nhistogram: vec![0.0; n_labels],
            })
        })
        .collect();

    // Every slot starts untrained so an interrupted run checkpoints cleanly;
    // a restore overwrites the slots the stored tree reached.
    let mut nodes = vec![Node::untrained(); n_nodes_for_depth(max_depth)];

    let root_pixels = sample_training_pixels(corpus, params.n_pixels, params.seed);

    let (mut queue, mut tables) = match checkpoint_tree {
        Some(stored) => {
            let restored =
                checkpoint::restore(corpus, stored, max_depth, &mut nodes, root_pixels)?;
            (restored.queue, restored.tables)
        }
        None => {
            let mut queue = VecDeque::new();
            queue.push_back(NodeTrainData {
                id: 0,
                depth: 0,
                pixels: root_pixels,
            });
            (queue, Vec::new())
        }
    };

    let mut logger = TrainingLogger::new(params.verbosity);
    logger.begin_training(corpus.n_images(), params.n_pixels);

    let mut interrupted = false;
    while let Some(node) = queue.pop_front() {
        logger.depth_transition(node.depth, queue.len() + 1);

        let mut results: Vec<WorkerResult> = pool.broadcast(|ctx| {
            let idx = ctx.index();
            let (uv_lo, uv_hi) = slices[idx];
            let mut scratch = scratches[idx]
                .lock()
                .expect("worker scratch mutex poisoned");
            scan_node(
                corpus,
                candidates,
                &node,
                max_depth,
                uv_lo,
                uv_hi,
                &mut scratch,
                idx == 0,
                interrupt,
            )
        });

        if interrupt.is_set() {
            logger.interrupted();
            interrupted = true;
            break;
        }

        let mut best = SliceBest::default();
        for result in &results {
            if result.best.gain > best.gain {
                best = result.best;
            }
        }

        if best.gain > 0.0 && node.depth + 1 < max_depth {
            let uv = candidates.uvs[best.uv];
            let t = candidates.thresholds[best.threshold];
            nodes[node.id] = Node {
                uv,
                t,
                label_pr_idx: 0,
            };
            logger.split(node.id, best.gain, uv, t);

            let (l_pixels, r_pixels) = partition_pixels(
                corpus,
                &node.pixels,
                uv,
                t,
                (best.n_l as usize, best.n_r as usize),
            );
            queue.push_back(NodeTrainData {
                id: left_child(node.id),
                depth: node.depth + 1,
                pixels: l_pixels,
            });
            queue.push_back(NodeTrainData {
                id: right_child(node.id),
                depth: node.depth + 1,
                pixels: r_pixels,
            });
        } else {
            let nhistogram = results[0]
                .root_nhistogram
                .take()
                .unwrap_or_else(|| vec![0.0; n_labels]);
            logger.leaf(node.id, &nhistogram);
            tables.push(nhistogram);
            nodes[node.id].label_pr_idx = tables.len() as u32;
        }
        // The node record drops here, releasing its pixel list.
    }

    logger.finish(interrupted);

    let mut flat = Vec::with_capacity(tables.len() * n_labels);
    for table in &tables {
        flat.extend_from_slice(table);
    }

    let tree = RdTree::new(
        max_depth as u8,
        corpus.n_labels(),
        corpus.bg_label(),
        corpus.fov(),
        nodes,
        flat,
    )
    .with_bg_depth(corpus.bg_depth());

    Ok(TrainOutcome { tree, interrupted })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uv_axis_partitioning() {
        assert_eq!(uv_slices(10, 1), vec![(0, 10)]);
        assert_eq!(uv_slices(10, 3), vec![(0, 3), (3, 6), (6, 10)]);
        // Fewer candidates than workers: early slices are empty, the last
        // absorbs everything.
        assert_eq!(uv_slices(2, 4), vec![(0, 0), (0, 0), (0, 0), (0, 2)]);
    }
}
