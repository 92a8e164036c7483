//! Resuming training from a previously saved tree.
//!
//! A checkpoint is any serialized tree, including one cut short by an
//! interrupt: slots training never reached carry the untrained sentinel.
//! Restoring walks the stored tree breadth-first with the full root pixel
//! set, re-partitioning at every stored interior node, and rebuilds two
//! pieces of driver state:
//!
//! - the probability table list, with stored 1-based indices preserved
//! - the training queue: untrained nodes, plus stored-depth leaves when the
//!   new configuration trains deeper than the checkpoint did

use std::collections::VecDeque;

use thiserror::Error;

use crate::corpus::Corpus;
use crate::tree::{left_child, right_child, Node, RdTree};

use super::driver::NodeTrainData;
use super::partition::partition_pixels;
use super::sampler::PixelSample;

/// Checkpoint validation and restore failures.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint has {found} labels, expected {expected}")]
    LabelMismatch { found: u8, expected: u8 },

    #[error("checkpoint has FoV {found}, expected {expected}")]
    FovMismatch { found: f32, expected: f32 },

    #[error("can't train with a lower depth than checkpoint ({configured} < {stored})")]
    DepthExceedsConfig { stored: u8, configured: usize },

    #[error("tree already fully trained")]
    FullyTrained,
}

/// Driver state rebuilt from a checkpoint.
#[derive(Debug)]
pub(crate) struct Restored {
    pub queue: VecDeque<NodeTrainData>,
    pub tables: Vec<Vec<f32>>,
}

/// Validate `stored` against the corpus and configuration, copy its slots
/// into `nodes`, and rebuild the training queue and table list.
pub(crate) fn restore(
    corpus: &Corpus,
    stored: &RdTree,
    max_depth: usize,
    nodes: &mut [Node],
    root_pixels: Vec<PixelSample>,
) -> Result<Restored, CheckpointError> {
    if stored.n_labels() != corpus.n_labels() {
        return Err(CheckpointError::LabelMismatch {
            found: stored.n_labels(),
            expected: corpus.n_labels(),
        });
    }
    if (stored.fov() - corpus.fov()).abs() > 1e-6 {
        return Err(CheckpointError::FovMismatch {
            found: stored.fov(),
            expected: corpus.fov(),
        });
    }
    let stored_depth = stored.depth() as usize;
    if stored_depth > max_depth {
        return Err(CheckpointError::DepthExceedsConfig {
            stored: stored.depth(),
            configured: max_depth,
        });
    }

    nodes[..stored.n_nodes()].copy_from_slice(stored.nodes());

    let mut walk = VecDeque::new();
    walk.push_back(NodeTrainData {
        id: 0,
        depth: 0,
        pixels: root_pixels,
    });

    let mut queue = VecDeque::new();
    let mut tables = Vec::new();

    while let Some(data) = walk.pop_front() {
        let node = nodes[data.id];

        // Walk order matches the order training assigned table indices, so
        // appending keeps every stored 1-based index valid.
        if node.is_leaf() {
            tables.push(stored.pr_table(node.label_pr_idx).to_vec());
        }

        // Incomplete, or a last-level leaf that a deeper run must re-expand.
        if node.is_untrained()
            || (data.depth == stored_depth - 1 && max_depth > stored_depth)
        {
            queue.push_back(data);
            continue;
        }

        if node.is_interior() {
            let (l_pixels, r_pixels) =
                partition_pixels(corpus, &data.pixels, node.uv, node.t, (0, 0));
            walk.push_back(NodeTrainData {
                id: left_child(data.id),
                depth: data.depth + 1,
                pixels: l_pixels,
            });
            walk.push_back(NodeTrainData {
                id: right_child(data.id),
                depth: data.depth + 1,
                pixels: r_pixels,
            });
        }
        // A fully trained leaf above the last level keeps its table and
        // needs nothing else; its pixels drop here.
    }

    if queue.is_empty() {
        return Err(CheckpointError::FullyTrained);
    }

    Ok(Restored { queue, tables })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{n_nodes_for_depth, UNTRAINED_IDX};
    use half::f16;

    /// 2x1 corpus, depths 1m and 3m, labels 0 and 1 (bg 2).
    fn corpus() -> Corpus {
        let depth = vec![f16::from_f32(1.0), f16::from_f32(3.0)];
        Corpus::from_parts(2, 1, 1.0, 3, 2, depth, vec![0, 1]).unwrap()
    }

    fn root_pixels() -> Vec<PixelSample> {
        vec![
            PixelSample { x: 0, y: 0, image: 0 },
            PixelSample { x: 1, y: 0, image: 0 },
        ]
    }

    /// Fully trained depth-2 tree: the root splits pixel 0 (gradient -2)
    /// from pixel 1 (gradient 0) at threshold -1.
    fn trained_tree() -> RdTree {
        let mut nodes = vec![Node::untrained(); 3];
        nodes[0] = Node {
            uv: [0.0, 0.0, 1.0, 0.0],
            t: -1.0,
            label_pr_idx: 0,
        };
        nodes[1].label_pr_idx = 1;
        nodes[2].label_pr_idx = 2;
        RdTree::new(2, 3, 2, 1.0, nodes, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
    }

    fn node_buffer(depth: usize) -> Vec<Node> {
        vec![Node::untrained(); n_nodes_for_depth(depth)]
    }

    #[test]
    fn label_count_mismatch_is_rejected() {
        let corpus = corpus();
        let stored = {
            let t = trained_tree();
            RdTree::new(
                2,
                4,
                3,
                1.0,
                t.nodes().to_vec(),
                vec![0.0; 8],
            )
        };
        let mut nodes = node_buffer(2);
        let err = restore(&corpus, &stored, 2, &mut nodes, root_pixels()).unwrap_err();
        assert!(matches!(err, CheckpointError::LabelMismatch { found: 4, expected: 3 }));
    }

    #[test]
    fn fov_mismatch_is_rejected() {
        let corpus = corpus();
        let t = trained_tree();
        let stored = RdTree::new(
            2,
            3,
            2,
            1.5,
            t.nodes().to_vec(),
            t.pr_tables_flat().to_vec(),
        );
        let mut nodes = node_buffer(2);
        let err = restore(&corpus, &stored, 2, &mut nodes, root_pixels()).unwrap_err();
        assert!(matches!(err, CheckpointError::FovMismatch { .. }));
    }

    #[test]
    fn shallower_configuration_is_rejected() {
        let corpus = corpus();
        let stored = trained_tree();
        let mut nodes = node_buffer(1);
        let err = restore(&corpus, &stored, 1, &mut nodes, root_pixels()).unwrap_err();
        assert!(matches!(
            err,
            CheckpointError::DepthExceedsConfig { stored: 2, configured: 1 }
        ));
    }

    #[test]
    fn fully_trained_tree_yields_nothing_to_train() {
        let corpus = corpus();
        let stored = trained_tree();
        let mut nodes = node_buffer(2);
        let err = restore(&corpus, &stored, 2, &mut nodes, root_pixels()).unwrap_err();
        assert!(matches!(err, CheckpointError::FullyTrained));
    }

    #[test]
    fn untrained_root_is_reenqueued_with_all_pixels() {
        let corpus = corpus();
        let stored = RdTree::new(2, 3, 2, 1.0, node_buffer(2), Vec::new());
        let mut nodes = node_buffer(2);
        let restored = restore(&corpus, &stored, 2, &mut nodes, root_pixels()).unwrap();

        assert_eq!(restored.queue.len(), 1);
        assert_eq!(restored.tables.len(), 0);
        let root = &restored.queue[0];
        assert_eq!((root.id, root.depth), (0, 0));
        assert_eq!(root.pixels.len(), 2);
    }

    #[test]
    fn deepening_reenqueues_boundary_leaves_and_keeps_tables() {
        let corpus = corpus();
        let stored = trained_tree();
        let mut nodes = node_buffer(3);
        let restored = restore(&corpus, &stored, 3, &mut nodes, root_pixels()).unwrap();

        // Both depth-1 leaves come back for training with their own pixel,
        // and their stored tables are preserved at indices 1 and 2.
        assert_eq!(restored.queue.len(), 2);
        assert_eq!(restored.tables.len(), 2);
        assert_eq!(restored.tables[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(restored.tables[1], vec![0.0, 1.0, 0.0]);

        let ids: Vec<usize> = restored.queue.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(restored.queue.iter().all(|n| n.pixels.len() == 1));

        // Stored slots were copied into the bigger array; new territory
        // keeps the untrained sentinel.
        assert_eq!(nodes[0], stored.node(0));
        assert_eq!(nodes[3].label_pr_idx, UNTRAINED_IDX);
    }
}
