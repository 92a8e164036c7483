//! Forest inference: per-pixel label probability vectors.
//!
//! Evaluates every tree of a forest at every pixel of a depth frame and
//! averages the leaf probability tables the traversals land in. Pixels at
//! or beyond the background depth short-circuit to a one-hot background
//! vector.
//!
//! When a `flip_map` is supplied each tree is evaluated twice per pixel,
//! once normally and once horizontally mirrored (uv x offsets negated, leaf
//! probabilities permuted through the map), which squeezes a second opinion
//! out of every tree on roughly bilaterally symmetric subjects.

use rayon::prelude::*;
use thiserror::Error;

use crate::corpus::{DepthValue, DepthView};
use crate::sampling::{flip_uv, sample_uv};
use crate::tree::{left_child, right_child, RdTree};

/// Forest construction failures.
#[derive(Debug, Error)]
pub enum ForestError {
    #[error("forest contains no trees")]
    Empty,

    #[error("trees disagree on label count ({0} vs {1})")]
    LabelMismatch(u8, u8),

    #[error("trees disagree on background label ({0} vs {1})")]
    BgLabelMismatch(u8, u8),
}

/// A set of trees evaluated together.
///
/// All trees must share label cardinality and background label; the first
/// tree's background depth cutoff governs background rejection.
pub struct Forest {
    trees: Vec<RdTree>,
}

impl Forest {
    pub fn new(trees: Vec<RdTree>) -> Result<Self, ForestError> {
        let first = trees.first().ok_or(ForestError::Empty)?;
        let (n_labels, bg_label) = (first.n_labels(), first.bg_label());
        for tree in &trees[1..] {
            if tree.n_labels() != n_labels {
                return Err(ForestError::LabelMismatch(n_labels, tree.n_labels()));
            }
            if tree.bg_label() != bg_label {
                return Err(ForestError::BgLabelMismatch(bg_label, tree.bg_label()));
            }
        }
        Ok(Self { trees })
    }

    #[inline]
    pub fn trees(&self) -> &[RdTree] {
        &self.trees
    }

    #[inline]
    pub fn n_labels(&self) -> u8 {
        self.trees[0].n_labels()
    }

    #[inline]
    pub fn bg_label(&self) -> u8 {
        self.trees[0].bg_label()
    }

    /// Evaluate the forest over a depth frame.
    ///
    /// Returns `width * height * n_labels` probabilities, pixel-major. Each
    /// output chunk is written independently of every other, so when
    /// `parallel` is set the pixel loop fans out over the rayon pool with
    /// no synchronization (see [`crate::utils::resolve_parallel`] for
    /// mapping a thread count to this flag).
    ///
    /// # Panics
    ///
    /// Panics if the frame size disagrees with `width * height`, or if
    /// `flip_map` is present with a length other than `n_labels`.
    pub fn infer_labels<D: DepthValue>(
        &self,
        depth: &[D],
        width: usize,
        height: usize,
        flip_map: Option<&[u8]>,
        parallel: bool,
    ) -> Vec<f32> {
        let n_labels = self.n_labels() as usize;
        if let Some(map) = flip_map {
            assert_eq!(
                map.len(),
                n_labels,
                "flip map must cover all {n_labels} labels"
            );
        }

        let view = DepthView::new(depth, width, height);
        let mut output = vec![0.0f32; width * height * n_labels];

        let pixels = output.chunks_mut(n_labels).enumerate();
        if parallel {
            pixels
                .par_bridge()
                .for_each(|(offset, out)| self.infer_pixel(view, offset, flip_map, out));
        } else {
            pixels.for_each(|(offset, out)| self.infer_pixel(view, offset, flip_map, out));
        }

        output
    }

    /// Accumulate the forest's probabilities for one pixel.
    fn infer_pixel<D: DepthValue>(
        &self,
        view: DepthView<'_, D>,
        offset: usize,
        flip_map: Option<&[u8]>,
        out: &mut [f32],
    ) {
        let bg_depth = self.trees[0].bg_depth();
        let bg_label = self.bg_label() as usize;

        let x = (offset % view.width()) as i32;
        let y = (offset / view.width()) as i32;
        let depth = view.at(offset);

        if depth >= bg_depth {
            out[bg_label] += 1.0;
            return;
        }

        let passes = if flip_map.is_some() { 2 } else { 1 };
        for tree in &self.trees {
            for pass in 0..passes {
                let flip = pass == 1;

                let mut id = 0usize;
                let mut node = tree.node(id);
                while node.is_interior() {
                    let uv = if flip { flip_uv(node.uv) } else { node.uv };
                    let gradient = sample_uv(view, x, y, depth, uv, bg_depth);
                    id = if gradient < node.t {
                        left_child(id)
                    } else {
                        right_child(id)
                    };
                    node = tree.node(id);
                }

                let table = tree.pr_table(node.label_pr_idx);
                match flip_map {
                    Some(map) if flip => {
                        for (n, &p) in table.iter().enumerate() {
                            out[map[n] as usize] += p;
                        }
                    }
                    _ => {
                        for (slot, &p) in out.iter_mut().zip(table) {
                            *slot += p;
                        }
                    }
                }
            }
        }

        let divider = (self.trees.len() * passes) as f32;
        for slot in out.iter_mut() {
            *slot /= divider;
        }
    }
}
