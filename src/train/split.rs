//! Best-split selection over a worker's uv slice.
//!
//! Scans the dense L/R histogram buffer produced by
//! [`histogram::accumulate_uvt_lr_histograms`](super::histogram) and keeps
//! the (uv, threshold) combination with the strictly greatest information
//! gain. Iteration is uv-major, threshold-minor, and the comparison is
//! strict, so the first candidate found wins ties; the driver reads worker
//! results in ascending slice order for the same reason.

use super::histogram::{normalize_histogram, shannon_entropy, split_gain};
use super::InterruptFlag;

/// Best split found within one worker's uv slice.
#[derive(Clone, Copy, Debug, Default)]
pub struct SliceBest {
    /// Information gain; 0 means no usable split was found.
    pub gain: f32,
    /// Absolute index of the winning uv candidate.
    pub uv: usize,
    /// Index of the winning threshold.
    pub threshold: usize,
    /// Pixel counts of the would-be left and right children.
    pub n_l: u32,
    pub n_r: u32,
}

/// Scan `[uv_lo, uv_hi)` for the maximum-gain split.
///
/// `lr_histograms` is the worker's dense L/R buffer for the slice; `scratch`
/// must hold `n_labels` floats. Candidates whose left side is empty or
/// swallows the whole node separate nothing and are skipped.
#[allow(clippy::too_many_arguments)]
pub fn best_split_in_slice(
    root_entropy: f32,
    root_n: u32,
    n_labels: usize,
    n_thresholds: usize,
    uv_lo: usize,
    uv_hi: usize,
    lr_histograms: &[u32],
    scratch: &mut [f32],
    interrupt: &InterruptFlag,
) -> SliceBest {
    let mut best = SliceBest::default();
    let mut base = 0usize;

    'uv: for i in uv_lo..uv_hi {
        if interrupt.is_set() {
            break;
        }
        for j in 0..n_thresholds {
            if interrupt.is_set() {
                break 'uv;
            }

            let l_hist = &lr_histograms[base..base + n_labels];
            let (n_l, _) = normalize_histogram(l_hist, scratch);
            if n_l == 0 || n_l == root_n {
                base += n_labels * 2;
                continue;
            }
            let l_entropy = shannon_entropy(scratch);

            let r_hist = &lr_histograms[base + n_labels..base + n_labels * 2];
            let (n_r, _) = normalize_histogram(r_hist, scratch);
            let r_entropy = shannon_entropy(scratch);

            let gain = split_gain(root_entropy, root_n, l_entropy, n_l, r_entropy, n_r);
            if gain > best.gain {
                best = SliceBest {
                    gain,
                    uv: i,
                    threshold: j,
                    n_l,
                    n_r,
                };
            }

            base += n_labels * 2;
        }
    }

    best
}
