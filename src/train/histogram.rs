//! Label histogram accumulation, entropy and information gain.
//!
//! For one node and one worker's slice of the uv candidate axis this module
//! fills two accumulators in a single pass over the node's pixels:
//!
//! - the root histogram: label counts over the whole pixel set
//! - the L/R buffer: for every (uv, threshold) combination in the slice, the
//!   label counts of the would-be left and right children
//!
//! The L/R buffer is a dense 3D block laid out `[uv - uv_lo][threshold][2 *
//! n_labels]`, left counts first. The gradient for a (pixel, uv) pair is
//! measured once and reused across all thresholds.

use crate::corpus::Corpus;
use crate::sampling::sample_uv;

use super::{Candidates, InterruptFlag, PixelSample};

/// Number of `u32` slots a worker's L/R buffer needs for a uv slice.
#[inline]
pub fn lr_buffer_len(slice_len: usize, n_thresholds: usize, n_labels: usize) -> usize {
    slice_len * n_thresholds * 2 * n_labels
}

/// Normalize a label histogram into probabilities.
///
/// Returns `(total pixel count, number of labels present)`. An empty
/// histogram zero-fills the output.
pub fn normalize_histogram(histogram: &[u32], normalized: &mut [f32]) -> (u32, u32) {
    let mut total = 0u32;
    let mut present = 0u32;
    for &count in histogram {
        if count > 0 {
            total += count;
            present += 1;
        }
    }

    if total > 0 {
        for (out, &count) in normalized.iter_mut().zip(histogram) {
            *out = count as f32 / total as f32;
        }
    } else {
        normalized.fill(0.0);
    }

    (total, present)
}

/// Shannon entropy of a normalized histogram, in bits.
pub fn shannon_entropy(normalized: &[f32]) -> f32 {
    let mut entropy = 0.0f32;
    for &value in normalized {
        if value > 0.0 && value < 1.0 {
            entropy -= value * value.log2();
        }
    }
    entropy
}

/// Information gain of splitting `n` pixels with entropy `entropy` into the
/// given left/right partitions.
#[inline]
pub fn split_gain(
    entropy: f32,
    n: u32,
    l_entropy: f32,
    n_l: u32,
    r_entropy: f32,
    n_r: u32,
) -> f32 {
    entropy
        - ((n_l as f32 / n as f32 * l_entropy) + (n_r as f32 / n as f32 * r_entropy))
}

/// Accumulate the root histogram and, below the last trainable depth, the
/// L/R histograms for `[uv_lo, uv_hi)`.
///
/// `root_histogram` must hold `n_labels` zeroed slots and `lr_histograms`
/// [`lr_buffer_len`] zeroed slots. The interrupt flag is polled per pixel;
/// an interrupted pass leaves the accumulators partially filled, which is
/// fine because the driver discards the node afterwards.
#[allow(clippy::too_many_arguments)]
pub fn accumulate_uvt_lr_histograms(
    corpus: &Corpus,
    candidates: &Candidates,
    pixels: &[PixelSample],
    node_depth: usize,
    max_depth: usize,
    uv_lo: usize,
    uv_hi: usize,
    root_histogram: &mut [u32],
    lr_histograms: &mut [u32],
    interrupt: &InterruptFlag,
) {
    let n_labels = corpus.n_labels() as usize;
    let n_thresholds = candidates.n_thresholds();
    let bg_depth = corpus.bg_depth();

    let mut samples = vec![0.0f32; uv_hi - uv_lo];

    for pixel in pixels {
        if interrupt.is_set() {
            break;
        }

        let image = pixel.image as usize;
        let depth_image = corpus.depth_raster(image);
        let labels = corpus.label_raster(image);

        let pixel_idx = pixel.y as usize * corpus.width() + pixel.x as usize;
        let label = labels[pixel_idx] as usize;
        let depth = depth_image.at(pixel_idx);

        assert!(
            label < n_labels,
            "Label '{label}' is bigger than expected (max {})",
            n_labels - 1
        );

        root_histogram[label] += 1;

        // The last depth never splits; skip the candidate pass entirely.
        if node_depth >= max_depth - 1 {
            continue;
        }

        for (s, c) in samples.iter_mut().zip(uv_lo..uv_hi) {
            *s = sample_uv(
                depth_image,
                pixel.x,
                pixel.y,
                depth,
                candidates.uvs[c],
                bg_depth,
            );
        }

        let mut lr_idx = 0;
        for &sample in &samples {
            for &threshold in &candidates.thresholds {
                let slot = if sample < threshold {
                    lr_idx + label
                } else {
                    lr_idx + n_labels + label
                };
                lr_histograms[slot] += 1;
                lr_idx += n_labels * 2;
            }
        }
        debug_assert_eq!(lr_idx, lr_buffer_len(uv_hi - uv_lo, n_thresholds, n_labels));
    }
}
