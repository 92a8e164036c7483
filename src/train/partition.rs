//! Applying a chosen split to a node's pixel list.
//!
//! Once the driver settles on a (uv, threshold) pair the node's pixels are
//! routed into two child lists by re-measuring each pixel's gradient. The
//! re-measurement duplicates work the histogram pass already did, but it is
//! one gradient per pixel against the thousands evaluated per pixel during
//! candidate scoring, and it keeps the histogram buffers free of pixel
//! bookkeeping.

use crate::corpus::Corpus;
use crate::sampling::sample_uv;
use crate::tree::UvPair;

use super::PixelSample;

/// Split `pixels` into (left, right) lists under `(uv, t)`.
///
/// `hint` carries the child sizes the split scan counted, used to size the
/// output lists up front; `(0, 0)` is acceptable when unknown (the
/// checkpoint path) and falls back to the parent size.
pub fn partition_pixels(
    corpus: &Corpus,
    pixels: &[PixelSample],
    uv: UvPair,
    t: f32,
    hint: (usize, usize),
) -> (Vec<PixelSample>, Vec<PixelSample>) {
    let (hint_l, hint_r) = hint;
    let mut left = Vec::with_capacity(if hint_l > 0 { hint_l } else { pixels.len() });
    let mut right = Vec::with_capacity(if hint_r > 0 { hint_r } else { pixels.len() });

    let width = corpus.width();
    let bg_depth = corpus.bg_depth();

    for &pixel in pixels {
        let depth_image = corpus.depth_raster(pixel.image as usize);
        let depth = depth_image.at(pixel.y as usize * width + pixel.x as usize);
        let value = sample_uv(depth_image, pixel.x, pixel.y, depth, uv, bg_depth);

        if value < t {
            left.push(pixel);
        } else {
            right.push(pixel);
        }
    }

    (left, right)
}
