//! Depth-gradient probe shared by training, partitioning and inference.
//!
//! Every split decision in a tree is driven by the same measurement: two
//! depth readings taken at uv offsets around a pixel, divided by the pixel's
//! own depth so the probe pattern is scale-invariant, with their difference
//! (the gradient) compared against the node's threshold.

use crate::corpus::{DepthValue, DepthView};
use crate::tree::UvPair;

/// Measure the depth gradient for pixel `(x, y)` at depth `d` under `uv`.
///
/// Probe coordinates are `(x + ux/d, y + uy/d)` and `(x + vx/d, y + vy/d)`,
/// truncated toward zero to integer pixels. A probe outside the frame reads
/// `bg_depth`. Returns `depth(U) - depth(V)` in meters.
#[inline]
pub fn sample_uv<D: DepthValue>(
    depth: DepthView<'_, D>,
    x: i32,
    y: i32,
    d: f32,
    uv: UvPair,
    bg_depth: f32,
) -> f32 {
    let width = depth.width() as i32;
    let height = depth.height() as i32;

    let ux = (x as f32 + uv[0] / d) as i32;
    let uy = (y as f32 + uv[1] / d) as i32;
    let vx = (x as f32 + uv[2] / d) as i32;
    let vy = (y as f32 + uv[3] / d) as i32;

    let upixel = if ux >= 0 && ux < width && uy >= 0 && uy < height {
        depth.get(ux as usize, uy as usize)
    } else {
        bg_depth
    };
    let vpixel = if vx >= 0 && vx < width && vy >= 0 && vy < height {
        depth.get(vx as usize, vy as usize)
    } else {
        bg_depth
    };

    upixel - vpixel
}

/// Negate the x components of a uv pair, for horizontally flipped evaluation.
#[inline]
pub fn flip_uv(uv: UvPair) -> UvPair {
    [-uv[0], uv[1], -uv[2], uv[3]]
}
