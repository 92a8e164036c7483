//! The fixed candidate space tested at every node.
//!
//! A training run evaluates the same uv offset pairs and thresholds at every
//! node. Both sets are drawn once up front from the run's seed, so a resumed
//! run with identical knobs regenerates them bit for bit.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::tree::UvPair;

use super::TrainParams;

/// The uv offset pairs and thresholds evaluated at every node.
#[derive(Clone, Debug)]
pub struct Candidates {
    /// Offset pairs in depth-scaled pixel units.
    pub uvs: Vec<UvPair>,
    /// Gradient thresholds in meters, ascending.
    pub thresholds: Vec<f32>,
}

impl Candidates {
    /// Build a candidate space from explicit values.
    pub fn new(uvs: Vec<UvPair>, thresholds: Vec<f32>) -> Self {
        Self { uvs, thresholds }
    }

    /// Draw the candidate space for a run.
    ///
    /// uv components are uniform over `±(uv_range * ppm) / 2` where
    /// `ppm = (height / 2) / tan(fov / 2)` converts the configured range
    /// from meters to pixel units at one meter of depth. Thresholds are
    /// evenly spaced over `±threshold_range / 2`.
    pub fn generate(params: &TrainParams, fov: f32, height: usize) -> Self {
        let ppm = (height as f32 / 2.0) / (fov / 2.0).tan();
        let uv_range = params.uv_range * ppm;
        let half = uv_range / 2.0;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
        let mut uvs = Vec::with_capacity(params.n_uv);
        for _ in 0..params.n_uv {
            uvs.push([
                rng.gen_range(-half..half),
                rng.gen_range(-half..half),
                rng.gen_range(-half..half),
                rng.gen_range(-half..half),
            ]);
        }

        let step = params.threshold_range / (params.n_thresholds - 1) as f32;
        let thresholds = (0..params.n_thresholds)
            .map(|i| -params.threshold_range / 2.0 + i as f32 * step)
            .collect();

        Self { uvs, thresholds }
    }

    #[inline]
    pub fn n_uv(&self) -> usize {
        self.uvs.len()
    }

    #[inline]
    pub fn n_thresholds(&self) -> usize {
        self.thresholds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn params(n_uv: usize, n_thresholds: usize, seed: u64) -> TrainParams {
        TrainParams {
            n_uv,
            n_thresholds,
            seed,
            ..Default::default()
        }
    }

    #[test]
    fn generation_is_reproducible() {
        let p = params(64, 10, 7);
        let a = Candidates::generate(&p, 1.0, 480);
        let b = Candidates::generate(&p, 1.0, 480);
        assert_eq!(a.uvs, b.uvs);
        assert_eq!(a.thresholds, b.thresholds);
    }

    #[test]
    fn different_seeds_differ() {
        let a = Candidates::generate(&params(16, 5, 0), 1.0, 480);
        let b = Candidates::generate(&params(16, 5, 1), 1.0, 480);
        assert_ne!(a.uvs, b.uvs);
    }

    #[test]
    fn uv_components_respect_scaled_range() {
        let p = TrainParams {
            n_uv: 256,
            uv_range: 0.5,
            ..Default::default()
        };
        // fov of pi/2 over height 8 gives ppm = 4.
        let cands = Candidates::generate(&p, std::f32::consts::FRAC_PI_2, 8);
        let half = 0.5 * 4.0 / 2.0;
        for uv in &cands.uvs {
            for c in uv {
                assert!(c.abs() <= half, "component {c} outside ±{half}");
            }
        }
    }

    #[test]
    fn thresholds_are_evenly_spaced_and_symmetric() {
        let p = params(1, 5, 0);
        let cands = Candidates::generate(&p, 1.0, 480);
        assert_eq!(cands.n_thresholds(), 5);
        assert_abs_diff_eq!(cands.thresholds[0], -1.29 / 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(cands.thresholds[4], 1.29 / 2.0, epsilon = 1e-6);
        let step = cands.thresholds[1] - cands.thresholds[0];
        for w in cands.thresholds.windows(2) {
            assert_abs_diff_eq!(w[1] - w[0], step, epsilon = 1e-6);
        }
        // A middle value straddles zero for odd counts.
        assert_abs_diff_eq!(cands.thresholds[2], 0.0, epsilon = 1e-6);
    }
}
