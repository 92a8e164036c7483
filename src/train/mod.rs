//! Decision tree training.
//!
//! The trainer expands a breadth-first queue of nodes over a fixed candidate
//! space of (uv offset pair, threshold) splits, selecting the maximum
//! information gain split at every node and recording leaf label
//! distributions when no split is worth taking:
//!
//! - [`candidates`]: the fixed uv/threshold candidate space
//! - [`sampler`]: reproducible in-body pixel sampling
//! - [`histogram`]: label histogram accumulation, entropy and gain
//! - [`split`]: best-split scan over a worker's uv slice
//! - [`partition`]: applying a chosen split to a node's pixel list
//! - `driver`: the worker pool and breadth-first node loop
//! - [`checkpoint`]: resuming a partially trained tree
//!
//! Entry point: [`Trainer`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::corpus::Corpus;
use crate::tree::{RdTree, MAX_TREE_DEPTH};

pub mod candidates;
pub mod checkpoint;
mod driver;
pub mod histogram;
mod logger;
pub mod partition;
pub mod sampler;
pub mod split;

pub use candidates::Candidates;
pub use checkpoint::CheckpointError;
pub use logger::{TrainingLogger, Verbosity};
pub use sampler::PixelSample;

// =============================================================================
// TrainParams
// =============================================================================

/// Parameters for a training run.
#[derive(Clone, Debug)]
pub struct TrainParams {
    /// Number of pixels to sample per training image.
    pub n_pixels: usize,
    /// Number of thresholds to test per uv candidate.
    pub n_thresholds: usize,
    /// Range of thresholds to test, in meters.
    pub threshold_range: f32,
    /// Number of uv offset pairs to test.
    pub n_uv: usize,
    /// Range of uv offsets to generate, in meters.
    pub uv_range: f32,
    /// Maximum depth to train to (1..=30).
    pub max_depth: usize,
    /// Seed for candidate and pixel sampling RNGs.
    pub seed: u64,
    /// Worker thread count; 0 selects hardware concurrency. Capped at 128.
    pub n_threads: usize,
    /// Progress output level.
    pub verbosity: Verbosity,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            n_pixels: 2000,
            n_thresholds: 50,
            threshold_range: 1.29,
            n_uv: 2000,
            uv_range: 1.29,
            max_depth: 20,
            seed: 0,
            n_threads: 0,
            verbosity: Verbosity::default(),
        }
    }
}

impl TrainParams {
    /// Check every knob against its legal range.
    pub fn validate(&self) -> Result<(), ParamValidationError> {
        if self.n_pixels == 0 {
            return Err(ParamValidationError::InvalidNPixels(self.n_pixels));
        }
        // Threshold spacing divides by n_thresholds - 1; a single threshold
        // is ill-defined.
        if self.n_thresholds < 2 {
            return Err(ParamValidationError::InvalidNThresholds(self.n_thresholds));
        }
        if !(self.threshold_range > 0.0) {
            return Err(ParamValidationError::InvalidThresholdRange(
                self.threshold_range,
            ));
        }
        if self.n_uv == 0 {
            return Err(ParamValidationError::InvalidNUv(self.n_uv));
        }
        if !(self.uv_range > 0.0) {
            return Err(ParamValidationError::InvalidUvRange(self.uv_range));
        }
        if self.max_depth < 1 || self.max_depth > MAX_TREE_DEPTH {
            return Err(ParamValidationError::InvalidMaxDepth(self.max_depth));
        }
        if self.n_threads > 128 {
            return Err(ParamValidationError::InvalidNThreads(self.n_threads));
        }
        Ok(())
    }

    /// Worker count after resolving the 0 = hardware concurrency convention.
    pub(crate) fn resolved_threads(&self) -> usize {
        let n = if self.n_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.n_threads
        };
        n.clamp(1, 128)
    }
}

/// Parameter bound violations, reported at configuration time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamValidationError {
    #[error("n_pixels must be >= 1, got {0}")]
    InvalidNPixels(usize),

    #[error("n_thresholds must be >= 2, got {0}")]
    InvalidNThresholds(usize),

    #[error("threshold_range must be > 0, got {0}")]
    InvalidThresholdRange(f32),

    #[error("n_uv must be >= 1, got {0}")]
    InvalidNUv(usize),

    #[error("uv_range must be > 0, got {0}")]
    InvalidUvRange(f32),

    #[error("max_depth must be in 1..=30, got {0}")]
    InvalidMaxDepth(usize),

    #[error("n_threads must be <= 128, got {0}")]
    InvalidNThreads(usize),
}

// =============================================================================
// InterruptFlag
// =============================================================================

/// Cooperative cancellation flag shared by the driver and its workers.
///
/// Typically wired to SIGINT by the calling binary. Workers poll it inside
/// their per-pixel loops so even a large node can be abandoned promptly; the
/// driver polls it between nodes and then serializes whatever is complete.
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from a signal handler closure.
    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Trainer
// =============================================================================

/// Errors terminating a training run before a tree is produced.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Params(#[from] ParamValidationError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("failed to start worker threads: {0}")]
    ThreadSpawn(#[from] rayon::ThreadPoolBuildError),
}

/// Result of a completed or interrupted training run.
#[derive(Debug)]
pub struct TrainOutcome {
    /// The packed tree; partially trained slots carry the untrained
    /// sentinel when the run was interrupted.
    pub tree: RdTree,
    /// Whether the run stopped on the interrupt flag rather than draining
    /// the node queue.
    pub interrupted: bool,
}

/// Trains randomized decision trees over a corpus.
pub struct Trainer {
    params: TrainParams,
    interrupt: InterruptFlag,
}

impl Trainer {
    /// Create a trainer with validated parameters.
    pub fn new(params: TrainParams) -> Result<Self, ParamValidationError> {
        params.validate()?;
        Ok(Self {
            params,
            interrupt: InterruptFlag::new(),
        })
    }

    pub fn params(&self) -> &TrainParams {
        &self.params
    }

    /// Handle for requesting cancellation of a running `train` call.
    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Train a tree over `corpus`, optionally resuming from a checkpoint.
    ///
    /// The candidate space is regenerated from the seed; a resumed run must
    /// use the same seed and candidate knobs as the original for stored
    /// splits to stay meaningful.
    pub fn train(
        &self,
        corpus: &Corpus,
        checkpoint: Option<&RdTree>,
    ) -> Result<TrainOutcome, TrainError> {
        let candidates = Candidates::generate(&self.params, corpus.fov(), corpus.height());
        self.train_with_candidates(corpus, &candidates, checkpoint)
    }

    /// Train with an explicit candidate space.
    ///
    /// Useful for deterministic setups where the uv pairs and thresholds are
    /// fixed by hand rather than drawn from the seed.
    pub fn train_with_candidates(
        &self,
        corpus: &Corpus,
        candidates: &Candidates,
        checkpoint: Option<&RdTree>,
    ) -> Result<TrainOutcome, TrainError> {
        driver::train_tree(&self.params, corpus, candidates, checkpoint, &self.interrupt)
    }
}
