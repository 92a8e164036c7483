//! bodyparts: randomized decision tree training for body-part classification.
//!
//! This crate trains a complete binary decision tree that maps per-pixel depth
//! observations to discrete body-part labels, and evaluates forests of such
//! trees on new depth frames to produce per-pixel label probability vectors.
//!
//! # Key Types
//!
//! - [`Corpus`] - Aligned depth and label rasters used for training
//! - [`TrainParams`] / [`Trainer`] - Training configuration and driver
//! - [`RdTree`] - Packed breadth-first decision tree with leaf probability tables
//! - [`Forest`] - A set of trees evaluated together at inference time
//!
//! # Training
//!
//! Build a [`Corpus`] (from a frame index directory or in memory), configure
//! [`TrainParams`], then call [`Trainer::train`]. The result is an [`RdTree`]
//! that can be persisted via [`tree::io::write_tree`] and resumed from via the
//! checkpoint path.
//!
//! # Inference
//!
//! Load one or more trees with [`tree::io::read_tree`], wrap them in a
//! [`Forest`] and call [`Forest::infer_labels`] on a depth frame.

pub mod corpus;
pub mod infer;
pub mod props;
pub mod sampling;
pub mod train;
pub mod tree;
pub mod utils;

// High-level training types
pub use train::{
    Candidates, InterruptFlag, TrainError, TrainOutcome, TrainParams, Trainer, Verbosity,
};

// Data types
pub use corpus::{Corpus, CorpusError, DepthValue, DepthView};

// Tree representation and inference
pub use infer::{Forest, ForestError};
pub use tree::{Node, RdTree, UvPair};

// Shared utilities
pub use utils::resolve_parallel;
