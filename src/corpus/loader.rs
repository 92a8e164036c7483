//! Directory ingest for training corpora.
//!
//! A corpus lives in a data directory next to a JSON index describing the
//! shared geometry and the frame list:
//!
//! ```json
//! {
//!   "width": 172,
//!   "height": 224,
//!   "vertical_fov": 1.3803,
//!   "n_labels": 34,
//!   "bg_label": 33,
//!   "frames": ["pose-0000", "pose-0001"]
//! }
//! ```
//!
//! Each frame stem names two raster files under the data directory:
//! `<stem>.depth` holds `width * height` little-endian half-precision
//! depths and `<stem>.labels` holds `width * height` label bytes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use half::f16;
use serde::Deserialize;
use thiserror::Error;

use super::Corpus;

/// Errors surfaced by corpus construction and ingest.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Reading the index or a raster file failed.
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The index file is not valid JSON for the expected schema.
    #[error("failed to parse index '{path}': {source}")]
    Index {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Width, height or field of view are unusable.
    #[error("invalid geometry {width}x{height} fov {fov}")]
    Geometry { width: usize, height: usize, fov: f32 },

    /// The label cardinality does not leave room for the background label.
    #[error("invalid label cardinality: n_labels {n_labels}, bg_label {bg_label}")]
    LabelCardinality { n_labels: u8, bg_label: u8 },

    /// Depth and label buffers disagree, or do not divide into frames.
    #[error(
        "raster sizes do not agree: {depth_len} depth values, {labels_len} labels, \
         {frame} pixels per frame"
    )]
    RasterSize {
        depth_len: usize,
        labels_len: usize,
        frame: usize,
    },

    /// A raster file holds the wrong number of pixels for the geometry.
    #[error("'{path}' holds {got} pixels, expected {expected}")]
    FrameSize {
        path: PathBuf,
        got: usize,
        expected: usize,
    },

    /// The corpus contains no frames.
    #[error("corpus contains no frames")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CorpusIndex {
    width: usize,
    height: usize,
    vertical_fov: f32,
    n_labels: u8,
    bg_label: u8,
    frames: Vec<String>,
}

fn read_file(path: &Path) -> Result<Vec<u8>, CorpusError> {
    fs::read(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(super) fn load(data_dir: &Path, index_name: &str) -> Result<Corpus, CorpusError> {
    let index_path = data_dir.join(format!("{index_name}.json"));
    let raw = read_file(&index_path)?;
    let index: CorpusIndex =
        serde_json::from_slice(&raw).map_err(|source| CorpusError::Index {
            path: index_path,
            source,
        })?;

    if index.frames.is_empty() {
        return Err(CorpusError::Empty);
    }

    let frame = index.width * index.height;
    let mut depth = Vec::with_capacity(frame * index.frames.len());
    let mut labels = Vec::with_capacity(frame * index.frames.len());

    for stem in &index.frames {
        let depth_path = data_dir.join(format!("{stem}.depth"));
        let bytes = read_file(&depth_path)?;
        if bytes.len() != frame * 2 {
            return Err(CorpusError::FrameSize {
                path: depth_path,
                got: bytes.len() / 2,
                expected: frame,
            });
        }
        depth.extend(
            bytes
                .chunks_exact(2)
                .map(|b| f16::from_bits(u16::from_le_bytes([b[0], b[1]]))),
        );

        let labels_path = data_dir.join(format!("{stem}.labels"));
        let bytes = read_file(&labels_path)?;
        if bytes.len() != frame {
            return Err(CorpusError::FrameSize {
                path: labels_path,
                got: bytes.len(),
                expected: frame,
            });
        }
        labels.extend_from_slice(&bytes);
    }

    Corpus::from_parts(
        index.width,
        index.height,
        index.vertical_fov,
        index.n_labels,
        index.bg_label,
        depth,
        labels,
    )
}
