//! Tree persistence: the binary RDT container and its JSON mirror.
//!
//! # Container layout
//!
//! ```text
//! Offset  Size        Field
//! ------  ----        -----
//! 0       3           Magic ("RDT")
//! 3       1           Format version
//! 4       1           Tree depth
//! 5       1           Label count
//! 6       1           Background label
//! 7       4           Vertical field of view (f32, little-endian)
//! 11      24 * nodes  Packed node array (uv[4] f32, t f32, label_pr_idx u32)
//! ...     to EOF      Probability table flat buffer (f32)
//! ```
//!
//! The node array holds `2^depth - 1` slots in breadth-first order,
//! including untrained sentinel slots, which is what makes the container
//! usable as a training checkpoint.
//!
//! The JSON mirror is write-only and mirrors the reachable tree as nested
//! objects: interior nodes carry `t`, `u`, `v` and children `l`/`r`; leaves
//! carry their probability array `p`. Checkpoints always resume from the
//! binary container.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::json;
use thiserror::Error;

use super::{n_nodes_for_depth, left_child, right_child, Node, RdTree, MAX_TREE_DEPTH};

/// Magic bytes identifying an RDT container.
pub const RDT_MAGIC: [u8; 3] = *b"RDT";

/// Current container format version.
pub const RDT_VERSION: u8 = 1;

const HEADER_SIZE: usize = 11;
const NODE_SIZE: usize = 24;

/// Errors surfaced by tree persistence.
#[derive(Debug, Error)]
pub enum TreeIoError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{path}' is not an RDT container")]
    BadMagic { path: PathBuf },

    #[error("unsupported RDT version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("stored depth {depth} outside 1..={MAX_TREE_DEPTH}")]
    BadDepth { depth: u8 },

    #[error("stored label count is zero")]
    NoLabels,

    #[error("container is truncated: expected {expected} bytes of nodes")]
    Truncated { expected: usize },

    #[error("probability buffer does not divide into {n_labels}-float tables")]
    BadTableBuffer { n_labels: u8 },

    #[error("failed to serialize JSON mirror: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Binary container
// =============================================================================

/// Serialize a tree to the binary RDT container.
pub fn write_tree_binary(tree: &RdTree, path: &Path) -> Result<(), TreeIoError> {
    let mut buf =
        Vec::with_capacity(HEADER_SIZE + tree.n_nodes() * NODE_SIZE + tree.pr_tables_flat().len() * 4);

    buf.extend_from_slice(&RDT_MAGIC);
    buf.push(RDT_VERSION);
    buf.push(tree.depth());
    buf.push(tree.n_labels());
    buf.push(tree.bg_label());
    buf.extend_from_slice(&tree.fov().to_le_bytes());

    for node in tree.nodes() {
        for c in node.uv {
            buf.extend_from_slice(&c.to_le_bytes());
        }
        buf.extend_from_slice(&node.t.to_le_bytes());
        buf.extend_from_slice(&node.label_pr_idx.to_le_bytes());
    }

    for p in tree.pr_tables_flat() {
        buf.extend_from_slice(&p.to_le_bytes());
    }

    fs::write(path, buf).map_err(|source| TreeIoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a tree from the binary RDT container.
///
/// The runtime background depth cutoff is not part of the container and is
/// restored to its default; adjust with [`RdTree::with_bg_depth`] if needed.
pub fn read_tree(path: &Path) -> Result<RdTree, TreeIoError> {
    let buf = fs::read(path).map_err(|source| TreeIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if buf.len() < HEADER_SIZE || buf[..3] != RDT_MAGIC {
        return Err(TreeIoError::BadMagic {
            path: path.to_path_buf(),
        });
    }
    let version = buf[3];
    if version != RDT_VERSION {
        return Err(TreeIoError::UnsupportedVersion { version });
    }
    let depth = buf[4];
    if depth < 1 || depth as usize > MAX_TREE_DEPTH {
        return Err(TreeIoError::BadDepth { depth });
    }
    let n_labels = buf[5];
    if n_labels == 0 {
        return Err(TreeIoError::NoLabels);
    }
    let bg_label = buf[6];
    let fov = f32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]);

    let n_nodes = n_nodes_for_depth(depth as usize);
    let nodes_end = HEADER_SIZE + n_nodes * NODE_SIZE;
    if buf.len() < nodes_end {
        return Err(TreeIoError::Truncated {
            expected: n_nodes * NODE_SIZE,
        });
    }

    let mut nodes = Vec::with_capacity(n_nodes);
    for raw in buf[HEADER_SIZE..nodes_end].chunks_exact(NODE_SIZE) {
        let f = |i: usize| f32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        nodes.push(Node {
            uv: [f(0), f(4), f(8), f(12)],
            t: f(16),
            label_pr_idx: u32::from_le_bytes([raw[20], raw[21], raw[22], raw[23]]),
        });
    }

    let table_bytes = &buf[nodes_end..];
    if table_bytes.len() % (4 * n_labels as usize) != 0 {
        return Err(TreeIoError::BadTableBuffer { n_labels });
    }
    let pr_tables: Vec<f32> = table_bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(RdTree::new(depth, n_labels, bg_label, fov, nodes, pr_tables))
}

// =============================================================================
// JSON mirror
// =============================================================================

fn node_to_json(tree: &RdTree, id: usize, depth: usize) -> serde_json::Value {
    let node = tree.node(id);

    if node.is_untrained() {
        // Partial trees: nothing to mirror for a slot training never reached.
        return json!({});
    }

    if node.is_interior() {
        let mut obj = json!({
            "t": node.t,
            "u": [node.uv[0], node.uv[1]],
            "v": [node.uv[2], node.uv[3]],
        });
        if depth < tree.depth() as usize - 1 {
            obj["l"] = node_to_json(tree, left_child(id), depth + 1);
            obj["r"] = node_to_json(tree, right_child(id), depth + 1);
        }
        obj
    } else {
        json!({ "p": tree.pr_table(node.label_pr_idx) })
    }
}

/// Serialize a tree to the pretty-printed JSON mirror.
pub fn write_tree_json(tree: &RdTree, path: &Path) -> Result<(), TreeIoError> {
    let root = json!({
        "version": RDT_VERSION,
        "depth": tree.depth(),
        "vertical_fov": tree.fov(),
        "n_labels": tree.n_labels(),
        "bg_label": tree.bg_label(),
        "root": node_to_json(tree, 0, 0),
    });

    let text = serde_json::to_string_pretty(&root)?;
    fs::write(path, text).map_err(|source| TreeIoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a tree, dispatching on the file extension: `.json` selects the
/// textual mirror, anything else the binary container.
pub fn write_tree(tree: &RdTree, path: &Path) -> Result<(), TreeIoError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => write_tree_json(tree, path),
        _ => write_tree_binary(tree, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::UNTRAINED_IDX;

    fn sample_tree() -> RdTree {
        // Depth 2: interior root, two leaves.
        let mut nodes = vec![Node::untrained(); 3];
        nodes[0] = Node {
            uv: [4.0, -1.5, -4.0, 2.5],
            t: 0.25,
            label_pr_idx: 0,
        };
        nodes[1].label_pr_idx = 1;
        nodes[2].label_pr_idx = 2;
        RdTree::new(
            2,
            3,
            2,
            1.2,
            nodes,
            vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        )
    }

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("bodyparts-io-{tag}-{}.rdt", std::process::id()))
    }

    #[test]
    fn binary_roundtrip_preserves_everything() {
        let tree = sample_tree();
        let path = temp_path("roundtrip");
        write_tree(&tree, &path).unwrap();

        let loaded = read_tree(&path).unwrap();
        assert_eq!(loaded.depth(), tree.depth());
        assert_eq!(loaded.n_labels(), tree.n_labels());
        assert_eq!(loaded.bg_label(), tree.bg_label());
        assert_eq!(loaded.fov(), tree.fov());
        assert_eq!(loaded.nodes(), tree.nodes());
        assert_eq!(loaded.pr_tables_flat(), tree.pr_tables_flat());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn binary_roundtrip_keeps_untrained_sentinels() {
        let nodes = vec![Node::untrained(); 7];
        let tree = RdTree::new(3, 4, 3, 0.9, nodes, Vec::new());
        let path = temp_path("sentinels");
        write_tree_binary(&tree, &path).unwrap();

        let loaded = read_tree(&path).unwrap();
        assert!(loaded
            .nodes()
            .iter()
            .all(|n| n.label_pr_idx == UNTRAINED_IDX));
        assert_eq!(loaded.n_pr_tables(), 0);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn garbage_file_is_rejected() {
        let path = temp_path("garbage");
        fs::write(&path, b"not a tree").unwrap();
        assert!(matches!(
            read_tree(&path),
            Err(TreeIoError::BadMagic { .. })
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn truncated_node_array_is_rejected() {
        let tree = sample_tree();
        let path = temp_path("truncated");
        write_tree_binary(&tree, &path).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        bytes.truncate(HEADER_SIZE + NODE_SIZE);
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            read_tree(&path),
            Err(TreeIoError::Truncated { .. })
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn json_mirror_shape() {
        let tree = sample_tree();
        let path = std::env::temp_dir().join(format!(
            "bodyparts-io-mirror-{}.json",
            std::process::id()
        ));
        write_tree(&tree, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["depth"], 2);
        assert_eq!(value["n_labels"], 3);
        assert_eq!(value["bg_label"], 2);
        let root = &value["root"];
        assert!(root["t"].is_number());
        assert_eq!(root["u"].as_array().unwrap().len(), 2);
        assert_eq!(root["l"]["p"].as_array().unwrap().len(), 3);
        assert_eq!(root["r"]["p"][1], 1.0);

        let _ = fs::remove_file(&path);
    }
}
