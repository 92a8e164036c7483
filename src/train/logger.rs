//! Structured progress logging for training runs.
//!
//! The driver reports a line per depth transition with two elapsed timings
//! (since training began, since the previous transition) so long runs can be
//! monitored from the log alone. Verbose runs additionally log every node
//! decision.

use std::time::{Duration, Instant};

use log::{info, warn};

use crate::tree::UvPair;

/// Verbosity level for training output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// No progress output.
    Silent,
    /// Depth transitions and lifecycle messages.
    #[default]
    Info,
    /// Additionally log every node's split or leaf decision.
    Debug,
}

/// Format a duration as `HH:MM:SS`.
fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Tracks wall-clock timings and emits training progress.
pub struct TrainingLogger {
    verbosity: Verbosity,
    begin: Instant,
    last: Instant,
    last_depth: Option<usize>,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        let now = Instant::now();
        Self {
            verbosity,
            begin: now,
            last: now,
            last_depth: None,
        }
    }

    /// Stamped prefix `(since-begin / since-last)`, resetting the last mark.
    fn stamp(&mut self) -> String {
        let now = Instant::now();
        let line = format!(
            "({} / {})",
            format_elapsed(now - self.begin),
            format_elapsed(now - self.last)
        );
        self.last = now;
        line
    }

    pub fn begin_training(&self, n_images: usize, n_pixels: usize) {
        if self.verbosity >= Verbosity::Info {
            info!(
                "Beginning training over {n_images} images ({n_pixels} samples per image)"
            );
        }
    }

    /// Log a depth transition if `depth` differs from the previous node's.
    pub fn depth_transition(&mut self, depth: usize, queue_len: usize) {
        if self.last_depth == Some(depth) {
            return;
        }
        self.last_depth = Some(depth);
        if self.verbosity >= Verbosity::Info {
            let stamp = self.stamp();
            info!("{stamp} Training depth {} ({queue_len} nodes)", depth + 1);
        }
    }

    /// Log a chosen split, on verbose runs.
    pub fn split(&self, id: usize, gain: f32, uv: UvPair, t: f32) {
        if self.verbosity >= Verbosity::Debug {
            info!(
                "  Node ({id}): gain {gain:.6}, u ({:.3}, {:.3}), v ({:.3}, {:.3}), t {t:.6}",
                uv[0], uv[1], uv[2], uv[3]
            );
        }
    }

    /// Log a terminated leaf and its nonzero probabilities, on verbose runs.
    pub fn leaf(&self, id: usize, nhistogram: &[f32]) {
        if self.verbosity >= Verbosity::Debug {
            info!("  Leaf node ({id})");
            for (label, p) in nhistogram.iter().enumerate() {
                if *p > 0.0 {
                    info!("    {label:02} - {p:.6}");
                }
            }
        }
    }

    pub fn interrupted(&self) {
        if self.verbosity >= Verbosity::Info {
            warn!("Stopping training due to user-triggered interrupt");
        }
    }

    pub fn finish(&mut self, interrupted: bool) {
        if self.verbosity >= Verbosity::Info {
            let stamp = self.stamp();
            info!(
                "{stamp} {}",
                if interrupted { "Interrupted!" } else { "Done!" }
            );
        }
    }
}
