//! Reproducible in-body pixel sampling.
//!
//! Training never looks at every pixel: each image contributes a fixed
//! number of randomly chosen pixels from inside the body silhouette. The
//! draw deliberately permits duplicates. Rejecting them would skew the
//! sample count toward poses that fill more of the frame, and training
//! should spend roughly the same effort on every pose regardless of body
//! size or distance from the camera.

use log::warn;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::corpus::Corpus;

/// One sampled training pixel: coordinates plus the owning image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelSample {
    pub x: i32,
    pub y: i32,
    pub image: u32,
}

/// Draw `n_pixels` in-body samples from every image of the corpus.
///
/// The returned list is the root node's pixel set, ordered image-major with
/// each image's samples sorted by raster offset (a cache-friendliness
/// measure only). Images whose silhouette is empty contribute nothing.
///
/// # Panics
///
/// Panics if a label raster carries a value at or above the corpus label
/// count; that is corpus corruption, not a recoverable condition.
pub fn sample_training_pixels(corpus: &Corpus, n_pixels: usize, seed: u64) -> Vec<PixelSample> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let width = corpus.width();
    let height = corpus.height();
    let n_labels = corpus.n_labels();
    let bg_label = corpus.bg_label();

    let mut pixels = Vec::with_capacity(corpus.n_images() * n_pixels);
    let mut in_body = Vec::with_capacity(width * height);
    let mut chosen = Vec::with_capacity(n_pixels);

    for i in 0..corpus.n_images() {
        let labels = corpus.label_raster(i);

        // The tracking system segments the body from the background before
        // labelling, so only pixels inside the silhouette are classification
        // targets.
        in_body.clear();
        for (off, &label) in labels.iter().enumerate() {
            assert!(
                label < n_labels,
                "Label '{label}' is bigger than expected (max {})",
                n_labels - 1
            );
            if label != bg_label {
                in_body.push(off);
            }
        }

        if in_body.is_empty() {
            warn!("image {i} has no in-body pixels, skipping");
            continue;
        }

        let n_body = in_body.len();
        chosen.clear();
        for _ in 0..n_pixels {
            let idx = (rng.gen::<f32>() * n_body as f32) as usize;
            chosen.push(idx.min(n_body - 1));
        }
        chosen.sort_unstable();

        for &idx in &chosen {
            let off = in_body[idx];
            pixels.push(PixelSample {
                x: (off % width) as i32,
                y: (off / width) as i32,
                image: i as u32,
            });
        }
    }

    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;

    fn corpus_with_labels(width: usize, height: usize, labels: Vec<u8>) -> Corpus {
        let depth = vec![f16::from_f32(1.0); labels.len()];
        Corpus::from_parts(width, height, 1.0, 3, 2, depth, labels).unwrap()
    }

    #[test]
    fn sampling_is_reproducible() {
        let labels = vec![0u8; 64];
        let corpus = corpus_with_labels(8, 8, labels);
        let a = sample_training_pixels(&corpus, 32, 0);
        let b = sample_training_pixels(&corpus, 32, 0);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn background_pixels_are_never_sampled() {
        // Single in-body pixel at (1, 2) in a 4x4 background frame.
        let mut labels = vec![2u8; 16];
        labels[2 * 4 + 1] = 0;
        let corpus = corpus_with_labels(4, 4, labels);

        let pixels = sample_training_pixels(&corpus, 10, 0);
        assert_eq!(pixels.len(), 10);
        for p in pixels {
            assert_eq!((p.x, p.y, p.image), (1, 2, 0));
        }
    }

    #[test]
    fn samples_are_sorted_within_an_image() {
        let labels = vec![0u8; 64];
        let corpus = corpus_with_labels(8, 8, labels);
        let pixels = sample_training_pixels(&corpus, 64, 3);
        for w in pixels.windows(2) {
            let off_a = w[0].y * 8 + w[0].x;
            let off_b = w[1].y * 8 + w[1].x;
            assert!(off_a <= off_b);
        }
    }

    #[test]
    fn empty_images_are_skipped() {
        // First frame all background, second frame all body.
        let mut labels = vec![2u8; 16];
        labels.extend(vec![1u8; 16]);
        let depth = vec![f16::from_f32(1.0); 32];
        let corpus = Corpus::from_parts(4, 4, 1.0, 3, 2, depth, labels).unwrap();

        let pixels = sample_training_pixels(&corpus, 5, 0);
        assert_eq!(pixels.len(), 5);
        assert!(pixels.iter().all(|p| p.image == 1));
    }

    #[test]
    #[should_panic(expected = "bigger than expected")]
    fn out_of_range_label_is_fatal() {
        let mut labels = vec![0u8; 16];
        labels[3] = 7;
        let corpus = corpus_with_labels(4, 4, labels);
        let _ = sample_training_pixels(&corpus, 4, 0);
    }
}
