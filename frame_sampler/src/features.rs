//! Sparse binary features for comparing frames: FAST corners described by
//! 256 intensity comparisons around each corner, matched by Hamming
//! distance with a mutual-nearest-neighbour check.

use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};

/// Half-width of the patch sampled around a corner.
const PATCH_RADIUS: i32 = 15;
/// Corners closer than this to the border have no full patch.
const BORDER: u32 = 16;
const DESCRIPTOR_BITS: usize = 256;

pub type Descriptor = [u64; 4];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureParams {
    pub fast_threshold: u8,
    pub max_features: usize,
    pub blur_sigma: f32,
    /// Mutual matches farther apart than this are rejected; `u32::MAX`
    /// keeps every cross-checked match.
    pub max_hamming_distance: u32,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            max_features: 500,
            blur_sigma: 1.0,
            max_hamming_distance: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub x: u32,
    pub y: u32,
    pub descriptor: Descriptor,
}

type TestPair = ((i32, i32), (i32, i32));

pub struct FeatureExtractor {
    params: FeatureParams,
    pairs: Vec<TestPair>,
}

impl FeatureExtractor {
    pub fn new(params: FeatureParams) -> Self {
        Self {
            params,
            pairs: sampling_pattern(),
        }
    }

    pub fn detect(&self, gray: &GrayImage) -> Vec<Feature> {
        let (width, height) = gray.dimensions();
        if width <= 2 * BORDER || height <= 2 * BORDER {
            return Vec::new();
        }
        let smoothed = gaussian_blur_f32(gray, self.params.blur_sigma);

        let mut corners: Vec<_> = corners_fast9(gray, self.params.fast_threshold)
            .into_iter()
            .filter(|c| c.x >= BORDER && c.y >= BORDER && c.x < width - BORDER && c.y < height - BORDER)
            .collect();
        corners.sort_by(|a, b| b.score.total_cmp(&a.score).then((a.y, a.x).cmp(&(b.y, b.x))));
        corners.truncate(self.params.max_features);

        corners
            .into_iter()
            .map(|c| Feature {
                x: c.x,
                y: c.y,
                descriptor: self.describe(&smoothed, c.x as i32, c.y as i32),
            })
            .collect()
    }

    fn describe(&self, smoothed: &GrayImage, x: i32, y: i32) -> Descriptor {
        let mut descriptor = [0u64; 4];
        let at = |dx: i32, dy: i32| smoothed.get_pixel((x + dx) as u32, (y + dy) as u32)[0];
        for (bit, ((ax, ay), (bx, by))) in self.pairs.iter().enumerate() {
            if at(*ax, *ay) < at(*bx, *by) {
                descriptor[bit / 64] |= 1u64 << (bit % 64);
            }
        }
        descriptor
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureParams::default())
    }
}

/// Fixed pseudo-random test pairs inside the patch.
fn sampling_pattern() -> Vec<TestPair> {
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % (2 * PATCH_RADIUS as u64 + 1)) as i32 - PATCH_RADIUS
    };
    (0..DESCRIPTOR_BITS)
        .map(|_| ((next(), next()), (next(), next())))
        .collect()
}

pub fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Counts features of `current` whose nearest neighbour in `previous` also
/// has them as a nearest neighbour (ties count) within `max_distance`.
pub fn count_matches(current: &[Feature], previous: &[Feature], max_distance: u32) -> usize {
    if current.is_empty() || previous.is_empty() {
        return 0;
    }
    let distances: Vec<Vec<u32>> = current
        .iter()
        .map(|c| previous.iter().map(|p| hamming(&c.descriptor, &p.descriptor)).collect())
        .collect();
    let best_for_previous: Vec<u32> = (0..previous.len())
        .map(|j| distances.iter().map(|row| row[j]).min().unwrap_or(u32::MAX))
        .collect();

    distances
        .iter()
        .filter(|row| {
            let Some((j, &best)) = row.iter().enumerate().min_by_key(|(_, d)| **d) else {
                return false;
            };
            best <= max_distance && best == best_for_previous[j]
        })
        .count()
}
