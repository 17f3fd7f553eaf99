use crate::config::VerificationConfig;
use crate::core::fingerprint::{FileRecord, FingerprintError};
use image::imageops::FilterType;
use image::{GrayImage, ImageReader};
use std::path::Path;

// SSIM stabilisers for 8-bit samples: (K1·L)² and (K2·L)².
const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

pub fn is_exact_match(a: &FileRecord, b: &FileRecord) -> bool {
    a.digest == b.digest
}

pub fn hamming_distance(a: &FileRecord, b: &FileRecord) -> u32 {
    a.phash.distance(&b.phash)
}

/// Scores how structurally alike two images are, in [0, 1].
pub trait StructuralScorer: Send + Sync {
    fn score(&self, a: &Path, b: &Path) -> Result<f64, FingerprintError>;
}

/// Windowed SSIM over grayscale images resized to a common square.
#[derive(Debug, Clone)]
pub struct StructuralSimilarity {
    resolution: u32,
    window: u32,
}

impl StructuralSimilarity {
    pub fn new(config: &VerificationConfig) -> Self {
        Self {
            resolution: config.resolution,
            window: config.window,
        }
    }

    fn load(&self, path: &Path) -> Result<GrayImage, FingerprintError> {
        let img = ImageReader::open(path)
            .map_err(|e| FingerprintError::unreadable(path, e))?
            .with_guessed_format()
            .map_err(|e| FingerprintError::unreadable(path, e))?
            .decode()
            .map_err(|e| FingerprintError::unreadable(path, e))?;
        Ok(img
            .resize_exact(self.resolution, self.resolution, FilterType::Triangle)
            .to_luma8())
    }
}

impl Default for StructuralSimilarity {
    fn default() -> Self {
        Self::new(&VerificationConfig::default())
    }
}

impl StructuralScorer for StructuralSimilarity {
    fn score(&self, a: &Path, b: &Path) -> Result<f64, FingerprintError> {
        let a = self.load(a)?;
        let b = self.load(b)?;
        Ok(ssim(&a, &b, self.window))
    }
}

/// Summed-area table with one row and column of zero padding.
struct Integral {
    width: usize,
    sums: Vec<f64>,
}

impl Integral {
    fn build(width: usize, height: usize, value: impl Fn(usize, usize) -> f64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += value(x, y);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { width, sums }
    }

    /// Sum over the `size`×`size` window whose top-left corner is (x, y).
    fn window(&self, x: usize, y: usize, size: usize) -> f64 {
        let stride = self.width + 1;
        let (x1, y1) = (x + size, y + size);
        self.sums[y1 * stride + x1] - self.sums[y * stride + x1] - self.sums[y1 * stride + x]
            + self.sums[y * stride + x]
    }
}

/// Mean SSIM over every `window`×`window` position, clamped to [0, 1].
/// Images of different sizes score 0.
pub fn ssim(a: &GrayImage, b: &GrayImage, window: u32) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 0.0;
    }
    let (width, height) = (a.width() as usize, a.height() as usize);
    let size = (window as usize).max(2);
    if width < size || height < size {
        return 0.0;
    }

    let pa = |x: usize, y: usize| a.get_pixel(x as u32, y as u32)[0] as f64;
    let pb = |x: usize, y: usize| b.get_pixel(x as u32, y as u32)[0] as f64;
    let sum_a = Integral::build(width, height, pa);
    let sum_b = Integral::build(width, height, pb);
    let sum_aa = Integral::build(width, height, |x, y| pa(x, y) * pa(x, y));
    let sum_bb = Integral::build(width, height, |x, y| pb(x, y) * pb(x, y));
    let sum_ab = Integral::build(width, height, |x, y| pa(x, y) * pb(x, y));

    let n = (size * size) as f64;
    let cov_norm = n / (n - 1.0);
    let mut total = 0.0;
    let mut windows = 0usize;

    for y in 0..=(height - size) {
        for x in 0..=(width - size) {
            let mu_a = sum_a.window(x, y, size) / n;
            let mu_b = sum_b.window(x, y, size) / n;
            let var_a = cov_norm * (sum_aa.window(x, y, size) / n - mu_a * mu_a);
            let var_b = cov_norm * (sum_bb.window(x, y, size) / n - mu_b * mu_b);
            let cov = cov_norm * (sum_ab.window(x, y, size) / n - mu_a * mu_b);

            let numerator = (2.0 * mu_a * mu_b + C1) * (2.0 * cov + C2);
            let denominator = (mu_a * mu_a + mu_b * mu_b + C1) * (var_a + var_b + C2);
            total += numerator / denominator;
            windows += 1;
        }
    }

    (total / windows as f64).clamp(0.0, 1.0)
}
