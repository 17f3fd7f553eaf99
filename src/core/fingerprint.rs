use crate::core::audit::SkippedFile;
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageReader};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unreadable image {path}: {reason}")]
    UnreadableImage { path: String, reason: String },
}

impl FingerprintError {
    pub fn unreadable(path: &Path, reason: impl fmt::Display) -> Self {
        FingerprintError::UnreadableImage {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        FingerprintError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// BLAKE3 digest of the raw file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Digest(*blake3::hash(bytes).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }

    /// First 12 hex digits, enough to tell digests apart in a report.
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// 64-bit mean hash: bit `i` is set when sample `i` of the 8×8 grayscale
/// thumbnail is strictly brighter than the thumbnail's mean. See
/// [`mean_hash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub digest: Digest,
    pub phash: PerceptualHash,
    pub modified: Option<SystemTime>,
}

/// Side of the grayscale thumbnail the mean hash is taken over.
const HASH_SIDE: u32 = 8;

/// Mean hash of `gray`: shrink to 8×8, then set bit `i` (row-major, most
/// significant bit first) when sample `i` is strictly above the mean.
pub fn mean_hash(gray: &GrayImage) -> PerceptualHash {
    let thumb = imageops::resize(gray, HASH_SIDE, HASH_SIDE, FilterType::Triangle);
    let samples: Vec<f64> = thumb.pixels().map(|p| f64::from(p.0[0])).collect();
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;

    let mut bits = 0u64;
    for (i, sample) in samples.iter().enumerate() {
        if *sample > mean {
            bits |= 1 << (63 - i);
        }
    }
    PerceptualHash(bits)
}

/// Computes digests and perceptual hashes. Holds no per-file state, so one
/// instance is shared across the rayon pool.
#[derive(Debug, Default)]
pub struct Fingerprinter;

impl Fingerprinter {
    pub fn new() -> Self {
        Self
    }

    pub fn fingerprint(&self, path: &Path) -> Result<FileRecord, FingerprintError> {
        let bytes = fs::read(path).map_err(|e| FingerprintError::io(path, e))?;
        if bytes.is_empty() {
            return Err(FingerprintError::unreadable(path, "zero-byte file"));
        }
        let digest = Digest::of_bytes(&bytes);
        let phash = self.perceptual_hash_bytes(path, &bytes)?;
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok();

        Ok(FileRecord {
            path: path.to_path_buf(),
            size: bytes.len() as u64,
            digest,
            phash,
            modified,
        })
    }

    fn perceptual_hash_bytes(
        &self,
        path: &Path,
        bytes: &[u8],
    ) -> Result<PerceptualHash, FingerprintError> {
        let img = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| FingerprintError::unreadable(path, e))?
            .decode()
            .map_err(|e| FingerprintError::unreadable(path, e))?;
        Ok(mean_hash(&img.to_luma8()))
    }

    /// Fingerprint every path in parallel. Records come back in the order of
    /// `paths`, whatever order the workers finish in; failures become
    /// skipped entries.
    pub fn fingerprint_all(&self, paths: &[PathBuf]) -> (Vec<FileRecord>, Vec<SkippedFile>) {
        let bar = ProgressBar::new(paths.len() as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} fingerprinting {msg}")
        {
            bar.set_style(style);
        }

        let results: Vec<Result<FileRecord, (PathBuf, FingerprintError)>> = paths
            .par_iter()
            .map(|path| {
                let result = self.fingerprint(path).map_err(|e| (path.clone(), e));
                bar.inc(1);
                result
            })
            .collect();
        bar.finish_and_clear();

        let mut records = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err((path, e)) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
        (records, skipped)
    }
}
