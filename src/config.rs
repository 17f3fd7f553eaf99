use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Which clustering policy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Sequential,
    CrossCorpus,
    FullCorpus,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Sequential => "sequential",
            Mode::CrossCorpus => "cross-corpus",
            Mode::FullCorpus => "full-corpus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuarantineAction {
    Move,
    Copy,
}

impl QuarantineAction {
    pub fn label(&self) -> &'static str {
        match self {
            QuarantineAction::Move => "moved",
            QuarantineAction::Copy => "copied",
        }
    }
}

/// Hamming-distance thresholds (out of 64 bits) per mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub sequential: u32,
    pub cross_corpus: u32,
    pub full_corpus: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            sequential: 7,
            cross_corpus: 8,
            full_corpus: 3,
        }
    }
}

impl Thresholds {
    pub fn for_mode(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Sequential => self.sequential,
            Mode::CrossCorpus => self.cross_corpus,
            Mode::FullCorpus => self.full_corpus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub enabled: bool,
    /// Minimum structural similarity for a perceptual match to be removed.
    pub threshold: f64,
    /// Review entries at or above this score are listed as high-similarity.
    pub triage_threshold: f64,
    /// Both images are resized to `resolution`×`resolution` before scoring.
    pub resolution: u32,
    pub window: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.95,
            triage_threshold: 0.8,
            resolution: 256,
            window: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub recursive: bool,
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            extensions: ["jpg", "jpeg", "png", "bmp", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Everything one run needs. Components receive the slice they use at
/// construction time; nothing reads process-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub roots: Vec<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub scan: ScanConfig,
    pub thresholds: Thresholds,
    pub verification: VerificationConfig,
    pub action: QuarantineAction,
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::FullCorpus,
            roots: Vec::new(),
            backup_dir: None,
            report_path: None,
            scan: ScanConfig::default(),
            thresholds: Thresholds::default(),
            verification: VerificationConfig::default(),
            action: QuarantineAction::Move,
            dry_run: false,
        }
    }
}

pub const BACKUP_DIR_NAME: &str = "duplicates_backup";
pub const REPORT_FILE_NAME: &str = "audit_report.txt";
pub const OVERLAP_REPORT_FILE_NAME: &str = "overlap_report.txt";

impl Config {
    pub fn new(mode: Mode, roots: Vec<PathBuf>) -> Self {
        Self {
            mode,
            roots,
            ..Self::default()
        }
    }

    /// Load a TOML config file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// `<config dir>/imgcull/config.toml`, if the platform has a config dir.
    pub fn default_location() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("imgcull").join("config.toml"))
    }

    pub fn threshold(&self) -> u32 {
        self.thresholds.for_mode(self.mode)
    }

    /// Quarantine directory: configured, else `<first root>/duplicates_backup`.
    pub fn resolved_backup_dir(&self) -> Option<PathBuf> {
        self.backup_dir
            .clone()
            .or_else(|| self.roots.first().map(|root| root.join(BACKUP_DIR_NAME)))
    }

    pub fn resolved_report_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.report_path {
            return Some(path.clone());
        }
        match self.mode {
            Mode::CrossCorpus => Some(PathBuf::from(OVERLAP_REPORT_FILE_NAME)),
            Mode::Sequential | Mode::FullCorpus => self
                .resolved_backup_dir()
                .map(|dir| dir.join(REPORT_FILE_NAME)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let expected_roots = match self.mode {
            Mode::CrossCorpus => 2,
            Mode::Sequential | Mode::FullCorpus => 1,
        };
        if self.roots.len() != expected_roots {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "{} mode needs {} corpus root(s), got {}",
                    self.mode.label(),
                    expected_roots,
                    self.roots.len()
                ),
            });
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("sequential", t.sequential),
            ("cross_corpus", t.cross_corpus),
            ("full_corpus", t.full_corpus),
        ] {
            if value > 64 {
                return Err(ConfigError::Invalid {
                    reason: format!("{} threshold {} exceeds 64 bits", name, value),
                });
            }
        }

        let v = &self.verification;
        for (name, value) in [
            ("verification threshold", v.threshold),
            ("triage threshold", v.triage_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    reason: format!("{} {} is outside [0, 1]", name, value),
                });
            }
        }
        if v.window < 2 || v.window > v.resolution {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "window {} must be between 2 and the resolution {}",
                    v.window, v.resolution
                ),
            });
        }

        if self.scan.extensions.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "no image extensions configured".to_string(),
            });
        }

        Ok(())
    }
}
