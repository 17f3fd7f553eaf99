use crate::config::ConfigError;
use crate::core::fingerprint::FingerprintError;
use crate::core::quarantine::QuarantineError;
use thiserror::Error;

/// Errors that abort a whole run. Per-file problems never end up here; they
/// become skipped or review entries instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Directory {path} does not exist or is not a directory")]
    MissingDirectory { path: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Quarantine(#[from] QuarantineError),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    #[error("Failed to write report {path}: {source}")]
    Report {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
