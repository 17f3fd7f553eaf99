use crate::config::QuarantineAction;
use crate::core::audit::{AuditEntry, Decision, Justification};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

pub const HISTORY_FILE_NAME: &str = ".history.jsonl";

#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("Source {path} no longer exists")]
    SourceMissing { path: String },

    #[error("Failed to create quarantine directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to {action} {from} → {to}: {source}")]
    Relocate {
        action: &'static str,
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },

    #[error("History file {path}: {source}")]
    History {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("History serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No restorable history records in {path}")]
    NothingToRestore { path: String },

    #[error("Invalid history index {index}; valid range is 0..={last}")]
    InvalidIndex { index: usize, last: usize },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// One line of `.history.jsonl`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub timestamp: String,
    pub mode: String,
    pub action: String, // "moved" or "copied"
    pub moves: Vec<MoveRecord>,
}

/// Relocates losing files into one backup directory. Never deletes.
pub struct Quarantine {
    dir: PathBuf,
    action: QuarantineAction,
    dry_run: bool,
    reserved: Mutex<HashSet<PathBuf>>,
}

impl Quarantine {
    pub fn new(dir: PathBuf, action: QuarantineAction, dry_run: bool) -> Self {
        Self {
            dir,
            action,
            dry_run,
            reserved: Mutex::new(HashSet::new()),
        }
    }

    pub fn ensure_dir(&self) -> Result<(), QuarantineError> {
        if self.dry_run {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).map_err(|source| QuarantineError::CreateDir {
            path: self.dir.display().to_string(),
            source,
        })
    }

    /// Reserve a free name in the quarantine directory for `source`:
    /// `name.ext`, then `name_1.ext`, `name_2.ext`, … The check and the
    /// reservation happen under one lock.
    pub fn reserve_destination(&self, source: &Path) -> PathBuf {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let (stem, ext) = match Path::new(&file_name).extension() {
            Some(ext) => (
                Path::new(&file_name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                Some(ext.to_string_lossy().into_owned()),
            ),
            None => (file_name.clone(), None),
        };

        let mut reserved = self.reserved.lock().unwrap_or_else(|e| e.into_inner());
        let mut candidate = self.dir.join(&file_name);
        let mut n = 0u32;
        while reserved.contains(&candidate) || candidate.exists() {
            n += 1;
            let name = match &ext {
                Some(ext) => format!("{}_{}.{}", stem, n, ext),
                None => format!("{}_{}", stem, n),
            };
            candidate = self.dir.join(name);
        }
        reserved.insert(candidate.clone());
        candidate
    }

    /// Move or copy `source` into quarantine, returning where it went. In a
    /// dry run only the destination is computed.
    pub fn relocate(&self, source: &Path) -> Result<PathBuf, QuarantineError> {
        if !source.is_file() {
            return Err(QuarantineError::SourceMissing {
                path: source.display().to_string(),
            });
        }
        let dest = self.reserve_destination(source);
        if self.dry_run {
            return Ok(dest);
        }

        let relocate_err = |action, source_err| QuarantineError::Relocate {
            action,
            from: source.display().to_string(),
            to: dest.display().to_string(),
            source: source_err,
        };

        match self.action {
            QuarantineAction::Copy => {
                fs::copy(source, &dest).map_err(|e| relocate_err("copy", e))?;
            }
            QuarantineAction::Move => {
                if let Err(rename_err) = fs::rename(source, &dest) {
                    // Across filesystems rename fails; copy then remove.
                    log::debug!(
                        "rename {} failed ({}), falling back to copy",
                        source.display(),
                        rename_err
                    );
                    fs::copy(source, &dest).map_err(|e| relocate_err("move", e))?;
                    if let Err(e) = fs::remove_file(source) {
                        let _ = fs::remove_file(&dest);
                        return Err(relocate_err("move", e));
                    }
                }
            }
        }
        Ok(dest)
    }

    /// Relocate every `remove` entry. Entries whose relocation fails are
    /// demoted to `review`, so nothing still in place is reported removed.
    pub fn apply(&self, entries: &mut [AuditEntry]) -> Vec<MoveRecord> {
        let mut moves = Vec::new();
        for entry in entries.iter_mut().filter(|e| e.decision == Decision::Remove) {
            match self.relocate(&entry.path) {
                Ok(dest) => {
                    moves.push(MoveRecord {
                        source: entry.path.clone(),
                        destination: dest.clone(),
                    });
                    entry.destination = Some(dest);
                }
                Err(e) => {
                    log::warn!("Leaving {} in place: {}", entry.path.display(), e);
                    let original = original_of(&entry.justification)
                        .unwrap_or_else(|| entry.path.clone());
                    entry.decision = Decision::Review;
                    entry.justification = Justification::QuarantineFailed {
                        original,
                        reason: e.to_string(),
                    };
                }
            }
        }
        moves
    }

    /// Append this run to the history log. Dry runs and empty runs leave no
    /// trace.
    pub fn record_history(&self, mode: &str, moves: Vec<MoveRecord>) -> Result<(), QuarantineError> {
        if self.dry_run || moves.is_empty() {
            return Ok(());
        }
        let record = HistoryRecord {
            timestamp: Utc::now().to_rfc3339(),
            mode: mode.to_string(),
            action: self.action.label().to_string(),
            moves,
        };
        append_history(&self.dir, &record)
    }
}

fn original_of(justification: &Justification) -> Option<PathBuf> {
    match justification {
        Justification::DigestMatch { original }
        | Justification::Hamming { original, .. }
        | Justification::Similarity { original, .. }
        | Justification::ScoreUnavailable { original, .. }
        | Justification::QuarantineFailed { original, .. } => Some(original.clone()),
        _ => None,
    }
}

pub fn history_path(dir: &Path) -> PathBuf {
    dir.join(HISTORY_FILE_NAME)
}

pub fn append_history(dir: &Path, record: &HistoryRecord) -> Result<(), QuarantineError> {
    let path = history_path(dir);
    let io_err = |source| QuarantineError::History {
        path: path.display().to_string(),
        source,
    };
    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_err)?;
    writeln!(out, "{}", serde_json::to_string(record)?).map_err(io_err)?;
    Ok(())
}

/// Parse the history log, skipping malformed lines. Each record comes with
/// its line number.
pub fn read_history(dir: &Path) -> Result<Vec<(usize, HistoryRecord)>, QuarantineError> {
    let path = history_path(dir);
    let text = fs::read_to_string(&path).map_err(|source| QuarantineError::History {
        path: path.display().to_string(),
        source,
    })?;

    let mut records = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryRecord>(line) {
            Ok(record) => records.push((i, record)),
            Err(err) => log::warn!("Skipping malformed history entry {}: {}", i, err),
        }
    }
    Ok(records)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSelection {
    Latest,
    All,
    Index(usize),
}

#[derive(Debug, Default)]
pub struct RestoreSummary {
    pub restored: Vec<MoveRecord>,
    pub skipped: Vec<(MoveRecord, String)>,
    pub records_removed: usize,
}

/// Move quarantined files back to where they came from. Only "moved"
/// records are restorable; indices count those records only. Restored
/// records are dropped from the log, everything else is kept verbatim.
pub fn restore(dir: &Path, selection: RestoreSelection) -> Result<RestoreSummary, QuarantineError> {
    let moved: Vec<(usize, HistoryRecord)> = read_history(dir)?
        .into_iter()
        .filter(|(_, record)| record.action == QuarantineAction::Move.label())
        .collect();
    if moved.is_empty() {
        return Err(QuarantineError::NothingToRestore {
            path: history_path(dir).display().to_string(),
        });
    }

    let chosen: Vec<usize> = match selection {
        RestoreSelection::All => (0..moved.len()).collect(),
        RestoreSelection::Latest => vec![moved.len() - 1],
        RestoreSelection::Index(index) => {
            if index >= moved.len() {
                return Err(QuarantineError::InvalidIndex {
                    index,
                    last: moved.len() - 1,
                });
            }
            vec![index]
        }
    };

    let mut summary = RestoreSummary::default();
    let mut dropped_lines = HashSet::new();
    for &i in &chosen {
        let (line, record) = &moved[i];
        for mv in &record.moves {
            if !mv.destination.exists() {
                summary
                    .skipped
                    .push((mv.clone(), "quarantined copy is missing".to_string()));
                continue;
            }
            if mv.source.exists() {
                summary
                    .skipped
                    .push((mv.clone(), "original path is occupied".to_string()));
                continue;
            }
            if let Some(parent) = mv.source.parent() {
                fs::create_dir_all(parent).map_err(|source| QuarantineError::Relocate {
                    action: "restore",
                    from: mv.destination.display().to_string(),
                    to: mv.source.display().to_string(),
                    source,
                })?;
            }
            fs::rename(&mv.destination, &mv.source).map_err(|source| QuarantineError::Relocate {
                action: "restore",
                from: mv.destination.display().to_string(),
                to: mv.source.display().to_string(),
                source,
            })?;
            summary.restored.push(mv.clone());
        }
        dropped_lines.insert(*line);
    }
    summary.records_removed = dropped_lines.len();

    let path = history_path(dir);
    let io_err = |source| QuarantineError::History {
        path: path.display().to_string(),
        source,
    };
    let text = fs::read_to_string(&path).map_err(io_err)?;
    let remaining: Vec<&str> = text
        .lines()
        .enumerate()
        .filter(|(i, line)| !dropped_lines.contains(i) && !line.trim().is_empty())
        .map(|(_, line)| line)
        .collect();
    let new_content = if remaining.is_empty() {
        String::new()
    } else {
        remaining.join("\n") + "\n"
    };
    fs::write(&path, new_content).map_err(io_err)?;

    Ok(summary)
}
