//! Wires the pipeline for one run: scan, fingerprint, index, resolve,
//! verify, quarantine, report.

use crate::config::{Config, ConfigError, Mode, VerificationConfig};
use crate::core::audit::{AuditEntry, AuditLog, Decision};
use crate::core::cluster::{
    DuplicateCluster, OverlapReport, filename_overlap, resolve_cross_corpus, resolve_full_corpus,
    resolve_sequential,
};
use crate::core::fingerprint::{FileRecord, Fingerprinter};
use crate::core::index::{CorpusIndex, path_order, sort_by_path, sort_naturally};
use crate::core::quarantine::Quarantine;
use crate::core::report::{AuditReport, prepare_report_path, write_report};
use crate::core::scanner::Scanner;
use crate::core::similarity::{
    StructuralScorer, StructuralSimilarity, hamming_distance, is_exact_match,
};
use crate::core::verify::VerificationGate;
use crate::error::EngineError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub log: AuditLog,
    pub clusters: Vec<DuplicateCluster>,
    pub overlap: Option<OverlapReport>,
    /// Rendered report text.
    pub report: String,
    /// Where the report was written; `None` when it was only rendered.
    pub report_path: Option<PathBuf>,
    pub backup_dir: PathBuf,
}

pub fn run(config: &Config) -> Result<RunOutcome, EngineError> {
    config.validate()?;
    for root in &config.roots {
        if !root.is_dir() {
            return Err(EngineError::MissingDirectory {
                path: root.display().to_string(),
            });
        }
    }
    let backup_dir = config
        .resolved_backup_dir()
        .ok_or_else(|| ConfigError::Invalid {
            reason: "no corpus root to place the backup directory in".to_string(),
        })?;

    // Fail before anything is relocated if the report cannot be written.
    let report_target = config
        .resolved_report_path()
        .filter(|_| !config.dry_run || config.report_path.is_some());
    if let Some(path) = &report_target {
        prepare_report_path(path).map_err(|source| EngineError::Report {
            path: path.display().to_string(),
            source,
        })?;
    }

    let start = Instant::now();
    let scanner = Scanner::new(&config.scan).excluding(Some(backup_dir.as_path()));
    let fingerprinter = Fingerprinter::new();
    let scorer = StructuralSimilarity::new(&config.verification);
    let gate = config
        .verification
        .enabled
        .then(|| VerificationGate::new(&scorer, &config.verification));
    let threshold = config.threshold();

    let (mut log, clusters, overlap) = match config.mode {
        Mode::Sequential | Mode::FullCorpus => {
            let mut listing = scanner.scan(&config.roots[0]);
            if config.mode == Mode::Sequential {
                sort_naturally(&mut listing);
            } else {
                sort_by_path(&mut listing);
            }

            let (records, skipped) = fingerprinter.fingerprint_all(&listing);
            let index = CorpusIndex::build(records);
            let mut resolution = match config.mode {
                Mode::Sequential => resolve_sequential(&index, threshold),
                _ => resolve_full_corpus(&index, threshold, gate.as_ref()),
            };

            quarantine(config, &backup_dir, &mut resolution.entries)?;
            sync_cluster_decisions(&mut resolution.clusters, &resolution.entries);

            let log = AuditLog {
                total_scanned: listing.len(),
                entries: resolution.entries,
                skipped,
            };
            (log, resolution.clusters, None)
        }
        Mode::CrossCorpus => {
            let mut listing_a = scanner.scan(&config.roots[0]);
            let mut listing_b = scanner.scan(&config.roots[1]);
            sort_by_path(&mut listing_a);
            sort_by_path(&mut listing_b);
            let filenames = filename_overlap(&listing_a, &listing_b);

            let (records_a, mut skipped) = fingerprinter.fingerprint_all(&listing_a);
            let (records_b, skipped_b) = fingerprinter.fingerprint_all(&listing_b);
            skipped.extend(skipped_b);

            let index_a = CorpusIndex::build(records_a);
            let index_b = CorpusIndex::build(records_b);
            let resolution =
                resolve_cross_corpus(&index_a, &index_b, threshold, filenames, gate.as_ref());

            let log = AuditLog {
                total_scanned: listing_a.len() + listing_b.len(),
                entries: resolution.entries,
                skipped,
            };
            (log, Vec::new(), Some(resolution.report))
        }
    };
    log.skipped.sort_by(|a, b| path_order(&a.path, &b.path));
    debug_assert!(log.counts().is_conserved());

    let report = AuditReport {
        config,
        log: &log,
        clusters: &clusters,
        overlap: overlap.as_ref(),
    }
    .to_string();

    // Files may already be quarantined here, so a failed write falls back to
    // handing the rendered report to the caller.
    let report_path = match report_target {
        Some(path) => match write_report(&path, &report) {
            Ok(()) => Some(path),
            Err(e) => {
                log::warn!("Failed to write report {}: {}", path.display(), e);
                None
            }
        },
        None => None,
    };

    log::info!(
        "{} run finished in {:.2?}",
        config.mode.label(),
        start.elapsed()
    );
    Ok(RunOutcome {
        log,
        clusters,
        overlap,
        report,
        report_path,
        backup_dir,
    })
}

fn quarantine(
    config: &Config,
    backup_dir: &Path,
    entries: &mut [AuditEntry],
) -> Result<(), EngineError> {
    if !entries.iter().any(|e| e.decision == Decision::Remove) {
        return Ok(());
    }
    let quarantine = Quarantine::new(backup_dir.to_path_buf(), config.action, config.dry_run);
    quarantine.ensure_dir()?;
    let moves = quarantine.apply(entries);
    if let Err(e) = quarantine.record_history(config.mode.label(), moves) {
        log::warn!("Could not record history in {}: {}", backup_dir.display(), e);
    }
    Ok(())
}

/// Relocation can demote entries to review; keep cluster members in step.
fn sync_cluster_decisions(clusters: &mut [DuplicateCluster], entries: &[AuditEntry]) {
    let decisions: HashMap<&Path, Decision> = entries
        .iter()
        .map(|e| (e.path.as_path(), e.decision))
        .collect();
    for member in clusters.iter_mut().flat_map(|c| c.members.iter_mut()) {
        if let Some(&decision) = decisions.get(member.path.as_path()) {
            member.decision = decision;
        }
    }
}

/// Side-by-side fingerprints of two files.
#[derive(Debug)]
pub struct PairComparison {
    pub a: FileRecord,
    pub b: FileRecord,
    pub exact: bool,
    pub distance: u32,
    pub similarity: f64,
}

/// Fingerprint and score one pair of files by hand.
pub fn compare_pair(
    a: &Path,
    b: &Path,
    verification: &VerificationConfig,
) -> Result<PairComparison, EngineError> {
    let fingerprinter = Fingerprinter::new();
    let ra = fingerprinter.fingerprint(a)?;
    let rb = fingerprinter.fingerprint(b)?;
    let similarity = StructuralSimilarity::new(verification).score(a, b)?;
    Ok(PairComparison {
        exact: is_exact_match(&ra, &rb),
        distance: hamming_distance(&ra, &rb),
        similarity,
        a: ra,
        b: rb,
    })
}
