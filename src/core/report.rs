//! Plain-text audit report.
//!
//! The report is a pure function of the run's configuration and results. It
//! carries no timestamps, so two runs over the same inputs render the same
//! bytes.

use crate::config::{Config, Mode};
use crate::core::audit::{AuditEntry, AuditLog, Decision};
use crate::core::cluster::{DuplicateCluster, OverlapReport, PairCheck};
use crate::core::index::path_order;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

pub struct AuditReport<'a> {
    pub config: &'a Config,
    pub log: &'a AuditLog,
    pub clusters: &'a [DuplicateCluster],
    pub overlap: Option<&'a OverlapReport>,
}

fn heading(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{}", title)?;
    writeln!(f, "{}", "-".repeat(title.chars().count()))
}

fn sorted<'e>(entries: impl Iterator<Item = &'e AuditEntry>) -> Vec<&'e AuditEntry> {
    let mut v: Vec<_> = entries.collect();
    v.sort_by(|a, b| path_order(&a.path, &b.path));
    v
}

impl AuditReport<'_> {
    fn write_entry(&self, f: &mut fmt::Formatter<'_>, entry: &AuditEntry) -> fmt::Result {
        write!(f, "  {} [{}", entry.path.display(), entry.decision)?;
        if let Some(confidence) = entry.confidence {
            write!(f, ", {}", confidence)?;
        }
        write!(f, "] {}", entry.justification)?;
        if let Some(dest) = &entry.destination {
            if self.config.dry_run {
                write!(f, " (would be {} to {})", self.config.action.label(), dest.display())?;
            } else {
                write!(f, " → {}", dest.display())?;
            }
        }
        writeln!(f)
    }

    fn write_header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config;
        let title = match config.mode {
            Mode::CrossCorpus => "IMGCULL OVERLAP REPORT",
            Mode::Sequential | Mode::FullCorpus => "IMGCULL AUDIT REPORT",
        };
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.len()))?;
        writeln!(f, "Mode: {}", config.mode.label())?;
        match config.mode {
            Mode::CrossCorpus => {
                let labels = ["Corpus A (reference)", "Corpus B (evaluation)"];
                for (label, root) in labels.iter().zip(&config.roots) {
                    writeln!(f, "{}: {}", label, root.display())?;
                }
            }
            Mode::Sequential | Mode::FullCorpus => {
                for root in &config.roots {
                    writeln!(f, "Root: {}", root.display())?;
                }
            }
        }
        writeln!(f, "Hamming threshold: {}", config.threshold())?;
        if config.verification.enabled && config.mode != Mode::Sequential {
            writeln!(
                f,
                "Verification: similarity >= {:.3} ({}x{}, window {})",
                config.verification.threshold,
                config.verification.resolution,
                config.verification.resolution,
                config.verification.window
            )?;
        } else {
            writeln!(f, "Verification: off")?;
        }
        if config.mode != Mode::CrossCorpus {
            if let Some(dir) = config.resolved_backup_dir() {
                writeln!(
                    f,
                    "Quarantine: {} into {}{}",
                    config.action.label(),
                    dir.display(),
                    if config.dry_run { " (dry run)" } else { "" }
                )?;
            }
        }
        Ok(())
    }

    fn write_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.log.counts();
        heading(f, "SUMMARY")?;
        writeln!(f, "Total scanned: {}", counts.total)?;
        writeln!(f, "Kept:          {}", counts.kept)?;
        writeln!(f, "Removed:       {}", counts.removed)?;
        writeln!(f, "Review:        {}", counts.review)?;
        writeln!(f, "Skipped:       {}", counts.skipped)
    }

    fn write_clusters(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        heading(f, &format!("CLUSTERS ({})", self.clusters.len()))?;
        if self.clusters.is_empty() {
            return writeln!(f, "  none");
        }
        for (i, cluster) in self.clusters.iter().enumerate() {
            write!(f, "[{}] {}", i + 1, cluster.representative.display())?;
            match cluster.confidence() {
                Some(c) => writeln!(f, " ({})", c)?,
                None => writeln!(f)?,
            }
            for member in &cluster.members {
                writeln!(
                    f,
                    "    - {} [{}, {}]",
                    member.path.display(),
                    member.decision,
                    member.confidence
                )?;
            }
        }
        Ok(())
    }

    fn write_review(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let review = sorted(self.log.with_decision(Decision::Review));
        heading(f, &format!("REVIEW ({})", review.len()))?;

        let triage = self.config.verification.triage_threshold;
        let (scored, unscored): (Vec<_>, Vec<_>) = review
            .into_iter()
            .partition(|e| e.justification.score().is_some());
        let (high, low): (Vec<_>, Vec<_>) = scored
            .into_iter()
            .partition(|e| e.justification.score().is_some_and(|s| s >= triage));

        for (title, group) in [
            (format!("High similarity (>= {:.2})", triage), high),
            (format!("Low similarity (< {:.2})", triage), low),
            ("Other".to_string(), unscored),
        ] {
            if group.is_empty() {
                continue;
            }
            writeln!(f, " {}:", title)?;
            for entry in group {
                self.write_entry(f, entry)?;
            }
        }
        Ok(())
    }

    fn write_overlap(&self, f: &mut fmt::Formatter<'_>, overlap: &OverlapReport) -> fmt::Result {
        heading(f, &format!("FILENAME OVERLAP ({})", overlap.filename.len()))?;
        for pair in &overlap.filename {
            writeln!(f, "  {}: {} <-> {}", pair.name, pair.a.display(), pair.b.display())?;
        }

        heading(f, &format!("EXACT OVERLAP ({})", overlap.exact.len()))?;
        for pair in &overlap.exact {
            writeln!(
                f,
                "  {}: {} <-> {}",
                pair.digest.short(),
                pair.a.display(),
                pair.b.display()
            )?;
        }

        heading(f, &format!("PERCEPTUAL OVERLAP ({})", overlap.perceptual.len()))?;
        for pair in &overlap.perceptual {
            write!(
                f,
                "  {} <-> {} (hamming {})",
                pair.a.display(),
                pair.b.display(),
                pair.distance
            )?;
            match &pair.check {
                Some(PairCheck::Verified { score }) => write!(f, " similarity {:.3} verified", score)?,
                Some(PairCheck::Questionable { score }) => {
                    write!(f, " similarity {:.3} questionable", score)?
                }
                Some(PairCheck::Unavailable { reason }) => {
                    write!(f, " questionable, similarity unavailable: {}", reason)?
                }
                None => {}
            }
            writeln!(f)?;
        }

        if !overlap.warnings.is_empty() {
            heading(f, "WARNINGS")?;
            for warning in &overlap.warnings {
                writeln!(f, "  {}", warning)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for AuditReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_header(f)?;
        self.write_summary(f)?;

        match self.overlap {
            Some(overlap) => self.write_overlap(f, overlap)?,
            None => self.write_clusters(f)?,
        }

        let removed = sorted(self.log.with_decision(Decision::Remove));
        if self.config.mode != Mode::CrossCorpus {
            heading(f, &format!("REMOVED ({})", removed.len()))?;
            for entry in removed {
                self.write_entry(f, entry)?;
            }
        }

        self.write_review(f)?;

        let mut skipped: Vec<_> = self.log.skipped.iter().collect();
        skipped.sort_by(|a, b| path_order(&a.path, &b.path));
        heading(f, &format!("SKIPPED ({})", skipped.len()))?;
        for file in skipped {
            writeln!(f, "  {}: {}", file.path.display(), file.reason)?;
        }
        Ok(())
    }
}

/// Make sure `path` can be written: create its parent directories and open
/// the file for writing without truncating it.
pub fn prepare_report_path(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

/// Write `text` to `path`, creating parent directories.
pub fn write_report(path: &Path, text: &str) -> io::Result<()> {
    prepare_report_path(path)?;
    fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audit::{Confidence, Justification, SkippedFile};
    use crate::core::cluster::{ClusterMember, ExactOverlap, FilenameOverlap, OverlapWarning};
    use crate::core::fingerprint::Digest;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample_log() -> AuditLog {
        AuditLog {
            total_scanned: 5,
            entries: vec![
                AuditEntry::keep(PathBuf::from("/c/a.jpg"), Justification::Representative),
                AuditEntry {
                    destination: Some(PathBuf::from("/c/duplicates_backup/d.jpg")),
                    ..AuditEntry::remove(
                        PathBuf::from("/c/d.jpg"),
                        Confidence::Exact,
                        Justification::DigestMatch {
                            original: PathBuf::from("/c/a.jpg"),
                        },
                    )
                },
                AuditEntry::review(
                    PathBuf::from("/c/c.jpg"),
                    Some(Confidence::NearUnverified),
                    Justification::Similarity {
                        original: PathBuf::from("/c/a.jpg"),
                        distance: 2,
                        score: 0.6,
                    },
                ),
                AuditEntry::review(
                    PathBuf::from("/c/b.jpg"),
                    Some(Confidence::NearUnverified),
                    Justification::Similarity {
                        original: PathBuf::from("/c/a.jpg"),
                        distance: 1,
                        score: 0.9,
                    },
                ),
            ],
            skipped: vec![SkippedFile {
                path: PathBuf::from("/c/broken.png"),
                reason: "zero-byte file".to_string(),
            }],
        }
    }

    fn sample_clusters() -> Vec<DuplicateCluster> {
        vec![DuplicateCluster {
            representative: PathBuf::from("/c/a.jpg"),
            members: vec![
                ClusterMember {
                    path: PathBuf::from("/c/d.jpg"),
                    confidence: Confidence::Exact,
                    decision: Decision::Remove,
                },
                ClusterMember {
                    path: PathBuf::from("/c/c.jpg"),
                    confidence: Confidence::NearUnverified,
                    decision: Decision::Review,
                },
            ],
        }]
    }

    #[test]
    fn test_report_sections_and_counts() {
        let config = Config::new(Mode::FullCorpus, vec![PathBuf::from("/c")]);
        let log = sample_log();
        let clusters = sample_clusters();
        let text = AuditReport {
            config: &config,
            log: &log,
            clusters: &clusters,
            overlap: None,
        }
        .to_string();

        assert!(text.starts_with("IMGCULL AUDIT REPORT"));
        assert!(text.contains("Mode: full-corpus"));
        assert!(text.contains("Total scanned: 5"));
        assert!(text.contains("Removed:       1"));
        assert!(text.contains("Review:        2"));
        assert!(text.contains("Skipped:       1"));
        assert!(text.contains("[1] /c/a.jpg (near-unverified)"));
        assert!(text.contains("REMOVED (1)"));
        assert!(text.contains("→ /c/duplicates_backup/d.jpg"));
        assert!(text.contains("/c/broken.png: zero-byte file"));

        // Triage: b.jpg (0.9) is high similarity, c.jpg (0.6) low.
        let high = text.find("High similarity").unwrap();
        let low = text.find("Low similarity").unwrap();
        let b = text.find("  /c/b.jpg").unwrap();
        let c = text.find("  /c/c.jpg").unwrap();
        assert!(high < b && b < low && low < c);
    }

    #[test]
    fn test_report_is_deterministic_regardless_of_entry_order() {
        let config = Config::new(Mode::FullCorpus, vec![PathBuf::from("/c")]);
        let log = sample_log();
        let mut shuffled = log.clone();
        shuffled.entries.reverse();
        let clusters = sample_clusters();

        let render = |log: &AuditLog| {
            AuditReport {
                config: &config,
                log,
                clusters: &clusters,
                overlap: None,
            }
            .to_string()
        };
        assert_eq!(render(&log), render(&shuffled));
    }

    #[test]
    fn test_overlap_report_sections() {
        let config = Config::new(
            Mode::CrossCorpus,
            vec![PathBuf::from("/train"), PathBuf::from("/eval")],
        );
        let log = AuditLog {
            total_scanned: 2,
            entries: vec![
                AuditEntry::keep(PathBuf::from("/train/x.jpg"), Justification::ReferenceCorpus),
                AuditEntry::review(
                    PathBuf::from("/eval/x.jpg"),
                    Some(Confidence::Exact),
                    Justification::Overlap {
                        other: PathBuf::from("/train/x.jpg"),
                        digest_match: true,
                        distance: None,
                    },
                ),
            ],
            skipped: Vec::new(),
        };
        let overlap = OverlapReport {
            filename: vec![FilenameOverlap {
                name: "x.jpg".to_string(),
                a: PathBuf::from("/train/x.jpg"),
                b: PathBuf::from("/eval/x.jpg"),
            }],
            exact: vec![ExactOverlap {
                digest: Digest([0xab; 32]),
                a: PathBuf::from("/train/x.jpg"),
                b: PathBuf::from("/eval/x.jpg"),
            }],
            perceptual: Vec::new(),
            warnings: vec![OverlapWarning::PartialCorpus {
                corpus: "A".to_string(),
            }],
        };

        let text = AuditReport {
            config: &config,
            log: &log,
            clusters: &[],
            overlap: Some(&overlap),
        }
        .to_string();

        assert!(text.starts_with("IMGCULL OVERLAP REPORT"));
        assert!(text.contains("Corpus A (reference): /train"));
        assert!(text.contains("FILENAME OVERLAP (1)"));
        assert!(text.contains("EXACT OVERLAP (1)"));
        assert!(text.contains("abababababab: /train/x.jpg <-> /eval/x.jpg"));
        assert!(text.contains("PERCEPTUAL OVERLAP (0)"));
        assert!(text.contains("WARNINGS"));
        assert!(!text.contains("REMOVED"));
        assert!(!text.contains("Quarantine:"));
    }

    #[test]
    fn test_prepare_rejects_path_under_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        assert!(prepare_report_path(&file.join("report.txt")).is_err());
        assert!(prepare_report_path(&temp_dir.path().join("ok.txt")).is_ok());
    }

    #[test]
    fn test_write_report_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("audit_report.txt");
        write_report(&path, "hello\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "hello\n");
    }
}
