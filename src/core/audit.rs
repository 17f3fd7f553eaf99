//! Decisions and their justifications. Everything the reporter prints is
//! derived from these records.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Keep,
    Remove,
    Review,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::Keep => "keep",
            Decision::Remove => "remove",
            Decision::Review => "review",
        })
    }
}

/// Ordered weakest-last: `Exact` is the strongest claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidence {
    Exact,
    NearVerified,
    NearUnverified,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::Exact => "exact",
            Confidence::NearVerified => "near-verified",
            Confidence::NearUnverified => "near-unverified",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Justification {
    /// First file of a sequential run.
    FirstInSequence,
    /// Differs enough from the previous survivor.
    Distinct { previous: PathBuf, distance: u32 },
    /// Canonical file of its cluster, or matched nothing.
    Representative,
    Unique,
    /// Cross-corpus: file of the reference corpus, never modified.
    ReferenceCorpus,
    DigestMatch { original: PathBuf },
    Hamming { original: PathBuf, distance: u32 },
    Similarity {
        original: PathBuf,
        distance: u32,
        score: f64,
    },
    ScoreUnavailable {
        original: PathBuf,
        distance: u32,
        reason: String,
    },
    /// Cross-corpus: content shared with the other corpus.
    Overlap {
        other: PathBuf,
        digest_match: bool,
        distance: Option<u32>,
    },
    /// Relocation failed, so the file stays in place.
    QuarantineFailed { original: PathBuf, reason: String },
}

impl Justification {
    /// The structural-similarity score, when one was computed.
    pub fn score(&self) -> Option<f64> {
        match self {
            Justification::Similarity { score, .. } => Some(*score),
            _ => None,
        }
    }
}

impl fmt::Display for Justification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Justification::FirstInSequence => write!(f, "first file in sequence"),
            Justification::Distinct { previous, distance } => write!(
                f,
                "hamming {} from previous survivor {}",
                distance,
                previous.display()
            ),
            Justification::Representative => write!(f, "cluster representative"),
            Justification::Unique => write!(f, "no duplicate found"),
            Justification::ReferenceCorpus => write!(f, "reference corpus"),
            Justification::DigestMatch { original } => {
                write!(f, "digest match with {}", original.display())
            }
            Justification::Hamming { original, distance } => {
                write!(f, "hamming {} from {}", distance, original.display())
            }
            Justification::Similarity {
                original,
                distance,
                score,
            } => write!(
                f,
                "hamming {} / similarity {:.3} against {}",
                distance,
                score,
                original.display()
            ),
            Justification::ScoreUnavailable {
                original,
                distance,
                reason,
            } => write!(
                f,
                "hamming {} from {}, similarity unavailable: {}",
                distance,
                original.display(),
                reason
            ),
            Justification::Overlap {
                other,
                digest_match,
                distance,
            } => {
                if *digest_match {
                    write!(f, "digest match with {}", other.display())
                } else {
                    match distance {
                        Some(d) => write!(f, "hamming {} from {}", d, other.display()),
                        None => write!(f, "overlaps {}", other.display()),
                    }
                }
            }
            Justification::QuarantineFailed { original, reason } => write!(
                f,
                "duplicate of {} but quarantine failed: {}",
                original.display(),
                reason
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub path: PathBuf,
    pub decision: Decision,
    pub confidence: Option<Confidence>,
    pub justification: Justification,
    /// Where the quarantine manager put (or would put) the file.
    pub destination: Option<PathBuf>,
}

impl AuditEntry {
    pub fn keep(path: PathBuf, justification: Justification) -> Self {
        Self {
            path,
            decision: Decision::Keep,
            confidence: None,
            justification,
            destination: None,
        }
    }

    pub fn remove(path: PathBuf, confidence: Confidence, justification: Justification) -> Self {
        Self {
            path,
            decision: Decision::Remove,
            confidence: Some(confidence),
            justification,
            destination: None,
        }
    }

    pub fn review(path: PathBuf, confidence: Option<Confidence>, justification: Justification) -> Self {
        Self {
            path,
            decision: Decision::Review,
            confidence,
            justification,
            destination: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub total: usize,
    pub kept: usize,
    pub removed: usize,
    pub review: usize,
    pub skipped: usize,
}

impl Counts {
    /// Every scanned file is accounted for exactly once.
    pub fn is_conserved(&self) -> bool {
        self.kept + self.removed + self.review + self.skipped == self.total
    }
}

/// Per-run decision log. `entries` is in scan order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditLog {
    pub total_scanned: usize,
    pub entries: Vec<AuditEntry>,
    pub skipped: Vec<SkippedFile>,
}

impl AuditLog {
    pub fn counts(&self) -> Counts {
        let mut counts = Counts {
            total: self.total_scanned,
            skipped: self.skipped.len(),
            ..Counts::default()
        };
        for entry in &self.entries {
            match entry.decision {
                Decision::Keep => counts.kept += 1,
                Decision::Remove => counts.removed += 1,
                Decision::Review => counts.review += 1,
            }
        }
        counts
    }

    pub fn with_decision(&self, decision: Decision) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(move |e| e.decision == decision)
    }

    pub fn entry(&self, path: &std::path::Path) -> Option<&AuditEntry> {
        self.entries.iter().find(|e| e.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_conservation() {
        let log = AuditLog {
            total_scanned: 4,
            entries: vec![
                AuditEntry::keep(PathBuf::from("a.jpg"), Justification::Representative),
                AuditEntry::remove(
                    PathBuf::from("b.jpg"),
                    Confidence::Exact,
                    Justification::DigestMatch {
                        original: PathBuf::from("a.jpg"),
                    },
                ),
                AuditEntry::review(
                    PathBuf::from("c.jpg"),
                    Some(Confidence::NearUnverified),
                    Justification::Similarity {
                        original: PathBuf::from("a.jpg"),
                        distance: 2,
                        score: 0.6,
                    },
                ),
            ],
            skipped: vec![SkippedFile {
                path: PathBuf::from("d.jpg"),
                reason: "zero-byte file".to_string(),
            }],
        };

        let counts = log.counts();
        assert_eq!(
            counts,
            Counts {
                total: 4,
                kept: 1,
                removed: 1,
                review: 1,
                skipped: 1
            }
        );
        assert!(counts.is_conserved());
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::Exact < Confidence::NearVerified);
        assert!(Confidence::NearVerified < Confidence::NearUnverified);
    }

    #[test]
    fn test_justification_text() {
        let j = Justification::Similarity {
            original: PathBuf::from("a.jpg"),
            distance: 2,
            score: 0.6,
        };
        assert_eq!(j.to_string(), "hamming 2 / similarity 0.600 against a.jpg");
        assert_eq!(j.score(), Some(0.6));
    }
}
