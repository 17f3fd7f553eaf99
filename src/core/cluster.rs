//! Duplicate resolution policies.
//!
//! All three run single-threaded over a fully built [`CorpusIndex`] so that
//! which file counts as "already assigned" depends only on the sort order.

use crate::core::audit::{AuditEntry, Confidence, Decision, Justification};
use crate::core::fingerprint::{Digest, FileRecord};
use crate::core::index::{path_order, CorpusIndex};
use crate::core::verify::VerificationGate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// Above this many A×B comparisons the perceptual overlap scan is slow
/// enough to warn about.
pub const LARGE_COMPARISON_WARNING: usize = 10_000_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMember {
    pub path: PathBuf,
    pub confidence: Confidence,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCluster {
    pub representative: PathBuf,
    pub members: Vec<ClusterMember>,
}

impl DuplicateCluster {
    fn new(representative: &Path) -> Self {
        Self {
            representative: representative.to_path_buf(),
            members: Vec::new(),
        }
    }

    /// The weakest tag among the members.
    pub fn confidence(&self) -> Option<Confidence> {
        self.members.iter().map(|m| m.confidence).max()
    }

    fn push(&mut self, entry: &AuditEntry) {
        if let Some(confidence) = entry.confidence {
            self.members.push(ClusterMember {
                path: entry.path.clone(),
                confidence,
                decision: entry.decision,
            });
        }
    }
}

/// Clusters plus one audit entry per indexed record, in index order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub clusters: Vec<DuplicateCluster>,
    pub entries: Vec<AuditEntry>,
}

/// Sequential adjacent dedup over frames already in natural filename order.
///
/// Each file is compared only with the most recent survivor. A duplicate
/// separated from its original by one dissimilar frame is therefore kept;
/// that is the intended limit of this mode, which targets temporally local
/// redundancy in O(n).
pub fn resolve_sequential(index: &CorpusIndex, threshold: u32) -> Resolution {
    let mut resolution = Resolution::default();
    let mut last_kept: Option<&FileRecord> = None;
    let mut current: Option<DuplicateCluster> = None;

    for record in index.all_records() {
        let Some(previous) = last_kept else {
            resolution.entries.push(AuditEntry::keep(
                record.path.clone(),
                Justification::FirstInSequence,
            ));
            last_kept = Some(record);
            current = Some(DuplicateCluster::new(&record.path));
            continue;
        };

        let distance = previous.phash.distance(&record.phash);
        if distance <= threshold {
            let entry = if previous.digest == record.digest {
                AuditEntry::remove(
                    record.path.clone(),
                    Confidence::Exact,
                    Justification::DigestMatch {
                        original: previous.path.clone(),
                    },
                )
            } else {
                AuditEntry::remove(
                    record.path.clone(),
                    Confidence::NearUnverified,
                    Justification::Hamming {
                        original: previous.path.clone(),
                        distance,
                    },
                )
            };
            if let Some(cluster) = current.as_mut() {
                cluster.push(&entry);
            }
            resolution.entries.push(entry);
        } else {
            resolution.entries.push(AuditEntry::keep(
                record.path.clone(),
                Justification::Distinct {
                    previous: previous.path.clone(),
                    distance,
                },
            ));
            last_kept = Some(record);
            if let Some(done) = current.replace(DuplicateCluster::new(&record.path)) {
                if !done.members.is_empty() {
                    resolution.clusters.push(done);
                }
            }
        }
    }

    if let Some(done) = current {
        if !done.members.is_empty() {
            resolution.clusters.push(done);
        }
    }
    resolution
}

/// Full-corpus clustering: exact pass by digest, then a greedy perceptual
/// pass over what is left, optionally verified by `gate`.
///
/// The index is expected in [`path_order`], which makes the lowest path of
/// every group its representative.
pub fn resolve_full_corpus(
    index: &CorpusIndex,
    threshold: u32,
    gate: Option<&VerificationGate<'_>>,
) -> Resolution {
    let n = index.len();
    let by_path = |a: &usize, b: &usize| path_order(&index.get(*a).path, &index.get(*b).path);

    // Exact pass: representative of each digest group stays in the pool.
    let mut copies: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut pool = Vec::new();
    for mut group in index.digest_groups() {
        group.sort_by(by_path);
        let rep = group[0];
        if group.len() > 1 {
            copies.insert(rep, group[1..].to_vec());
        }
        pool.push(rep);
    }
    pool.sort_by(by_path);

    // Perceptual pass.
    let mut assigned = vec![false; pool.len()];
    let mut groups: Vec<(usize, Vec<(usize, u32)>)> = Vec::new();
    for (pi, &rep) in pool.iter().enumerate() {
        if assigned[pi] {
            continue;
        }
        assigned[pi] = true;
        let rep_hash = index.get(rep).phash;
        let mut members = Vec::new();
        for pj in (pi + 1)..pool.len() {
            if assigned[pj] {
                continue;
            }
            let distance = rep_hash.distance(&index.get(pool[pj]).phash);
            if distance <= threshold {
                assigned[pj] = true;
                members.push((pool[pj], distance));
            }
        }
        groups.push((rep, members));
    }

    let mut entries: Vec<Option<AuditEntry>> = vec![None; n];
    let mut clusters = Vec::new();
    for (rep, members) in groups {
        let rep_path = &index.get(rep).path;
        let mut cluster = DuplicateCluster::new(rep_path);

        for i in exact_copies_of(&copies, rep) {
            let entry = exact_removal(index, i, rep);
            cluster.push(&entry);
            entries[i] = Some(entry);
        }

        for (m, distance) in members {
            let member_path = &index.get(m).path;
            let entry = match gate {
                Some(gate) => {
                    let verdict = gate.check(rep_path, member_path, distance);
                    AuditEntry {
                        path: member_path.clone(),
                        decision: verdict.decision,
                        confidence: Some(verdict.confidence),
                        justification: verdict.justification,
                        destination: None,
                    }
                }
                None => AuditEntry::remove(
                    member_path.clone(),
                    Confidence::NearUnverified,
                    Justification::Hamming {
                        original: rep_path.clone(),
                        distance,
                    },
                ),
            };
            cluster.push(&entry);
            entries[m] = Some(entry);

            // Byte-identical copies follow the member they duplicate.
            for i in exact_copies_of(&copies, m) {
                let entry = exact_removal(index, i, m);
                cluster.push(&entry);
                entries[i] = Some(entry);
            }
        }

        let justification = if cluster.members.is_empty() {
            Justification::Unique
        } else {
            Justification::Representative
        };
        entries[rep] = Some(AuditEntry::keep(rep_path.clone(), justification));
        if !cluster.members.is_empty() {
            clusters.push(cluster);
        }
    }

    debug_assert!(entries.iter().all(Option::is_some));
    Resolution {
        clusters,
        entries: entries.into_iter().flatten().collect(),
    }
}

fn exact_copies_of(copies: &HashMap<usize, Vec<usize>>, i: usize) -> Vec<usize> {
    copies.get(&i).cloned().unwrap_or_default()
}

fn exact_removal(index: &CorpusIndex, copy: usize, original: usize) -> AuditEntry {
    AuditEntry::remove(
        index.get(copy).path.clone(),
        Confidence::Exact,
        Justification::DigestMatch {
            original: index.get(original).path.clone(),
        },
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilenameOverlap {
    pub name: String,
    pub a: PathBuf,
    pub b: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExactOverlap {
    pub digest: Digest,
    pub a: PathBuf,
    pub b: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PairCheck {
    Verified { score: f64 },
    Questionable { score: f64 },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerceptualOverlap {
    pub a: PathBuf,
    pub b: PathBuf,
    pub distance: u32,
    pub check: Option<PairCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OverlapWarning {
    PartialCorpus { corpus: String },
    LargeComparison { comparisons: usize },
}

impl fmt::Display for OverlapWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlapWarning::PartialCorpus { corpus } => {
                write!(f, "corpus {} has no readable images; overlap is empty", corpus)
            }
            OverlapWarning::LargeComparison { comparisons } => write!(
                f,
                "perceptual overlap scan needs {} comparisons and may be slow",
                comparisons
            ),
        }
    }
}

/// The three cross-corpus signals, kept apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlapReport {
    pub filename: Vec<FilenameOverlap>,
    pub exact: Vec<ExactOverlap>,
    pub perceptual: Vec<PerceptualOverlap>,
    pub warnings: Vec<OverlapWarning>,
}

impl OverlapReport {
    pub fn is_clean(&self) -> bool {
        self.filename.is_empty() && self.exact.is_empty() && self.perceptual.is_empty()
    }
}

fn lower_file_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
}

/// Case-insensitive file-name collisions between two listings, one pair per
/// name using the lowest path on each side.
pub fn filename_overlap(a: &[PathBuf], b: &[PathBuf]) -> Vec<FilenameOverlap> {
    fn lowest_by_name(paths: &[PathBuf]) -> BTreeMap<String, &PathBuf> {
        let mut map: BTreeMap<String, &PathBuf> = BTreeMap::new();
        for path in paths {
            if let Some(name) = lower_file_name(path) {
                map.entry(name)
                    .and_modify(|current| {
                        if path_order(path, current.as_path()).is_lt() {
                            *current = path;
                        }
                    })
                    .or_insert(path);
            }
        }
        map
    }

    let a = lowest_by_name(a);
    let b = lowest_by_name(b);
    a.iter()
        .filter_map(|(name, pa)| {
            b.get(name).map(|pb| FilenameOverlap {
                name: name.clone(),
                a: (*pa).clone(),
                b: (*pb).clone(),
            })
        })
        .collect()
}

/// Outcome of a cross-corpus run: diagnostic only, nothing is removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlapResolution {
    pub report: OverlapReport,
    pub entries: Vec<AuditEntry>,
}

/// Detect leakage of corpus A (reference) into corpus B (evaluation).
///
/// B files with exact or perceptual overlap become `review`; every other
/// file is kept. `filenames` is the pre-check computed from the listings.
pub fn resolve_cross_corpus(
    a: &CorpusIndex,
    b: &CorpusIndex,
    threshold: u32,
    filenames: Vec<FilenameOverlap>,
    gate: Option<&VerificationGate<'_>>,
) -> OverlapResolution {
    let mut report = OverlapReport {
        filename: filenames,
        ..OverlapReport::default()
    };

    for (label, index) in [("A", a), ("B", b)] {
        if index.is_empty() {
            let warning = OverlapWarning::PartialCorpus {
                corpus: label.to_string(),
            };
            log::warn!("{}", warning);
            report.warnings.push(warning);
        }
    }

    let comparisons = a.len().saturating_mul(b.len());
    if comparisons > LARGE_COMPARISON_WARNING {
        let warning = OverlapWarning::LargeComparison { comparisons };
        log::warn!("{}", warning);
        report.warnings.push(warning);
    }

    // Exact overlap: one pair per shared digest, paths from each index's
    // slot owner.
    for record in b.all_records() {
        if b.exact_lookup(&record.digest) != Some(record.path.as_path()) {
            continue;
        }
        if let Some(pa) = a.exact_lookup(&record.digest) {
            report.exact.push(ExactOverlap {
                digest: record.digest,
                a: pa.to_path_buf(),
                b: record.path.clone(),
            });
        }
    }
    report.exact.sort_by(|x, y| path_order(&x.b, &y.b));

    // Perceptual overlap: nearest A file for every B file.
    for record in b.all_records() {
        let nearest = a
            .all_records()
            .iter()
            .map(|candidate| (record.phash.distance(&candidate.phash), candidate))
            .min_by(|(da, ra), (db, rb)| da.cmp(db).then_with(|| path_order(&ra.path, &rb.path)));

        if let Some((distance, candidate)) = nearest {
            if distance <= threshold {
                let check = gate.map(|gate| {
                    let verdict = gate.check(&candidate.path, &record.path, distance);
                    match (&verdict.justification, verdict.is_verified()) {
                        (Justification::Similarity { score, .. }, true) => {
                            PairCheck::Verified { score: *score }
                        }
                        (Justification::Similarity { score, .. }, false) => {
                            PairCheck::Questionable { score: *score }
                        }
                        (Justification::ScoreUnavailable { reason, .. }, _) => {
                            PairCheck::Unavailable {
                                reason: reason.clone(),
                            }
                        }
                        (other, _) => PairCheck::Unavailable {
                            reason: other.to_string(),
                        },
                    }
                });
                report.perceptual.push(PerceptualOverlap {
                    a: candidate.path.clone(),
                    b: record.path.clone(),
                    distance,
                    check,
                });
            }
        }
    }

    let mut entries = Vec::with_capacity(a.len() + b.len());
    for record in a.all_records() {
        entries.push(AuditEntry::keep(
            record.path.clone(),
            Justification::ReferenceCorpus,
        ));
    }
    for record in b.all_records() {
        let exact = a.exact_lookup(&record.digest);
        let near = report.perceptual.iter().find(|p| p.b == record.path);
        let entry = match (exact, near) {
            (Some(other), _) => AuditEntry::review(
                record.path.clone(),
                Some(Confidence::Exact),
                Justification::Overlap {
                    other: other.to_path_buf(),
                    digest_match: true,
                    distance: None,
                },
            ),
            (None, Some(p)) => AuditEntry::review(
                record.path.clone(),
                Some(match p.check {
                    Some(PairCheck::Verified { .. }) => Confidence::NearVerified,
                    _ => Confidence::NearUnverified,
                }),
                Justification::Overlap {
                    other: p.a.clone(),
                    digest_match: false,
                    distance: Some(p.distance),
                },
            ),
            (None, None) => AuditEntry::keep(record.path.clone(), Justification::Unique),
        };
        entries.push(entry);
    }

    OverlapResolution { report, entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerificationConfig;
    use crate::core::index::tests::record;
    use crate::core::verify::tests::FixedScorer;

    fn decisions(resolution: &Resolution) -> Vec<(String, Decision)> {
        resolution
            .entries
            .iter()
            .map(|e| (e.path.to_string_lossy().into_owned(), e.decision))
            .collect()
    }

    #[test]
    fn test_sequential_scenario_distances_0_2_10() {
        // Frame 1 hash 0; frame 2 differs by 2 bits; frame 3 by 10 bits.
        let index = CorpusIndex::build(vec![
            record("f1.jpg", 1, 0),
            record("f2.jpg", 2, 0b11),
            record("f3.jpg", 3, 0b11_1111_1111),
        ]);
        let resolution = resolve_sequential(&index, 7);

        assert_eq!(
            decisions(&resolution),
            vec![
                ("f1.jpg".to_string(), Decision::Keep),
                ("f2.jpg".to_string(), Decision::Remove),
                ("f3.jpg".to_string(), Decision::Keep),
            ]
        );
        assert_eq!(resolution.clusters.len(), 1);
        assert_eq!(resolution.clusters[0].representative, PathBuf::from("f1.jpg"));
        assert_eq!(resolution.clusters[0].members[0].path, PathBuf::from("f2.jpg"));
        assert_eq!(
            resolution.entries[1].justification,
            Justification::Hamming {
                original: PathBuf::from("f1.jpg"),
                distance: 2
            }
        );
    }

    #[test]
    fn test_sequential_compares_only_to_last_survivor() {
        // f2 is close to f1, f3 is far from f1 but f4 returns to f1's
        // content: f4 is compared against f3, not f1, so it is kept.
        let index = CorpusIndex::build(vec![
            record("f1.jpg", 1, 0),
            record("f2.jpg", 2, 0b1),
            record("f3.jpg", 3, u64::MAX),
            record("f4.jpg", 4, 0),
        ]);
        let resolution = resolve_sequential(&index, 7);
        assert_eq!(
            decisions(&resolution)
                .into_iter()
                .map(|(_, d)| d)
                .collect::<Vec<_>>(),
            vec![Decision::Keep, Decision::Remove, Decision::Keep, Decision::Keep]
        );
    }

    #[test]
    fn test_sequential_drift_does_not_move_survivor() {
        // Each frame is 4 bits from the previous one but the survivor only
        // changes once the drift from f1 exceeds the threshold.
        let index = CorpusIndex::build(vec![
            record("f1.jpg", 1, 0),
            record("f2.jpg", 2, 0xF),
            record("f3.jpg", 3, 0xFF),
        ]);
        let resolution = resolve_sequential(&index, 7);
        assert_eq!(resolution.entries[1].decision, Decision::Remove);
        assert_eq!(resolution.entries[2].decision, Decision::Keep);
    }

    #[test]
    fn test_sequential_tags_byte_identical_frames_exact() {
        let index = CorpusIndex::build(vec![record("f1.jpg", 1, 0), record("f2.jpg", 1, 0)]);
        let resolution = resolve_sequential(&index, 7);
        assert_eq!(resolution.entries[1].confidence, Some(Confidence::Exact));
    }

    #[test]
    fn test_full_corpus_exact_pass_removes_larger_name() {
        let index = CorpusIndex::build(vec![
            record("copy_b.jpg", 7, 0),
            record("Copy_A.jpg", 7, 0),
        ]);
        let resolution = resolve_full_corpus(&index, 3, None);

        let kept: Vec<_> = resolution.entries.iter().filter(|e| e.decision == Decision::Keep).collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].path, PathBuf::from("Copy_A.jpg"));

        let removed: Vec<_> = resolution.entries.iter().filter(|e| e.decision == Decision::Remove).collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].path, PathBuf::from("copy_b.jpg"));
        assert_eq!(removed[0].confidence, Some(Confidence::Exact));
        assert_eq!(resolution.clusters[0].confidence(), Some(Confidence::Exact));
    }

    #[test]
    fn test_full_corpus_perceptual_clusters_are_disjoint() {
        let index = CorpusIndex::build(vec![
            record("a.jpg", 1, 0),
            record("b.jpg", 2, 0b1),
            record("c.jpg", 3, 0b111),
            record("d.jpg", 4, u64::MAX),
            record("e.jpg", 5, u64::MAX ^ 0b1),
        ]);
        let resolution = resolve_full_corpus(&index, 3, None);

        assert_eq!(resolution.clusters.len(), 2);
        assert_eq!(resolution.clusters[0].representative, PathBuf::from("a.jpg"));
        let first: Vec<_> = resolution.clusters[0].members.iter().map(|m| m.path.clone()).collect();
        assert_eq!(first, vec![PathBuf::from("b.jpg"), PathBuf::from("c.jpg")]);
        assert_eq!(resolution.clusters[1].representative, PathBuf::from("d.jpg"));
        assert_eq!(
            resolution.clusters[0].confidence(),
            Some(Confidence::NearUnverified)
        );

        let mut seen = std::collections::HashSet::new();
        for cluster in &resolution.clusters {
            assert!(seen.insert(cluster.representative.clone()));
            for member in &cluster.members {
                assert!(seen.insert(member.path.clone()));
            }
        }
        assert_eq!(resolution.entries.len(), 5);
    }

    #[test]
    fn test_full_corpus_exact_copies_follow_their_member() {
        // b and b2 are byte-identical; b is perceptually close to a.
        let index = CorpusIndex::build(vec![
            record("a.jpg", 1, 0),
            record("b.jpg", 2, 0b1),
            record("b2.jpg", 2, 0b1),
        ]);
        let resolution = resolve_full_corpus(&index, 3, None);

        assert_eq!(resolution.clusters.len(), 1);
        let cluster = &resolution.clusters[0];
        assert_eq!(cluster.representative, PathBuf::from("a.jpg"));
        assert_eq!(cluster.members.len(), 2);

        let b2 = resolution
            .entries
            .iter()
            .find(|e| e.path == Path::new("b2.jpg"))
            .unwrap();
        assert_eq!(
            b2.justification,
            Justification::DigestMatch {
                original: PathBuf::from("b.jpg")
            }
        );
    }

    #[test]
    fn test_full_corpus_gate_demotes_low_similarity() {
        let index = CorpusIndex::build(vec![
            record("a.jpg", 1, 0),
            record("b.jpg", 2, 0b11),
            record("c.jpg", 3, 0b1),
        ]);
        let scorer = FixedScorer::new(&[("b.jpg", 0.6), ("c.jpg", 0.99)]);
        let gate = VerificationGate::new(&scorer, &VerificationConfig::default());
        let resolution = resolve_full_corpus(&index, 3, Some(&gate));

        let b = resolution.entries.iter().find(|e| e.path == Path::new("b.jpg")).unwrap();
        assert_eq!(b.decision, Decision::Review);
        let c = resolution.entries.iter().find(|e| e.path == Path::new("c.jpg")).unwrap();
        assert_eq!(c.decision, Decision::Remove);
        assert_eq!(c.confidence, Some(Confidence::NearVerified));
    }

    #[test]
    fn test_full_corpus_threshold_monotonic() {
        let records = vec![
            record("a.jpg", 1, 0),
            record("b.jpg", 2, 0b1),
            record("c.jpg", 3, 0b1111),
            record("d.jpg", 4, 0xFFFF_0000),
            record("e.jpg", 5, 0xFFFF_0001),
        ];
        let mut previous = 0;
        for threshold in 0..=12 {
            let index = CorpusIndex::build(records.clone());
            let resolution = resolve_full_corpus(&index, threshold, None);
            let clustered: usize = resolution
                .clusters
                .iter()
                .map(|c| c.members.len() + 1)
                .sum();
            assert!(clustered >= previous, "threshold {}", threshold);
            previous = clustered;
        }
    }

    #[test]
    fn test_cross_corpus_exact_overlap_single_pair() {
        let a = CorpusIndex::build(vec![record("train/a.jpg", 9, 0)]);
        let b = CorpusIndex::build(vec![record("val/b.jpg", 9, 0)]);
        let filenames = filename_overlap(
            &[PathBuf::from("train/a.jpg")],
            &[PathBuf::from("val/b.jpg")],
        );
        let resolution = resolve_cross_corpus(&a, &b, 8, filenames, None);

        assert_eq!(resolution.report.exact.len(), 1);
        assert_eq!(resolution.report.exact[0].a, PathBuf::from("train/a.jpg"));
        assert_eq!(resolution.report.exact[0].b, PathBuf::from("val/b.jpg"));
        assert!(resolution.report.filename.is_empty());
        assert!(resolution.entries.iter().all(|e| e.decision != Decision::Remove));
        assert_eq!(resolution.entries[1].decision, Decision::Review);
    }

    #[test]
    fn test_cross_corpus_exact_pair_uses_later_insert() {
        let a = CorpusIndex::build(vec![
            record("train/first.jpg", 9, 0),
            record("train/second.jpg", 9, 0),
        ]);
        let b = CorpusIndex::build(vec![record("val/x.jpg", 9, 0)]);
        let resolution = resolve_cross_corpus(&a, &b, 8, Vec::new(), None);
        assert_eq!(resolution.report.exact.len(), 1);
        assert_eq!(resolution.report.exact[0].a, PathBuf::from("train/second.jpg"));
    }

    #[test]
    fn test_cross_corpus_perceptual_nearest_match() {
        let a = CorpusIndex::build(vec![
            record("train/far.jpg", 1, 0xFF),
            record("train/near.jpg", 2, 0b1),
        ]);
        let b = CorpusIndex::build(vec![
            record("val/close.jpg", 3, 0),
            record("val/unrelated.jpg", 4, u64::MAX << 32),
        ]);
        let resolution = resolve_cross_corpus(&a, &b, 8, Vec::new(), None);

        assert!(resolution.report.exact.is_empty());
        assert_eq!(resolution.report.perceptual.len(), 1);
        let pair = &resolution.report.perceptual[0];
        assert_eq!(pair.a, PathBuf::from("train/near.jpg"));
        assert_eq!(pair.b, PathBuf::from("val/close.jpg"));
        assert_eq!(pair.distance, 1);
        assert_eq!(resolution.entries[3].decision, Decision::Keep);
    }

    #[test]
    fn test_cross_corpus_partial_corpus_warns() {
        let a = CorpusIndex::build(Vec::new());
        let b = CorpusIndex::build(vec![record("val/x.jpg", 1, 0)]);
        let resolution = resolve_cross_corpus(&a, &b, 8, Vec::new(), None);

        assert!(resolution.report.is_clean());
        assert_eq!(
            resolution.report.warnings,
            vec![OverlapWarning::PartialCorpus {
                corpus: "A".to_string()
            }]
        );
        assert_eq!(resolution.entries.len(), 1);
        assert_eq!(resolution.entries[0].decision, Decision::Keep);
    }

    #[test]
    fn test_cross_corpus_gate_annotates_pairs() {
        let a = CorpusIndex::build(vec![record("train/a.jpg", 1, 0)]);
        let b = CorpusIndex::build(vec![record("val/b.jpg", 2, 0b1)]);
        let scorer = FixedScorer::new(&[("val/b.jpg", 0.5)]);
        let gate = VerificationGate::new(&scorer, &VerificationConfig::default());
        let resolution = resolve_cross_corpus(&a, &b, 8, Vec::new(), Some(&gate));
        assert_eq!(
            resolution.report.perceptual[0].check,
            Some(PairCheck::Questionable { score: 0.5 })
        );
    }

    #[test]
    fn test_filename_overlap_is_case_insensitive() {
        let a = vec![PathBuf::from("train/IMG_1.JPG"), PathBuf::from("train/x.jpg")];
        let b = vec![PathBuf::from("val/img_1.jpg"), PathBuf::from("val/y.jpg")];
        let overlap = filename_overlap(&a, &b);
        assert_eq!(overlap.len(), 1);
        assert_eq!(overlap[0].name, "img_1.jpg");
        assert_eq!(overlap[0].a, PathBuf::from("train/IMG_1.JPG"));
        assert_eq!(overlap[0].b, PathBuf::from("val/img_1.jpg"));
    }
}
