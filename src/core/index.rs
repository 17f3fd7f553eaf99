use crate::core::fingerprint::{Digest, FileRecord};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Fingerprint lookup over one corpus. Owns its records for the run; the
/// resolvers refer to them by position.
#[derive(Debug, Default)]
pub struct CorpusIndex {
    records: Vec<FileRecord>,
    by_digest: HashMap<Digest, usize>,
}

impl CorpusIndex {
    /// Build in one pass over `records`, keeping their order as insertion
    /// order. Sort before calling if the mode needs a particular order.
    pub fn build(records: Vec<FileRecord>) -> Self {
        let mut by_digest = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            // Later insert wins: of two byte-identical files the one listed
            // last owns the digest slot.
            by_digest.insert(record.digest, i);
        }
        Self { records, by_digest }
    }

    pub fn exact_lookup(&self, digest: &Digest) -> Option<&Path> {
        self.by_digest
            .get(digest)
            .map(|&i| self.records[i].path.as_path())
    }

    pub fn all_records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn get(&self, i: usize) -> &FileRecord {
        &self.records[i]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Groups of digest-equal record positions, ordered by first appearance.
    /// Singletons are included.
    pub fn digest_groups(&self) -> Vec<Vec<usize>> {
        let mut slot: HashMap<Digest, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (i, record) in self.records.iter().enumerate() {
            match slot.get(&record.digest) {
                Some(&g) => groups[g].push(i),
                None => {
                    slot.insert(record.digest, groups.len());
                    groups.push(vec![i]);
                }
            }
        }
        groups
    }
}

/// Case-insensitive path order with the raw path as tie-break.
pub fn path_order(a: &Path, b: &Path) -> Ordering {
    let la = a.to_string_lossy().to_lowercase();
    let lb = b.to_string_lossy().to_lowercase();
    la.cmp(&lb).then_with(|| a.cmp(b))
}

pub fn sort_by_path(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| path_order(a, b));
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    Number(u128, usize),
    Text(String),
}

fn chunks(s: &str) -> Vec<Chunk> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        let digit = c.is_ascii_digit();
        let mut run = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() != digit {
                break;
            }
            run.push(c);
            chars.next();
        }
        if digit {
            let trimmed = run.trim_start_matches('0');
            match trimmed.parse::<u128>() {
                // Leading zeros only break ties: "07" sorts after "7".
                Ok(n) => out.push(Chunk::Number(n, run.len())),
                Err(_) if trimmed.is_empty() => out.push(Chunk::Number(0, run.len())),
                Err(_) => out.push(Chunk::Text(run)),
            }
        } else {
            out.push(Chunk::Text(run.to_lowercase()));
        }
    }
    out
}

/// Filename order for frame sequences: digit runs compare numerically, so
/// `frame_2` precedes `frame_10`. Ties fall back to the raw path.
pub fn natural_order(a: &Path, b: &Path) -> Ordering {
    let key = |p: &Path| {
        (
            p.parent().map(|d| d.to_string_lossy().to_lowercase()),
            p.file_name()
                .map(|n| chunks(&n.to_string_lossy()))
                .unwrap_or_default(),
        )
    };
    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

pub fn sort_naturally(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| natural_order(a, b));
}
