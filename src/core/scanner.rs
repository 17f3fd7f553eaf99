use crate::config::ScanConfig;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::{DirEntry, WalkDir};

/// Lists image files under a corpus root.
pub struct Scanner {
    recursive: bool,
    extensions: HashSet<String>,
    exclude: Option<PathBuf>,
}

impl Scanner {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            recursive: config.recursive,
            extensions: config
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude: None,
        }
    }

    /// Never descend into `dir` (the quarantine directory).
    pub fn excluding(mut self, dir: Option<&Path>) -> Self {
        self.exclude = dir.map(Path::to_path_buf);
        self
    }

    pub fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Walk `root`, returning image file paths in walk order.
    pub fn scan(&self, root: &Path) -> Vec<PathBuf> {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("Scanning {} for images…", root.display()));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut images = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded(entry));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.is_image(entry.path()) {
                        images.push(entry.into_path());
                    }
                }
                Err(e) => log::warn!("Skipping unreadable directory entry: {}", e),
            }
            spinner.tick();
        }

        spinner.finish_and_clear();
        log::info!("Found {} image(s) under {}", images.len(), root.display());
        images
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        let hidden = entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false);
        if hidden {
            return true;
        }
        match &self.exclude {
            Some(dir) => entry.file_type().is_dir() && same_dir(entry.path(), dir),
            None => false,
        }
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_filters_extensions_case_insensitively() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("a.JPG"));
        touch(&temp_dir.path().join("b.png"));
        touch(&temp_dir.path().join("c.tiff"));
        touch(&temp_dir.path().join("notes.txt"));
        touch(&temp_dir.path().join("anim.gif"));

        let scanner = Scanner::new(&ScanConfig::default());
        let mut found = scanner.scan(temp_dir.path());
        found.sort();

        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.tiff"]);
    }

    #[test]
    fn test_flat_scan_ignores_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("top.jpg"));
        touch(&temp_dir.path().join("nested/deep.jpg"));

        let recursive = Scanner::new(&ScanConfig::default());
        assert_eq!(recursive.scan(temp_dir.path()).len(), 2);

        let flat = Scanner::new(&ScanConfig {
            recursive: false,
            ..ScanConfig::default()
        });
        assert_eq!(flat.scan(temp_dir.path()).len(), 1);
    }

    #[test]
    fn test_skips_quarantine_and_hidden_entries() {
        let temp_dir = TempDir::new().unwrap();
        let backup = temp_dir.path().join("duplicates_backup");
        touch(&temp_dir.path().join("keep.jpg"));
        touch(&backup.join("moved.jpg"));
        touch(&temp_dir.path().join(".cache/thumb.jpg"));

        let scanner = Scanner::new(&ScanConfig::default()).excluding(Some(&backup));
        let found = scanner.scan(temp_dir.path());
        assert_eq!(found, vec![temp_dir.path().join("keep.jpg")]);
    }
}
