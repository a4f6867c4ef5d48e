//! Pre-transfer source survey
//!
//! A single read-only walk over the source subtree, producing the totals
//! that drive progress reporting and the dry-run listing.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::warn;
use walkdir::WalkDir;

/// Totals for one source subtree
#[derive(Debug, Clone)]
pub struct Survey {
    /// Root path that was surveyed
    pub root: PathBuf,
    /// Regular files found
    pub files: u64,
    /// Directories found (excluding the root)
    pub directories: u64,
    /// Sum of file sizes in bytes
    pub total_bytes: u64,
    /// Entries that could not be read
    pub errors: Vec<String>,
    /// Walk duration
    pub duration: Duration,
}

impl Survey {
    /// True when every entry was readable
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Walk `root` and tally files, directories, and bytes.
///
/// Unreadable entries are recorded, not fatal; symlinks are not followed,
/// matching the transfer traversal.
pub fn survey(root: &Path) -> Survey {
    let start = Instant::now();
    let mut result = Survey {
        root: root.to_path_buf(),
        files: 0,
        directories: 0,
        total_bytes: 0,
        errors: Vec::new(),
        duration: Duration::ZERO,
    };

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "survey: unreadable entry");
                result.errors.push(e.to_string());
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_file() {
            match entry.metadata() {
                Ok(metadata) => {
                    result.files += 1;
                    result.total_bytes += metadata.len();
                }
                Err(e) => result.errors.push(e.to_string()),
            }
        } else if file_type.is_dir() && entry.path() != root {
            result.directories += 1;
        }
    }

    result.duration = start.elapsed();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write as _;

    #[test]
    fn test_survey_counts_files_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::create_dir(root.join("sub")).unwrap();

        fs::File::create(root.join("a.bin"))
            .unwrap()
            .write_all(&[0u8; 100])
            .unwrap();
        fs::File::create(root.join("sub/b.bin"))
            .unwrap()
            .write_all(&[0u8; 50])
            .unwrap();

        let survey = survey(&root);
        assert_eq!(survey.files, 2);
        assert_eq!(survey.directories, 1);
        assert_eq!(survey.total_bytes, 150);
        assert!(survey.is_clean());
    }

    #[test]
    fn test_survey_of_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("only.bin");
        fs::File::create(&file)
            .unwrap()
            .write_all(&[1u8; 42])
            .unwrap();

        let survey = survey(&file);
        assert_eq!(survey.files, 1);
        assert_eq!(survey.directories, 0);
        assert_eq!(survey.total_bytes, 42);
    }

    #[test]
    fn test_survey_missing_root_records_error() {
        let survey = survey(Path::new("/no/such/tree"));
        assert_eq!(survey.files, 0);
        assert!(!survey.is_clean());
    }
}
