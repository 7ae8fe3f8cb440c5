use crate::batch::ClassificationTask;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
#[error("failed to list {}: {source}", .root.display())]
pub struct ScanError {
    pub root: PathBuf,
    #[source]
    pub source: walkdir::Error,
}

/// Number of entries directly inside `root`, of any kind.
pub fn count_entries(root: &Path) -> u64 {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .count() as u64
}

/// Regular files directly inside `root`, sorted by file name.
///
/// Files whose extension matches `sidecar` (case-insensitively, with or
/// without a leading dot) are skipped:
/// they travel with their image and are never classified on their own.
/// Subfolders are not entered, so category folders from an earlier run are
/// left alone. Failing to read `root` itself is an error; an unreadable
/// entry inside it is logged and skipped.
pub fn collect_candidates(root: &Path, sidecar: Option<&str>) -> Result<Vec<PathBuf>, ScanError> {
    let mut candidates = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) if error.depth() == 0 => {
                return Err(ScanError {
                    root: root.to_path_buf(),
                    source: error,
                })
            }
            Err(error) => {
                tracing::warn!(%error, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || is_sidecar(entry.path(), sidecar) {
            continue;
        }
        candidates.push(entry.into_path());
    }

    tracing::debug!(root = %root.display(), candidates = candidates.len(), "collected candidates");
    Ok(candidates)
}

pub fn tasks_for(candidates: Vec<PathBuf>) -> Vec<ClassificationTask> {
    candidates.into_iter().map(ClassificationTask::from).collect()
}

fn is_sidecar(path: &Path, sidecar: Option<&str>) -> bool {
    match (sidecar, path.extension().and_then(|ext| ext.to_str())) {
        (Some(sidecar), Some(extension)) => {
            let sidecar = sidecar.strip_prefix('.').unwrap_or(sidecar);
            extension.eq_ignore_ascii_case(sidecar)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn candidates_skip_sidecars_and_folders() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();
        fs::write(dir.path().join("a.txt"), b"caption").unwrap();
        fs::write(dir.path().join("NOTES.TXT"), b"caption").unwrap();
        fs::create_dir(dir.path().join("cat")).unwrap();
        fs::write(dir.path().join("cat/old.jpg"), b"old").unwrap();

        let candidates = collect_candidates(dir.path(), Some("txt")).unwrap();
        assert_eq!(names(&candidates), vec!["a.png", "b.jpg"]);
        assert_eq!(count_entries(dir.path()), 5);
    }

    #[test]
    fn without_sidecar_every_file_is_a_candidate() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();
        fs::write(dir.path().join("a.txt"), b"caption").unwrap();

        let candidates = collect_candidates(dir.path(), None).unwrap();
        assert_eq!(names(&candidates), vec!["a.png", "a.txt"]);
        assert_eq!(tasks_for(candidates).len(), 2);
    }

    #[test]
    fn dotted_sidecar_extension_is_accepted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        fs::write(dir.path().join("a.txt"), b"caption").unwrap();

        let candidates = collect_candidates(dir.path(), Some(".txt")).unwrap();
        assert_eq!(names(&candidates), vec!["a.jpg"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let error = collect_candidates(&missing, Some("txt")).unwrap_err();
        assert_eq!(error.root, missing);
        assert_eq!(count_entries(&missing), 0);
    }
}
