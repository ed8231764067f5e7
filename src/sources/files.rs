use std::path::{Path, PathBuf};

use tracing::debug;

use crate::traits::SourceError;

/// One content hit from a filesystem search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMatch {
    pub path: PathBuf,
    pub line_number: usize,
    /// First matching line, trimmed.
    pub preview: String,
}

const MAX_RESULTS: usize = 20;

/// Case-insensitive substring search over file contents under `root`.
///
/// Bounded: scans at most `max_files` files, returns at most 20 matches,
/// skips hidden entries and anything that is not valid UTF-8. Symlinks are
/// not followed.
pub fn search_files(
    root: &Path,
    query: &str,
    max_files: usize,
) -> Result<Vec<FileMatch>, SourceError> {
    if !root.is_dir() {
        return Err(SourceError::Unavailable(format!(
            "search root {} is not a directory",
            root.display()
        )));
    }
    let needle = query.to_lowercase();
    let mut matches = Vec::new();
    let mut scanned = 0usize;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => continue,
            Err(e) => {
                return Err(SourceError::Unavailable(format!(
                    "reading {}: {e}",
                    dir.display()
                )))
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            if scanned >= max_files {
                debug!(max_files, "file scan budget exhausted");
                return Ok(matches);
            }
            scanned += 1;
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue; // binary or unreadable
            };
            for (idx, line) in content.lines().enumerate() {
                if line.to_lowercase().contains(&needle) {
                    matches.push(FileMatch {
                        path: path.clone(),
                        line_number: idx + 1,
                        preview: line.trim().chars().take(200).collect(),
                    });
                    if matches.len() >= MAX_RESULTS {
                        return Ok(matches);
                    }
                    break; // one preview per file
                }
            }
        }
    }
    Ok(matches)
}

/// Read a UTF-8 file under `root`, refusing paths that escape it and files
/// over `max_bytes`.
pub fn read_file_capped(root: &Path, rel: &str, max_bytes: u64) -> Result<String, SourceError> {
    let candidate = root.join(rel);
    let canonical = candidate.canonicalize().map_err(|e| {
        SourceError::Unavailable(format!("cannot open {}: {e}", candidate.display()))
    })?;
    let canonical_root = root
        .canonicalize()
        .map_err(|e| SourceError::Unavailable(format!("bad file root: {e}")))?;
    if !canonical.starts_with(&canonical_root) {
        return Err(SourceError::PermissionDenied(format!(
            "{rel} resolves outside the allowed directory"
        )));
    }

    let meta = std::fs::metadata(&canonical)
        .map_err(|e| SourceError::Unavailable(format!("stat {rel}: {e}")))?;
    if !meta.is_file() {
        return Err(SourceError::Unavailable(format!("{rel} is not a file")));
    }
    if meta.len() > max_bytes {
        return Err(SourceError::Unavailable(format!(
            "{rel} is {} bytes, over the {max_bytes}-byte read limit",
            meta.len()
        )));
    }
    std::fs::read_to_string(&canonical)
        .map_err(|e| SourceError::Unavailable(format!("reading {rel}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "Remember the milk\nand eggs").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/plan.md"), "MILK delivery schedule").unwrap();
        fs::write(dir.path().join(".hidden"), "milk secret").unwrap();
        dir
    }

    #[test]
    fn search_finds_case_insensitive_matches() {
        let dir = setup();
        let mut hits = search_files(dir.path(), "milk", 100).unwrap();
        hits.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].line_number, 1);
        assert!(hits[0].preview.contains("milk") || hits[0].preview.contains("MILK"));
    }

    #[test]
    fn hidden_files_are_skipped() {
        let dir = setup();
        let hits = search_files(dir.path(), "secret", 100).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn scan_budget_caps_work() {
        let dir = setup();
        let hits = search_files(dir.path(), "milk", 0).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn read_respects_size_cap() {
        let dir = setup();
        let content = read_file_capped(dir.path(), "notes.txt", 1024).unwrap();
        assert!(content.contains("milk"));

        let err = read_file_capped(dir.path(), "notes.txt", 4).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[test]
    fn path_escape_is_permission_denied() {
        let dir = setup();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("leak.txt"), "nope").unwrap();
        let rel = format!("../{}/leak.txt", outside.path().file_name().unwrap().to_string_lossy());
        // tempdirs share a parent, so the traversal resolves but escapes root.
        let err = read_file_capped(dir.path(), &rel, 1024).unwrap_err();
        assert!(matches!(err, SourceError::PermissionDenied(_)));
    }
}
