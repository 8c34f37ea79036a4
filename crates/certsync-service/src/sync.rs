//! One-way folder synchronization by content hash
//!
//! Files are matched by file name only (case-insensitive), wherever they
//! sit below the two roots. A source file is transferred into the target
//! root when the target has no file of that name or its SHA3-256 differs;
//! target files whose name does not occur in the source are deleted.
//! When several source files share a name, the one nearest the source root
//! (then first in path order) is used and the rest are skipped.
//! Per-file I/O errors are logged and counted, never fatal.

use sha3::{Digest, Sha3_256};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// File path to lowercase hex SHA3-256 of its contents
pub type HashIndex = HashMap<PathBuf, String>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Cannot index {path}: {source}")]
    Index {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
}

/// How a changed source file reaches the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    /// Rename into the target; the source file is consumed
    #[default]
    Move,
    /// Copy into the target; the source is left intact
    Copy,
}

/// Counters for one sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub transferred: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Source files shadowed by another file of the same name
    pub skipped: usize,
    pub failed: usize,
}

/// Regular files below `root`, recursively
///
/// Symbolic links are not followed. A directory that cannot be listed
/// fails the walk.
pub(crate) fn collect_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

fn sha3_hex(path: &Path) -> io::Result<String> {
    let contents = fs::read(path)?;
    Ok(hex::encode(Sha3_256::digest(&contents)))
}

/// Hash every regular file below `root`
///
/// Files that cannot be read are skipped with an error log.
pub fn hash_index(root: &Path) -> Result<HashIndex, SyncError> {
    if !root.is_dir() {
        return Err(SyncError::NotADirectory(root.to_path_buf()));
    }

    let files = collect_files(root).map_err(|source| SyncError::Index {
        path: root.to_path_buf(),
        source,
    })?;

    let mut index = HashIndex::with_capacity(files.len());
    for path in files {
        match sha3_hex(&path) {
            Ok(hash) => {
                index.insert(path, hash);
            }
            Err(e) => error!(path = %path.display(), "Failed to hash file: {}", e),
        }
    }
    Ok(index)
}

fn file_name_key(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
}

fn nearest_first(a: &Path, b: &Path) -> Ordering {
    a.components()
        .count()
        .cmp(&b.components().count())
        .then_with(|| a.cmp(b))
}

type NameGroups<'a> = HashMap<String, Vec<(&'a PathBuf, &'a String)>>;

/// Index entries grouped by lowercase file name, nearest to the root first
fn group_by_name(index: &HashIndex) -> NameGroups<'_> {
    let mut entries: Vec<_> = index.iter().collect();
    entries.sort_by(|a, b| nearest_first(a.0, b.0));

    let mut groups = NameGroups::new();
    for (path, hash) in entries {
        if let Some(key) = file_name_key(path) {
            groups.entry(key).or_default().push((path, hash));
        }
    }
    groups
}

/// Mirrors a source folder into a target folder
#[derive(Debug, Clone, Copy, Default)]
pub struct FolderSyncEngine {
    mode: TransferMode,
}

impl FolderSyncEngine {
    pub fn new(mode: TransferMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Make the target's files match the source's, one way
    pub fn sync(&self, source: &Path, target: &Path) -> Result<SyncReport, SyncError> {
        let source_index = hash_index(source)?;
        let target_index = hash_index(target)?;
        info!(
            source = %source.display(),
            target = %target.display(),
            source_files = source_index.len(),
            target_files = target_index.len(),
            mode = ?self.mode,
            "Synchronizing folders"
        );

        let source_groups = group_by_name(&source_index);
        let target_groups = group_by_name(&target_index);

        let mut names: Vec<&String> = source_groups.keys().collect();
        names.sort();

        let mut report = SyncReport::default();
        for key in names {
            let group = &source_groups[key];
            let (path, hash) = group[0];
            for (shadowed, _) in &group[1..] {
                warn!(
                    kept = %path.display(),
                    skipped = %shadowed.display(),
                    "Duplicate file name in source, skipping"
                );
                report.skipped += 1;
            }
            let Some(name) = path.file_name() else {
                continue;
            };
            let matches = target_groups.get(key).map_or(&[][..], Vec::as_slice);

            if let Some(current) = matches
                .iter()
                .position(|(_, target_hash)| target_hash.eq_ignore_ascii_case(hash))
            {
                report.unchanged += 1;
                remove_redundant(matches, Some(current), &mut report);
                continue;
            }

            // A root-level match is overwritten under its own name, so a name
            // differing only in case never stands for a second file.
            let slot = matches
                .iter()
                .position(|(existing, _)| existing.parent() == Some(target));
            let destination = slot.map_or_else(|| target.join(name), |i| matches[i].0.clone());

            match self.transfer(path, &destination) {
                Ok(()) => {
                    report.transferred += 1;
                    remove_redundant(matches, slot, &mut report);
                }
                Err(e) => {
                    error!(
                        from = %path.display(),
                        to = %destination.display(),
                        "Failed to transfer file: {}",
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        for path in target_index.keys() {
            let keep = file_name_key(path).map_or(false, |key| source_groups.contains_key(&key));
            if !keep {
                info!(path = %path.display(), "Deleting file missing from source");
                if remove_file(path, &mut report) {
                    report.deleted += 1;
                }
            }
        }

        info!(
            transferred = report.transferred,
            deleted = report.deleted,
            unchanged = report.unchanged,
            failed = report.failed,
            "Folder sync finished"
        );
        Ok(report)
    }

    fn transfer(&self, from: &Path, to: &Path) -> io::Result<()> {
        match self.mode {
            TransferMode::Copy => {
                info!(from = %from.display(), to = %to.display(), "Copying file");
                fs::copy(from, to).map(|_| ())
            }
            TransferMode::Move => {
                info!(from = %from.display(), to = %to.display(), "Moving file");
                match fs::rename(from, to) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                        warn!(
                            from = %from.display(),
                            "Move denied, copying instead and leaving source in place"
                        );
                        fs::copy(from, to).map(|_| ())
                    }
                    Err(e) => {
                        debug!(from = %from.display(), "Rename failed ({}), copying", e);
                        fs::copy(from, to)?;
                        fs::remove_file(from)
                    }
                }
            }
        }
    }
}

/// Delete every target match except the one at `keep`
fn remove_redundant(matches: &[(&PathBuf, &String)], keep: Option<usize>, report: &mut SyncReport) {
    for (i, (path, _)) in matches.iter().enumerate() {
        if Some(i) != keep {
            info!(path = %path.display(), "Deleting superseded copy");
            if remove_file(path, report) {
                report.deleted += 1;
            }
        }
    }
}

fn remove_file(path: &Path, report: &mut SyncReport) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            error!(path = %path.display(), "Failed to delete file: {}", e);
            report.failed += 1;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &[u8]) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_hash_index_is_sha3_256() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "empty.der", b"");

        let index = hash_index(dir.path()).unwrap();
        assert_eq!(
            index[&dir.path().join("empty.der")],
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn test_hash_index_recurses() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        write(dir.path(), "a.der", b"a");
        write(&dir.path().join("nested"), "b.der", b"b");

        assert_eq!(hash_index(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_hash_index_rejects_missing_root() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            hash_index(&dir.path().join("missing")),
            Err(SyncError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_case_insensitive_name_match() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "GA-1.der", b"same");
        write(target.path(), "ga-1.der", b"same");

        let report = FolderSyncEngine::new(TransferMode::Copy)
            .sync(source.path(), target.path())
            .unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.deleted, 0);
        assert!(target.path().join("ga-1.der").exists());
    }

    #[test]
    fn test_stale_file_in_subdirectory_is_replaced() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::create_dir(target.path().join("old")).unwrap();
        write(source.path(), "a.der", b"fresh");
        write(&target.path().join("old"), "a.der", b"stale");

        let report = FolderSyncEngine::new(TransferMode::Move)
            .sync(source.path(), target.path())
            .unwrap();

        assert_eq!(report.transferred, 1);
        assert_eq!(fs::read(target.path().join("a.der")).unwrap(), b"fresh");
        assert!(!target.path().join("old").join("a.der").exists());
    }

    #[test]
    fn test_duplicate_source_names_settle_after_one_run() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::create_dir(source.path().join("sub")).unwrap();
        write(source.path(), "x.der", b"one");
        write(&source.path().join("sub"), "X.der", b"two");
        let engine = FolderSyncEngine::new(TransferMode::Copy);

        let first = engine.sync(source.path(), target.path()).unwrap();
        assert_eq!(first.transferred, 1);
        assert_eq!(first.skipped, 1);
        assert_eq!(fs::read(target.path().join("x.der")).unwrap(), b"one");

        let second = engine.sync(source.path(), target.path()).unwrap();
        assert_eq!(second.transferred, 0);
        assert_eq!(second.deleted, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(fs::read(target.path().join("x.der")).unwrap(), b"one");
    }

    #[test]
    fn test_changed_file_differing_only_in_case_is_overwritten_in_place() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "ga-1.der", b"renewed");
        write(target.path(), "GA-1.der", b"stale");

        let report = FolderSyncEngine::new(TransferMode::Copy)
            .sync(source.path(), target.path())
            .unwrap();

        assert_eq!(report.transferred, 1);
        assert_eq!(report.deleted, 0);
        assert_eq!(report.failed, 0);
        let names: Vec<_> = fs::read_dir(target.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["GA-1.der"]);
        assert_eq!(fs::read(target.path().join("GA-1.der")).unwrap(), b"renewed");
    }

    #[test]
    fn test_redundant_target_copies_are_pruned() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::create_dir(target.path().join("old")).unwrap();
        write(source.path(), "a.der", b"same");
        write(target.path(), "a.der", b"same");
        write(&target.path().join("old"), "a.der", b"older");

        let report = FolderSyncEngine::new(TransferMode::Copy)
            .sync(source.path(), target.path())
            .unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.deleted, 1);
        assert!(!target.path().join("old").join("a.der").exists());
    }
}
