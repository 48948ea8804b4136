//! Directory flush and overlay copy
//!
//! [`DirectorySync`] owns the base directory and the exclusion set. Relative
//! paths passed to any operation are resolved against the base first.
//!
//! Flush and copy are fatal-on-error: the first failing filesystem call aborts
//! the operation and the tree is left as far as it got. There is no rollback.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Error, ExclusionSet, NormalizedPath, Result};

/// One source/destination pair produced by walking a source tree.
///
/// Paths are native so entry names that are not valid UTF-8 survive intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub is_directory: bool,
}

/// Recursive flush and merge-copy over a base directory.
#[derive(Debug, Clone)]
pub struct DirectorySync {
    base: NormalizedPath,
    exclusions: ExclusionSet,
}

impl DirectorySync {
    /// Create a syncer rooted at `base` with no extra exclusions.
    pub fn new(base: impl Into<NormalizedPath>) -> Self {
        Self {
            base: base.into(),
            exclusions: ExclusionSet::new(),
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn base(&self) -> &NormalizedPath {
        &self.base
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// Resolve a base-relative or absolute path.
    pub fn resolve(&self, path: impl AsRef<Path>) -> NormalizedPath {
        self.base.resolve(path)
    }

    /// Flush `path` using the configured exclusion set.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry cannot be listed or deleted.
    pub fn flush(&self, path: impl AsRef<Path>, keep_root: bool) -> Result<()> {
        self.flush_excluding(path, &self.exclusions, keep_root)
    }

    /// Recursively empty `path`, skipping entries named in `exclusions`.
    ///
    /// With `keep_root` the directory itself survives; otherwise it is removed
    /// once emptied. A directory that still holds excluded entries after
    /// flushing is kept. A missing `path` is a no-op, as is a path that is
    /// not a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry cannot be listed or deleted.
    pub fn flush_excluding(
        &self,
        path: impl AsRef<Path>,
        exclusions: &ExclusionSet,
        keep_root: bool,
    ) -> Result<()> {
        let path = self.resolve(path);
        let native = path.to_native();

        match fs::symlink_metadata(&native) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                debug!(path = %path, "Not a directory, nothing to flush");
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path, "Directory does not exist, nothing to flush");
                return Ok(());
            }
            Err(e) => return Err(Error::io(native, e)),
        }

        flush_dir(&native, exclusions, keep_root)?;
        Ok(())
    }

    /// Create `path` and any missing ancestors.
    ///
    /// Existing paths are left alone, whatever their type.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_directory(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve(path);
        if path.exists() {
            return Ok(());
        }
        let native = path.to_native();
        fs::create_dir_all(&native).map_err(|e| Error::io(&native, e))?;
        debug!(path = %path, "Created directory");
        Ok(())
    }

    /// Walk `source` and pair every entry with its place under `destination`.
    ///
    /// Entries are listed pre-order, sorted by name, so every directory comes
    /// before its children. A file `source` yields a single entry targeting
    /// the literal `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceNotFound`] if `source` does not exist.
    pub fn build_file_list(
        &self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<Vec<FileListEntry>> {
        let source = self.resolve(source);
        let destination = self.resolve(destination);

        let meta = match fs::metadata(source.to_native()) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::SourceNotFound {
                    path: source.to_native(),
                });
            }
            Err(e) => return Err(Error::io(source.to_native(), e)),
        };

        let mut entries = Vec::new();
        if meta.is_dir() {
            self.walk(&source.to_native(), &destination.to_native(), &mut entries)?;
        } else {
            entries.push(FileListEntry {
                source: source.to_native(),
                destination: destination.to_native(),
                is_directory: false,
            });
        }
        Ok(entries)
    }

    fn walk(
        &self,
        source: &Path,
        destination: &Path,
        entries: &mut Vec<FileListEntry>,
    ) -> Result<()> {
        for entry in read_dir_sorted(source)? {
            let name = entry.file_name();
            if self.exclusions.is_excluded(&name.to_string_lossy()) {
                continue;
            }

            let entry_source = entry.path();
            let entry_destination = destination.join(&name);
            // Follows symlinks: a linked directory is copied as a directory.
            let is_directory = entry_source.is_dir();

            entries.push(FileListEntry {
                source: entry_source.clone(),
                destination: entry_destination.clone(),
                is_directory,
            });
            if is_directory {
                self.walk(&entry_source, &entry_destination, entries)?;
            }
        }
        Ok(())
    }

    /// Apply a file list: create directories, copy files byte-for-byte.
    ///
    /// Existing destination files are overwritten; destination entries not in
    /// the list are never touched. Returns the number of files copied.
    ///
    /// # Errors
    ///
    /// Returns an error on the first directory or file that cannot be written.
    pub fn copy_files(&self, entries: &[FileListEntry]) -> Result<usize> {
        let mut copied = 0;
        for entry in entries {
            if entry.is_directory {
                if !entry.destination.exists() {
                    fs::create_dir_all(&entry.destination)
                        .map_err(|e| Error::io(&entry.destination, e))?;
                    debug!(path = %entry.destination.display(), "Created directory");
                }
                continue;
            }

            let source = &entry.source;
            let destination = &entry.destination;
            if let Some(parent) = destination.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
                }
            }
            fs::copy(source, destination).map_err(|e| Error::io(destination, e))?;
            debug!(from = %source.display(), to = %destination.display(), "Copied file");
            copied += 1;
        }
        Ok(copied)
    }

    /// Overlay `source` onto `destination`.
    ///
    /// Same-path files are overwritten, destination-only files are left
    /// intact. Running it twice yields the same destination content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceNotFound`] if `source` does not exist, or an I/O
    /// error from the first failing write.
    pub fn copy_tree(
        &self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<usize> {
        let source = self.resolve(source);
        let destination = self.resolve(destination);

        let entries = self.build_file_list(&source, &destination)?;
        if source.is_dir() {
            self.ensure_directory(&destination)?;
        }
        self.copy_files(&entries)
    }
}

/// Empty `dir`; returns whether excluded entries were left behind.
fn flush_dir(dir: &Path, exclusions: &ExclusionSet, keep_root: bool) -> Result<bool> {
    let mut retained = false;

    for entry in read_dir_sorted(dir)? {
        let name = entry.file_name();
        if exclusions.is_excluded(&name.to_string_lossy()) {
            retained = true;
            continue;
        }

        let path = entry.path();
        // Does not follow symlinks: a link to a directory is removed as a file.
        let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
        if file_type.is_dir() {
            retained |= flush_dir(&path, exclusions, false)?;
        } else {
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            debug!(path = %path.display(), "Deleted file");
        }
    }

    if !keep_root {
        if retained {
            debug!(path = %dir.display(), "Keeping directory with excluded entries");
        } else {
            fs::remove_dir(dir).map_err(|e| Error::io(dir, e))?;
            debug!(path = %dir.display(), "Removed directory");
        }
    }

    Ok(retained)
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::io(dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn flush_missing_directory_is_noop() {
        let temp = TempDir::new().unwrap();
        let sync = DirectorySync::new(temp.path());
        sync.flush("does/not/exist", true).unwrap();
        sync.flush("does/not/exist", false).unwrap();
        assert!(!temp.path().join("does").exists());
    }

    #[test]
    fn flush_keep_root_leaves_empty_directory() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "assets/a.css", "a");
        write(temp.path(), "assets/js/app.js", "b");

        let sync = DirectorySync::new(temp.path());
        sync.flush("assets", true).unwrap();

        let assets = temp.path().join("assets");
        assert!(assets.is_dir());
        assert_eq!(fs::read_dir(&assets).unwrap().count(), 0);
    }

    #[test]
    fn flush_without_keep_root_removes_directory() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "runtime/cache/x.bin", "x");

        let sync = DirectorySync::new(temp.path());
        sync.flush("runtime", false).unwrap();

        assert!(!temp.path().join("runtime").exists());
    }

    #[test]
    fn flush_keeps_excluded_entries_and_their_parents() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "runtime/.gitignore", "*");
        write(temp.path(), "runtime/logs/.gitignore", "*");
        write(temp.path(), "runtime/logs/app.log", "log");
        write(temp.path(), "runtime/state/data.bin", "bin");

        let sync = DirectorySync::new(temp.path())
            .with_exclusions(ExclusionSet::from_names([".gitignore"]));
        sync.flush("runtime", true).unwrap();

        let runtime = temp.path().join("runtime");
        assert!(runtime.join(".gitignore").is_file());
        assert!(runtime.join("logs/.gitignore").is_file());
        assert!(!runtime.join("logs/app.log").exists());
        assert!(!runtime.join("state").exists());
    }

    #[test]
    fn file_list_is_preorder_and_sorted() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "env/b.txt", "b");
        write(temp.path(), "env/a/inner.txt", "i");

        let sync = DirectorySync::new(temp.path());
        let list = sync.build_file_list("env", "out").unwrap();
        let rendered: Vec<_> = list
            .iter()
            .map(|e| {
                let name = e.destination.file_name().unwrap();
                (name.to_string_lossy().into_owned(), e.is_directory)
            })
            .collect();

        assert_eq!(
            rendered,
            vec![
                ("a".to_string(), true),
                ("inner.txt".to_string(), false),
                ("b.txt".to_string(), false),
            ]
        );
    }

    #[test]
    fn copy_tree_missing_source_is_fatal() {
        let temp = TempDir::new().unwrap();
        let sync = DirectorySync::new(temp.path());
        let err = sync.copy_tree("nope", "out").unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn copy_tree_single_file_targets_literal_destination() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "config.php", "<?php return [];");

        let sync = DirectorySync::new(temp.path());
        let copied = sync.copy_tree("config.php", "config.local.php").unwrap();

        assert_eq!(copied, 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("config.local.php")).unwrap(),
            "<?php return [];"
        );
    }

    #[test]
    fn ensure_directory_creates_ancestors() {
        let temp = TempDir::new().unwrap();
        let sync = DirectorySync::new(temp.path());
        sync.ensure_directory("a/b/c").unwrap();
        assert!(temp.path().join("a/b/c").is_dir());
        sync.ensure_directory("a/b/c").unwrap();
    }
}
