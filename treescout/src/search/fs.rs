//! The filesystem boundary of the engine.
//!
//! Tasks never touch `std::fs` directly. Everything goes through a
//! [`FilesystemAccessor`], which lets tests substitute slow, failing or
//! synthetic trees without creating them on disk.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;

/// One directory entry as seen by a search task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
}

/// Source of directory listings and file contents.
///
/// Implementations may block. Both methods may fail for any entry (gone,
/// permission denied); callers treat a failure as "nothing here".
pub trait FilesystemAccessor: Send + Sync + 'static {
    /// Lists `path` non-recursively, sorted by name, hidden entries
    /// included, `.` and `..` excluded.
    fn list_entries(&self, path: &Path) -> io::Result<Vec<EntryInfo>>;

    /// Opens a file for sequential reading
    fn open_for_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;
}

/// The real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFilesystem;

impl FilesystemAccessor for LocalFilesystem {
    fn list_entries(&self, path: &Path) -> io::Result<Vec<EntryInfo>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(path)? {
            // An entry that disappears mid-listing is simply left out.
            let Ok(entry) = entry else {
                continue;
            };
            let entry_path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let is_symlink = file_type.is_symlink();

            // Symlinks are classified by their target, as a file manager would.
            let metadata = if is_symlink {
                fs::metadata(&entry_path).or_else(|_| entry.metadata())
            } else {
                entry.metadata()
            };
            let (is_dir, size, last_modified) = match metadata {
                Ok(meta) => (
                    meta.is_dir(),
                    if meta.is_dir() { 0 } else { meta.len() },
                    meta.modified().ok(),
                ),
                Err(err) => {
                    trace!("No metadata for {}: {}", entry_path.display(), err);
                    (file_type.is_dir(), 0, None)
                }
            };

            entries.push(EntryInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry_path,
                is_dir,
                is_symlink,
                size,
                last_modified,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn open_for_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_entries_sorted_with_hidden() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join(".hidden"), "h").unwrap();
        fs::write(dir.path().join("a.txt"), "aaaa").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let entries = LocalFilesystem.list_entries(dir.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".hidden", "a.txt", "b.txt", "sub"]);

        let a = &entries[1];
        assert_eq!(a.size, 4);
        assert!(!a.is_dir);
        assert!(a.last_modified.is_some());
        assert_eq!(a.path, dir.path().join("a.txt"));

        let sub = &entries[3];
        assert!(sub.is_dir);
        assert_eq!(sub.size, 0);
    }

    #[test]
    fn test_list_missing_directory_fails() {
        let dir = tempdir().unwrap();
        assert!(LocalFilesystem
            .list_entries(&dir.path().join("missing"))
            .is_err());
    }

    #[test]
    fn test_open_for_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("note.txt");
        fs::write(&path, "hello").unwrap();

        let mut content = String::new();
        LocalFilesystem
            .open_for_read(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello");
        assert!(LocalFilesystem
            .open_for_read(&dir.path().join("nope.txt"))
            .is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_classified_by_target() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();

        let entries = LocalFilesystem.list_entries(dir.path()).unwrap();
        let link = entries.iter().find(|e| e.name == "link").unwrap();
        assert!(link.is_symlink);
        assert!(link.is_dir);
    }
}
