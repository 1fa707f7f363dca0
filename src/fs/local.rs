use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::error::{ListingError, ListingErrorKind};
use crate::fs::path;
use crate::fs::source::{FileSource, ListQuery};
use crate::fs::tree::FileEntry;

/// File source backed by a local directory.
///
/// Entry paths are relative to `root` and always use `/`.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    root: PathBuf,
}

/// Handle to a local file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileLoader {
    /// Path relative to the source root.
    pub path: String,
    /// `None` when `path` does not stay inside the root.
    pub full_path: Option<PathBuf>,
}

impl LocalFileLoader {
    fn full_path(&self) -> io::Result<&Path> {
        self.full_path.as_deref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("'{}' is outside the source root", self.path),
            )
        })
    }

    pub async fn open(&self) -> io::Result<fs::File> {
        fs::File::open(self.full_path()?).await
    }

    pub async fn content_length(&self) -> io::Result<u64> {
        Ok(fs::metadata(self.full_path()?).await?.len())
    }
}

impl LocalFileSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a `/` separated path onto the root.
    ///
    /// Every segment must be a plain name, so `..`, `.` and drive or root
    /// prefixes are refused.
    fn resolve(&self, relative: &str) -> Result<PathBuf, ListingError> {
        let normalized = path::normalize(relative);
        let mut full = self.root.clone();
        for segment in normalized.split(path::SEPARATOR).filter(|s| !s.is_empty()) {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => full.push(name),
                _ => {
                    return Err(ListingError::new(
                        ListingErrorKind::PermissionDenied,
                        relative,
                        "path leaves the source root",
                    ))
                }
            }
        }
        Ok(full)
    }

    async fn entry_for(&self, relative: String, full: &Path) -> Result<FileEntry, ListingError> {
        let metadata = fs::metadata(full)
            .await
            .map_err(|e| ListingError::from_io(relative.as_str(), &e))?;
        if metadata.is_dir() {
            return Ok(FileEntry::directory(relative));
        }
        let mut entry = FileEntry::file(relative, metadata.len());
        if let Ok(modified) = metadata.modified() {
            entry = entry.with_last_modified(DateTime::<Utc>::from(modified));
        }
        Ok(entry)
    }

    /// Direct children of `dir` (relative path, `""` for the root).
    ///
    /// Unreadable entries and broken symlinks are skipped.
    async fn read_children(&self, dir: &str) -> Result<Vec<FileEntry>, ListingError> {
        let full = self.resolve(dir)?;
        let mut reader = fs::read_dir(&full)
            .await
            .map_err(|e| ListingError::from_io(dir, &e))?;

        let mut entries = Vec::new();
        loop {
            let next = reader
                .next_entry()
                .await
                .map_err(|e| ListingError::from_io(dir, &e))?;
            let Some(child) = next else {
                break;
            };
            let name = child.file_name().to_string_lossy().to_string();
            let relative = path::join(dir, &name);
            match self.entry_for(relative, &child.path()).await {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::debug!("skipping {}: {}", child.path().display(), e),
            }
        }
        Ok(entries)
    }

    /// Every file below `dir`, walked with an explicit stack.
    async fn read_recursive(&self, dir: &str) -> Result<Vec<FileEntry>, ListingError> {
        let mut files = Vec::new();
        let mut stack = vec![dir.to_string()];
        while let Some(current) = stack.pop() {
            for entry in self.read_children(&current).await? {
                if entry.is_directory {
                    stack.push(entry.path);
                } else {
                    files.push(entry);
                }
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

impl FileSource for LocalFileSource {
    type Loader = LocalFileLoader;

    async fn list(&self, query: ListQuery) -> Result<Vec<FileEntry>, ListingError> {
        let prefix = path::normalize(query.prefix());
        let is_directory_listing = prefix.is_empty() || prefix.ends_with(path::SEPARATOR);
        if !is_directory_listing {
            // Probe for the exact path
            let full = self.resolve(&prefix)?;
            return match self.entry_for(prefix.clone(), &full).await {
                Ok(entry) => Ok(vec![entry]),
                Err(e) if e.kind == ListingErrorKind::NotFound => Ok(Vec::new()),
                Err(e) => Err(e),
            };
        }

        let dir = path::trim_trailing_separator(&prefix).to_string();
        if query.recursive {
            self.read_recursive(&dir).await
        } else {
            self.read_children(&dir).await
        }
    }

    fn file_loader(&self, file: &str) -> Self::Loader {
        LocalFileLoader {
            path: file.to_string(),
            full_path: self.resolve(file).ok(),
        }
    }

    fn can_delete(&self) -> bool {
        true
    }

    async fn delete(&self, file: &str) -> Result<(), ListingError> {
        let full = self.resolve(file)?;
        if full == self.root {
            return Err(ListingError::unsupported(file, "deleting the root"));
        }
        let metadata = fs::symlink_metadata(&full)
            .await
            .map_err(|e| ListingError::from_io(file, &e))?;
        let result = if metadata.is_dir() {
            fs::remove_dir_all(&full).await
        } else {
            fs::remove_file(&full).await
        };
        result.map_err(|e| ListingError::from_io(file, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self as std_fs, File};
    use tempfile::TempDir;

    fn setup_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std_fs::create_dir(dir.path().join("alpha")).unwrap();
        std_fs::create_dir(dir.path().join("alpha").join("nested")).unwrap();
        std_fs::write(dir.path().join("alpha").join("inner.txt"), "inner").unwrap();
        std_fs::write(dir.path().join("alpha").join("nested").join("deep.txt"), "deep!").unwrap();
        File::create(dir.path().join("file_a.txt")).unwrap();
        dir
    }

    fn sorted_paths(mut entries: Vec<FileEntry>) -> Vec<String> {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries.into_iter().map(|e| e.path).collect()
    }

    #[tokio::test]
    async fn lists_root_children() {
        let dir = setup_test_dir();
        let source = LocalFileSource::new(dir.path());
        let entries = source.list(ListQuery::root()).await.unwrap();
        let alpha = entries.iter().find(|e| e.path == "alpha").unwrap();
        assert!(alpha.is_directory);
        assert_eq!(sorted_paths(entries), vec!["alpha", "file_a.txt"]);
    }

    #[tokio::test]
    async fn lists_folder_with_metadata() {
        let dir = setup_test_dir();
        let source = LocalFileSource::new(dir.path());
        let entries = source.list(ListQuery::folder("alpha/")).await.unwrap();
        let inner = entries.iter().find(|e| e.path == "alpha/inner.txt").unwrap();
        assert_eq!(inner.content_length, Some(5));
        assert!(inner.last_modified.is_some());
        assert_eq!(sorted_paths(entries), vec!["alpha/inner.txt", "alpha/nested"]);
    }

    #[tokio::test]
    async fn recursive_listing_walks_subdirectories() {
        let dir = setup_test_dir();
        let source = LocalFileSource::new(dir.path());
        let entries = source
            .list(ListQuery::folder("alpha/").recursive(true))
            .await
            .unwrap();
        assert_eq!(
            sorted_paths(entries),
            vec!["alpha/inner.txt", "alpha/nested/deep.txt"]
        );
    }

    #[tokio::test]
    async fn prefix_probe_returns_exact_entry() {
        let dir = setup_test_dir();
        let source = LocalFileSource::new(dir.path());
        let found = source.list(ListQuery::folder("alpha")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].is_directory);
        let missing = source.list(ListQuery::folder("nope")).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn missing_folder_is_not_found() {
        let dir = setup_test_dir();
        let source = LocalFileSource::new(dir.path());
        let err = source.list(ListQuery::folder("ghost/")).await.unwrap_err();
        assert_eq!(err.kind, ListingErrorKind::NotFound);
        assert_eq!(err.path, "ghost");
    }

    #[tokio::test]
    async fn delete_removes_files_and_directories() {
        let dir = setup_test_dir();
        let source = LocalFileSource::new(dir.path());
        source.delete("file_a.txt").await.unwrap();
        assert!(!dir.path().join("file_a.txt").exists());
        source.delete("alpha/nested").await.unwrap();
        assert!(!dir.path().join("alpha").join("nested").exists());
        assert!(source.delete("").await.is_err());
    }

    #[tokio::test]
    async fn paths_leaving_the_root_are_refused() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        std_fs::create_dir(&root).unwrap();
        std_fs::write(outer.path().join("outside.txt"), "keep").unwrap();
        let source = LocalFileSource::new(&root);

        for escaping in ["../outside.txt", "..\\outside.txt", "./../outside.txt"] {
            let err = source.delete(escaping).await.unwrap_err();
            assert_eq!(err.kind, ListingErrorKind::PermissionDenied);
        }
        assert!(outer.path().join("outside.txt").exists());

        let err = source.list(ListQuery::folder("../")).await.unwrap_err();
        assert_eq!(err.kind, ListingErrorKind::PermissionDenied);
        let err = source.list(ListQuery::folder("../outside.txt")).await.unwrap_err();
        assert_eq!(err.kind, ListingErrorKind::PermissionDenied);

        let loader = source.file_loader("../outside.txt");
        assert_eq!(loader.full_path, None);
        let err = loader.content_length().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn removing_a_folder_also_removes_empty_subfolders() {
        let dir = setup_test_dir();
        let source = LocalFileSource::new(dir.path());
        source.delete("alpha/inner.txt").await.unwrap();
        source.delete("alpha/nested/deep.txt").await.unwrap();
        assert!(dir.path().join("alpha").join("nested").exists());

        source.delete("alpha").await.unwrap();
        assert!(!dir.path().join("alpha").exists());
        let entries = source.list(ListQuery::root()).await.unwrap();
        assert_eq!(sorted_paths(entries), vec!["file_a.txt"]);
    }

    #[tokio::test]
    async fn loader_opens_file() {
        let dir = setup_test_dir();
        let source = LocalFileSource::new(dir.path());
        let loader = source.file_loader("alpha/nested/deep.txt");
        assert_eq!(loader.content_length().await.unwrap(), 5);
        assert!(loader.open().await.is_ok());
    }
}
