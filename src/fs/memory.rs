//! In-memory file source.
//!
//! Answers listings the way delimiter-based blob listings do: the files
//! directly under the requested prefix plus one directory entry per
//! next-level prefix. Backs the `--listing` snapshot mode and tests.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{AppError, ListingError, Result};
use crate::fs::path;
use crate::fs::source::{FileSource, ListQuery};
use crate::fs::tree::FileEntry;

/// Handle to a file held by a [`MemoryFileSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFileLoader {
    pub path: String,
    pub content_length: Option<u64>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, FileEntry>,
    failing: HashSet<String>,
    requests: Vec<ListQuery>,
}

#[derive(Debug, Default)]
pub struct MemoryFileSource {
    inner: Mutex<Inner>,
    deletable: bool,
}

impl MemoryFileSource {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = FileEntry>,
    {
        let source = Self::default();
        source.insert(entries);
        source
    }

    /// Load a JSON array of entries, as exported from a remote listing.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<FileEntry> = serde_json::from_str(json)
            .map_err(|e| AppError::Config(format!("invalid listing snapshot: {}", e)))?;
        Ok(Self::new(entries))
    }

    pub fn from_json_file(file: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(file)?;
        Self::from_json(&content)
    }

    /// Allow [`FileSource::delete`] to remove entries.
    pub fn with_delete(mut self) -> Self {
        self.deletable = true;
        self
    }

    pub fn insert<I>(&self, entries: I)
    where
        I: IntoIterator<Item = FileEntry>,
    {
        let mut inner = self.lock();
        for mut entry in entries {
            entry.path = path::trim_trailing_separator(&path::normalize(&entry.path)).to_string();
            inner.entries.insert(entry.path.clone(), entry);
        }
    }

    pub fn remove(&self, file: &str) {
        self.lock().entries.remove(file);
    }

    /// Make listings of `folder` (as passed in [`ListQuery::folder`]) fail.
    pub fn fail_folder(&self, folder: &str) {
        self.lock().failing.insert(folder.to_string());
    }

    pub fn heal_folder(&self, folder: &str) {
        self.lock().failing.remove(folder);
    }

    /// Every listing request received so far.
    pub fn requests(&self) -> Vec<ListQuery> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn list_now(&self, query: &ListQuery) -> std::result::Result<Vec<FileEntry>, ListingError> {
        let mut inner = self.lock();
        inner.requests.push(query.clone());
        let prefix = query.prefix();
        if inner.failing.contains(prefix) {
            return Err(ListingError::transport(prefix, "simulated listing failure"));
        }

        let mut listed: BTreeMap<String, FileEntry> = BTreeMap::new();
        for (name, entry) in inner.entries.range(prefix.to_string()..) {
            let Some(rest) = name.strip_prefix(prefix) else {
                break;
            };
            if query.recursive {
                if !entry.is_directory && !rest.is_empty() {
                    listed.insert(name.clone(), entry.clone());
                }
                continue;
            }
            match rest.find(path::SEPARATOR) {
                // Deeper entry: report the next-level prefix as a directory
                Some(idx) => {
                    let dir = &name[..prefix.len() + idx];
                    if !dir.is_empty() {
                        listed
                            .entry(dir.to_string())
                            .or_insert_with(|| FileEntry::directory(dir));
                    }
                }
                None if name.is_empty() => {}
                None => {
                    listed.insert(name.clone(), entry.clone());
                }
            }
        }
        Ok(listed.into_values().collect())
    }
}

impl FileSource for MemoryFileSource {
    type Loader = MemoryFileLoader;

    async fn list(&self, query: ListQuery) -> std::result::Result<Vec<FileEntry>, ListingError> {
        self.list_now(&query)
    }

    fn file_loader(&self, file: &str) -> Self::Loader {
        let content_length = self
            .lock()
            .entries
            .get(file)
            .and_then(|entry| entry.content_length);
        MemoryFileLoader {
            path: file.to_string(),
            content_length,
        }
    }

    fn can_delete(&self) -> bool {
        self.deletable
    }

    async fn delete(&self, file: &str) -> std::result::Result<(), ListingError> {
        if !self.deletable {
            return Err(ListingError::unsupported(file, "delete"));
        }
        match self.lock().entries.remove(file) {
            Some(_) => Ok(()),
            None => Err(ListingError::not_found(file)),
        }
    }
}
