//! Navigation over a [`FileSource`].
//!
//! The navigator owns the [`FileTreeStructure`] and keeps it current as the
//! user moves around: every directory listing runs as its own tokio task and
//! applies its result to the shared tree in one step. Observers subscribe to
//! the tree, the current path and the loading status through `watch`
//! channels.

use std::collections::HashMap;
use std::sync::Arc;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{AppError, ListingError, ListingErrorKind, Result};
use crate::fs::path;
use crate::fs::source::{FileSource, ListQuery};
use crate::fs::tree::{FileEntry, FileTreeNode, FileTreeStructure, LoadingStatus, ROOT};

type ListingResult<T> = std::result::Result<T, ListingError>;

/// Navigator settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigatorConfig {
    /// Sub folder of the source to treat as the root.
    pub base_path: String,
    /// Comma separated glob patterns. Files matching none are hidden.
    pub wildcards: Option<String>,
    /// List recursively, so one listing loads a whole subtree.
    pub fetch_all: bool,
}

impl NavigatorConfig {
    /// Compile [`wildcards`](Self::wildcards). Matching ignores case.
    pub fn wildcard_set(&self) -> Result<Option<GlobSet>> {
        let Some(wildcards) = self.wildcards.as_deref() else {
            return Ok(None);
        };
        let mut builder = GlobSetBuilder::new();
        let mut count = 0;
        for pattern in wildcards.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| AppError::Config(format!("invalid wildcard '{}': {}", pattern, e)))?;
            builder.add(glob);
            count += 1;
        }
        if count == 0 {
            return Ok(None);
        }
        let set = builder
            .build()
            .map_err(|e| AppError::Config(format!("invalid wildcards: {}", e)))?;
        Ok(Some(set))
    }
}

/// Overall loading state, with the last error that was kept.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigatorStatus {
    pub loading_status: LoadingStatus,
    pub error: Option<ListingError>,
}

impl Default for NavigatorStatus {
    fn default() -> Self {
        Self {
            loading_status: LoadingStatus::Ready,
            error: None,
        }
    }
}

/// Outcome of [`FileNavigator::navigate_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation<L> {
    /// Already at that path.
    Unchanged,
    Directory,
    /// The path is a file; here is its loader.
    File(L),
}

/// Progress of a batch delete, reported after each file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteProgress {
    /// File that was just deleted.
    pub current: String,
    /// Files deleted so far, `current` included.
    pub deleted: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyMode {
    /// Merge entries in and mark the directory loaded.
    Merge,
    /// Entries are authoritative for the directory.
    Reconcile,
}

/// State shared with listing tasks.
struct Shared<S> {
    source: S,
    base_path: String,
    wildcards: Option<GlobSet>,
    fetch_all: bool,
    tree: watch::Sender<FileTreeStructure>,
    status: watch::Sender<NavigatorStatus>,
}

impl<S: FileSource> Shared<S> {
    /// Folder to request from the source for a base-relative `path`.
    ///
    /// `None` stands for the root of the source.
    fn folder_to_load(&self, path: &str, as_directory: bool) -> Option<String> {
        let full = path::join(&self.base_path, path);
        if full.is_empty() {
            None
        } else if as_directory {
            Some(path::as_base_directory(&full))
        } else {
            Some(full)
        }
    }

    async fn list(&self, folder: Option<String>, recursive: bool) -> ListingResult<Vec<FileEntry>> {
        let query = ListQuery {
            folder,
            recursive: recursive || self.fetch_all,
        };
        let mut entries = self.source.list(query).await?;
        if let Some(wildcards) = &self.wildcards {
            entries.retain(|entry| entry.is_directory || wildcards.is_match(&entry.path));
        }
        Ok(entries)
    }

    async fn load_directory(self: Arc<Self>, dir: String, mode: ApplyMode) {
        let folder = self.folder_to_load(&dir, true);
        debug!("listing '{}' ({:?})", dir, mode);

        let result = match self.list(folder, false).await {
            Ok(entries) => Ok(entries),
            Err(err) => match self.source.on_error(err) {
                Some(err) => Err(err),
                None => {
                    debug!("ignoring listing error for '{}'", dir);
                    Ok(Vec::new())
                }
            },
        };

        match result {
            Ok(entries) => {
                debug!("listed {} entries in '{}'", entries.len(), dir);
                self.tree.send_modify(|tree| match mode {
                    ApplyMode::Merge => {
                        tree.add_files(entries);
                        tree.mark_directory_loaded(&dir);
                    }
                    ApplyMode::Reconcile => tree.set_files_at(&dir, entries),
                });
                self.status.send_modify(|status| {
                    status.loading_status = LoadingStatus::Ready;
                    status.error = None;
                });
            }
            Err(err) => {
                warn!("{}", err);
                self.tree.send_if_modified(|tree| tree.set_status(&dir, LoadingStatus::Error));
                self.status.send_modify(|status| {
                    status.loading_status = LoadingStatus::Error;
                    status.error = Some(err);
                });
            }
        }
    }
}

/// Lazily loads a [`FileSource`] into a tree as paths are visited.
///
/// Paths given to the navigator are relative to the configured base path.
pub struct FileNavigator<S: FileSource> {
    shared: Arc<Shared<S>>,
    current_path: watch::Sender<String>,
    history: Vec<String>,
    /// Latest listing task per directory.
    listings: HashMap<String, JoinHandle<()>>,
    /// Listings replaced in `listings` by a refresh while still running.
    superseded: Vec<JoinHandle<()>>,
}

impl<S: FileSource> FileNavigator<S> {
    pub fn new(source: S, config: NavigatorConfig) -> Result<Self> {
        let wildcards = config.wildcard_set()?;
        let base_path = path::as_base_directory(&path::normalize(&config.base_path));
        let (tree, _) = watch::channel(FileTreeStructure::new(&base_path));
        let (status, _) = watch::channel(NavigatorStatus::default());
        let (current_path, _) = watch::channel(ROOT.to_string());
        Ok(Self {
            shared: Arc::new(Shared {
                source,
                base_path,
                wildcards,
                fetch_all: config.fetch_all,
                tree,
                status,
            }),
            current_path,
            history: Vec::new(),
            listings: HashMap::new(),
            superseded: Vec::new(),
        })
    }

    /// Start loading the root.
    pub fn init(&mut self) {
        self.start_listing(ROOT, ApplyMode::Merge);
    }

    pub fn source(&self) -> &S {
        &self.shared.source
    }

    /// Base path with a trailing separator, or `""`.
    pub fn base_path(&self) -> &str {
        &self.shared.base_path
    }

    /// Current snapshot of the tree. Do not hold it across an `.await`.
    pub fn tree(&self) -> watch::Ref<'_, FileTreeStructure> {
        self.shared.tree.borrow()
    }

    pub fn watch_tree(&self) -> watch::Receiver<FileTreeStructure> {
        self.shared.tree.subscribe()
    }

    pub fn status(&self) -> NavigatorStatus {
        self.shared.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<NavigatorStatus> {
        self.shared.status.subscribe()
    }

    pub fn current_path(&self) -> String {
        self.current_path.borrow().clone()
    }

    pub fn watch_current_path(&self) -> watch::Receiver<String> {
        self.current_path.subscribe()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Move to `path`, loading it if it is a directory not loaded yet.
    pub async fn navigate_to(&mut self, path: &str) -> Navigation<S::Loader> {
        let path = Self::key(path);
        if *self.current_path.borrow() == path {
            return Navigation::Unchanged;
        }
        let previous = self.current_path.send_replace(path.clone());
        self.history.push(previous);
        self.open(&path).await
    }

    /// Return to the previous path. `None` when the history is empty.
    pub async fn go_back(&mut self) -> Option<Navigation<S::Loader>> {
        let path = self.history.pop()?;
        self.current_path.send_replace(path.clone());
        Some(self.open(&path).await)
    }

    async fn open(&mut self, path: &str) -> Navigation<S::Loader> {
        if self.is_directory(path).await {
            self.load_files_in_path(path);
            Navigation::Directory
        } else {
            Navigation::File(self.get_file(path))
        }
    }

    /// List `path` if it is a directory that has not been loaded.
    pub fn load_files_in_path(&mut self, path: &str) {
        let path = Self::key(path);
        let (is_directory, loaded) = {
            let tree = self.shared.tree.borrow();
            (tree.get_node(&path).is_directory, tree.is_path_loaded(&path))
        };
        if is_directory && !loaded {
            self.start_listing(&path, ApplyMode::Merge);
        }
    }

    /// List `path` again and reconcile its children with the result.
    pub fn refresh(&mut self, path: &str) {
        let path = Self::key(path);
        if let Some(previous) = self.listings.remove(&path) {
            if !previous.is_finished() {
                self.superseded.push(previous);
            }
        }
        self.start_listing(&path, ApplyMode::Reconcile);
    }

    /// Every file below `path`, in the source's full path space.
    pub async fn list_all_files(&self, path: &str) -> ListingResult<Vec<FileEntry>> {
        let folder = self.shared.folder_to_load(&Self::key(path), true);
        self.shared.list(folder, true).await
    }

    pub async fn is_directory(&self, path: &str) -> bool {
        let path = Self::key(path);
        let known = self.shared.tree.borrow().node(&path).map(|node| node.is_directory);
        match known {
            Some(is_directory) => is_directory,
            None => {
                self.probe(&path).await;
                let found = self.shared.tree.borrow().node(&path).map(|node| node.is_directory);
                found.unwrap_or(false)
            }
        }
    }

    /// Node at `path`, asking the source about it first if the tree has
    /// never seen it.
    pub async fn get_node(&self, path: &str) -> FileTreeNode {
        let path = Self::key(path);
        let known = self.shared.tree.borrow().node(&path).cloned();
        if let Some(node) = known {
            return node;
        }
        self.probe(&path).await;
        let node = self.shared.tree.borrow().get_node(&path).into_owned();
        node
    }

    /// Ask the source what sits at exactly `path` and merge the answer.
    async fn probe(&self, path: &str) {
        let folder = self.shared.folder_to_load(path, false);
        match self.shared.list(folder, false).await {
            Ok(entries) if entries.is_empty() => debug!("nothing found at '{}'", path),
            Ok(entries) => self.shared.tree.send_modify(|tree| tree.add_files(entries)),
            Err(err) => {
                if let Some(err) = self.shared.source.on_error(err) {
                    warn!("{}", err);
                }
            }
        }
    }

    /// Add a client-side folder that survives refreshes of its parent.
    pub fn add_virtual_folder(&self, path: &str) {
        self.shared.tree.send_modify(|tree| tree.add_virtual_folder(path));
    }

    pub fn get_file(&self, path: &str) -> S::Loader {
        self.shared
            .source
            .file_loader(&path::join(&self.shared.base_path, &Self::key(path)))
    }

    pub fn can_delete_file(&self) -> bool {
        self.shared.source.can_delete()
    }

    /// Delete one file from the source and the tree.
    pub async fn delete_file(&self, path: &str) -> ListingResult<()> {
        let path = Self::key(path);
        if !self.can_delete_file() {
            error!("cannot delete '{}': source does not support deleting", path);
            return Err(ListingError::unsupported(path, "delete"));
        }
        self.shared
            .source
            .delete(&path::join(&self.shared.base_path, &path))
            .await?;
        self.shared.tree.send_modify(|tree| tree.delete_node(&path));
        Ok(())
    }

    /// Delete files one after another, reporting progress after each.
    ///
    /// Stops at the first failure. Returns the number of files deleted.
    pub async fn delete_files<F>(&self, paths: &[String], mut progress: F) -> ListingResult<usize>
    where
        F: FnMut(&DeleteProgress),
    {
        let total = paths.len();
        for (index, file) in paths.iter().enumerate() {
            self.delete_file(file).await?;
            progress(&DeleteProgress {
                current: file.clone(),
                deleted: index + 1,
                total,
            });
        }
        Ok(total)
    }

    /// Delete every file below `folder`, then the folder itself.
    ///
    /// The files come from [`list_all_files`](Self::list_all_files), so the
    /// wildcard filter applies: files it hides stay on the source even though
    /// the folder node leaves the tree. A folder the source does not know
    /// once its files are gone, as with blob prefixes, counts as deleted.
    /// Stops at the first failure, leaving the folder and its remaining files
    /// in place.
    pub async fn delete_folder<F>(&self, folder: &str, progress: F) -> ListingResult<usize>
    where
        F: FnMut(&DeleteProgress),
    {
        let folder = Self::key(folder);
        if !self.can_delete_file() {
            error!("cannot delete '{}': source does not support deleting", folder);
            return Err(ListingError::unsupported(folder, "delete"));
        }
        let files: Vec<String> = self
            .list_all_files(&folder)
            .await?
            .into_iter()
            .filter(|entry| !entry.is_directory)
            .map(|entry| {
                let full = path::normalize(&entry.path);
                path::strip_base(&full, &self.shared.base_path).to_string()
            })
            .collect();
        debug!("deleting {} files under '{}'", files.len(), folder);
        let deleted = self.delete_files(&files, progress).await?;

        if !folder.is_empty() {
            let full = path::join(&self.shared.base_path, &folder);
            match self.shared.source.delete(&full).await {
                Ok(()) => {}
                Err(err) if err.kind == ListingErrorKind::NotFound => {
                    debug!("'{}' was only a prefix", full)
                }
                Err(err) => return Err(err),
            }
        }
        self.shared.tree.send_modify(|tree| tree.delete_node(&folder));
        Ok(deleted)
    }

    /// Wait for every listing started so far.
    pub async fn idle(&mut self) {
        let handles: Vec<JoinHandle<()>> = self
            .listings
            .drain()
            .map(|(_, handle)| handle)
            .chain(self.superseded.drain(..))
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("listing task failed: {}", e);
                }
            }
        }
    }

    /// Abort every running listing. The tree keeps its current state.
    pub fn dispose(&mut self) {
        for (_, handle) in self.listings.drain() {
            handle.abort();
        }
        for handle in self.superseded.drain(..) {
            handle.abort();
        }
    }

    fn start_listing(&mut self, dir: &str, mode: ApplyMode) {
        if let Some(handle) = self.listings.get(dir) {
            if !handle.is_finished() {
                debug!("listing of '{}' already in flight", dir);
                return;
            }
        }
        if mode == ApplyMode::Merge {
            self.shared
                .tree
                .send_if_modified(|tree| tree.set_status(dir, LoadingStatus::Loading));
        }
        self.shared
            .status
            .send_modify(|status| status.loading_status = LoadingStatus::Loading);

        let handle = tokio::spawn(self.shared.clone().load_directory(dir.to_string(), mode));
        self.listings.insert(dir.to_string(), handle);
    }

    fn key(path: &str) -> String {
        path::trim_trailing_separator(&path::normalize(path)).to_string()
    }
}

impl<S: FileSource> Drop for FileNavigator<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
