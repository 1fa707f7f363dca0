use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fs::path;
use crate::ordered_map::OrderedMap;

/// Path of the root node.
pub const ROOT: &str = "";

/// Loading state of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadingStatus {
    #[default]
    Loading,
    Ready,
    Error,
}

/// A flat descriptor of one file or directory as returned by a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileEntry {
    pub fn file(path: impl Into<String>, content_length: u64) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            content_length: Some(content_length),
            last_modified: None,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            content_length: None,
            last_modified: None,
        }
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }
}

/// Type of a child as recorded in its parent's children map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

impl NodeKind {
    fn of(is_directory: bool) -> Self {
        if is_directory {
            NodeKind::Directory
        } else {
            NodeKind::File
        }
    }
}

/// Construction parameters for a [`FileTreeNode`].
#[derive(Debug, Clone, Default)]
pub struct NodeParams {
    pub path: String,
    /// Path as received, before separator normalisation. Defaults to `path`.
    pub original_path: Option<String>,
    pub is_directory: bool,
    pub children: Option<OrderedMap<String, NodeKind>>,
    pub loading_status: Option<LoadingStatus>,
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_unknown: bool,
    pub is_virtual: bool,
}

/// A node in the file tree.
///
/// Children are referenced by path; the nodes themselves live in the
/// [`FileTreeStructure`] index.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTreeNode {
    pub path: String,
    pub original_path: String,
    pub name: String,
    pub is_directory: bool,
    pub children: OrderedMap<String, NodeKind>,
    pub loading_status: LoadingStatus,
    /// Content length if the node is a file.
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Placeholder returned for a path the tree has never seen.
    pub is_unknown: bool,
    /// Created client-side; kept when a listing of its parent omits it.
    pub is_virtual: bool,
}

impl FileTreeNode {
    pub fn new(params: NodeParams) -> Self {
        let name = path::base_name(&params.path).to_string();
        let loading_status = params.loading_status.unwrap_or(if params.is_directory {
            LoadingStatus::Loading
        } else {
            LoadingStatus::Ready
        });
        Self {
            original_path: params.original_path.unwrap_or_else(|| params.path.clone()),
            path: params.path,
            name,
            is_directory: params.is_directory,
            children: params.children.unwrap_or_default(),
            loading_status,
            content_length: params.content_length,
            last_modified: params.last_modified,
            is_unknown: params.is_unknown,
            is_virtual: params.is_virtual,
        }
    }

    fn directory(path: &str, loading_status: LoadingStatus, is_virtual: bool) -> Self {
        Self::new(NodeParams {
            path: path.to_string(),
            is_directory: true,
            loading_status: Some(loading_status),
            is_virtual,
            ..Default::default()
        })
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::of(self.is_directory)
    }

    pub fn mark_as_loading(&mut self) {
        self.loading_status = LoadingStatus::Loading;
    }

    pub fn mark_as_loaded(&mut self) {
        self.loading_status = LoadingStatus::Ready;
    }

    pub fn mark_as_failed(&mut self) {
        self.loading_status = LoadingStatus::Error;
    }
}

/// Hierarchical view over flat file listings.
///
/// Every node, file or directory, is indexed by its normalised path relative
/// to `base_path`. Parents are found by cutting the last path segment, so
/// nodes never hold references to each other.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTreeStructure {
    base_path: String,
    nodes: HashMap<String, FileTreeNode>,
    unknown_files: HashSet<String>,
}

impl Default for FileTreeStructure {
    fn default() -> Self {
        Self::new("")
    }
}

impl FileTreeStructure {
    /// Create an empty tree. Ingested paths are taken relative to `base_path`.
    pub fn new(base_path: &str) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT.to_string(),
            FileTreeNode::directory(ROOT, LoadingStatus::Ready, false),
        );
        Self {
            base_path: path::as_base_directory(&path::normalize(base_path)),
            nodes,
            unknown_files: HashSet::new(),
        }
    }

    /// Base directory, with a trailing separator when non-empty.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn root(&self) -> &FileTreeNode {
        &self.nodes[ROOT]
    }

    /// Number of indexed nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root().children.is_empty()
    }

    /// Indexed node at `path`, if any.
    pub fn node(&self, path: &str) -> Option<&FileTreeNode> {
        self.nodes.get(&Self::lookup_key(path))
    }

    /// Children of the directory at `path`, in display order.
    pub fn children<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a FileTreeNode> + 'a {
        let children = self.nodes.get(&Self::lookup_key(path)).map(|node| &node.children);
        children
            .into_iter()
            .flat_map(|children| children.keys())
            .filter_map(move |child| self.nodes.get(child))
    }

    /// Indexed parent directory of the node at `path`.
    pub fn get_parent(&self, path: &str) -> Option<&FileTreeNode> {
        let key = Self::lookup_key(path);
        if key.is_empty() {
            return None;
        }
        self.nodes.get(path::parent_of(&key))
    }

    /// Node at `path`, or a synthetic directory placeholder that is not
    /// inserted into the tree.
    pub fn get_node(&self, path: &str) -> Cow<'_, FileTreeNode> {
        let key = Self::lookup_key(path);
        match self.nodes.get(&key) {
            Some(node) => Cow::Borrowed(node),
            None => {
                let loading_status = if self.unknown_files.contains(&key) {
                    LoadingStatus::Ready
                } else {
                    LoadingStatus::Loading
                };
                Cow::Owned(FileTreeNode::new(NodeParams {
                    path: key,
                    is_directory: true,
                    loading_status: Some(loading_status),
                    is_unknown: true,
                    ..Default::default()
                }))
            }
        }
    }

    /// Whether the node at `path` is indexed and `Ready`.
    pub fn is_path_loaded(&self, path: &str) -> bool {
        self.nodes
            .get(&Self::lookup_key(path))
            .map_or(false, |node| node.loading_status == LoadingStatus::Ready)
    }

    /// Remember that `path` was loaded even though it is not in the tree,
    /// so its placeholder reports `Ready`.
    pub fn mark_file_as_loaded(&mut self, path: &str) {
        self.unknown_files.insert(Self::lookup_key(path));
    }

    /// Set the status of an indexed node. Returns false if `path` is unknown.
    pub fn set_status(&mut self, path: &str, status: LoadingStatus) -> bool {
        match self.nodes.get_mut(&Self::lookup_key(path)) {
            Some(node) => {
                node.loading_status = status;
                true
            }
            None => false,
        }
    }

    /// Record that the directory listing of `path` completed.
    ///
    /// An existing directory keeps its virtual flag; a missing one is created
    /// along with its ancestors.
    pub fn mark_directory_loaded(&mut self, path: &str) {
        let key = Self::lookup_key(path);
        if let Some(node) = self.nodes.get_mut(&key) {
            if node.is_directory {
                node.mark_as_loaded();
                return;
            }
        }
        let mut touched = BTreeSet::new();
        self.ensure_directory(&key, false, &mut touched);
        self.sort_directories(touched);
    }

    /// Merge a batch of entries into the tree without removing anything.
    pub fn add_files<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = FileEntry>,
    {
        let mut touched = BTreeSet::new();
        self.ingest(entries, &mut touched);
        self.sort_directories(touched);
    }

    /// Replace the known children of `folder` with an authoritative listing.
    ///
    /// Children absent from `entries` are dropped with their subtrees,
    /// except virtual folders.
    pub fn set_files_at<I>(&mut self, folder: &str, entries: I)
    where
        I: IntoIterator<Item = FileEntry>,
    {
        let folder = Self::lookup_key(folder);
        let mut touched = BTreeSet::new();
        self.ensure_directory(&folder, false, &mut touched);

        let ingested = self.ingest(entries, &mut touched);
        let listed: HashSet<&str> = ingested
            .iter()
            .filter_map(|entry_path| path::child_toward(&folder, entry_path))
            .collect();

        // An entry may have turned the folder or an ancestor into a file
        let Some(folder_node) = self.nodes.get(&folder).filter(|node| node.is_directory) else {
            self.sort_directories(touched);
            return;
        };
        let stale: Vec<String> = folder_node
            .children
            .keys()
            .filter(|child| !listed.contains(child.as_str()))
            .filter(|child| !self.nodes.get(*child).map_or(false, |node| node.is_virtual))
            .cloned()
            .collect();

        for child in stale {
            self.remove_subtree(&child);
            self.unlink(&child);
        }

        touched.insert(folder);
        self.sort_directories(touched);
    }

    /// Remove a node, then any parent directories left empty by it.
    ///
    /// Stops at the root, at virtual directories, and at directories that
    /// still have children. Unknown paths are ignored.
    pub fn delete_node(&mut self, path: &str) {
        let mut current = Self::lookup_key(path);
        while !current.is_empty() && self.nodes.contains_key(&current) {
            self.remove_subtree(&current);
            self.unlink(&current);

            let parent = path::parent_of(&current).to_string();
            let cascade = match self.nodes.get(&parent) {
                Some(node) => !parent.is_empty() && !node.is_virtual && node.children.is_empty(),
                None => false,
            };
            if !cascade {
                break;
            }
            current = parent;
        }
    }

    /// Add a client-side folder that survives reconciliation of its parent.
    pub fn add_virtual_folder(&mut self, path: &str) {
        let key = Self::lookup_key(path);
        let mut touched = BTreeSet::new();
        self.ensure_directory(&key, true, &mut touched);
        self.sort_directories(touched);
    }

    /// Normalise a lookup path: backslashes and trailing separators.
    fn lookup_key(path: &str) -> String {
        path::trim_trailing_separator(&path::normalize(path)).to_string()
    }

    /// Convert an entry into a node in base-relative path space.
    ///
    /// Returns `None` for the base directory itself.
    fn entry_to_node(&self, entry: FileEntry) -> Option<FileTreeNode> {
        let normalized = path::normalize(&entry.path);
        let relative = path::trim_trailing_separator(path::strip_base(&normalized, &self.base_path));
        if relative.is_empty() {
            return None;
        }
        let is_directory = entry.is_directory;
        Some(FileTreeNode::new(NodeParams {
            path: relative.to_string(),
            original_path: Some(entry.path),
            is_directory,
            content_length: entry.content_length.filter(|_| !is_directory),
            last_modified: entry.last_modified.filter(|_| !is_directory),
            ..Default::default()
        }))
    }

    /// Shared merge logic of `add_files` and `set_files_at`.
    /// Returns the paths of the ingested nodes.
    fn ingest<I>(&mut self, entries: I, touched: &mut BTreeSet<String>) -> Vec<String>
    where
        I: IntoIterator<Item = FileEntry>,
    {
        let mut ingested = Vec::new();
        for entry in entries {
            let Some(node) = self.entry_to_node(entry) else {
                continue;
            };
            let parent = path::parent_of(&node.path).to_string();
            self.ensure_directory(&parent, false, touched);
            ingested.push(node.path.clone());

            touched.insert(parent);

            if node.is_directory {
                let existing = self.nodes.get_mut(&node.path).filter(|n| n.is_directory);
                if let Some(existing) = existing {
                    // Listed by the source, so no longer client-only
                    existing.is_virtual = false;
                    continue;
                }
            }
            self.insert_node(node);
        }
        ingested
    }

    /// Make sure `dir` and all its ancestors exist as directories.
    ///
    /// Walks upward until an existing directory is found, marking it `Ready`.
    /// Missing directories are then created top-down so each parent exists
    /// before its child is linked.
    fn ensure_directory(&mut self, dir: &str, is_virtual: bool, touched: &mut BTreeSet<String>) {
        let mut missing = Vec::new();
        let mut current = dir.to_string();
        loop {
            let stop = match self.nodes.get_mut(&current) {
                Some(node) if node.is_directory => {
                    node.mark_as_loaded();
                    if !is_virtual && node.is_virtual {
                        node.is_virtual = false;
                        false
                    } else {
                        true
                    }
                }
                // Missing, or a file standing where a directory must be
                _ => {
                    missing.push(current.clone());
                    false
                }
            };
            if stop || current.is_empty() {
                break;
            }
            current = path::parent_of(&current).to_string();
        }

        for dir in missing.into_iter().rev() {
            touched.insert(path::parent_of(&dir).to_string());
            self.insert_node(FileTreeNode::directory(&dir, LoadingStatus::Ready, is_virtual));
        }
    }

    /// Index `node` and link it into its parent, replacing any node of
    /// another kind at the same path. The parent must exist.
    fn insert_node(&mut self, node: FileTreeNode) {
        let replaces_other_kind = self
            .nodes
            .get(&node.path)
            .map_or(false, |existing| existing.is_directory != node.is_directory);
        if replaces_other_kind {
            self.remove_subtree(&node.path);
        }

        let parent = path::parent_of(&node.path).to_string();
        let key = node.path.clone();
        let kind = node.kind();
        self.nodes.insert(key.clone(), node);
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.insert(key, kind);
        }
    }

    /// Remove the node at `path` and every descendant from the index.
    /// The link from the parent is left for the caller.
    fn remove_subtree(&mut self, path: &str) {
        let mut stack = vec![path.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.keys().cloned());
            }
        }
    }

    fn unlink(&mut self, path: &str) {
        let parent = path::parent_of(path);
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.remove(&path.to_string());
        }
    }

    /// Directories before files, then ordinal order of names.
    fn sort_directories(&mut self, dirs: BTreeSet<String>) {
        for dir in dirs {
            if let Some(node) = self.nodes.get_mut(&dir) {
                node.children.sort_by(|(a_path, a_kind), (b_path, b_kind)| {
                    let a_is_dir = *a_kind == NodeKind::Directory;
                    let b_is_dir = *b_kind == NodeKind::Directory;
                    b_is_dir
                        .cmp(&a_is_dir)
                        .then_with(|| path::base_name(a_path).cmp(path::base_name(b_path)))
                });
            }
        }
    }
}
