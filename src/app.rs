use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::event::Event;
use crate::fs::navigator::{DeleteProgress, FileNavigator, Navigation};
use crate::fs::path;
use crate::fs::source::FileSource;
use crate::fs::tree::ROOT;
use crate::ui;

/// Main application state.
pub struct App<S: FileSource> {
    pub navigator: FileNavigator<S>,
    pub config: AppConfig,
    /// Local directory the watcher observes, if any.
    watch_root: Option<PathBuf>,
    pub should_quit: bool,
}

impl<S: FileSource> App<S> {
    /// Create the app and start loading the root.
    pub fn new(source: S, config: AppConfig) -> Result<Self> {
        let mut navigator = FileNavigator::new(source, config.navigator_config())?;
        navigator.init();
        Ok(Self {
            navigator,
            config,
            watch_root: None,
            should_quit: false,
        })
    }

    /// Map filesystem events under `root` into navigator paths.
    pub fn with_watch_root(mut self, root: &Path) -> Self {
        self.watch_root = Some(root.to_path_buf());
        self
    }

    /// Open each path in turn, waiting for the listings they start.
    pub async fn open_paths(&mut self, paths: &[String]) {
        for target in paths {
            match self.navigator.navigate_to(target).await {
                Navigation::File(_) => tracing::debug!("'{}' is a file", target),
                Navigation::Directory | Navigation::Unchanged => {}
            }
            self.navigator.idle().await;
        }
    }

    /// Delete files or whole folders, sending progress as events.
    ///
    /// Returns the number of files deleted.
    pub async fn delete_paths(
        &mut self,
        paths: &[String],
        events: &mpsc::UnboundedSender<Event>,
    ) -> Result<usize> {
        let report = |progress: &DeleteProgress| {
            let _ = events.send(Event::DeleteProgress(progress.clone()));
        };
        let mut deleted = 0;
        for target in paths {
            deleted += if self.navigator.is_directory(target).await {
                self.navigator.delete_folder(target, report).await?
            } else {
                self.navigator
                    .delete_files(std::slice::from_ref(target), report)
                    .await?
            };
        }
        Ok(deleted)
    }

    /// Refresh the directories affected by a batch of local changes.
    ///
    /// Each changed path refreshes the closest indexed directory holding it,
    /// once per batch. Changes to the watch root itself refresh every loaded
    /// directory. Returns the directories that were refreshed.
    pub fn handle_fs_change(&mut self, paths: Vec<PathBuf>) -> Vec<String> {
        let Some(watch_root) = self.watch_root.clone() else {
            return Vec::new();
        };

        let mut dirs = BTreeSet::new();
        let mut full_refresh = false;
        for changed in &paths {
            let Some(relative) = self.to_navigator_path(&watch_root, changed) else {
                continue;
            };
            if relative.is_empty() {
                full_refresh = true;
                break;
            }
            dirs.insert(self.closest_loaded_directory(path::parent_of(&relative)));
        }

        if full_refresh {
            dirs = self.loaded_directories();
        }

        let dirs: Vec<String> = dirs.into_iter().flatten().collect();
        for dir in &dirs {
            tracing::debug!("refreshing '{}' after filesystem change", dir);
            self.navigator.refresh(dir);
        }
        dirs
    }

    /// Convert a local path into a path relative to the navigator base.
    fn to_navigator_path(&self, watch_root: &Path, changed: &Path) -> Option<String> {
        let relative = changed.strip_prefix(watch_root).ok()?;
        let segments: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();
        let relative = segments.join("/");

        let base = self.navigator.base_path();
        if base.is_empty() {
            return Some(relative);
        }
        let stripped = path::strip_base(&relative, base);
        if stripped.len() == relative.len() && !relative.is_empty() {
            // Outside the base directory
            return None;
        }
        Some(stripped.to_string())
    }

    /// Closest indexed directory at or above `dir`, if it has been loaded.
    fn closest_loaded_directory(&self, dir: &str) -> Option<String> {
        let tree = self.navigator.tree();
        let mut current = dir;
        loop {
            if let Some(node) = tree.node(current) {
                if node.is_directory {
                    return tree.is_path_loaded(current).then(|| current.to_string());
                }
            }
            if current.is_empty() {
                return None;
            }
            current = path::parent_of(current);
        }
    }

    fn loaded_directories(&self) -> BTreeSet<Option<String>> {
        let tree = self.navigator.tree();
        let mut dirs = BTreeSet::new();
        let mut stack = vec![ROOT.to_string()];
        while let Some(dir) = stack.pop() {
            if !tree.is_path_loaded(&dir) {
                continue;
            }
            stack.extend(
                tree.children(&dir)
                    .filter(|child| child.is_directory)
                    .map(|child| child.path.clone()),
            );
            dirs.insert(Some(dir));
        }
        dirs
    }

    /// Current tree plus a status line when loading or failed.
    pub fn render(&self) -> String {
        let mut out = ui::render_tree(&self.navigator.tree());
        if let Some(status) = ui::render_status(&self.navigator.status()) {
            out.push_str(&status);
            out.push('\n');
        }
        out
    }
}
