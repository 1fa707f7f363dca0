//! Local filesystem watching for the `--watch` mode.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use notify::RecommendedWatcher;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind, Debouncer};
use tokio::sync::mpsc;

use crate::event::Event;

/// Directory names whose contents never trigger a refresh.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "target",
];

/// Changes per debounce window above which a batch becomes one root change.
pub const DEFAULT_FLOOD_THRESHOLD: usize = 100;

/// Decides which changed paths under `root` are worth reporting.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    root: PathBuf,
    ignore: Vec<String>,
    flood_threshold: usize,
}

impl ChangeFilter {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ignore: DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            flood_threshold: DEFAULT_FLOOD_THRESHOLD,
        }
    }

    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_flood_threshold(mut self, threshold: usize) -> Self {
        self.flood_threshold = threshold;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True when any component of `path` is an ignored name.
    pub fn is_ignored(&self, path: &Path) -> bool {
        path.components().any(|component| match component {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                self.ignore.iter().any(|ignored| name == ignored.as_str())
            }
            _ => false,
        })
    }

    /// Drop ignored paths and collapse a flood into a change of the root.
    ///
    /// `None` when nothing is left to report.
    pub fn batch<I>(&self, paths: I) -> Option<Vec<PathBuf>>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let kept: Vec<PathBuf> = paths.into_iter().filter(|p| !self.is_ignored(p)).collect();
        if kept.is_empty() {
            None
        } else if kept.len() > self.flood_threshold {
            Some(vec![self.root.clone()])
        } else {
            Some(kept)
        }
    }
}

/// Recursive watch on a local root. Dropping it stops the watch.
pub struct FsWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl FsWatcher {
    /// Watch `filter.root()` and send each debounced batch that survives
    /// the filter as [`Event::FsChange`].
    pub fn new(
        filter: ChangeFilter,
        debounce: Duration,
        events: mpsc::UnboundedSender<Event>,
    ) -> notify::Result<Self> {
        let root = filter.root().to_path_buf();
        let mut debouncer = new_debouncer(
            debounce,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(batch) => {
                    let changed = batch
                        .into_iter()
                        .filter(|e| e.kind == DebouncedEventKind::Any)
                        .map(|e| e.path);
                    if let Some(paths) = filter.batch(changed) {
                        tracing::debug!("{} filesystem change(s)", paths.len());
                        let _ = events.send(Event::FsChange(paths));
                    }
                }
                Err(e) => tracing::warn!("watcher error: {}", e),
            },
        )?;
        debouncer
            .watcher()
            .watch(&root, notify::RecursiveMode::Recursive)?;
        tracing::debug!("watching {}", root.display());
        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ChangeFilter {
        ChangeFilter::new(Path::new("/jobs"))
    }

    fn many(count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| PathBuf::from(format!("/jobs/wd/file_{}", i)))
            .collect()
    }

    #[test]
    fn default_ignore_list_skips_vcs_and_build_dirs() {
        let filter = filter();
        assert!(filter.is_ignored(Path::new("/jobs/.git/HEAD")));
        assert!(filter.is_ignored(Path::new("/jobs/app/node_modules/x/index.js")));
        assert!(!filter.is_ignored(Path::new("/jobs/task-1/wd/stdout.txt")));
    }

    #[test]
    fn ignore_matches_whole_names_only() {
        let filter = filter().with_ignore(vec!["target".to_string()]);
        assert!(filter.is_ignored(Path::new("/jobs/target/debug")));
        assert!(!filter.is_ignored(Path::new("/jobs/target2/file.txt")));
        assert!(!filter.with_ignore(Vec::new()).is_ignored(Path::new("/jobs/.git/HEAD")));
    }

    #[test]
    fn batch_of_only_ignored_paths_is_dropped() {
        let batch = filter().batch(vec![PathBuf::from("/jobs/.git/index")]);
        assert_eq!(batch, None);
    }

    #[test]
    fn batch_keeps_individual_paths_below_threshold() {
        let mut paths = many(3);
        paths.push(PathBuf::from("/jobs/.git/index"));
        assert_eq!(filter().batch(paths), Some(many(3)));
    }

    #[test]
    fn flood_collapses_to_root() {
        let filter = filter().with_flood_threshold(10);
        assert_eq!(filter.batch(many(10)), Some(many(10)));
        assert_eq!(filter.batch(many(11)), Some(vec![PathBuf::from("/jobs")]));
    }
}
