use std::future::Future;

use crate::error::ListingError;
use crate::fs::tree::FileEntry;

/// Parameters of a single listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Folder to list, in the source's full path space.
    ///
    /// A value ending with `/` lists that directory. Without the trailing
    /// separator the value is a name prefix, used to find out what sits at
    /// an exact path. `None` lists the root.
    pub folder: Option<String>,
    /// List every file below the folder instead of its direct children.
    pub recursive: bool,
}

impl ListQuery {
    pub fn folder(folder: impl Into<String>) -> Self {
        Self {
            folder: Some(folder.into()),
            recursive: false,
        }
    }

    pub fn root() -> Self {
        Self::default()
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Folder as a plain prefix, `""` for the root.
    pub fn prefix(&self) -> &str {
        self.folder.as_deref().unwrap_or("")
    }
}

/// Anything that can enumerate entries under a path: a blob container,
/// a compute node's file API, a local directory.
///
/// Futures must be `Send` so the navigator can run listings as tasks.
pub trait FileSource: Send + Sync + 'static {
    /// Handle to a file's content, handed out when navigating onto a file.
    type Loader;

    fn list(
        &self,
        query: ListQuery,
    ) -> impl Future<Output = Result<Vec<FileEntry>, ListingError>> + Send;

    fn file_loader(&self, path: &str) -> Self::Loader;

    fn can_delete(&self) -> bool {
        false
    }

    fn delete(&self, path: &str) -> impl Future<Output = Result<(), ListingError>> + Send {
        let err = ListingError::unsupported(path, "delete");
        async move { Err(err) }
    }

    /// Inspect a listing failure before it is recorded. Return `None` to
    /// ignore it.
    fn on_error(&self, error: ListingError) -> Option<ListingError> {
        Some(error)
    }
}
