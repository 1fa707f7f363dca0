use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A listing request failed.
    #[error(transparent)]
    Listing(#[from] ListingError),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Filesystem watcher could not be started.
    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Configuration or snapshot file could not be parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// Every event sender was dropped.
    #[error("Event channel closed")]
    ChannelClosed,
}

/// Broad category of a listing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingErrorKind {
    NotFound,
    PermissionDenied,
    /// The source does not implement the requested operation.
    Unsupported,
    /// Any other failure talking to the source.
    Transport,
}

/// Failure reported by a [`FileSource`](crate::fs::source::FileSource).
///
/// Cloneable so the navigator can keep the last error around for display
/// while also handing it to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Listing failed for '{path}': {message}")]
pub struct ListingError {
    pub path: String,
    pub kind: ListingErrorKind,
    pub message: String,
}

impl ListingError {
    pub fn new(kind: ListingErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::new(ListingErrorKind::NotFound, path, "not found")
    }

    pub fn unsupported(path: impl Into<String>, operation: &str) -> Self {
        Self::new(
            ListingErrorKind::Unsupported,
            path,
            format!("{} is not supported by this source", operation),
        )
    }

    pub fn transport(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ListingErrorKind::Transport, path, message)
    }

    /// Map an I/O error raised while reading `path`.
    pub fn from_io(path: impl Into<String>, err: &std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ListingErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ListingErrorKind::PermissionDenied,
            _ => ListingErrorKind::Transport,
        };
        Self::new(kind, path, err.to_string())
    }
}

/// Errors from positional operations on an [`OrderedMap`](crate::ordered_map::OrderedMap).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("Map already contains key {0}")]
    DuplicateKey(String),

    #[error("Failed to insert at index {index}: map has a length of {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Unable to find an entry with a key of \"{0}\" in the map")]
    KeyNotFound(String),
}
