//! Lazy-loading file tree over flat file listings.
//!
//! [`fs::tree::FileTreeStructure`] turns listings into a hierarchy and
//! [`fs::navigator::FileNavigator`] keeps it loaded as paths are visited.

pub mod app;
pub mod config;
pub mod error;
pub mod event;
pub mod fs;
pub mod ordered_map;
pub mod ui;
