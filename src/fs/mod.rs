//! File tree model, listing sources, navigation and watching.

pub mod local;
pub mod memory;
pub mod navigator;
pub mod path;
pub mod source;
pub mod tree;
pub mod watcher;
