//! String helpers for the forward-slash path space used by remote listings.
//!
//! Paths here are plain strings, not `std::path::Path`: blob names and
//! node file paths are not local filesystem paths and must keep `/`
//! regardless of the host platform.

/// Path separator used by every path stored in the tree.
pub const SEPARATOR: char = '/';

/// Replace backslash separators with forward slashes.
///
/// Repeated slashes and `.`/`..` segments are left untouched.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// Path with the last segment removed. Root-level entries have parent `""`.
pub fn parent_of(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last `/`-delimited segment.
pub fn base_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Ensure a non-empty path ends with exactly one separator.
pub fn as_base_directory(path: &str) -> String {
    let trimmed = trim_trailing_separator(path);
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}{}", trimmed, SEPARATOR)
    }
}

/// Remove any trailing separators.
pub fn trim_trailing_separator(path: &str) -> &str {
    path.trim_end_matches(SEPARATOR)
}

/// Join two path fragments, skipping empty ones.
pub fn join(base: &str, path: &str) -> String {
    let base = trim_trailing_separator(base);
    let path = path.trim_start_matches(SEPARATOR);
    match (base.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}{}{}", base, SEPARATOR, path),
    }
}

/// Strip a base directory prefix (as produced by [`as_base_directory`]).
///
/// Paths outside the base are returned unchanged.
pub fn strip_base<'a>(path: &'a str, base: &str) -> &'a str {
    if base.is_empty() {
        return path;
    }
    if let Some(rest) = path.strip_prefix(base) {
        return rest;
    }
    // The base directory itself, written without its trailing separator.
    if path == trim_trailing_separator(base) {
        return "";
    }
    path
}

/// Direct child of `dir` on the way to `path`, if `path` lies under `dir`.
///
/// `child_toward("a", "a/b/c.txt")` is `Some("a/b")`.
pub fn child_toward<'a>(dir: &str, path: &'a str) -> Option<&'a str> {
    let rest = if dir.is_empty() {
        path
    } else {
        let rest = path.strip_prefix(dir)?;
        rest.strip_prefix(SEPARATOR)?
    };
    if rest.is_empty() {
        return None;
    }
    let prefix_len = path.len() - rest.len();
    let segment_len = rest.find(SEPARATOR).unwrap_or(rest.len());
    Some(&path[..prefix_len + segment_len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_replaces_backslashes_only() {
        assert_eq!(normalize("wd\\sub\\stdout.txt"), "wd/sub/stdout.txt");
        assert_eq!(normalize("a//b/./c"), "a//b/./c");
    }

    #[test]
    fn parent_of_root_level_entry_is_root() {
        assert_eq!(parent_of("stdout.txt"), "");
        assert_eq!(parent_of("wd/stdout.txt"), "wd");
        assert_eq!(parent_of("a/b/c"), "a/b");
        assert_eq!(parent_of(""), "");
    }

    #[test]
    fn base_name_is_last_segment() {
        assert_eq!(base_name("wd/sub/main.sh"), "main.sh");
        assert_eq!(base_name("root.txt"), "root.txt");
        assert_eq!(base_name(""), "");
    }

    #[test]
    fn as_base_directory_adds_single_separator() {
        assert_eq!(as_base_directory(""), "");
        assert_eq!(as_base_directory("startup/wd"), "startup/wd/");
        assert_eq!(as_base_directory("startup/wd//"), "startup/wd/");
    }

    #[test]
    fn join_skips_empty_parts() {
        assert_eq!(join("", "a/b"), "a/b");
        assert_eq!(join("base/", ""), "base");
        assert_eq!(join("base/", "/a"), "base/a");
    }

    #[test]
    fn strip_base_handles_outside_paths() {
        assert_eq!(strip_base("startup/wd/a.txt", "startup/wd/"), "a.txt");
        assert_eq!(strip_base("startup/wd", "startup/wd/"), "");
        assert_eq!(strip_base("other/a.txt", "startup/wd/"), "other/a.txt");
        assert_eq!(strip_base("a.txt", ""), "a.txt");
    }

    #[test]
    fn child_toward_finds_direct_child() {
        assert_eq!(child_toward("a", "a/b/c.txt"), Some("a/b"));
        assert_eq!(child_toward("a", "a/b"), Some("a/b"));
        assert_eq!(child_toward("", "x/y"), Some("x"));
        assert_eq!(child_toward("a", "ab/c"), None);
        assert_eq!(child_toward("a", "a"), None);
    }
}
