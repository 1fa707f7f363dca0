use crate::fs::navigator::NavigatorStatus;
use crate::fs::tree::{FileTreeNode, FileTreeStructure, LoadingStatus, ROOT};

const INDENT: &str = "  ";

/// Render the tree as plain text, one node per line.
///
/// Directories are prefixed with `+`, files with `-`. Each level is
/// indented by two spaces.
pub fn render_tree(tree: &FileTreeStructure) -> String {
    let mut out = String::new();
    render_children(tree, ROOT, 0, &mut out);
    out
}

fn render_children(tree: &FileTreeStructure, dir: &str, depth: usize, out: &mut String) {
    for node in tree.children(dir) {
        out.push_str(&INDENT.repeat(depth));
        out.push_str(&node_line(node));
        out.push('\n');
        if node.is_directory {
            render_children(tree, &node.path, depth + 1, out);
        }
    }
}

fn node_line(node: &FileTreeNode) -> String {
    if !node.is_directory {
        return format!("- {}", node.name);
    }
    let mut line = format!("+ {}", node.name);
    match node.loading_status {
        LoadingStatus::Loading => line.push_str(" (loading)"),
        LoadingStatus::Error => line.push_str(" (error)"),
        LoadingStatus::Ready => {}
    }
    if node.is_virtual {
        line.push_str(" (virtual)");
    }
    line
}

/// One-line summary of the navigator status, if there is anything to say.
pub fn render_status(status: &NavigatorStatus) -> Option<String> {
    match (&status.loading_status, &status.error) {
        (LoadingStatus::Error, Some(err)) => Some(format!("error: {}", err)),
        (LoadingStatus::Loading, _) => Some("loading...".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ListingError;
    use crate::fs::tree::FileEntry;

    #[test]
    fn renders_nested_tree_with_markers() {
        let mut tree = FileTreeStructure::new("");
        tree.add_files(vec![
            FileEntry::file("root.txt", 1),
            FileEntry::file("wd/stdout.txt", 2),
            FileEntry::directory("wd/sub"),
        ]);
        tree.set_status("wd/sub", LoadingStatus::Error);
        tree.add_virtual_folder("drafts");
        tree.add_files(vec![FileEntry::directory("pending")]);

        assert_eq!(
            render_tree(&tree),
            "+ drafts (virtual)\n\
             + pending (loading)\n\
             + wd\n\
             \x20 + sub (error)\n\
             \x20 - stdout.txt\n\
             - root.txt\n"
        );
    }

    #[test]
    fn empty_tree_renders_nothing() {
        assert_eq!(render_tree(&FileTreeStructure::default()), "");
    }

    #[test]
    fn status_line() {
        assert_eq!(render_status(&NavigatorStatus::default()), None);
        let status = NavigatorStatus {
            loading_status: LoadingStatus::Error,
            error: Some(ListingError::transport("wd/", "timed out")),
        };
        assert_eq!(
            render_status(&status).as_deref(),
            Some("error: Listing failed for 'wd/': timed out")
        );
    }
}
