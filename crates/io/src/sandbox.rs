//! Path-sandbox resolution shared by every component that touches the
//! mudlib filesystem: the filesystem efuns (spec section 4.8), the session
//! layer's admin filesystem commands (spec section 4.9/SPEC_FULL.md), and
//! `clone_object`'s source-file resolution (spec section 4.7).
//!
//! Spec section 4.8: "every path argument is resolved under a configured
//! root ... paths containing `..` are rejected. Resolution computes the
//! real path of the parent directory; the final resolved path must share
//! the root's prefix or the operation fails."

use std::path::{Path, PathBuf};

/// Resolves `candidate` under `root`, rejecting anything that would escape
/// it. Returns `None` on any failure (missing parent directory, path
/// traversal, or a resolved path outside `root`) rather than an error type,
/// since every caller's failure mode is the same documented sentinel
/// (`Value::Null` or `0`, depending on the efun).
///
/// The candidate's parent directory must already exist (its real path is
/// what gets prefix-checked); this also naturally rejects `..` components
/// that would otherwise cancel out syntactically, since `canonicalize`
/// resolves them against the real filesystem rather than the path text.
pub fn resolve_under_root(root: &Path, candidate: &str) -> Option<PathBuf> {
    if candidate.contains("..") {
        return None;
    }

    let root = root.canonicalize().ok()?;
    let joined = root.join(candidate);

    let parent = joined.parent()?;
    let file_name = joined.file_name()?;

    // The parent may not exist yet (e.g. `mkdir` creating a fresh
    // directory); canonicalize it directly, and only fall back to creating
    // nothing if that fails outright.
    let parent_resolved = parent.canonicalize().ok()?;
    let resolved = parent_resolved.join(file_name);

    if resolved.starts_with(&root) {
        Some(resolved)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_outside_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hi").unwrap();
        assert!(resolve_under_root(dir.path(), "../etc/passwd").is_none());
    }

    #[test]
    fn a_plain_path_inside_root_resolves() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hi").unwrap();
        let resolved = resolve_under_root(dir.path(), "hello.txt").unwrap();
        assert_eq!(std::fs::read_to_string(resolved).unwrap(), "hi");
    }
}
