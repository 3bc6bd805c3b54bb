//! Build-tree discovery.
//!
//! One breadth-first pass over the compiled build directory produces the
//! lookup tables the entrypoint resolver keys by: script paths indexed by
//! lowercase extensionless basename, and markup files in visit order.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{MARKUP_EXTENSION, SCRIPT_EXTENSION};
use crate::error::PipelineError;

/// Lookup tables produced by one walk of the build tree.
#[derive(Debug, Default)]
pub struct BuildTreeIndex {
    /// Lowercase basename (script extension stripped) to full path.
    /// Later-visited files win on key collision.
    pub scripts_by_basename: HashMap<String, PathBuf>,
    /// Markup files in visit order.
    pub markup_files: Vec<PathBuf>,
}

/// Walk `root` breadth-first, visiting every regular file exactly once.
///
/// The traversal keeps an explicit queue of pending directories, so deep
/// trees cannot overflow the stack. Any unreadable directory aborts the
/// walk; there are no partial results.
pub fn walk(root: &Path) -> Result<BuildTreeIndex, PipelineError> {
    let mut index = BuildTreeIndex::default();
    let mut pending = VecDeque::new();
    pending.push_back(root.to_path_buf());

    while let Some(dir) = pending.pop_front() {
        let entries = fs::read_dir(&dir).map_err(|e| PipelineError::filesystem(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::filesystem(&dir, e))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|e| PipelineError::filesystem(&path, e))?;
            if file_type.is_dir() {
                pending.push_back(path);
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if let Some(stem) = name.strip_suffix(SCRIPT_EXTENSION) {
                index.scripts_by_basename.insert(stem.to_string(), path);
            } else if name.ends_with(MARKUP_EXTENSION) {
                index.markup_files.push(path);
            }
        }
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_classifies_scripts_and_markup() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("Main.JS"));
        touch(&root.path().join("index.html"));
        touch(&root.path().join("styles.css"));
        touch(&root.path().join("assets/logo.svg"));
        touch(&root.path().join("assets/deep/widget.js"));

        let index = walk(root.path()).unwrap();
        assert_eq!(
            index.scripts_by_basename.get("main"),
            Some(&root.path().join("Main.JS"))
        );
        assert_eq!(
            index.scripts_by_basename.get("widget"),
            Some(&root.path().join("assets/deep/widget.js"))
        );
        assert_eq!(index.markup_files, vec![root.path().join("index.html")]);
        // Non-script, non-markup files are ignored but their directories are
        // still descended into.
        assert_eq!(index.scripts_by_basename.len(), 2);
    }

    #[test]
    fn test_collision_later_visit_wins() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("app.js"));
        touch(&root.path().join("nested/App.JS"));

        // Breadth-first order: the root-level file is visited before anything
        // inside a subdirectory, so the nested file takes the key.
        let index = walk(root.path()).unwrap();
        assert_eq!(
            index.scripts_by_basename.get("app"),
            Some(&root.path().join("nested/App.JS"))
        );
    }

    #[test]
    fn test_unreadable_root_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("does-not-exist");
        let err = walk(&missing).unwrap_err();
        assert!(matches!(err, PipelineError::Filesystem { .. }));
    }
}
