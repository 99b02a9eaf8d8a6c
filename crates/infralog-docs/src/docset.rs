//! The set of documents that exist on disk.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::{DocsError, Result};

const DOC_EXTENSIONS: &[&str] = &["md", "mdx"];

/// Identifiers of the documents available to a sidebar.
///
/// An identifier is the path relative to the docs root, using `/` as the
/// separator and without the file extension (`backends/s3.md` becomes
/// `backends/s3`). Files and directories starting with `_` or `.` are
/// partials or hidden and are not documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocSet {
    ids: BTreeSet<String>,
}

impl DocSet {
    /// Build a set from explicit identifiers.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Scan a documentation directory recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or one of its subdirectories
    /// cannot be read.
    pub fn from_dir(root: &Path) -> Result<Self> {
        let mut ids = BTreeSet::new();
        scan(root, "", &mut ids)?;
        Ok(Self { ids })
    }

    /// Whether a document with this identifier exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when no documents were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

fn scan(dir: &Path, prefix: &str, ids: &mut BTreeSet<String>) -> Result<()> {
    let read_err = |source| DocsError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('_') || name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            scan(&path, &format!("{prefix}{name}/"), ids)?;
            continue;
        }

        let is_doc = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DOC_EXTENSIONS.contains(&ext));
        if let (true, Some(stem)) = (is_doc, path.file_stem().and_then(|s| s.to_str())) {
            ids.insert(format!("{prefix}{stem}"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "# page\n").unwrap();
    }

    #[test]
    fn test_from_dir_builds_relative_ids() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "index.md");
        touch(dir.path(), "backends/s3.md");
        touch(dir.path(), "targets/slack.mdx");
        touch(dir.path(), "sidebars.ts");
        touch(dir.path(), "_partial.md");
        touch(dir.path(), "_drafts/wip.md");

        let docs = DocSet::from_dir(dir.path()).unwrap();
        assert_eq!(
            docs.iter().collect::<Vec<_>>(),
            vec!["backends/s3", "index", "targets/slack"]
        );
    }

    #[test]
    fn test_from_dir_missing_directory() {
        let err = DocSet::from_dir(Path::new("/nonexistent/infralog/docs")).unwrap_err();
        assert!(matches!(err, DocsError::ReadDir { .. }));
    }

    #[test]
    fn test_workspace_docs_cover_sidebar() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs");
        let docs = DocSet::from_dir(&root).unwrap();
        let issues = crate::Sidebars::infralog().validate(&docs);
        assert!(issues.is_empty(), "sidebar issues: {issues:?}");
    }
}
