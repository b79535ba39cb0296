//! Document identity and directory enumeration.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default document extension when none is configured.
pub const DEFAULT_EXTENSION: &str = "pdf";

/// Identity of a document across runs: its path as a string.
///
/// Two files are the same document only if their paths are equal, so a
/// renamed file is a new document and an edited file is not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity for a path, using the same rendering everywhere.
    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Scan of a directory for documents with a given extension.
///
/// Holds no state besides its inputs: every call to [`DocumentScan::documents`]
/// re-reads the directory, so a scan can be restarted at will.
#[derive(Debug, Clone)]
pub struct DocumentScan {
    dir: PathBuf,
    extension: String,
}

impl DocumentScan {
    /// Create a scan over `dir` matching `extension` (leading dot optional).
    ///
    /// `.` components are dropped from `dir`, so `docs`, `./docs`, `docs/`
    /// and `./docs/./` all yield identities of the form `docs/a.pdf`.
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: normalize_dir(&dir.into()),
            extension: extension.trim_start_matches('.').to_lowercase(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether a path carries the scanned extension (case-insensitive).
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }

    /// List matching documents in sorted path order.
    ///
    /// Only files directly inside the directory are considered. Symlinks are
    /// followed; a dangling link is skipped.
    pub fn documents(&self) -> std::io::Result<impl Iterator<Item = DocumentId>> {
        let read_from = if self.dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            self.dir.as_path()
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(read_from)? {
            let path = self.dir.join(entry?.file_name());
            if self.matches(&path) && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths.into_iter().map(|p| DocumentId::from_path(&p)))
    }
}

/// Rebuild `dir` without `.` components. The current directory itself
/// becomes the empty path, so identities are bare file names.
fn normalize_dir(dir: &Path) -> PathBuf {
    dir.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_matches_extension_case_insensitively() {
        let scan = DocumentScan::new("/tmp", ".PDF");
        assert_eq!(scan.extension(), "pdf");
        assert!(scan.matches(Path::new("a.pdf")));
        assert!(scan.matches(Path::new("a.PDF")));
        assert!(scan.matches(Path::new("a.Pdf")));
        assert!(!scan.matches(Path::new("a.pdf.txt")));
        assert!(!scan.matches(Path::new("pdf")));
    }

    #[test]
    fn test_documents_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b.pdf");
        touch(dir.path(), "a.PDF");
        touch(dir.path(), "notes.txt");
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let scan = DocumentScan::new(dir.path(), "pdf");
        let docs: Vec<DocumentId> = scan.documents().unwrap().collect();

        assert_eq!(
            docs,
            vec![
                DocumentId::from_path(&dir.path().join("a.PDF")),
                DocumentId::from_path(&dir.path().join("b.pdf")),
            ]
        );
    }

    #[test]
    fn test_documents_restartable() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.pdf");
        let scan = DocumentScan::new(dir.path(), "pdf");

        assert_eq!(scan.documents().unwrap().count(), 1);
        touch(dir.path(), "b.pdf");
        assert_eq!(scan.documents().unwrap().count(), 2);
    }

    #[test]
    fn test_directory_spellings_share_identities() {
        let expected = DocumentId::from("docs/a.pdf");
        for spelling in ["docs", "./docs", "docs/", "docs//", "./docs/./"] {
            let scan = DocumentScan::new(spelling, "pdf");
            assert_eq!(scan.dir(), Path::new("docs"), "{spelling}");
            assert_eq!(
                DocumentId::from_path(&scan.dir().join("a.pdf")),
                expected,
                "{spelling}"
            );
        }

        assert_eq!(DocumentScan::new(".", "pdf").dir(), Path::new(""));
        assert_eq!(
            DocumentScan::new("/data/./docs/", "pdf").dir(),
            Path::new("/data/docs")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_documents_are_listed() {
        use std::os::unix::fs::symlink;

        let root = tempdir().unwrap();
        let docs = root.path().join("docs");
        std::fs::create_dir(&docs).unwrap();
        touch(&docs, "plain.pdf");
        touch(root.path(), "real.pdf");
        symlink(root.path().join("real.pdf"), docs.join("linked.pdf")).unwrap();
        symlink(root.path().join("gone.pdf"), docs.join("dangling.pdf")).unwrap();

        let docs_found: Vec<DocumentId> = DocumentScan::new(&docs, "pdf")
            .documents()
            .unwrap()
            .collect();

        assert_eq!(
            docs_found,
            vec![
                DocumentId::from_path(&docs.join("linked.pdf")),
                DocumentId::from_path(&docs.join("plain.pdf")),
            ]
        );
    }

    #[test]
    fn test_missing_dir_is_error() {
        let scan = DocumentScan::new("/definitely/not/here", "pdf");
        assert!(scan.documents().is_err());
    }
}
