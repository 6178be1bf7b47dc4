//! Content classification: web document vs opaque file.
//!
//! Classification is by extension only — the indexer never sniffs bytes.
//! Web documents get parsed (for zip containers, the index page is
//! extracted first) so provenance extractors and title/favicon probing can
//! run; everything else is registered as an opaque `file` item.

use crate::archive::{self, ArchiveError};
use scraper::Html;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions treated as web documents (parseable, or a container holding
/// a parseable index page).
pub const WEB_DOCUMENT_EXTENSIONS: [&str; 6] = ["html", "htm", "xhtml", "xht", "htz", "maff"];

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("no document content in {0:?}")]
    Empty(PathBuf),
}

/// True if the path's extension marks it as a web document.
pub fn is_web_document(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            WEB_DOCUMENT_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Load and parse a web document's markup tree.
///
/// For zip containers this parses the index page (htz: `index.html`;
/// maff: the primary page). An empty or whitespace-only document is an
/// error — there is nothing to extract from it.
pub fn load_document(path: &Path) -> Result<Html, ClassifyError> {
    let bytes = if archive::is_archive(path) {
        let member = archive::index_member(path)?;
        archive::read_member(path, &member)?
    } else {
        fs::read(path)?
    };
    let content = String::from_utf8_lossy(&bytes);
    if content.trim().is_empty() {
        return Err(ClassifyError::Empty(path.to_path_buf()));
    }
    Ok(Html::parse_document(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_zip;
    use tempfile::TempDir;

    // ========================================================================
    // Extension classification
    // ========================================================================

    #[test]
    fn classifies_markup_extensions() {
        assert!(is_web_document(Path::new("a.html")));
        assert!(is_web_document(Path::new("a.HTM")));
        assert!(is_web_document(Path::new("a.xhtml")));
        assert!(is_web_document(Path::new("a.xht")));
        assert!(is_web_document(Path::new("a.htz")));
        assert!(is_web_document(Path::new("a.maff")));
    }

    #[test]
    fn classifies_opaque_files() {
        assert!(!is_web_document(Path::new("a.txt")));
        assert!(!is_web_document(Path::new("a.png")));
        assert!(!is_web_document(Path::new("archive.zip")));
        assert!(!is_web_document(Path::new("noext")));
    }

    // ========================================================================
    // Document loading
    // ========================================================================

    #[test]
    fn parses_plain_html() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.html");
        fs::write(&path, "<html><head><title>T</title></head><body/></html>").unwrap();
        let doc = load_document(&path).unwrap();
        let sel = scraper::Selector::parse("title").unwrap();
        let title = doc.select(&sel).next().unwrap();
        assert_eq!(title.text().collect::<String>(), "T");
    }

    #[test]
    fn parses_htz_index_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.htz");
        write_zip(
            &path,
            &[("index.html", b"<html><head><title>Zipped</title></head><body/></html>")],
        );

        let doc = load_document(&path).unwrap();
        let sel = scraper::Selector::parse("title").unwrap();
        let title = doc.select(&sel).next().unwrap();
        assert_eq!(title.text().collect::<String>(), "Zipped");
    }

    #[test]
    fn empty_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.html");
        fs::write(&path, "  \n ").unwrap();
        assert!(matches!(load_document(&path), Err(ClassifyError::Empty(_))));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_document(Path::new("/nonexistent/x.html")).is_err());
    }
}
