//! Zip-based capture containers.
//!
//! Two formats are recognized by extension:
//!
//! - `.htz` — a single captured page; the page itself is the `index.html`
//!   member at the archive root.
//! - `.maff` — multiple captured pages, one top-level directory each. The
//!   *primary* page is whichever `<topdir>/index.*` member is declared
//!   first in the archive (excluding `index.rdf` manifests).
//!
//! Member names inside archives always use `/` separators and may carry
//! relative `..`/`.` segments when referenced from a page; [`sibling_member`]
//! resolves those lexically, never touching the filesystem.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("no page found in {0:?}")]
    NoPage(PathBuf),
}

/// True for recognized zip container extensions (`htz`, `maff`).
pub fn is_archive(path: &Path) -> bool {
    matches!(lowercase_extension(path).as_deref(), Some("htz" | "maff"))
}

/// True for the multi-page container format (`maff`).
pub fn is_multi_page(path: &Path) -> bool {
    lowercase_extension(path).as_deref() == Some("maff")
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// The member holding the archive's index page.
///
/// For `.htz` that is always `index.html`; for `.maff` the primary page is
/// resolved by declaration order.
pub fn index_member(path: &Path) -> Result<String, ArchiveError> {
    if is_multi_page(path) {
        primary_page(path)
    } else {
        Ok("index.html".to_string())
    }
}

/// First `<topdir>/index.*` member in declared entry order, excluding
/// `index.rdf`.
pub fn primary_page(path: &Path) -> Result<String, ArchiveError> {
    let mut zip = open(path)?;
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        if is_page_member(entry.name()) {
            return Ok(entry.name().to_string());
        }
    }
    Err(ArchiveError::NoPage(path.to_path_buf()))
}

fn is_page_member(name: &str) -> bool {
    let mut segments = name.split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(top), Some(file), None) => {
            !top.is_empty()
                && file.starts_with("index.")
                && file != "index.rdf"
        }
        _ => false,
    }
}

/// Read one member's bytes.
pub fn read_member(path: &Path, member: &str) -> Result<Vec<u8>, ArchiveError> {
    let mut zip = open(path)?;
    let mut entry = zip.by_name(member)?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn open(path: &Path) -> Result<ZipArchive<File>, ArchiveError> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(file)?)
}

/// Resolve `subpath` against the directory of `member`, folding `.` and
/// `..` segments. Used to locate a favicon referenced by a page inside the
/// same archive.
pub fn sibling_member(member: &str, subpath: &str) -> String {
    let dir = match member.rfind('/') {
        Some(pos) => &member[..pos],
        None => "",
    };
    let mut out: Vec<&str> = Vec::new();
    for segment in dir.split('/').chain(subpath.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            seg => out.push(seg),
        }
    }
    out.join("/")
}
