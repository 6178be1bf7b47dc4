//! Percent-encoding-safe URL/path helpers.
//!
//! Generated pages and rewritten icon fields refer to files by *relative
//! URL*, not by filesystem path: segments are percent-encoded (`#` → `%23`,
//! `%` → `%25`, non-ASCII → UTF-8 escapes) and directories keep a trailing
//! slash so plain string concatenation stays correct. Rather than hand-roll
//! the encoding rules, both paths are lifted into `file:` URLs and the `url`
//! crate computes the relative form between them.

use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Relative URL of `target` as seen from the directory `base_dir`.
///
/// Both paths must be absolute. When `target_is_dir`, the result carries a
/// trailing slash (unless it is empty, i.e. `target` *is* `base_dir`).
///
/// ```
/// use clipbook::urlpath::relative_url;
/// use std::path::Path;
///
/// let rel = relative_url(
///     Path::new("/book/.clipbook/tree/favicon/ab.ico"),
///     Path::new("/book/20200101000000000"),
///     false,
/// );
/// assert_eq!(rel.as_deref(), Some("../.clipbook/tree/favicon/ab.ico"));
/// ```
pub fn relative_url(target: &Path, base_dir: &Path, target_is_dir: bool) -> Option<String> {
    let base = Url::from_directory_path(base_dir).ok()?;
    let target = if target_is_dir {
        Url::from_directory_path(target).ok()?
    } else {
        Url::from_file_path(target).ok()?
    };
    let mut rel = base.make_relative(&target)?;
    if target_is_dir && !rel.is_empty() && !rel.ends_with('/') {
        rel.push('/');
    }
    Some(rel)
}

/// True if `s` is an absolute URL reference (carries a scheme).
///
/// Relative references, including scheme-relative `//host/...` ones, are
/// not parseable without a base and return false.
pub fn has_scheme(s: &str) -> bool {
    Url::parse(s).is_ok()
}

/// A relative reference split into its path, query, and fragment parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

/// Split a relative reference the way a URL parser would: fragment first,
/// then query, leaving the raw (still percent-encoded) path.
pub fn split_reference(s: &str) -> Reference<'_> {
    let (rest, fragment) = match s.split_once('#') {
        Some((rest, frag)) => (rest, Some(frag)),
        None => (s, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };
    Reference { path, query, fragment }
}

/// Fragment part of a URL (everything after the first `#`), if any.
pub fn fragment(s: &str) -> Option<&str> {
    s.split_once('#').map(|(_, frag)| frag)
}

/// Decode percent escapes into a string (invalid UTF-8 is replaced).
pub fn percent_decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Lexically normalize a path: drop `.` segments and fold `..` against the
/// preceding segment. Purely textual — nothing is resolved on disk.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}
