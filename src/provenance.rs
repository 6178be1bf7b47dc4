//! Capture-tool provenance extractors.
//!
//! Several capture tools stamp their output with the origin URL and save
//! time. Each extractor here knows one tool's fingerprint and recovers a
//! partial [`Provenance`] from a parsed document:
//!
//! | Extractor | Fingerprint | Yields |
//! |-----------|-------------|--------|
//! | [`ie_saved_from`] | `<!-- saved from url=(NNNN)URL -->` before `<html>` | source |
//! | [`singlefile`] | leading comment inside `<html>` with `url:`/`saved date:` | source, create |
//! | [`savepagewe`] | `<meta name="savepage-*">` tags | source, title, create |
//! | [`maoxian`] | leading comment inside `<html>` with `OriginalSrc:` | source |
//!
//! Extractors run in the table's order and merge first-wins: a field set by
//! an earlier extractor is never overwritten by a later one. Each is a pure
//! function of the document; a non-match is `None`, never an error.

use crate::timestamp;
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::node::Node;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static IE_SAVED_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*saved from url=\((\d+)\)(\S+)\s*").unwrap());
static SINGLEFILE_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+Page saved with SingleFile\s+url: (\S+)\s+saved date: ([^()]+)").unwrap()
});
static MAOXIAN_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*OriginalSrc: (\S+)").unwrap());
static JS_DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([^()]+)").unwrap());

static SAVEPAGE_URL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="savepage-url"][content]"#).unwrap());
static SAVEPAGE_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="savepage-title"][content]"#).unwrap());
static SAVEPAGE_DATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="savepage-date"][content]"#).unwrap());

/// Partial metadata recovered from a capture-tool fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub source: Option<String>,
    /// Capture time, already converted to a timestamp id.
    pub create: Option<String>,
    pub title: Option<String>,
}

impl Provenance {
    /// Take fields from `other` only where `self` has none (first-wins).
    pub fn merge_missing(&mut self, other: Provenance) {
        if self.source.is_none() {
            self.source = other.source;
        }
        if self.create.is_none() {
            self.create = other.create;
        }
        if self.title.is_none() {
            self.title = other.title;
        }
    }
}

/// Which extractors to run.
#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    pub ie: bool,
    pub singlefile: bool,
    pub savepagewe: bool,
    pub maoxian: bool,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self { ie: true, singlefile: true, savepagewe: true, maoxian: true }
    }
}

/// Run the enabled extractors in priority order, merging first-wins.
pub fn extract(doc: &Html, options: &ExtractorOptions) -> Provenance {
    type Extractor = fn(&Html) -> Option<Provenance>;
    let extractors: [(bool, Extractor); 4] = [
        (options.ie, ie_saved_from),
        (options.singlefile, singlefile),
        (options.savepagewe, savepagewe),
        (options.maoxian, maoxian),
    ];
    let mut merged = Provenance::default();
    for (enabled, extractor) in extractors {
        if !enabled {
            continue;
        }
        if let Some(found) = extractor(doc) {
            merged.merge_missing(found);
        }
    }
    merged
}

/// Internet Explorer "saved from" stamp: a comment immediately preceding
/// the root element, `saved from url=(NNNN)URL`, where the decimal prefix
/// must equal the URL's length (IE's own integrity check).
pub fn ie_saved_from(doc: &Html) -> Option<Provenance> {
    let comment = comment_before_root(doc)?;
    let captures = IE_SAVED_FROM.captures(&comment)?;
    let declared_len: usize = captures.get(1)?.as_str().parse().ok()?;
    let source = captures.get(2)?.as_str();
    if source.chars().count() != declared_len {
        return None;
    }
    Some(Provenance { source: Some(source.to_string()), ..Provenance::default() })
}

/// SingleFile banner comment: first structural child of `<html>`.
pub fn singlefile(doc: &Html) -> Option<Provenance> {
    let comment = first_inner_comment(doc)?;
    let captures = SINGLEFILE_COMMENT.captures(&comment)?;
    let source = captures.get(1)?.as_str().to_string();
    let create = parse_js_date(captures.get(2)?.as_str()).map(|dt| timestamp::datetime_to_id(&dt));
    Some(Provenance { source: Some(source), create, title: None })
}

/// SavePageWE meta tags: `savepage-url`, `savepage-title`, `savepage-date`.
pub fn savepagewe(doc: &Html) -> Option<Provenance> {
    let meta_content = |selector: &Selector| {
        doc.select(selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::to_string)
    };
    let source = meta_content(&SAVEPAGE_URL);
    let title = meta_content(&SAVEPAGE_TITLE);
    let create = meta_content(&SAVEPAGE_DATE)
        .and_then(|d| parse_js_date(&d))
        .map(|dt| timestamp::datetime_to_id(&dt));
    if source.is_none() && title.is_none() && create.is_none() {
        return None;
    }
    Some(Provenance { source, create, title })
}

/// MaoXian clipping marker: first structural child of `<html>`.
pub fn maoxian(doc: &Html) -> Option<Provenance> {
    let comment = first_inner_comment(doc)?;
    let captures = MAOXIAN_COMMENT.captures(&comment)?;
    Some(Provenance {
        source: Some(captures.get(1)?.as_str().to_string()),
        ..Provenance::default()
    })
}

/// Parse a JavaScript `Date.toString()` value, e.g.
/// `Wed Jan 01 2020 10:00:00 GMT+0800 (Taipei Standard Time)`.
///
/// The parenthesized timezone name is dropped before parsing.
pub fn parse_js_date(s: &str) -> Option<DateTime<Utc>> {
    let prefix = JS_DATE_PREFIX.captures(s)?.get(1)?.as_str().trim();
    DateTime::parse_from_str(prefix, "%a %b %d %Y %H:%M:%S GMT%z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The comment node immediately preceding the root element, skipping the
/// doctype and inter-node whitespace.
fn comment_before_root(doc: &Html) -> Option<String> {
    let root_element = doc
        .tree
        .root()
        .children()
        .find(|n| matches!(n.value(), Node::Element(_)))?;
    for sibling in root_element.prev_siblings() {
        match sibling.value() {
            Node::Comment(c) => {
                let text: &str = c;
                return Some(text.to_string());
            }
            Node::Doctype(_) => continue,
            Node::Text(t) if t.trim().is_empty() => continue,
            _ => return None,
        }
    }
    None
}

/// The leading comment inside the root element, i.e. a comment appearing
/// before any element child of `<html>`.
fn first_inner_comment(doc: &Html) -> Option<String> {
    let root_element = doc
        .tree
        .root()
        .children()
        .find(|n| matches!(n.value(), Node::Element(_)))?;
    for child in root_element.children() {
        match child.value() {
            Node::Comment(c) => {
                let text: &str = c;
                return Some(text.to_string());
            }
            Node::Text(t) if t.trim().is_empty() => continue,
            Node::Element(_) => return None,
            _ => continue,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Html {
        Html::parse_document(html)
    }

    // ========================================================================
    // IE saved-from
    // ========================================================================

    #[test]
    fn ie_extracts_source_when_length_matches() {
        // "http://example.com/page.html" is 28 chars; a mismatched declared
        // length means the stamp is not trustworthy.
        let doc_bad = parse(
            "<!-- saved from url=(0029)http://example.com/page.html -->\n\
             <html><head></head><body></body></html>",
        );
        let doc_ok = parse(
            "<!-- saved from url=(0028)http://example.com/page.html -->\n\
             <html><head></head><body></body></html>",
        );
        assert_eq!(ie_saved_from(&doc_bad), None);
        assert_eq!(
            ie_saved_from(&doc_ok).unwrap().source.as_deref(),
            Some("http://example.com/page.html")
        );
    }

    #[test]
    fn ie_tolerates_doctype_between_comment_and_root() {
        let doc = parse(
            "<!-- saved from url=(0019)http://example.com/ -->\n\
             <!DOCTYPE html><html><head></head><body></body></html>",
        );
        assert_eq!(
            ie_saved_from(&doc).unwrap().source.as_deref(),
            Some("http://example.com/")
        );
    }

    #[test]
    fn ie_ignores_plain_pages() {
        let doc = parse("<html><head></head><body></body></html>");
        assert_eq!(ie_saved_from(&doc), None);
    }

    // ========================================================================
    // SingleFile
    // ========================================================================

    #[test]
    fn singlefile_extracts_source_and_create() {
        let doc = parse(
            "<html><!--\n \
             Page saved with SingleFile \n \
             url: http://example.com/article \n \
             saved date: Wed Jan 01 2020 10:00:00 GMT+0800 (Taipei Standard Time)\n\
             --><head></head><body></body></html>",
        );
        let p = singlefile(&doc).unwrap();
        assert_eq!(p.source.as_deref(), Some("http://example.com/article"));
        assert_eq!(p.create.as_deref(), Some("20200101020000000"));
    }

    #[test]
    fn singlefile_requires_the_banner_shape() {
        let doc = parse("<html><!-- some other comment --><head></head></html>");
        assert_eq!(singlefile(&doc), None);
    }

    #[test]
    fn singlefile_with_unparseable_date_still_yields_source() {
        let doc = parse(
            "<html><!--\n \
             Page saved with SingleFile \n \
             url: http://example.com/ \n \
             saved date: not a date at all\n\
             --><head></head></html>",
        );
        let p = singlefile(&doc).unwrap();
        assert_eq!(p.source.as_deref(), Some("http://example.com/"));
        assert_eq!(p.create, None);
    }

    // ========================================================================
    // SavePageWE
    // ========================================================================

    #[test]
    fn savepagewe_extracts_all_fields() {
        let doc = parse(
            r#"<html><head>
            <meta name="savepage-url" content="http://example.com/we">
            <meta name="savepage-title" content="Saved Title">
            <meta name="savepage-date" content="Wed Jan 01 2020 00:00:00 GMT+0800 (CST)">
            </head><body></body></html>"#,
        );
        let p = savepagewe(&doc).unwrap();
        assert_eq!(p.source.as_deref(), Some("http://example.com/we"));
        assert_eq!(p.title.as_deref(), Some("Saved Title"));
        assert_eq!(p.create.as_deref(), Some("20191231160000000"));
    }

    #[test]
    fn savepagewe_ignores_unrelated_meta() {
        let doc = parse(r#"<html><head><meta name="viewport" content="x"></head></html>"#);
        assert_eq!(savepagewe(&doc), None);
    }

    // ========================================================================
    // MaoXian
    // ========================================================================

    #[test]
    fn maoxian_extracts_source() {
        let doc = parse(
            "<html><!-- OriginalSrc: http://example.com/clip --><head></head></html>",
        );
        assert_eq!(
            maoxian(&doc).unwrap().source.as_deref(),
            Some("http://example.com/clip")
        );
    }

    // ========================================================================
    // Priority merge
    // ========================================================================

    #[test]
    fn earlier_extractor_wins_per_field() {
        let doc = parse(
            r#"<!-- saved from url=(0019)http://example.com/ -->
            <html><head>
            <meta name="savepage-url" content="http://other.example.com/">
            <meta name="savepage-title" content="From WE">
            </head><body></body></html>"#,
        );
        let merged = extract(&doc, &ExtractorOptions::default());
        // IE runs first and claims source; title only exists in SavePageWE.
        assert_eq!(merged.source.as_deref(), Some("http://example.com/"));
        assert_eq!(merged.title.as_deref(), Some("From WE"));
    }

    #[test]
    fn disabled_extractors_are_skipped() {
        let doc = parse(
            "<!-- saved from url=(0019)http://example.com/ -->\
             <html><head></head><body></body></html>",
        );
        let options = ExtractorOptions { ie: false, ..ExtractorOptions::default() };
        assert_eq!(extract(&doc, &options), Provenance::default());
    }

    #[test]
    fn plain_page_yields_nothing() {
        let doc = parse("<html><head><title>T</title></head><body></body></html>");
        assert_eq!(extract(&doc, &ExtractorOptions::default()), Provenance::default());
    }

    // ========================================================================
    // JS dates
    // ========================================================================

    #[test]
    fn js_date_with_negative_offset() {
        let dt = parse_js_date("Tue Dec 31 2019 19:30:00 GMT-0500 (Eastern Standard Time)").unwrap();
        assert_eq!(timestamp::datetime_to_id(&dt), "20200101003000000");
    }

    #[test]
    fn js_date_garbage_is_none() {
        assert_eq!(parse_js_date("yesterday-ish"), None);
        assert_eq!(parse_js_date(""), None);
    }
}
