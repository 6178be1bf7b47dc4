//! Static site generation for the book tree.
//!
//! Renders the TOC into a browsable set of pages under the tree directory,
//! incrementally: every artifact is rendered to memory first and only
//! written when its bytes differ from what is on disk.
//!
//! ## Generated Artifacts
//!
//! ```text
//! .clipbook/tree/
//! ├── icon/                      # Toolbar and item-type icons (11 PNGs)
//! │   ├── toggle.png
//! │   └── ...
//! ├── index.html                 # Plain expanded tree (optional, no scripts)
//! ├── map.html                   # Interactive tree (toggle script, toolbar)
//! ├── frame.html                 # Frameset: map beside a content pane
//! └── search.html                # Search form over meta.json
//! ```
//!
//! ## Tree Walk
//!
//! Pages consume a flat [`WalkEvent`] stream produced by [`walk_tree`]:
//! depth-first from `root`, tolerant of TOC cycles. A node already on the
//! current ancestor path still renders (as a clickable reference) but its
//! children are not expanded, so self-referential folders terminate.
//! Child ids without a metadata entry are dropped silently.
//!
//! ## Write Policy
//!
//! A destination whose existing bytes have the same length and SHA-256 as
//! the fresh render is skipped outright, preserving its mtime. Anything
//! else is backed up through the book's backup session and overwritten.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! CSS and scripts are embedded at compile time from `static/`. The item
//! markup shape is stable and asserted by tests, since user styling and
//! the toggle script both key off it.

use crate::book::{Book, BookError, Item, ItemType, MetaStore, Toc, ROOT_ID};
use crate::event::Event;
use crate::locale::Locale;
use crate::urlpath;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const CSS: &str = include_str!("../static/style.css");
const MAP_JS: &str = include_str!("../static/map.js");
const SEARCH_JS: &str = include_str!("../static/search.js");

/// Fixed resource set staged into the tree directory on every build.
const SITE_ICONS: [(&str, &[u8]); 11] = [
    ("icon/toggle.png", include_bytes!("../static/icon/toggle.png")),
    ("icon/search.png", include_bytes!("../static/icon/search.png")),
    ("icon/collapse.png", include_bytes!("../static/icon/collapse.png")),
    ("icon/expand.png", include_bytes!("../static/icon/expand.png")),
    ("icon/external.png", include_bytes!("../static/icon/external.png")),
    ("icon/item.png", include_bytes!("../static/icon/item.png")),
    ("icon/fclose.png", include_bytes!("../static/icon/fclose.png")),
    ("icon/fopen.png", include_bytes!("../static/icon/fopen.png")),
    ("icon/file.png", include_bytes!("../static/icon/file.png")),
    ("icon/note.png", include_bytes!("../static/icon/note.png")),
    ("icon/postit.png", include_bytes!("../static/icon/postit.png")),
];

/// Build switches, resolved by the caller from config and flags.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub static_index: bool,
    pub locale: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { static_index: false, locale: "en".to_string() }
    }
}

/// Build the static site for `book`.
///
/// Returns a pull-based run over the artifact list; one artifact is
/// rendered and written per refill, so dropping the run between events
/// leaves already-written artifacts intact and touches nothing else.
pub fn build_site(book: &mut Book, options: BuildOptions) -> BuildRun<'_> {
    let mut queue = VecDeque::new();
    queue.push_back(Event::info("Generating static site..."));

    let mut artifacts = Vec::new();
    if book.config.no_tree {
        queue.push_back(Event::critical(
            "Tree support is disabled for this book (no_tree).",
        ));
    } else {
        for (rel, bytes) in SITE_ICONS {
            artifacts.push(Artifact::Resource { rel, bytes });
        }
        if options.static_index {
            artifacts.push(Artifact::Page(PageKind::StaticIndex));
        }
        artifacts.push(Artifact::Page(PageKind::Map));
        artifacts.push(Artifact::Page(PageKind::Frame));
        artifacts.push(Artifact::Page(PageKind::Search));
    }

    BuildRun {
        book,
        locale: Locale::new(&options.locale),
        pending: artifacts.into_iter(),
        queue,
    }
}

enum Artifact {
    Resource { rel: &'static str, bytes: &'static [u8] },
    Page(PageKind),
}

#[derive(Clone, Copy)]
enum PageKind {
    StaticIndex,
    Map,
    Frame,
    Search,
}

impl PageKind {
    fn filename(self) -> &'static str {
        match self {
            PageKind::StaticIndex => "index.html",
            PageKind::Map => "map.html",
            PageKind::Frame => "frame.html",
            PageKind::Search => "search.html",
        }
    }
}

pub struct BuildRun<'a> {
    book: &'a mut Book,
    locale: Locale,
    pending: std::vec::IntoIter<Artifact>,
    queue: VecDeque<Event>,
}

impl Iterator for BuildRun<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            let artifact = self.pending.next()?;
            let tree_dir = self.book.tree_dir();
            let (rel, bytes) = match artifact {
                Artifact::Resource { rel, bytes } => (rel, bytes.to_vec()),
                Artifact::Page(kind) => {
                    let markup = match kind {
                        PageKind::StaticIndex => {
                            page_static_index(self.book, &self.locale, &tree_dir)
                        }
                        PageKind::Map => page_map(self.book, &self.locale, &tree_dir),
                        PageKind::Frame => page_frame(self.book),
                        PageKind::Search => page_search(self.book, &self.locale, &tree_dir),
                    };
                    (kind.filename(), markup.into_string().into_bytes())
                }
            };
            let dest = tree_dir.join(rel);
            let mut events = Vec::new();
            write_artifact(self.book, &dest, &bytes, &mut events);
            self.queue.extend(events);
        }
    }
}

// ============================================================================
// Tree walk
// ============================================================================

/// One step of the depth-first TOC traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    StartList,
    StartItem(String),
    EndItem(String),
    EndList,
}

/// Walk the TOC depth-first from `root`, emitting list/item boundaries.
///
/// The root list is always emitted, even when empty. A child whose id is
/// already on the path from the root to the current node emits its
/// `StartItem`/`EndItem` pair but is not expanded, so cyclic TOCs
/// terminate with exactly one occurrence per path.
pub fn walk_tree(meta: &MetaStore, toc: &Toc, root: &str) -> Vec<WalkEvent> {
    let mut events = Vec::new();
    let mut on_path = HashSet::new();
    on_path.insert(root.to_string());
    events.push(WalkEvent::StartList);
    walk_children(meta, toc, root, &mut on_path, &mut events);
    events.push(WalkEvent::EndList);
    events
}

fn walk_children(
    meta: &MetaStore,
    toc: &Toc,
    id: &str,
    on_path: &mut HashSet<String>,
    events: &mut Vec<WalkEvent>,
) {
    for child in toc.children(id) {
        if !meta.contains(child) {
            continue;
        }
        events.push(WalkEvent::StartItem(child.clone()));
        if !toc.children(child).is_empty() && on_path.insert(child.clone()) {
            events.push(WalkEvent::StartList);
            walk_children(meta, toc, child, on_path, events);
            events.push(WalkEvent::EndList);
            on_path.remove(child);
        }
        events.push(WalkEvent::EndItem(child.clone()));
    }
}

// ============================================================================
// Node rendering
// ============================================================================

/// Render one TOC node's inner block (everything inside its `<li>`).
///
/// Separators render as a fieldset/legend rule; everything else renders as
/// an anchor with icon and title.
fn render_node(book: &Book, id: &str, tree_dir: &Path) -> Markup {
    let Some(item) = book.meta.get(id) else {
        return html! {};
    };

    if item.kind() == ItemType::Separator {
        let title = item.title.clone().unwrap_or_default();
        return html! {
            div {
                fieldset {
                    legend { "\u{a0}" (title) "\u{a0}" }
                }
            }
        };
    }

    let href = item_href(book, item, tree_dir);
    let icon = item_icon_url(book, item, tree_dir);
    let title = match item.title.as_deref() {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => id.to_string(),
    };
    let marked = item.marked.then_some("marked");
    html! {
        div {
            a href=[href] class=[marked] {
                img src=(icon) alt="" loading="lazy";
                (title)
            }
        }
    }
}

/// Anchor target for an item, if it has one.
///
/// Folders never link. Bookmarks link to their source verbatim, falling
/// back to their index file. Everything else links to its index file,
/// with the source URL's fragment reappended so in-page targets survive.
fn item_href(book: &Book, item: &Item, tree_dir: &Path) -> Option<String> {
    match item.kind() {
        ItemType::Folder | ItemType::Separator => None,
        ItemType::Bookmark => {
            if let Some(source) = item.source.as_deref().filter(|s| !s.is_empty()) {
                return Some(source.to_string());
            }
            let index = book.index_file(item)?;
            urlpath::relative_url(&index, tree_dir, false)
        }
        _ => {
            let index = book.index_file(item)?;
            let mut href = urlpath::relative_url(&index, tree_dir, false)?;
            if let Some(frag) = item.source.as_deref().and_then(urlpath::fragment) {
                href.push('#');
                href.push_str(frag);
            }
            Some(href)
        }
    }
}

/// Icon URL for an item.
///
/// An absolute stored icon is used verbatim. A relative one resolves from
/// the item's content directory (the index file's directory, or the data
/// dir without an index); the stored reference is appended to that
/// directory's relative URL as-is. No icon means the per-type default.
fn item_icon_url(book: &Book, item: &Item, tree_dir: &Path) -> String {
    let icon = item.icon.as_deref().unwrap_or("");
    if icon.is_empty() {
        return default_icon(&item.kind()).to_string();
    }
    if urlpath::has_scheme(icon) {
        return icon.to_string();
    }
    let base = match book.index_file(item) {
        Some(index) => match index.parent() {
            Some(parent) => parent.to_path_buf(),
            None => book.data_dir(),
        },
        None => book.data_dir(),
    };
    match urlpath::relative_url(&base, tree_dir, true) {
        Some(prefix) => format!("{prefix}{icon}"),
        None => icon.to_string(),
    }
}

fn default_icon(kind: &ItemType) -> &'static str {
    match kind {
        ItemType::Folder => "icon/fclose.png",
        ItemType::File | ItemType::Image => "icon/file.png",
        ItemType::Note => "icon/note.png",
        ItemType::Postit => "icon/postit.png",
        _ => "icon/item.png",
    }
}

// ============================================================================
// Tree assembly
// ============================================================================

/// Render the whole TOC as nested lists, root list id `item-root`.
fn render_tree(book: &Book, tree_dir: &Path) -> Markup {
    let events = walk_tree(&book.meta, &book.toc, ROOT_ID);
    let mut out = String::new();
    let mut depth = 0usize;
    for event in &events {
        match event {
            WalkEvent::StartList => {
                out.push_str(if depth == 0 { "<ul id=\"item-root\">" } else { "<ul>" });
                depth += 1;
            }
            WalkEvent::EndList => {
                out.push_str("</ul>");
                depth = depth.saturating_sub(1);
            }
            WalkEvent::StartItem(id) => {
                let _ = write!(out, "<li data-id=\"{}\">", attr_escape(id));
                out.push_str(&render_node(book, id, tree_dir).into_string());
            }
            WalkEvent::EndItem(_) => out.push_str("</li>"),
        }
    }
    PreEscaped(out)
}

fn attr_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// Pages
// ============================================================================

/// Plain expanded tree, no scripts. Suitable for archival viewing and
/// no-JS browsers.
fn page_static_index(book: &Book, locale: &Locale, tree_dir: &Path) -> Markup {
    let data_dir_url =
        urlpath::relative_url(&book.data_dir(), tree_dir, true).unwrap_or_default();
    html! {
        (DOCTYPE)
        html lang=(locale.lang().replace('_', "-")) dir=(locale.bidi_dir())
            data-clipbook-data-dir=(data_dir_url) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (book.config.name) }
                style { (PreEscaped(CSS)) }
            }
            body {
                div id="items" {
                    (render_tree(book, tree_dir))
                }
            }
        }
    }
}

/// Interactive tree: same item markup as the static index plus a toolbar
/// and the toggle script. `<base target="main">` routes item links into
/// the content pane when viewed inside `frame.html`.
fn page_map(book: &Book, locale: &Locale, tree_dir: &Path) -> Markup {
    let data_dir_url =
        urlpath::relative_url(&book.data_dir(), tree_dir, true).unwrap_or_default();
    html! {
        (DOCTYPE)
        html lang=(locale.lang().replace('_', "-")) dir=(locale.bidi_dir())
            data-clipbook-data-dir=(data_dir_url) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (book.config.name) }
                base target="main";
                style { (PreEscaped(CSS)) }
            }
            body {
                header {
                    img id="toggle-all" src="icon/toggle.png"
                        alt=(locale.text("toggle_all")) title=(locale.text("toggle_all"));
                    a href="search.html" target="_self" {
                        img src="icon/search.png"
                            alt=(locale.text("search")) title=(locale.text("search"));
                    }
                }
                div id="items" {
                    (render_tree(book, tree_dir))
                }
                script { (PreEscaped(MAP_JS)) }
            }
        }
    }
}

/// Frameset shell: the map beside a content pane named `main`.
fn page_frame(book: &Book) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="UTF-8";
                title { (book.config.name) }
            }
            frameset cols="200,*" {
                frame src="map.html" name="toc" {}
                frame name="main" {}
            }
        }
    }
}

/// Search form over `meta.json`. The script reads its parameters from the
/// root element's data attributes; everything it needs to locate the
/// metadata and build result links is baked in here.
fn page_search(book: &Book, locale: &Locale, tree_dir: &Path) -> Markup {
    let root_url = urlpath::relative_url(book.root(), tree_dir, true).unwrap_or_default();
    let data_dir_url =
        urlpath::relative_url(&book.data_dir(), book.root(), true).unwrap_or_default();
    let tree_dir_url =
        urlpath::relative_url(tree_dir, book.root(), true).unwrap_or_default();
    let view_url = format!("{root_url}{}", book.config.index);
    html! {
        (DOCTYPE)
        html lang=(locale.lang().replace('_', "-")) dir=(locale.bidi_dir())
            data-clipbook-path=(root_url)
            data-clipbook-data-dir=(data_dir_url)
            data-clipbook-tree-dir=(tree_dir_url)
            data-clipbook-index=(book.config.index)
            data-clipbook-no-results=(locale.text("search_no_results"))
            data-clipbook-view-in-map=(locale.text("search_view_in_map")) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (book.config.name) " :: " (locale.text("search")) }
                style { (PreEscaped(CSS)) }
            }
            body {
                header {
                    a href=(view_url) { (book.config.name) }
                }
                form id="search-form" {
                    input type="search" id="keyword" name="q"
                        placeholder=(locale.text("search"));
                    button type="submit" { (locale.text("search_go")) }
                }
                div id="results" {}
                script { (PreEscaped(SEARCH_JS)) }
            }
        }
    }
}

// ============================================================================
// Incremental writes
// ============================================================================

fn write_artifact(book: &mut Book, dest: &Path, bytes: &[u8], events: &mut Vec<Event>) {
    match write_if_changed(book, dest, bytes) {
        Ok(true) => {
            events.push(Event::info(format!("Generated \"{}\".", book.subpath(dest))));
        }
        Ok(false) => {
            events.push(Event::debug(format!("Unchanged \"{}\".", book.subpath(dest))));
        }
        Err(err) => {
            events.push(Event::error(format!(
                "Failed to generate \"{}\": {err}",
                book.subpath(dest)
            )));
        }
    }
}

/// Write `bytes` to `dest` unless the file already holds them.
///
/// Equality is byte length plus SHA-256, so an untouched artifact keeps
/// its mtime across rebuilds. A differing file is backed up first.
fn write_if_changed(book: &mut Book, dest: &Path, bytes: &[u8]) -> Result<bool, BookError> {
    if let Ok(meta) = fs::metadata(dest) {
        if meta.is_file() && meta.len() == bytes.len() as u64 {
            let existing = fs::read(dest)?;
            if Sha256::digest(&existing) == Sha256::digest(bytes) {
                return Ok(false);
            }
        }
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    book.backup(dest)?;
    fs::write(dest, bytes)?;
    Ok(true)
}

// ============================================================================
// Tests
// ============================================================================
