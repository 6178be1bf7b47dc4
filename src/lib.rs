//! # clipbook
//!
//! Manager for hierarchical archives of captured web pages. A *book* is a
//! plain directory of captures (SingleFile pages, `.htz`/`.maff` archives,
//! notes, images) plus a `.clipbook/` support directory holding everything
//! derived from them: item descriptors, a favicon cache, backups, and a
//! generated static site for browsing the collection.
//!
//! # Architecture: Runs as Event Iterators
//!
//! The three operations are *runs* — pull-based iterators of [`event::Event`]:
//!
//! ```text
//! index     files        →  meta.json + toc.json   (captured files → items)
//! favicons  items        →  tree/favicon/          (icon refs → shared cache)
//! build     descriptors  →  tree/*.html            (tree → static site)
//! ```
//!
//! The caller drives a run by consuming events; each refill performs one
//! unit of work (one file, one item, one artifact). This shape exists for
//! three reasons:
//!
//! - **Cancellation**: dropping the iterator between events stops the run
//!   with all committed work intact — nothing to roll back.
//! - **Observability**: every skip and failure is an event; the CLI decides
//!   what to show and what exit code the failures add up to.
//! - **Testability**: a run collects into a `Vec<Event>` and asserts like
//!   any other value, without threads or callbacks.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`book`] | The book on disk: item descriptors, TOC, paths, backups, tree lock |
//! | [`indexer`] | Derives item descriptors from captured files (id, type, title, timestamps, icon) |
//! | [`favicon`] | Content-addressed favicon cache; resolves URL/archive/file icon references |
//! | [`generate`] | Renders the TOC into the static site (map, frame, search pages) |
//! | [`classify`] | File-kind detection and document loading, including zip-packed pages |
//! | [`archive`] | `.htz`/`.maff` archive access: locate and read the packed index page |
//! | [`provenance`] | Capture-tool banner extractors (SingleFile, SavePageWE, MAFF metadata, ...) |
//! | [`timestamp`] | 17-digit UTC timestamp ids: parse, generate, collision stepping |
//! | [`urlpath`] | Relative-URL math with percent-encoding, shared by favicon and generate |
//! | [`config`] | `.clipbook/config.toml` loading and validation |
//! | [`event`] | Severity-tagged run events |
//! | [`locale`] | UI strings for generated pages, with locale fallback |
//! | [`output`] | CLI rendering of event streams |
//!
//! # Design Decisions
//!
//! ## Timestamp Ids
//!
//! Item ids are 17-digit UTC timestamps (`YYYYMMDDhhmmssSSS`). A capture
//! saved as `20200101020304567.htz` keeps that id, and the id doubles as
//! the creation time, so most items need no separate `create` field at the
//! source. Collisions (two captures in the same millisecond, or a derived
//! id already taken) step forward one millisecond at a time until free.
//!
//! ## First-Wins Metadata Resolution
//!
//! Every descriptor field resolves through an ordered chain — explicit
//! `data-clipbook-*` attributes, then capture-tool banners, then document
//! content, then filesystem metadata — and the first non-empty source
//! wins. Provenance extractors merge the same way: a field set by an
//! earlier extractor is never overwritten by a later one.
//!
//! ## Content-Addressed Favicon Cache
//!
//! Cached icons are stored as `tree/favicon/<sha256><ext>`. A thousand
//! items pointing at the same 16×16 favicon share one file, rewrites are
//! idempotent, and the cache never needs invalidation — different bytes
//! get a different name.
//!
//! ## Hash-Gated Site Writes
//!
//! The site builder renders every artifact to memory and compares length
//! plus SHA-256 against what is on disk before writing. Rebuilding an
//! unchanged book touches nothing, so mtime-based mirroring (rsync, backup
//! tools) sees no spurious changes.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/), a compile-time
//! HTML macro system: malformed markup is a build error, interpolation is
//! auto-escaped, and there is no template directory to ship or get out of
//! sync. The few scripts and styles the site needs are embedded at compile
//! time from `static/`.
//!
//! ## Cycle-Tolerant Tree Walk
//!
//! The TOC is data, not a validated tree: a folder may list itself or an
//! ancestor as a child. The builder walks with an on-path set — a node
//! already on the current root path still renders but is not expanded —
//! so cyclic books build fine instead of overflowing the stack.

pub mod archive;
pub mod book;
pub mod classify;
pub mod config;
pub mod event;
pub mod favicon;
pub mod generate;
pub mod indexer;
pub mod locale;
pub mod output;
pub mod provenance;
pub mod timestamp;
pub mod urlpath;

#[cfg(test)]
pub(crate) mod test_helpers;
