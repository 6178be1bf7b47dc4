//! The book repository: items, descriptors, and the on-disk layout.
//!
//! A *book* is a directory tree of captured content plus a support directory
//! (`.clipbook/`) holding configuration, descriptors, backups, and the
//! generated site:
//!
//! ```text
//! <root>/
//! ├── .clipbook/
//! │   ├── config.toml
//! │   ├── tree/
//! │   │   ├── meta.json        # id → item descriptor
//! │   │   ├── toc.json         # parent id → ordered child ids
//! │   │   ├── favicon/         # content-addressed icon cache
//! │   │   └── *.html, icon/    # generated site artifacts
//! │   └── backup/<timestamp>/  # one session per mutating run
//! ├── 20200101000000000/index.html
//! ├── 20200101000000001.htz
//! └── ...
//! ```
//!
//! # Ordered Stores
//!
//! [`MetaStore`] and [`Toc`] keep insertion order (discovery order is display
//! order) and serialize as ordered JSON objects. Both support the pattern the
//! indexer depends on: grab a snapshot of the keys, iterate it, and insert
//! new entries into the backing map mid-iteration without invalidating
//! anything.

use crate::config::{self, BookConfig, ConfigError};
use crate::timestamp;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the support directory under the book root.
pub const SUPPORT_DIR: &str = ".clipbook";

/// The distinguished TOC root id.
pub const ROOT_ID: &str = "root";

/// Ids with fixed structural meaning; never assignable to items.
pub const RESERVED_IDS: [&str; 3] = ["root", "hidden", "recycle"];

pub fn is_reserved_id(id: &str) -> bool {
    RESERVED_IDS.contains(&id)
}

#[derive(Error, Debug)]
pub enum BookError {
    #[error("book root {path:?} is not accessible: {source}")]
    Root { path: PathBuf, source: std::io::Error },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to parse descriptor {path:?}: {source}")]
    Descriptor { path: PathBuf, source: serde_json::Error },
    #[error("tree is locked by another process ({0:?} exists)")]
    Locked(PathBuf),
    #[error("book is configured with no_tree; tree operations are disabled")]
    NoTree,
}

// ============================================================================
// Item
// ============================================================================

/// Item kind. Open: unrecognized strings from descriptors are preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemType {
    /// "" — a generic captured page.
    Page,
    Folder,
    File,
    Image,
    Note,
    Postit,
    Bookmark,
    Separator,
    Other(String),
}

impl ItemType {
    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Page => "",
            ItemType::Folder => "folder",
            ItemType::File => "file",
            ItemType::Image => "image",
            ItemType::Note => "note",
            ItemType::Postit => "postit",
            ItemType::Bookmark => "bookmark",
            ItemType::Separator => "separator",
            ItemType::Other(s) => s,
        }
    }
}

impl From<&str> for ItemType {
    fn from(s: &str) -> Self {
        match s {
            "" => ItemType::Page,
            "folder" => ItemType::Folder,
            "file" => ItemType::File,
            "image" => ItemType::Image,
            "note" => ItemType::Note,
            "postit" => ItemType::Postit,
            "bookmark" => ItemType::Bookmark,
            "separator" => ItemType::Separator,
            other => ItemType::Other(other.to_string()),
        }
    }
}

impl Serialize for ItemType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ItemType::from(s.as_str()))
    }
}

/// One archive entry. Every field except `marked` is optional: absent in the
/// descriptor means "unset", which the indexer's fallback inference fills.
/// Keys this crate does not know about round-trip through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    /// Path of the primary content file, relative to the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Origin URL the content was captured from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Icon URL or path relative to the content directory; "" means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Creation timestamp id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    /// Modification timestamp id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub marked: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Item {
    /// Effective type; unset reads as the generic page type.
    pub fn kind(&self) -> ItemType {
        self.item_type.clone().unwrap_or(ItemType::Page)
    }

    pub fn type_str(&self) -> &str {
        self.item_type.as_ref().map(ItemType::as_str).unwrap_or("")
    }
}

// ============================================================================
// MetaStore
// ============================================================================

/// Insertion-ordered id → [`Item`] map.
///
/// `ids()` returns a snapshot, so callers can iterate it while registering
/// new items (the indexer does exactly this when resolving id collisions
/// against earlier files in the same batch).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaStore {
    keys: Vec<String>,
    items: HashMap<String, Item>,
}

impl MetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    /// Insert or replace. A new id goes to the end of the order; replacing
    /// an existing id keeps its position.
    pub fn insert(&mut self, id: impl Into<String>, item: Item) {
        let id = id.into();
        if !self.items.contains_key(&id) {
            self.keys.push(id.clone());
        }
        self.items.insert(id, item);
    }

    /// Snapshot of ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.keys.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Item)> {
        self.keys.iter().filter_map(|id| self.items.get(id).map(|item| (id, item)))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Serialize for MetaStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.keys.len()))?;
        for (id, item) in self.iter() {
            map.serialize_entry(id, item)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MetaStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MetaVisitor;

        impl<'de> Visitor<'de> for MetaVisitor {
            type Value = MetaStore;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of item id to item descriptor")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<MetaStore, A::Error> {
                let mut store = MetaStore::new();
                while let Some((id, item)) = access.next_entry::<String, Item>()? {
                    store.insert(id, item);
                }
                Ok(store)
            }
        }

        deserializer.deserialize_map(MetaVisitor)
    }
}

// ============================================================================
// Toc
// ============================================================================

/// Insertion-ordered parent id → ordered child-id list.
///
/// May contain cycles; consumers that recurse must carry an on-path set
/// (see the tree walk in `generate`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Toc {
    keys: Vec<String>,
    lists: HashMap<String, Vec<String>>,
}

impl Toc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Children of `id`; an id with no entry has no children.
    pub fn children(&self, id: &str) -> &[String] {
        self.lists.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lists.contains_key(id)
    }

    /// Append `child` to `parent`'s list, creating the list if needed.
    pub fn push_child(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        let parent = parent.into();
        if !self.lists.contains_key(&parent) {
            self.keys.push(parent.clone());
        }
        self.lists.entry(parent).or_default().push(child.into());
    }

    pub fn set_children(&mut self, parent: impl Into<String>, children: Vec<String>) {
        let parent = parent.into();
        if !self.lists.contains_key(&parent) {
            self.keys.push(parent.clone());
        }
        self.lists.insert(parent, children);
    }

    /// True if any parent anywhere lists `id` as a child.
    pub fn is_listed(&self, id: &str) -> bool {
        self.keys
            .iter()
            .filter_map(|k| self.lists.get(k))
            .any(|children| children.iter().any(|c| c == id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &[String])> {
        self.keys
            .iter()
            .filter_map(|id| self.lists.get(id).map(|list| (id, list.as_slice())))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Serialize for Toc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.keys.len()))?;
        for (id, children) in self.iter() {
            map.serialize_entry(id, children)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Toc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TocVisitor;

        impl<'de> Visitor<'de> for TocVisitor {
            type Value = Toc;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parent id to child id list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Toc, A::Error> {
                let mut toc = Toc::new();
                while let Some((id, children)) = access.next_entry::<String, Vec<String>>()? {
                    toc.set_children(id, children);
                }
                Ok(toc)
            }
        }

        deserializer.deserialize_map(TocVisitor)
    }
}

// ============================================================================
// Book
// ============================================================================

/// A book rooted at a directory: configuration, descriptors, and the paths
/// every subsystem works against. Descriptors start empty; call
/// [`Book::load_meta`]/[`Book::load_toc`] before operating on them.
#[derive(Debug)]
pub struct Book {
    root: PathBuf,
    pub config: BookConfig,
    pub meta: MetaStore,
    pub toc: Toc,
    backup_dir: Option<PathBuf>,
}

impl Book {
    /// Open the book at `root`, reading `.clipbook/config.toml` if present.
    pub fn open(root: &Path) -> Result<Book, BookError> {
        let root = fs::canonicalize(root)
            .map_err(|source| BookError::Root { path: root.to_path_buf(), source })?;
        let config = config::load_config(&root)?;
        Ok(Book {
            root,
            config,
            meta: MetaStore::new(),
            toc: Toc::new(),
            backup_dir: None,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn support_dir(&self) -> PathBuf {
        self.root.join(SUPPORT_DIR)
    }

    /// Where captured content lives. `data_dir = ""` means the root itself.
    pub fn data_dir(&self) -> PathBuf {
        if self.config.data_dir.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&self.config.data_dir)
        }
    }

    pub fn tree_dir(&self) -> PathBuf {
        self.root.join(&self.config.tree_dir)
    }

    pub fn favicon_dir(&self) -> PathBuf {
        self.tree_dir().join("favicon")
    }

    pub fn meta_path(&self) -> PathBuf {
        self.tree_dir().join("meta.json")
    }

    pub fn toc_path(&self) -> PathBuf {
        self.tree_dir().join("toc.json")
    }

    /// Absolute path of an item's index file, if it has one.
    pub fn index_file(&self, item: &Item) -> Option<PathBuf> {
        match item.index.as_deref() {
            Some(index) if !index.is_empty() => Some(self.data_dir().join(index)),
            _ => None,
        }
    }

    /// Path relative to the book root with forward slashes, for messages.
    pub fn subpath(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.display().to_string(),
        }
    }

    pub fn load_meta(&mut self) -> Result<(), BookError> {
        self.meta = load_descriptor(&self.meta_path())?.unwrap_or_default();
        Ok(())
    }

    pub fn load_toc(&mut self) -> Result<(), BookError> {
        self.toc = load_descriptor(&self.toc_path())?.unwrap_or_default();
        Ok(())
    }

    pub fn save_meta(&mut self) -> Result<(), BookError> {
        let path = self.meta_path();
        let json = serde_json::to_string_pretty(&self.meta)
            .map_err(|source| BookError::Descriptor { path: path.clone(), source })?;
        self.write_descriptor(&path, json)
    }

    pub fn save_toc(&mut self) -> Result<(), BookError> {
        let path = self.toc_path();
        let json = serde_json::to_string_pretty(&self.toc)
            .map_err(|source| BookError::Descriptor { path: path.clone(), source })?;
        self.write_descriptor(&path, json)
    }

    fn write_descriptor(&mut self, path: &Path, json: String) -> Result<(), BookError> {
        fs::create_dir_all(self.tree_dir())?;
        self.backup(path)?;
        fs::write(path, json + "\n")?;
        Ok(())
    }

    /// Copy an existing file into this run's backup session before it gets
    /// overwritten. Missing files and paths outside the root are no-ops.
    /// The session directory (`.clipbook/backup/<timestamp>/`) is created on
    /// first use, so read-only runs leave no empty session behind.
    pub fn backup(&mut self, path: &Path) -> Result<(), BookError> {
        if !path.is_file() {
            return Ok(());
        }
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return Ok(());
        };
        let rel = rel.to_path_buf();
        let session = match &self.backup_dir {
            Some(dir) => dir.clone(),
            None => {
                let dir = self
                    .support_dir()
                    .join("backup")
                    .join(timestamp::now_id());
                self.backup_dir = Some(dir.clone());
                dir
            }
        };
        let dest = session.join(&rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(path, &dest)?;
        Ok(())
    }
}

fn load_descriptor<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, BookError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value = serde_json::from_str(&content)
        .map_err(|source| BookError::Descriptor { path: path.to_path_buf(), source })?;
    Ok(Some(value))
}

// ============================================================================
// TreeLock
// ============================================================================

/// Advisory cross-process lock on a book's tree.
///
/// The orchestration (CLI) acquires this before any run that touches
/// descriptors or generated artifacts; the core subsystems assume it is
/// already held. Create-new semantics on `.clipbook/tree.lock`; the file
/// holds the pid for post-mortem diagnosis and is removed on drop.
#[derive(Debug)]
pub struct TreeLock {
    path: PathBuf,
}

impl TreeLock {
    pub fn acquire(book: &Book) -> Result<TreeLock, BookError> {
        let path = book.support_dir().join("tree.lock");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(TreeLock { path })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(BookError::Locked(path))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for TreeLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
