//! Book configuration module.
//!
//! Handles loading and validating `.clipbook/config.toml`. Every key is
//! optional; a missing config file means stock defaults. Unknown keys are
//! rejected to catch typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! name = "clipbook"            # Book display name (page titles)
//! data_dir = ""                # Content location relative to root ("" = the root)
//! tree_dir = ".clipbook/tree"  # Descriptors + generated site + favicon cache
//! index = ".clipbook/tree/map.html"  # Page the search UI links back to
//! no_tree = false              # Disable descriptors and the site builder
//! locale = "en"                # UI language of generated pages
//!
//! [favicon]
//! cache_url = true             # Fetch absolute-URL icons over the network
//! cache_archive = false        # Extract icons stored inside htz/maff archives
//! cache_file = false           # Cache icons referenced as plain relative files
//!
//! [build]
//! static_index = false         # Also emit a script-free index.html
//! ```
//!
//! `data_dir` and `tree_dir` must stay inside the book root: relative paths
//! only, no `..` components.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Book configuration loaded from `.clipbook/config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookConfig {
    /// Display name used in generated page titles.
    pub name: String,
    /// Content location relative to the book root; "" means the root itself.
    pub data_dir: String,
    /// Directory holding descriptors, the generated site, and the favicon
    /// cache, relative to the book root.
    pub tree_dir: String,
    /// URL (relative to the root) that the search page links back to.
    pub index: String,
    /// When true the book carries no tree: descriptors are not loaded and
    /// the site builder refuses to run.
    pub no_tree: bool,
    /// UI language of generated pages (with fallback, e.g. `zh_CN` → `zh` → `en`).
    pub locale: String,
    /// Favicon caching toggles.
    pub favicon: FaviconConfig,
    /// Site builder settings.
    pub build: BuildConfig,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: String::new(),
            tree_dir: default_tree_dir(),
            index: default_index(),
            no_tree: false,
            locale: default_locale(),
            favicon: FaviconConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

fn default_name() -> String {
    "clipbook".to_string()
}

fn default_tree_dir() -> String {
    ".clipbook/tree".to_string()
}

fn default_index() -> String {
    ".clipbook/tree/map.html".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

/// Which icon reference kinds the favicon cacher may resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaviconConfig {
    /// Fetch absolute-URL icons over the network.
    pub cache_url: bool,
    /// Extract icons referenced inside htz/maff archives.
    pub cache_archive: bool,
    /// Read icons referenced as plain files relative to the content file.
    pub cache_file: bool,
}

impl Default for FaviconConfig {
    fn default() -> Self {
        Self { cache_url: true, cache_archive: false, cache_file: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Also emit `index.html`, a script-free static listing.
    pub static_index: bool,
}

impl BookConfig {
    /// Validate path-shaped fields.
    ///
    /// Both directories must remain inside the book root, and the tree
    /// directory cannot be empty (descriptors have to live somewhere).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tree_dir.is_empty() {
            return Err(ConfigError::Validation(
                "tree_dir cannot be empty".to_string(),
            ));
        }
        check_inside_root("tree_dir", &self.tree_dir)?;
        if !self.data_dir.is_empty() {
            check_inside_root("data_dir", &self.data_dir)?;
        }
        Ok(())
    }
}

fn check_inside_root(key: &str, value: &str) -> Result<(), ConfigError> {
    let path = Path::new(value);
    if path.is_absolute() {
        return Err(ConfigError::Validation(format!(
            "{key} must be relative to the book root, got absolute path {value:?}"
        )));
    }
    if path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return Err(ConfigError::Validation(format!(
            "{key} must stay inside the book root, got {value:?}"
        )));
    }
    Ok(())
}

/// Load config from `.clipbook/config.toml` under the given book root.
///
/// A missing file yields stock defaults; a present file is parsed with
/// unknown keys rejected, then validated.
pub fn load_config(root: &Path) -> Result<BookConfig, ConfigError> {
    let config_path = root.join(".clipbook").join("config.toml");
    if !config_path.exists() {
        return Ok(BookConfig::default());
    }
    let content = fs::read_to_string(&config_path)?;
    let config: BookConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# clipbook configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.
#
# This file lives at <book root>/.clipbook/config.toml.

# Book display name, used in generated page titles.
name = "clipbook"

# Content location relative to the book root. "" means captured files live
# directly under the root. Must stay inside the root (no "..").
data_dir = ""

# Where descriptors (meta.json, toc.json), the generated site, and the
# favicon cache live, relative to the book root.
tree_dir = ".clipbook/tree"

# Page the search UI links back to for "view in map".
index = ".clipbook/tree/map.html"

# A book without a tree: descriptors are not loaded and `clipbook build`
# refuses to run.
no_tree = false

# UI language of generated pages. Falls back by stripping the region
# (zh_CN -> zh) and finally to "en".
locale = "en"

# ---------------------------------------------------------------------------
# Favicon caching
# ---------------------------------------------------------------------------
[favicon]
# Fetch absolute-URL icons over the network.
cache_url = true

# Extract icons referenced inside htz/maff archives.
cache_archive = false

# Cache icons referenced as plain files relative to the content file.
cache_file = false

# ---------------------------------------------------------------------------
# Site builder
# ---------------------------------------------------------------------------
[build]
# Also emit index.html, a script-free static listing of the whole tree.
static_index = false
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ========================================================================
    // Defaults and parsing
    // ========================================================================

    #[test]
    fn defaults_are_sensible() {
        let config = BookConfig::default();
        assert_eq!(config.name, "clipbook");
        assert_eq!(config.data_dir, "");
        assert_eq!(config.tree_dir, ".clipbook/tree");
        assert!(!config.no_tree);
        assert!(config.favicon.cache_url);
        assert!(!config.favicon.cache_archive);
        assert!(!config.build.static_index);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: BookConfig = toml::from_str("name = \"mine\"").unwrap();
        assert_eq!(config.name, "mine");
        assert_eq!(config.tree_dir, ".clipbook/tree");
        assert!(config.favicon.cache_url);
    }

    #[test]
    fn partial_nested_table_keeps_siblings() {
        let config: BookConfig =
            toml::from_str("[favicon]\ncache_archive = true").unwrap();
        assert!(config.favicon.cache_url);
        assert!(config.favicon.cache_archive);
        assert!(!config.favicon.cache_file);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<BookConfig, _> = toml::from_str("tre_dir = \"x\"");
        assert!(result.is_err());
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn rejects_absolute_tree_dir() {
        let config: BookConfig =
            toml::from_str("tree_dir = \"/var/tree\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_parent_escapes() {
        let config: BookConfig =
            toml::from_str("data_dir = \"../elsewhere\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_tree_dir() {
        let config: BookConfig = toml::from_str("tree_dir = \"\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_defaults() {
        assert!(BookConfig::default().validate().is_ok());
    }

    // ========================================================================
    // load_config
    // ========================================================================

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.tree_dir, ".clipbook/tree");
    }

    #[test]
    fn reads_config_from_support_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".clipbook")).unwrap();
        std::fs::write(
            dir.path().join(".clipbook/config.toml"),
            "name = \"research\"\n[build]\nstatic_index = true\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.name, "research");
        assert!(config.build.static_index);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".clipbook")).unwrap();
        std::fs::write(
            dir.path().join(".clipbook/config.toml"),
            "tree_dir = \"../out\"\n",
        )
        .unwrap();
        assert!(load_config(dir.path()).is_err());
    }

    // ========================================================================
    // stock_config_toml
    // ========================================================================

    #[test]
    fn stock_config_is_valid_toml() {
        let parsed: Result<toml::Value, _> = toml::from_str(stock_config_toml());
        assert!(parsed.is_ok());
    }

    #[test]
    fn stock_config_roundtrips_to_defaults() {
        let config: BookConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = BookConfig::default();
        assert_eq!(config.name, defaults.name);
        assert_eq!(config.tree_dir, defaults.tree_dir);
        assert_eq!(config.index, defaults.index);
        assert_eq!(config.favicon.cache_url, defaults.favicon.cache_url);
        assert_eq!(config.build.static_index, defaults.build.static_index);
    }

    #[test]
    fn stock_config_mentions_every_section() {
        let content = stock_config_toml();
        assert!(content.contains("[favicon]"));
        assert!(content.contains("[build]"));
        assert!(content.contains("tree_dir"));
        assert!(content.contains("no_tree"));
    }
}
