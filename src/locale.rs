//! UI strings for generated pages, with locale fallback.
//!
//! The builder bakes human-readable labels (page titles, toolbar tooltips,
//! search UI text) into the generated site. Lookup resolves through a
//! fallback chain built from the configured locale tag: `zh_CN` tries
//! `zh_cn`, then `zh`, then `en`; an unknown tag goes straight to `en`; a
//! key missing everywhere renders as itself, so a forgotten entry shows up
//! in the output instead of panicking.
//!
//! Tags are case-insensitive and accept either `_` or `-` separators
//! (`zh-CN`, `zh_cn`, `zh-cn` are all the same locale).

type Table = [(&'static str, &'static str)];

const EN: &Table = &[
    ("toggle_all", "Toggle all"),
    ("search", "Search"),
    ("search_go", "go"),
    ("search_no_results", "No results found."),
    ("search_view_in_map", "View in map"),
];

const ZH: &Table = &[
    ("toggle_all", "展開或收合全部項目"),
    ("search", "搜尋"),
    ("search_go", "搜尋"),
    ("search_no_results", "找不到符合的項目。"),
    ("search_view_in_map", "在地圖中檢視"),
];

/// Languages written right to left.
const RTL_LANGS: [&str; 4] = ["ar", "fa", "he", "ur"];

fn table_for(lang: &str) -> Option<&'static Table> {
    match lang {
        "en" => Some(EN),
        "zh" | "zh_tw" | "zh_cn" => Some(ZH),
        _ => None,
    }
}

/// A resolved locale: an ordered list of string tables to consult.
#[derive(Debug, Clone)]
pub struct Locale {
    tag: String,
    tables: Vec<&'static Table>,
    rtl: bool,
}

impl Locale {
    pub fn new(tag: &str) -> Locale {
        let normalized = match tag.to_ascii_lowercase().replace('-', "_") {
            tag if tag.is_empty() => "en".to_string(),
            tag => tag,
        };
        let lang = normalized.split('_').next().unwrap_or("").to_string();

        let mut tables: Vec<&'static Table> = Vec::new();
        for candidate in [normalized.as_str(), lang.as_str(), "en"] {
            if let Some(table) = table_for(candidate) {
                if !tables.iter().any(|t| std::ptr::eq(*t, table)) {
                    tables.push(table);
                }
            }
        }
        Locale { tag: normalized, tables, rtl: RTL_LANGS.contains(&lang.as_str()) }
    }

    /// The normalized locale tag this instance resolved from.
    pub fn lang(&self) -> &str {
        &self.tag
    }

    /// Message for `key`, falling back through the chain and finally to the
    /// key itself.
    pub fn text<'a>(&self, key: &'a str) -> &'a str {
        for table in &self.tables {
            if let Some((_, message)) = table.iter().find(|(k, _)| *k == key) {
                return message;
            }
        }
        key
    }

    /// Writing direction for the `dir` attribute of generated pages.
    pub fn bidi_dir(&self) -> &'static str {
        if self.rtl { "rtl" } else { "ltr" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Fallback chain
    // ========================================================================

    #[test]
    fn tag_separators_and_case_are_equivalent() {
        for tag in ["zh_CN", "zh-CN", "zh_cn", "zh-cn"] {
            assert_eq!(Locale::new(tag).text("search"), "搜尋", "tag {tag}");
        }
    }

    #[test]
    fn region_tag_falls_back_to_language() {
        // No zh_HK table; zh catches it.
        assert_eq!(Locale::new("zh_HK").text("search"), "搜尋");
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        assert_eq!(Locale::new("eo").text("search"), "Search");
        assert_eq!(Locale::new("").text("toggle_all"), "Toggle all");
    }

    #[test]
    fn missing_key_renders_as_itself() {
        assert_eq!(Locale::new("en").text("no_such_key"), "no_such_key");
        assert_eq!(Locale::new("zh_TW").text("no_such_key"), "no_such_key");
    }

    #[test]
    fn english_is_complete_for_every_zh_key() {
        let en = Locale::new("en");
        for (key, _) in ZH {
            assert_ne!(en.text(key), *key, "en table is missing {key}");
        }
    }

    #[test]
    fn lang_reports_the_normalized_tag() {
        assert_eq!(Locale::new("ar").lang(), "ar");
        assert_eq!(Locale::new("zh-CN").lang(), "zh_cn");
        assert_eq!(Locale::new("").lang(), "en");
    }

    // ========================================================================
    // Writing direction
    // ========================================================================

    #[test]
    fn bidi_dir_by_language() {
        assert_eq!(Locale::new("en").bidi_dir(), "ltr");
        assert_eq!(Locale::new("zh_TW").bidi_dir(), "ltr");
        assert_eq!(Locale::new("ar").bidi_dir(), "rtl");
        assert_eq!(Locale::new("he-IL").bidi_dir(), "rtl");
    }
}
