use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn duplicate_suffix_regex() -> &'static Regex {
    static DUPLICATE_SUFFIX: OnceLock<Regex> = OnceLock::new();
    DUPLICATE_SUFFIX.get_or_init(|| {
        Regex::new(r"^(.+\.ttml)-\d+\.ttml$").expect("Failed to compile duplicate suffix regex")
    })
}

fn separator_regex() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[_\-\s]+").expect("Failed to compile separator regex"))
}

/// `transcript_123.ttml-123.ttml` → `transcript_123.ttml`. Other names pass through.
pub fn normalize_duplicate_suffix(name: &str) -> String {
    duplicate_suffix_regex().replace(name, "$1").into_owned()
}

/// The key the library database stores for a cached transcript: its path
/// relative to the cache root with `/` separators, or just the file name when
/// the file lives elsewhere.
pub fn transcript_identifier(path: &Path, cache_root: &Path) -> String {
    let raw = match path.strip_prefix(cache_root) {
        Ok(relative) if relative.components().next().is_some() => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        _ => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    };
    normalize_duplicate_suffix(&raw)
}

/// Human-ish title from a cache file name: `transcript_1000746774876.ttml`
/// becomes `transcript 1000746774876`.
pub fn title_from_file_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let normalized = normalize_duplicate_suffix(&name);
    let stem = Path::new(&normalized)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let title = separator_regex().replace_all(&stem, " ").trim().to_string();
    if title.is_empty() {
        name
    } else {
        title
    }
}
