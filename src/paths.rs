use std::ffi::OsString;
use std::path::{Path, PathBuf};

const CACHE_SUFFIX: &str = ".docai.json.gz";
const HOCR_SUFFIX: &str = ".hocr";
const TEXT_SUFFIX: &str = ".ocr.txt";
const SETTINGS_DIR: &str = ".ocr-text-layer";

/// Compressed recognition result stored next to the image.
pub fn cache_path(image: &Path) -> PathBuf {
    with_suffix(image, CACHE_SUFFIX)
}

pub fn hocr_path(image: &Path) -> PathBuf {
    with_suffix(image, HOCR_SUFFIX)
}

pub fn text_path(image: &Path) -> PathBuf {
    with_suffix(image, TEXT_SUFFIX)
}

pub(crate) fn settings_dir() -> Option<PathBuf> {
    home().map(|home| home.join(SETTINGS_DIR))
}

/// Resolves a leading `~` against `$HOME`; other paths are returned as-is.
pub(crate) fn expand_tilde(value: &str) -> PathBuf {
    let trimmed = value.trim();
    match (trimmed.strip_prefix('~'), home()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(trimmed),
    }
}

fn home() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(PathBuf::from(home))
        }
    })
}

// `scan.jpg` becomes `scan.jpg.hocr`, not `scan.hocr`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
