//! # Content Resolution
//!
//! A field's value is classified once into [`Content`], and both the canvas
//! and the PDF render pass act on that classification:
//!
//! - blank → [`Content::Missing`]
//! - starts with `http` (any case) → [`Content::RemoteImage`]
//! - names an existing file, found via [`ImageLocator`] → [`Content::LocalImage`]
//! - anything else → [`Content::Text`]
//!
//! Whether an image can actually be loaded is decided later; a failed load
//! falls back to drawing the value as text.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// What a field value refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Missing,
    Text(String),
    RemoteImage(String),
    LocalImage(PathBuf),
}

impl Content {
    pub fn is_image(&self) -> bool {
        matches!(self, Content::RemoteImage(_) | Content::LocalImage(_))
    }
}

/// Classify a value.
pub fn resolve(value: &str, locator: &ImageLocator) -> Content {
    if value.is_empty() {
        return Content::Missing;
    }
    if value
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("http"))
    {
        return Content::RemoteImage(value.to_string());
    }
    match locator.find(value) {
        Some(path) => Content::LocalImage(path),
        None => Content::Text(value.to_string()),
    }
}

/// Finds local files named by field values, relative to the data source's
/// directory.
///
/// Lookup order: an absolute path as given, then `base_dir/name`, then a
/// recursive case-insensitive search of `base_dir` by file name. Results,
/// including misses, are cached per lowercased name.
#[derive(Debug, Default)]
pub struct ImageLocator {
    base_dir: Option<PathBuf>,
    cache: Mutex<HashMap<String, Option<PathBuf>>>,
}

impl ImageLocator {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self {
            base_dir,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let base = self.base_dir.as_deref()?;
        let key = name.to_lowercase();
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }
        let found = lookup(base, name, &key);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, found.clone());
        }
        found
    }
}

fn lookup(base: &Path, name: &str, key: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }
    let candidate = base.join(path);
    if candidate.is_file() {
        return Some(candidate);
    }
    search(base, key)
}

/// Depth-first search for a file whose lowercased name equals `key`.
fn search(dir: &Path, key: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            subdirs.push(path);
        } else if entry.file_name().to_string_lossy().to_lowercase() == key {
            return Some(path);
        }
    }
    subdirs.sort();
    subdirs.iter().find_map(|sub| search(sub, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_and_urls() {
        let locator = ImageLocator::new(None);
        assert_eq!(resolve("", &locator), Content::Missing);
        assert_eq!(
            resolve("HTTPS://x.test/a.png", &locator),
            Content::RemoteImage("HTTPS://x.test/a.png".into())
        );
        assert_eq!(resolve("hello", &locator), Content::Text("hello".into()));
        // "http" must be a prefix
        assert_eq!(resolve("see http://x", &locator), Content::Text("see http://x".into()));
    }

    #[test]
    fn test_no_base_dir_never_finds_files() {
        let locator = ImageLocator::new(None);
        assert!(locator.find("photo.png").is_none());
    }

    #[test]
    fn test_direct_and_recursive_case_insensitive_lookup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("logo.png"), b"x").unwrap();
        fs::create_dir_all(dir.path().join("photos/2024")).unwrap();
        fs::write(dir.path().join("photos/2024/Jan.JPG"), b"x").unwrap();

        let locator = ImageLocator::new(Some(dir.path().to_path_buf()));
        assert_eq!(
            resolve("logo.png", &locator),
            Content::LocalImage(dir.path().join("logo.png"))
        );
        assert_eq!(
            locator.find("jan.jpg"),
            Some(dir.path().join("photos/2024/Jan.JPG"))
        );
        assert!(locator.find("missing.png").is_none());
    }

    #[test]
    fn test_lookup_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ImageLocator::new(Some(dir.path().to_path_buf()));
        assert!(locator.find("late.png").is_none());
        fs::write(dir.path().join("late.png"), b"x").unwrap();
        // the earlier miss is remembered
        assert!(locator.find("LATE.png").is_none());
    }
}
