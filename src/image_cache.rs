use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CACHE_DIR: &str = "game_poll_board";
const CACHE_FILE: &str = "image_cache.json";
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheFile {
    version: u32,
    // List of pairs keeps the on-disk shape independent of map ordering.
    entries: Vec<(String, String)>,
}

/// Answer name to resolved image URL, persisted between runs.
///
/// The poller owns the only instance and hands it to the resolver by
/// reference. Nothing is evicted automatically; `clear` and `forget` are the
/// manual invalidation path.
#[derive(Debug, Clone, Default)]
pub struct ImageCache {
    path: Option<PathBuf>,
    entries: HashMap<String, String>,
    dirty: bool,
}

impl ImageCache {
    /// An empty cache that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the cache at `path`. A missing, unreadable or foreign-version
    /// file yields an empty cache bound to the same path. Pairs with a blank
    /// URL are dropped.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_cache_file(&path)
            .filter(|cache| cache.version == CACHE_VERSION)
            .map(|cache| {
                cache
                    .entries
                    .into_iter()
                    .filter(|(_, url)| !url.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            path: Some(path),
            entries,
            dirty: false,
        }
    }

    /// Loads from the default location, or stays in memory when no home or
    /// cache directory can be resolved.
    pub fn load_default() -> Self {
        match default_cache_path() {
            Some(path) => Self::load(path),
            None => Self::in_memory(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Blank URLs are ignored so a hit always carries a usable image.
    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) {
        let name = name.into();
        let url = url.into();
        if url.trim().is_empty() || self.entries.get(&name) == Some(&url) {
            return;
        }
        self.entries.insert(name, url);
        self.dirty = true;
    }

    pub fn forget(&mut self, name: &str) -> bool {
        let removed = self.entries.remove(name).is_some();
        self.dirty |= removed;
        removed
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the cache if anything changed since the last load or save.
    /// On failure the in-memory entries stay usable and remain dirty.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(path) = self.path.as_ref() else {
            self.dirty = false;
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create cache dir {}", dir.display()))?;
        }

        let mut entries = self
            .entries
            .iter()
            .map(|(name, url)| (name.clone(), url.clone()))
            .collect::<Vec<_>>();
        entries.sort();
        let file = CacheFile {
            version: CACHE_VERSION,
            entries,
        };
        let json = serde_json::to_string(&file).context("serialize image cache")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).context("write image cache")?;
        fs::rename(&tmp, path).context("swap image cache")?;
        self.dirty = false;
        Ok(())
    }
}

fn load_cache_file(path: &Path) -> Option<CacheFile> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str::<CacheFile>(&raw).ok()
}

pub fn default_cache_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR).join(CACHE_FILE));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".cache")
            .join(CACHE_DIR)
            .join(CACHE_FILE),
    )
}
