//! Location of the SQLite funnel store.
//!
//! The store keeps funnel stages, daily stage transitions and cached stage
//! analyses. It defaults to a platform-specific cache directory:
//! - Linux: `~/.cache/touchline/`
//! - macOS: `~/Library/Caches/touchline/`
//! - Windows: `%LOCALAPPDATA%\touchline\`

use std::path::{Path, PathBuf};
use touchline_data::{DataError, SqliteCache};

/// Get the default cache directory path.
pub(crate) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("touchline")
}

/// Get the default store path.
pub(crate) fn default_cache_path() -> PathBuf {
    default_cache_dir().join("touchline.db")
}

/// Open the store at `path` (or the default location), creating the directory if needed.
pub(crate) fn open_cache(path: Option<&Path>) -> Result<(SqliteCache, PathBuf), DataError> {
    let cache_path = path.map_or_else(default_cache_path, Path::to_path_buf);

    if let Some(parent) = cache_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let cache = SqliteCache::new(&cache_path)?;
    Ok((cache, cache_path))
}

/// Print where the store lives and what it holds.
pub(crate) fn print_cache_info(cache: &SqliteCache, path: &Path) {
    println!("  Store: {}", path.display());
    match cache.get_stats() {
        Ok(stats) => println!(
            "  Contents: {} stages, {} transition rows, {} cached analyses ({} live)",
            stats.funnel_stages, stats.transition_rows, stats.cached_analyses, stats.live_analyses
        ),
        Err(e) => println!("  Contents: unavailable ({e})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path_ends_with_db_name() {
        let path = default_cache_path();
        assert!(path.ends_with("touchline/touchline.db"));
    }

    #[test]
    fn test_open_cache_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        let (cache, opened) = open_cache(Some(&path)).unwrap();
        assert_eq!(opened, path);
        assert!(path.exists());
        assert_eq!(cache.get_stats().unwrap().funnel_stages, 0);
    }
}
