//! Path helpers for persisted stores.
//!
//! All state lives under the XDG data directory:
//! `$XDG_DATA_HOME/formsense/` with a `$HOME/.local/share/formsense/`
//! fallback. One JSON file per store.

use std::path::PathBuf;

/// Base data directory for all persisted stores.
pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("formsense")
}

/// Default config file location.
pub fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        })
        .join("formsense/config.toml")
}

/// Hierarchical field cache store.
pub fn cache_store_path(dir: &std::path::Path) -> PathBuf {
    dir.join("field_cache.json")
}

/// Exact-match question cache store.
pub fn exact_cache_path(dir: &std::path::Path) -> PathBuf {
    dir.join("exact_cache.json")
}

/// Question bank store (with embeddings).
pub fn question_bank_path(dir: &std::path::Path) -> PathBuf {
    dir.join("question_bank.json")
}

/// Review queue store.
pub fn review_queue_path(dir: &std::path::Path) -> PathBuf {
    dir.join("review_queue.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_ends_with_formsense() {
        assert!(data_dir().ends_with("formsense"));
    }

    #[test]
    fn test_store_paths_distinct() {
        let dir = PathBuf::from("/tmp/x");
        let paths = [
            cache_store_path(&dir),
            exact_cache_path(&dir),
            question_bank_path(&dir),
            review_queue_path(&dir),
        ];
        for (i, a) in paths.iter().enumerate() {
            for b in paths.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
