//! Configuration and path resolution for the CLI.
//!
//! - Data directory: `--data-dir`, else the platform data directory
//! - Engine configuration: `--config` JSON file, else built-in defaults

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use swipe_core::config::EngineConfig;

/// Database file name inside the data directory
const DATABASE_FILENAME: &str = "swipe.redb";

/// Environment variable overriding the configuration file
const CONFIG_ENV: &str = "SWIPE_CONFIG";

/// Returns the data directory.
///
/// - macOS: `~/Library/Application Support/dev.swipe.Swipe/`
/// - Linux: `~/.local/share/swipe/`
/// - Windows: `%APPDATA%\swipe\Swipe\data\`
pub fn get_data_dir(custom_dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = custom_dir {
        return Ok(dir.clone());
    }

    ProjectDirs::from("dev", "swipe", "Swipe")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("Could not determine data directory"))
}

/// Returns the path to the database file, creating its directory.
pub fn database_path(custom_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let data_dir = get_data_dir(custom_dir)?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join(DATABASE_FILENAME))
}

/// Loads the engine configuration.
///
/// Search order:
/// 1. `--config` argument
/// 2. `$SWIPE_CONFIG` environment variable
/// 3. Built-in defaults
pub fn load_engine_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let path = path
        .cloned()
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
    match path {
        Some(path) => read_engine_config(&path),
        None => Ok(EngineConfig::default()),
    }
}

fn read_engine_config(path: &Path) -> Result<EngineConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    EngineConfig::from_json(&json)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_data_dir() {
        let custom = PathBuf::from("/tmp/custom-data");
        let dir = get_data_dir(Some(&custom)).unwrap();
        assert_eq!(dir, custom);
    }

    #[test]
    fn test_database_path_creates_directory() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("nested");
        let path = database_path(Some(&nested)).unwrap();
        assert!(nested.is_dir());
        assert_eq!(path, nested.join(DATABASE_FILENAME));
    }

    #[test]
    fn test_partial_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("engine.json");
        std::fs::write(&path, r#"{ "selector": { "buffer_size": 9 } }"#).unwrap();

        let config = load_engine_config(Some(&path)).unwrap();
        assert_eq!(config.selector.buffer_size, 9);
        assert_eq!(config.clustering, EngineConfig::default().clustering);
    }

    #[test]
    fn test_invalid_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("engine.json");
        std::fs::write(&path, r#"{ "embedding": { "dimension": 0 } }"#).unwrap();
        assert!(load_engine_config(Some(&path)).is_err());

        let missing = temp.path().join("missing.json");
        assert!(load_engine_config(Some(&missing)).is_err());
    }
}
