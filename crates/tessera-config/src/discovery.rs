//! Config file discovery.
//!
//! Resolution order (first match wins):
//! 1. An explicit path (the `--config` flag)
//! 2. `TESSERA_CONFIG` env var (a file path)
//! 3. `<config dir>/config.toml`, where the config dir is `TESSERA_CONFIG_DIR`
//!    or the platform default (`~/.config/tessera` on Linux)
//!
//! An explicit path that does not exist is an error. A missing default file
//! is not: the built-in defaults apply.

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, TesseraConfig};

/// Default config filename within the config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "tessera";

/// Environment variable naming a config file.
const CONFIG_FILE_ENV: &str = "TESSERA_CONFIG";

/// Environment variable overriding the config directory.
const CONFIG_DIR_ENV: &str = "TESSERA_CONFIG_DIR";

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Loaded from this file.
    File(PathBuf),
    /// No file found; built-in defaults.
    Defaults,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TesseraConfig,
    pub source: ConfigSource,
}

impl LoadedConfig {
    /// Path of the loaded file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            ConfigSource::File(p) => Some(p.as_path()),
            ConfigSource::Defaults => None,
        }
    }
}

/// Discover and load configuration.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        return load_required(path);
    }

    if let Ok(path) = std::env::var(CONFIG_FILE_ENV)
        && !path.is_empty()
    {
        return load_required(Path::new(&path));
    }

    match xdg_config_path() {
        Some(path) if path.is_file() => load_required(&path),
        _ => Ok(LoadedConfig {
            config: TesseraConfig::default(),
            source: ConfigSource::Defaults,
        }),
    }
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<TesseraConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    TesseraConfig::from_toml(&contents)
}

fn load_required(path: &Path) -> Result<LoadedConfig> {
    let config = load_config_file(path)?;
    Ok(LoadedConfig {
        config,
        source: ConfigSource::File(path.to_path_buf()),
    })
}

/// Get the default config file path for tessera.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the config directory for tessera.
///
/// Checks `TESSERA_CONFIG_DIR` first, then falls back to the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[session]
ttl_secs = 900
max_users_per_address = 3
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.session.ttl_secs, 900);
        assert_eq!(config.session.max_users_per_address, 3);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_explicit_path_is_required() {
        let err = load_config(Some(Path::new("/nonexistent/tessera.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_explicit_path_reports_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tessera.toml");
        fs::write(&path, "[server]\nbind = \"0.0.0.0:9000\"\n").unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.path(), Some(path.as_path()));
        assert_eq!(loaded.config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_xdg_config_path_shape() {
        if let Some(p) = xdg_config_path() {
            assert!(p.ends_with("config.toml"));
        }
    }
}
