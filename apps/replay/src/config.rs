use std::{fs, io, path::{Path, PathBuf}};

use playback::speed::{DEFAULT_INTERVAL_MS, DEFAULT_SLIDER_MAX, DEFAULT_SLIDER_MIN};
use serde::{Deserialize, Serialize};
use tracing::debug;
use trip_map::DEFAULT_ZOOM;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Timer period the session starts with.
    pub interval_ms: u64,
    pub slider_min: u64,
    pub slider_max: u64,
    pub zoom: u8,
    pub autoplay: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            slider_min: DEFAULT_SLIDER_MIN,
            slider_max: DEFAULT_SLIDER_MAX,
            zoom: DEFAULT_ZOOM,
            autoplay: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: toml::de::Error },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|d| d.join("geocoleta").join("replay.toml"))
}

/// An explicit path must exist; a missing file at the default location
/// just means defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<ReplayConfig, ConfigError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => {
                debug!("no config file; using defaults");
                return Ok(ReplayConfig::default());
            }
        },
    };
    let contents = fs::read_to_string(&path)
        .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
    let cfg = toml::from_str(&contents).map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
    debug!(path = %path.display(), ?cfg, "config loaded");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.toml");
        fs::write(&path, "interval_ms = 250\nautoplay = true\n").unwrap();
        let cfg = load_config(Some(path.as_path())).unwrap();
        assert_eq!(cfg.interval_ms, 250);
        assert!(cfg.autoplay);
        assert_eq!(cfg.slider_max, DEFAULT_SLIDER_MAX);
        assert_eq!(cfg.zoom, DEFAULT_ZOOM);
    }

    #[test]
    fn test_missing_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.toml");
        fs::write(&path, "zoom = \"close\"\n").unwrap();
        assert!(matches!(load_config(Some(path.as_path())), Err(ConfigError::Parse { .. })));
    }
}
