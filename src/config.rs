use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

/// The answering service the original deployment runs on.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub endpoint: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self { endpoint: None }
    }

    /// Base URL of the answering service.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Diagnostics land here rather than on the terminal.
    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("askchat.log"))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("askchat"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn endpoint_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("askchat").join("config.json");

        let mut config = Config::new();
        config.endpoint = Some("http://answers.internal:9000".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.endpoint(), "http://answers.internal:9000");
    }

    #[test]
    fn null_endpoint_falls_back_to_default() {
        let config: Config = serde_json::from_str(r#"{"endpoint": null}"#).unwrap();
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
    }
}
