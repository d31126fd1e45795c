use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "INVENTORY_DATA_DIR";

/// Native runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Application-private data directory (attachment files live beneath it)
    pub data_dir: PathBuf,
}

impl Config {
    /// Resolve configuration from an explicit CLI value, then `INVENTORY_DATA_DIR`,
    /// then the platform data directory.
    pub fn load(cli_data_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::resolve(cli_data_dir, std::env::var(DATA_DIR_ENV).ok(), dirs::data_dir())
    }

    fn resolve(
        cli_data_dir: Option<PathBuf>,
        env_data_dir: Option<String>,
        platform_data_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let data_dir = match (cli_data_dir, env_data_dir) {
            (Some(dir), _) => expand_tilde(&dir.to_string_lossy()),
            (None, Some(dir)) if !dir.trim().is_empty() => expand_tilde(dir.trim()),
            _ => platform_data_dir
                .map(|dir| dir.join("inventory"))
                .ok_or(ConfigError::NoDataDir)?,
        };
        Ok(Self { data_dir })
    }

    /// Directory holding the persisted key-value documents
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Expand ~ or ~/ prefix to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No data directory: pass --data-dir or set INVENTORY_DATA_DIR")]
    NoDataDir,
}
