//! Locating and reading `config.toml`.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use weft::{WeftError, config::AppConfig};

const LOCAL_CONFIG: &str = "weft/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(String),

    #[error("configuration file {} does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("invalid configuration value: {0}")]
    Validation(String),
}

impl From<ConfigError> for WeftError {
    fn from(err: ConfigError) -> Self {
        WeftError::Io(io::Error::other(err.to_string()))
    }
}

/// Resolve the configuration for one run.
///
/// An explicit path must exist. Without one, `weft/config.toml` under the
/// working directory wins over the per-user config directory, and the
/// defaults apply when neither exists.
///
/// # Errors
///
/// Fails when the explicit file is missing, or when the chosen file is not
/// valid TOML for [`AppConfig`] or holds out-of-range values.
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, WeftError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_path_buf()).into());
        }
        return read_config(path);
    }

    let user_config = ProjectDirs::from("com", "weft", "weft")
        .map(|dirs| dirs.config_dir().join("config.toml"));
    if user_config.is_none() {
        debug!("No per-user config directory on this platform");
    }

    let candidates = std::iter::once(PathBuf::from(LOCAL_CONFIG)).chain(user_config);
    for candidate in candidates {
        if candidate.exists() {
            return read_config(&candidate);
        }
        debug!(path:% = candidate.display(); "No configuration file");
    }

    debug!("Using default configuration");
    Ok(AppConfig::default())
}

fn read_config(path: &Path) -> Result<AppConfig, WeftError> {
    info!(path:% = path.display(); "Loading configuration");
    let content = fs::read_to_string(path)?;
    let config: AppConfig =
        toml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.linker().max_import_depth() == 0 {
        return Err(ConfigError::Validation(
            "linker.max_import_depth must be at least 1".to_string(),
        ));
    }
    let indent = config.serializer().indent();
    if indent > 16 {
        return Err(ConfigError::Validation(format!(
            "serializer.indent of {indent} exceeds 16"
        )));
    }
    Ok(())
}
