//! Layered loading: TOML file, then environment overrides, then validation.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::debug;

use crate::{AppConfig, ConfigError, Result};

/// File read when no path is given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "restbase.toml";

/// Prefix of environment overrides, e.g. `RESTBASE__RLS__ANON_ROLE=web_anon`.
pub const ENV_PREFIX: &str = "RESTBASE";

/// Load and validate configuration.
///
/// An explicit `path` must exist. Without one, `restbase.toml` in the
/// working directory is used when present, otherwise built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound(p.display().to_string()));
            }
            debug!(path = %p.display(), "loading config file");
            builder = builder.add_source(File::from(p.to_path_buf()));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                debug!(path = DEFAULT_CONFIG_FILE, "loading default config file");
                builder = builder.add_source(File::from(default_path));
            }
        }
    }

    // Environment variable overrides, e.g. RESTBASE__STORAGE__POSTGRES__POOL_SIZE=20
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__"),
    );

    let cfg = builder.build().map_err(ConfigError::Build)?;
    let merged: AppConfig = cfg.try_deserialize().map_err(ConfigError::Deserialize)?;
    merged.validate()?;
    Ok(merged)
}

/// Like [`load_config`] for any path-like argument.
pub fn load_config_with_default_path<P: AsRef<Path>>(path: Option<P>) -> Result<AppConfig> {
    load_config(path.as_ref().map(AsRef::as_ref))
}
