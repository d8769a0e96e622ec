//! The init verb: write a starter config and prepare store directories.

use crate::config::{starter_config, Config, CONFIG_FILE_NAME};
use crate::error::{ConfigError, Error, Result};
use std::fs;
use std::path::Path;

/// Create `vibesafe.toml` and the store directories under `root`.
pub fn run_init(root: &Path, force: bool) -> Result<()> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if config_path.exists() && !force {
        return Err(Error::Config(ConfigError::Invalid {
            field: CONFIG_FILE_NAME.to_string(),
            detail: "already exists; rerun with --force to overwrite".to_string(),
        }));
    }

    fs::write(&config_path, starter_config()).map_err(|source| {
        Error::Config(ConfigError::Io {
            path: config_path.clone(),
            source,
        })
    })?;

    let config = Config::load(root)?;
    for dir in [config.checkpoints_dir(), config.cache_dir()] {
        fs::create_dir_all(&dir).map_err(|source| {
            Error::Config(ConfigError::Io {
                path: dir.clone(),
                source,
            })
        })?;
    }

    println!("wrote {}", config_path.display());
    println!("prepared {}", config.checkpoints_dir().display());
    println!("prepared {}", config.cache_dir().display());
    println!("next: set the provider API key and run `vibesafe scan`");
    Ok(())
}
