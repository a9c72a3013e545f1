pub mod doctor;
pub mod init;
pub mod run;
pub mod status;

use clawcraft_config::AppConfig;
use std::path::PathBuf;

/// Load config from an explicit path or the default location.
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_from(&path)?,
        None => AppConfig::load()?,
    };
    Ok(config)
}
