use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Overrides the config directory (used by scripted setups and tests).
pub const CONFIG_DIR_ENV: &str = "DROPSHIP_CONFIG_DIR";

/// Base dropship config directory (~/.config/dropship/ on all platforms)
pub fn dropship() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("dropship"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("dropship"))
    }
}

/// Sites directory
pub fn sites() -> Result<PathBuf> {
    Ok(dropship()?.join("sites"))
}

/// Servers directory
pub fn servers() -> Result<PathBuf> {
    Ok(dropship()?.join("servers"))
}

/// Site config file path
pub fn site(id: &str) -> Result<PathBuf> {
    Ok(sites()?.join(format!("{}.json", id)))
}

/// Server config file path
pub fn server(id: &str) -> Result<PathBuf> {
    Ok(servers()?.join(format!("{}.json", id)))
}
