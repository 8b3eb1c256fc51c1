//! Default locations and path expansion helpers.

use std::path::{Path, PathBuf};

/// Name of the mcpm home directory under the user's home.
pub const HOME_DIR_NAME: &str = ".mcpm";
/// Subdirectory of the mcpm home holding installed packages.
pub const PACKAGES_DIR_NAME: &str = "packages";
/// File name of the local package store.
pub const DB_FILE_NAME: &str = "local_registry.db";
/// File name of the optional settings file.
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub fn default_home_dir() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home.join(HOME_DIR_NAME))
}

pub fn install_dir_for_home(home: &Path) -> PathBuf {
    home.join(PACKAGES_DIR_NAME)
}

pub fn db_path_for_home(home: &Path) -> PathBuf {
    home.join(DB_FILE_NAME)
}

pub fn config_file_for_home(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE_NAME)
}

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a leading tilde are returned unchanged. If the home
/// directory cannot be determined the path is returned as written.
pub fn expand_tilde(path: &str) -> PathBuf {
    expand_tilde_with(path, dirs::home_dir().as_deref())
}

pub(crate) fn expand_tilde_with(path: &str, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return PathBuf::from(path);
    };
    if path == "~" {
        return home.to_path_buf();
    }
    match path
        .strip_prefix("~/")
        .or_else(|| path.strip_prefix("~\\"))
    {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}
