//! Schema of the optional `config.toml` file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Contents of `<mcpm home>/config.toml`.
///
/// Every field is optional; anything left out falls back to the built-in
/// defaults in [`super::McpmConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Base URL of the package registry API
    #[serde(default)]
    pub registry_url: Option<String>,

    /// Directory holding one subdirectory per installed package
    #[serde(default)]
    pub install_dir: Option<String>,

    /// Location of the local package store database
    #[serde(default)]
    pub db_path: Option<String>,

    /// Per-target config file overrides, keyed by target name
    #[serde(default)]
    pub targets: BTreeMap<String, TargetEntry>,
}

/// A `[targets.<name>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetEntry {
    /// Path to the tool's JSON config file
    pub path: String,
}

impl ConfigFile {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(url) = &self.registry_url {
            url::Url::parse(url)
                .map_err(|e| anyhow::anyhow!("Invalid registry_url '{}': {}", url, e))?;
        }
        for (name, target) in &self.targets {
            if name.trim().is_empty() {
                anyhow::bail!("Target names in [targets] cannot be empty");
            }
            if target.path.trim().is_empty() {
                anyhow::bail!("Target '{}' has an empty path", name);
            }
        }
        Ok(())
    }
}
