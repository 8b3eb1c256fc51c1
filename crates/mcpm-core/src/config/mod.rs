//! Configuration for mcpm itself.
//!
//! Settings are layered, lowest precedence first:
//! - Built-in defaults rooted at `~/.mcpm`
//! - The optional `config.toml` in the mcpm home directory
//! - Environment variables (`MCPM_HOME`, `MCPM_REGISTRY_URL`, per-target overrides)

pub mod parser;
pub mod paths;
pub mod schema;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;

pub use parser::{parse_config_toml, parse_config_toml_str};
pub use paths::expand_tilde;
pub use schema::{ConfigFile, TargetEntry};

use crate::target::builtin_env_overrides;

/// Relocates the mcpm home directory.
pub const HOME_ENV_VAR: &str = "MCPM_HOME";
/// Overrides the registry base URL.
pub const REGISTRY_URL_ENV_VAR: &str = "MCPM_REGISTRY_URL";
/// Registry used when nothing else is configured.
pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:8000/api";

/// Resolved mcpm configuration.
///
/// Passed explicitly to every component so nothing reads global state
/// after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpmConfig {
    /// mcpm state root (`~/.mcpm`)
    pub home_dir: PathBuf,
    /// One subdirectory per installed package, named by package name
    pub install_dir: PathBuf,
    /// SQLite file backing the local package store
    pub db_path: PathBuf,
    /// Registry API base URL
    pub registry_url: String,
    /// Target config path overrides keyed by target name
    pub target_paths: BTreeMap<String, PathBuf>,
}

impl McpmConfig {
    /// Config rooted at `home_dir` with built-in defaults only.
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        let home_dir = home_dir.into();
        Self {
            install_dir: paths::install_dir_for_home(&home_dir),
            db_path: paths::db_path_for_home(&home_dir),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            target_paths: BTreeMap::new(),
            home_dir,
        }
    }

    /// Load configuration from the process environment and config file.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with_env(|key| std::env::var(key).ok())
    }

    /// Load configuration using `env` for environment lookups.
    pub fn load_with_env(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let home_dir = match non_empty(env(HOME_ENV_VAR)) {
            Some(dir) => expand_tilde(&dir),
            None => paths::default_home_dir()?,
        };

        let mut config = Self::with_home(home_dir);

        let file_path = paths::config_file_for_home(&config.home_dir);
        if file_path.exists() {
            let file = parse_config_toml(&file_path)?;
            config.apply_file(&file);
            tracing::debug!(path = %file_path.display(), "Loaded config file");
        }

        config.apply_env(&env)?;
        Ok(config)
    }

    /// Overlay values from a parsed config file.
    pub fn apply_file(&mut self, file: &ConfigFile) {
        if let Some(url) = &file.registry_url {
            self.registry_url = url.clone();
        }
        if let Some(dir) = &file.install_dir {
            self.install_dir = expand_tilde(dir);
        }
        if let Some(db) = &file.db_path {
            self.db_path = expand_tilde(db);
        }
        for (name, target) in &file.targets {
            self.target_paths
                .insert(name.clone(), expand_tilde(&target.path));
        }
    }

    /// Overlay values from environment variables.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(url) = non_empty(env(REGISTRY_URL_ENV_VAR)) {
            url::Url::parse(&url).with_context(|| {
                format!("Invalid registry URL in {}: {}", REGISTRY_URL_ENV_VAR, url)
            })?;
            self.registry_url = url;
        }
        for (target, var) in builtin_env_overrides() {
            if let Some(path) = non_empty(env(var)) {
                self.target_paths
                    .insert(target.to_string(), expand_tilde(&path));
            }
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn with_home_uses_defaults() {
        let config = McpmConfig::with_home("/tmp/mcpm-home");
        assert_eq!(config.install_dir, PathBuf::from("/tmp/mcpm-home/packages"));
        assert_eq!(
            config.db_path,
            PathBuf::from("/tmp/mcpm-home/local_registry.db")
        );
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert!(config.target_paths.is_empty());
    }

    #[test]
    fn env_overrides_file() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("config.toml"),
            r#"
registry_url = "https://file.example.com/api"

[targets.windsurf]
path = "/from/file.json"
"#,
        )
        .unwrap();

        let home = temp.path().to_string_lossy().to_string();
        let config = McpmConfig::load_with_env(env_from(&[
            ("MCPM_HOME", home.as_str()),
            ("WINDSURF_MCP_CONFIG_PATH", "/from/env.json"),
        ]))
        .unwrap();

        assert_eq!(config.home_dir, temp.path());
        assert_eq!(config.registry_url, "https://file.example.com/api");
        assert_eq!(
            config.target_paths.get("windsurf"),
            Some(&PathBuf::from("/from/env.json"))
        );
    }

    #[test]
    fn registry_env_var_wins() {
        let temp = tempfile::TempDir::new().unwrap();
        let home = temp.path().to_string_lossy().to_string();
        let config = McpmConfig::load_with_env(env_from(&[
            ("MCPM_HOME", home.as_str()),
            ("MCPM_REGISTRY_URL", "https://env.example.com/api"),
        ]))
        .unwrap();
        assert_eq!(config.registry_url, "https://env.example.com/api");
    }

    #[test]
    fn invalid_registry_env_var_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let home = temp.path().to_string_lossy().to_string();
        let result = McpmConfig::load_with_env(env_from(&[
            ("MCPM_HOME", home.as_str()),
            ("MCPM_REGISTRY_URL", "::nope::"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = McpmConfig::with_home("/tmp/h");
        config
            .apply_env(env_from(&[
                ("MCPM_REGISTRY_URL", "   "),
                ("WINDSURF_MCP_CONFIG_PATH", ""),
            ]))
            .unwrap();
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert!(config.target_paths.is_empty());
    }
}
