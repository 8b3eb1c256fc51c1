//! Target tools whose JSON config files mcpm edits.
//!
//! A target is an IDE or desktop app that reads MCP server definitions from
//! a `mcpServers` object in its own config file. The built-in table covers
//! the common tools; `[targets.<name>]` entries in config.toml add more or
//! move the built-in ones.

pub mod merge;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::{McpmConfig, expand_tilde};

pub use merge::{MergeOutcome, RemoveOutcome, TargetConfigMerger};

/// Top-level key holding server entries in every target config file.
pub const MCP_SERVERS_KEY: &str = "mcpServers";

/// Environment variable overriding the Windsurf config path.
pub const WINDSURF_CONFIG_ENV_VAR: &str = "WINDSURF_MCP_CONFIG_PATH";

/// A built-in target tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinTarget {
    /// Name used on the command line and in `ide_config_commands`
    pub name: &'static str,
    /// Human-readable tool name
    pub display_name: &'static str,
    /// Environment variable that overrides the config path, if any
    pub env_override: Option<&'static str>,
    default_path: DefaultPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultPath {
    /// Relative to the user's home directory
    Home(&'static str),
    /// Relative to the platform config directory
    PlatformConfig(&'static str),
}

const BUILTIN_TARGETS: &[BuiltinTarget] = &[
    BuiltinTarget {
        name: "windsurf",
        display_name: "Windsurf",
        env_override: Some(WINDSURF_CONFIG_ENV_VAR),
        default_path: DefaultPath::Home(".codeium/windsurf/mcp_config.json"),
    },
    BuiltinTarget {
        name: "claude-desktop",
        display_name: "Claude Desktop",
        env_override: None,
        default_path: DefaultPath::PlatformConfig("Claude/claude_desktop_config.json"),
    },
    BuiltinTarget {
        name: "cursor",
        display_name: "Cursor",
        env_override: None,
        default_path: DefaultPath::Home(".cursor/mcp.json"),
    },
];

impl BuiltinTarget {
    /// Default config file location on this machine.
    pub fn default_path(&self) -> Option<PathBuf> {
        match self.default_path {
            DefaultPath::Home(rel) => Some(expand_tilde(&format!("~/{rel}"))),
            DefaultPath::PlatformConfig(rel) => dirs::config_dir().map(|dir| dir.join(rel)),
        }
    }
}

/// All built-in targets.
pub fn builtin_targets() -> &'static [BuiltinTarget] {
    BUILTIN_TARGETS
}

/// `(target name, env var)` pairs for targets with an environment override.
pub fn builtin_env_overrides() -> impl Iterator<Item = (&'static str, &'static str)> {
    BUILTIN_TARGETS
        .iter()
        .filter_map(|t| t.env_override.map(|var| (t.name, var)))
}

/// Where a resolved target path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetSource {
    /// Built-in default location
    Default,
    /// config.toml or an environment override
    Override,
}

/// A target tool with its resolved config path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    pub name: String,
    pub config_path: PathBuf,
    pub source: TargetSource,
}

/// Resolves target names to config file paths.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    overrides: BTreeMap<String, PathBuf>,
}

impl TargetRegistry {
    pub fn new(overrides: BTreeMap<String, PathBuf>) -> Self {
        Self { overrides }
    }

    pub fn from_config(config: &McpmConfig) -> Self {
        Self::new(config.target_paths.clone())
    }

    /// Resolve a target's config path.
    ///
    /// Overrides (environment or config.toml, already merged into the
    /// config) win over the built-in default. Unknown names resolve to
    /// `None`.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(name) {
            return Some(path.clone());
        }
        BUILTIN_TARGETS
            .iter()
            .find(|t| t.name == name)
            .and_then(BuiltinTarget::default_path)
    }

    /// Every known target (built-ins first, then user-defined), resolved.
    pub fn all(&self) -> Vec<ResolvedTarget> {
        let mut resolved = Vec::new();
        for target in BUILTIN_TARGETS {
            let (path, source) = match self.overrides.get(target.name) {
                Some(path) => (Some(path.clone()), TargetSource::Override),
                None => (target.default_path(), TargetSource::Default),
            };
            if let Some(config_path) = path {
                resolved.push(ResolvedTarget {
                    name: target.name.to_string(),
                    config_path,
                    source,
                });
            }
        }
        for (name, path) in &self.overrides {
            if BUILTIN_TARGETS.iter().any(|t| t.name == name.as_str()) {
                continue;
            }
            resolved.push(ResolvedTarget {
                name: name.clone(),
                config_path: path.clone(),
                source: TargetSource::Override,
            });
        }
        resolved
    }

    /// Names of every known target.
    pub fn names(&self) -> Vec<String> {
        self.all().into_iter().map(|t| t.name).collect()
    }
}
