//! Read-modify-write of a target tool's JSON config.
//!
//! Only `mcpServers.<key>` is ever written. Every other key, both at the top
//! level and inside `mcpServers`, is carried through untouched and in its
//! original order. A file that cannot be parsed is copied to a free
//! `<file>.bak`, `<file>.bak.1`, ... before it is replaced, so earlier
//! backups are never overwritten.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

use super::MCP_SERVERS_KEY;
use crate::vars::{InputValues, substitute_json};

/// Result of writing a server entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Config file that was written
    pub config_path: PathBuf,
    /// Whether an entry with the same key was replaced
    pub replaced: bool,
    /// Backup of an unreadable previous file, if one was made
    pub backup_path: Option<PathBuf>,
}

/// Result of removing a server entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The entry existed and the file was rewritten without it
    Removed,
    /// The config file does not exist
    FileMissing,
    /// The file has no `mcpServers` object or no entry for the key
    NotPresent,
}

impl RemoveOutcome {
    pub fn removed(self) -> bool {
        matches!(self, RemoveOutcome::Removed)
    }
}

/// Adds and removes named server entries in target config files.
#[derive(Debug, Default, Clone, Copy)]
pub struct TargetConfigMerger;

impl TargetConfigMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge a package's config snippet under `mcpServers.<server_key>`.
    ///
    /// The snippet is copied, its `path` field is resolved against
    /// `package_install_path`, and `${name}` placeholders in its string
    /// values are filled from `inputs` before it is written.
    pub fn add(
        &self,
        config_path: &Path,
        server_key: &str,
        snippet: &Value,
        package_install_path: &Path,
        inputs: &InputValues,
    ) -> anyhow::Result<MergeOutcome> {
        let entry = process_snippet(snippet, package_install_path, inputs)?;
        self.insert_entry(config_path, server_key, entry)
    }

    /// Write `entry` verbatim under `mcpServers.<server_key>`.
    pub fn insert_entry(
        &self,
        config_path: &Path,
        server_key: &str,
        entry: Value,
    ) -> anyhow::Result<MergeOutcome> {
        if server_key.is_empty() {
            anyhow::bail!("Server key cannot be empty");
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let (mut root, backup_path) = load_or_recover(config_path)?;
        let mut servers = take_servers(&mut root);
        let replaced = servers.insert(server_key.to_string(), entry).is_some();
        root.insert(MCP_SERVERS_KEY.to_string(), Value::Object(servers));

        write_json_map(config_path, &root)?;
        tracing::info!(
            config = %config_path.display(),
            server = server_key,
            replaced,
            "Updated target configuration"
        );

        Ok(MergeOutcome {
            config_path: config_path.to_path_buf(),
            replaced,
            backup_path,
        })
    }

    /// Remove `mcpServers.<server_key>`.
    ///
    /// A missing file, a missing `mcpServers` object and a missing entry are
    /// all successful no-ops. A file that cannot be parsed is an error and is
    /// left as it is.
    pub fn remove(&self, config_path: &Path, server_key: &str) -> anyhow::Result<RemoveOutcome> {
        if !config_path.exists() {
            tracing::debug!(config = %config_path.display(), "Config file missing, nothing to remove");
            return Ok(RemoveOutcome::FileMissing);
        }

        let mut root = load_json_map(config_path)?;
        let removed = root
            .get_mut(MCP_SERVERS_KEY)
            .and_then(Value::as_object_mut)
            .and_then(|servers| servers.shift_remove(server_key))
            .is_some();

        if !removed {
            tracing::debug!(
                config = %config_path.display(),
                server = server_key,
                "Server entry not present"
            );
            return Ok(RemoveOutcome::NotPresent);
        }

        write_json_map(config_path, &root)?;
        tracing::info!(
            config = %config_path.display(),
            server = server_key,
            "Removed server from target configuration"
        );
        Ok(RemoveOutcome::Removed)
    }

    /// Whether the config file currently has an entry for `server_key`.
    pub fn contains_entry(&self, config_path: &Path, server_key: &str) -> anyhow::Result<bool> {
        if !config_path.exists() {
            return Ok(false);
        }
        let root = load_json_map(config_path)?;
        Ok(root
            .get(MCP_SERVERS_KEY)
            .and_then(Value::as_object)
            .is_some_and(|servers| servers.contains_key(server_key)))
    }

}

/// Prepare a snippet for writing.
///
/// `"path": "."` becomes `package_install_path`; any other relative `path`
/// is joined onto it and `..` never climbs above it. Absolute paths and every other field are kept, apart
/// from placeholder substitution in string values.
pub fn process_snippet(
    snippet: &Value,
    package_install_path: &Path,
    inputs: &InputValues,
) -> anyhow::Result<Value> {
    let Value::Object(map) = snippet else {
        anyhow::bail!("Config snippet must be a JSON object");
    };

    let mut processed = map.clone();
    if let Some(Value::String(path)) = processed.get("path")
        && let Some(resolved) = resolve_relative(path, package_install_path)
    {
        processed.insert(
            "path".to_string(),
            Value::String(resolved.to_string_lossy().into_owned()),
        );
    }

    let mut value = Value::Object(processed);
    substitute_json(&mut value, inputs);
    Ok(value)
}

fn resolve_relative(path: &str, base: &Path) -> Option<PathBuf> {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return None;
    }
    let mut resolved = base.to_path_buf();
    for component in candidate.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if resolved != base {
                    resolved.pop();
                }
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    Some(resolved)
}

/// Load the config for an update, recovering from unreadable content.
fn load_or_recover(path: &Path) -> anyhow::Result<(Map<String, Value>, Option<PathBuf>)> {
    if !path.exists() {
        return Ok((Map::new(), None));
    }
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok((Map::new(), None));
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok((map, None)),
        Ok(_) | Err(_) => {
            let backup = backup_path_for(path);
            std::fs::write(&backup, &bytes).with_context(|| {
                format!(
                    "Failed to back up unreadable config file to {}",
                    backup.display()
                )
            })?;
            tracing::warn!(
                config = %path.display(),
                backup = %backup.display(),
                "Config file is not a JSON object; backed it up and starting fresh"
            );
            Ok((Map::new(), Some(backup)))
        }
    }
}

/// Detach the `mcpServers` object from `root`, leaving its slot in place.
fn take_servers(root: &mut Map<String, Value>) -> Map<String, Value> {
    match root.get_mut(MCP_SERVERS_KEY).map(Value::take) {
        Some(Value::Object(servers)) => servers,
        Some(_) => {
            tracing::warn!("Existing '{}' value is not an object; replacing it", MCP_SERVERS_KEY);
            Map::new()
        }
        None => Map::new(),
    }
}

/// First of `<file>.bak`, `<file>.bak.1`, `<file>.bak.2`, ... that does not
/// exist yet.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut base: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    base.push(".bak");

    let mut candidate = path.with_file_name(&base);
    let mut index = 1u32;
    while candidate.exists() {
        let mut name = base.clone();
        name.push(format!(".{index}"));
        candidate = path.with_file_name(name);
        index += 1;
    }
    candidate
}

fn load_json_map(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("Expected JSON object at root: {}", path.display()),
    }
}

fn write_json_map(path: &Path, map: &Map<String, Value>) -> anyhow::Result<()> {
    let mut bytes = serde_json::to_vec_pretty(map).context("Failed to serialize JSON config")?;
    bytes.push(b'\n');
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}
