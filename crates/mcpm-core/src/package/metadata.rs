//! `mcp_package.json`: the metadata file at the root of every package.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// File name of the package metadata file.
pub const METADATA_FILE_NAME: &str = "mcp_package.json";

/// Version recorded for packages that do not declare one.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Step type that runs a shell command.
pub const SHELL_STEP: &str = "shell";

/// Parsed `mcp_package.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Stable key used in the local store and in target config files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// Values asked from the user at install time
    #[serde(default)]
    pub install_inputs: Vec<InstallInput>,

    #[serde(default)]
    pub install_steps: Vec<PackageStep>,

    #[serde(default)]
    pub uninstall_steps: Vec<PackageStep>,

    /// Config snippet per target tool
    #[serde(default)]
    pub ide_config_commands: Map<String, Value>,

    /// Fields mcpm does not interpret, kept so the file round-trips
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A value requested from the user during install.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallInput {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default = "default_input_type", rename = "type")]
    pub input_type: String,

    /// Mask the value while typing
    #[serde(default)]
    pub secret: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

fn default_input_type() -> String {
    "string".to_string()
}

impl InstallInput {
    /// Text shown when asking for this input.
    pub fn prompt_text(&self) -> String {
        match self.prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => prompt.to_string(),
            _ => format!("Enter value for {}", self.name),
        }
    }
}

/// One install or uninstall step.
///
/// Only `{"type": "shell", "command": "..."}` is executable. Other shapes
/// are kept so they can be reported and skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageStep {
    #[serde(rename = "type", default)]
    pub step_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl PackageStep {
    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            step_type: SHELL_STEP.to_string(),
            command: Some(command.into()),
        }
    }

    /// The command to run, when this is a runnable shell step.
    pub fn shell_command(&self) -> Option<&str> {
        if self.step_type == SHELL_STEP {
            self.command.as_deref()
        } else {
            None
        }
    }
}

impl PackageMetadata {
    /// Parse metadata from a JSON string.
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str(content).context("Invalid mcp_package.json")
    }

    /// Load `mcp_package.json` from a package directory.
    ///
    /// A missing file is not an error: it yields `Ok(None)`.
    pub fn load_from_dir(dir: &Path) -> anyhow::Result<Option<Self>> {
        let path = dir.join(METADATA_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let metadata = Self::from_json(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(metadata))
    }

    /// Write the metadata as pretty JSON into `dir`.
    pub fn save_to_dir(&self, dir: &Path) -> anyhow::Result<()> {
        let path = dir.join(METADATA_FILE_NAME);
        let mut bytes =
            serde_json::to_vec_pretty(self).context("Failed to serialize package metadata")?;
        bytes.push(b'\n');
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Store key for this package: `install_name`, else `fallback`.
    pub fn install_name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.install_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(fallback)
    }

    pub fn version_or_unknown(&self) -> &str {
        self.version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(UNKNOWN_VERSION)
    }

    /// Config snippet declared for `target`.
    pub fn ide_config(&self, target: &str) -> Option<&Value> {
        self.ide_config_commands.get(target)
    }

    pub fn has_ide_configs(&self) -> bool {
        !self.ide_config_commands.is_empty()
    }

    pub fn supported_targets(&self) -> Vec<&str> {
        self.ide_config_commands.keys().map(String::as_str).collect()
    }

    /// Names of required fields that are missing or empty.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            missing.push("name");
        }
        if self.version.as_deref().is_none_or(|v| v.trim().is_empty()) {
            missing.push("version");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_metadata_json() -> &'static str {
        r#"{
            "name": "calculator",
            "install_name": "calc-server",
            "version": "1.2.0",
            "description": "Adds numbers",
            "runtime": "python",
            "install_inputs": [
                {"name": "API_TOKEN", "prompt": "Token?", "secret": true},
                {"name": "PORT", "default": "8080"}
            ],
            "install_steps": [
                {"type": "shell", "command": "pip install -r requirements.txt"},
                {"type": "docker", "image": "x"}
            ],
            "uninstall_steps": [{"type": "shell", "command": "rm -rf .venv"}],
            "ide_config_commands": {
                "windsurf": {"command": "python", "args": ["server.py"], "path": "."}
            },
            "entrypoint": "server.py"
        }"#
    }

    #[test]
    fn parses_full_metadata() {
        let metadata = PackageMetadata::from_json(full_metadata_json()).unwrap();

        assert_eq!(metadata.install_name_or("calculator"), "calc-server");
        assert_eq!(metadata.version_or_unknown(), "1.2.0");
        assert_eq!(metadata.install_inputs.len(), 2);
        assert!(metadata.install_inputs[0].secret);
        assert_eq!(metadata.install_inputs[1].input_type, "string");
        assert_eq!(metadata.install_inputs[1].default.as_deref(), Some("8080"));
        assert_eq!(
            metadata.install_steps[0].shell_command(),
            Some("pip install -r requirements.txt")
        );
        assert_eq!(metadata.install_steps[1].shell_command(), None);
        assert_eq!(metadata.supported_targets(), vec!["windsurf"]);
        assert_eq!(metadata.extra.get("entrypoint"), Some(&Value::from("server.py")));
    }

    #[test]
    fn defaults_apply_to_minimal_metadata() {
        let metadata = PackageMetadata::from_json("{}").unwrap();
        assert_eq!(metadata.install_name_or("fallback"), "fallback");
        assert_eq!(metadata.version_or_unknown(), UNKNOWN_VERSION);
        assert!(!metadata.has_ide_configs());
        assert_eq!(metadata.missing_required_fields(), vec!["name", "version"]);
    }

    #[test]
    fn prompt_text_falls_back_to_name() {
        let input = InstallInput {
            name: "TOKEN".into(),
            prompt: None,
            input_type: "string".into(),
            secret: false,
            default: None,
        };
        assert_eq!(input.prompt_text(), "Enter value for TOKEN");
    }

    #[test]
    fn load_from_dir_handles_missing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(PackageMetadata::load_from_dir(temp.path()).unwrap().is_none());
    }

    #[test]
    fn load_from_dir_rejects_invalid_json() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join(METADATA_FILE_NAME), "{ nope").unwrap();
        assert!(PackageMetadata::load_from_dir(temp.path()).is_err());
    }

    #[test]
    fn save_then_load_keeps_unknown_fields() {
        let temp = tempfile::TempDir::new().unwrap();
        let metadata = PackageMetadata::from_json(full_metadata_json()).unwrap();
        metadata.save_to_dir(temp.path()).unwrap();

        let loaded = PackageMetadata::load_from_dir(temp.path()).unwrap().unwrap();
        assert_eq!(loaded, metadata);
    }
}
