//! Client for the remote package registry.
//!
//! The registry serves package listings, server listings, package
//! downloads and package uploads over HTTP. Calls are async `reqwest`
//! underneath and exposed synchronously through a runtime owned by the
//! client, since every mcpm command runs to completion on one thread.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::package::PackageMetadata;
use crate::target::MCP_SERVERS_KEY;

/// Version requested when none is given.
pub const LATEST_VERSION: &str = "latest";

/// A package as listed by `GET /packages/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryPackage {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A server as listed by `GET /servers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryServer {
    /// Unique name of the server in the registry
    pub registry_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// JSON text of the form `{"mcpServers": {"<key>": {...}}}`
    #[serde(default)]
    pub config_command: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A server entry parsed from a registry `config_command`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfigCommand {
    /// Key to write under `mcpServers`
    pub server_key: String,
    pub config: Value,
}

impl ServerConfigCommand {
    /// Parse `{"mcpServers": {"<key>": {...}}}`.
    ///
    /// Exactly one entry is expected; when there are more, the first one is
    /// used and a warning is logged.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let value: Value =
            serde_json::from_str(raw).context("Could not parse server configuration JSON")?;
        let servers = value
            .get(MCP_SERVERS_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid server configuration: expected an object with a '{}' object",
                    MCP_SERVERS_KEY
                )
            })?;

        if servers.len() > 1 {
            tracing::warn!(
                count = servers.len(),
                "Expected exactly one server in configuration; using the first"
            );
        }
        let (server_key, config) = servers
            .iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No server configuration found in '{}'", MCP_SERVERS_KEY))?;

        Ok(Self {
            server_key: server_key.clone(),
            config: config.clone(),
        })
    }
}

/// Metadata sent alongside an uploaded package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub license: String,
    pub runtime: String,
    pub entrypoint: String,
}

impl PublishMetadata {
    pub fn from_metadata(metadata: &PackageMetadata) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            name: text(&metadata.name),
            version: text(&metadata.version),
            description: text(&metadata.description),
            author: text(&metadata.author),
            license: text(&metadata.license),
            runtime: metadata
                .runtime
                .clone()
                .unwrap_or_else(|| "generic".to_string()),
            entrypoint: metadata
                .extra
                .get("entrypoint")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// HTTP client for one registry.
#[derive(Debug)]
pub struct RegistryClient {
    base_url: String,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            anyhow::bail!("Registry URL cannot be empty");
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("mcpm/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;
        Ok(Self {
            base_url,
            http,
            runtime,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Latest version of every package.
    pub fn list_packages(&self) -> anyhow::Result<Vec<RegistryPackage>> {
        self.runtime.block_on(self.get_json(&self.endpoint("packages/")))
    }

    /// Every registered server.
    pub fn list_servers(&self) -> anyhow::Result<Vec<RegistryServer>> {
        self.runtime.block_on(self.get_json(&self.endpoint("servers")))
    }

    /// Server whose `registry_name` matches exactly.
    pub fn find_server(&self, registry_name: &str) -> anyhow::Result<Option<RegistryServer>> {
        Ok(self
            .list_servers()?
            .into_iter()
            .find(|s| s.registry_name == registry_name))
    }

    /// Download a package archive to `<dest_dir>/<name>_<version>_temp.mcpz`.
    pub fn download_package(
        &self,
        name: &str,
        version: &str,
        dest_dir: &Path,
    ) -> anyhow::Result<PathBuf> {
        let url = self.endpoint(&format!("packages/{name}/{version}/download"));
        tracing::info!(package = name, version, %url, "Downloading package");
        let bytes = self.runtime.block_on(self.get_bytes(&url))?;

        std::fs::create_dir_all(dest_dir)
            .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;
        let path = dest_dir.join(temp_archive_name(name, version));
        std::fs::write(&path, &bytes)
            .with_context(|| format!("Failed to save download to {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Saved package archive");
        Ok(path)
    }

    /// Upload a package archive with its metadata.
    pub fn publish(&self, archive_path: &Path, metadata: &PublishMetadata) -> anyhow::Result<()> {
        let data = std::fs::read(archive_path)
            .with_context(|| format!("Failed to read package file: {}", archive_path.display()))?;
        let file_name = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package.mcpz".to_string());
        let metadata_json =
            serde_json::to_string(metadata).context("Failed to serialize publish metadata")?;

        let url = self.endpoint("packages/publish");
        tracing::info!(package = %metadata.name, version = %metadata.version, %url, "Publishing package");
        self.runtime
            .block_on(self.upload(&url, data, file_name, metadata_json))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> anyhow::Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to connect to registry at {}", url))?;
        if !response.status().is_success() {
            anyhow::bail!("Registry request failed: HTTP {} from {}", response.status(), url);
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to decode registry response from {}", url))
    }

    async fn get_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download from {}", url))?;
        if !response.status().is_success() {
            anyhow::bail!("Download failed: HTTP {} from {}", response.status(), url);
        }
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;
        Ok(bytes.to_vec())
    }

    async fn upload(
        &self,
        url: &str,
        data: Vec<u8>,
        file_name: String,
        metadata_json: String,
    ) -> anyhow::Result<()> {
        let part = reqwest::multipart::Part::bytes(data).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .part("package", part)
            .text("metadata", metadata_json);

        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to connect to registry at {}", url))?;

        let status = response.status();
        if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::CREATED {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Registry rejected the package: HTTP {}: {}", status, body.trim())
    }
}

/// Name of the temporary archive a download is saved under.
pub fn temp_archive_name(name: &str, version: &str) -> String {
    format!("{name}_{version}_temp.mcpz")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_server_config() {
        let command = ServerConfigCommand::parse(
            r#"{"mcpServers": {"calc": {"command": "npx", "args": ["calc"]}}}"#,
        )
        .unwrap();
        assert_eq!(command.server_key, "calc");
        assert_eq!(command.config["command"], "npx");
    }

    #[test]
    fn uses_first_of_several_servers() {
        let command =
            ServerConfigCommand::parse(r#"{"mcpServers": {"b": {}, "a": {"x": 1}}}"#).unwrap();
        assert_eq!(command.server_key, "b");
    }

    #[test]
    fn rejects_malformed_config_commands() {
        assert!(ServerConfigCommand::parse("not json").is_err());
        assert!(ServerConfigCommand::parse(r#"{"servers": {}}"#).is_err());
        assert!(ServerConfigCommand::parse(r#"{"mcpServers": {}}"#).is_err());
    }

    #[test]
    fn endpoints_join_without_double_slashes() {
        let client = RegistryClient::new("http://localhost:8000/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(client.endpoint("packages/"), "http://localhost:8000/api/packages/");
        assert_eq!(client.endpoint("/servers"), "http://localhost:8000/api/servers");
    }

    #[test]
    fn unreachable_registry_is_an_error() {
        let client = RegistryClient::new("http://127.0.0.1:1/api").unwrap();
        assert!(client.list_packages().is_err());
    }

    #[test]
    fn publish_metadata_defaults_runtime() {
        let metadata =
            PackageMetadata::from_json(r#"{"name": "calc", "version": "1.0.0", "entrypoint": "main.py"}"#)
                .unwrap();
        let publish = PublishMetadata::from_metadata(&metadata);
        assert_eq!(publish.runtime, "generic");
        assert_eq!(publish.entrypoint, "main.py");
        assert_eq!(publish.description, "");
    }

    #[test]
    fn temp_archive_name_includes_version() {
        assert_eq!(temp_archive_name("calc", "latest"), "calc_latest_temp.mcpz");
    }
}
