//! Adding installed packages and registry servers to target tools.

use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;

use crate::package::PackageMetadata;
use crate::registry::{RegistryServer, ServerConfigCommand};
use crate::store::{InstalledPackage, PackageStore};
use crate::target::{MergeOutcome, RemoveOutcome, TargetConfigMerger, TargetRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigureAction {
    Add,
    Remove,
}

impl std::str::FromStr for ConfigureAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(ConfigureAction::Add),
            "remove" => Ok(ConfigureAction::Remove),
            other => anyhow::bail!("Unknown action '{}'; expected 'add' or 'remove'", other),
        }
    }
}

impl std::fmt::Display for ConfigureAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigureAction::Add => write!(f, "add"),
            ConfigureAction::Remove => write!(f, "remove"),
        }
    }
}

/// An installed package with target configs.
#[derive(Debug, Clone)]
pub struct ConfigurablePackage {
    pub package: InstalledPackage,
    pub metadata: PackageMetadata,
}

impl ConfigurablePackage {
    pub fn supported_targets(&self) -> Vec<&str> {
        self.metadata.supported_targets()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ConfigureResult {
    Added { replaced: bool, backup_path: Option<PathBuf> },
    Removed,
    /// Nothing to remove
    AlreadyAbsent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigureReport {
    pub server_key: String,
    pub target: String,
    pub config_path: PathBuf,
    pub result: ConfigureResult,
}

/// Writes server entries for installed packages and registry servers.
pub struct Configurator<'a> {
    store: &'a PackageStore,
    targets: &'a TargetRegistry,
    merger: TargetConfigMerger,
}

impl<'a> Configurator<'a> {
    pub fn new(store: &'a PackageStore, targets: &'a TargetRegistry) -> Self {
        Self {
            store,
            targets,
            merger: TargetConfigMerger::new(),
        }
    }

    /// Installed packages whose metadata declares at least one target config.
    ///
    /// Packages with missing or unreadable metadata are left out.
    pub fn configurable_packages(&self) -> anyhow::Result<Vec<ConfigurablePackage>> {
        let mut configurable = Vec::new();
        for package in self.store.list_all()? {
            match PackageMetadata::load_from_dir(&package.install_path) {
                Ok(Some(metadata)) if metadata.has_ide_configs() => {
                    configurable.push(ConfigurablePackage { package, metadata });
                }
                Ok(_) => {}
                Err(err) => tracing::debug!(
                    package = %package.name,
                    error = %format!("{err:#}"),
                    "Skipping package with unreadable metadata"
                ),
            }
        }
        Ok(configurable)
    }

    /// Add or remove an installed package's entry in `target`'s config.
    ///
    /// The entry key is the package's store key. Stored input values fill
    /// `${name}` placeholders in the snippet.
    pub fn apply(
        &self,
        package_name: &str,
        target: &str,
        action: ConfigureAction,
    ) -> anyhow::Result<ConfigureReport> {
        let package = self
            .store
            .get(package_name)?
            .ok_or_else(|| anyhow::anyhow!("Package '{}' is not installed", package_name))?;
        let config_path = self.resolve_target(target)?;

        let metadata = PackageMetadata::load_from_dir(&package.install_path)?.ok_or_else(|| {
            anyhow::anyhow!(
                "mcp_package.json not found in {}",
                package.install_path.display()
            )
        })?;
        if !metadata.has_ide_configs() {
            anyhow::bail!("Package '{}' declares no target configurations", package_name);
        }
        let snippet = metadata.ide_config(target).ok_or_else(|| {
            anyhow::anyhow!(
                "Target '{}' is not supported by package '{}'. Supported targets: {}",
                target,
                package_name,
                metadata.supported_targets().join(", ")
            )
        })?;

        let result = match action {
            ConfigureAction::Add => {
                let inputs = self.store.get_input_values(&package.name)?;
                let outcome = self
                    .merger
                    .add(&config_path, &package.name, snippet, &package.install_path, &inputs)
                    .with_context(|| format!("Failed to configure {} for {}", package_name, target))?;
                added(outcome)
            }
            ConfigureAction::Remove => {
                let outcome = self
                    .merger
                    .remove(&config_path, &package.name)
                    .with_context(|| {
                        format!("Failed to remove {} configuration from {}", package_name, target)
                    })?;
                removed(outcome)
            }
        };

        Ok(ConfigureReport {
            server_key: package.name,
            target: target.to_string(),
            config_path,
            result,
        })
    }

    /// Write a registry server's config into `target`'s config file.
    pub fn configure_server(
        &self,
        server: &RegistryServer,
        target: &str,
    ) -> anyhow::Result<ConfigureReport> {
        let config_path = self.resolve_target(target)?;
        let raw = server.config_command.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "Server '{}' does not have a configuration command",
                server.registry_name
            )
        })?;
        let command = ServerConfigCommand::parse(raw)
            .with_context(|| format!("Invalid configuration for server '{}'", server.registry_name))?;

        let outcome = self
            .merger
            .insert_entry(&config_path, &command.server_key, command.config)
            .with_context(|| {
                format!("Failed to configure server '{}' for {}", server.registry_name, target)
            })?;

        Ok(ConfigureReport {
            server_key: command.server_key,
            target: target.to_string(),
            config_path,
            result: added(outcome),
        })
    }

    /// Remove the `server_key` entry from `target`'s config.
    ///
    /// Used for servers configured straight from the registry, which have
    /// no store record.
    pub fn remove_server(&self, server_key: &str, target: &str) -> anyhow::Result<ConfigureReport> {
        let config_path = self.resolve_target(target)?;
        let outcome = self
            .merger
            .remove(&config_path, server_key)
            .with_context(|| format!("Failed to remove '{}' from {}", server_key, target))?;
        Ok(ConfigureReport {
            server_key: server_key.to_string(),
            target: target.to_string(),
            config_path,
            result: removed(outcome),
        })
    }

    fn resolve_target(&self, target: &str) -> anyhow::Result<PathBuf> {
        self.targets.resolve(target).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown target tool '{}'. Known targets: {}",
                target,
                self.targets.names().join(", ")
            )
        })
    }
}

fn added(outcome: MergeOutcome) -> ConfigureResult {
    ConfigureResult::Added {
        replaced: outcome.replaced,
        backup_path: outcome.backup_path,
    }
}

fn removed(outcome: RemoveOutcome) -> ConfigureResult {
    if outcome.removed() {
        ConfigureResult::Removed
    } else {
        ConfigureResult::AlreadyAbsent
    }
}
