//! Application context shared by every command.

use std::path::Path;

use anyhow::Context;

use crate::config::McpmConfig;
use crate::configure::Configurator;
use crate::install::{InstallError, InstallReport, PackageInstaller};
use crate::prompt::Prompter;
use crate::registry::{RegistryClient, temp_archive_name};
use crate::steps::{ShellExecutor, StepExecutor};
use crate::store::PackageStore;
use crate::target::TargetRegistry;
use crate::uninstall::PackageUninstaller;

/// Configuration plus the long-lived services built from it.
///
/// Frontends create this once per invocation and hand out the components.
pub struct AppContext {
    config: McpmConfig,
    store: PackageStore,
    targets: TargetRegistry,
    executor: Box<dyn StepExecutor>,
}

impl AppContext {
    /// Open the store (creating its tables) and resolve targets.
    pub fn new(config: McpmConfig) -> anyhow::Result<Self> {
        Self::with_executor(config, Box::new(ShellExecutor))
    }

    /// Context with a custom step executor.
    pub fn with_executor(
        config: McpmConfig,
        executor: Box<dyn StepExecutor>,
    ) -> anyhow::Result<Self> {
        let store = PackageStore::open_initialized(&config.db_path)?;
        let targets = TargetRegistry::from_config(&config);
        Ok(Self {
            config,
            store,
            targets,
            executor,
        })
    }

    pub fn config(&self) -> &McpmConfig {
        &self.config
    }

    pub fn store(&self) -> &PackageStore {
        &self.store
    }

    pub fn targets(&self) -> &TargetRegistry {
        &self.targets
    }

    /// Registry client for the configured URL.
    pub fn registry(&self) -> anyhow::Result<RegistryClient> {
        RegistryClient::new(&self.config.registry_url)
    }

    pub fn installer(&self) -> PackageInstaller<'_> {
        PackageInstaller::new(
            self.config.install_dir.clone(),
            &self.store,
            self.executor.as_ref(),
        )
    }

    pub fn uninstaller(&self) -> PackageUninstaller<'_> {
        PackageUninstaller::new(&self.store, &self.targets, self.executor.as_ref())
    }

    pub fn configurator(&self) -> Configurator<'_> {
        Configurator::new(&self.store, &self.targets)
    }

    /// Download `name` at `version` from the registry and install it.
    pub fn install_from_registry(
        &self,
        registry: &RegistryClient,
        name: &str,
        version: &str,
        prompter: &dyn Prompter,
    ) -> Result<InstallReport, InstallError> {
        let archive = registry.download_package(name, version, &self.config.install_dir)?;
        self.installer().install(&archive, name, prompter)
    }

    /// Install a package archive already on disk.
    ///
    /// The archive is copied next to the install directory first, so the
    /// caller's file is left in place.
    pub fn install_from_file(
        &self,
        archive: &Path,
        name: &str,
        prompter: &dyn Prompter,
    ) -> Result<InstallReport, InstallError> {
        std::fs::create_dir_all(&self.config.install_dir).with_context(|| {
            format!(
                "Failed to create install directory: {}",
                self.config.install_dir.display()
            )
        })?;
        let staged = self
            .config
            .install_dir
            .join(temp_archive_name(name, "local"));
        std::fs::copy(archive, &staged).with_context(|| {
            format!("Failed to copy package archive {}", archive.display())
        })?;
        self.installer().install(&staged, name, prompter)
    }
}
