//! Installing a package archive into the local install directory.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::package::{PackageMetadata, archive};
use crate::prompt::Prompter;
use crate::steps::{StepExecutor, StepPhase, StepSummary, run_steps};
use crate::store::PackageStore;
use crate::vars::InputValues;

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Invalid package name '{0}'")]
    InvalidName(String),

    /// The archive could not be extracted. Nothing was recorded and the
    /// partial install directory and the archive were removed.
    #[error("Failed to extract package archive {}: {reason}", .archive.display())]
    Archive { archive: PathBuf, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// What a successful install did.
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// Name the install was requested under; also the directory name
    pub package_name: String,
    /// Key recorded in the store
    pub install_name: String,
    pub version: String,
    pub install_path: PathBuf,
    /// Values collected for `install_inputs`
    pub inputs: InputValues,
    pub steps: StepSummary,
    /// `None` when the package has no readable `mcp_package.json`
    pub metadata: Option<PackageMetadata>,
}

/// Extracts archives into `<install_dir>/<package name>` and records them.
pub struct PackageInstaller<'a> {
    install_dir: PathBuf,
    store: &'a PackageStore,
    executor: &'a dyn StepExecutor,
}

impl<'a> PackageInstaller<'a> {
    pub fn new(
        install_dir: impl Into<PathBuf>,
        store: &'a PackageStore,
        executor: &'a dyn StepExecutor,
    ) -> Self {
        Self {
            install_dir: install_dir.into(),
            store,
            executor,
        }
    }

    /// Install the archive at `archive_path` as `package_name`.
    ///
    /// Any existing install directory for the name is replaced, not merged.
    /// The archive file is consumed on every path: it is deleted once
    /// extraction finishes, and also when the install stops before that. A store record is written only when every stage
    /// succeeds; on failure the new install directory is removed again.
    pub fn install(
        &self,
        archive_path: &Path,
        package_name: &str,
        prompter: &dyn Prompter,
    ) -> Result<InstallReport, InstallError> {
        if let Err(err) = validate_package_name(package_name) {
            discard_archive(archive_path);
            return Err(err);
        }
        let target = self.install_dir.join(package_name);

        // Records whose directory is about to be replaced
        let displaced = self.records_at(&target);

        if let Err(err) = self.replace_existing(&target) {
            discard_archive(archive_path);
            return Err(err.into());
        }

        tracing::info!(
            package = package_name,
            path = %target.display(),
            "Extracting package archive"
        );
        if let Err(err) = archive::extract(archive_path, &target) {
            remove_dir_if_present(&target);
            discard_archive(archive_path);
            self.forget_records(&displaced);
            return Err(InstallError::Archive {
                archive: archive_path.to_path_buf(),
                reason: format!("{err:#}"),
            });
        }
        discard_archive(archive_path);

        match self.finish_install(&target, package_name, prompter) {
            Ok(report) => Ok(report),
            Err(err) => {
                remove_dir_if_present(&target);
                self.forget_records(&displaced);
                Err(err.into())
            }
        }
    }

    fn finish_install(
        &self,
        target: &Path,
        package_name: &str,
        prompter: &dyn Prompter,
    ) -> anyhow::Result<InstallReport> {
        let metadata = match PackageMetadata::load_from_dir(target) {
            Ok(Some(metadata)) => Some(metadata),
            Ok(None) => {
                tracing::info!(package = package_name, "No mcp_package.json in package; using defaults");
                None
            }
            Err(err) => {
                tracing::warn!(
                    package = package_name,
                    error = %format!("{err:#}"),
                    "Ignoring unreadable package metadata"
                );
                None
            }
        };

        let mut inputs = InputValues::new();
        let mut steps = StepSummary::default();
        if let Some(metadata) = &metadata {
            for input in &metadata.install_inputs {
                let value = prompter
                    .input(input)
                    .with_context(|| format!("Failed to read value for input '{}'", input.name))?;
                inputs.insert(input.name.clone(), value);
            }
            steps = run_steps(
                StepPhase::Install,
                &metadata.install_steps,
                target,
                &inputs,
                prompter,
                self.executor,
            )?;
        }

        let (install_name, version) = match &metadata {
            Some(metadata) => (
                metadata.install_name_or(package_name).to_string(),
                metadata.version_or_unknown().to_string(),
            ),
            None => (
                package_name.to_string(),
                crate::package::UNKNOWN_VERSION.to_string(),
            ),
        };
        if install_name != package_name {
            tracing::warn!(
                package = package_name,
                install_name = %install_name,
                "Package declares a different install_name; recording it under install_name"
            );
        }

        self.store
            .upsert(&install_name, &version, target)
            .context("Failed to record installed package")?;
        if let Err(err) = self.store.store_input_values(&install_name, &inputs) {
            if let Err(cleanup) = self.store.remove(&install_name) {
                tracing::warn!(package = %install_name, error = %cleanup, "Failed to roll back package record");
            }
            return Err(anyhow::Error::new(err).context("Failed to store input values"));
        }

        Ok(InstallReport {
            package_name: package_name.to_string(),
            install_name,
            version,
            install_path: target.to_path_buf(),
            inputs,
            steps,
            metadata,
        })
    }

    fn replace_existing(&self, target: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.install_dir).with_context(|| {
            format!("Failed to create install directory: {}", self.install_dir.display())
        })?;
        if target.exists() {
            tracing::info!(path = %target.display(), "Removing existing install");
            std::fs::remove_dir_all(target).with_context(|| {
                format!("Failed to remove existing install: {}", target.display())
            })?;
        }
        Ok(())
    }

    fn records_at(&self, target: &Path) -> Vec<String> {
        match self.store.list_all() {
            Ok(packages) => packages
                .into_iter()
                .filter(|p| p.install_path == target)
                .map(|p| p.name)
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "Could not read package store");
                Vec::new()
            }
        }
    }

    /// Drop records whose directory was removed by a failed reinstall.
    fn forget_records(&self, names: &[String]) {
        for name in names {
            if let Err(err) = self.store.remove(name) {
                tracing::warn!(package = %name, error = %err, "Failed to remove stale package record");
            }
        }
    }
}

fn validate_package_name(name: &str) -> Result<(), InstallError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || Path::new(name).is_absolute();
    if invalid {
        return Err(InstallError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn discard_archive(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(err) = std::fs::remove_file(path) {
        tracing::warn!(archive = %path.display(), error = %err, "Failed to delete package archive");
    }
}

fn remove_dir_if_present(path: &Path) {
    if path.exists()
        && let Err(err) = std::fs::remove_dir_all(path)
    {
        tracing::warn!(path = %path.display(), error = %err, "Failed to clean up install directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_names_that_escape_install_dir() {
        for name in ["", "..", ".", "a/b", "..\\x", "/abs"] {
            assert!(
                matches!(validate_package_name(name), Err(InstallError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
        assert!(validate_package_name("calc-server").is_ok());
    }
}
