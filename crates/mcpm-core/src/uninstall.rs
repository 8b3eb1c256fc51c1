//! Reversing an install.
//!
//! Order matters: uninstall steps run first (they may need the package
//! files), then target config entries are removed, then the directory, and
//! the store record goes last. A failed directory deletion keeps the
//! record, so the uninstall can be retried.

use std::path::PathBuf;

use serde::Serialize;

use crate::package::PackageMetadata;
use crate::prompt::Prompter;
use crate::steps::{StepExecutor, StepPhase, StepSummary, run_steps};
use crate::store::PackageStore;
use crate::target::{RemoveOutcome, TargetConfigMerger, TargetRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UninstallStatus {
    /// No store record; nothing was touched
    NotInstalled,
    /// Directory and store record are gone
    Uninstalled,
    /// The directory could not be deleted; the record was kept
    DirectoryRemovalFailed,
    /// Files and config entries are gone but the store record could not be
    /// deleted
    RecordRemovalFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TargetCleanup {
    Removed,
    /// Config file or entry was already absent
    NotPresent,
    /// The package metadata has no config for this target
    NotDeclared,
    /// The user chose to keep the entry
    Kept,
    UnknownTarget,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetCleanupRecord {
    pub target: String,
    pub config_path: Option<PathBuf>,
    pub cleanup: TargetCleanup,
}

#[derive(Debug, Clone, Serialize)]
pub struct UninstallReport {
    pub package: String,
    pub status: UninstallStatus,
    pub install_path: Option<PathBuf>,
    pub steps: StepSummary,
    pub targets: Vec<TargetCleanupRecord>,
    pub record_removed: bool,
    /// Non-fatal problems met along the way
    pub warnings: Vec<String>,
}

impl UninstallReport {
    fn new(package: &str) -> Self {
        Self {
            package: package.to_string(),
            status: UninstallStatus::NotInstalled,
            install_path: None,
            steps: StepSummary::default(),
            targets: Vec::new(),
            record_removed: false,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        tracing::warn!(package = %self.package, "{}", message);
        self.warnings.push(message);
    }
}

/// Removes installed packages.
pub struct PackageUninstaller<'a> {
    store: &'a PackageStore,
    targets: &'a TargetRegistry,
    merger: TargetConfigMerger,
    executor: &'a dyn StepExecutor,
}

impl<'a> PackageUninstaller<'a> {
    pub fn new(
        store: &'a PackageStore,
        targets: &'a TargetRegistry,
        executor: &'a dyn StepExecutor,
    ) -> Self {
        Self {
            store,
            targets,
            merger: TargetConfigMerger::new(),
            executor,
        }
    }

    /// Uninstall `name`.
    ///
    /// With `target`, that target's entry is removed when the package
    /// declares a config for it. Without one, every known target that has
    /// an entry under the package's key is offered for cleanup through
    /// `prompter`.
    ///
    /// Only a failure to read the store record is returned as an error;
    /// every later failure is collected in the report.
    pub fn uninstall(
        &self,
        name: &str,
        target: Option<&str>,
        prompter: &dyn Prompter,
    ) -> anyhow::Result<UninstallReport> {
        let mut report = UninstallReport::new(name);

        let Some(record) = self.store.get(name)? else {
            tracing::warn!(package = name, "Package is not installed");
            return Ok(report);
        };
        let install_path = record.install_path.clone();
        report.install_path = Some(install_path.clone());

        let metadata = if install_path.is_dir() {
            match PackageMetadata::load_from_dir(&install_path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    report.warn(format!("Could not read package metadata: {err:#}"));
                    None
                }
            }
        } else {
            report.warn(format!(
                "Install directory {} is missing",
                install_path.display()
            ));
            None
        };

        if let Some(metadata) = &metadata {
            if metadata.install_name_or(name) != name {
                tracing::warn!(
                    package = name,
                    install_name = metadata.install_name_or(name),
                    "Metadata install_name differs from the store key; using the store key"
                );
            }
            self.run_uninstall_steps(name, metadata, &install_path, prompter, &mut report);
        }

        match target {
            Some(target) => {
                let record = self.cleanup_declared_target(name, target, metadata.as_ref());
                self.push_cleanup(&mut report, record);
            }
            None => self.cleanup_configured_targets(name, prompter, &mut report),
        }

        if install_path.exists() {
            if let Err(err) = std::fs::remove_dir_all(&install_path) {
                report.warn(format!(
                    "Failed to remove package directory {}: {}; keeping the package record so the uninstall can be retried",
                    install_path.display(),
                    err
                ));
                report.status = UninstallStatus::DirectoryRemovalFailed;
                return Ok(report);
            }
            tracing::info!(package = name, path = %install_path.display(), "Removed package directory");
        }

        match self.store.remove(name) {
            Ok(removed) => {
                report.record_removed = removed;
                report.status = UninstallStatus::Uninstalled;
                tracing::info!(package = name, "Uninstalled package");
            }
            Err(err) => {
                report.warn(format!("Failed to remove package record: {err}"));
                report.status = UninstallStatus::RecordRemovalFailed;
            }
        }
        Ok(report)
    }

    /// Known targets whose config file has an entry for `name`.
    pub fn configured_targets(&self, name: &str) -> Vec<(String, PathBuf)> {
        self.targets
            .all()
            .into_iter()
            .filter(|t| {
                self.merger
                    .contains_entry(&t.config_path, name)
                    .unwrap_or_else(|err| {
                        tracing::debug!(
                            target = %t.name,
                            error = %format!("{err:#}"),
                            "Could not inspect target config"
                        );
                        false
                    })
            })
            .map(|t| (t.name, t.config_path))
            .collect()
    }

    fn run_uninstall_steps(
        &self,
        name: &str,
        metadata: &PackageMetadata,
        install_path: &std::path::Path,
        prompter: &dyn Prompter,
        report: &mut UninstallReport,
    ) {
        if metadata.uninstall_steps.is_empty() {
            return;
        }
        let inputs = match self.store.get_input_values(name) {
            Ok(inputs) => inputs,
            Err(err) => {
                report.warn(format!("Could not read stored input values: {err}"));
                Default::default()
            }
        };
        match run_steps(
            StepPhase::Uninstall,
            &metadata.uninstall_steps,
            install_path,
            &inputs,
            prompter,
            self.executor,
        ) {
            Ok(summary) => {
                if summary.failed > 0 {
                    report.warn(format!("{} uninstall step(s) failed", summary.failed));
                }
                report.steps = summary;
            }
            Err(err) => report.warn(format!("Uninstall steps stopped: {err:#}")),
        }
    }

    fn cleanup_declared_target(
        &self,
        name: &str,
        target: &str,
        metadata: Option<&PackageMetadata>,
    ) -> TargetCleanupRecord {
        let Some(config_path) = self.targets.resolve(target) else {
            return TargetCleanupRecord {
                target: target.to_string(),
                config_path: None,
                cleanup: TargetCleanup::UnknownTarget,
            };
        };

        let declared = metadata.is_some_and(|m| m.ide_config(target).is_some());
        let cleanup = if declared {
            self.remove_entry(&config_path, name)
        } else {
            tracing::info!(
                package = name,
                target,
                "Package declares no config for target; leaving it alone"
            );
            TargetCleanup::NotDeclared
        };

        TargetCleanupRecord {
            target: target.to_string(),
            config_path: Some(config_path),
            cleanup,
        }
    }

    fn cleanup_configured_targets(
        &self,
        name: &str,
        prompter: &dyn Prompter,
        report: &mut UninstallReport,
    ) {
        for (target, config_path) in self.configured_targets(name) {
            let question =
                format!("Package '{name}' is configured for {target}. Remove configuration?");
            let cleanup = match prompter.confirm(&question, true) {
                Ok(true) => self.remove_entry(&config_path, name),
                Ok(false) => TargetCleanup::Kept,
                Err(err) => TargetCleanup::Failed {
                    message: format!("{err:#}"),
                },
            };
            self.push_cleanup(
                report,
                TargetCleanupRecord {
                    target,
                    config_path: Some(config_path),
                    cleanup,
                },
            );
        }
    }

    fn remove_entry(&self, config_path: &std::path::Path, name: &str) -> TargetCleanup {
        match self.merger.remove(config_path, name) {
            Ok(RemoveOutcome::Removed) => TargetCleanup::Removed,
            Ok(RemoveOutcome::FileMissing | RemoveOutcome::NotPresent) => TargetCleanup::NotPresent,
            Err(err) => TargetCleanup::Failed {
                message: format!("{err:#}"),
            },
        }
    }

    fn push_cleanup(&self, report: &mut UninstallReport, record: TargetCleanupRecord) {
        match &record.cleanup {
            TargetCleanup::UnknownTarget => {
                report.warn(format!("Unknown target tool '{}'", record.target));
            }
            TargetCleanup::Failed { message } => {
                report.warn(format!(
                    "Failed to remove configuration from {}: {}",
                    record.target, message
                ));
            }
            _ => {}
        }
        report.targets.push(record);
    }
}
