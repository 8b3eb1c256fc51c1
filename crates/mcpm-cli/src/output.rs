//! Table and JSON rendering of command results.

use std::io::{self, Write};

use clap::ValueEnum;
use console::style;
use serde::Serialize;

use mcpm_core::catalog::{Catalog, truncate};
use mcpm_core::configure::{ConfigureReport, ConfigureResult};
use mcpm_core::install::InstallReport;
use mcpm_core::steps::{StepOutcome, StepSummary};
use mcpm_core::target::{ResolvedTarget, TargetSource};
use mcpm_core::uninstall::{TargetCleanup, UninstallReport, UninstallStatus};

#[derive(Clone, Copy, ValueEnum, Default, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn write_catalog<W: Write>(w: &mut W, catalog: &Catalog) -> io::Result<()> {
    if !catalog.registry_available {
        writeln!(w, "{}", style("Registry unavailable; showing local packages only.").yellow())?;
        writeln!(w)?;
    }

    writeln!(w, "{}", style("Packages").bold())?;
    if catalog.packages.is_empty() {
        writeln!(w, "  No packages found.")?;
    } else {
        writeln!(
            w,
            "  {:<3} {:<28} {:<12} {:<20} Description",
            "", "Name", "Version", "Author"
        )?;
        for row in &catalog.packages {
            let marker = if row.installed() { "✓" } else { " " };
            writeln!(
                w,
                "  {:<3} {:<28} {:<12} {:<20} {}",
                marker,
                truncate(&row.name, 28),
                truncate(row.display_version(), 12),
                truncate(&row.author, 20),
                truncate(&row.description, 50)
            )?;
        }
    }

    if !catalog.local_only.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", style("Installed (not in registry)").bold())?;
        for row in &catalog.local_only {
            writeln!(
                w,
                "  ✓   {:<28} {:<12} {}",
                truncate(&row.name, 28),
                truncate(&row.version, 12),
                row.install_path.display()
            )?;
        }
    }

    writeln!(w)?;
    writeln!(w, "{}", style("Servers").bold())?;
    if catalog.servers.is_empty() {
        writeln!(w, "  No servers found.")?;
    } else {
        for row in &catalog.servers {
            let marker = if row.installed_version.is_some() { "✓" } else { " " };
            writeln!(
                w,
                "  {:<3} {:<28} {}",
                marker,
                truncate(&row.registry_name, 28),
                truncate(&row.description, 60)
            )?;
        }
    }
    Ok(())
}

pub fn write_targets<W: Write>(w: &mut W, targets: &[ResolvedTarget]) -> io::Result<()> {
    writeln!(w, "{:<16} {:<10} Config file", "Target", "Source")?;
    writeln!(w, "{}", "-".repeat(70))?;
    for target in targets {
        let source = match target.source {
            TargetSource::Default => "default",
            TargetSource::Override => "override",
        };
        let exists = if target.config_path.exists() { "" } else { " (missing)" };
        writeln!(
            w,
            "{:<16} {:<10} {}{}",
            target.name,
            source,
            target.config_path.display(),
            exists
        )?;
    }
    Ok(())
}

fn write_steps<W: Write>(w: &mut W, steps: &StepSummary) -> io::Result<()> {
    if steps.is_empty() {
        return Ok(());
    }
    writeln!(
        w,
        "  Steps: {} ran, {} failed, {} skipped, {} unsupported",
        steps.ran, steps.failed, steps.skipped, steps.unsupported
    )?;
    for record in &steps.records {
        let command = record.command.as_deref().unwrap_or("-");
        match &record.outcome {
            StepOutcome::Failed { code } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                writeln!(w, "  ⚠ Step {} exited with {}: {}", record.index, code, command)?;
            }
            StepOutcome::Errored { message } => {
                writeln!(w, "  ⚠ Step {} could not run: {}", record.index, message)?;
            }
            _ => {}
        }
    }
    Ok(())
}

pub fn write_install_report<W: Write>(w: &mut W, report: &InstallReport) -> io::Result<()> {
    writeln!(
        w,
        "✓ Installed '{}' ({}) to {}",
        report.install_name,
        report.version,
        report.install_path.display()
    )?;
    if report.metadata.is_none() {
        writeln!(w, "  No mcp_package.json found; recorded with default values")?;
    }
    write_steps(w, &report.steps)?;
    if let Some(metadata) = &report.metadata
        && metadata.has_ide_configs()
    {
        writeln!(
            w,
            "  Configure it with: mcpm configure -p {} -t <{}>",
            report.install_name,
            metadata.supported_targets().join("|")
        )?;
    }
    Ok(())
}

/// JSON view of an install; input values are left out.
pub fn install_report_json(report: &InstallReport) -> serde_json::Value {
    serde_json::json!({
        "package": report.package_name,
        "install_name": report.install_name,
        "version": report.version,
        "install_path": report.install_path,
        "inputs": report.inputs.keys().collect::<Vec<_>>(),
        "steps": report.steps,
        "has_metadata": report.metadata.is_some(),
    })
}

pub fn write_uninstall_report<W: Write>(w: &mut W, report: &UninstallReport) -> io::Result<()> {
    match report.status {
        UninstallStatus::NotInstalled => {
            writeln!(w, "Package '{}' is not installed.", report.package)?;
            return Ok(());
        }
        UninstallStatus::Uninstalled => {
            writeln!(w, "✓ Uninstalled '{}'", report.package)?;
        }
        UninstallStatus::DirectoryRemovalFailed => {
            writeln!(
                w,
                "✗ Could not finish uninstalling '{}'; the package is still recorded as installed",
                report.package
            )?;
        }
        UninstallStatus::RecordRemovalFailed => {
            writeln!(
                w,
                "✗ Removed the files of '{}' but could not delete its package record",
                report.package
            )?;
        }
    }
    write_steps(w, &report.steps)?;
    for target in &report.targets {
        match &target.cleanup {
            TargetCleanup::Removed => {
                writeln!(w, "  Removed configuration from {}", target.target)?;
            }
            TargetCleanup::Kept => {
                writeln!(w, "  Kept configuration in {}", target.target)?;
            }
            TargetCleanup::NotDeclared => {
                writeln!(w, "  Package has no configuration for {}", target.target)?;
            }
            _ => {}
        }
    }
    for warning in &report.warnings {
        writeln!(w, "  ⚠ {}", warning)?;
    }
    Ok(())
}

pub fn write_configure_report<W: Write>(w: &mut W, report: &ConfigureReport) -> io::Result<()> {
    match &report.result {
        ConfigureResult::Added {
            replaced,
            backup_path,
        } => {
            let verb = if *replaced { "Updated" } else { "Added" };
            writeln!(
                w,
                "✓ {} '{}' in {} ({})",
                verb,
                report.server_key,
                report.target,
                report.config_path.display()
            )?;
            if let Some(backup) = backup_path {
                writeln!(
                    w,
                    "  ⚠ Existing config could not be parsed; original saved to {}",
                    backup.display()
                )?;
            }
        }
        ConfigureResult::Removed => {
            writeln!(
                w,
                "✓ Removed '{}' from {} ({})",
                report.server_key,
                report.target,
                report.config_path.display()
            )?;
        }
        ConfigureResult::AlreadyAbsent => {
            writeln!(
                w,
                "• '{}' is not configured in {}; nothing to remove",
                report.server_key, report.target
            )?;
        }
    }
    Ok(())
}
