//! Interactive prompts and menus.
//!
//! Uses dialoguer for terminal UI prompts. Everything that only formats
//! text takes a writer so it can be tested without a terminal.

use std::io::{self, Write};

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Input, Password, Select, theme::ColorfulTheme};

use mcpm_core::catalog::{Catalog, truncate};
use mcpm_core::configure::{ConfigurablePackage, ConfigureAction};
use mcpm_core::package::scaffold::parse_args_list;
use mcpm_core::package::{InstallInput, LaunchKind, PackageMetadata, ScaffoldAnswers};
use mcpm_core::prompt::Prompter;
use mcpm_core::store::InstalledPackage;
use mcpm_core::vars::InputValues;

/// Prompter backed by the terminal.
///
/// Values given with `--input` are used without asking.
pub struct DialoguerPrompter {
    theme: ColorfulTheme,
    preset: InputValues,
}

impl DialoguerPrompter {
    pub fn new(preset: InputValues) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            preset,
        }
    }
}

impl Prompter for DialoguerPrompter {
    fn input(&self, input: &InstallInput) -> Result<String> {
        if let Some(value) = self.preset.get(&input.name) {
            return Ok(value.clone());
        }

        let prompt = input.prompt_text();
        if input.secret {
            let value = Password::with_theme(&self.theme)
                .with_prompt(prompt)
                .allow_empty_password(input.default.is_some())
                .interact()?;
            if value.is_empty()
                && let Some(default) = &input.default
            {
                return Ok(default.clone());
            }
            return Ok(value);
        }

        let mut field = Input::<String>::with_theme(&self.theme).with_prompt(prompt);
        if let Some(default) = &input.default {
            field = field.default(default.clone());
        }
        Ok(field.interact_text()?)
    }

    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(question)
            .default(default)
            .interact()?)
    }
}

/// An entry picked from the package list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntry {
    Package(usize),
    LocalOnly(usize),
    Server(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailAction {
    Install,
    Uninstall,
    Configure,
    Back,
    Exit,
}

/// Menu labels and the entries they stand for, in display order.
pub fn catalog_menu(catalog: &Catalog) -> Vec<(String, CatalogEntry)> {
    let mut items = Vec::new();
    for (i, row) in catalog.packages.iter().enumerate() {
        let marker = if row.installed() { "✓" } else { " " };
        items.push((
            format!(
                "{} {:<28} {:<10} {}",
                marker,
                truncate(&row.name, 28),
                truncate(row.display_version(), 10),
                truncate(&row.description, 40)
            ),
            CatalogEntry::Package(i),
        ));
    }
    for (i, row) in catalog.local_only.iter().enumerate() {
        items.push((
            format!(
                "✓ {:<28} {:<10} (local only)",
                truncate(&row.name, 28),
                truncate(&row.version, 10)
            ),
            CatalogEntry::LocalOnly(i),
        ));
    }
    for (i, row) in catalog.servers.iter().enumerate() {
        items.push((
            format!(
                "  {:<28} {:<10} {}",
                truncate(&row.registry_name, 28),
                "server",
                truncate(&row.description, 40)
            ),
            CatalogEntry::Server(i),
        ));
    }
    items
}

/// Pick an entry from the catalog; `None` when the user exits.
pub fn select_catalog_entry(catalog: &Catalog) -> Result<Option<CatalogEntry>> {
    let menu = catalog_menu(catalog);
    if menu.is_empty() {
        return Ok(None);
    }
    let mut labels: Vec<&str> = menu.iter().map(|(label, _)| label.as_str()).collect();
    labels.push("Exit");

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a package for details")
        .items(&labels)
        .default(0)
        .interact_opt()?;

    Ok(selection.and_then(|i| menu.get(i).map(|(_, entry)| *entry)))
}

/// Detail view shown for a selected package.
pub fn write_package_details<W: Write>(
    w: &mut W,
    name: &str,
    installed: Option<&InstalledPackage>,
    metadata: Option<&PackageMetadata>,
    fallback_description: &str,
) -> io::Result<()> {
    let field = |value: Option<&String>| -> String {
        value
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .unwrap_or("N/A")
            .to_string()
    };

    writeln!(w)?;
    writeln!(w, "{}", style(format!("  {name}")).bold().cyan())?;
    writeln!(w, "  ───────────────────────────")?;
    let description = metadata
        .and_then(|m| m.description.as_deref())
        .filter(|d| !d.is_empty())
        .unwrap_or(fallback_description);
    writeln!(w, "  Description: {}", description)?;
    if let Some(metadata) = metadata {
        writeln!(w, "  Author:      {}", field(metadata.author.as_ref()))?;
        writeln!(w, "  License:     {}", field(metadata.license.as_ref()))?;
        writeln!(w, "  Runtime:     {}", field(metadata.runtime.as_ref()))?;
        if let Some(url) = &metadata.source_url {
            writeln!(w, "  Source:      {}", url)?;
        }
        if let Some(url) = &metadata.homepage {
            writeln!(w, "  Homepage:    {}", url)?;
        }
        if metadata.has_ide_configs() {
            writeln!(w, "  Targets:     {}", metadata.supported_targets().join(", "))?;
        }
    }
    match installed {
        Some(package) => {
            writeln!(w, "  Status:      {}", style("Installed").green())?;
            writeln!(w, "  Version:     {}", package.version)?;
            writeln!(w, "  Path:        {}", package.install_path.display())?;
            writeln!(
                w,
                "  Installed:   {}",
                package.installed_at.format("%Y-%m-%d %H:%M:%S UTC")
            )?;
        }
        None => writeln!(w, "  Status:      Not installed")?,
    }
    writeln!(w)?;
    Ok(())
}

pub fn select_detail_action(installed: bool) -> Result<DetailAction> {
    let actions: Vec<(&str, DetailAction)> = if installed {
        vec![
            ("Uninstall this package", DetailAction::Uninstall),
            ("Configure for a target tool", DetailAction::Configure),
            ("Back to list", DetailAction::Back),
            ("Exit", DetailAction::Exit),
        ]
    } else {
        vec![
            ("Install this package", DetailAction::Install),
            ("Back to list", DetailAction::Back),
            ("Exit", DetailAction::Exit),
        ]
    };
    let labels: Vec<&str> = actions.iter().map(|(label, _)| *label).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    Ok(selection
        .and_then(|i| actions.get(i).map(|(_, action)| *action))
        .unwrap_or(DetailAction::Exit))
}

/// Pick one of the configurable packages; `None` cancels.
pub fn select_configurable_package(packages: &[ConfigurablePackage]) -> Result<Option<usize>> {
    let mut labels: Vec<String> = packages
        .iter()
        .map(|p| format!("{} (v{})", p.package.name, p.package.version))
        .collect();
    labels.push("Cancel".to_string());

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a package to configure")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    Ok(selection.filter(|&i| i < packages.len()))
}

pub fn select_target(targets: &[&str]) -> Result<Option<String>> {
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select target tool")
        .items(targets)
        .default(0)
        .interact_opt()?;
    Ok(selection.and_then(|i| targets.get(i).map(|t| t.to_string())))
}

pub fn select_action() -> Result<Option<ConfigureAction>> {
    let labels = ["Add/Update configuration", "Remove configuration"];
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Action")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    Ok(selection.map(|i| match i {
        0 => ConfigureAction::Add,
        _ => ConfigureAction::Remove,
    }))
}

/// Questions asked by `mcpm create` when no `mcp_package.json` exists.
pub struct CreateFlow<W: Write = io::Stdout> {
    default_name: String,
    writer: W,
    theme: ColorfulTheme,
}

impl CreateFlow<io::Stdout> {
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            default_name: default_name.into(),
            writer: io::stdout(),
            theme: ColorfulTheme::default(),
        }
    }
}

impl<W: Write> CreateFlow<W> {
    /// Ask whether to create the file, then collect the answers.
    ///
    /// `None` when the user declines.
    pub fn collect(&mut self) -> Result<Option<ScaffoldAnswers>> {
        let create = Confirm::with_theme(&self.theme)
            .with_prompt("No mcp_package.json found. Would you like to create one?")
            .default(true)
            .interact()?;
        if !create {
            return Ok(None);
        }

        let name = self.text("Package name", &self.default_name.clone())?;
        let description = self.text("Description", "")?;
        let version = self.text("Version", "0.1.0")?;
        let author = self.text("Author", "")?;
        let license = self.text("License", "MIT")?;

        let launch = if Confirm::with_theme(&self.theme)
            .with_prompt("Would you like to configure this package for Windsurf?")
            .default(true)
            .interact()?
        {
            Some(self.prompt_launch(&name)?)
        } else {
            None
        };

        let answers = ScaffoldAnswers {
            name,
            description,
            version,
            author,
            license,
            launch,
        };
        write_create_summary(&mut self.writer, &answers)?;
        Ok(Some(answers))
    }

    fn text(&self, prompt: &str, default: &str) -> Result<String> {
        Ok(Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()?)
    }

    fn prompt_launch(&self, name: &str) -> Result<LaunchKind> {
        let selection = Select::with_theme(&self.theme)
            .with_prompt("Command type")
            .items(LaunchKind::KINDS)
            .default(0)
            .interact()?;
        Ok(match selection {
            0 => LaunchKind::Docker {
                image: self.text("Docker image", &format!("mcp/{name}"))?,
            },
            1 => LaunchKind::Executable {
                path: self.text("Executable path", "./server")?,
            },
            2 => LaunchKind::Python {
                script: self.text("Python script path", "./server.py")?,
            },
            _ => LaunchKind::Custom {
                command: self.text("Command", "echo")?,
                args: parse_args_list(&self.text("Arguments (comma-separated)", "Hello, MCP!")?),
            },
        })
    }
}

pub fn write_create_summary<W: Write>(w: &mut W, answers: &ScaffoldAnswers) -> io::Result<()> {
    writeln!(w)?;
    writeln!(w, "{}", style("  Summary").bold())?;
    writeln!(w, "  ───────────────────────────")?;
    writeln!(w, "  Name:     {}", style(&answers.name).green())?;
    writeln!(w, "  Version:  {}", style(&answers.version).green())?;
    if !answers.author.is_empty() {
        writeln!(w, "  Author:   {}", style(&answers.author).green())?;
    }
    writeln!(w, "  License:  {}", style(&answers.license).green())?;
    let launch = match &answers.launch {
        Some(LaunchKind::Docker { image }) => format!("docker ({image})"),
        Some(LaunchKind::Executable { path }) => format!("executable ({path})"),
        Some(LaunchKind::Python { script }) => format!("python ({script})"),
        Some(LaunchKind::Custom { command, .. }) => format!("custom ({command})"),
        None => "not configured".to_string(),
    };
    writeln!(w, "  Launch:   {}", style(launch).green())?;
    writeln!(w)?;
    Ok(())
}
