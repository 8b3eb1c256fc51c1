//! mcpm - MCP package manager
//!
//! Usage:
//!   mcpm list               # Browse registry and installed packages
//!   mcpm install <name>     # Install a package from the registry
//!   mcpm uninstall <name>   # Remove an installed package
//!   mcpm configure          # Register a package with a target tool
//!   mcpm create             # Build a package archive from a directory
//!   mcpm publish <file>     # Upload an archive to the registry

mod interactive;
mod output;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcpm_core::catalog::Catalog;
use mcpm_core::config::McpmConfig;
use mcpm_core::configure::{ConfigurablePackage, ConfigureAction};
use mcpm_core::context::AppContext;
use mcpm_core::package::{METADATA_FILE_NAME, PackageMetadata, archive, scaffold};
use mcpm_core::prompt::{AssumeYes, Prompter, parse_input_arg};
use mcpm_core::registry::{LATEST_VERSION, PublishMetadata, RegistryClient};
use mcpm_core::uninstall::UninstallStatus;
use mcpm_core::vars::InputValues;

use crate::interactive::{CatalogEntry, CreateFlow, DetailAction, DialoguerPrompter};
use crate::output::OutputFormat;

const STEP_WARNING: &str = "Packages may declare shell commands that run during install and \
uninstall. Each command is shown and must be confirmed unless --yes is given.";

#[derive(Parser)]
#[command(name = "mcpm")]
#[command(about = "MCP package manager", long_about = None)]
struct Cli {
    /// Output format for commands that print data
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registry packages, registry servers and installed packages
    #[command(alias = "ls")]
    List {
        /// Print the list and exit instead of browsing it
        #[arg(long)]
        non_interactive: bool,

        /// Only show entries matching this term
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Install a package from the registry
    ///
    /// With --target, configures the registry server NAME for that target
    /// tool instead of installing a package.
    #[command(after_help = STEP_WARNING)]
    Install {
        /// Package (or server) name
        name: String,

        /// Target tool to configure a registry server for
        #[arg(short, long)]
        target: Option<String>,

        /// Version to download
        #[arg(long, default_value = LATEST_VERSION)]
        version: String,

        /// Value for a package input (repeatable)
        #[arg(long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,

        /// Run without prompting; steps run without confirmation
        #[arg(short, long)]
        yes: bool,

        /// Install from a local archive instead of the registry
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Uninstall a package
    #[command(alias = "rm", after_help = STEP_WARNING)]
    Uninstall {
        name: String,

        /// Only clean up this target tool's config
        #[arg(short, long)]
        target: Option<String>,

        /// Run without prompting
        #[arg(short, long)]
        yes: bool,
    },

    /// Add or remove a package in a target tool's MCP config
    Configure {
        /// Installed package name
        #[arg(short, long)]
        package: Option<String>,

        /// Target tool
        #[arg(short, long)]
        target: Option<String>,

        /// add or remove
        #[arg(short, long)]
        action: Option<ConfigureAction>,

        /// Fail instead of prompting for missing arguments
        #[arg(long)]
        non_interactive: bool,
    },

    /// Package a directory into an archive
    ///
    /// Offers to write mcp_package.json when the directory has none.
    Create {
        /// Output archive path (default: <name>-<version>.zip in the source directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory to package
        #[arg(short, long, default_value = ".")]
        source: PathBuf,
    },

    /// Upload a package archive to the registry
    Publish { file: PathBuf },

    /// List target tools and their config files
    Targets,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcpm=info,mcpm_core=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    let config = McpmConfig::load()?;
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::List {
            non_interactive,
            search,
        } => run_list(&ctx, format, non_interactive, search.as_deref()),
        Commands::Install {
            name,
            target,
            version,
            inputs,
            yes,
            file,
        } => {
            let inputs = parse_inputs(&inputs)?;
            let prompter = make_prompter(yes, inputs);
            match (file, target) {
                (Some(file), _) => run_install_file(&ctx, format, &file, &name, prompter.as_ref()),
                (None, Some(target)) => run_configure_server(&ctx, format, &name, &target),
                (None, None) => run_install(&ctx, format, &name, &version, prompter.as_ref()),
            }
        }
        Commands::Uninstall { name, target, yes } => {
            let prompter = make_prompter(yes, InputValues::new());
            run_uninstall(&ctx, format, &name, target.as_deref(), prompter.as_ref())
        }
        Commands::Configure {
            package,
            target,
            action,
            non_interactive,
        } => run_configure(&ctx, format, package, target, action, non_interactive),
        Commands::Create { output, source } => run_create(&source, output),
        Commands::Publish { file } => run_publish(&ctx, &file),
        Commands::Targets => {
            let targets = ctx.targets().all();
            match format {
                OutputFormat::Json => output::print_json(&targets),
                OutputFormat::Table => Ok(output::write_targets(&mut io::stdout(), &targets)?),
            }
        }
    }
}

fn parse_inputs(raw: &[String]) -> Result<InputValues> {
    let mut values = InputValues::new();
    for arg in raw {
        let (key, value) = parse_input_arg(arg)?;
        values.insert(key, value);
    }
    Ok(values)
}

fn make_prompter(yes: bool, inputs: InputValues) -> Box<dyn Prompter> {
    if yes {
        Box::new(AssumeYes::new(inputs))
    } else {
        Box::new(DialoguerPrompter::new(inputs))
    }
}

/// Build the catalog; an unreachable registry leaves only local rows.
fn load_catalog(ctx: &AppContext) -> Result<Catalog> {
    let (packages, servers) = match ctx.registry() {
        Ok(registry) => (
            registry
                .list_packages()
                .map_err(|err| {
                    tracing::warn!(error = %format!("{err:#}"), "Could not fetch packages");
                })
                .ok(),
            registry
                .list_servers()
                .map_err(|err| {
                    tracing::warn!(error = %format!("{err:#}"), "Could not fetch servers");
                })
                .ok(),
        ),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "Registry client unavailable");
            (None, None)
        }
    };
    Ok(Catalog::build(packages, servers, ctx.store().list_all()?))
}

fn run_list(
    ctx: &AppContext,
    format: OutputFormat,
    non_interactive: bool,
    search: Option<&str>,
) -> Result<()> {
    let filter = |catalog: Catalog| match search {
        Some(term) => catalog.search(term),
        None => catalog,
    };
    let catalog = filter(load_catalog(ctx)?);

    if format == OutputFormat::Json {
        return output::print_json(&catalog);
    }
    if non_interactive {
        output::write_catalog(&mut io::stdout(), &catalog)?;
        return Ok(());
    }

    let mut catalog = catalog;
    loop {
        if catalog.is_empty() {
            output::write_catalog(&mut io::stdout(), &catalog)?;
            return Ok(());
        }
        let Some(entry) = interactive::select_catalog_entry(&catalog)? else {
            return Ok(());
        };
        if !browse_entry(ctx, format, &catalog, entry)? {
            return Ok(());
        }
        catalog = filter(load_catalog(ctx)?);
    }
}

/// Show one entry and run the chosen action; `false` exits the browser.
fn browse_entry(
    ctx: &AppContext,
    format: OutputFormat,
    catalog: &Catalog,
    entry: CatalogEntry,
) -> Result<bool> {
    let (name, description, is_server) = match entry {
        CatalogEntry::Package(i) => {
            let row = &catalog.packages[i];
            (row.name.clone(), row.description.clone(), false)
        }
        CatalogEntry::LocalOnly(i) => (catalog.local_only[i].name.clone(), String::new(), false),
        CatalogEntry::Server(i) => {
            let row = &catalog.servers[i];
            (row.registry_name.clone(), row.description.clone(), true)
        }
    };

    let installed = ctx.store().get(&name)?;
    let metadata = installed
        .as_ref()
        .and_then(|p| PackageMetadata::load_from_dir(&p.install_path).ok().flatten());
    interactive::write_package_details(
        &mut io::stdout(),
        &name,
        installed.as_ref(),
        metadata.as_ref(),
        &description,
    )?;

    let prompter = DialoguerPrompter::new(InputValues::new());
    let result = match interactive::select_detail_action(installed.is_some())? {
        DetailAction::Back => return Ok(true),
        DetailAction::Exit => return Ok(false),
        DetailAction::Install if is_server => {
            let targets = ctx.targets().names();
            let targets: Vec<&str> = targets.iter().map(String::as_str).collect();
            match interactive::select_target(&targets)? {
                Some(target) => run_configure_server(ctx, format, &name, &target),
                None => Ok(()),
            }
        }
        DetailAction::Install => run_install(ctx, format, &name, LATEST_VERSION, &prompter),
        DetailAction::Uninstall => run_uninstall(ctx, format, &name, None, &prompter),
        DetailAction::Configure => run_configure(ctx, format, Some(name), None, None, false),
    };
    if let Err(err) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), err);
    }
    Ok(true)
}

fn run_install(
    ctx: &AppContext,
    format: OutputFormat,
    name: &str,
    version: &str,
    prompter: &dyn Prompter,
) -> Result<()> {
    let registry = ctx.registry()?;
    let report = ctx.install_from_registry(&registry, name, version, prompter)?;
    match format {
        OutputFormat::Json => output::print_json(&output::install_report_json(&report)),
        OutputFormat::Table => Ok(output::write_install_report(&mut io::stdout(), &report)?),
    }
}

fn run_install_file(
    ctx: &AppContext,
    format: OutputFormat,
    file: &Path,
    name: &str,
    prompter: &dyn Prompter,
) -> Result<()> {
    let report = ctx.install_from_file(file, name, prompter)?;
    match format {
        OutputFormat::Json => output::print_json(&output::install_report_json(&report)),
        OutputFormat::Table => Ok(output::write_install_report(&mut io::stdout(), &report)?),
    }
}

fn run_configure_server(
    ctx: &AppContext,
    format: OutputFormat,
    name: &str,
    target: &str,
) -> Result<()> {
    let registry = ctx.registry()?;
    let server = registry
        .find_server(name)?
        .ok_or_else(|| anyhow::anyhow!("Server '{}' not found in the registry", name))?;
    let report = ctx.configurator().configure_server(&server, target)?;
    match format {
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Table => Ok(output::write_configure_report(&mut io::stdout(), &report)?),
    }
}

fn run_uninstall(
    ctx: &AppContext,
    format: OutputFormat,
    name: &str,
    target: Option<&str>,
    prompter: &dyn Prompter,
) -> Result<()> {
    // Servers configured from the registry have no store record.
    if let Some(target) = target
        && !ctx.store().is_installed(name)?
    {
        let report = ctx.configurator().remove_server(name, target)?;
        return match format {
            OutputFormat::Json => output::print_json(&report),
            OutputFormat::Table => Ok(output::write_configure_report(&mut io::stdout(), &report)?),
        };
    }

    let report = ctx.uninstaller().uninstall(name, target, prompter)?;
    match format {
        OutputFormat::Json => output::print_json(&report)?,
        OutputFormat::Table => output::write_uninstall_report(&mut io::stdout(), &report)?,
    }
    if matches!(
        report.status,
        UninstallStatus::DirectoryRemovalFailed | UninstallStatus::RecordRemovalFailed
    ) {
        std::process::exit(1);
    }
    Ok(())
}

fn run_configure(
    ctx: &AppContext,
    format: OutputFormat,
    package: Option<String>,
    target: Option<String>,
    action: Option<ConfigureAction>,
    non_interactive: bool,
) -> Result<()> {
    let configurator = ctx.configurator();

    if non_interactive {
        let (Some(package), Some(target), Some(action)) = (package, target, action) else {
            anyhow::bail!("--package, --target and --action are required with --non-interactive");
        };
        let report = configurator.apply(&package, &target, action)?;
        return match format {
            OutputFormat::Json => output::print_json(&report),
            OutputFormat::Table => Ok(output::write_configure_report(&mut io::stdout(), &report)?),
        };
    }

    let packages = configurator.configurable_packages()?;
    if packages.is_empty() {
        println!("No installed packages declare target configurations.");
        return Ok(());
    }

    let selected: &ConfigurablePackage = match &package {
        Some(name) => packages
            .iter()
            .find(|p| &p.package.name == name)
            .ok_or_else(|| {
                anyhow::anyhow!("Package '{}' is not installed or has no target configurations", name)
            })?,
        None => match interactive::select_configurable_package(&packages)? {
            Some(index) => &packages[index],
            None => return Ok(()),
        },
    };

    let target = match target {
        Some(target) => target,
        None => match interactive::select_target(&selected.supported_targets())? {
            Some(target) => target,
            None => return Ok(()),
        },
    };

    let action = match action {
        Some(action) => action,
        None => match interactive::select_action()? {
            Some(action) => action,
            None => return Ok(()),
        },
    };

    let report = configurator.apply(&selected.package.name, &target, action)?;
    match format {
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Table => Ok(output::write_configure_report(&mut io::stdout(), &report)?),
    }
}

fn run_create(source: &Path, output: Option<PathBuf>) -> Result<()> {
    if !source.is_dir() {
        anyhow::bail!("Source directory does not exist: {}", source.display());
    }
    let dir_name = source
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "mcp-package".to_string());

    let metadata = match PackageMetadata::load_from_dir(source)? {
        Some(metadata) => {
            let missing = metadata.missing_required_fields();
            if !missing.is_empty() {
                anyhow::bail!(
                    "{} is missing required fields: {}",
                    METADATA_FILE_NAME,
                    missing.join(", ")
                );
            }
            metadata
        }
        None => {
            let Some(answers) = CreateFlow::new(dir_name.clone()).collect()? else {
                anyhow::bail!("{} is required to create a package", METADATA_FILE_NAME);
            };
            let metadata = scaffold::scaffold(&answers);
            metadata.save_to_dir(source)?;
            println!(
                "{} Created {}",
                style("✓").green(),
                source.join(METADATA_FILE_NAME).display()
            );
            metadata
        }
    };

    let output =
        output.unwrap_or_else(|| source.join(scaffold::default_archive_name(&metadata, &dir_name)));
    let created = archive::create(source, &output)
        .with_context(|| format!("Failed to package {}", source.display()))?;
    println!(
        "{} Created {} ({} files)",
        style("✓").green(),
        created.path.display(),
        created.file_count
    );
    Ok(())
}

fn run_publish(ctx: &AppContext, file: &Path) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("Package file not found: {}", file.display());
    }
    let metadata = archive::read_metadata(file)?;
    let publish = PublishMetadata::from_metadata(&metadata);
    let registry: RegistryClient = ctx.registry()?;
    registry.publish(file, &publish)?;
    println!(
        "{} Published {} {} to {}",
        style("✓").green(),
        publish.name,
        publish.version,
        registry.base_url()
    );
    Ok(())
}
