//! mcpm core library
//!
//! Installs MCP server packages from a registry into a local directory,
//! tracks them in a SQLite store, and registers them with the JSON config
//! files of target tools such as Windsurf, Cursor and Claude Desktop.

pub mod catalog;
pub mod config;
pub mod configure;
pub mod context;
pub mod install;
pub mod package;
pub mod prompt;
pub mod registry;
pub mod steps;
pub mod store;
pub mod target;
pub mod uninstall;
pub mod vars;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::McpmConfig;
    pub use crate::context::AppContext;

    // Packages
    pub use crate::package::{InstallInput, PackageMetadata, PackageStep};
    pub use crate::store::{InstalledPackage, PackageStore, StoreError};

    // Operations
    pub use crate::configure::{ConfigureAction, Configurator};
    pub use crate::install::{InstallError, InstallReport, PackageInstaller};
    pub use crate::uninstall::{PackageUninstaller, UninstallReport, UninstallStatus};

    // Targets
    pub use crate::target::{TargetConfigMerger, TargetRegistry};

    // Seams
    pub use crate::prompt::{AssumeYes, Prompter};
    pub use crate::steps::{ShellExecutor, StepExecutor, StepOutput};
    pub use crate::vars::InputValues;

    // Registry
    pub use crate::registry::{RegistryClient, RegistryPackage, RegistryServer};
}
