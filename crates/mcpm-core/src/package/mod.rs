//! MCP server packages: metadata, archives and scaffolding.

pub mod archive;
pub mod metadata;
pub mod scaffold;

pub use metadata::{
    InstallInput, METADATA_FILE_NAME, PackageMetadata, PackageStep, UNKNOWN_VERSION,
};
pub use scaffold::{LaunchKind, ScaffoldAnswers};
