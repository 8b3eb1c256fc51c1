//! Default `mcp_package.json` for a new package source tree.

use serde_json::{Map, Value, json};

use super::metadata::PackageMetadata;

/// Target that scaffolded packages are configured for.
pub const SCAFFOLD_TARGET: &str = "windsurf";

/// How the server is launched by the target tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchKind {
    /// `docker run -i --rm <image>`
    Docker { image: String },
    /// A binary shipped with the package
    Executable { path: String },
    /// `python <script>`
    Python { script: String },
    Custom { command: String, args: Vec<String> },
}

impl LaunchKind {
    pub const KINDS: &'static [&'static str] = &["docker", "executable", "python", "custom"];

    /// Target config snippet for this launch kind.
    pub fn snippet(&self) -> Value {
        match self {
            LaunchKind::Docker { image } => json!({
                "command": "docker",
                "args": ["run", "-i", "--rm", image],
            }),
            LaunchKind::Executable { path } => json!({
                "command": path,
                "args": [],
            }),
            LaunchKind::Python { script } => json!({
                "command": "python",
                "args": [script],
            }),
            LaunchKind::Custom { command, args } => json!({
                "command": command,
                "args": args,
            }),
        }
    }
}

/// Split a comma separated argument list, dropping empty items.
pub fn parse_args_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(str::to_string)
        .collect()
}

/// Answers collected by `mcpm create`.
#[derive(Debug, Clone)]
pub struct ScaffoldAnswers {
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub license: String,
    /// `None` leaves a placeholder `echo` command
    pub launch: Option<LaunchKind>,
}

/// Build metadata for a new package.
pub fn scaffold(answers: &ScaffoldAnswers) -> PackageMetadata {
    let snippet = answers.launch.as_ref().map_or_else(
        || json!({"command": "echo", "args": ["No command specified"]}),
        LaunchKind::snippet,
    );
    let mut ide_config_commands = Map::new();
    ide_config_commands.insert(SCAFFOLD_TARGET.to_string(), snippet);

    PackageMetadata {
        name: Some(answers.name.clone()),
        install_name: Some(answers.name.clone()),
        version: Some(answers.version.clone()),
        description: Some(answers.description.clone()),
        author: Some(answers.author.clone()),
        license: Some(answers.license.clone()),
        runtime: Some("generic".to_string()),
        ide_config_commands,
        ..PackageMetadata::default()
    }
}

/// `<name>-<version>.zip`, the default output of `mcpm create`.
pub fn default_archive_name(metadata: &PackageMetadata, fallback_name: &str) -> String {
    let name = metadata.name.as_deref().unwrap_or(fallback_name);
    let version = metadata.version.as_deref().unwrap_or("0.1.0");
    format!("{name}-{version}.zip")
}
