//! Integration tests for Configurator
//!
//! Covers adding installed packages to target tools, removing them again,
//! and writing registry server entries.

mod support;

use mcpm_core::configure::{ConfigureAction, ConfigureResult, Configurator};
use mcpm_core::install::PackageInstaller;
use mcpm_core::registry::RegistryServer;
use serde_json::{Map, Value, json};

use support::{RecordingExecutor, Sandbox, ScriptedPrompter, write_archive};

fn install_with(sandbox: &Sandbox, name: &str, metadata: &Value, prompter: &ScriptedPrompter) {
    let executor = RecordingExecutor::default();
    let archive = write_archive(
        &sandbox.downloads(),
        &format!("{name}.zip"),
        &[("mcp_package.json", metadata.to_string().as_str())],
    );
    PackageInstaller::new(sandbox.install_dir(), &sandbox.store, &executor)
        .install(&archive, name, prompter)
        .unwrap();
}

fn read_servers(sandbox: &Sandbox, target: &str) -> Value {
    let content = std::fs::read_to_string(sandbox.target_config(target)).unwrap();
    serde_json::from_str::<Value>(&content).unwrap()["mcpServers"].clone()
}

fn gh_metadata() -> Value {
    json!({
        "name": "gh",
        "version": "1.0.0",
        "install_inputs": [{"name": "TOKEN", "secret": true}],
        "ide_config_commands": {
            "windsurf": {
                "command": "node",
                "args": ["index.js"],
                "path": ".",
                "env": {"GITHUB_TOKEN": "${TOKEN}"}
            }
        }
    })
}

#[test]
fn add_uses_stored_inputs_and_install_path() {
    let sandbox = Sandbox::new();
    install_with(
        &sandbox,
        "gh",
        &gh_metadata(),
        &ScriptedPrompter::accepting().with_input("TOKEN", "secret123"),
    );

    let report = Configurator::new(&sandbox.store, &sandbox.targets)
        .apply("gh", "windsurf", ConfigureAction::Add)
        .unwrap();

    assert_eq!(report.server_key, "gh");
    assert!(matches!(
        report.result,
        ConfigureResult::Added {
            replaced: false,
            backup_path: None
        }
    ));
    let servers = read_servers(&sandbox, "windsurf");
    assert_eq!(servers["gh"]["env"]["GITHUB_TOKEN"], "secret123");
    assert_eq!(
        servers["gh"]["path"],
        sandbox.install_dir().join("gh").to_string_lossy().into_owned()
    );
}

#[test]
fn remove_twice_is_harmless() {
    let sandbox = Sandbox::new();
    install_with(
        &sandbox,
        "gh",
        &gh_metadata(),
        &ScriptedPrompter::accepting().with_input("TOKEN", "t"),
    );
    let configurator = Configurator::new(&sandbox.store, &sandbox.targets);
    configurator
        .apply("gh", "windsurf", ConfigureAction::Add)
        .unwrap();

    let first = configurator
        .apply("gh", "windsurf", ConfigureAction::Remove)
        .unwrap();
    let second = configurator
        .apply("gh", "windsurf", ConfigureAction::Remove)
        .unwrap();

    assert_eq!(first.result, ConfigureResult::Removed);
    assert_eq!(second.result, ConfigureResult::AlreadyAbsent);
    assert!(read_servers(&sandbox, "windsurf").get("gh").is_none());
}

#[test]
fn unsupported_target_is_rejected() {
    let sandbox = Sandbox::new();
    install_with(
        &sandbox,
        "gh",
        &gh_metadata(),
        &ScriptedPrompter::accepting().with_input("TOKEN", "t"),
    );

    let err = Configurator::new(&sandbox.store, &sandbox.targets)
        .apply("gh", "cursor", ConfigureAction::Add)
        .unwrap_err();

    assert!(err.to_string().contains("windsurf"));
    assert!(!sandbox.target_config("cursor").exists());
}

#[test]
fn unknown_target_and_package_are_errors() {
    let sandbox = Sandbox::new();
    let configurator = Configurator::new(&sandbox.store, &sandbox.targets);

    let err = configurator
        .apply("ghost", "windsurf", ConfigureAction::Add)
        .unwrap_err();
    assert!(err.to_string().contains("not installed"));

    install_with(
        &sandbox,
        "gh",
        &gh_metadata(),
        &ScriptedPrompter::accepting().with_input("TOKEN", "t"),
    );
    let err = configurator
        .apply("gh", "emacs", ConfigureAction::Add)
        .unwrap_err();
    assert!(err.to_string().contains("Unknown target tool"));
}

#[test]
fn only_packages_with_target_configs_are_listed() {
    let sandbox = Sandbox::new();
    install_with(
        &sandbox,
        "gh",
        &gh_metadata(),
        &ScriptedPrompter::accepting().with_input("TOKEN", "t"),
    );
    install_with(
        &sandbox,
        "plain",
        &json!({"name": "plain", "version": "0.1.0"}),
        &ScriptedPrompter::accepting(),
    );

    let packages = Configurator::new(&sandbox.store, &sandbox.targets)
        .configurable_packages()
        .unwrap();

    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].package.name, "gh");
    assert_eq!(packages[0].supported_targets(), vec!["windsurf"]);
}

#[test]
fn registry_server_is_written_under_its_own_key() {
    let sandbox = Sandbox::new();
    let server = RegistryServer {
        registry_name: "github".into(),
        description: None,
        config_command: Some(
            json!({"mcpServers": {"github-mcp": {"command": "docker", "args": ["run", "gh"]}}})
                .to_string(),
        ),
        extra: Map::new(),
    };
    let configurator = Configurator::new(&sandbox.store, &sandbox.targets);

    let report = configurator.configure_server(&server, "cursor").unwrap();

    assert_eq!(report.server_key, "github-mcp");
    let servers = read_servers(&sandbox, "cursor");
    assert_eq!(servers["github-mcp"]["command"], "docker");

    let removed = configurator.remove_server("github-mcp", "cursor").unwrap();
    assert_eq!(removed.result, ConfigureResult::Removed);
    assert!(read_servers(&sandbox, "cursor").get("github-mcp").is_none());
}

#[test]
fn server_without_config_command_is_an_error() {
    let sandbox = Sandbox::new();
    let server = RegistryServer {
        registry_name: "bare".into(),
        description: None,
        config_command: None,
        extra: Map::new(),
    };

    let err = Configurator::new(&sandbox.store, &sandbox.targets)
        .configure_server(&server, "windsurf")
        .unwrap_err();

    assert!(err.to_string().contains("configuration command"));
}
