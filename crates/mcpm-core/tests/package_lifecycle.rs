//! End-to-end package lifecycle
//!
//! Scaffold a package directory, pack it, install the archive through
//! `AppContext`, register it with a target tool and uninstall it again.

mod support;

use mcpm_core::configure::ConfigureAction;
use mcpm_core::context::AppContext;
use mcpm_core::package::scaffold::{default_archive_name, scaffold};
use mcpm_core::package::{LaunchKind, METADATA_FILE_NAME, PackageMetadata, ScaffoldAnswers, archive};
use mcpm_core::uninstall::{TargetCleanup, UninstallStatus};
use serde_json::Value;

use support::{RecordingExecutor, Sandbox, ScriptedPrompter};

fn answers() -> ScaffoldAnswers {
    ScaffoldAnswers {
        name: "weather".into(),
        description: "Forecasts".into(),
        version: "0.3.0".into(),
        author: "Ada".into(),
        license: "MIT".into(),
        launch: Some(LaunchKind::Python {
            script: "./server.py".into(),
        }),
    }
}

#[test]
fn scaffold_pack_install_configure_uninstall() {
    let sandbox = Sandbox::new();
    let source = sandbox.path().join("src/weather");
    std::fs::create_dir_all(source.join("__pycache__")).unwrap();
    std::fs::write(source.join("server.py"), "print('forecast')").unwrap();
    std::fs::write(source.join("__pycache__/server.cpython.pyc"), "bytecode").unwrap();

    let metadata = scaffold(&answers());
    metadata.save_to_dir(&source).unwrap();
    let output = source.join(default_archive_name(&metadata, "weather"));
    assert!(output.ends_with("weather-0.3.0.zip"));

    let created = archive::create(&source, &output).unwrap();
    assert_eq!(created.file_count, 2);

    let packed = archive::read_metadata(&output).unwrap();
    assert_eq!(packed.name.as_deref(), Some("weather"));
    assert_eq!(packed.version.as_deref(), Some("0.3.0"));

    let ctx = AppContext::with_executor(sandbox.config(), Box::new(RecordingExecutor::default()))
        .unwrap();
    let prompter = ScriptedPrompter::accepting();
    let report = ctx.install_from_file(&output, "weather", &prompter).unwrap();
    let install_path = sandbox.install_dir().join("weather");
    assert_eq!(report.install_path, install_path);
    assert!(install_path.join("server.py").is_file());
    assert!(install_path.join(METADATA_FILE_NAME).is_file());
    assert!(!install_path.join("__pycache__").exists());

    let configured = ctx
        .configurator()
        .apply("weather", "windsurf", ConfigureAction::Add)
        .unwrap();
    let content = std::fs::read_to_string(&configured.config_path).unwrap();
    let written: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(written["mcpServers"]["weather"]["command"], "python");
    assert_eq!(written["mcpServers"]["weather"]["args"][0], "./server.py");

    let removed = ctx
        .uninstaller()
        .uninstall("weather", Some("windsurf"), &prompter)
        .unwrap();
    assert_eq!(removed.status, UninstallStatus::Uninstalled);
    assert_eq!(removed.targets[0].cleanup, TargetCleanup::Removed);
    assert!(!install_path.exists());
    assert!(!ctx.store().is_installed("weather").unwrap());

    let content = std::fs::read_to_string(&configured.config_path).unwrap();
    let written: Value = serde_json::from_str(&content).unwrap();
    assert!(written["mcpServers"].get("weather").is_none());
}

#[test]
fn scaffolded_metadata_reloads_from_disk() {
    let sandbox = Sandbox::new();
    let metadata = scaffold(&ScaffoldAnswers {
        launch: None,
        ..answers()
    });
    metadata.save_to_dir(sandbox.path()).unwrap();

    let loaded = PackageMetadata::load_from_dir(sandbox.path())
        .unwrap()
        .unwrap();

    assert_eq!(loaded, metadata);
    assert!(loaded.missing_required_fields().is_empty());
    assert_eq!(loaded.ide_config("windsurf").unwrap()["command"], "echo");
}
