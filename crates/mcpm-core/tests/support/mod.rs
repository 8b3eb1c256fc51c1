//! Shared fixtures for the integration tests.
//!
//! Every test works inside its own `TempDir`: the store is a file in it,
//! packages install under it and every target tool's config path is
//! overridden to point into it, so nothing on the real machine is read or
//! written.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use mcpm_core::config::McpmConfig;
use mcpm_core::package::InstallInput;
use mcpm_core::prompt::Prompter;
use mcpm_core::steps::{StepExecutor, StepOutput};
use mcpm_core::store::PackageStore;
use mcpm_core::target::{TargetRegistry, builtin_targets};
use tempfile::TempDir;

/// Build a zip archive in memory from `(path, contents)` pairs.
pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in files {
            zip.start_file(*name, options)
                .expect("Failed to start zip entry");
            zip.write_all(contents.as_bytes())
                .expect("Failed to write zip entry");
        }
        zip.finish().expect("Failed to finish zip");
    }
    buf.into_inner()
}

/// Write an archive with `files` to `dir/<file_name>` and return its path.
pub fn write_archive(dir: &Path, file_name: &str, files: &[(&str, &str)]) -> PathBuf {
    std::fs::create_dir_all(dir).expect("Failed to create archive dir");
    let path = dir.join(file_name);
    std::fs::write(&path, zip_bytes(files)).expect("Failed to write archive");
    path
}

/// A minimal `mcp_package.json` with a windsurf config.
pub fn metadata_json(name: &str, version: &str) -> String {
    serde_json::json!({
        "name": name,
        "install_name": name,
        "version": version,
        "ide_config_commands": {
            "windsurf": {"command": "python", "args": ["server.py"], "path": "."}
        }
    })
    .to_string()
}

/// Temp workspace with a store, an install dir and isolated targets.
pub struct Sandbox {
    pub temp: TempDir,
    pub store: PackageStore,
    pub targets: TargetRegistry,
}

impl Sandbox {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = PackageStore::open_initialized(&temp.path().join("mcpm.db"))
            .expect("Failed to open store");
        let overrides: BTreeMap<String, PathBuf> = builtin_targets()
            .iter()
            .map(|t| {
                (
                    t.name.to_string(),
                    temp.path().join("targets").join(t.name).join("mcp.json"),
                )
            })
            .collect();
        Self {
            temp,
            store,
            targets: TargetRegistry::new(overrides),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn install_dir(&self) -> PathBuf {
        self.temp.path().join("packages")
    }

    pub fn downloads(&self) -> PathBuf {
        self.temp.path().join("downloads")
    }

    pub fn target_config(&self, target: &str) -> PathBuf {
        self.targets.resolve(target).expect("known target")
    }

    /// Config rooted in this sandbox, for `AppContext` tests.
    pub fn config(&self) -> McpmConfig {
        let mut config = McpmConfig::with_home(self.temp.path().join("home"));
        config.install_dir = self.install_dir();
        config.target_paths = builtin_targets()
            .iter()
            .map(|t| (t.name.to_string(), self.target_config(t.name)))
            .collect();
        config
    }
}

/// Answers prompts from fixed values and records every question.
#[derive(Default)]
pub struct ScriptedPrompter {
    pub inputs: BTreeMap<String, String>,
    /// Answer to every confirmation
    pub confirm_answer: bool,
    pub questions: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn accepting() -> Self {
        Self {
            confirm_answer: true,
            ..Self::default()
        }
    }

    pub fn declining() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: &str, value: &str) -> Self {
        self.inputs.insert(name.to_string(), value.to_string());
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&self, input: &InstallInput) -> Result<String> {
        self.questions.borrow_mut().push(input.name.clone());
        self.inputs
            .get(&input.name)
            .cloned()
            .or_else(|| input.default.clone())
            .ok_or_else(|| anyhow::anyhow!("no scripted value for {}", input.name))
    }

    fn confirm(&self, question: &str, _default: bool) -> Result<bool> {
        self.questions.borrow_mut().push(question.to_string());
        Ok(self.confirm_answer)
    }
}

/// Records commands instead of running them.
#[derive(Default)]
pub struct RecordingExecutor {
    pub exit_code: i32,
    pub runs: RefCell<Vec<(String, PathBuf)>>,
}

impl RecordingExecutor {
    pub fn failing(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.runs.borrow().iter().map(|(c, _)| c.clone()).collect()
    }
}

impl StepExecutor for RecordingExecutor {
    fn run(&self, command: &str, cwd: &Path) -> Result<StepOutput> {
        self.runs
            .borrow_mut()
            .push((command.to_string(), cwd.to_path_buf()));
        Ok(StepOutput {
            code: Some(self.exit_code),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
