//! Install and uninstall steps declared by packages.
//!
//! Steps are arbitrary shell commands taken from package metadata, so every
//! step is put to the [`Prompter`] before it runs. A step that exits non-zero
//! is reported and the remaining steps still run. Commands run with the
//! package directory as the child's working directory; the working
//! directory of the mcpm process itself never changes.

use std::path::Path;
use std::process::Command;

use anyhow::Context;
use serde::Serialize;

use crate::package::PackageStep;
use crate::prompt::Prompter;
use crate::vars::{InputValues, substitute};

/// Captured result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs step commands.
pub trait StepExecutor {
    fn run(&self, command: &str, cwd: &Path) -> anyhow::Result<StepOutput>;
}

/// Runs steps through the platform shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellExecutor;

impl StepExecutor for ShellExecutor {
    fn run(&self, command: &str, cwd: &Path) -> anyhow::Result<StepOutput> {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            cmd
        };
        let output = cmd
            .arg(command)
            .current_dir(cwd)
            .output()
            .with_context(|| format!("Failed to run command in {}: {}", cwd.display(), command))?;

        Ok(StepOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Which list of steps is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepPhase {
    Install,
    Uninstall,
}

impl std::fmt::Display for StepPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepPhase::Install => write!(f, "install"),
            StepPhase::Uninstall => write!(f, "uninstall"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    /// Non-zero exit
    Failed { code: Option<i32> },
    /// The command could not be started
    Errored { message: String },
    Skipped,
    /// Not a `shell` step, or no command
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// 1-based position in the step list
    pub index: usize,
    /// Command after placeholder substitution
    pub command: Option<String>,
    pub outcome: StepOutcome,
}

/// Tally of a step run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub ran: usize,
    pub skipped: usize,
    pub failed: usize,
    pub unsupported: usize,
    pub records: Vec<StepRecord>,
}

impl StepSummary {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn record(&mut self, index: usize, command: Option<String>, outcome: StepOutcome) {
        match &outcome {
            StepOutcome::Succeeded => self.ran += 1,
            StepOutcome::Failed { .. } | StepOutcome::Errored { .. } => {
                self.ran += 1;
                self.failed += 1;
            }
            StepOutcome::Skipped => self.skipped += 1,
            StepOutcome::Unsupported => self.unsupported += 1,
        }
        self.records.push(StepRecord {
            index,
            command,
            outcome,
        });
    }
}

/// Run `steps` in order inside `cwd`.
///
/// `${name}` placeholders in each command are filled from `inputs` first.
/// Only a failing prompt aborts the run; command failures are recorded and
/// the next step runs.
pub fn run_steps(
    phase: StepPhase,
    steps: &[PackageStep],
    cwd: &Path,
    inputs: &InputValues,
    prompter: &dyn Prompter,
    executor: &dyn StepExecutor,
) -> anyhow::Result<StepSummary> {
    let mut summary = StepSummary::default();
    if steps.is_empty() {
        tracing::debug!(%phase, "No steps declared");
        return Ok(summary);
    }

    tracing::info!(%phase, count = steps.len(), dir = %cwd.display(), "Running package steps");
    for (i, step) in steps.iter().enumerate() {
        let index = i + 1;
        let Some(raw) = step.shell_command() else {
            tracing::warn!(
                %phase,
                step = index,
                step_type = %step.step_type,
                "Unsupported step type; skipping"
            );
            summary.record(index, step.command.clone(), StepOutcome::Unsupported);
            continue;
        };

        let command = substitute(raw, inputs);
        let question = format!(
            "Step {index}: {command}\nRun this command in {}?",
            cwd.display()
        );
        if !prompter.confirm(&question, true)? {
            tracing::info!(%phase, step = index, "Skipped step");
            summary.record(index, Some(command), StepOutcome::Skipped);
            continue;
        }

        tracing::debug!(%phase, step = index, %command, "Running step");
        let outcome = match executor.run(&command, cwd) {
            Ok(output) => {
                log_output(&output);
                if output.success() {
                    StepOutcome::Succeeded
                } else {
                    tracing::warn!(
                        %phase,
                        step = index,
                        code = ?output.code,
                        %command,
                        "Step exited with an error"
                    );
                    StepOutcome::Failed { code: output.code }
                }
            }
            Err(err) => {
                tracing::warn!(%phase, step = index, error = %err, "Step could not be run");
                StepOutcome::Errored {
                    message: format!("{err:#}"),
                }
            }
        };
        summary.record(index, Some(command), outcome);
    }

    Ok(summary)
}

fn log_output(output: &StepOutput) {
    let stdout = output.stdout.trim();
    if !stdout.is_empty() {
        tracing::info!("{}", stdout);
    }
    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        tracing::warn!("{}", stderr);
    }
}
