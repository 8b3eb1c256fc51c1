//! Questions asked while installing and uninstalling packages.

use crate::package::InstallInput;
use crate::vars::InputValues;

/// Source of answers for install inputs and step confirmations.
pub trait Prompter {
    /// Value for a declared install input.
    fn input(&self, input: &InstallInput) -> anyhow::Result<String>;

    /// Yes/no question; `default` is the answer when the user just presses enter.
    fn confirm(&self, question: &str, default: bool) -> anyhow::Result<bool>;
}

/// Non-interactive answers.
///
/// Inputs come from preset values (`--input KEY=VALUE`), then the input's
/// declared default. Every confirmation takes its default answer.
#[derive(Debug, Clone, Default)]
pub struct AssumeYes {
    values: InputValues,
}

impl AssumeYes {
    pub fn new(values: InputValues) -> Self {
        Self { values }
    }
}

impl Prompter for AssumeYes {
    fn input(&self, input: &InstallInput) -> anyhow::Result<String> {
        if let Some(value) = self.values.get(&input.name) {
            return Ok(value.clone());
        }
        if let Some(default) = &input.default {
            return Ok(default.clone());
        }
        anyhow::bail!(
            "Missing value for required input '{}'; pass --input {}=VALUE",
            input.name,
            input.name
        )
    }

    fn confirm(&self, question: &str, default: bool) -> anyhow::Result<bool> {
        tracing::debug!(question, answer = default, "Answering confirmation non-interactively");
        Ok(default)
    }
}

/// Parse a `KEY=VALUE` argument.
pub fn parse_input_arg(raw: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid input '{}': expected KEY=VALUE", raw))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Invalid input '{}': key cannot be empty", raw);
    }
    Ok((key.to_string(), value.to_string()))
}
