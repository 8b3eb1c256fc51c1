//! TOML parser for config.toml with helpful error messages

use super::schema::ConfigFile;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse config.toml with detailed error messages
pub fn parse_config_toml(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse config.toml content from string
pub fn parse_config_toml_str(content: &str) -> Result<ConfigFile> {
    let config: ConfigFile =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let error_msg = error.to_string();

    let line_hint = error.span().map(|span| {
        content[..span.start.min(content.len())]
            .chars()
            .filter(|c| *c == '\n')
            .count()
            + 1
    });

    if let Some(line_num) = line_hint {
        let context = get_line_context(content, line_num);
        anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            context,
            error_msg
        )
    } else {
        anyhow::anyhow!("TOML parsing error: {}", error_msg)
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 1).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
registry_url = "https://registry.example.com/api"
install_dir = "~/mcp/packages"

[targets.windsurf]
path = "/tmp/windsurf.json"

[targets.zed]
path = "~/.config/zed/mcp.json"
"#;

        let config = parse_config_toml_str(toml).unwrap();
        assert_eq!(
            config.registry_url.as_deref(),
            Some("https://registry.example.com/api")
        );
        assert_eq!(config.targets.len(), 2);
        assert!(config.targets.contains_key("zed"));
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config_toml_str("").unwrap();
        assert!(config.registry_url.is_none());
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_parse_invalid_toml() {
        let toml = r#"
[targets.windsurf
path = "/tmp/x.json"
"#;

        let err = parse_config_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("TOML parsing error"));
    }

    #[test]
    fn test_parse_rejects_bad_registry_url() {
        let result = parse_config_toml_str(r#"registry_url = "not a url""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_empty_target_path() {
        let toml = r#"
[targets.cursor]
path = "  "
"#;
        assert!(parse_config_toml_str(toml).is_err());
    }
}
