//! TOML parser with helpful error messages

use std::path::Path;

use super::schema::RepositoriesConfig;
use crate::error::{ExtensionError, IoResultExt, Result};

/// Parse repositories.toml with detailed error messages
pub fn parse_repositories_toml(path: &Path) -> Result<RepositoriesConfig> {
    let content = std::fs::read_to_string(path).at_path(path)?;

    parse_repositories_toml_str(&content).map_err(|e| match e {
        ExtensionError::Config(message) => {
            ExtensionError::Config(format!("{}: {}", path.display(), message))
        }
        other => other,
    })
}

/// Parse repositories.toml content from string
pub fn parse_repositories_toml_str(content: &str) -> Result<RepositoriesConfig> {
    let config: RepositoriesConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> ExtensionError {
    let error_msg = error.to_string();

    let line_hint = error
        .span()
        .map(|span| content[..span.start.min(content.len())].lines().count().max(1));

    match line_hint {
        Some(line_num) => {
            let context = get_line_context(content, line_num);
            ExtensionError::Config(format!(
                "TOML parsing error at line {}:\n{}\n\nError: {}",
                line_num, context, error_msg
            ))
        }
        None => ExtensionError::Config(format!("TOML parsing error: {}", error_msg)),
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());

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

/// Serialize a configuration to TOML string
pub fn to_toml(config: &RepositoriesConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
default_repository = "user"

[[repositories]]
name = "shared"
location = "/opt/data/.tabext"

[[repositories]]
name = "user"
location = "~/.tabext"
"#;

        let config = parse_repositories_toml_str(toml).unwrap();
        assert_eq!(config.search_order(), vec!["shared", "user"]);
        assert_eq!(config.default_repository, "user");
    }

    #[test]
    fn test_parse_missing_default_fails() {
        let toml = r#"
[[repositories]]
name = "user"
location = "~/.tabext"
"#;
        assert!(parse_repositories_toml_str(toml).is_err());
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let toml = "default_repository = \"user\"\n[[repositories]]\nname = \n";
        let err = parse_repositories_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("TOML parsing error"));
    }

    #[test]
    fn test_parse_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "default_repository = \"user\"\n[[repositories]]\nname = \"user\"\nlocation = \"/tmp/x\""
        )
        .unwrap();

        let config = parse_repositories_toml(file.path()).unwrap();
        assert_eq!(config.repositories.len(), 1);
    }

    #[test]
    fn test_roundtrip_preserves_order() {
        let toml = r#"
default_repository = "b"

[[repositories]]
name = "b"
location = "/b"

[[repositories]]
name = "a"
location = "/a"
"#;
        let config = parse_repositories_toml_str(toml).unwrap();
        let serialized = to_toml(&config).unwrap();
        let reparsed = parse_repositories_toml_str(&serialized).unwrap();
        assert_eq!(config, reparsed);
    }
}
