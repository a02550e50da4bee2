//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::MockConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<MockConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<MockConfig, ConfigError> {
    let config: MockConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_config(
            r#"
            mocks_dir = "fixtures"
            delay_ms = 500
            extra_headers = [["X-Powered-By", "mockroute"]]

            [listener]
            port = 3030

            [[cookies]]
            label = "admin"
            value = "session=abc"

            [[plugins]]
            pattern = '\.hbs\.json$'
            transform = "template"
            "#,
        )
        .unwrap();

        assert_eq!(config.mocks_dir, std::path::PathBuf::from("fixtures"));
        assert_eq!(config.listener.bind_address(), "127.0.0.1:3030");
        assert_eq!(config.delay_ms, 500);
        assert_eq!(config.extra_headers[0].0, "X-Powered-By");
        assert_eq!(config.cookies[0].label, "admin");
        assert_eq!(config.plugins[0].transform, "template");
        assert!(config.watch);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = parse_config("delay_jitter = 9.0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(matches!(parse_config("delay_ms = \"x\""), Err(ConfigError::Parse(_))));
    }
}
