//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables.
    ///
    /// Supports `${VAR_NAME}` and `${VAR_NAME:-default}`. A placeholder whose
    /// variable is unset and has no default is an error, unless it sits on a
    /// comment line.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var pattern is valid");
        let mut result = String::with_capacity(content.len());
        let mut last_match = 0;
        let mut missing = Vec::new();

        for cap in re.captures_iter(content) {
            let Some(full_match) = cap.get(0) else {
                continue;
            };
            result.push_str(&content[last_match..full_match.start()]);

            let value = match std::env::var(&cap[1]) {
                Ok(val) => val,
                Err(_) => match cap.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => {
                        if !Self::in_comment(content, full_match.start()) {
                            missing.push(cap[1].to_string());
                        }
                        full_match.as_str().to_string()
                    }
                },
            };
            result.push_str(&value);

            last_match = full_match.end();
        }

        if !missing.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Environment variable(s) not set: {}",
                missing.join(", ")
            )));
        }

        result.push_str(&content[last_match..]);
        Ok(result)
    }

    fn in_comment(content: &str, offset: usize) -> bool {
        let line_start = content[..offset].rfind('\n').map_or(0, |i| i + 1);
        content[line_start..offset].trim_start().starts_with('#')
    }
}
