//! YAML configuration with dotted-path lookup.
//!
//! Loads `config.yaml` from the working directory, falling back to
//! `config.example.yaml`. Values are read with dotted paths
//! (`apkt.login_url`) and a caller-supplied default.

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::AgentError;

/// Required top-level sections and their mandatory keys.
const REQUIRED: &[(&str, &[&str])] = &[
    ("apkt", &["login_url", "iam_login_url", "iam_totp_url_prefix"]),
    ("datasets", &[]),
    ("workspace", &["root"]),
    ("runtime", &["headless"]),
];

/// Parsed configuration tree.
#[derive(Debug)]
pub struct Config {
    data: Value,
}

impl Config {
    /// Build a config from an already-parsed YAML value, validating that the
    /// required sections and keys are present.
    pub fn from_value(data: Value) -> Result<Self, AgentError> {
        for (section, keys) in REQUIRED {
            let Some(map) = data.get(section) else {
                return Err(AgentError::Config(format!(
                    "missing required config section: {section}"
                )));
            };
            for key in *keys {
                if map.get(key).is_none() {
                    return Err(AgentError::Config(format!(
                        "missing required config key: {section}.{key}"
                    )));
                }
            }
        }
        Ok(Self { data })
    }

    /// Parse a YAML string.
    pub fn from_str(text: &str) -> Result<Self, AgentError> {
        let data: Value = serde_yaml::from_str(text)
            .map_err(|e| AgentError::Config(format!("failed to parse configuration: {e}")))?;
        if data.is_null() {
            return Err(AgentError::Config("configuration is empty".into()));
        }
        Self::from_value(data)
    }

    /// Load configuration from an explicit path, or search the working
    /// directory for `config.yaml` then `config.example.yaml`.
    pub fn load(path: Option<&Path>) -> Result<Self, AgentError> {
        let file = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let primary = PathBuf::from("config.yaml");
                if primary.exists() {
                    primary
                } else {
                    PathBuf::from("config.example.yaml")
                }
            }
        };
        if !file.exists() {
            return Err(AgentError::Config(format!(
                "configuration file not found: {}",
                file.display()
            )));
        }
        let text = std::fs::read_to_string(&file)
            .map_err(|e| AgentError::Config(format!("failed to read {}: {e}", file.display())))?;
        Self::from_str(&text)
    }

    /// Look up a value by dotted path.
    pub fn get(&self, key_path: &str) -> Option<&Value> {
        let mut value = &self.data;
        for key in key_path.split('.') {
            value = value.get(key)?;
        }
        Some(value)
    }

    /// String value at `key_path`, or `default` when absent or not a string.
    pub fn get_str(&self, key_path: &str, default: &str) -> String {
        self.get(key_path)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Boolean value at `key_path`, or `default`.
    pub fn get_bool(&self, key_path: &str, default: bool) -> bool {
        self.get(key_path).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Integer value at `key_path`, or `default`.
    pub fn get_u64(&self, key_path: &str, default: u64) -> u64 {
        self.get(key_path).and_then(Value::as_u64).unwrap_or(default)
    }

    /// Override a value by dotted path, creating intermediate mappings as
    /// needed. Used for command-line flags that shadow file values.
    pub fn set(&mut self, key_path: &str, value: Value) {
        let mut node = &mut self.data;
        let keys: Vec<&str> = key_path.split('.').collect();
        for key in &keys[..keys.len() - 1] {
            if node.get(*key).is_none() {
                if let Value::Mapping(map) = node {
                    map.insert(Value::String((*key).to_string()), Value::Mapping(Default::default()));
                }
            }
            node = match node.get_mut(*key) {
                Some(next) => next,
                None => return,
            };
        }
        if let Value::Mapping(map) = node {
            map.insert(Value::String(keys[keys.len() - 1].to_string()), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
apkt:
  login_url: "https://portal.example/login"
  iam_login_url: "https://iam.example/login"
  iam_totp_url_prefix: "https://iam.example/totp"
datasets: {}
workspace:
  root: "./workspace"
runtime:
  headless: true
"#;

    #[test]
    fn dotted_lookup_with_default() {
        let cfg = Config::from_str(MINIMAL).unwrap();
        assert_eq!(
            cfg.get_str("apkt.login_url", ""),
            "https://portal.example/login"
        );
        assert_eq!(cfg.get_str("apkt.missing", "fallback"), "fallback");
        assert!(cfg.get_bool("runtime.headless", false));
    }

    #[test]
    fn missing_section_rejected() {
        let err = Config::from_str("apkt:\n  login_url: x\n").unwrap_err();
        assert!(err.to_string().contains("missing required config"));
    }

    #[test]
    fn missing_key_rejected() {
        let text = MINIMAL.replace("  iam_totp_url_prefix: \"https://iam.example/totp\"\n", "");
        let err = Config::from_str(&text).unwrap_err();
        assert!(err.to_string().contains("apkt.iam_totp_url_prefix"));
    }
}
