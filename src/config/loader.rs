// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;
use crate::logging::LogLevel;

use super::types::{ConfiguredHook, LogSpec, TelemetryFileConfig};

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &["hooktrace.json", "hooktrace.yaml", ".hooktrace/config.json"];

/// Find the first config file present in `dir`.
///
/// Searches in the following order:
/// 1. hooktrace.json
/// 2. hooktrace.yaml
/// 3. .hooktrace/config.json
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|filename| dir.join(filename))
        .find(|path| path.exists())
}

/// Load the config file found in `dir`, if any.
pub fn load_config(dir: &Path) -> Result<Option<TelemetryFileConfig>, ConfigError> {
    match find_config(dir) {
        Some(path) => load_config_file(&path).map(Some),
        None => Ok(None),
    }
}

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<TelemetryFileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let config: TelemetryFileConfig = match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    validate(&config)?;

    debug!(path = %path.display(), hooks = config.hooks.len(), "Loaded config");
    Ok(config)
}

/// Checks that do not need the service catalog. Unknown targets and
/// methods are reported at registration.
fn validate(config: &TelemetryFileConfig) -> Result<(), ConfigError> {
    for (index, hook) in config.hooks.iter().enumerate() {
        if hook.target.trim().is_empty() {
            return Err(ConfigError::invalid(
                format!("hooks[{index}].target"),
                "must not be empty",
            ));
        }
    }
    Ok(())
}

/// Get an example configuration.
pub fn example_config() -> TelemetryFileConfig {
    TelemetryFileConfig {
        logger_options: [("console".to_string(), LogLevel::Info)].into_iter().collect(),
        strategy: None,
        hooks: vec![ConfiguredHook {
            name: Some("order-audit".to_string()),
            target: "OrderService".to_string(),
            methods: Some(vec!["placeOrder".to_string()]),
            record_args: [("orderId".to_string(), 0)].into_iter().collect(),
            on_call: Some(LogSpec::new(LogLevel::Info, "{target}.{method} called")),
            on_success: None,
            on_error: Some(LogSpec::new(LogLevel::Error, "{method} failed: {error}")),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_json_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hooktrace.json");
        std::fs::write(
            &path,
            r#"{"loggerOptions": {"console": "debug"}, "hooks": [{"target": "OrderService"}]}"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.logger_options.get("console"), Some(&LogLevel::Debug));
        assert_eq!(config.hooks.len(), 1);
        assert!(config.hooks[0].methods.is_none());
    }

    #[test]
    fn test_load_yaml_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hooktrace.yaml");
        std::fs::write(
            &path,
            "hooks:\n  - target: InventoryService\n    methods: [reserve]\n    onError:\n      level: warning\n      message: reserve failed\n",
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        let hook = &config.hooks[0];
        assert_eq!(hook.target, "InventoryService");
        assert_eq!(hook.on_error.as_ref().map(|s| s.level), Some(LogLevel::Warn));
    }

    #[test]
    fn test_find_config_order() {
        let temp = TempDir::new().unwrap();
        assert!(find_config(temp.path()).is_none());
        assert!(load_config(temp.path()).unwrap().is_none());

        std::fs::create_dir(temp.path().join(".hooktrace")).unwrap();
        std::fs::write(temp.path().join(".hooktrace/config.json"), "{}").unwrap();
        assert!(find_config(temp.path()).unwrap().ends_with(".hooktrace/config.json"));

        std::fs::write(temp.path().join("hooktrace.json"), "{}").unwrap();
        assert!(find_config(temp.path()).unwrap().ends_with("hooktrace.json"));
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = load_config_file(&temp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_invalid_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hooktrace.json");
        std::fs::write(&path, r#"{"hooks": [{"target": "  "}]}"#).unwrap();
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::InvalidValue { .. })
        ));

        std::fs::write(&path, r#"{"loggerOptions": {"console": "loud"}}"#).unwrap();
        assert!(matches!(load_config_file(&path), Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn test_example_config_round_trips() {
        let json = serde_json::to_string(&example_config()).unwrap();
        let parsed: TelemetryFileConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.hooks, example_config().hooks);
    }
}
