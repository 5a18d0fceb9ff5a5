// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! A config file declares logger cutoffs, span strategy options, and
//! declarative hooks. Declarative hooks record arguments onto the active span
//! and emit log records; anything richer is written in code as a
//! [`HookSet`].

use std::collections::BTreeMap;
use std::sync::Arc;

use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};

use crate::error::InvocationError;
use crate::hooks::{BeforeAction, CallSite, ErrorAction, HookDescriptor, HookSet, MethodSelector};
use crate::logging::{LogLevel, Logger, LoggerOptions};
use crate::telemetry::{context, scalar_attribute, SpanStrategyOptions};

/// Contents of a `hooktrace.json` / `hooktrace.yaml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFileConfig {
    /// Minimum level per log sink.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub logger_options: LoggerOptions,

    /// Span strategy settings. Absent means the default strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyConfig>,

    /// Declarative hooks, registered after built-in defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<ConfiguredHook>,
}

impl TelemetryFileConfig {
    /// Whether spans should be produced.
    pub fn spans_enabled(&self) -> bool {
        self.strategy.as_ref().map_or(true, |s| s.enabled)
    }

    pub fn strategy_options(&self) -> SpanStrategyOptions {
        self.strategy
            .as_ref()
            .map(|s| s.options.clone())
            .unwrap_or_default()
    }

    /// Turn every configured hook into a descriptor logging through `logger`.
    pub fn descriptors(&self, logger: Arc<dyn Logger>) -> Vec<HookDescriptor> {
        self.hooks
            .iter()
            .map(|hook| hook.clone().into_descriptor(Arc::clone(&logger)))
            .collect()
    }
}

/// Span strategy section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(flatten)]
    pub options: SpanStrategyOptions,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            options: SpanStrategyOptions::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A log record to emit at a hook point.
///
/// The message may contain `{target}`, `{method}`, and (for `onError`)
/// `{error}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSpec {
    #[serde(default = "default_level")]
    pub level: LogLevel,
    pub message: String,
}

fn default_level() -> LogLevel {
    LogLevel::Info
}

impl LogSpec {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    fn render(&self, site: &CallSite, error: Option<&InvocationError>) -> String {
        let message = self
            .message
            .replace("{target}", site.target.as_str())
            .replace("{method}", &site.method);
        match error {
            Some(err) => message.replace("{error}", &err.to_string()),
            None => message,
        }
    }
}

/// A hook declared in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfiguredHook {
    /// Diagnostic name; defaults to `config:<target>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub target: String,

    /// Methods to wrap. Absent means every declared method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,

    /// Span attribute name to argument index.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub record_args: BTreeMap<String, usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_call: Option<LogSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<LogSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<LogSpec>,
}

impl ConfiguredHook {
    /// Build the hook set and descriptor for this entry.
    pub fn into_descriptor(self, logger: Arc<dyn Logger>) -> HookDescriptor {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("config:{}", self.target));
        let selector = match &self.methods {
            Some(methods) => MethodSelector::Names(methods.iter().cloned().collect()),
            None => MethodSelector::All,
        };

        let mut hooks = HookSet::new().named(name);

        if !self.record_args.is_empty() || self.on_call.is_some() {
            let record_args = self.record_args;
            let on_call = self.on_call;
            let logger = Arc::clone(&logger);
            hooks = hooks.before(move |site, args| {
                let mut recorded = Vec::with_capacity(record_args.len());
                for (attr, index) in &record_args {
                    if let Some(value) = args.get(*index).and_then(scalar_attribute) {
                        context::set_attribute(attr.clone(), value.clone());
                        recorded.push(KeyValue::new(attr.clone(), value));
                    }
                }
                if let Some(spec) = &on_call {
                    logger.log(spec.level, &spec.render(site, None), recorded);
                }
                Ok(BeforeAction::Continue(args))
            });
        }

        if let Some(spec) = self.on_success {
            let logger = Arc::clone(&logger);
            hooks = hooks.after(move |site, value| {
                logger.log(spec.level, &spec.render(site, None), Vec::new());
                Ok(value)
            });
        }

        if let Some(spec) = self.on_error {
            hooks = hooks.on_error(move |site, error| {
                let attributes = vec![KeyValue::new("error.kind", error.kind().to_string())];
                logger.log(spec.level, &spec.render(site, Some(error)), attributes);
                Ok(ErrorAction::Propagate)
            });
        }

        HookDescriptor::new(self.target.as_str(), selector, hooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::TargetId;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "loggerOptions": {"console": "warn"},
            "strategy": {"namePrefix": "shop", "arguments": {"mode": "count"}},
            "hooks": [{
                "target": "OrderService",
                "methods": ["placeOrder"],
                "recordArgs": {"orderId": 0},
                "onCall": {"message": "placing order"},
                "onError": {"level": "error", "message": "{method} failed: {error}"}
            }]
        }"#;
        let config: TelemetryFileConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.logger_options.get("console"), Some(&LogLevel::Warn));
        assert!(config.spans_enabled());
        assert_eq!(config.strategy_options().name_prefix.as_deref(), Some("shop"));
        let hook = &config.hooks[0];
        assert_eq!(hook.record_args.get("orderId"), Some(&0));
        assert_eq!(hook.on_call.as_ref().map(|s| s.level), Some(LogLevel::Info));
    }

    #[test]
    fn test_empty_config_defaults() {
        let config: TelemetryFileConfig = serde_json::from_str("{}").unwrap();
        assert!(config.spans_enabled());
        assert!(config.hooks.is_empty());
        assert_eq!(config.strategy_options(), SpanStrategyOptions::default());
    }

    #[test]
    fn test_strategy_can_be_disabled() {
        let config: TelemetryFileConfig =
            serde_json::from_str(r#"{"strategy": {"enabled": false}}"#).unwrap();
        assert!(!config.spans_enabled());
    }

    #[test]
    fn test_log_spec_render() {
        let spec = LogSpec::new(LogLevel::Error, "{target}.{method} failed: {error}");
        let site = CallSite::new(TargetId::new("OrderService"), "placeOrder");
        let err = InvocationError::new("OutOfStockError", "none left");
        assert_eq!(
            spec.render(&site, Some(&err)),
            "OrderService.placeOrder failed: OutOfStockError: none left"
        );
    }

    #[test]
    fn test_into_descriptor_selector() {
        let logger: Arc<dyn Logger> = Arc::new(crate::logging::TelemetryLogger::new());
        let all = ConfiguredHook {
            target: "OrderService".to_string(),
            ..Default::default()
        }
        .into_descriptor(Arc::clone(&logger));
        assert_eq!(all.selector, MethodSelector::All);
        assert_eq!(all.hooks.name(), "config:OrderService");
        assert!(all.hooks.is_empty());

        let named = ConfiguredHook {
            name: Some("audit".to_string()),
            target: "OrderService".to_string(),
            methods: Some(vec!["placeOrder".to_string()]),
            on_success: Some(LogSpec::new(LogLevel::Info, "ok")),
            ..Default::default()
        }
        .into_descriptor(logger);
        assert_eq!(named.selector, MethodSelector::method("placeOrder"));
        assert_eq!(named.hooks.name(), "audit");
        assert!(!named.hooks.is_empty());
    }
}
