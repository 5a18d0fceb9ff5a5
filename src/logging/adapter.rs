// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging adapter.
//!
//! [`TelemetryLogger`] turns leveled log calls into OpenTelemetry log records
//! and emits them to every configured sink whose minimum level admits the
//! record. Logging never fails from the caller's point of view: sinks are SDK
//! logger providers, and their exporters report failures on the SDK's own
//! diagnostics channel.

use std::collections::BTreeMap;
use std::time::SystemTime;

use opentelemetry::logs::{AnyValue, LogRecord as _, Logger as _, Severity};
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::logs::{SdkLogger, SdkLoggerProvider};

use super::level::LogLevel;
use crate::error::ConfigError;
use crate::telemetry::context;
use crate::telemetry::pipeline::sink_logger;

/// Per-sink minimum severity, keyed by sink name.
pub type LoggerOptions = BTreeMap<String, LogLevel>;

/// Minimum level for sinks not named in [`LoggerOptions`].
pub const DEFAULT_MIN_LEVEL: LogLevel = LogLevel::Info;

/// A leveled logger.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, attributes: Vec<KeyValue>);

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message, Vec::new());
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, Vec::new());
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, Vec::new());
    }

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, Vec::new());
    }

    fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message, Vec::new());
    }
}

struct SinkEntry {
    name: String,
    min_level: LogLevel,
    logger: SdkLogger,
}

/// Logger that emits structured records to named sinks.
#[derive(Default)]
pub struct TelemetryLogger {
    sinks: Vec<SinkEntry>,
}

impl TelemetryLogger {
    /// A logger with no sinks; every call is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from per-sink options and the sinks available to this process.
    ///
    /// Every available sink is attached; sinks named in `options` use that
    /// minimum level, the rest use [`DEFAULT_MIN_LEVEL`]. Naming a sink that
    /// is not available is a configuration error.
    pub fn from_options(
        options: &LoggerOptions,
        available: &BTreeMap<String, SdkLoggerProvider>,
    ) -> Result<Self, ConfigError> {
        if let Some(unknown) = options.keys().find(|name| !available.contains_key(*name)) {
            return Err(ConfigError::invalid(
                "loggerOptions",
                format!("unknown sink `{unknown}`"),
            ));
        }

        let mut logger = Self::new();
        for (name, provider) in available {
            let min_level = options.get(name).copied().unwrap_or(DEFAULT_MIN_LEVEL);
            logger.add_sink(name.clone(), min_level, provider);
        }
        Ok(logger)
    }

    pub fn with_sink(mut self, name: impl Into<String>, min_level: LogLevel, provider: &SdkLoggerProvider) -> Self {
        self.add_sink(name, min_level, provider);
        self
    }

    pub fn add_sink(&mut self, name: impl Into<String>, min_level: LogLevel, provider: &SdkLoggerProvider) {
        self.sinks.push(SinkEntry {
            name: name.into(),
            min_level,
            logger: sink_logger(provider),
        });
    }

    /// Whether any sink would accept a record at `level`.
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.sinks.iter().any(|entry| level >= entry.min_level)
    }

    /// Minimum level configured for a sink.
    pub fn min_level(&self, sink: &str) -> Option<LogLevel> {
        self.sinks
            .iter()
            .find(|entry| entry.name == sink)
            .map(|entry| entry.min_level)
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|entry| entry.name.as_str()).collect()
    }
}

impl Logger for TelemetryLogger {
    fn log(&self, level: LogLevel, message: &str, attributes: Vec<KeyValue>) {
        if !self.is_enabled(level) {
            return;
        }
        let span_context = context::current_span_context();
        let now = SystemTime::now();

        for entry in self.sinks.iter().filter(|entry| level >= entry.min_level) {
            let mut record = entry.logger.create_log_record();
            record.set_timestamp(now);
            record.set_observed_timestamp(now);
            record.set_severity_number(Severity::from(level));
            record.set_severity_text(level.as_str());
            record.set_body(AnyValue::from(message.to_string()));
            for kv in &attributes {
                record.add_attribute(kv.key.clone(), any_value(&kv.value));
            }
            if let Some(span_context) = &span_context {
                record.set_trace_context(
                    span_context.trace_id(),
                    span_context.span_id(),
                    Some(span_context.trace_flags()),
                );
            }
            entry.logger.emit(record);
        }
    }
}

fn any_value(value: &Value) -> AnyValue {
    match value {
        Value::Bool(v) => AnyValue::Boolean(*v),
        Value::I64(v) => AnyValue::Int(*v),
        Value::F64(v) => AnyValue::Double(*v),
        Value::String(v) => AnyValue::String(v.clone()),
        other => AnyValue::String(other.to_string().into()),
    }
}

impl std::fmt::Debug for TelemetryLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sinks: BTreeMap<&str, LogLevel> = self
            .sinks
            .iter()
            .map(|entry| (entry.name.as_str(), entry.min_level))
            .collect();
        f.debug_struct("TelemetryLogger").field("sinks", &sinks).finish()
    }
}
