// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for hooktrace.
//!
//! Startup problems (bad hook descriptors, unreadable config files) are
//! strongly typed with `thiserror` and meant to fail fast. Errors raised while
//! an intercepted method runs travel as [`InvocationError`], which the
//! interceptor hands back to the caller untouched. Pipeline flush and
//! shutdown failures are [`ExportError`]; they never reach intercepted calls.

use std::fmt;

use opentelemetry_sdk::error::OTelSdkError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error kind used when a call chain is dropped before it completes.
pub const CANCELLED_KIND: &str = "Cancelled";

/// An error raised by an intercepted method or by one of its hooks.
///
/// The interceptor never rewrites these: whatever the original method (or a
/// failing hook) returned is exactly what the caller receives. Equality
/// compares kind, message, and details, so tests can assert identity.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct InvocationError {
    kind: String,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl InvocationError {
    /// Create an error of the given kind.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Build an error from any `std::error::Error`, using the type name as kind.
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let full = std::any::type_name::<E>();
        let kind = full.rsplit("::").next().unwrap_or(full);
        Self::new(kind, err.to_string())
    }

    /// Error for a call chain that was abandoned mid-flight.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(CANCELLED_KIND, message)
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    /// Check if this error marks an abandoned call.
    pub fn is_cancelled(&self) -> bool {
        self.kind == CANCELLED_KIND
    }
}

/// Errors surfaced while registering hook descriptors.
///
/// These are fatal at startup: skipping a hook silently would hide missing
/// instrumentation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Unknown method `{method}` on target {target}")]
    UnknownMethod { target: String, method: String },

    #[error("Malformed method selector for {target}: {reason}")]
    MalformedSelector { target: String, reason: String },

    #[error("Target already declared: {0}")]
    DuplicateTarget(String),
}

impl RegistrationError {
    pub(crate) fn malformed(target: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::MalformedSelector {
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised when dispatching a call through the installed service table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Unknown method `{method}` on target {target}")]
    UnknownMethod { target: String, method: String },

    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

impl CallError {
    /// The invocation error, if the call reached the method.
    pub fn invocation(&self) -> Option<&InvocationError> {
        match self {
            Self::Invocation(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors reported while flushing or shutting down the export pipeline.
///
/// Per-record export failures stay inside the OpenTelemetry SDK, which
/// reports them on its own internal log channel.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Flush failed: {0}")]
    Flush(OTelSdkError),

    #[error("Shutdown failed: {0}")]
    Shutdown(OTelSdkError),
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors raised while assembling the telemetry runtime.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
