// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Instrumentation strategies.
//!
//! The interceptor calls a strategy at three points of every invocation and
//! never talks to the telemetry backend itself. The strategy decides span
//! naming, which attributes to record, and how errors are captured.

use opentelemetry::{StringValue, Value as OtelValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::field::Empty;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::span::SpanHandle;
use crate::error::InvocationError;
use crate::hooks::CallSite;

/// Target of every invocation span.
pub const SPAN_TARGET: &str = "hooktrace::invocation";

/// Turns method invocations into spans.
///
/// The interceptor instruments the rest of the invocation with the span from
/// `on_invocation_start`, which makes it the ambient span until the call
/// finishes.
pub trait InstrumentationStrategy: Send + Sync {
    /// Create the span for an invocation that is about to run.
    fn on_invocation_start(&self, site: &CallSite, args: &[Value]) -> SpanHandle;

    /// The invocation returned normally.
    fn on_invocation_end(&self, handle: SpanHandle, result: &Value);

    /// The invocation failed. Must not try to recover the error.
    fn on_invocation_error(&self, handle: SpanHandle, error: &InvocationError);
}

/// Which argument-derived attributes to record on a span.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ArgumentPolicy {
    /// Record nothing about arguments.
    #[default]
    None,
    /// Record only `code.args.count`.
    Count,
    /// Record the count plus every scalar argument as `code.args.<index>`,
    /// truncating strings to `max_len` characters.
    #[serde(rename_all = "camelCase")]
    Scalars { max_len: usize },
}

/// Options for [`SpanStrategy`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanStrategyOptions {
    /// Prepended to span names as `prefix.Target.method`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_prefix: Option<String>,

    #[serde(default)]
    pub arguments: ArgumentPolicy,
}

/// Default strategy: one span per invocation, named `Target.method`, child of
/// whatever span is current when the call starts.
#[derive(Debug, Clone, Default)]
pub struct SpanStrategy {
    options: SpanStrategyOptions,
}

impl SpanStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SpanStrategyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SpanStrategyOptions {
        &self.options
    }

    /// Deterministic span name for a call site.
    pub fn span_name(&self, site: &CallSite) -> String {
        match &self.options.name_prefix {
            Some(prefix) => format!("{prefix}.{}", site.qualified_name()),
            None => site.qualified_name(),
        }
    }

    fn record_arguments(&self, span: &tracing::Span, args: &[Value]) {
        let count = i64::try_from(args.len()).unwrap_or(i64::MAX);
        match &self.options.arguments {
            ArgumentPolicy::None => {}
            ArgumentPolicy::Count => span.set_attribute("code.args.count", count),
            ArgumentPolicy::Scalars { max_len } => {
                span.set_attribute("code.args.count", count);
                for (index, arg) in args.iter().enumerate() {
                    let Some(value) = scalar_attribute(arg) else {
                        continue;
                    };
                    let value = match value {
                        OtelValue::String(s) if s.as_str().chars().count() > *max_len => {
                            OtelValue::String(s.as_str().chars().take(*max_len).collect::<String>().into())
                        }
                        other => other,
                    };
                    span.set_attribute(format!("code.args.{index}"), value);
                }
            }
        }
    }
}

impl InstrumentationStrategy for SpanStrategy {
    fn on_invocation_start(&self, site: &CallSite, args: &[Value]) -> SpanHandle {
        let name = self.span_name(site);
        let span = tracing::info_span!(
            target: SPAN_TARGET,
            "invocation",
            otel.name = name.as_str(),
            code.namespace = site.target.as_str(),
            code.function = &*site.method,
            otel.status_code = Empty,
            otel.status_message = Empty,
            error.kind = Empty,
            error.message = Empty,
        );
        self.record_arguments(&span, args);
        SpanHandle::new(span)
    }

    fn on_invocation_end(&self, handle: SpanHandle, _result: &Value) {
        handle.finish_ok();
    }

    fn on_invocation_error(&self, handle: SpanHandle, error: &InvocationError) {
        handle.finish_error(error.kind(), error.message());
    }
}

/// Convert a JSON scalar to an attribute value. Arrays, objects, and null
/// have no attribute form.
pub fn scalar_attribute(value: &Value) -> Option<OtelValue> {
    match value {
        Value::Bool(b) => Some(OtelValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(OtelValue::I64)
            .or_else(|| n.as_f64().map(OtelValue::F64)),
        Value::String(s) => Some(OtelValue::String(StringValue::from(s.clone()))),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
