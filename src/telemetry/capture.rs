// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory capture of exported spans and log records.
//!
//! Backed by the SDK's in-memory exporters. The `demo` command renders from a
//! capture, and tests assert against one.

use chrono::{DateTime, Utc};
use opentelemetry::logs::AnyValue;
use opentelemetry::trace::{SpanId, Status};
use opentelemetry::Value;
use opentelemetry_sdk::logs::{InMemoryLogExporter, SdkLogRecord};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SpanData};
use serde_json::{json, Map, Value as Json};
use tracing::subscriber::DefaultGuard;

use super::pipeline::TelemetryPipeline;

/// Name of the log sink a [`Capture`] registers.
pub const MEMORY_SINK: &str = "memory";

/// A pipeline whose exporters keep everything in memory.
#[derive(Clone, Debug)]
pub struct Capture {
    spans: InMemorySpanExporter,
    logs: InMemoryLogExporter,
    pipeline: TelemetryPipeline,
}

impl Capture {
    /// A capture whose log sink is named `memory`.
    pub fn new() -> Self {
        Self::with_sink_name(MEMORY_SINK)
    }

    /// A capture whose log sink goes by `sink`, so logger options written
    /// for another sink name apply to it.
    pub fn with_sink_name(sink: impl Into<String>) -> Self {
        let spans = InMemorySpanExporter::default();
        let logs = InMemoryLogExporter::default();
        let pipeline = TelemetryPipeline::builder()
            .with_span_exporter(spans.clone())
            .with_log_exporter(sink, logs.clone())
            .build();
        Self { spans, logs, pipeline }
    }

    pub fn pipeline(&self) -> &TelemetryPipeline {
        &self.pipeline
    }

    /// Make this capture's span layer the thread's default subscriber until
    /// the guard drops.
    pub fn set_default(&self) -> DefaultGuard {
        tracing::subscriber::set_default(self.pipeline.subscriber())
    }

    /// Finished spans in end order.
    pub fn spans(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().unwrap_or_default()
    }

    pub fn span_named(&self, name: &str) -> Option<SpanData> {
        self.spans().into_iter().find(|span| span.name == name)
    }

    /// Emitted log records in emit order.
    pub fn logs(&self) -> Vec<SdkLogRecord> {
        self.logs
            .get_emitted_logs()
            .map(|logs| logs.into_iter().map(|log| log.record).collect())
            .unwrap_or_default()
    }

    pub fn reset(&self) {
        self.spans.reset();
        self.logs.reset();
    }
}

impl Default for Capture {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up a span attribute by key.
pub fn span_attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

/// Look up a log record attribute by key.
pub fn log_attribute<'a>(record: &'a SdkLogRecord, key: &str) -> Option<&'a AnyValue> {
    record
        .attributes_iter()
        .find(|(k, _)| k.as_str() == key)
        .map(|(_, v)| v)
}

/// The record body as text, if it is a string.
pub fn log_body(record: &SdkLogRecord) -> Option<&str> {
    match record.body() {
        Some(AnyValue::String(body)) => Some(body.as_str()),
        _ => None,
    }
}

/// Whether a span has no parent.
pub fn is_root(span: &SpanData) -> bool {
    span.parent_span_id == SpanId::INVALID
}

/// One exported span as a JSON object.
pub fn span_to_json(span: &SpanData) -> Json {
    let attributes: Map<String, Json> = span
        .attributes
        .iter()
        .map(|kv| (kv.key.as_str().to_string(), value_to_json(&kv.value)))
        .collect();
    let status = match &span.status {
        Status::Ok => json!({ "code": "ok" }),
        Status::Error { description } => json!({ "code": "error", "message": description }),
        Status::Unset => json!({ "code": "unset" }),
    };
    json!({
        "name": span.name,
        "traceId": span.span_context.trace_id().to_string(),
        "spanId": span.span_context.span_id().to_string(),
        "parentSpanId": (!is_root(span)).then(|| span.parent_span_id.to_string()),
        "start": DateTime::<Utc>::from(span.start_time).to_rfc3339(),
        "end": DateTime::<Utc>::from(span.end_time).to_rfc3339(),
        "status": status,
        "attributes": attributes,
    })
}

/// One emitted log record as a JSON object.
pub fn log_to_json(record: &SdkLogRecord) -> Json {
    let attributes: Map<String, Json> = record
        .attributes_iter()
        .map(|(key, value)| (key.as_str().to_string(), any_value_to_json(value)))
        .collect();
    let trace = record.trace_context();
    json!({
        "timestamp": record.timestamp().map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
        "level": record.severity_text(),
        "message": log_body(record),
        "traceId": trace.map(|t| t.trace_id.to_string()),
        "spanId": trace.map(|t| t.span_id.to_string()),
        "attributes": attributes,
    })
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Bool(v) => json!(v),
        Value::I64(v) => json!(v),
        Value::F64(v) => json!(v),
        Value::String(v) => json!(v.as_str()),
        other => json!(other.to_string()),
    }
}

fn any_value_to_json(value: &AnyValue) -> Json {
    match value {
        AnyValue::Boolean(v) => json!(v),
        AnyValue::Int(v) => json!(v),
        AnyValue::Double(v) => json!(v),
        AnyValue::String(v) => json!(v.as_str()),
        other => json!(format!("{other:?}")),
    }
}
