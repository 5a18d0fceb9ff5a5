// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bridge from host `tracing` events to telemetry log records.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use super::adapter::{Logger, TelemetryLogger};
use super::level::LogLevel;

/// Events from these targets are ignored, so emitting a record can never feed
/// back into the bridge through our own or the SDK's diagnostics.
const IGNORED_TARGET_PREFIXES: [&str; 2] = ["hooktrace", "opentelemetry"];

/// Collects the message and fields of an event.
#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    attributes: Vec<KeyValue>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.attributes.push(KeyValue::new(field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let text = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.attributes.push(KeyValue::new(field.name(), text));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.attributes.push(KeyValue::new(field.name(), value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.attributes.push(KeyValue::new(field.name(), value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        let kv = match i64::try_from(value) {
            Ok(v) => KeyValue::new(field.name(), v),
            Err(_) => KeyValue::new(field.name(), value.to_string()),
        };
        self.attributes.push(kv);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.attributes.push(KeyValue::new(field.name(), value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.attributes.push(KeyValue::new(field.name(), value));
    }
}

/// A [`Layer`] that forwards `tracing` events to a [`TelemetryLogger`].
///
/// The event's level maps one-to-one onto [`LogLevel`], its `message` field
/// becomes the record message, and other fields become attributes. The
/// event target is kept as the `log.target` attribute.
pub struct TelemetryLayer {
    logger: Arc<TelemetryLogger>,
}

impl TelemetryLayer {
    pub fn new(logger: Arc<TelemetryLogger>) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for TelemetryLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if IGNORED_TARGET_PREFIXES
            .iter()
            .any(|prefix| meta.target().starts_with(prefix))
        {
            return;
        }

        let level = LogLevel::from(*meta.level());
        if !self.logger.is_enabled(level) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        visitor
            .attributes
            .push(KeyValue::new("log.target", meta.target().to_string()));

        let message = visitor.message.unwrap_or_default();
        self.logger.log(level, &message, visitor.attributes);
    }
}
