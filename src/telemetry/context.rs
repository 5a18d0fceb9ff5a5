// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ambient active-span context.
//!
//! The active span is whatever `tracing` considers current. The interceptor
//! instruments each call chain with its span, so the span follows `.await`
//! points and concurrent chains each see their own. Tasks spawned with
//! `tokio::spawn` start without one; use `Instrument::in_current_span` to
//! carry it over.

use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry::Value;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// The span currently active for this call chain.
pub fn current_span() -> Span {
    Span::current()
}

/// Ids of the active span, if one is being exported.
pub fn current_span_context() -> Option<SpanContext> {
    let context = Span::current().context();
    let span_context = context.span().span_context().clone();
    span_context.is_valid().then_some(span_context)
}

/// Set an attribute on the active span. Returns false when no span is active.
pub fn set_attribute(key: impl Into<String>, value: impl Into<Value>) -> bool {
    let span = Span::current();
    if span.is_none() || span.is_disabled() {
        return false;
    }
    span.set_attribute(key.into(), value.into());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::capture::{span_attribute, Capture};
    use tracing::Instrument;

    #[test]
    fn test_no_span_outside_scope() {
        let capture = Capture::new();
        let _guard = capture.set_default();
        assert!(current_span_context().is_none());
        assert!(!set_attribute("key", "value"));
    }

    #[test]
    fn test_nested_spans_share_trace() {
        let capture = Capture::new();
        let _guard = capture.set_default();

        let outer = tracing::info_span!("outer");
        let outer_ids = outer.in_scope(|| current_span_context()).unwrap();
        let inner_ids = outer
            .in_scope(|| tracing::info_span!("inner").in_scope(current_span_context))
            .unwrap();

        assert_eq!(inner_ids.trace_id(), outer_ids.trace_id());
        assert_ne!(inner_ids.span_id(), outer_ids.span_id());
    }

    #[tokio::test]
    async fn test_context_survives_suspension() {
        let capture = Capture::new();
        let _guard = capture.set_default();

        let span = tracing::info_span!("op");
        async {
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            assert!(current_span_context().is_some());
            assert!(set_attribute("resumed", true));
        }
        .instrument(span)
        .await;

        let op = capture.span_named("op").unwrap();
        assert_eq!(span_attribute(&op, "resumed"), Some(&Value::Bool(true)));
    }
}
