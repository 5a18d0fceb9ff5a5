// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Live invocation spans.

use tracing::Span;

use crate::error::CANCELLED_KIND;

/// A started invocation span.
///
/// Wraps the `tracing` span so a strategy can finish it exactly once. If the
/// handle is dropped unfinished (the call future was dropped mid-flight) the
/// span closes with an error status and `error.kind = "Cancelled"`.
#[derive(Debug)]
pub struct SpanHandle {
    span: Span,
    closed: bool,
}

impl SpanHandle {
    pub fn new(span: Span) -> Self {
        Self { span, closed: false }
    }

    /// The underlying span, for instrumenting the call chain.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Close with status OK.
    pub fn finish_ok(mut self) {
        self.span.record("otel.status_code", "OK");
        self.closed = true;
    }

    /// Close with status ERROR and the error's kind and message.
    pub fn finish_error(mut self, kind: &str, message: &str) {
        record_error(&self.span, kind, message);
        self.closed = true;
    }
}

impl Drop for SpanHandle {
    fn drop(&mut self) {
        if !self.closed {
            record_error(&self.span, CANCELLED_KIND, "call dropped before completion");
        }
    }
}

// Status code goes first: a later `otel.status_message` refines the error.
fn record_error(span: &Span, kind: &str, message: &str) {
    span.record("otel.status_code", "ERROR");
    span.record("otel.status_message", message);
    span.record("error.kind", kind);
    span.record("error.message", message);
}
