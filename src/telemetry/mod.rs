// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Spans, the ambient span context, the export pipeline, and invocation metrics.
//!
//! - **Strategy**: [`InstrumentationStrategy`] turns an intercepted call into a
//!   span; [`SpanStrategy`] is the default and emits `tracing` spans
//! - **Context**: the active span is the current `tracing` span
//! - **Pipeline**: [`TelemetryPipeline`] exports spans and log records through
//!   the OpenTelemetry SDK
//! - **Metrics**: per-method call counts and latency histograms
//!
//! # Usage
//!
//! Hooks can annotate the span of the call they run in:
//!
//! ```rust,ignore
//! use hooktrace::hooks::{BeforeAction, HookSet};
//! use hooktrace::telemetry::context;
//!
//! let hooks = HookSet::new().before(|_, args| {
//!     if let Some(id) = args.first().and_then(|v| v.as_str()) {
//!         context::set_attribute("orderId", id.to_string());
//!     }
//!     Ok(BeforeAction::Continue(args))
//! });
//! ```

pub mod capture;
pub mod context;
mod init;
pub mod metrics;
pub mod pipeline;
mod span;
pub mod strategy;

pub use capture::Capture;
pub use init::{init_diagnostics, DiagnosticsConfig, DiagnosticsGuard};
pub use metrics::{LatencyHistogram, MethodMetrics, Metrics, MetricsSnapshot};
pub use pipeline::{TelemetryPipeline, TelemetryPipelineBuilder, CONSOLE_SINK, INSTRUMENTATION_SCOPE};
pub use span::SpanHandle;
pub use strategy::{
    scalar_attribute, ArgumentPolicy, InstrumentationStrategy, SpanStrategy, SpanStrategyOptions, SPAN_TARGET,
};

/// Tracing target for problems inside the instrumentation layer itself.
pub const DIAGNOSTICS_TARGET: &str = "hooktrace::diagnostics";
