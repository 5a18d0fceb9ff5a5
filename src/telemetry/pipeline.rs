// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The OpenTelemetry export pipeline.
//!
//! Invocation spans are ordinary `tracing` spans; the pipeline's span layer
//! (from `tracing-opentelemetry`) assigns trace and span ids, links parents,
//! and hands finished spans to the SDK tracer provider. Log records go through
//! named logger providers, one per sink.

use std::collections::BTreeMap;

use opentelemetry::logs::LoggerProvider as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::logs::{LogExporter, SdkLoggerProvider};
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider, SpanExporter};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

use crate::error::ExportError;

/// Instrumentation scope name on every exported span and log record.
pub const INSTRUMENTATION_SCOPE: &str = "hooktrace";

/// Name of the stdout log sink.
pub const CONSOLE_SINK: &str = "console";

/// Tracer provider plus the named log sinks.
///
/// Cloning is cheap; providers share their processors.
#[derive(Clone, Debug)]
pub struct TelemetryPipeline {
    tracer_provider: SdkTracerProvider,
    log_sinks: BTreeMap<String, SdkLoggerProvider>,
}

impl TelemetryPipeline {
    pub fn builder() -> TelemetryPipelineBuilder {
        TelemetryPipelineBuilder::default()
    }

    /// Spans and logs printed to stdout, with the log sink named `console`.
    pub fn stdout() -> Self {
        Self::builder()
            .with_span_exporter(opentelemetry_stdout::SpanExporter::default())
            .with_log_exporter(CONSOLE_SINK, opentelemetry_stdout::LogExporter::default())
            .build()
    }

    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        &self.tracer_provider
    }

    pub fn log_sinks(&self) -> &BTreeMap<String, SdkLoggerProvider> {
        &self.log_sinks
    }

    /// Layer that turns `tracing` spans into OpenTelemetry spans.
    ///
    /// Source locations and thread ids are left off: the span already
    /// carries `code.namespace` and `code.function` for the intercepted call.
    pub fn span_layer<S>(&self) -> OpenTelemetryLayer<S, SdkTracer>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        tracing_opentelemetry::layer()
            .with_tracer(self.tracer_provider.tracer(INSTRUMENTATION_SCOPE))
            .with_location(false)
            .with_threads(false)
            .with_tracked_inactivity(false)
            .with_error_events_to_status(false)
    }

    /// A bare subscriber exporting spans through this pipeline.
    ///
    /// Handy for tests and embedders that install their own subscriber with
    /// `tracing::subscriber::set_default`.
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
        tracing_subscriber::registry().with(self.span_layer())
    }

    /// Push out anything still buffered in span or log processors.
    pub fn force_flush(&self) -> Result<(), ExportError> {
        self.tracer_provider.force_flush().map_err(ExportError::Flush)?;
        for provider in self.log_sinks.values() {
            provider.force_flush().map_err(ExportError::Flush)?;
        }
        Ok(())
    }

    /// Shut every provider down. Spans and logs recorded afterwards are dropped.
    pub fn shutdown(&self) -> Result<(), ExportError> {
        let mut first_error = self.tracer_provider.shutdown().err();
        for provider in self.log_sinks.values() {
            if let Err(err) = provider.shutdown() {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(ExportError::Shutdown(err)),
            None => Ok(()),
        }
    }
}

impl Default for TelemetryPipeline {
    /// No exporters: spans get ids and parents but go nowhere.
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`TelemetryPipeline`].
#[derive(Default)]
pub struct TelemetryPipelineBuilder {
    tracer: Option<opentelemetry_sdk::trace::TracerProviderBuilder>,
    log_sinks: BTreeMap<String, SdkLoggerProvider>,
}

impl TelemetryPipelineBuilder {
    /// Export every finished span synchronously to `exporter`.
    pub fn with_span_exporter(mut self, exporter: impl SpanExporter + 'static) -> Self {
        let builder = self.tracer.take().unwrap_or_else(SdkTracerProvider::builder);
        self.tracer = Some(builder.with_simple_exporter(exporter));
        self
    }

    /// Add a log sink that exports each record synchronously to `exporter`.
    pub fn with_log_exporter(self, name: impl Into<String>, exporter: impl LogExporter + 'static) -> Self {
        let provider = SdkLoggerProvider::builder().with_simple_exporter(exporter).build();
        self.with_log_sink(name, provider)
    }

    /// Add a preconfigured logger provider as a named sink. A later sink with
    /// the same name replaces the earlier one.
    pub fn with_log_sink(mut self, name: impl Into<String>, provider: SdkLoggerProvider) -> Self {
        self.log_sinks.insert(name.into(), provider);
        self
    }

    pub fn build(self) -> TelemetryPipeline {
        let tracer_provider = self
            .tracer
            .unwrap_or_else(SdkTracerProvider::builder)
            .build();
        TelemetryPipeline {
            tracer_provider,
            log_sinks: self.log_sinks,
        }
    }
}

/// Logger for a sink, scoped to this crate.
pub(crate) fn sink_logger(provider: &SdkLoggerProvider) -> opentelemetry_sdk::logs::SdkLogger {
    provider.logger(INSTRUMENTATION_SCOPE)
}
