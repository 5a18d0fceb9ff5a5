// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Diagnostics subscriber initialization.

use std::io;
use std::sync::Arc;

use tracing::{warn, Level};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use super::pipeline::TelemetryPipeline;
use super::DIAGNOSTICS_TARGET;
use crate::logging::{TelemetryLayer, TelemetryLogger};

/// Configuration for the process-wide `tracing` subscriber.
#[derive(Clone)]
pub struct DiagnosticsConfig {
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,

    /// Whether to include span events (enter/exit).
    pub include_span_events: bool,

    /// Whether to include file/line information.
    pub include_file_line: bool,

    /// Whether to include target module path.
    pub include_target: bool,

    /// Whether to use ANSI colors in output.
    pub ansi_colors: bool,

    /// Whether to use compact log format.
    pub compact: bool,

    /// Custom filter directive (overrides default_level).
    pub filter_directive: Option<String>,

    /// Forward host `tracing` events into this logger as log records.
    pub bridge: Option<Arc<TelemetryLogger>>,

    /// Export spans through this pipeline. The guard shuts it down on drop.
    pub pipeline: Option<TelemetryPipeline>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            include_span_events: false,
            include_file_line: false,
            include_target: true,
            ansi_colors: true,
            compact: true,
            filter_directive: None,
            bridge: None,
            pipeline: None,
        }
    }
}

impl DiagnosticsConfig {
    /// Verbose output for local development.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            include_file_line: true,
            include_target: true,
            ansi_colors: true,
            compact: false,
            filter_directive: None,
            bridge: None,
            pipeline: None,
        }
    }

    /// Minimal output for production.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_span_events: false,
            include_file_line: false,
            include_target: false,
            ansi_colors: false,
            compact: true,
            filter_directive: None,
            bridge: None,
            pipeline: None,
        }
    }

    /// Trace-level output for tests.
    pub fn testing() -> Self {
        Self {
            default_level: Level::TRACE,
            include_span_events: true,
            include_file_line: true,
            include_target: true,
            ansi_colors: false,
            compact: false,
            filter_directive: Some("hooktrace=trace".to_string()),
            bridge: None,
            pipeline: None,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    pub fn with_bridge(mut self, logger: Arc<TelemetryLogger>) -> Self {
        self.bridge = Some(logger);
        self
    }

    pub fn with_pipeline(mut self, pipeline: TelemetryPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    fn env_filter(&self) -> EnvFilter {
        // RUST_LOG takes precedence unless an explicit directive is set
        let fallback = || EnvFilter::new(self.default_level.to_string());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

impl std::fmt::Debug for DiagnosticsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsConfig")
            .field("default_level", &self.default_level)
            .field("include_span_events", &self.include_span_events)
            .field("compact", &self.compact)
            .field("filter_directive", &self.filter_directive)
            .field("bridge", &self.bridge.is_some())
            .field("pipeline", &self.pipeline.is_some())
            .finish()
    }
}

/// Guard kept alive for the duration of the program.
///
/// Dropping it flushes and shuts down the export pipeline, if one was
/// installed, so spans still buffered at exit are not lost.
pub struct DiagnosticsGuard {
    pipeline: Option<TelemetryPipeline>,
}

impl DiagnosticsGuard {
    pub fn pipeline(&self) -> Option<&TelemetryPipeline> {
        self.pipeline.as_ref()
    }
}

impl Drop for DiagnosticsGuard {
    fn drop(&mut self) {
        let Some(pipeline) = self.pipeline.take() else {
            return;
        };
        if let Err(err) = pipeline.force_flush().and_then(|()| pipeline.shutdown()) {
            warn!(target: DIAGNOSTICS_TARGET, error = %err, "Telemetry pipeline did not shut down cleanly");
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// The env filter applies to console output only; invocation spans reach the
/// pipeline whatever the console level. Call once at startup; a second call
/// fails because a global subscriber is already set.
pub fn init_diagnostics(config: &DiagnosticsConfig) -> io::Result<DiagnosticsGuard> {
    let span_events = if config.include_span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events);

    let console = if config.compact {
        fmt_layer.compact().with_filter(config.env_filter()).boxed()
    } else {
        fmt_layer.with_filter(config.env_filter()).boxed()
    };

    let spans = config.pipeline.as_ref().map(|pipeline| pipeline.span_layer());
    let bridge = config.bridge.clone().map(TelemetryLayer::new);

    tracing_subscriber::registry()
        .with(console)
        .with(spans)
        .with(bridge)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(DiagnosticsGuard {
        pipeline: config.pipeline.clone(),
    })
}
