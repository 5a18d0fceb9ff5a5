// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! hooktrace - method-level tracing and logging for service layers.
//!
//! Attaches spans and structured log records to calls on a host's services
//! without touching the services' own code. Methods are decorated once at
//! startup; when instrumentation is off they run untouched.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`hooks`] - Hook descriptors, the registry, and the method interceptor
//! - [`telemetry`] - Spans, the ambient span context, the OpenTelemetry
//!   export pipeline, and metrics
//! - [`logging`] - Leveled logging exported as OpenTelemetry log records
//! - [`activation`] - The process-wide instrumentation switch
//! - [`plugin`] - Startup wiring of options, log sinks, and hooks
//! - [`config`] - JSON/YAML configuration files
//! - [`error`] - Error types and result aliases
//! - [`demo`] - An order/inventory catalog used by the CLI
//!
//! # Example
//!
//! ```rust,ignore
//! use hooktrace::plugin::{TelemetryOptions, TelemetryPlugin};
//! use hooktrace::telemetry::{init_diagnostics, DiagnosticsConfig, TelemetryPipeline};
//!
//! let pipeline = TelemetryPipeline::stdout();
//! let _guard = init_diagnostics(&DiagnosticsConfig::default().with_pipeline(pipeline.clone()))?;
//!
//! let runtime = TelemetryPlugin::init(TelemetryOptions::default())
//!     .with_pipeline(&pipeline)
//!     .build(services)?;
//!
//! let order = runtime.call("OrderService", "placeOrder", vec!["X123".into()]).await?;
//! ```

pub mod activation;
pub mod config;
pub mod demo;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod plugin;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use activation::ActivationGate;
pub use error::{
    CallError, ConfigError, ExportError, InvocationError, PluginError, RegistrationError, Result,
};
pub use hooks::{
    BeforeAction, CallSite, ErrorAction, HookDescriptor, HookRegistry, HookSet, InstalledServices,
    MethodSelector, ServiceDefinition, TargetId,
};
pub use logging::{LogLevel, Logger, TelemetryLogger};
pub use plugin::{TelemetryOptions, TelemetryPlugin, TelemetryRuntime};
pub use telemetry::{InstrumentationStrategy, SpanHandle, SpanStrategy, TelemetryPipeline};

/// hooktrace version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let _gate = ActivationGate::disabled();
        let _hooks = HookSet::new();
        let _options = TelemetryOptions::default();
    }
}
