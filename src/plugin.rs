// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Startup wiring.
//!
//! [`TelemetryPlugin`] gathers options, log sinks, and hook descriptors, then
//! [`TelemetryPlugin::build`] registers everything against the host's
//! services and returns the [`TelemetryRuntime`] the host dispatches through.
//! Built-in default hooks are registered ahead of caller-supplied ones.
//!
//! Invocation spans are `tracing` spans; where they are exported is decided
//! by the subscriber the host installs (see [`TelemetryPipeline::span_layer`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use opentelemetry_sdk::logs::SdkLoggerProvider;
use serde_json::Value;
use tracing::info;

use crate::activation::ActivationGate;
use crate::config::TelemetryFileConfig;
use crate::error::{CallError, ConfigError, PluginError};
use crate::hooks::{Args, HookDescriptor, HookRegistry, InstalledServices, ServiceDefinition};
use crate::logging::{Logger, LoggerOptions, TelemetryLogger};
use crate::telemetry::{
    InstrumentationStrategy, Metrics, SpanStrategy, SpanStrategyOptions, TelemetryPipeline,
};

pub use crate::telemetry::CONSOLE_SINK;

/// Caller configuration.
pub struct TelemetryOptions {
    /// Hook descriptors registered after the built-in defaults.
    pub method_hooks: Vec<HookDescriptor>,
    /// Minimum level per log sink.
    pub logger_options: LoggerOptions,
    /// Options for the default span strategy; `None` turns spans off.
    pub strategy: Option<SpanStrategyOptions>,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            method_hooks: Vec::new(),
            logger_options: LoggerOptions::new(),
            strategy: Some(SpanStrategyOptions::default()),
        }
    }
}

impl TelemetryOptions {
    pub fn with_method_hooks(mut self, hooks: impl IntoIterator<Item = HookDescriptor>) -> Self {
        self.method_hooks.extend(hooks);
        self
    }

    pub fn with_logger_options(mut self, options: LoggerOptions) -> Self {
        self.logger_options = options;
        self
    }

    pub fn without_spans(mut self) -> Self {
        self.strategy = None;
        self
    }
}

impl std::fmt::Debug for TelemetryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryOptions")
            .field("method_hooks", &self.method_hooks.len())
            .field("logger_options", &self.logger_options)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Builder for the telemetry runtime.
pub struct TelemetryPlugin {
    gate: ActivationGate,
    options: TelemetryOptions,
    default_hooks: Vec<HookDescriptor>,
    log_sinks: BTreeMap<String, SdkLoggerProvider>,
    strategy: Option<Arc<dyn InstrumentationStrategy>>,
    metrics: Option<Arc<Metrics>>,
    logger: Option<Arc<TelemetryLogger>>,
}

impl TelemetryPlugin {
    /// Start from `options`, gated by the process environment.
    pub fn init(options: TelemetryOptions) -> Self {
        Self {
            gate: ActivationGate::from_env(),
            options,
            default_hooks: Vec::new(),
            log_sinks: BTreeMap::new(),
            strategy: None,
            metrics: None,
            logger: None,
        }
    }

    pub fn with_gate(mut self, gate: ActivationGate) -> Self {
        self.gate = gate;
        self
    }

    /// Built-in hooks, registered before any caller-supplied descriptor.
    pub fn with_default_hooks(mut self, hooks: Vec<HookDescriptor>) -> Self {
        self.default_hooks = hooks;
        self
    }

    /// Append caller-supplied descriptors.
    pub fn add_method_hooks(&mut self, hooks: impl IntoIterator<Item = HookDescriptor>) {
        self.options.method_hooks.extend(hooks);
    }

    /// Add a named log sink. `loggerOptions` refers to sinks by this name.
    pub fn with_log_sink(mut self, name: impl Into<String>, provider: SdkLoggerProvider) -> Self {
        self.log_sinks.insert(name.into(), provider);
        self
    }

    /// Add every log sink of `pipeline`.
    pub fn with_pipeline(mut self, pipeline: &TelemetryPipeline) -> Self {
        self.log_sinks
            .extend(pipeline.log_sinks().iter().map(|(name, provider)| (name.clone(), provider.clone())));
        self
    }

    /// Replace the default span strategy.
    pub fn with_strategy(mut self, strategy: Arc<dyn InstrumentationStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Apply a loaded config file: logger cutoffs, strategy options, and
    /// declarative hooks.
    ///
    /// Must run before [`TelemetryPlugin::logger`] is first called, since
    /// the logger is built once.
    pub fn apply_config(&mut self, config: &TelemetryFileConfig) -> Result<(), ConfigError> {
        if self.logger.is_some() {
            return Err(ConfigError::invalid(
                "loggerOptions",
                "logger was already built",
            ));
        }
        self.options.logger_options.extend(config.logger_options.clone());
        self.options.strategy = config.spans_enabled().then(|| config.strategy_options());

        let logger: Arc<dyn Logger> = self.logger()?;
        let descriptors = config.descriptors(logger);
        self.add_method_hooks(descriptors);
        Ok(())
    }

    /// The shared logger, built on first use.
    ///
    /// Built from the logger options and sinks whatever the gate says: the
    /// gate controls interception, not logging. With no sink configured the
    /// logger writes to a stdout sink named `console`.
    pub fn logger(&mut self) -> Result<Arc<TelemetryLogger>, ConfigError> {
        if let Some(logger) = &self.logger {
            return Ok(Arc::clone(logger));
        }

        if self.log_sinks.is_empty() {
            let console = SdkLoggerProvider::builder()
                .with_simple_exporter(opentelemetry_stdout::LogExporter::default())
                .build();
            self.log_sinks.insert(CONSOLE_SINK.to_string(), console);
        }
        let logger = Arc::new(TelemetryLogger::from_options(
            &self.options.logger_options,
            &self.log_sinks,
        )?);
        self.logger = Some(Arc::clone(&logger));
        Ok(logger)
    }

    /// Register every descriptor against `services` and install interceptors.
    pub fn build(
        mut self,
        services: impl IntoIterator<Item = ServiceDefinition>,
    ) -> Result<TelemetryRuntime, PluginError> {
        let logger = self.logger()?;

        let mut registry = HookRegistry::new(self.gate);
        if let Some(metrics) = &self.metrics {
            registry = registry.with_metrics(Arc::clone(metrics));
        }
        for service in services {
            registry.add_service(service)?;
        }

        let defaults = self.default_hooks.len();
        let configured = self.options.method_hooks.len();
        registry.register_all(self.default_hooks)?;
        registry.register_all(self.options.method_hooks)?;

        let strategy = self.strategy.or_else(|| {
            self.options.strategy.map(|options| {
                Arc::new(SpanStrategy::with_options(options)) as Arc<dyn InstrumentationStrategy>
            })
        });
        let services = registry.install(strategy);

        info!(
            enabled = self.gate.is_enabled(),
            default_hooks = defaults,
            method_hooks = configured,
            interceptors = services.interceptor_count(),
            "Telemetry runtime ready"
        );

        Ok(TelemetryRuntime {
            gate: self.gate,
            services,
            logger,
            metrics: self.metrics,
        })
    }
}

/// The assembled runtime: decorated services plus the shared logger.
#[derive(Clone)]
pub struct TelemetryRuntime {
    gate: ActivationGate,
    services: InstalledServices,
    logger: Arc<TelemetryLogger>,
    metrics: Option<Arc<Metrics>>,
}

impl TelemetryRuntime {
    pub fn services(&self) -> &InstalledServices {
        &self.services
    }

    pub fn logger(&self) -> Arc<TelemetryLogger> {
        Arc::clone(&self.logger)
    }

    pub fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.as_ref()
    }

    pub fn gate(&self) -> ActivationGate {
        self.gate
    }

    /// Invoke a method through the installed table.
    pub async fn call(&self, target: &str, method: &str, args: Args) -> Result<Value, CallError> {
        self.services.call(target, method, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{BeforeAction, HookSet};
    use crate::logging::LogLevel;
    use crate::telemetry::capture::{log_body, Capture, MEMORY_SINK};
    use serde_json::json;
    use std::sync::Mutex;

    fn echo_service() -> ServiceDefinition {
        ServiceDefinition::new("EchoService").sync_method("echo", |args| Ok(json!(args)))
    }

    fn recording(tag: &'static str, seen: Arc<Mutex<Vec<&'static str>>>) -> HookSet {
        HookSet::new().before(move |_, args| {
            seen.lock().unwrap().push(tag);
            Ok(BeforeAction::Continue(args))
        })
    }

    #[tokio::test]
    async fn test_defaults_run_before_caller_hooks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let options = TelemetryOptions::default().with_method_hooks([HookDescriptor::all_methods(
            "EchoService",
            recording("caller", seen.clone()),
        )]);
        let runtime = TelemetryPlugin::init(options)
            .with_gate(ActivationGate::enabled())
            .with_default_hooks(vec![HookDescriptor::all_methods(
                "EchoService",
                recording("default", seen.clone()),
            )])
            .build([echo_service()])
            .unwrap();

        runtime.call("EchoService", "echo", vec![json!(1)]).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["default", "caller"]);
    }

    #[tokio::test]
    async fn test_spans_follow_current_subscriber() {
        let capture = Capture::new();
        let _guard = capture.set_default();
        let runtime = TelemetryPlugin::init(TelemetryOptions::default())
            .with_gate(ActivationGate::enabled())
            .with_pipeline(capture.pipeline())
            .build([echo_service()])
            .unwrap();

        runtime.call("EchoService", "echo", vec![]).await.unwrap();
        assert!(capture.span_named("EchoService.echo").is_some());
    }

    #[tokio::test]
    async fn test_disabled_gate_is_passthrough() {
        let capture = Capture::new();
        let _guard = capture.set_default();
        let runtime = TelemetryPlugin::init(TelemetryOptions::default())
            .with_gate(ActivationGate::disabled())
            .with_pipeline(capture.pipeline())
            .with_metrics(Arc::new(Metrics::new()))
            .build([echo_service()])
            .unwrap();

        let result = runtime.call("EchoService", "echo", vec![json!("a")]).await.unwrap();
        assert_eq!(result, json!(["a"]));
        assert_eq!(runtime.services().interceptor_count(), 0);
        assert!(capture.spans().is_empty());
    }

    #[test]
    fn test_disabled_gate_still_logs_to_configured_sinks() {
        let capture = Capture::new();
        let mut plugin = TelemetryPlugin::init(TelemetryOptions::default())
            .with_gate(ActivationGate::disabled())
            .with_pipeline(capture.pipeline());

        let logger = plugin.logger().unwrap();
        assert_eq!(logger.sink_names(), vec![MEMORY_SINK]);
        logger.log(LogLevel::Error, "payment failed", Vec::new());

        let logs = capture.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(log_body(&logs[0]), Some("payment failed"));
    }

    #[test]
    fn test_logger_defaults_to_console_sink() {
        let mut plugin =
            TelemetryPlugin::init(TelemetryOptions::default()).with_gate(ActivationGate::enabled());
        let logger = plugin.logger().unwrap();
        assert_eq!(logger.sink_names(), vec![CONSOLE_SINK]);
        assert!(Arc::ptr_eq(&logger, &plugin.logger().unwrap()));
    }

    #[test]
    fn test_apply_config_after_logger_fails() {
        let mut plugin =
            TelemetryPlugin::init(TelemetryOptions::default()).with_gate(ActivationGate::enabled());
        plugin.logger().unwrap();
        assert!(plugin.apply_config(&TelemetryFileConfig::default()).is_err());
    }

    #[test]
    fn test_unknown_target_fails_build() {
        let options = TelemetryOptions::default()
            .with_method_hooks([HookDescriptor::all_methods("Missing", HookSet::new())]);
        let err = TelemetryPlugin::init(options)
            .with_gate(ActivationGate::enabled())
            .build([echo_service()])
            .err()
            .unwrap();
        assert!(matches!(err, PluginError::Registration(_)));
    }

    #[test]
    fn test_logger_options_select_sink_levels() {
        let capture = Capture::new();
        let options = TelemetryOptions::default()
            .with_logger_options(LoggerOptions::from([(MEMORY_SINK.to_string(), LogLevel::Error)]));
        let mut plugin = TelemetryPlugin::init(options)
            .with_gate(ActivationGate::enabled())
            .with_pipeline(capture.pipeline());
        let logger = plugin.logger().unwrap();
        assert_eq!(logger.min_level(MEMORY_SINK), Some(LogLevel::Error));
        assert!(logger.min_level(CONSOLE_SINK).is_none());
    }
}
