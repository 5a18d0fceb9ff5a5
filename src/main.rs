// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! hooktrace main entry point - config checks and the demo scenario.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;

use hooktrace::config::{self, TelemetryFileConfig};
use hooktrace::demo::{self, Shop, ORDER_SERVICE};
use hooktrace::hooks::HookRegistry;
use hooktrace::logging::{Logger, TelemetryLogger};
use hooktrace::plugin::{TelemetryOptions, TelemetryPlugin};
use hooktrace::telemetry::capture::{self, log_body, span_attribute, Capture};
use hooktrace::telemetry::{init_diagnostics, DiagnosticsConfig, Metrics, TelemetryPipeline, CONSOLE_SINK};
use hooktrace::ActivationGate;
use opentelemetry::trace::Status;
use opentelemetry_sdk::logs::SdkLogRecord;
use opentelemetry_sdk::trace::SpanData;

/// hooktrace version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// hooktrace - method-level tracing and logging for service layers.
#[derive(Parser)]
#[command(name = "hooktrace")]
#[command(author, version, about = "Method-level tracing and logging for service layers", long_about = None)]
struct Cli {
    /// Show debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Show trace output
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for the demo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    /// Raw output of the OpenTelemetry stdout exporters
    Otel,
}

/// Subcommands for hooktrace.
#[derive(Subcommand)]
enum Commands {
    /// Validate a config file against the demo service catalog
    Check {
        /// Config file (JSON or YAML)
        config: PathBuf,
    },

    /// Run the order scenario and print spans, log records, and metrics
    Demo {
        /// Config file; defaults to one found in the current directory
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (text, json, or otel)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Also place an order that runs out of stock
        #[arg(long)]
        fail: bool,

        /// Instrument even when HOOKTRACE_ENABLE_INSTRUMENTATION is unset
        #[arg(long)]
        enable: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.trace {
        tracing::Level::TRACE
    } else if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    // The demo exports spans; other commands only need console diagnostics.
    let capture = Capture::with_sink_name(CONSOLE_SINK);
    let pipeline = match &cli.command {
        Commands::Demo {
            format: OutputFormat::Otel,
            ..
        } => Some(TelemetryPipeline::stdout()),
        Commands::Demo { .. } => Some(capture.pipeline().clone()),
        _ => None,
    };
    let mut diagnostics = DiagnosticsConfig::default().with_level(level);
    if let Some(pipeline) = &pipeline {
        diagnostics = diagnostics.with_pipeline(pipeline.clone());
    }
    let _guard = init_diagnostics(&diagnostics)?;

    match cli.command {
        Commands::Check { config } => check(&config),
        Commands::Demo {
            config,
            format,
            fail,
            enable,
        } => {
            let gate = if enable {
                ActivationGate::enabled()
            } else {
                ActivationGate::from_env()
            };
            let pipeline = pipeline.unwrap_or_default();
            run_demo(config.as_deref(), format, fail, gate, &pipeline, &capture).await
        }
        Commands::Version => {
            println!("hooktrace {}", VERSION);
            Ok(())
        }
    }
}

fn check(path: &Path) -> anyhow::Result<()> {
    let file = config::load_config_file(path)?;
    let shop = Shop::new();

    let mut registry = HookRegistry::new(ActivationGate::enabled());
    for definition in shop.definitions() {
        registry.add_service(definition)?;
    }

    let logger: Arc<dyn Logger> = Arc::new(TelemetryLogger::new());
    let mut failures = 0;
    for descriptor in file.descriptors(logger) {
        let label = format!("{} ({})", descriptor.target, descriptor.hooks.name());
        match registry.register(descriptor) {
            Ok(()) => println!("{} {}", "✓".green(), label),
            Err(err) => {
                failures += 1;
                println!("{} {}: {}", "✗".red(), label, err);
            }
        }
    }

    if !file.logger_options.is_empty() {
        let sinks: Vec<String> = file
            .logger_options
            .iter()
            .map(|(sink, level)| format!("{sink}>={level}"))
            .collect();
        println!("Logger options: {}", sinks.join(", "));
    }
    println!(
        "Spans: {}",
        if file.spans_enabled() { "enabled" } else { "disabled" }
    );

    if failures > 0 {
        anyhow::bail!("{failures} hook(s) failed to register");
    }
    println!("{}", format!("{} hook(s) valid", file.hooks.len()).bright_green());
    Ok(())
}

fn load_demo_config(path: Option<&Path>) -> anyhow::Result<TelemetryFileConfig> {
    if let Some(path) = path {
        return Ok(config::load_config_file(path)?);
    }
    let cwd = std::env::current_dir()?;
    Ok(config::load_config(&cwd)?.unwrap_or_else(config::example_config))
}

async fn run_demo(
    config_path: Option<&Path>,
    format: OutputFormat,
    fail: bool,
    gate: ActivationGate,
    pipeline: &TelemetryPipeline,
    capture: &Capture,
) -> anyhow::Result<()> {
    let file = load_demo_config(config_path)?;
    let metrics = Arc::new(Metrics::new());

    let mut plugin = TelemetryPlugin::init(TelemetryOptions::default())
        .with_gate(gate)
        .with_pipeline(pipeline)
        .with_metrics(Arc::clone(&metrics));
    plugin.apply_config(&file)?;
    let logger = plugin.logger()?;
    let plugin = plugin.with_default_hooks(vec![demo::order_hooks(logger)]);

    let shop = Shop::new();
    let runtime = plugin.build(shop.definitions())?;
    shop.wire(runtime.services().clone());

    if !gate.is_enabled() {
        eprintln!(
            "{}",
            "Instrumentation is disabled; set HOOKTRACE_ENABLE_INSTRUMENTATION=1 or pass --enable"
                .yellow()
        );
    }

    let mut orders = vec!["X123"];
    if fail {
        orders.push("X999");
    }

    for order in orders {
        let result = runtime
            .call(ORDER_SERVICE, "placeOrder", vec![json!(order)])
            .await;
        match (format, result) {
            (OutputFormat::Json, result) => {
                let outcome = match result {
                    Ok(value) => json!({ "ok": value }),
                    Err(err) => json!({ "error": err.to_string() }),
                };
                println!("{}", json!({ "type": "result", "data": { "orderId": order, "outcome": outcome } }));
            }
            (_, Ok(value)) => println!("{} placeOrder({order}) -> {value}", "→".cyan()),
            (_, Err(err)) => println!("{} placeOrder({order}) -> {err}", "→".red()),
        }
    }

    pipeline.force_flush()?;
    match format {
        OutputFormat::Text => {
            print_spans(&capture.spans());
            print_logs(&capture.logs());
            println!("\n{}", metrics.snapshot().format_report());
        }
        OutputFormat::Json => {
            for span in capture.spans() {
                println!("{}", json!({ "type": "span", "data": capture::span_to_json(&span) }));
            }
            for record in capture.logs() {
                println!("{}", json!({ "type": "log", "data": capture::log_to_json(&record) }));
            }
            let snapshot = metrics.snapshot();
            let mut methods = serde_json::Map::new();
            for (name, m) in &snapshot.methods {
                methods.insert(
                    name.clone(),
                    json!({
                        "invocations": m.invocations,
                        "successes": m.successes,
                        "failures": m.failures,
                        "avgMicros": u64::try_from(m.avg_duration().as_micros()).unwrap_or(u64::MAX),
                        "p99Micros": u64::try_from(m.histogram.p99().as_micros()).unwrap_or(u64::MAX),
                    }),
                );
            }
            println!("{}", json!({ "type": "metrics", "data": methods }));
        }
        OutputFormat::Otel => println!("\n{}", metrics.snapshot().format_report()),
    }
    Ok(())
}

fn print_spans(spans: &[SpanData]) {
    println!("\n{}", "Spans".bright_blue().bold());
    if spans.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for span in spans {
        let indent = if capture::is_root(span) { "  " } else { "    " };
        let status = match &span.status {
            Status::Ok => "ok".green().to_string(),
            Status::Error { .. } => {
                let kind = span_attribute(span, "error.kind")
                    .map(|kind| kind.to_string())
                    .unwrap_or_default();
                format!("error {kind}").red().to_string()
            }
            Status::Unset => "unset".dimmed().to_string(),
        };
        let duration = span.end_time.duration_since(span.start_time).unwrap_or_default();
        let trace_id = span.span_context.trace_id().to_string();
        println!(
            "{indent}{} [{}] {:.2?} trace={}",
            span.name.bright_white(),
            status,
            duration,
            &trace_id[..8]
        );
        for kv in &span.attributes {
            println!("{indent}  {}={}", kv.key.as_str().dimmed(), kv.value);
        }
    }
}

fn print_logs(records: &[SdkLogRecord]) {
    println!("\n{}", "Log records".bright_blue().bold());
    if records.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for record in records {
        let span = record
            .trace_context()
            .map(|trace| format!(" span={}", trace.span_id))
            .unwrap_or_default();
        println!(
            "  {:>5} {}{}",
            record.severity_text().unwrap_or_default().to_uppercase(),
            log_body(record).unwrap_or_default(),
            span.dimmed()
        );
    }
}
