// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module.
//!
//! Loads telemetry settings from a JSON or YAML file:
//! - `loggerOptions`: minimum level per log sink
//! - `strategy`: span naming and argument recording
//! - `hooks`: declarative hooks that record arguments and emit log records
//!
//! Files are searched as `hooktrace.json`, `hooktrace.yaml`, then
//! `.hooktrace/config.json`.

mod loader;
mod types;

pub use loader::{example_config, find_config, load_config, load_config_file, CONFIG_FILES};
pub use types::{ConfiguredHook, LogSpec, StrategyConfig, TelemetryFileConfig};
