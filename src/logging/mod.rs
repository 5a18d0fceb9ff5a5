// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Leveled logging exported as OpenTelemetry log records.
//!
//! Records carry the trace and span ids of the active span, so logs emitted
//! inside an intercepted call correlate with its span. Host `tracing` events
//! can be bridged in with [`TelemetryLayer`].

mod adapter;
mod layer;
mod level;

pub use adapter::{Logger, LoggerOptions, TelemetryLogger, DEFAULT_MIN_LEVEL};
pub use layer::TelemetryLayer;
pub use level::{LogLevel, ParseLevelError};
