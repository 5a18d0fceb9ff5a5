// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-wide activation gate.
//!
//! Instrumentation is off unless `HOOKTRACE_ENABLE_INSTRUMENTATION` holds a
//! truthy value. This is not a presence check: a variable that is set but
//! holds `0`, `false`, `no` or `off` (any case) keeps instrumentation off, as
//! does an empty value. Anything else turns it on. The variable is read once
//! per process; later changes to the environment have no effect.

use once_cell::sync::OnceCell;
use tracing::debug;

/// Environment variable that turns instrumentation on.
pub const ENABLE_INSTRUMENTATION_ENV_VAR: &str = "HOOKTRACE_ENABLE_INSTRUMENTATION";

static PROCESS_GATE: OnceCell<ActivationGate> = OnceCell::new();

/// Whether hooks and spans are installed at all.
///
/// A disabled gate makes registration a no-op and installation hand back the
/// original methods untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationGate {
    enabled: bool,
}

impl ActivationGate {
    /// The gate for this process, read from the environment on first use.
    pub fn from_env() -> Self {
        *PROCESS_GATE.get_or_init(|| {
            let value = std::env::var(ENABLE_INSTRUMENTATION_ENV_VAR).ok();
            let gate = Self::from_value(value.as_deref());
            debug!(enabled = gate.enabled, "Instrumentation gate evaluated");
            gate
        })
    }

    /// Interpret a raw setting. Absent, empty, `0`, `false`, `no` and `off`
    /// (case-insensitive) disable instrumentation.
    pub fn from_value(value: Option<&str>) -> Self {
        let enabled = match value.map(str::trim) {
            None | Some("") => false,
            Some(v) => !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"),
        };
        Self { enabled }
    }

    pub fn enabled() -> Self {
        Self { enabled: true }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
