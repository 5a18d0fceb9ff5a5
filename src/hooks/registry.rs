// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Hook registry.
//!
//! The registry collects service definitions and hook descriptors during
//! startup, then [`HookRegistry::install`] consumes it and produces the
//! immutable [`InstalledServices`] table. Nothing can be registered after
//! installation, so live traffic never races with registration.
//!
//! Which methods get wrapped depends on what is installed. With a strategy or
//! metrics, every declared method of every service is wrapped, hooked or not,
//! so each call gets its own span and counters; an unhooked method called
//! from inside a hooked one still shows up as a child span. With neither,
//! only methods that have hooks are wrapped and the rest keep their original
//! callable.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use super::descriptor::{CallSite, HookDescriptor, HookSet, MethodSelector, TargetId};
use super::interceptor::decorate;
use super::service::{InstalledMethod, InstalledService, InstalledServices, ServiceDefinition};
use crate::activation::ActivationGate;
use crate::error::RegistrationError;
use crate::telemetry::metrics::Metrics;
use crate::telemetry::strategy::InstrumentationStrategy;

/// Installed hook sequences keyed by target, then method name.
///
/// Each sequence is in registration order. Read-only once installation
/// finishes.
#[derive(Debug, Clone, Default)]
pub struct HookTable {
    entries: HashMap<TargetId, HashMap<String, Vec<Arc<HookSet>>>>,
}

impl HookTable {
    /// Hook sets registered for a method, first-registered first.
    ///
    /// Returns an empty slice when nothing is registered.
    pub fn resolve(&self, target: &str, method: &str) -> &[Arc<HookSet>] {
        self.entries
            .get(target)
            .and_then(|methods| methods.get(method))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of installed hook sets across all methods.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, target: &TargetId, method: &str, hooks: Arc<HookSet>) {
        self.entries
            .entry(target.clone())
            .or_default()
            .entry(method.to_string())
            .or_default()
            .push(hooks);
    }
}

/// Registry of hookable services and the hooks registered against them.
pub struct HookRegistry {
    gate: ActivationGate,
    services: BTreeMap<TargetId, ServiceDefinition>,
    table: HookTable,
    metrics: Option<Arc<Metrics>>,
}

impl HookRegistry {
    /// Create an empty registry governed by `gate`.
    pub fn new(gate: ActivationGate) -> Self {
        Self {
            gate,
            services: BTreeMap::new(),
            table: HookTable::default(),
            metrics: None,
        }
    }

    /// Record per-method call metrics into `metrics` once installed.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn gate(&self) -> ActivationGate {
        self.gate
    }

    /// Declare a hookable service.
    pub fn add_service(&mut self, service: ServiceDefinition) -> Result<(), RegistrationError> {
        let target = service.target().clone();
        if self.services.contains_key(&target) {
            return Err(RegistrationError::DuplicateTarget(target.to_string()));
        }
        self.services.insert(target, service);
        Ok(())
    }

    /// Register a hook descriptor.
    ///
    /// Appends the descriptor's hook set to every method its selector
    /// resolves to. Registering the same descriptor twice installs it twice.
    /// When the activation gate is off, descriptors are accepted and dropped.
    pub fn register(&mut self, descriptor: HookDescriptor) -> Result<(), RegistrationError> {
        if !self.gate.is_enabled() {
            debug!(service = %descriptor.target, "Instrumentation disabled, skipping hooks");
            return Ok(());
        }

        let service = self
            .services
            .get(&descriptor.target)
            .ok_or_else(|| RegistrationError::UnknownTarget(descriptor.target.to_string()))?;

        let methods: Vec<String> = match &descriptor.selector {
            MethodSelector::All => service.method_names().map(str::to_string).collect(),
            MethodSelector::Names(names) => {
                if names.is_empty() {
                    return Err(RegistrationError::malformed(
                        &descriptor.target,
                        "empty method list",
                    ));
                }
                for name in names {
                    if name.trim().is_empty() {
                        return Err(RegistrationError::malformed(
                            &descriptor.target,
                            "blank method name",
                        ));
                    }
                    if !service.has_method(name) {
                        return Err(RegistrationError::UnknownMethod {
                            target: descriptor.target.to_string(),
                            method: name.clone(),
                        });
                    }
                }
                names.iter().cloned().collect()
            }
        };

        for method in &methods {
            self.table
                .push(&descriptor.target, method, Arc::clone(&descriptor.hooks));
        }

        debug!(
            service = %descriptor.target,
            hooks = descriptor.hooks.name(),
            methods = methods.len(),
            "Registered method hooks"
        );
        Ok(())
    }

    /// Register descriptors in order, stopping at the first failure.
    pub fn register_all<I>(&mut self, descriptors: I) -> Result<(), RegistrationError>
    where
        I: IntoIterator<Item = HookDescriptor>,
    {
        descriptors
            .into_iter()
            .try_for_each(|descriptor| self.register(descriptor))
    }

    /// Hook sets currently registered for a method.
    pub fn resolve(&self, target: &str, method: &str) -> &[Arc<HookSet>] {
        self.table.resolve(target, method)
    }

    /// Close the registry and build the installed service table.
    ///
    /// With the gate off every method keeps its original callable and the
    /// strategy is ignored. With it on, a strategy (or metrics) wraps every
    /// declared method; otherwise only hooked methods are wrapped.
    pub fn install(
        self,
        strategy: Option<Arc<dyn InstrumentationStrategy>>,
    ) -> InstalledServices {
        let enabled = self.gate.is_enabled();
        let strategy = if enabled { strategy } else { None };
        let metrics = if enabled { self.metrics } else { None };

        let mut services = HashMap::with_capacity(self.services.len());
        for (_, service) in self.services {
            let (target, methods) = service.into_parts();
            let installed = methods
                .into_iter()
                .map(|(name, original)| {
                    let hooks = self.table.resolve(target.as_str(), &name).to_vec();
                    let wraps = enabled
                        && (!hooks.is_empty() || strategy.is_some() || metrics.is_some());
                    let method = if wraps {
                        let site = CallSite::new(target.clone(), &name);
                        decorate(site, original, hooks, strategy.clone(), metrics.clone())
                    } else {
                        original
                    };
                    (name, InstalledMethod::new(method, wraps))
                })
                .collect();
            services.insert(target.clone(), InstalledService::new(target, installed));
        }

        debug!(
            services = services.len(),
            hooks = self.table.len(),
            enabled,
            "Installed method interceptors"
        );
        InstalledServices::new(services, self.table, metrics)
    }
}
