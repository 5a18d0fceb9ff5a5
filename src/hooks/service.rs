// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Service definitions and the installed target-to-callable table.
//!
//! A host declares each hookable service as a [`ServiceDefinition`]: a target
//! identity plus its named methods as plain callables. Installation turns the
//! definitions into [`InstalledServices`], where every method is either the
//! original callable or a decorated replacement.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::descriptor::{Args, TargetId};
use super::registry::HookTable;
use crate::error::{CallError, InvocationError};
use crate::telemetry::metrics::Metrics;

/// Future returned by a method callable.
pub type MethodFuture = Pin<Box<dyn Future<Output = Result<Value, InvocationError>> + Send + 'static>>;

/// A service method as a shareable callable.
pub type Method = Arc<dyn Fn(Args) -> MethodFuture + Send + Sync>;

/// Wrap an async closure as a [`Method`].
pub fn method_fn<F, Fut>(f: F) -> Method
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, InvocationError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/// Wrap a synchronous closure as a [`Method`].
pub fn sync_method_fn<F>(f: F) -> Method
where
    F: Fn(Args) -> Result<Value, InvocationError> + Send + Sync + 'static,
{
    Arc::new(move |args| {
        let result = f(args);
        Box::pin(async move { result })
    })
}

/// A hookable service: its identity and its original methods.
#[derive(Clone)]
pub struct ServiceDefinition {
    target: TargetId,
    methods: BTreeMap<String, Method>,
}

impl ServiceDefinition {
    pub fn new(target: impl Into<TargetId>) -> Self {
        Self {
            target: target.into(),
            methods: BTreeMap::new(),
        }
    }

    /// Add an async method.
    pub fn method<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, InvocationError>> + Send + 'static,
    {
        self.with_method(name, method_fn(f))
    }

    /// Add a synchronous method.
    pub fn sync_method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Args) -> Result<Value, InvocationError> + Send + Sync + 'static,
    {
        self.with_method(name, sync_method_fn(f))
    }

    /// Add an already-built callable.
    pub fn with_method(mut self, name: impl Into<String>, method: Method) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    pub fn target(&self) -> &TargetId {
        &self.target
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub(crate) fn into_parts(self) -> (TargetId, BTreeMap<String, Method>) {
        (self.target, self.methods)
    }
}

impl std::fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("target", &self.target)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One method after installation.
#[derive(Clone)]
pub struct InstalledMethod {
    callable: Method,
    decorated: bool,
}

impl InstalledMethod {
    pub(crate) fn new(callable: Method, decorated: bool) -> Self {
        Self {
            callable,
            decorated,
        }
    }

    pub fn callable(&self) -> Method {
        Arc::clone(&self.callable)
    }

    /// Whether an interceptor wraps this method.
    pub fn is_decorated(&self) -> bool {
        self.decorated
    }
}

/// A service after installation.
#[derive(Clone)]
pub struct InstalledService {
    target: TargetId,
    methods: HashMap<String, InstalledMethod>,
}

impl InstalledService {
    pub(crate) fn new(target: TargetId, methods: HashMap<String, InstalledMethod>) -> Self {
        Self { target, methods }
    }

    pub fn target(&self) -> &TargetId {
        &self.target
    }

    pub fn method(&self, name: &str) -> Option<&InstalledMethod> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Immutable table of installed services, shared read-only across call chains.
#[derive(Clone)]
pub struct InstalledServices {
    services: Arc<HashMap<TargetId, InstalledService>>,
    hooks: Arc<HookTable>,
    metrics: Option<Arc<Metrics>>,
}

impl InstalledServices {
    pub(crate) fn new(
        services: HashMap<TargetId, InstalledService>,
        hooks: HookTable,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            services: Arc::new(services),
            hooks: Arc::new(hooks),
            metrics,
        }
    }

    pub fn service(&self, target: &str) -> Option<&InstalledService> {
        self.services.get(target)
    }

    /// Look up the (possibly decorated) callable for a method.
    pub fn method(&self, target: &str, method: &str) -> Option<Method> {
        self.service(target)
            .and_then(|service| service.method(method))
            .map(InstalledMethod::callable)
    }

    /// Invoke a method by name.
    pub async fn call(&self, target: &str, method: &str, args: Args) -> Result<Value, CallError> {
        let service = self
            .service(target)
            .ok_or_else(|| CallError::UnknownTarget(target.to_string()))?;
        let installed = service
            .method(method)
            .ok_or_else(|| CallError::UnknownMethod {
                target: target.to_string(),
                method: method.to_string(),
            })?;
        let callable = installed.callable();
        Ok(callable(args).await?)
    }

    /// The hook registrations snapshot this table was built from.
    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    pub fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.as_ref()
    }

    /// Number of methods wrapped by an interceptor.
    pub fn interceptor_count(&self) -> usize {
        self.services
            .values()
            .flat_map(|service| service.methods.values())
            .filter(|method| method.is_decorated())
            .count()
    }

    pub fn targets(&self) -> Vec<&TargetId> {
        let mut targets: Vec<&TargetId> = self.services.keys().collect();
        targets.sort();
        targets
    }
}
