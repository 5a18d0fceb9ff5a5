// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Method hooks: descriptors, the registry, and the interceptor.
//!
//! # Usage
//!
//! ```rust,ignore
//! use hooktrace::activation::ActivationGate;
//! use hooktrace::hooks::{HookDescriptor, HookRegistry, HookSet, ServiceDefinition};
//!
//! let mut registry = HookRegistry::new(ActivationGate::from_env());
//! registry.add_service(
//!     ServiceDefinition::new("OrderService").method("placeOrder", |args| async move {
//!         Ok(args[0].clone())
//!     }),
//! )?;
//! registry.register(HookDescriptor::methods(
//!     "OrderService",
//!     ["placeOrder"],
//!     HookSet::new().after(|_, value| Ok(value)),
//! ))?;
//!
//! let services = registry.install(None);
//! let result = services.call("OrderService", "placeOrder", vec!["X123".into()]).await?;
//! ```

mod descriptor;
mod interceptor;
mod registry;
mod service;

pub use descriptor::{
    AfterHook, Args, BeforeAction, BeforeHook, CallSite, ErrorAction, ErrorHook, HookDescriptor,
    HookSet, MethodSelector, TargetId,
};
pub use interceptor::{decorate, Interceptor};
pub use registry::{HookRegistry, HookTable};
pub use service::{
    method_fn, sync_method_fn, InstalledMethod, InstalledService, InstalledServices, Method,
    MethodFuture, ServiceDefinition,
};
