// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Hook descriptors: what to hook and what to run around it.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::InvocationError;

/// Argument list passed to an intercepted method.
pub type Args = Vec<Value>;

/// Stable identity of a hookable service type.
///
/// Cheap to clone; descriptors and the installed table share the same
/// allocation rather than copying the name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(Arc<str>);

impl TargetId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetId({})", self.0)
    }
}

impl Borrow<str> for TargetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TargetId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl Serialize for TargetId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TargetId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::from)
    }
}

/// The `(target, method)` pair an interceptor is installed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub target: TargetId,
    pub method: Arc<str>,
}

impl CallSite {
    pub fn new(target: TargetId, method: impl AsRef<str>) -> Self {
        Self {
            target,
            method: Arc::from(method.as_ref()),
        }
    }

    /// `Target.method`, used for span names and metric keys.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.target, self.method)
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.method)
    }
}

/// What a `before` hook wants to happen next.
#[derive(Debug, Clone, PartialEq)]
pub enum BeforeAction {
    /// Keep going with these (possibly modified) arguments.
    Continue(Args),
    /// Skip the original method and use this value as its result.
    ShortCircuit(Value),
}

/// What an `on_error` hook wants to happen to the error it observed.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorAction {
    /// Let the error keep unwinding unchanged.
    Propagate,
    /// Turn the error into a normal return of this value.
    Suppress(Value),
}

pub type BeforeHook =
    Arc<dyn Fn(&CallSite, Args) -> Result<BeforeAction, InvocationError> + Send + Sync>;
pub type AfterHook = Arc<dyn Fn(&CallSite, Value) -> Result<Value, InvocationError> + Send + Sync>;
pub type ErrorHook =
    Arc<dyn Fn(&CallSite, &InvocationError) -> Result<ErrorAction, InvocationError> + Send + Sync>;

/// A set of optional callbacks attached to a method's invocation lifecycle.
///
/// Returning `Err` from any callback is a hook failure: it aborts the
/// remaining hooks and reaches the caller as-is. A set with no callbacks is a
/// valid no-op.
#[derive(Clone, Default)]
pub struct HookSet {
    name: Option<String>,
    pub(crate) before: Option<BeforeHook>,
    pub(crate) after: Option<AfterHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name shown in diagnostics when this set fails.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallSite, Args) -> Result<BeforeAction, InvocationError> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallSite, Value) -> Result<Value, InvocationError> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallSite, &InvocationError) -> Result<ErrorAction, InvocationError>
            + Send
            + Sync
            + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// True when no callback is populated.
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none() && self.on_error.is_none()
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet")
            .field("name", &self.name())
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Which methods of a target a descriptor applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MethodSelector {
    /// Every method declared on the target at registration time.
    All,
    /// An explicit set of method names.
    Names(BTreeSet<String>),
}

impl MethodSelector {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self::names([name])
    }
}

/// Declarative pairing of a target, a method selector, and a hook set.
#[derive(Debug, Clone)]
pub struct HookDescriptor {
    pub target: TargetId,
    pub selector: MethodSelector,
    pub hooks: Arc<HookSet>,
}

impl HookDescriptor {
    pub fn new(target: impl Into<TargetId>, selector: MethodSelector, hooks: HookSet) -> Self {
        Self {
            target: target.into(),
            selector,
            hooks: Arc::new(hooks),
        }
    }

    /// Hook every method of `target`.
    pub fn all_methods(target: impl Into<TargetId>, hooks: HookSet) -> Self {
        Self::new(target, MethodSelector::All, hooks)
    }

    /// Hook the named methods of `target`.
    pub fn methods<I, S>(target: impl Into<TargetId>, names: I, hooks: HookSet) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(target, MethodSelector::names(names), hooks)
    }
}
