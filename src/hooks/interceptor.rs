// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Method interception.
//!
//! [`decorate`] takes an original callable and the resolved hook sequence for
//! its call site and returns a replacement callable. One invocation runs:
//!
//! 1. span start (when a strategy is installed); the call chain is
//!    instrumented with the span, so it is the current span until the end
//! 2. `before` hooks in registration order, threading the arguments; a
//!    short-circuit skips the remaining `before` hooks and the original
//! 3. the original method, awaited
//! 4. `after` hooks (success) or `on_error` hooks (failure) in reverse
//!    registration order, limited to the hooks that were entered
//! 5. span end
//!
//! A hook that returns `Err` replaces the outcome: the rest of its phase is
//! skipped and the outer entered hooks unwind through `on_error` with that
//! error, which is what the caller sees unless one of them suppresses it. The
//! interceptor itself does no I/O.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, Instrument};

use super::descriptor::{Args, BeforeAction, CallSite, ErrorAction, HookSet};
use super::service::Method;
use crate::error::InvocationError;
use crate::telemetry::metrics::Metrics;
use crate::telemetry::strategy::InstrumentationStrategy;

/// Wraps one method with its hook sequence and optional instrumentation.
pub struct Interceptor {
    site: CallSite,
    original: Method,
    hooks: Arc<[Arc<HookSet>]>,
    strategy: Option<Arc<dyn InstrumentationStrategy>>,
    metrics: Option<Arc<Metrics>>,
}

impl Interceptor {
    pub fn new(site: CallSite, original: Method, hooks: Vec<Arc<HookSet>>) -> Self {
        Self {
            site,
            original,
            hooks: hooks.into(),
            strategy: None,
            metrics: None,
        }
    }

    pub fn with_strategy(mut self, strategy: Option<Arc<dyn InstrumentationStrategy>>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<Metrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn site(&self) -> &CallSite {
        &self.site
    }

    /// Run one intercepted invocation.
    pub async fn invoke(&self, args: Args) -> Result<Value, InvocationError> {
        let start = Instant::now();

        let result = match &self.strategy {
            Some(strategy) => {
                let handle = strategy.on_invocation_start(&self.site, &args);
                let result = self.run_hooks(args).instrument(handle.span().clone()).await;
                match &result {
                    Ok(value) => strategy.on_invocation_end(handle, value),
                    Err(error) => strategy.on_invocation_error(handle, error),
                }
                result
            }
            None => self.run_hooks(args).await,
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_invocation(&self.site.qualified_name(), start.elapsed(), result.is_ok());
        }
        result
    }

    async fn run_hooks(&self, args: Args) -> Result<Value, InvocationError> {
        let (entered, before) = self.run_before(args);
        let mut result = match before {
            Ok(BeforeAction::Continue(args)) => (self.original)(args).await,
            Ok(BeforeAction::ShortCircuit(value)) => Ok(value),
            Err(error) => Err(error),
        };

        // A failing hook replaces the outcome; outer hooks still unwind.
        for hooks in self.hooks[..entered].iter().rev() {
            result = match result {
                Ok(value) => match &hooks.after {
                    Some(after) => {
                        after(&self.site, value).map_err(|err| self.hook_failed(hooks, "after", err))
                    }
                    None => Ok(value),
                },
                Err(error) => match &hooks.on_error {
                    Some(on_error) => match on_error(&self.site, &error) {
                        Ok(ErrorAction::Propagate) => Err(error),
                        Ok(ErrorAction::Suppress(value)) => {
                            debug!(
                                call = %self.site,
                                hooks = hooks.name(),
                                kind = error.kind(),
                                "Error suppressed by hook"
                            );
                            Ok(value)
                        }
                        Err(err) => Err(self.hook_failed(hooks, "on_error", err)),
                    },
                    None => Err(error),
                },
            };
        }

        result
    }

    /// Run `before` hooks, returning how many hook sets were entered.
    ///
    /// A hook set whose `before` fails is not entered; the sets ahead of it are.
    fn run_before(&self, mut args: Args) -> (usize, Result<BeforeAction, InvocationError>) {
        for (index, hooks) in self.hooks.iter().enumerate() {
            let Some(before) = &hooks.before else {
                continue;
            };
            args = match before(&self.site, args) {
                Ok(BeforeAction::Continue(next)) => next,
                Ok(BeforeAction::ShortCircuit(value)) => {
                    debug!(call = %self.site, hooks = hooks.name(), "Call short-circuited");
                    return (index + 1, Ok(BeforeAction::ShortCircuit(value)));
                }
                Err(err) => return (index, Err(self.hook_failed(hooks, "before", err))),
            };
        }
        (self.hooks.len(), Ok(BeforeAction::Continue(args)))
    }

    fn hook_failed(&self, hooks: &HookSet, phase: &str, err: InvocationError) -> InvocationError {
        debug!(
            call = %self.site,
            hooks = hooks.name(),
            phase,
            error = %err,
            "Hook failed"
        );
        err
    }
}

/// Build the replacement callable for one call site.
///
/// With no hooks, strategy, or metrics there is nothing to do and the
/// original callable is returned as-is.
pub fn decorate(
    site: CallSite,
    original: Method,
    hooks: Vec<Arc<HookSet>>,
    strategy: Option<Arc<dyn InstrumentationStrategy>>,
    metrics: Option<Arc<Metrics>>,
) -> Method {
    if hooks.is_empty() && strategy.is_none() && metrics.is_none() {
        return original;
    }
    let interceptor = Arc::new(
        Interceptor::new(site, original, hooks)
            .with_strategy(strategy)
            .with_metrics(metrics),
    );
    Arc::new(move |args| {
        let interceptor = Arc::clone(&interceptor);
        Box::pin(async move { interceptor.invoke(args).await })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::descriptor::TargetId;
    use crate::hooks::service::sync_method_fn;
    use serde_json::json;
    use std::sync::Mutex;

    fn site() -> CallSite {
        CallSite::new(TargetId::new("OrderService"), "placeOrder")
    }

    fn echo() -> Method {
        sync_method_fn(|args| Ok(args.into_iter().next().unwrap_or(Value::Null)))
    }

    #[tokio::test]
    async fn test_before_threads_arguments() {
        let upper = HookSet::new().before(|_, args| {
            let args = args
                .into_iter()
                .map(|arg| json!(arg.as_str().unwrap_or_default().to_uppercase()))
                .collect();
            Ok(BeforeAction::Continue(args))
        });
        let suffix = HookSet::new().before(|_, args| {
            let first = args[0].as_str().unwrap_or_default().to_string();
            Ok(BeforeAction::Continue(vec![json!(format!("{first}-1"))]))
        });

        let method = decorate(site(), echo(), vec![Arc::new(upper), Arc::new(suffix)], None, None);
        assert_eq!(method(vec![json!("x123")]).await.unwrap(), json!("X123-1"));
    }

    #[tokio::test]
    async fn test_after_threads_result_in_reverse_order() {
        let a = HookSet::new().after(|_, v| Ok(json!(format!("{}a", v.as_str().unwrap()))));
        let b = HookSet::new().after(|_, v| Ok(json!(format!("{}b", v.as_str().unwrap()))));

        let method = decorate(site(), echo(), vec![Arc::new(a), Arc::new(b)], None, None);
        assert_eq!(method(vec![json!("r")]).await.unwrap(), json!("rba"));
    }

    #[tokio::test]
    async fn test_short_circuit_skips_inner_hooks() {
        let calls = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&calls);
        let outer = HookSet::new().after(move |_, v| {
            log.lock().unwrap().push("outer.after");
            Ok(v)
        });
        let cache = HookSet::new().before(|_, _| Ok(BeforeAction::ShortCircuit(json!("cached"))));
        let log = Arc::clone(&calls);
        let inner = HookSet::new()
            .before({
                let log = Arc::clone(&log);
                move |_, args| {
                    log.lock().unwrap().push("inner.before");
                    Ok(BeforeAction::Continue(args))
                }
            })
            .after(move |_, v| {
                log.lock().unwrap().push("inner.after");
                Ok(v)
            });

        let method = decorate(
            site(),
            sync_method_fn(|_| panic!("original must not run")),
            vec![Arc::new(outer), Arc::new(cache), Arc::new(inner)],
            None,
            None,
        );

        assert_eq!(method(vec![]).await.unwrap(), json!("cached"));
        assert_eq!(*calls.lock().unwrap(), vec!["outer.after"]);
    }

    #[tokio::test]
    async fn test_inner_suppression_reaches_outer_after() {
        let seen = Arc::new(Mutex::new(None));
        let log = Arc::clone(&seen);
        let outer = HookSet::new()
            .after(move |_, v| {
                *log.lock().unwrap() = Some(v.clone());
                Ok(v)
            })
            .on_error(|_, _| panic!("outer on_error must not run after suppression"));
        let inner = HookSet::new().on_error(|_, _| Ok(ErrorAction::Suppress(json!("fallback"))));

        let method = decorate(
            site(),
            sync_method_fn(|_| Err(InvocationError::new("Boom", "failed"))),
            vec![Arc::new(outer), Arc::new(inner)],
            None,
            None,
        );

        assert_eq!(method(vec![]).await.unwrap(), json!("fallback"));
        assert_eq!(*seen.lock().unwrap(), Some(json!("fallback")));
    }

    #[tokio::test]
    async fn test_failing_after_unwinds_through_outer_on_error() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let outer = HookSet::new()
            .after(|_, _| panic!("outer after must not run once an inner hook failed"))
            .on_error(move |_, err| {
                log.lock().unwrap().push(err.kind().to_string());
                Ok(ErrorAction::Propagate)
            });
        let failing = HookSet::new().after(|_, _| Err(InvocationError::new("HookBug", "bad")));

        let method = decorate(site(), echo(), vec![Arc::new(outer), Arc::new(failing)], None, None);
        let err = method(vec![json!(1)]).await.unwrap_err();
        assert_eq!(err, InvocationError::new("HookBug", "bad"));
        assert_eq!(*seen.lock().unwrap(), vec!["HookBug".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_before_skips_original_and_unwinds_entered_hooks() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&calls);
        let outer = HookSet::new().on_error(move |_, err| {
            log.lock().unwrap().push(format!("outer.on_error:{}", err.kind()));
            Ok(ErrorAction::Propagate)
        });
        let log = Arc::clone(&calls);
        let failing = HookSet::new()
            .before(|_, _| Err(InvocationError::new("BadArgs", "rejected")))
            .on_error(move |_, _| {
                log.lock().unwrap().push("failing.on_error".to_string());
                Ok(ErrorAction::Propagate)
            });

        let method = decorate(
            site(),
            sync_method_fn(|_| panic!("original must not run")),
            vec![Arc::new(outer), Arc::new(failing)],
            None,
            None,
        );
        let err = method(vec![]).await.unwrap_err();
        assert_eq!(err.kind(), "BadArgs");
        assert_eq!(*calls.lock().unwrap(), vec!["outer.on_error:BadArgs".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_on_error_replaces_error_and_outer_may_suppress() {
        let outer = HookSet::new().on_error(|_, err| {
            assert_eq!(err.kind(), "HookBug");
            Ok(ErrorAction::Suppress(json!("recovered")))
        });
        let failing = HookSet::new().on_error(|_, _| Err(InvocationError::new("HookBug", "bad")));

        let method = decorate(
            site(),
            sync_method_fn(|_| Err(InvocationError::new("Boom", "failed"))),
            vec![Arc::new(outer), Arc::new(failing)],
            None,
            None,
        );
        assert_eq!(method(vec![]).await.unwrap(), json!("recovered"));
    }

    #[tokio::test]
    async fn test_metrics_recorded_per_call_site() {
        let metrics = Arc::new(Metrics::new());
        let method = decorate(site(), echo(), vec![], None, Some(Arc::clone(&metrics)));

        method(vec![json!(1)]).await.unwrap();
        method(vec![json!(2)]).await.unwrap();

        let recorded = metrics.method_metrics("OrderService.placeOrder").unwrap();
        assert_eq!(recorded.invocations, 2);
        assert_eq!(recorded.failures, 0);
    }

    #[test]
    fn test_nothing_to_add_returns_original() {
        let original = echo();
        let method = decorate(site(), Arc::clone(&original), vec![], None, None);
        assert!(Arc::ptr_eq(&original, &method));
    }
}
