// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Integration tests for span lifecycle and the ambient span context.

use std::sync::Arc;
use std::time::Duration;

use hooktrace::activation::ActivationGate;
use hooktrace::demo::{Shop, INVENTORY_SERVICE, ORDER_SERVICE};
use hooktrace::error::{InvocationError, CANCELLED_KIND};
use hooktrace::hooks::{HookRegistry, InstalledServices, ServiceDefinition};
use hooktrace::telemetry::capture::{is_root, span_attribute};
use hooktrace::telemetry::{context, ArgumentPolicy, Capture, SpanStrategy, SpanStrategyOptions};
use opentelemetry::trace::Status;
use opentelemetry::Value as OtelValue;
use serde_json::{json, Value};

fn install_shop() -> (Shop, InstalledServices) {
    let shop = Shop::new();
    let mut registry = HookRegistry::new(ActivationGate::enabled());
    for definition in shop.definitions() {
        registry.add_service(definition).unwrap();
    }
    let services = registry.install(Some(Arc::new(SpanStrategy::new())));
    shop.wire(services.clone());
    (shop, services)
}

#[tokio::test]
async fn test_nested_call_is_child_span() {
    let capture = Capture::new();
    let _guard = capture.set_default();
    let (_shop, services) = install_shop();

    services
        .call(ORDER_SERVICE, "placeOrder", vec![json!("X123")])
        .await
        .unwrap();

    let outer = capture.span_named("OrderService.placeOrder").unwrap();
    let inner = capture.span_named("InventoryService.reserve").unwrap();
    assert!(is_root(&outer));
    assert_eq!(inner.parent_span_id, outer.span_context.span_id());
    assert_eq!(inner.span_context.trace_id(), outer.span_context.trace_id());
    assert_eq!(outer.status, Status::Ok);
    assert_eq!(inner.status, Status::Ok);

    // The child ends first, so it is exported first.
    let names: Vec<String> = capture.spans().into_iter().map(|s| s.name.into_owned()).collect();
    assert_eq!(names, vec!["InventoryService.reserve", "OrderService.placeOrder"]);
}

#[tokio::test]
async fn test_error_status_propagates_through_nesting() {
    let capture = Capture::new();
    let _guard = capture.set_default();
    let (_shop, services) = install_shop();

    let err = services
        .call(ORDER_SERVICE, "placeOrder", vec![json!("X999")])
        .await
        .unwrap_err();
    assert_eq!(err.invocation().unwrap().kind(), "OutOfStockError");

    for name in ["OrderService.placeOrder", "InventoryService.reserve"] {
        let span = capture.span_named(name).unwrap();
        assert!(matches!(span.status, Status::Error { .. }), "{name}");
        assert_eq!(
            span_attribute(&span, "error.kind"),
            Some(&OtelValue::from("OutOfStockError"))
        );
    }
}

#[tokio::test]
async fn test_sequential_calls_are_separate_traces() {
    let capture = Capture::new();
    let _guard = capture.set_default();
    let (_shop, services) = install_shop();

    services.call(INVENTORY_SERVICE, "reserve", vec![json!("X123")]).await.unwrap();
    services.call(INVENTORY_SERVICE, "reserve", vec![json!("X123")]).await.unwrap();

    let spans = capture.spans();
    assert_eq!(spans.len(), 2);
    assert!(spans.iter().all(is_root));
    assert_ne!(spans[0].span_context.trace_id(), spans[1].span_context.trace_id());
}

#[tokio::test]
async fn test_call_inside_host_span_joins_its_trace() {
    let capture = Capture::new();
    let _guard = capture.set_default();
    let (_shop, services) = install_shop();

    let request = tracing::info_span!("http.request");
    tracing::Instrument::instrument(
        services.call(INVENTORY_SERVICE, "reserve", vec![json!("X123")]),
        request,
    )
    .await
    .unwrap();

    let host = capture.span_named("http.request").unwrap();
    let reserve = capture.span_named("InventoryService.reserve").unwrap();
    assert_eq!(reserve.parent_span_id, host.span_context.span_id());
}

fn slow_service() -> ServiceDefinition {
    ServiceDefinition::new("Worker")
        .method("run", |args| async move {
            let ms = args.first().and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            let span = context::current_span_context().map(|c| c.span_id().to_string());
            Ok(json!(span))
        })
        .method("hang", |_| async move {
            std::future::pending::<()>().await;
            Ok(Value::Null)
        })
        .sync_method("fail", |_| Err(InvocationError::new("Boom", "failed")))
}

fn install_worker(options: SpanStrategyOptions) -> InstalledServices {
    let mut registry = HookRegistry::new(ActivationGate::enabled());
    registry.add_service(slow_service()).unwrap();
    registry.install(Some(Arc::new(SpanStrategy::with_options(options))))
}

#[tokio::test]
async fn test_concurrent_chains_do_not_share_ambient_span() {
    let capture = Capture::new();
    let _guard = capture.set_default();
    let services = install_worker(SpanStrategyOptions::default());

    let (a, b) = tokio::join!(
        services.call("Worker", "run", vec![json!(20)]),
        services.call("Worker", "run", vec![json!(5)]),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    // Each body saw its own span as ambient, even while interleaved.
    assert_ne!(a, b);
    let spans = capture.spans();
    assert_eq!(spans.len(), 2);
    assert!(spans.iter().all(is_root));
    for value in [a, b] {
        let id = value.as_str().unwrap().to_string();
        assert!(spans.iter().any(|s| s.span_context.span_id().to_string() == id));
    }
    assert!(context::current_span_context().is_none());
}

#[tokio::test]
async fn test_spawned_tasks_are_isolated() {
    let capture = Capture::new();
    let _guard = capture.set_default();
    let services = install_worker(SpanStrategyOptions::default());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let services = services.clone();
            tokio::spawn(async move { services.call("Worker", "run", vec![json!(1)]).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let spans = capture.spans();
    assert_eq!(spans.len(), 4);
    assert!(spans.iter().all(|s| is_root(s) && s.status == Status::Ok));
}

#[tokio::test]
async fn test_abandoned_call_closes_span_as_cancelled() {
    let capture = Capture::new();
    let _guard = capture.set_default();
    let services = install_worker(SpanStrategyOptions::default());

    let outcome = tokio::time::timeout(
        Duration::from_millis(10),
        services.call("Worker", "hang", vec![]),
    )
    .await;
    assert!(outcome.is_err());

    let span = capture.span_named("Worker.hang").unwrap();
    assert!(matches!(span.status, Status::Error { .. }));
    assert_eq!(span_attribute(&span, "error.kind"), Some(&OtelValue::from(CANCELLED_KIND)));
    assert!(span.end_time >= span.start_time);
}

#[tokio::test]
async fn test_argument_policy_and_prefix() {
    let capture = Capture::new();
    let _guard = capture.set_default();
    let options = SpanStrategyOptions {
        name_prefix: Some("shop".to_string()),
        arguments: ArgumentPolicy::Scalars { max_len: 3 },
    };
    let services = install_worker(options);

    services.call("Worker", "fail", vec![json!("abcdef"), json!(7)]).await.unwrap_err();

    let span = capture.span_named("shop.Worker.fail").unwrap();
    assert_eq!(span_attribute(&span, "code.namespace"), Some(&OtelValue::from("Worker")));
    assert_eq!(span_attribute(&span, "code.function"), Some(&OtelValue::from("fail")));
    assert_eq!(span_attribute(&span, "code.args.count"), Some(&OtelValue::I64(2)));
    assert_eq!(span_attribute(&span, "code.args.0"), Some(&OtelValue::from("abc")));
    assert_eq!(span_attribute(&span, "code.args.1"), Some(&OtelValue::I64(7)));
    assert_eq!(span_attribute(&span, "error.message"), Some(&OtelValue::from("failed")));
    assert_eq!(span.status, Status::error("failed"));
}
