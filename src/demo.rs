// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A small order/inventory service catalog.
//!
//! Used by the `hooktrace demo` and `hooktrace check` commands. `placeOrder`
//! reserves stock through the installed table, so its span has a
//! `InventoryService.reserve` child when instrumentation is on.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use serde_json::{json, Value};

use crate::error::{CallError, InvocationError};
use crate::hooks::{Args, BeforeAction, HookDescriptor, HookSet, InstalledServices, ServiceDefinition};
use crate::logging::Logger;
use crate::telemetry::{context, scalar_attribute};

pub const ORDER_SERVICE: &str = "OrderService";
pub const INVENTORY_SERVICE: &str = "InventoryService";

/// Error kind for a reservation that cannot be filled.
pub const OUT_OF_STOCK: &str = "OutOfStockError";

type Stock = Arc<Mutex<BTreeMap<String, u64>>>;

/// In-memory shop backing the demo services.
#[derive(Clone)]
pub struct Shop {
    stock: Stock,
    installed: Arc<OnceCell<InstalledServices>>,
}

impl Default for Shop {
    fn default() -> Self {
        Self::with_stock([("X123", 5), ("X999", 0)])
    }
}

impl Shop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stock<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let stock = items.into_iter().map(|(sku, n)| (sku.into(), n)).collect();
        Self {
            stock: Arc::new(Mutex::new(stock)),
            installed: Arc::new(OnceCell::new()),
        }
    }

    /// Units left for `sku`.
    pub fn stock(&self, sku: &str) -> Option<u64> {
        self.stock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sku)
            .copied()
    }

    /// Hand the installed table to the services so nested calls go through
    /// the decorated methods. Returns false if already wired.
    pub fn wire(&self, services: InstalledServices) -> bool {
        self.installed.set(services).is_ok()
    }

    /// Service definitions for the catalog.
    pub fn definitions(&self) -> Vec<ServiceDefinition> {
        vec![self.order_service(), self.inventory_service()]
    }

    fn order_service(&self) -> ServiceDefinition {
        let place = Arc::clone(&self.installed);
        let cancel = Arc::clone(&self.installed);
        ServiceDefinition::new(ORDER_SERVICE)
            .method("placeOrder", move |args| {
                let installed = Arc::clone(&place);
                async move {
                    let order_id = string_arg(&args, 0, "orderId")?;
                    let quantity = args.get(1).and_then(Value::as_u64).unwrap_or(1);
                    nested_call(&installed, "reserve", vec![json!(order_id), json!(quantity)]).await?;
                    Ok(json!({ "orderId": order_id, "status": "placed" }))
                }
            })
            .method("cancelOrder", move |args| {
                let installed = Arc::clone(&cancel);
                async move {
                    let order_id = string_arg(&args, 0, "orderId")?;
                    nested_call(&installed, "release", vec![json!(order_id), json!(1)]).await?;
                    Ok(json!({ "orderId": order_id, "status": "cancelled" }))
                }
            })
    }

    fn inventory_service(&self) -> ServiceDefinition {
        let reserve = Arc::clone(&self.stock);
        let release = Arc::clone(&self.stock);
        ServiceDefinition::new(INVENTORY_SERVICE)
            .sync_method("reserve", move |args| {
                let sku = string_arg(&args, 0, "sku")?;
                let quantity = args.get(1).and_then(Value::as_u64).unwrap_or(1);
                let mut stock = reserve.lock().unwrap_or_else(PoisonError::into_inner);
                let available = stock.get_mut(&sku).ok_or_else(|| {
                    InvocationError::new("UnknownItemError", format!("no such item: {sku}"))
                })?;
                if *available < quantity {
                    return Err(InvocationError::new(OUT_OF_STOCK, format!("{sku} is out of stock"))
                        .with_details(json!({ "sku": sku, "requested": quantity, "available": *available })));
                }
                *available -= quantity;
                Ok(json!({ "sku": sku, "remaining": *available }))
            })
            .sync_method("release", move |args| {
                let sku = string_arg(&args, 0, "sku")?;
                let quantity = args.get(1).and_then(Value::as_u64).unwrap_or(1);
                let mut stock = release.lock().unwrap_or_else(PoisonError::into_inner);
                let available = stock.entry(sku.clone()).or_insert(0);
                *available += quantity;
                Ok(json!({ "sku": sku, "remaining": *available }))
            })
    }
}

/// Hooks for `OrderService.placeOrder`: record the order id on the active
/// span and log `order placed` once the order succeeds.
pub fn order_hooks(logger: Arc<dyn Logger>) -> HookDescriptor {
    let hooks = HookSet::new()
        .named("order-placed")
        .before(|_, args| {
            if let Some(value) = args.first().and_then(scalar_attribute) {
                context::set_attribute("orderId", value);
            }
            Ok(BeforeAction::Continue(args))
        })
        .after(move |_, value| {
            logger.info("order placed");
            Ok(value)
        });
    HookDescriptor::methods(ORDER_SERVICE, ["placeOrder"], hooks)
}

fn string_arg(args: &Args, index: usize, name: &str) -> Result<String, InvocationError> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            InvocationError::new("InvalidArgumentError", format!("missing string argument `{name}`"))
        })
}

async fn nested_call(
    installed: &OnceCell<InstalledServices>,
    method: &str,
    args: Args,
) -> Result<Value, InvocationError> {
    let services = installed
        .get()
        .ok_or_else(|| InvocationError::new("NotWiredError", "services are not installed yet"))?;
    services
        .call(INVENTORY_SERVICE, method, args)
        .await
        .map_err(|err| match err {
            CallError::Invocation(inner) => inner,
            other => InvocationError::from_error(&other),
        })
}
