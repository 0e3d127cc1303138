// Test utility module for patchkit integration tests
#![allow(dead_code)]

use patchkit::object::{AttrMap, Object, Value};

/// A service-like object exposing one real attribute under `attr`.
pub fn service(attr: &str) -> AttrMap {
    AttrMap::new().with_attr(attr, "real")
}

/// A test instance holding `inner` under `name`, as an erased handle.
pub fn instance_holding(name: &str, inner: &AttrMap) -> Object {
    AttrMap::new().with_attr(name, inner.clone()).into_object()
}

/// A two-level object graph: root exposes `gateway`, the gateway exposes
/// `charge` and `refund`. Returns (gateway, root).
pub fn billing_graph() -> (AttrMap, Object) {
    let gateway = AttrMap::new()
        .with_attr("charge", "real")
        .with_attr("refund", "real");
    let root = AttrMap::new().with_attr("gateway", gateway.clone()).into_object();
    (gateway, root)
}

/// The pre-patch value every `service` attribute starts with.
pub fn original() -> Value {
    Value::Str("real".into())
}
