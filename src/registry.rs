//! Process-global roots for dotted-path patch targets.
//!
//! A dotted path like `"billing.gateway.charge"` needs a starting point; the
//! registry maps the first token (`billing`) to a registered [`Object`], and
//! the substituter walks the rest as attributes. Registration returns a
//! guard so test-scoped roots disappear when the test is done.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::object::Object;

static ROOTS: Lazy<RwLock<HashMap<String, Object>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a root object under a name, replacing any previous binding.
///
/// The returned guard unregisters the name on drop; keep it alive for as
/// long as dotted paths should resolve through this root.
#[must_use = "dropping the guard unregisters the root"]
pub fn register(name: impl Into<String>, object: Object) -> RegistryGuard {
    let name = name.into();
    log::debug!("registering root `{name}`");
    ROOTS.write().insert(name.clone(), object);
    RegistryGuard { name }
}

/// Look up a registered root by name.
pub fn lookup(name: &str) -> Option<Object> {
    ROOTS.read().get(name).cloned()
}

/// Remove a root by name; returns whether it was present.
pub fn unregister(name: &str) -> bool {
    ROOTS.write().remove(name).is_some()
}

/// All registered root names, sorted.
pub fn registered_names() -> Vec<String> {
    let mut names: Vec<String> = ROOTS.read().keys().cloned().collect();
    names.sort();
    names
}

/// Drop every registered root.
pub fn reset() {
    ROOTS.write().clear();
}

/// Scoped registration; unregisters its root on drop.
#[derive(Debug)]
pub struct RegistryGuard {
    name: String,
}

impl RegistryGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        log::debug!("unregistering root `{}`", self.name);
        unregister(&self.name);
    }
}
