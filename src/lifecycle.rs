//! Per-test fixture lifecycle over a [`PatchSpec`].
//!
//! A [`PatchLifecycle`] binds a spec to a fixture name and drives it through
//! one test execution: [`enter`](PatchLifecycle::enter) opens the patch and
//! exposes the substitute as an instance attribute under the fixture name,
//! [`exit`](PatchLifecycle::exit) restores the original and unbinds.
//! Exiting normalizes back to [`LifecycleState::Idle`], so the same
//! declaration serves every test in sequence.

use parking_lot::Mutex;

use crate::error::{PatchError, PatchResult};
use crate::object::{Object, Value};
use crate::spec::PatchSpec;

/// Where a fixture currently is in its per-test run.
///
/// `enter` moves Idle through Opened to Exposed; `exit` returns to Idle.
/// There is no stored "closed" state: a closed fixture is an idle one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// No substitution is live; the fixture is ready to enter.
    Idle,
    /// The substitute is installed but not yet bound to the instance.
    Opened,
    /// The substitute is installed and readable as an instance attribute.
    Exposed,
}

/// A named fixture binding: one [`PatchSpec`] plus the name under which the
/// substitute appears on the test instance.
#[derive(Debug)]
pub struct PatchLifecycle {
    name: String,
    spec: PatchSpec,
    state: Mutex<LifecycleState>,
}

impl PatchLifecycle {
    pub fn new(name: impl Into<String>, spec: PatchSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            state: Mutex::new(LifecycleState::Idle),
        }
    }

    /// The fixture name the substitute is exposed under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &PatchSpec {
        &self.spec
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Open the patch for `instance` and expose the substitute on it.
    ///
    /// Any setup callback on the spec runs between opening and exposure; if
    /// it fails, the patch is closed and the fixture stays idle.
    pub fn enter(&self, instance: &Object) -> PatchResult<Value> {
        {
            let state = self.state.lock();
            if *state != LifecycleState::Idle {
                return Err(PatchError::AlreadyActive);
            }
        }

        let substitute = self.spec.open(Some(instance))?;
        *self.state.lock() = LifecycleState::Opened;
        log::debug!("fixture `{}` opened ({})", self.name, self.spec.target());

        instance.set_attr(&self.name, substitute.clone());
        *self.state.lock() = LifecycleState::Exposed;
        log::debug!("fixture `{}` exposed on instance", self.name);

        Ok(substitute)
    }

    /// Restore the original attribute and unbind the fixture name.
    ///
    /// Runs unconditionally from any state so teardown paths never skip it;
    /// exiting an idle fixture is a quiet no-op.
    pub fn exit(&self, instance: &Object) -> PatchResult<()> {
        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut *state, LifecycleState::Idle)
        };

        if previous == LifecycleState::Exposed {
            instance.remove_attr(&self.name);
        }
        let result = self.spec.close();
        if previous != LifecycleState::Idle {
            log::debug!("fixture `{}` closed", self.name);
        }
        result
    }

    /// Class-level access: the binding itself, for chaining and decoration.
    pub fn as_class_fixture(&self) -> &Self {
        self
    }

    /// Instance-level access: the bound substitute while exposed,
    /// [`Value::Unset`] outside that window.
    pub fn resolve_for_instance(&self, instance: &Object) -> Value {
        match *self.state.lock() {
            LifecycleState::Exposed => instance.get_attr(&self.name).unwrap_or(Value::Unset),
            _ => Value::Unset,
        }
    }
}
