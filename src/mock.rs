//! Recording stand-ins installed by substitutions.
//!
//! A [`Mock`] is the live value a patch leaves in place of the original
//! attribute: calls are recorded, answers come from a configured return
//! value or side effect, and the handle is cheaply cloneable so the same
//! mock can be held by the patch, the test instance, and assertions.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::PatchResult;
use crate::object::{NativeFn, Value};

/// Side-effect callable run on every mock call.
///
/// An `Err` propagates to the caller; an `Ok` that is not `Unset` overrides
/// the configured return value.
pub type SideEffect = NativeFn;

/// One recorded invocation of a mock.
#[derive(Clone, Debug, PartialEq)]
pub struct CallRecord {
    pub args: Vec<Value>,
}

struct MockState {
    name: String,
    return_value: RwLock<Value>,
    side_effect: RwLock<Option<SideEffect>>,
    calls: Mutex<Vec<CallRecord>>,
}

/// A call-recording substitute value.
///
/// # Example
///
/// ```rust,ignore
/// use patchkit::mock::Mock;
/// use patchkit::object::Value;
///
/// let mock = Mock::new("work").with_return_value(Value::Int(4));
/// assert_eq!(mock.call(&[]).unwrap(), Value::Int(4));
/// mock.assert_called_once();
/// ```
#[derive(Clone)]
pub struct Mock {
    inner: Arc<MockState>,
}

impl Mock {
    /// Create a mock answering `Unset` until configured otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MockState {
                name: name.into(),
                return_value: RwLock::new(Value::Unset),
                side_effect: RwLock::new(None),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Name the mock was created under (the patched attribute path).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Set the return value, builder style.
    pub fn with_return_value(self, value: Value) -> Self {
        self.set_return_value(value);
        self
    }

    /// Set the side effect, builder style.
    pub fn with_side_effect(self, effect: SideEffect) -> Self {
        self.set_side_effect(effect);
        self
    }

    pub fn set_return_value(&self, value: Value) {
        *self.inner.return_value.write() = value;
    }

    pub fn return_value(&self) -> Value {
        self.inner.return_value.read().clone()
    }

    pub fn set_side_effect(&self, effect: SideEffect) {
        *self.inner.side_effect.write() = Some(effect);
    }

    /// Record a call and answer it.
    ///
    /// The call is recorded before the side effect runs, so a failing side
    /// effect still leaves its invocation visible to assertions.
    pub fn call(&self, args: &[Value]) -> PatchResult<Value> {
        log::trace!("mock `{}` called with {} arg(s)", self.inner.name, args.len());
        self.inner.calls.lock().push(CallRecord {
            args: args.to_vec(),
        });

        let effect = self.inner.side_effect.read().clone();
        if let Some(effect) = effect {
            let produced = effect.invoke(args)?;
            if !produced.is_unset() {
                return Ok(produced);
            }
        }
        Ok(self.return_value())
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.inner.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().len()
    }

    pub fn was_called(&self) -> bool {
        self.call_count() > 0
    }

    /// Whether any recorded call used exactly these arguments.
    pub fn was_called_with(&self, args: &[Value]) -> bool {
        self.inner.calls.lock().iter().any(|call| call.args == args)
    }

    /// Forget all recorded calls; configuration is kept.
    pub fn reset(&self) {
        self.inner.calls.lock().clear();
    }

    /// Panic unless the mock was called exactly once.
    pub fn assert_called_once(&self) {
        let count = self.call_count();
        assert!(
            count == 1,
            "expected mock `{}` to be called once, was called {} time(s)",
            self.inner.name,
            count
        );
    }

    /// Panic unless the mock was called exactly once with these arguments.
    pub fn assert_called_once_with(&self, args: &[Value]) {
        self.assert_called_once();
        let recorded = &self.inner.calls.lock()[0].args;
        assert!(
            recorded == args,
            "mock `{}` called with {:?}, expected {:?}",
            self.inner.name,
            recorded,
            args
        );
    }

    /// Identity comparison; clones of one mock compare equal.
    pub fn same_mock(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mock")
            .field("name", &self.inner.name)
            .field("call_count", &self.call_count())
            .finish_non_exhaustive()
    }
}
