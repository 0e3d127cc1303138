//! Dynamic attribute objects that patches operate on.
//!
//! Substitution needs a seam for "an object with named, replaceable
//! attributes". [`AttrAccess`] is that seam; [`AttrMap`] is the in-memory
//! implementation used by tests and by callers assembling patchable object
//! graphs. Attribute values are [`Value`]s: primitives, native callables,
//! nested objects, or live mocks.
//!
//! # Thread Safety
//!
//! `AttrMap` is `Send + Sync + Clone`; clones share state through
//! `Arc<RwLock<_>>`, so a test harness and a patch guard can hold the same
//! object and observe each other's writes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{PatchError, PatchResult};
use crate::mock::Mock;

/// A native callable stored as an attribute value.
///
/// Wraps the closure in an `Arc` so values stay cheaply cloneable; equality
/// is identity, the same as for nested objects.
#[derive(Clone)]
pub struct NativeFn(Arc<dyn Fn(&[Value]) -> PatchResult<Value> + Send + Sync>);

impl NativeFn {
    pub fn new(f: impl Fn(&[Value]) -> PatchResult<Value> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn invoke(&self, args: &[Value]) -> PatchResult<Value> {
        (self.0)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeFn")
    }
}

impl PartialEq for NativeFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Shared handle to an object exposing named attributes.
pub type Object = Arc<dyn AttrAccess>;

/// A dynamic attribute value.
///
/// `Unset` is the empty state a fixture reads as outside its active window;
/// invoking it (or any other non-callable variant) fails with
/// [`PatchError::NotCallable`].
#[derive(Clone, Debug)]
pub enum Value {
    Unset,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Fn(NativeFn),
    Object(Object),
    Mock(Mock),
}

impl Value {
    /// Wrap a closure as a callable attribute value.
    pub fn function(f: impl Fn(&[Value]) -> PatchResult<Value> + Send + Sync + 'static) -> Self {
        Self::Fn(NativeFn::new(f))
    }

    /// Short lowercase tag for error messages and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Fn(_) => "fn",
            Self::Object(_) => "object",
            Self::Mock(_) => "mock",
        }
    }

    /// Invoke this value.
    ///
    /// `Fn` values run their closure, `Mock` values record the call and
    /// answer as configured; everything else is a caller error.
    pub fn call(&self, args: &[Value]) -> PatchResult<Value> {
        match self {
            Self::Fn(f) => f.invoke(args),
            Self::Mock(mock) => mock.call(args),
            other => Err(PatchError::NotCallable { kind: other.kind() }),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_mock(&self) -> Option<&Mock> {
        match self {
            Self::Mock(mock) => Some(mock),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unset, Self::Unset) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Fn(a), Self::Fn(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Mock(a), Self::Mock(b)) => a.same_mock(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Self::Object(v)
    }
}

impl From<AttrMap> for Value {
    fn from(v: AttrMap) -> Self {
        Self::Object(v.into_object())
    }
}

impl From<Mock> for Value {
    fn from(v: Mock) -> Self {
        Self::Mock(v)
    }
}

/// Named-attribute access, the seam every patch target implements.
pub trait AttrAccess: Send + Sync + fmt::Debug {
    /// Look up an attribute by name.
    fn get_attr(&self, name: &str) -> Option<Value>;

    /// Replace (or create) an attribute.
    fn set_attr(&self, name: &str, value: Value);

    /// Remove an attribute, returning its previous value if present.
    fn remove_attr(&self, name: &str) -> Option<Value>;

    /// All attribute names currently present, sorted.
    fn attr_names(&self) -> Vec<String>;

    fn has_attr(&self, name: &str) -> bool {
        self.get_attr(name).is_some()
    }
}

/// In-memory attribute object.
///
/// # Example
///
/// ```rust,ignore
/// use patchkit::object::{AttrMap, Value};
///
/// let widget = AttrMap::new()
///     .with_attr("label", "spin")
///     .with_method("work", |_args| Ok(Value::Str("foo".into())));
///
/// assert_eq!(widget.get_attr("label"), Some(Value::Str("spin".into())));
/// ```
#[derive(Clone, Default)]
pub struct AttrMap {
    attrs: Arc<RwLock<HashMap<String, Value>>>,
}

impl AttrMap {
    /// Create a new object with no attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute, builder style.
    pub fn with_attr(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.write().insert(name.into(), value.into());
        self
    }

    /// Add a callable attribute, builder style.
    pub fn with_method(
        self,
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> PatchResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.with_attr(name, Value::function(f))
    }

    /// Erase the concrete type into a shared [`Object`] handle.
    ///
    /// The handle shares state with this map and any of its clones.
    pub fn into_object(self) -> Object {
        Arc::new(self)
    }
}

impl AttrAccess for AttrMap {
    fn get_attr(&self, name: &str) -> Option<Value> {
        self.attrs.read().get(name).cloned()
    }

    fn set_attr(&self, name: &str, value: Value) {
        self.attrs.write().insert(name.to_string(), value);
    }

    fn remove_attr(&self, name: &str) -> Option<Value> {
        self.attrs.write().remove(name)
    }

    fn attr_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attrs.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for AttrMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attr_count = self.attrs.read().len();
        f.debug_struct("AttrMap")
            .field("attr_count", &attr_count)
            .finish_non_exhaustive()
    }
}
