//! Patch specifications: the declaration surface of the crate.
//!
//! A [`PatchSpec`] is created once, at declaration time, from one of three
//! target shapes ([`PatchTarget`]): a direct object/attribute pair, a dotted
//! name resolved through the [`registry`](crate::registry), or a deferred
//! [`AttrPath`] resolved against the eventual test instance. The spec is
//! then used per test: [`open`](PatchSpec::open) installs the substitute,
//! [`close`](PatchSpec::close) restores the original.
//!
//! Three usage styles layer on top of open/close:
//!
//! - harness fixture (see [`harness`](crate::harness)),
//! - decorator via [`wrap`](PatchSpec::wrap), injecting the substitute as an
//!   argument,
//! - bare scoped guard via [`activate`](PatchSpec::activate), restoring on
//!   drop.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{PatchError, PatchResult};
use crate::mock::SideEffect;
use crate::object::{Object, Value};
use crate::path::AttrPath;
use crate::substitute::{MockSubstituter, PatchConfig, SubstitutionGuard, Substituter};

/// The three shapes a patch declaration can take.
#[derive(Clone, Debug)]
pub enum PatchTarget {
    /// Replace `attribute` directly on a known object.
    Object { object: Object, attribute: String },
    /// Replace the target named by a dotted path, resolved through the
    /// global registry at open time.
    Name { path: String },
    /// Replace the attribute reached by walking `path` from a test instance
    /// that does not exist yet.
    Proxy { path: AttrPath },
}

impl fmt::Display for PatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object { attribute, .. } => write!(f, "attribute `{attribute}`"),
            Self::Name { path } => write!(f, "name `{path}`"),
            Self::Proxy { path } => write!(f, "proxy `{path}`"),
        }
    }
}

/// Conversion into a [`PatchTarget`], implemented only for the three
/// supported shapes. A value that is none of them does not patch.
pub trait IntoPatchTarget {
    fn into_patch_target(self) -> PatchTarget;
}

impl IntoPatchTarget for &str {
    fn into_patch_target(self) -> PatchTarget {
        PatchTarget::Name {
            path: self.to_string(),
        }
    }
}

impl IntoPatchTarget for String {
    fn into_patch_target(self) -> PatchTarget {
        PatchTarget::Name { path: self }
    }
}

impl IntoPatchTarget for AttrPath {
    fn into_patch_target(self) -> PatchTarget {
        PatchTarget::Proxy { path: self }
    }
}

impl IntoPatchTarget for &AttrPath {
    fn into_patch_target(self) -> PatchTarget {
        PatchTarget::Proxy { path: self.clone() }
    }
}

impl IntoPatchTarget for (Object, &str) {
    fn into_patch_target(self) -> PatchTarget {
        PatchTarget::Object {
            object: self.0,
            attribute: self.1.to_string(),
        }
    }
}

impl IntoPatchTarget for (Object, String) {
    fn into_patch_target(self) -> PatchTarget {
        PatchTarget::Object {
            object: self.0,
            attribute: self.1,
        }
    }
}

type SetupCallback = Arc<dyn Fn(&Object, &Value) -> PatchResult<()> + Send + Sync>;

/// A test body (or wrapped test body) driven by the decorator form: the
/// bound instance plus the injected argument list.
pub type TestFn = Box<dyn Fn(&Object, &[Value]) -> PatchResult<()> + Send + Sync>;

struct ActiveSubstitution {
    guard: Box<dyn SubstitutionGuard>,
    substitute: Value,
}

/// A declared patch, reusable across sequential test runs.
///
/// At most one substitution is active at a time; opening twice without
/// closing fails with [`PatchError::AlreadyActive`].
pub struct PatchSpec {
    target: PatchTarget,
    config: PatchConfig,
    substituter: Arc<dyn Substituter>,
    setup: Option<SetupCallback>,
    active: Mutex<Option<ActiveSubstitution>>,
}

impl PatchSpec {
    pub fn new(target: PatchTarget) -> Self {
        Self {
            target,
            config: PatchConfig::new(),
            substituter: Arc::new(MockSubstituter),
            setup: None,
            active: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &PatchTarget {
        &self.target
    }

    /// Configure the substitute mock's return value.
    pub fn with_return_value(mut self, value: impl Into<Value>) -> Self {
        self.config = self.config.with_return_value(value.into());
        self
    }

    /// Configure a side effect run on every substitute call.
    pub fn with_side_effect(mut self, effect: SideEffect) -> Self {
        self.config = self.config.with_side_effect(effect);
        self
    }

    /// Permit patching an attribute that does not exist yet.
    pub fn with_create(mut self, create: bool) -> Self {
        self.config = self.config.with_create(create);
        self
    }

    /// Install this value instead of a fresh mock.
    pub fn with_replacement(mut self, value: impl Into<Value>) -> Self {
        self.config = self.config.with_replacement(value.into());
        self
    }

    /// Swap in a different substitution backend.
    pub fn with_substituter(mut self, substituter: Arc<dyn Substituter>) -> Self {
        self.substituter = substituter;
        self
    }

    /// Attach a callback run right after the patch opens, with the bound
    /// instance and the live substitute. A failing callback closes the
    /// patch before its error propagates.
    pub fn on_setup(
        mut self,
        callback: impl Fn(&Object, &Value) -> PatchResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.setup = Some(Arc::new(callback));
        self
    }

    /// Install the substitute and return it.
    ///
    /// Proxy targets require `instance` and fail with
    /// [`PatchError::MissingInstance`] without one. The setup callback, if
    /// any, runs here whenever an instance is available.
    pub fn open(&self, instance: Option<&Object>) -> PatchResult<Value> {
        let substitute = {
            let mut active = self.active.lock();
            if active.is_some() {
                return Err(PatchError::AlreadyActive);
            }

            let mut guard = match &self.target {
                PatchTarget::Object { object, attribute } => self.substituter.begin_substitution(
                    object.clone(),
                    attribute,
                    self.config.clone(),
                )?,
                PatchTarget::Name { path } => self
                    .substituter
                    .begin_substitution_by_path(path, self.config.clone())?,
                PatchTarget::Proxy { path } => {
                    let instance = instance.ok_or(PatchError::MissingInstance)?;
                    let (container, leaf) = path.resolve(instance)?;
                    let leaf = leaf.to_string();
                    self.substituter
                        .begin_substitution(container, &leaf, self.config.clone())?
                }
            };

            let substitute = guard.start()?;
            *active = Some(ActiveSubstitution {
                guard,
                substitute: substitute.clone(),
            });
            substitute
        };

        if let (Some(setup), Some(instance)) = (&self.setup, instance) {
            if let Err(err) = setup(instance, &substitute) {
                if let Err(close_err) = self.close() {
                    log::warn!("close after failed setup callback also failed: {close_err}");
                }
                return Err(match err {
                    PatchError::Setup(_) => err,
                    other => PatchError::Setup(other.to_string()),
                });
            }
        }

        Ok(substitute)
    }

    /// Restore the original attribute. Closing an inactive spec is a quiet
    /// no-op so cleanup paths can run unconditionally.
    pub fn close(&self) -> PatchResult<()> {
        match self.active.lock().take() {
            Some(mut active) => active.guard.stop(),
            None => Ok(()),
        }
    }

    /// The live substitute, or [`Value::Unset`] while no patch is open.
    pub fn substitute(&self) -> Value {
        self.active
            .lock()
            .as_ref()
            .map(|active| active.substitute.clone())
            .unwrap_or(Value::Unset)
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Decorator form: wrap a test body so every call runs under this
    /// patch, with the substitute prepended to the injected arguments.
    ///
    /// Wrappers compose; stacking two hands the wrapped body the
    /// substitutes in reverse order of top-to-bottom application. The patch
    /// is closed when the body returns, errors, or panics.
    pub fn wrap(
        self,
        test_fn: impl Fn(&Object, &[Value]) -> PatchResult<()> + Send + Sync + 'static,
    ) -> TestFn {
        Box::new(move |instance: &Object, args: &[Value]| {
            let substitute = self.open(Some(instance))?;
            let _close = CloseOnDrop(&self);
            let mut injected = Vec::with_capacity(args.len() + 1);
            injected.push(substitute);
            injected.extend_from_slice(args);
            test_fn(instance, &injected)
        })
    }

    /// Open the patch and hand back a guard that restores on drop.
    ///
    /// For Proxy targets use [`activate_on`](Self::activate_on).
    pub fn activate(&self) -> PatchResult<ActiveGuard<'_>> {
        let substitute = self.open(None)?;
        Ok(ActiveGuard {
            spec: self,
            substitute,
        })
    }

    /// [`activate`](Self::activate) with an instance to resolve Proxy
    /// targets against.
    pub fn activate_on(&self, instance: &Object) -> PatchResult<ActiveGuard<'_>> {
        let substitute = self.open(Some(instance))?;
        Ok(ActiveGuard {
            spec: self,
            substitute,
        })
    }
}

impl fmt::Debug for PatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchSpec")
            .field("target", &self.target)
            .field("config", &self.config)
            .field("has_setup", &self.setup.is_some())
            .field("active", &self.is_active())
            .finish()
    }
}

struct CloseOnDrop<'a>(&'a PatchSpec);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.0.close() {
            log::warn!("patch close failed during cleanup: {err}");
        }
    }
}

/// Scoped substitution handle from [`PatchSpec::activate`]; restores the
/// original on drop, panics included.
#[must_use = "dropping the guard restores the original immediately"]
pub struct ActiveGuard<'a> {
    spec: &'a PatchSpec,
    substitute: Value,
}

impl ActiveGuard<'_> {
    pub fn substitute(&self) -> &Value {
        &self.substitute
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.spec.close() {
            log::warn!("failed to restore patch on guard drop: {err}");
        }
    }
}

/// Patch an attribute directly on a known object.
pub fn patch_object(object: Object, attribute: impl Into<String>) -> PatchSpec {
    PatchSpec::new(PatchTarget::Object {
        object,
        attribute: attribute.into(),
    })
}

/// Patch the target named by a dotted path, resolved through the global
/// registry when the patch opens.
pub fn patch_name(path: impl Into<String>) -> PatchSpec {
    PatchSpec::new(PatchTarget::Name { path: path.into() })
}

/// Patch the attribute reached by walking `path` from the test instance
/// supplied at open time.
pub fn patch_proxy(path: AttrPath) -> PatchSpec {
    PatchSpec::new(PatchTarget::Proxy { path })
}

/// Dispatch on the target's shape: strings become Name patches, attribute
/// paths become Proxy patches, object/attribute pairs become Object patches.
pub fn patch(target: impl IntoPatchTarget) -> PatchSpec {
    PatchSpec::new(target.into_patch_target())
}
