//! The substitution seam: who actually swaps attributes in and out.
//!
//! [`Substituter`] and [`SubstitutionGuard`] form the boundary contract a
//! patch spec consumes; configuration rides through opaquely in a
//! [`PatchConfig`]. [`MockSubstituter`] is the default implementation: it
//! saves the original attribute, installs a recording [`Mock`] (or a
//! caller-supplied replacement), and restores exactly the pre-patch state on
//! stop.

use std::fmt;

use crate::error::{PatchError, PatchResult};
use crate::mock::{Mock, SideEffect};
use crate::object::{Object, Value};
use crate::path::AttrPath;
use crate::registry;

/// Passthrough configuration for a substitution.
///
/// The patch layer never interprets these; they are handed to the
/// substituter as-is.
#[derive(Clone, Default)]
pub struct PatchConfig {
    return_value: Option<Value>,
    side_effect: Option<SideEffect>,
    create: bool,
    replacement: Option<Value>,
}

impl PatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock's return value.
    pub fn with_return_value(mut self, value: Value) -> Self {
        self.return_value = Some(value);
        self
    }

    /// Configure a side effect run on every mock call.
    pub fn with_side_effect(mut self, effect: SideEffect) -> Self {
        self.side_effect = Some(effect);
        self
    }

    /// Permit substituting an attribute that does not exist yet; the
    /// attribute is removed again on restore.
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Install this value instead of a fresh mock.
    pub fn with_replacement(mut self, value: Value) -> Self {
        self.replacement = Some(value);
        self
    }

    pub fn return_value(&self) -> Option<&Value> {
        self.return_value.as_ref()
    }

    pub fn side_effect(&self) -> Option<&SideEffect> {
        self.side_effect.as_ref()
    }

    pub fn create(&self) -> bool {
        self.create
    }

    pub fn replacement(&self) -> Option<&Value> {
        self.replacement.as_ref()
    }
}

impl fmt::Debug for PatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchConfig")
            .field("return_value", &self.return_value)
            .field("create", &self.create)
            .field("has_side_effect", &self.side_effect.is_some())
            .field("has_replacement", &self.replacement.is_some())
            .finish()
    }
}

/// Opens substitutions; the mocking collaborator's entry points.
pub trait Substituter: Send + Sync {
    /// Prepare a substitution of `attribute` directly on `target`.
    fn begin_substitution(
        &self,
        target: Object,
        attribute: &str,
        config: PatchConfig,
    ) -> PatchResult<Box<dyn SubstitutionGuard>>;

    /// Prepare a substitution of the target named by a dotted path, resolved
    /// by the substituter itself.
    fn begin_substitution_by_path(
        &self,
        dotted_path: &str,
        config: PatchConfig,
    ) -> PatchResult<Box<dyn SubstitutionGuard>>;
}

/// A prepared substitution: `start` performs the swap and hands back the
/// live substitute, `stop` restores the original. `stop` on a guard that
/// never started is a quiet no-op so cleanup paths can run unconditionally.
pub trait SubstitutionGuard: Send + fmt::Debug {
    fn start(&mut self) -> PatchResult<Value>;
    fn stop(&mut self) -> PatchResult<()>;
}

/// Default [`Substituter`]: recording mocks over [`AttrAccess`] objects.
///
/// [`AttrAccess`]: crate::object::AttrAccess
#[derive(Clone, Copy, Debug, Default)]
pub struct MockSubstituter;

impl Substituter for MockSubstituter {
    fn begin_substitution(
        &self,
        target: Object,
        attribute: &str,
        config: PatchConfig,
    ) -> PatchResult<Box<dyn SubstitutionGuard>> {
        Ok(Box::new(AttrGuard::new(
            target,
            attribute.to_string(),
            attribute.to_string(),
            config,
        )))
    }

    fn begin_substitution_by_path(
        &self,
        dotted_path: &str,
        config: PatchConfig,
    ) -> PatchResult<Box<dyn SubstitutionGuard>> {
        let path: AttrPath = dotted_path.parse()?;
        if path.depth() < 2 {
            // A bare root name leaves nothing to patch.
            return Err(PatchError::InvalidPath(dotted_path.to_string()));
        }

        let tokens = path.tokens();
        let root = registry::lookup(&tokens[0]).ok_or_else(|| PatchError::UnknownRoot {
            root: tokens[0].clone(),
        })?;

        let mut rest = AttrPath::root(tokens[1].as_str());
        for token in &tokens[2..] {
            rest = rest.extend(token.as_str());
        }
        let (container, leaf) = rest
            .resolve(&root)
            .map_err(|err| match err {
                PatchError::UnresolvedPath { missing, .. } => {
                    PatchError::unresolved(dotted_path, missing)
                }
                other => other,
            })?;

        Ok(Box::new(AttrGuard::new(
            container,
            leaf.to_string(),
            dotted_path.to_string(),
            config,
        )))
    }
}

#[derive(Debug)]
enum GuardState {
    Armed,
    Started { original: Option<Value> },
}

/// Guard produced by [`MockSubstituter`]; restores the saved attribute (or
/// removes a created one) on stop.
#[derive(Debug)]
struct AttrGuard {
    target: Object,
    attribute: String,
    label: String,
    config: PatchConfig,
    state: GuardState,
}

impl AttrGuard {
    fn new(target: Object, attribute: String, label: String, config: PatchConfig) -> Self {
        Self {
            target,
            attribute,
            label,
            config,
            state: GuardState::Armed,
        }
    }

    fn build_substitute(&self) -> Value {
        if let Some(replacement) = self.config.replacement() {
            return replacement.clone();
        }
        let mock = Mock::new(&self.label);
        if let Some(value) = self.config.return_value() {
            mock.set_return_value(value.clone());
        }
        if let Some(effect) = self.config.side_effect() {
            mock.set_side_effect(effect.clone());
        }
        Value::Mock(mock)
    }
}

impl SubstitutionGuard for AttrGuard {
    fn start(&mut self) -> PatchResult<Value> {
        if matches!(self.state, GuardState::Started { .. }) {
            return Err(PatchError::AlreadyActive);
        }

        let original = self.target.get_attr(&self.attribute);
        if original.is_none() && !self.config.create() {
            return Err(PatchError::MissingAttribute {
                attribute: self.label.clone(),
            });
        }

        let substitute = self.build_substitute();
        self.target.set_attr(&self.attribute, substitute.clone());
        self.state = GuardState::Started { original };
        log::debug!("substituted `{}`", self.label);
        Ok(substitute)
    }

    fn stop(&mut self) -> PatchResult<()> {
        match std::mem::replace(&mut self.state, GuardState::Armed) {
            GuardState::Armed => Ok(()),
            GuardState::Started { original } => {
                match original {
                    Some(value) => self.target.set_attr(&self.attribute, value),
                    None => {
                        self.target.remove_attr(&self.attribute);
                    }
                }
                log::debug!("restored `{}`", self.label);
                Ok(())
            }
        }
    }
}
