//! Deferred attribute paths.
//!
//! An [`AttrPath`] records a chain of attribute names to be walked against a
//! root object that may not exist yet, typically the eventual test instance.
//! Paths are immutable values: [`AttrPath::extend`] returns a new path and
//! leaves the parent untouched, so one declaration can branch into many.
//!
//! Declarations usually go through the [`attr_path!`](crate::attr_path)
//! macro:
//!
//! ```rust,ignore
//! use patchkit::attr_path;
//!
//! let path = attr_path!(instance_var.work);
//! assert_eq!(path.leaf(), "work");
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{PatchError, PatchResult};
use crate::object::{Object, Value};
use crate::spec::{patch_proxy, PatchSpec};

/// An immutable, growable chain of attribute names.
///
/// Non-empty by construction: [`AttrPath::root`] takes the first token, and
/// every later token comes from [`AttrPath::extend`]. The last token is the
/// leaf attribute name; all earlier tokens form the traversal from root to
/// container.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttrPath {
    tokens: Vec<String>,
}

impl AttrPath {
    /// Start a path at its first attribute name.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            tokens: vec![name.into()],
        }
    }

    /// Append a name, returning a new path; `self` is unchanged.
    pub fn extend(&self, name: impl Into<String>) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(name.into());
        Self { tokens }
    }

    /// Identical to [`extend`](Self::extend).
    ///
    /// Kept so declarations ported from attribute-interception APIs, where
    /// `escape` guarded names colliding with the builder's own methods,
    /// still read the same. Token names never shadow anything here.
    pub fn escape(&self, name: impl Into<String>) -> Self {
        self.extend(name)
    }

    /// The leaf attribute name (the last token).
    pub fn leaf(&self) -> &str {
        self.tokens.last().expect("AttrPath is non-empty by construction")
    }

    /// All tokens, root first.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Number of tokens in the path.
    pub fn depth(&self) -> usize {
        self.tokens.len()
    }

    /// Walk all tokens but the last from `root`, returning the container
    /// object and the leaf name.
    ///
    /// Every intermediate hop must resolve to an object value; a missing or
    /// non-traversable attribute fails with
    /// [`PatchError::UnresolvedPath`].
    pub fn resolve(&self, root: &Object) -> PatchResult<(Object, &str)> {
        let mut current = root.clone();
        for token in &self.tokens[..self.tokens.len() - 1] {
            log::trace!("resolving `{self}`: walking `{token}`");
            let next = current
                .get_attr(token)
                .ok_or_else(|| PatchError::unresolved(self.to_string(), token.clone()))?;
            current = match next {
                Value::Object(obj) => obj,
                _ => return Err(PatchError::unresolved(self.to_string(), token.clone())),
            };
        }
        Ok((current, self.leaf()))
    }

    /// Build a proxy [`PatchSpec`] targeting this path.
    pub fn patch(&self) -> PatchSpec {
        patch_proxy(self.clone())
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join("."))
    }
}

impl FromStr for AttrPath {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<String> = s.split('.').map(str::to_string).collect();
        if tokens.is_empty() || tokens.iter().any(String::is_empty) {
            return Err(PatchError::InvalidPath(s.to_string()));
        }
        Ok(Self { tokens })
    }
}

/// Build an [`AttrPath`](crate::path::AttrPath) from a dotted identifier
/// chain.
///
/// # Example
///
/// ```rust,ignore
/// use patchkit::attr_path;
///
/// let path = attr_path!(gateway.client.send);
/// assert_eq!(path.to_string(), "gateway.client.send");
/// ```
#[macro_export]
macro_rules! attr_path {
    ($first:ident $(. $rest:ident)*) => {{
        #[allow(unused_mut)]
        let mut path = $crate::path::AttrPath::root(stringify!($first));
        $(
            path = path.extend(stringify!($rest));
        )*
        path
    }};
}
