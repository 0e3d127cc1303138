// Export modules for library usage
pub mod error;
pub mod harness;
pub mod lifecycle;
pub mod mock;
pub mod object;
pub mod path;
pub mod registry;
pub mod spec;
pub mod substitute;

// Re-export commonly used types
pub use crate::error::{PatchError, PatchResult};

pub use crate::object::{AttrAccess, AttrMap, NativeFn, Object, Value};

pub use crate::path::AttrPath;

pub use crate::mock::{CallRecord, Mock, SideEffect};

pub use crate::substitute::{
    MockSubstituter, PatchConfig, SubstitutionGuard, Substituter,
};

pub use crate::spec::{
    patch, patch_name, patch_object, patch_proxy, ActiveGuard, IntoPatchTarget, PatchSpec,
    PatchTarget, TestFn,
};

pub use crate::lifecycle::{LifecycleState, PatchLifecycle};

pub use crate::harness::{SetupTeardown, TestHarness};

pub use crate::registry::RegistryGuard;
