//! A minimal sequential per-test driver.
//!
//! [`TestHarness`] owns the test instance and an ordered list of
//! setup/teardown hooks (patch fixtures among them). [`run`](TestHarness::run)
//! executes one test body between the hooks: setup in registration order,
//! teardown in reverse order on every exit path, including a panicking body.
//! The first error wins; later teardowns still run.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

use crate::error::{PatchError, PatchResult};
use crate::lifecycle::PatchLifecycle;
use crate::object::Object;
use crate::spec::{PatchSpec, TestFn};

/// Per-test lifecycle hook: the harness calls `setup` once before the test
/// body and `teardown` once after, teardown unconditionally.
pub trait SetupTeardown: Send + Sync {
    fn setup(&self, instance: &Object) -> PatchResult<()>;
    fn teardown(&self, instance: &Object) -> PatchResult<()>;
}

impl SetupTeardown for PatchLifecycle {
    fn setup(&self, instance: &Object) -> PatchResult<()> {
        self.enter(instance).map(|_| ())
    }

    fn teardown(&self, instance: &Object) -> PatchResult<()> {
        self.exit(instance)
    }
}

enum HookEntry {
    Fixture(PatchLifecycle),
    Custom(Box<dyn SetupTeardown>),
}

impl HookEntry {
    fn as_hook(&self) -> &dyn SetupTeardown {
        match self {
            Self::Fixture(fixture) => fixture,
            Self::Custom(hook) => hook.as_ref(),
        }
    }
}

/// Sequential test driver holding the instance and its ordered hooks.
///
/// # Example
///
/// ```rust,ignore
/// use patchkit::harness::TestHarness;
/// use patchkit::object::{AttrMap, Value};
/// use patchkit::spec::patch_object;
///
/// let service = AttrMap::new().with_attr("send", "real");
/// let harness = TestHarness::new(AttrMap::new().into_object())
///     .with_fixture("mock_send", patch_object(service.into_object(), "send"));
///
/// harness.run(|instance| {
///     let mock = instance.get_attr("mock_send").unwrap();
///     mock.call(&[])?;
///     Ok(())
/// }).unwrap();
/// ```
pub struct TestHarness {
    instance: Object,
    hooks: Vec<HookEntry>,
}

impl TestHarness {
    pub fn new(instance: Object) -> Self {
        Self {
            instance,
            hooks: Vec::new(),
        }
    }

    /// Register a patch spec as a named fixture; the substitute appears on
    /// the instance under `name` while the test body runs.
    pub fn with_fixture(mut self, name: impl Into<String>, spec: PatchSpec) -> Self {
        self.hooks
            .push(HookEntry::Fixture(PatchLifecycle::new(name, spec)));
        self
    }

    /// Register an arbitrary setup/teardown hook.
    pub fn with_hook(mut self, hook: impl SetupTeardown + 'static) -> Self {
        self.hooks.push(HookEntry::Custom(Box::new(hook)));
        self
    }

    pub fn instance(&self) -> &Object {
        &self.instance
    }

    /// Look up a registered fixture by name.
    pub fn fixture(&self, name: &str) -> Option<&PatchLifecycle> {
        self.hooks.iter().find_map(|entry| match entry {
            HookEntry::Fixture(fixture) if fixture.name() == name => Some(fixture),
            _ => None,
        })
    }

    /// Run one test body between setup and teardown.
    ///
    /// Setup runs in registration order; the body runs only if every setup
    /// succeeded; teardown runs in reverse order for every hook whose setup
    /// ran, on success, error, and panic alike. A panicking body resumes
    /// unwinding after teardown completes.
    pub fn run(&self, test_fn: impl FnOnce(&Object) -> PatchResult<()>) -> PatchResult<()> {
        let mut first_error: Option<PatchError> = None;
        let mut ready = 0;
        for entry in &self.hooks {
            match entry.as_hook().setup(&self.instance) {
                Ok(()) => ready += 1,
                Err(err) => {
                    log::debug!("setup hook failed, skipping test body: {err}");
                    first_error = Some(err);
                    break;
                }
            }
        }

        let mut panic_payload = None;
        if first_error.is_none() {
            match catch_unwind(AssertUnwindSafe(|| test_fn(&self.instance))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => first_error = Some(err),
                Err(payload) => panic_payload = Some(payload),
            }
        }

        for entry in self.hooks[..ready].iter().rev() {
            if let Err(err) = entry.as_hook().teardown(&self.instance) {
                log::warn!("teardown hook failed: {err}");
                first_error.get_or_insert(err);
            }
        }

        if let Some(payload) = panic_payload {
            resume_unwind(payload);
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run a decorator-form test (the output of [`PatchSpec::wrap`]) with no
    /// extra arguments.
    pub fn run_wrapped(&self, test_fn: &TestFn) -> PatchResult<()> {
        self.run(|instance| test_fn(instance, &[]))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::object::{AttrAccess, AttrMap, Value};
    use crate::spec::patch_object;

    struct RecordingHook {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_setup: bool,
    }

    impl RecordingHook {
        fn new(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                label,
                log: Arc::clone(log),
                fail_setup: false,
            }
        }

        fn failing(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                fail_setup: true,
                ..Self::new(label, log)
            }
        }
    }

    impl SetupTeardown for RecordingHook {
        fn setup(&self, _instance: &Object) -> PatchResult<()> {
            self.log.lock().push(format!("setup {}", self.label));
            if self.fail_setup {
                return Err(PatchError::Setup(format!("{} refused", self.label)));
            }
            Ok(())
        }

        fn teardown(&self, _instance: &Object) -> PatchResult<()> {
            self.log.lock().push(format!("teardown {}", self.label));
            Ok(())
        }
    }

    #[test]
    fn test_run_passes_instance_to_body() {
        let harness = TestHarness::new(AttrMap::new().with_attr("ready", true).into_object());
        harness
            .run(|instance| {
                assert_eq!(instance.get_attr("ready"), Some(Value::Bool(true)));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_teardown_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let harness = TestHarness::new(AttrMap::new().into_object())
            .with_hook(RecordingHook::new("a", &log))
            .with_hook(RecordingHook::new("b", &log));

        harness.run(|_| Ok(())).unwrap();
        assert_eq!(
            *log.lock(),
            ["setup a", "setup b", "teardown b", "teardown a"]
        );
    }

    #[test]
    fn test_setup_failure_skips_body_and_later_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let harness = TestHarness::new(AttrMap::new().into_object())
            .with_hook(RecordingHook::new("a", &log))
            .with_hook(RecordingHook::failing("b", &log))
            .with_hook(RecordingHook::new("c", &log));

        let result = harness.run(|_| {
            panic!("body must not run");
        });

        match result.unwrap_err() {
            PatchError::Setup(message) => assert_eq!(message, "b refused"),
            other => panic!("unexpected error: {other}"),
        }
        // Only the hook that finished setup is torn down.
        assert_eq!(*log.lock(), ["setup a", "setup b", "teardown a"]);
    }

    #[test]
    fn test_body_error_still_tears_down() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let harness = TestHarness::new(AttrMap::new().into_object())
            .with_hook(RecordingHook::new("a", &log));

        let result = harness.run(|_| Err(PatchError::side_effect("body failed")));
        assert!(matches!(result, Err(PatchError::SideEffect(_))));
        assert_eq!(*log.lock(), ["setup a", "teardown a"]);
    }

    #[test]
    fn test_panicking_body_tears_down_then_unwinds() {
        let target = AttrMap::new().with_attr("work", "real");
        let harness = TestHarness::new(AttrMap::new().into_object()).with_fixture(
            "mock_work",
            patch_object(target.clone().into_object(), "work"),
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            harness.run(|_| panic!("body panicked"))
        }));

        assert!(outcome.is_err());
        assert_eq!(target.get_attr("work"), Some(Value::Str("real".into())));
    }

    #[test]
    fn test_fixture_round_trip_through_run() {
        let target = AttrMap::new().with_attr("work", "real");
        let harness = TestHarness::new(AttrMap::new().into_object()).with_fixture(
            "mock_work",
            patch_object(target.clone().into_object(), "work").with_return_value(4i64),
        );

        harness
            .run(|instance| {
                let mock_value = instance.get_attr("mock_work").expect("fixture bound");
                assert_eq!(mock_value.call(&[])?, Value::Int(4));
                mock_value.as_mock().expect("fixture is a mock").assert_called_once();
                Ok(())
            })
            .unwrap();

        assert_eq!(target.get_attr("work"), Some(Value::Str("real".into())));
        assert!(!harness.instance().has_attr("mock_work"));
    }

    #[test]
    fn test_fixture_lookup_by_name() {
        let target = AttrMap::new().with_attr("work", "real").into_object();
        let harness = TestHarness::new(AttrMap::new().into_object())
            .with_fixture("mock_work", patch_object(target, "work"));

        assert!(harness.fixture("mock_work").is_some());
        assert!(harness.fixture("other").is_none());

        let fixture = harness.fixture("mock_work").unwrap();
        assert!(fixture.resolve_for_instance(harness.instance()).is_unset());
    }

    #[test]
    fn test_run_wrapped_decorator_form() {
        let target = AttrMap::new().with_attr("work", "real");
        let wrapped = patch_object(target.clone().into_object(), "work")
            .with_return_value(7i64)
            .wrap(|_, args| {
                assert_eq!(args[0].call(&[])?, Value::Int(7));
                Ok(())
            });

        let harness = TestHarness::new(AttrMap::new().into_object());
        harness.run_wrapped(&wrapped).unwrap();
        assert_eq!(target.get_attr("work"), Some(Value::Str("real".into())));
    }

    #[test]
    fn test_harness_reusable_across_runs() {
        let target = AttrMap::new().with_attr("work", "real");
        let harness = TestHarness::new(AttrMap::new().into_object()).with_fixture(
            "mock_work",
            patch_object(target.clone().into_object(), "work"),
        );

        for _ in 0..2 {
            harness
                .run(|instance| {
                    assert!(instance.get_attr("mock_work").is_some());
                    Ok(())
                })
                .unwrap();
            assert_eq!(target.get_attr("work"), Some(Value::Str("real".into())));
        }
    }
}
