use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use patchkit::attr_path;
use patchkit::error::{PatchError, PatchResult};
use patchkit::harness::{SetupTeardown, TestHarness};
use patchkit::lifecycle::{LifecycleState, PatchLifecycle};
use patchkit::mock::Mock;
use patchkit::object::{AttrAccess, AttrMap, Object, Value};
use patchkit::spec::{patch_object, patch_proxy};

mod common;
use common::{instance_holding, original, service};

/// Hook placed between two patch fixtures; asserts from inside the harness
/// that the earlier fixture is live around it and the later one is not.
struct OrderProbe {
    before: AttrMap,
    after: AttrMap,
}

impl SetupTeardown for OrderProbe {
    fn setup(&self, _instance: &Object) -> PatchResult<()> {
        assert!(self.before.get_attr("work").unwrap().as_mock().is_some());
        assert_eq!(self.after.get_attr("work"), Some(original()));
        Ok(())
    }

    fn teardown(&self, _instance: &Object) -> PatchResult<()> {
        // Teardown runs in reverse: the later fixture has already restored,
        // the earlier one has not.
        assert_eq!(self.after.get_attr("work"), Some(original()));
        assert!(self.before.get_attr("work").unwrap().as_mock().is_some());
        Ok(())
    }
}

#[test]
fn test_fixtures_set_up_and_torn_down_in_stack_order() {
    let before = service("work");
    let after = service("work");

    let harness = TestHarness::new(AttrMap::new().into_object())
        .with_fixture("mock_before", patch_object(before.clone().into_object(), "work"))
        .with_hook(OrderProbe {
            before: before.clone(),
            after: after.clone(),
        })
        .with_fixture("mock_after", patch_object(after.clone().into_object(), "work"));

    harness
        .run(|instance| {
            assert!(instance.has_attr("mock_before"));
            assert!(instance.has_attr("mock_after"));
            Ok(())
        })
        .unwrap();

    assert_eq!(before.get_attr("work"), Some(original()));
    assert_eq!(after.get_attr("work"), Some(original()));
}

#[test]
fn test_fresh_mock_per_run() {
    let worker = service("work");
    let harness = TestHarness::new(AttrMap::new().into_object()).with_fixture(
        "mock_work",
        patch_object(worker.clone().into_object(), "work"),
    );

    let captured: Arc<Mutex<Vec<Mock>>> = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let captured = Arc::clone(&captured);
        harness
            .run(move |instance| {
                let fixture = instance.get_attr("mock_work").unwrap();
                captured.lock().push(fixture.as_mock().unwrap().clone());
                Ok(())
            })
            .unwrap();
    }

    let mocks = captured.lock();
    assert_eq!(mocks.len(), 2);
    assert!(!mocks[0].same_mock(&mocks[1]));
}

#[test]
fn test_panic_in_body_restores_every_fixture() {
    let first = service("work");
    let second = service("work");
    let harness = TestHarness::new(AttrMap::new().into_object())
        .with_fixture("mock_first", patch_object(first.clone().into_object(), "work"))
        .with_fixture("mock_second", patch_object(second.clone().into_object(), "work"));

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        harness.run(|_| panic!("test body blew up"))
    }));

    assert!(outcome.is_err());
    assert_eq!(first.get_attr("work"), Some(original()));
    assert_eq!(second.get_attr("work"), Some(original()));
}

#[test]
fn test_failing_fixture_setup_unwinds_earlier_fixtures() {
    let healthy = service("work");
    // This target lacks the attribute and `create` is not set, so the
    // second fixture fails to enter.
    let broken = AttrMap::new();

    let harness = TestHarness::new(AttrMap::new().into_object())
        .with_fixture("mock_healthy", patch_object(healthy.clone().into_object(), "work"))
        .with_fixture("mock_broken", patch_object(broken.into_object(), "work"));

    let result = harness.run(|_| panic!("body must not run"));
    match result.unwrap_err() {
        PatchError::MissingAttribute { attribute } => assert_eq!(attribute, "work"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(healthy.get_attr("work"), Some(original()));
}

#[test]
fn test_setup_callback_configures_mock_before_body() -> anyhow::Result<()> {
    let worker = service("work");
    let spec = patch_object(worker.clone().into_object(), "work").on_setup(|_, substitute| {
        substitute
            .as_mock()
            .ok_or_else(|| PatchError::Setup("substitute is not a mock".into()))?
            .set_return_value(Value::Int(42));
        Ok(())
    });

    let harness =
        TestHarness::new(AttrMap::new().into_object()).with_fixture("mock_work", spec);
    harness.run(|instance| {
        let fixture = instance.get_attr("mock_work").unwrap();
        assert_eq!(fixture.call(&[])?, Value::Int(42));
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_fixture_state_outside_run_window() {
    let worker = service("work");
    let harness = TestHarness::new(AttrMap::new().into_object()).with_fixture(
        "mock_work",
        patch_object(worker.into_object(), "work"),
    );

    let fixture = harness.fixture("mock_work").unwrap();
    assert_eq!(fixture.state(), LifecycleState::Idle);
    assert!(fixture.resolve_for_instance(harness.instance()).is_unset());

    harness
        .run(|instance| {
            assert!(instance.get_attr("mock_work").is_some());
            Ok(())
        })
        .unwrap();

    // Back to idle; the binding is gone.
    assert_eq!(fixture.state(), LifecycleState::Idle);
    assert!(fixture.resolve_for_instance(harness.instance()).is_unset());
}

#[test]
fn test_proxy_fixture_resolves_through_instance() {
    let worker = service("work");
    let instance = instance_holding("worker", &worker);

    let harness = TestHarness::new(instance).with_fixture(
        "mock_work",
        patch_proxy(attr_path!(worker.work)).with_return_value(4i64),
    );

    harness
        .run(|instance| {
            let fixture = instance.get_attr("mock_work").unwrap();
            assert_eq!(fixture.call(&[Value::Str("job".into())])?, Value::Int(4));
            fixture
                .as_mock()
                .unwrap()
                .assert_called_once_with(&[Value::Str("job".into())]);
            Ok(())
        })
        .unwrap();

    assert_eq!(worker.get_attr("work"), Some(original()));
}

#[test]
fn test_direct_lifecycle_matches_harness_behavior() {
    let worker = service("work");
    let fixture = PatchLifecycle::new(
        "mock_work",
        patch_object(worker.clone().into_object(), "work"),
    );
    let instance = AttrMap::new().into_object();

    let substitute = fixture.enter(&instance).unwrap();
    assert_eq!(fixture.state(), LifecycleState::Exposed);
    assert_eq!(fixture.resolve_for_instance(&instance), substitute);
    assert!(std::ptr::eq(fixture.as_class_fixture(), &fixture));

    fixture.exit(&instance).unwrap();
    assert_eq!(fixture.state(), LifecycleState::Idle);
    assert_eq!(worker.get_attr("work"), Some(original()));
}
