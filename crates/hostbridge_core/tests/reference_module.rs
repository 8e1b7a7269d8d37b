use hostbridge_core::reference::{test_module, TEST1_DIAGNOSTIC, TEST1_GREETING};
use hostbridge_core::{
    invoke_by_name, HostErrorKind, HostRuntime, Initializer, LocalArgs, LocalHost, LocalObject,
    NativeValue,
};
use std::panic::{catch_unwind, AssertUnwindSafe};

#[test]
fn initialize_then_call_test1_by_exported_name() {
    let host = LocalHost::new();
    let module = test_module().unwrap();
    let init = Initializer::new();

    let instance = init.initialize(&host, module).unwrap();
    match host.get(instance.into_raw()).unwrap() {
        LocalObject::Module { name, exports, .. } => {
            assert_eq!(name, "test");
            assert_eq!(exports, vec!["test1".to_string()]);
        }
        other => panic!("unexpected object: {other:?}"),
    }

    let value = invoke_by_name(&host, module.registry(), "test1", LocalArgs::none()).unwrap();
    assert_eq!(
        host.value(value.into_raw()),
        Some(NativeValue::Str(TEST1_GREETING.to_string()))
    );
    assert_eq!(host.diagnostics(), vec![TEST1_DIAGNOSTIC.to_string()]);
    assert!(!host.error_pending());
}

#[test]
fn test1_rejects_arguments_without_writing_diagnostics() {
    let host = LocalHost::new();
    let module = test_module().unwrap();
    let arg = host.alloc(NativeValue::Int(1)).unwrap();
    let raw = LocalArgs {
        positional: vec![arg],
        keywords: Vec::new(),
    };

    assert!(invoke_by_name(&host, module.registry(), "test1", raw).is_none());
    let error = host.take_error().unwrap();
    assert_eq!(error.kind, HostErrorKind::TypeError);
    assert!(error.message.contains("takes no arguments"));
    assert!(host.diagnostics().is_empty());
}

#[test]
fn native_symbol_name_is_not_an_export() {
    let host = LocalHost::new();
    let module = test_module().unwrap();
    assert!(invoke_by_name(&host, module.registry(), "PyInit_test", LocalArgs::none()).is_none());
    assert_eq!(host.take_error().unwrap().kind, HostErrorKind::AttributeError);
}

#[test]
fn allocation_failure_during_init_never_unwinds() {
    let host = LocalHost::new();
    host.set_allocation_budget(Some(0));
    let module = test_module().unwrap();
    let init = Initializer::new();

    let outcome = catch_unwind(AssertUnwindSafe(|| init.initialize(&host, module)));
    let instance = outcome.expect("no native panic may cross the boundary");
    assert!(instance.is_none());
    assert!(host.error_pending());
    assert_eq!(host.take_error().unwrap().kind, HostErrorKind::MemoryError);
}

#[test]
fn allocation_failure_building_result_never_unwinds() {
    let host = LocalHost::new();
    let module = test_module().unwrap();
    host.set_allocation_budget(Some(0));

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        invoke_by_name(&host, module.registry(), "test1", LocalArgs::none())
    }));
    let value = outcome.expect("no native panic may cross the boundary");
    assert!(value.is_none());
    assert_eq!(host.take_error().unwrap().kind, HostErrorKind::MemoryError);
    assert_eq!(host.live_objects(), 0);
}

#[test]
fn init_result_is_never_null_with_clear_error() {
    for budget in [None, Some(0)] {
        let host = LocalHost::new();
        host.set_allocation_budget(budget);
        let init = Initializer::new();
        let instance = init.initialize(&host, test_module().unwrap());
        assert_ne!(instance.is_some(), host.error_pending());
    }
}
