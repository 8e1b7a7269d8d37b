//! Exported C symbols: host binding, module initialization and per-export
//! trampolines.
//!
//! # Invariants
//! - No symbol in this module unwinds; every path goes through the boundary
//!   guard and reports failure as a null return plus a raised host error.
//! - Exports are unreachable until the module has initialized successfully.
//! - When no host is bound there is no error channel, so a null return is
//!   logged and nothing else happens.

use crate::abi::{RawCallable, RawModuleTable, RawObject};
use crate::host::{bind_host_api, bound_host, HostApi, RawCallArgs, VtableHost};
use hostbridge_core::reference::{self, MODULE_NAME, TEST1_NAME};
use hostbridge_core::{
    guard, init_logging_from_config, invoke_by_name, BoundaryError, BridgeConfig, HostErrorKind,
    HostRuntime, InitState, Initializer, ModuleDescriptor,
};
use log::{error, warn};
use once_cell::sync::OnceCell;
use std::ffi::c_int;
use std::ptr;

static TEST_INITIALIZER: Initializer = Initializer::new();
static TEST_TABLE: OnceCell<RawModuleTable> = OnceCell::new();

type ModuleResolver = fn() -> Result<&'static ModuleDescriptor, BoundaryError>;

/// Declares an `extern "C"` entry point that forwards to an export by name.
macro_rules! export_trampoline {
    ($symbol:ident, $export:expr) => {
        unsafe extern "C" fn $symbol(
            _module: RawObject,
            args: RawObject,
            kwargs: RawObject,
        ) -> RawObject {
            call_export($export, RawCallArgs { args, kwargs })
        }
    };
}

export_trampoline!(test1_entry, TEST1_NAME);

/// C entry points of the `test` module, keyed by exported name.
pub(crate) fn test_trampolines() -> [(&'static str, RawCallable); 1] {
    [(TEST1_NAME, test1_entry as RawCallable)]
}

/// Binds the host vtable. Returns a [`crate::host::BindStatus`] code.
///
/// # Safety
/// `api` must be null or point to a `HostApi` valid for the rest of the process.
#[no_mangle]
pub unsafe extern "C" fn hostbridge_bind_host(api: *const HostApi) -> c_int {
    unsafe { bind_host_api(api) as c_int }
}

/// Well-known initialization entry point of the `test` module.
///
/// Returns the new module object, or null with the host error set.
///
/// # Preconditions
/// The host must have called [`hostbridge_bind_host`] first. Without a bound
/// host there is no error channel to raise on: the call returns null, leaves
/// the error indicator untouched and does not consume the one-shot
/// initialization, so a later call after binding still succeeds.
#[no_mangle]
pub extern "C" fn hostbridge_init_test() -> RawObject {
    bootstrap_logging();
    init_entry(bound_host(), &TEST_INITIALIZER)
}

pub(crate) fn init_entry(host: Option<VtableHost>, initializer: &Initializer) -> RawObject {
    let Some(host) = host else {
        error!("event=module_init module=ffi status=error reason=host_not_bound");
        return ptr::null_mut();
    };
    init_module(host, initializer, resolve_test_module)
}

pub(crate) fn init_module(
    host: VtableHost,
    initializer: &Initializer,
    resolve: ModuleResolver,
) -> RawObject {
    initializer
        .initialize_with(&host.with_tables(loaded_table), MODULE_NAME, resolve)
        .map_or(ptr::null_mut(), |instance| instance.into_raw().as_ptr())
}

fn call_export(name: &str, args: RawCallArgs) -> RawObject {
    let Some(host) = bound_host() else {
        error!("event=export_call module=ffi status=error reason=host_not_bound name={name}");
        return ptr::null_mut();
    };
    dispatch(host, &TEST_INITIALIZER, name, args)
}

/// Runs export `name` once `initializer` has produced the module.
pub(crate) fn dispatch(
    host: VtableHost,
    initializer: &Initializer,
    name: &str,
    args: RawCallArgs,
) -> RawObject {
    if initializer.state() != InitState::Initialized {
        warn!("event=export_call module=ffi status=error reason=not_initialized name={name}");
        host.raise(
            HostErrorKind::ImportError,
            &format!("cannot call {name}(): module {MODULE_NAME} is not initialized"),
        );
        return ptr::null_mut();
    }
    let Some(descriptor) = guard(&host, name, resolve_test_module) else {
        return ptr::null_mut();
    };
    invoke_by_name(&host, descriptor.registry(), name, args)
        .map_or(ptr::null_mut(), |value| value.into_raw().as_ptr())
}

fn resolve_test_module() -> Result<&'static ModuleDescriptor, BoundaryError> {
    let descriptor = reference::test_module().map_err(|err| {
        (
            HostErrorKind::ImportError,
            format!("cannot init module: {err}"),
        )
    })?;
    TEST_TABLE
        .get_or_try_init(|| RawModuleTable::build(descriptor, &test_trampolines()))
        .map_err(|err| {
            (
                HostErrorKind::ImportError,
                format!("cannot init module: {err}"),
            )
        })?;
    Ok(descriptor)
}

fn loaded_table(name: &str) -> Option<&'static RawModuleTable> {
    TEST_TABLE.get().filter(|table| table.module_name() == name)
}

fn bootstrap_logging() {
    match BridgeConfig::from_env() {
        Ok(config) => {
            if let Err(err) = init_logging_from_config(&config) {
                warn!("event=logging_init module=ffi status=error message={err}");
            }
        }
        Err(err) => warn!("event=config_load module=ffi status=error message={err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        dispatch, hostbridge_bind_host, hostbridge_init_test, init_entry, init_module,
        resolve_test_module, test1_entry, TEST_INITIALIZER,
    };
    use crate::host::{bound_host, BindStatus, HostApi, RawCallArgs, VtableHost};
    use crate::test_host::{
        new_object, object, set_fail_allocations, take_diagnostics, take_error, FakeObject,
        FAKE_API, FAKE_API_TEMPLATE,
    };
    use hostbridge_core::reference::{TEST1_DIAGNOSTIC, TEST1_DOC, TEST1_GREETING, TEST1_NAME};
    use hostbridge_core::{CallingConvention, HostErrorKind, InitState, Initializer};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::ptr;

    fn bound() -> VtableHost {
        let status = unsafe { hostbridge_bind_host(&FAKE_API) };
        assert_eq!(status, BindStatus::Bound as i32);
        bound_host().expect("bound host")
    }

    fn initialized(host: VtableHost) -> Initializer {
        let init = Initializer::new();
        let module = init_module(host, &init, resolve_test_module);
        assert!(!module.is_null(), "init failed: {:?}", take_error());
        init
    }

    fn no_args() -> RawCallArgs {
        RawCallArgs {
            args: ptr::null_mut(),
            kwargs: ptr::null_mut(),
        }
    }

    #[test]
    fn init_symbol_name_is_derived_from_module_name() {
        let descriptor = hostbridge_core::reference::test_module().expect("test module");
        assert_eq!(descriptor.entry_symbol(), stringify!(hostbridge_init_test));
    }

    #[test]
    fn bind_rejects_null_and_foreign_versions() {
        assert_eq!(
            unsafe { hostbridge_bind_host(ptr::null()) },
            BindStatus::NullApi as i32
        );
        static OLD_API: HostApi = HostApi {
            version: 0,
            ..FAKE_API_TEMPLATE
        };
        assert_eq!(
            unsafe { hostbridge_bind_host(&OLD_API) },
            BindStatus::VersionMismatch as i32
        );
    }

    // The only test touching the process-wide initializer.
    #[test]
    fn well_known_entry_point_gates_exports_and_resolves_them_by_name() {
        bound();
        assert_eq!(TEST_INITIALIZER.state(), InitState::Uninitialized);
        let early = unsafe { test1_entry(ptr::null_mut(), ptr::null_mut(), ptr::null_mut()) };
        assert!(early.is_null());
        let (kind, message) = take_error().expect("call before init raises");
        assert_eq!(kind, HostErrorKind::ImportError.code());
        assert!(message.contains("not initialized"));
        assert!(take_diagnostics().is_empty());

        let module = hostbridge_init_test();
        assert!(!module.is_null(), "init failed: {:?}", take_error());
        assert!(take_error().is_none());

        let FakeObject::Module {
            name,
            state_size,
            functions,
        } = (unsafe { object(module) })
        else {
            panic!("init must return a module object");
        };
        assert_eq!(name, "test");
        assert_eq!(*state_size, -1);
        assert_eq!(functions.len(), 1);

        let test1 = functions
            .iter()
            .find(|function| function.name == "test1")
            .expect("test1 exported under its declared name");
        assert_eq!(test1.flags as u32, CallingConvention::NoArgs.flags());
        assert_eq!(test1.doc, TEST1_DOC);

        let result = unsafe { (test1.call)(module, ptr::null_mut(), ptr::null_mut()) };
        assert!(!result.is_null(), "call failed: {:?}", take_error());
        match unsafe { object(result) } {
            FakeObject::Str(text) => assert_eq!(text, TEST1_GREETING),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(take_diagnostics(), vec![TEST1_DIAGNOSTIC.to_string()]);

        let again = hostbridge_init_test();
        assert!(again.is_null());
        let (kind, message) = take_error().expect("re-entry raises");
        assert_eq!(kind, HostErrorKind::ImportError.code());
        assert!(message.contains("already initialized"));
    }

    #[test]
    fn unbound_host_returns_null_without_consuming_initialization() {
        let init = Initializer::new();
        assert!(init_entry(None, &init).is_null());
        assert_eq!(init.state(), InitState::Uninitialized);

        assert!(!init_entry(Some(bound()), &init).is_null());
        assert_eq!(init.state(), InitState::Initialized);
    }

    #[test]
    fn export_is_unreachable_before_initialization() {
        let host = bound();
        let result = dispatch(host, &Initializer::new(), TEST1_NAME, no_args());
        assert!(result.is_null());
        let (kind, message) = take_error().expect("error raised");
        assert_eq!(kind, HostErrorKind::ImportError.code());
        assert!(message.contains("not initialized"));
        assert!(take_diagnostics().is_empty());
    }

    #[test]
    fn allocation_failure_yields_null_with_error_and_no_unwind() {
        let host = bound();
        let init = Initializer::new();
        set_fail_allocations(true);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            init_module(host, &init, resolve_test_module)
        }));
        set_fail_allocations(false);

        let module = outcome.expect("no native panic may cross the boundary");
        assert!(module.is_null());
        let (kind, message) = take_error().expect("error raised");
        assert_eq!(kind, HostErrorKind::MemoryError.code());
        assert!(message.contains("cannot init module"));
        assert_eq!(init.state(), InitState::Failed);

        let result = dispatch(host, &init, TEST1_NAME, no_args());
        assert!(result.is_null());
        assert_eq!(
            take_error().expect("error raised").0,
            HostErrorKind::ImportError.code()
        );
    }

    #[test]
    fn failed_module_resolution_is_terminal() {
        let host = bound();
        let init = Initializer::new();
        let module = init_module(host, &init, || {
            Err((
                HostErrorKind::ImportError,
                "cannot init module: table unavailable".to_string(),
            ))
        });
        assert!(module.is_null());
        assert_eq!(init.state(), InitState::Failed);
        assert_eq!(
            take_error().expect("error raised").0,
            HostErrorKind::ImportError.code()
        );

        assert!(init_module(host, &init, resolve_test_module).is_null());
        assert_eq!(init.state(), InitState::Failed);
        let (kind, message) = take_error().expect("retry raises");
        assert_eq!(kind, HostErrorKind::ImportError.code());
        assert!(message.contains("previous initialization failed"));
    }

    #[test]
    fn arguments_are_rejected_for_noargs_export() {
        let host = bound();
        let init = initialized(host);
        let arg = new_object(FakeObject::Int(1));
        let args = new_object(FakeObject::List(vec![arg]));
        let result = dispatch(
            host,
            &init,
            TEST1_NAME,
            RawCallArgs {
                args,
                kwargs: ptr::null_mut(),
            },
        );
        assert!(result.is_null());
        let (kind, message) = take_error().expect("error raised");
        assert_eq!(kind, HostErrorKind::TypeError.code());
        assert!(message.contains("takes no arguments"));
        assert!(take_diagnostics().is_empty());
    }

    #[test]
    fn cyclic_argument_raises_type_error() {
        let host = bound();
        let init = initialized(host);
        let cyclic = new_object(FakeObject::List(Vec::new()));
        unsafe { *cyclic.cast::<FakeObject>() = FakeObject::List(vec![cyclic]) };
        let args = new_object(FakeObject::List(vec![cyclic]));

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            dispatch(
                host,
                &init,
                TEST1_NAME,
                RawCallArgs {
                    args,
                    kwargs: ptr::null_mut(),
                },
            )
        }));
        let result = outcome.expect("no native panic may cross the boundary");
        assert!(result.is_null());
        let (kind, message) = take_error().expect("error raised");
        assert_eq!(kind, HostErrorKind::TypeError.code());
        assert!(message.contains("nesting too deep"));
        assert!(take_diagnostics().is_empty());
    }

    #[test]
    fn result_allocation_failure_raises_memory_error() {
        let host = bound();
        let init = initialized(host);
        set_fail_allocations(true);
        let result = dispatch(host, &init, TEST1_NAME, no_args());
        set_fail_allocations(false);
        assert!(result.is_null());
        assert_eq!(
            take_error().expect("error raised").0,
            HostErrorKind::MemoryError.code()
        );
        assert_eq!(take_diagnostics(), vec![TEST1_DIAGNOSTIC.to_string()]);
    }

    #[test]
    fn keyword_mapping_is_rejected_for_noargs_export() {
        let host = bound();
        let init = initialized(host);
        let key = new_object(FakeObject::Str("x".to_string()));
        let value = new_object(FakeObject::None);
        let kwargs = new_object(FakeObject::Dict(vec![(key, value)]));
        let result = dispatch(
            host,
            &init,
            TEST1_NAME,
            RawCallArgs {
                args: ptr::null_mut(),
                kwargs,
            },
        );
        assert!(result.is_null());
        let (kind, message) = take_error().expect("error raised");
        assert_eq!(kind, HostErrorKind::TypeError.code());
        assert!(message.contains("keyword"));
    }
}
