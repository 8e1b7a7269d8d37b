//! The `test` module: one no-argument export returning a fixed greeting.

use crate::export::callable::{CallContext, CallResult};
use crate::export::convention::CallingConvention;
use crate::export::descriptor::{DescriptorError, InstanceState, ModuleDescriptor};
use crate::export::registry::{FunctionEntry, FunctionRegistry};
use crate::value::NativeValue;
use once_cell::sync::OnceCell;

pub const MODULE_NAME: &str = "test";
pub const TEST1_NAME: &str = "test1";
pub const TEST1_DOC: &str = "std::cout and return test string";
pub const TEST1_GREETING: &str = "hello Python3-FFI-C++";
pub const TEST1_DIAGNOSTIC: &str = "*** test1 called ***";

static TEST_MODULE: OnceCell<ModuleDescriptor> = OnceCell::new();

/// Writes one diagnostic line and returns the greeting.
fn test1(ctx: &mut CallContext<'_>) -> CallResult {
    ctx.diagnostic(TEST1_DIAGNOSTIC);
    Ok(NativeValue::from(TEST1_GREETING))
}

/// Export declarations of the `test` module, in order.
pub fn test_exports() -> Vec<FunctionEntry> {
    vec![FunctionEntry::new(
        TEST1_NAME,
        test1,
        CallingConvention::NoArgs,
        TEST1_DOC,
    )]
}

/// Returns the process-wide `test` module descriptor, building it on first use.
pub fn test_module() -> Result<&'static ModuleDescriptor, DescriptorError> {
    TEST_MODULE.get_or_try_init(|| {
        let registry = FunctionRegistry::new(test_exports())?;
        ModuleDescriptor::new(MODULE_NAME, None, InstanceState::NotApplicable, registry)
    })
}
