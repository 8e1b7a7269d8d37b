//! Host runtime reached through a C vtable.
//!
//! # Responsibility
//! - Accept the host's entry points once per process.
//! - Implement [`HostRuntime`] on top of them for the boundary layer.
//!
//! # Invariants
//! - The bound vtable lives for the rest of the process.
//! - Handles returned by vtable constructors are new references owned by the
//!   host; argument handles are borrowed for the duration of one call.

use crate::abi::{RawModuleDef, RawModuleTable, RawObject};
use hostbridge_core::{
    CallArgs, DiagnosticSink, HostAllocError, HostErrorKind, HostRuntime, ModuleDescriptor,
    NativeValue,
};
use log::{info, warn};
use once_cell::sync::OnceCell;
use std::ffi::{c_char, c_int, CString};
use std::ptr::NonNull;

/// Vtable layout version this crate was built against.
pub const HOST_API_VERSION: u32 = 1;

pub const VALUE_TAG_NONE: u32 = 0;
pub const VALUE_TAG_BOOL: u32 = 1;
pub const VALUE_TAG_INT: u32 = 2;
pub const VALUE_TAG_FLOAT: u32 = 3;
pub const VALUE_TAG_STR: u32 = 4;
pub const VALUE_TAG_LIST: u32 = 5;

/// Scalar value exchanged with the host.
///
/// `str_ptr`/`str_len` describe UTF-8 bytes without a terminator. For
/// `VALUE_TAG_LIST` only the tag is meaningful; items are read with the
/// sequence entry points.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawValue {
    pub tag: u32,
    pub int_value: i64,
    pub float_value: f64,
    pub str_ptr: *const c_char,
    pub str_len: usize,
}

impl RawValue {
    pub const NONE: Self = Self {
        tag: VALUE_TAG_NONE,
        int_value: 0,
        float_value: 0.0,
        str_ptr: std::ptr::null(),
        str_len: 0,
    };
}

/// Entry points a host provides to the bridge.
#[repr(C)]
pub struct HostApi {
    pub version: u32,
    /// Builds a module object. Null on failure.
    pub module_create: unsafe extern "C" fn(def: *const RawModuleDef) -> RawObject,
    /// Builds a scalar object. Null on failure.
    pub value_new: unsafe extern "C" fn(value: *const RawValue) -> RawObject,
    /// Builds a list, taking ownership of `items` even on failure. Null on failure.
    pub list_new: unsafe extern "C" fn(items: *const RawObject, len: usize) -> RawObject,
    /// Drops one reference.
    pub release: unsafe extern "C" fn(object: RawObject),
    /// Reads a scalar or list tag. Returns 0 on success.
    pub value_read: unsafe extern "C" fn(object: RawObject, out: *mut RawValue) -> c_int,
    /// Sequence length, or -1 when `seq` is not a sequence.
    pub sequence_len: unsafe extern "C" fn(seq: RawObject) -> isize,
    /// Borrowed item of a sequence. Null when out of range.
    pub sequence_item: unsafe extern "C" fn(seq: RawObject, index: usize) -> RawObject,
    /// Mapping length, or -1 when `map` is not a mapping.
    pub mapping_len: unsafe extern "C" fn(map: RawObject) -> isize,
    /// Borrowed key/value pair of a mapping. Returns 0 on success.
    pub mapping_item: unsafe extern "C" fn(
        map: RawObject,
        index: usize,
        key: *mut RawObject,
        value: *mut RawObject,
    ) -> c_int,
    /// Sets the host's last-error indicator.
    pub err_set: unsafe extern "C" fn(kind: u32, message: *const c_char),
    pub err_occurred: unsafe extern "C" fn() -> c_int,
    pub err_clear: unsafe extern "C" fn(),
    /// Writes one diagnostic line (without terminator).
    pub write_diagnostic: unsafe extern "C" fn(line: *const c_char, len: usize),
}

static BOUND_API: OnceCell<&'static HostApi> = OnceCell::new();

/// Outcome of [`bind_host_api`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BindStatus {
    Bound = 0,
    NullApi = -1,
    VersionMismatch = -2,
    AlreadyBound = -3,
}

/// Binds the host vtable for the rest of the process.
///
/// Binding the same vtable twice is a no-op.
///
/// # Safety
/// `api` must be null or point to a `HostApi` that outlives the process's
/// use of this library.
pub unsafe fn bind_host_api(api: *const HostApi) -> BindStatus {
    let Some(api) = (unsafe { api.as_ref() }) else {
        return BindStatus::NullApi;
    };
    if api.version != HOST_API_VERSION {
        warn!(
            "event=host_bind module=ffi status=error reason=version_mismatch host={} expected={}",
            api.version, HOST_API_VERSION
        );
        return BindStatus::VersionMismatch;
    }
    let bound = BOUND_API.get_or_init(|| api);
    if std::ptr::eq(*bound, api) {
        info!("event=host_bind module=ffi status=ok version={}", api.version);
        BindStatus::Bound
    } else {
        BindStatus::AlreadyBound
    }
}

/// Returns the bound host, if any.
pub fn bound_host() -> Option<VtableHost> {
    BOUND_API.get().copied().map(VtableHost::new)
}

/// Borrowed argument slots of one C call.
#[derive(Debug, Clone, Copy)]
pub struct RawCallArgs {
    pub args: RawObject,
    pub kwargs: RawObject,
}

/// Deepest list nesting accepted in call arguments.
pub const MAX_ARGUMENT_DEPTH: usize = 64;

/// Looks up the C table of a module by its dotted name.
pub type TableLookup = fn(&str) -> Option<&'static RawModuleTable>;

/// [`HostRuntime`] over a bound [`HostApi`].
#[derive(Clone, Copy)]
pub struct VtableHost {
    api: &'static HostApi,
    tables: Option<TableLookup>,
}

impl VtableHost {
    pub fn new(api: &'static HostApi) -> Self {
        Self { api, tables: None }
    }

    /// Sets where `create_module` finds the C table it hands to the host.
    pub fn with_tables(mut self, tables: TableLookup) -> Self {
        self.tables = Some(tables);
        self
    }

    fn read_value(&self, object: RawObject, depth: usize) -> Result<NativeValue, String> {
        let mut raw = RawValue::NONE;
        if unsafe { (self.api.value_read)(object, &mut raw) } != 0 {
            return Err("argument has an unsupported type".to_string());
        }
        match raw.tag {
            VALUE_TAG_NONE => Ok(NativeValue::None),
            VALUE_TAG_BOOL => Ok(NativeValue::Bool(raw.int_value != 0)),
            VALUE_TAG_INT => Ok(NativeValue::Int(raw.int_value)),
            VALUE_TAG_FLOAT => Ok(NativeValue::Float(raw.float_value)),
            VALUE_TAG_STR if raw.str_len == 0 => Ok(NativeValue::Str(String::new())),
            VALUE_TAG_STR => {
                if raw.str_ptr.is_null() {
                    return Err("string argument has a null buffer".to_string());
                }
                let bytes =
                    unsafe { std::slice::from_raw_parts(raw.str_ptr.cast::<u8>(), raw.str_len) };
                std::str::from_utf8(bytes)
                    .map(|text| NativeValue::Str(text.to_string()))
                    .map_err(|err| format!("string argument is not UTF-8: {err}"))
            }
            VALUE_TAG_LIST => Ok(NativeValue::List(self.read_sequence(object, depth + 1)?)),
            other => Err(format!("argument has unknown value tag {other}")),
        }
    }

    fn read_sequence(&self, seq: RawObject, depth: usize) -> Result<Vec<NativeValue>, String> {
        if depth > MAX_ARGUMENT_DEPTH {
            return Err("argument nesting too deep".to_string());
        }
        let len = unsafe { (self.api.sequence_len)(seq) };
        let len = usize::try_from(len).map_err(|_| "arguments are not a sequence".to_string())?;
        (0..len)
            .map(|index| {
                let item = unsafe { (self.api.sequence_item)(seq, index) };
                if item.is_null() {
                    return Err(format!("sequence item {index} is missing"));
                }
                self.read_value(item, depth)
            })
            .collect()
    }

    fn read_keywords(&self, map: RawObject, args: &mut CallArgs) -> Result<(), String> {
        let len = unsafe { (self.api.mapping_len)(map) };
        let len =
            usize::try_from(len).map_err(|_| "keyword arguments are not a mapping".to_string())?;
        for index in 0..len {
            let mut key = std::ptr::null_mut();
            let mut value = std::ptr::null_mut();
            if unsafe { (self.api.mapping_item)(map, index, &mut key, &mut value) } != 0 {
                return Err(format!("keyword item {index} is missing"));
            }
            let name = match self.read_value(key, 0)? {
                NativeValue::Str(name) => name,
                other => {
                    return Err(format!("keywords must be strings, got {}", other.type_name()))
                }
            };
            let value = self.read_value(value, 0)?;
            args.keywords.insert(name, value);
        }
        Ok(())
    }

    fn scalar(&self, raw: RawValue) -> Result<NonNull<std::ffi::c_void>, HostAllocError> {
        NonNull::new(unsafe { (self.api.value_new)(&raw) }).ok_or(HostAllocError::OutOfMemory)
    }
}

impl DiagnosticSink for VtableHost {
    fn write_line(&self, line: &str) {
        unsafe { (self.api.write_diagnostic)(line.as_ptr().cast::<c_char>(), line.len()) };
    }
}

impl HostRuntime for VtableHost {
    type Handle = NonNull<std::ffi::c_void>;
    type RawArgs = RawCallArgs;

    fn create_module(&self, descriptor: &ModuleDescriptor) -> Result<Self::Handle, HostAllocError> {
        let table = self
            .tables
            .and_then(|lookup| lookup(descriptor.name()))
            .filter(|table| table.module_name() == descriptor.name())
            .ok_or_else(|| {
                HostAllocError::Unsupported(format!("no C table for module {}", descriptor.name()))
            })?;
        NonNull::new(unsafe { (self.api.module_create)(table.module_def()) })
            .ok_or(HostAllocError::OutOfMemory)
    }

    fn build_value(&self, value: &NativeValue) -> Result<Self::Handle, HostAllocError> {
        match value {
            NativeValue::None => self.scalar(RawValue::NONE),
            NativeValue::Bool(flag) => self.scalar(RawValue {
                tag: VALUE_TAG_BOOL,
                int_value: i64::from(*flag),
                ..RawValue::NONE
            }),
            NativeValue::Int(number) => self.scalar(RawValue {
                tag: VALUE_TAG_INT,
                int_value: *number,
                ..RawValue::NONE
            }),
            NativeValue::Float(number) => self.scalar(RawValue {
                tag: VALUE_TAG_FLOAT,
                float_value: *number,
                ..RawValue::NONE
            }),
            NativeValue::Str(text) => self.scalar(RawValue {
                tag: VALUE_TAG_STR,
                str_ptr: text.as_ptr().cast::<c_char>(),
                str_len: text.len(),
                ..RawValue::NONE
            }),
            NativeValue::List(items) => {
                let mut built: Vec<RawObject> = Vec::with_capacity(items.len());
                for item in items {
                    match self.build_value(item) {
                        Ok(handle) => built.push(handle.as_ptr()),
                        Err(err) => {
                            for object in built {
                                unsafe { (self.api.release)(object) };
                            }
                            return Err(err);
                        }
                    }
                }
                NonNull::new(unsafe { (self.api.list_new)(built.as_ptr(), built.len()) })
                    .ok_or(HostAllocError::OutOfMemory)
            }
        }
    }

    fn extract_args(&self, raw: RawCallArgs) -> Result<CallArgs, String> {
        let mut args = CallArgs::none();
        if !raw.args.is_null() {
            args.positional = self.read_sequence(raw.args, 0)?;
        }
        if !raw.kwargs.is_null() {
            self.read_keywords(raw.kwargs, &mut args)?;
        }
        Ok(args)
    }

    fn raise(&self, kind: HostErrorKind, message: &str) {
        let message = CString::new(message.replace('\0', " "))
            .unwrap_or_else(|_| CString::from(c"native error"));
        unsafe { (self.api.err_set)(kind.code(), message.as_ptr()) };
    }

    fn error_pending(&self) -> bool {
        unsafe { (self.api.err_occurred)() != 0 }
    }

    fn clear_error(&self) {
        unsafe { (self.api.err_clear)() };
    }
}
