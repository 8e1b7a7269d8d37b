//! Minimal C-vtable host used by this crate's tests.
//!
//! Objects are leaked boxes; the error indicator, diagnostics and the
//! allocation switch are per thread, like an interpreter's thread state.

use crate::abi::{RawCallable, RawFunctionEntry, RawModuleDef, RawObject};
use crate::host::{
    HostApi, RawValue, HOST_API_VERSION, VALUE_TAG_BOOL, VALUE_TAG_FLOAT, VALUE_TAG_INT,
    VALUE_TAG_LIST, VALUE_TAG_NONE, VALUE_TAG_STR,
};
use std::cell::{Cell, RefCell};
use std::ffi::{c_char, c_int, CStr};

#[derive(Debug)]
pub enum FakeObject {
    Module {
        name: String,
        state_size: isize,
        functions: Vec<FakeFunction>,
    },
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<RawObject>),
    Dict(Vec<(RawObject, RawObject)>),
}

#[derive(Debug, Clone)]
pub struct FakeFunction {
    pub name: String,
    pub call: RawCallable,
    pub flags: c_int,
    pub doc: String,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<(u32, String)>> = const { RefCell::new(None) };
    static DIAGNOSTICS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static FAIL_ALLOCATIONS: Cell<bool> = const { Cell::new(false) };
}

pub const FAKE_API_TEMPLATE: HostApi = HostApi {
    version: HOST_API_VERSION,
    module_create,
    value_new,
    list_new,
    release,
    value_read,
    sequence_len,
    sequence_item,
    mapping_len,
    mapping_item,
    err_set,
    err_occurred,
    err_clear,
    write_diagnostic,
};

pub static FAKE_API: HostApi = FAKE_API_TEMPLATE;

pub fn new_object(object: FakeObject) -> RawObject {
    Box::into_raw(Box::new(object)).cast()
}

/// # Safety
/// `object` must come from this host and still be alive.
pub unsafe fn object<'a>(object: RawObject) -> &'a FakeObject {
    unsafe { &*object.cast::<FakeObject>() }
}

pub fn set_fail_allocations(fail: bool) {
    FAIL_ALLOCATIONS.with(|cell| cell.set(fail));
}

pub fn take_error() -> Option<(u32, String)> {
    LAST_ERROR.with(|cell| cell.borrow_mut().take())
}

pub fn take_diagnostics() -> Vec<String> {
    DIAGNOSTICS.with(|cell| std::mem::take(&mut *cell.borrow_mut()))
}

fn fail_allocations() -> bool {
    FAIL_ALLOCATIONS.with(Cell::get)
}

fn c_str(pointer: *const c_char) -> String {
    if pointer.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(pointer) }
        .to_string_lossy()
        .into_owned()
}

unsafe extern "C" fn module_create(def: *const RawModuleDef) -> RawObject {
    if fail_allocations() {
        return std::ptr::null_mut();
    }
    let def = unsafe { &*def };
    let mut functions = Vec::new();
    let mut cursor: *const RawFunctionEntry = def.functions;
    loop {
        let entry = unsafe { &*cursor };
        if entry.name.is_null() {
            break;
        }
        functions.push(FakeFunction {
            name: c_str(entry.name),
            call: entry.call.expect("non-sentinel entry has a callable"),
            flags: entry.flags,
            doc: c_str(entry.doc),
        });
        cursor = unsafe { cursor.add(1) };
    }
    new_object(FakeObject::Module {
        name: c_str(def.name),
        state_size: def.state_size,
        functions,
    })
}

unsafe extern "C" fn value_new(value: *const RawValue) -> RawObject {
    if fail_allocations() {
        return std::ptr::null_mut();
    }
    let value = unsafe { &*value };
    let object = match value.tag {
        VALUE_TAG_NONE => FakeObject::None,
        VALUE_TAG_BOOL => FakeObject::Bool(value.int_value != 0),
        VALUE_TAG_INT => FakeObject::Int(value.int_value),
        VALUE_TAG_FLOAT => FakeObject::Float(value.float_value),
        VALUE_TAG_STR => {
            let bytes =
                unsafe { std::slice::from_raw_parts(value.str_ptr.cast::<u8>(), value.str_len) };
            FakeObject::Str(String::from_utf8_lossy(bytes).into_owned())
        }
        _ => return std::ptr::null_mut(),
    };
    new_object(object)
}

unsafe extern "C" fn list_new(items: *const RawObject, len: usize) -> RawObject {
    let items = unsafe { std::slice::from_raw_parts(items, len) }.to_vec();
    if fail_allocations() {
        for item in items {
            unsafe { release(item) };
        }
        return std::ptr::null_mut();
    }
    new_object(FakeObject::List(items))
}

unsafe extern "C" fn release(object: RawObject) {
    if !object.is_null() {
        drop(unsafe { Box::from_raw(object.cast::<FakeObject>()) });
    }
}

unsafe extern "C" fn value_read(object: RawObject, out: *mut RawValue) -> c_int {
    let out = unsafe { &mut *out };
    *out = RawValue::NONE;
    match unsafe { self::object(object) } {
        FakeObject::None => {}
        FakeObject::Bool(flag) => {
            out.tag = VALUE_TAG_BOOL;
            out.int_value = i64::from(*flag);
        }
        FakeObject::Int(number) => {
            out.tag = VALUE_TAG_INT;
            out.int_value = *number;
        }
        FakeObject::Float(number) => {
            out.tag = VALUE_TAG_FLOAT;
            out.float_value = *number;
        }
        FakeObject::Str(text) => {
            out.tag = VALUE_TAG_STR;
            out.str_ptr = text.as_ptr().cast();
            out.str_len = text.len();
        }
        FakeObject::List(_) => out.tag = VALUE_TAG_LIST,
        FakeObject::Module { .. } | FakeObject::Dict(_) => return -1,
    }
    0
}

unsafe extern "C" fn sequence_len(seq: RawObject) -> isize {
    match unsafe { object(seq) } {
        FakeObject::List(items) => items.len() as isize,
        _ => -1,
    }
}

unsafe extern "C" fn sequence_item(seq: RawObject, index: usize) -> RawObject {
    match unsafe { object(seq) } {
        FakeObject::List(items) => items.get(index).copied().unwrap_or(std::ptr::null_mut()),
        _ => std::ptr::null_mut(),
    }
}

unsafe extern "C" fn mapping_len(map: RawObject) -> isize {
    match unsafe { object(map) } {
        FakeObject::Dict(items) => items.len() as isize,
        _ => -1,
    }
}

unsafe extern "C" fn mapping_item(
    map: RawObject,
    index: usize,
    key: *mut RawObject,
    value: *mut RawObject,
) -> c_int {
    match unsafe { object(map) } {
        FakeObject::Dict(items) => match items.get(index) {
            Some((k, v)) => {
                unsafe {
                    *key = *k;
                    *value = *v;
                }
                0
            }
            None => -1,
        },
        _ => -1,
    }
}

unsafe extern "C" fn err_set(kind: u32, message: *const c_char) {
    let message = c_str(message);
    LAST_ERROR.with(|cell| *cell.borrow_mut() = Some((kind, message)));
}

unsafe extern "C" fn err_occurred() -> c_int {
    LAST_ERROR.with(|cell| c_int::from(cell.borrow().is_some()))
}

unsafe extern "C" fn err_clear() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

unsafe extern "C" fn write_diagnostic(line: *const c_char, len: usize) {
    let bytes = unsafe { std::slice::from_raw_parts(line.cast::<u8>(), len) };
    let line = String::from_utf8_lossy(bytes).into_owned();
    DIAGNOSTICS.with(|cell| cell.borrow_mut().push(line));
}
