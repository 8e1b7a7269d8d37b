//! C ABI data layout handed to the host.
//!
//! # Responsibility
//! - Serialize a [`ModuleDescriptor`] into the sentinel-terminated function
//!   table and module definition a C host walks.
//! - Own every C string the table points into for as long as the table lives.
//!
//! # Invariants
//! - The last table entry is [`RawFunctionEntry::SENTINEL`] and no other entry is.
//! - The table is never mutated after construction.

use hostbridge_core::{FunctionEntry, ModuleDescriptor};
use std::error::Error;
use std::ffi::{c_char, c_int, c_void, CString, NulError};
use std::fmt::{Display, Formatter};
use std::ptr;

/// Opaque host object pointer.
pub type RawObject = *mut c_void;

/// Entry point shape of every exported function.
///
/// Hosts always pass three slots: the module object, the positional
/// sequence and the keyword mapping. Slots a convention does not use are null.
pub type RawCallable =
    unsafe extern "C" fn(module: RawObject, args: RawObject, kwargs: RawObject) -> RawObject;

/// One row of the C function table.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawFunctionEntry {
    pub name: *const c_char,
    pub call: Option<RawCallable>,
    pub flags: c_int,
    pub doc: *const c_char,
}

impl RawFunctionEntry {
    /// All-null row terminating the table.
    pub const SENTINEL: Self = Self {
        name: ptr::null(),
        call: None,
        flags: 0,
        doc: ptr::null(),
    };

    pub fn is_sentinel(&self) -> bool {
        self.name.is_null() && self.call.is_none() && self.flags == 0 && self.doc.is_null()
    }
}

/// C module definition.
#[repr(C)]
#[derive(Debug)]
pub struct RawModuleDef {
    pub name: *const c_char,
    pub doc: *const c_char,
    /// `-1` for modules without per-instance state.
    pub state_size: isize,
    pub functions: *const RawFunctionEntry,
}

/// Owned C form of one module descriptor.
pub struct RawModuleTable {
    module_name: String,
    _strings: Vec<CString>,
    entries: Vec<RawFunctionEntry>,
    def: Box<RawModuleDef>,
}

// SAFETY: every pointer in `entries` and `def` targets heap data owned by the
// same value (`_strings`, `entries`) that is never mutated after `build`.
unsafe impl Send for RawModuleTable {}
unsafe impl Sync for RawModuleTable {}

impl RawModuleTable {
    /// Builds the table, pairing each export with its trampoline by exported name.
    pub fn build(
        descriptor: &ModuleDescriptor,
        trampolines: &[(&str, RawCallable)],
    ) -> Result<Self, AbiError> {
        let mut strings = Vec::new();
        let mut entries = Vec::with_capacity(descriptor.registry().len() + 1);

        for entry in descriptor.registry().iter() {
            let call = lookup_trampoline(trampolines, entry)?;
            let name = owned_c_string(&mut strings, entry.name)?;
            let doc = owned_c_string(&mut strings, entry.doc)?;
            entries.push(RawFunctionEntry {
                name,
                call: Some(call),
                flags: entry.convention.flags() as c_int,
                doc,
            });
        }
        entries.push(RawFunctionEntry::SENTINEL);

        let name = owned_c_string(&mut strings, descriptor.name())?;
        let doc = match descriptor.doc() {
            Some(doc) => owned_c_string(&mut strings, doc)?,
            None => ptr::null(),
        };
        let def = Box::new(RawModuleDef {
            name,
            doc,
            state_size: descriptor.state_size(),
            functions: entries.as_ptr(),
        });

        Ok(Self {
            module_name: descriptor.name().to_string(),
            _strings: strings,
            entries,
            def,
        })
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn module_def(&self) -> *const RawModuleDef {
        &*self.def
    }

    /// Full table including the trailing sentinel.
    pub fn entries(&self) -> &[RawFunctionEntry] {
        &self.entries
    }
}

fn lookup_trampoline(
    trampolines: &[(&str, RawCallable)],
    entry: &FunctionEntry,
) -> Result<RawCallable, AbiError> {
    trampolines
        .iter()
        .find(|(name, _)| *name == entry.name)
        .map(|(_, call)| *call)
        .ok_or_else(|| AbiError::MissingTrampoline(entry.name.to_string()))
}

fn owned_c_string(strings: &mut Vec<CString>, value: &str) -> Result<*const c_char, AbiError> {
    let owned = CString::new(value).map_err(AbiError::InteriorNul)?;
    // The CString's heap buffer does not move when the Vec reallocates.
    let pointer = owned.as_ptr();
    strings.push(owned);
    Ok(pointer)
}

/// Errors building the C form of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    InteriorNul(NulError),
    MissingTrampoline(String),
}

impl Display for AbiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InteriorNul(err) => write!(f, "string contains an interior NUL byte: {err}"),
            Self::MissingTrampoline(name) => write!(f, "no C entry point for export: {name}"),
        }
    }
}

impl Error for AbiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InteriorNul(err) => Some(err),
            Self::MissingTrampoline(_) => None,
        }
    }
}
