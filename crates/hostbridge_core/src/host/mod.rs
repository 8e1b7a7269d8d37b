//! Host runtime contract.
//!
//! # Responsibility
//! - Describe what the bridge needs from a host: value construction, module
//!   construction, argument extraction and the "last error" channel.
//! - Wrap host handles so native code gives them up when returning them.
//!
//! # Invariants
//! - Every failure reaches the host through [`HostRuntime::raise`].
//! - A host handle handed back through [`ExportedValue::into_raw`] or
//!   [`ModuleInstance::into_raw`] is owned by the host from then on.

use crate::export::callable::DiagnosticSink;
use crate::export::descriptor::ModuleDescriptor;
use crate::value::{CallArgs, NativeValue};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod local;

/// Error classes raised through the host's error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HostErrorKind {
    TypeError = 1,
    RuntimeError = 2,
    MemoryError = 3,
    ImportError = 4,
    AttributeError = 5,
    SystemError = 6,
}

impl HostErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TypeError => "TypeError",
            Self::RuntimeError => "RuntimeError",
            Self::MemoryError => "MemoryError",
            Self::ImportError => "ImportError",
            Self::AttributeError => "AttributeError",
            Self::SystemError => "SystemError",
        }
    }

    /// Stable numeric code passed across the C ABI.
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::TypeError),
            2 => Some(Self::RuntimeError),
            3 => Some(Self::MemoryError),
            4 => Some(Self::ImportError),
            5 => Some(Self::AttributeError),
            6 => Some(Self::SystemError),
            _ => None,
        }
    }
}

impl Display for HostErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host refused to allocate an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAllocError {
    OutOfMemory,
    Unsupported(String),
}

impl Display for HostAllocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "host allocation failed"),
            Self::Unsupported(what) => write!(f, "host cannot represent value: {what}"),
        }
    }
}

impl Error for HostAllocError {}

/// Contract a host runtime fulfils for the bridge.
///
/// Implementations own every handle they return. The bridge only moves
/// handles back to the host; it never releases them itself.
pub trait HostRuntime: DiagnosticSink {
    /// Opaque reference to a host-owned object.
    type Handle;
    /// Arguments in the host's own representation, borrowed for one call.
    type RawArgs;

    /// Materializes a module object from its descriptor.
    fn create_module(&self, descriptor: &ModuleDescriptor) -> Result<Self::Handle, HostAllocError>;

    /// Converts native data into a new host object.
    fn build_value(&self, value: &NativeValue) -> Result<Self::Handle, HostAllocError>;

    /// Reads host arguments into native data.
    fn extract_args(&self, raw: Self::RawArgs) -> Result<CallArgs, String>;

    /// Sets the host's "last error" indicator.
    fn raise(&self, kind: HostErrorKind, message: &str);

    fn error_pending(&self) -> bool;

    fn clear_error(&self);
}

/// Result value owned by the host once returned.
///
/// Not `Clone`: the only way out is [`ExportedValue::into_raw`], which
/// consumes the wrapper.
#[must_use = "an exported value must be handed back to the host"]
pub struct ExportedValue<H: HostRuntime> {
    handle: H::Handle,
}

impl<H: HostRuntime> ExportedValue<H> {
    pub(crate) fn new(handle: H::Handle) -> Self {
        Self { handle }
    }

    /// Gives the handle to the host.
    pub fn into_raw(self) -> H::Handle {
        self.handle
    }
}

impl<H: HostRuntime> std::fmt::Debug for ExportedValue<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportedValue").finish_non_exhaustive()
    }
}

/// Realized module object, owned by the host once returned.
#[must_use = "a module instance must be handed back to the host"]
pub struct ModuleInstance<H: HostRuntime> {
    handle: H::Handle,
    name: String,
}

impl<H: HostRuntime> ModuleInstance<H> {
    pub(crate) fn new(handle: H::Handle, name: &str) -> Self {
        Self {
            handle,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gives the module handle to the host.
    pub fn into_raw(self) -> H::Handle {
        self.handle
    }
}

impl<H: HostRuntime> std::fmt::Debug for ModuleInstance<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
