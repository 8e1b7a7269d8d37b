//! In-process host runtime.
//!
//! # Responsibility
//! - Own values in a reference-counted arena addressed by opaque handles.
//! - Keep a single "last error" slot the way an interpreter thread does.
//! - Capture diagnostic lines, optionally echoing them to stdout.
//!
//! # Invariants
//! - A released handle is never reused while another holder still counts it.
//! - An allocation budget, when set, makes allocation failure deterministic.

use crate::export::callable::DiagnosticSink;
use crate::export::descriptor::ModuleDescriptor;
use crate::host::{HostAllocError, HostErrorKind, HostRuntime};
use crate::value::{CallArgs, NativeValue};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Opaque reference into the local arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalHandle(usize);

/// Error captured in the local host's error slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    pub kind: HostErrorKind,
    pub message: String,
}

/// Object stored in the local arena.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalObject {
    Value(NativeValue),
    Module {
        name: String,
        doc: Option<String>,
        exports: Vec<String>,
    },
}

/// Arguments passed to the local host by handle.
#[derive(Debug, Clone, Default)]
pub struct LocalArgs {
    pub positional: Vec<LocalHandle>,
    pub keywords: Vec<(String, LocalHandle)>,
}

impl LocalArgs {
    pub fn none() -> Self {
        Self::default()
    }
}

struct Slot {
    object: LocalObject,
    refcount: usize,
}

#[derive(Default)]
struct LocalState {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    last_error: Option<HostError>,
    diagnostics: Vec<String>,
    allocation_budget: Option<usize>,
}

/// Host runtime living in the current process.
#[derive(Default)]
pub struct LocalHost {
    state: Mutex<LocalState>,
    echo_diagnostics: bool,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echoes every diagnostic line to stdout in addition to capturing it.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo_diagnostics = echo;
        self
    }

    /// Allows at most `budget` further allocations; `None` removes the limit.
    pub fn set_allocation_budget(&self, budget: Option<usize>) {
        self.lock().allocation_budget = budget;
    }

    /// Allocates a value owned by the host, starting with one reference.
    pub fn alloc(&self, value: NativeValue) -> Result<LocalHandle, HostAllocError> {
        self.insert(LocalObject::Value(value))
    }

    /// Builds borrowed call arguments from native values.
    pub fn args(&self, args: &CallArgs) -> Result<LocalArgs, HostAllocError> {
        let mut raw = LocalArgs::none();
        for value in &args.positional {
            raw.positional.push(self.alloc(value.clone())?);
        }
        for (name, value) in &args.keywords {
            raw.keywords.push((name.clone(), self.alloc(value.clone())?));
        }
        Ok(raw)
    }

    /// Returns a copy of the object behind `handle`.
    pub fn get(&self, handle: LocalHandle) -> Option<LocalObject> {
        self.lock()
            .slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .map(|slot| slot.object.clone())
    }

    /// Returns the value behind `handle` when it is a plain value.
    pub fn value(&self, handle: LocalHandle) -> Option<NativeValue> {
        match self.get(handle)? {
            LocalObject::Value(value) => Some(value),
            LocalObject::Module { .. } => None,
        }
    }

    pub fn incref(&self, handle: LocalHandle) -> bool {
        let mut state = self.lock();
        match state.slots.get_mut(handle.0).and_then(Option::as_mut) {
            Some(slot) => {
                slot.refcount += 1;
                true
            }
            None => false,
        }
    }

    /// Drops one reference; frees the slot when the count reaches zero.
    pub fn release(&self, handle: LocalHandle) -> bool {
        let mut state = self.lock();
        let Some(slot) = state.slots.get_mut(handle.0).and_then(Option::as_mut) else {
            return false;
        };
        slot.refcount -= 1;
        if slot.refcount == 0 {
            state.slots[handle.0] = None;
            state.free.push(handle.0);
        }
        true
    }

    pub fn live_objects(&self) -> usize {
        self.lock().slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn last_error(&self) -> Option<HostError> {
        self.lock().last_error.clone()
    }

    /// Returns and clears the pending error.
    pub fn take_error(&self) -> Option<HostError> {
        self.lock().last_error.take()
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.lock().diagnostics.clone()
    }

    fn insert(&self, object: LocalObject) -> Result<LocalHandle, HostAllocError> {
        let mut state = self.lock();
        if let Some(budget) = state.allocation_budget.as_mut() {
            if *budget == 0 {
                return Err(HostAllocError::OutOfMemory);
            }
            *budget -= 1;
        }
        let slot = Some(Slot {
            object,
            refcount: 1,
        });
        let index = match state.free.pop() {
            Some(index) => {
                state.slots[index] = slot;
                index
            }
            None => {
                state.slots.push(slot);
                state.slots.len() - 1
            }
        };
        Ok(LocalHandle(index))
    }

    fn lock(&self) -> MutexGuard<'_, LocalState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DiagnosticSink for LocalHost {
    fn write_line(&self, line: &str) {
        if self.echo_diagnostics {
            println!("{line}");
        }
        self.lock().diagnostics.push(line.to_string());
    }
}

impl HostRuntime for LocalHost {
    type Handle = LocalHandle;
    type RawArgs = LocalArgs;

    fn create_module(&self, descriptor: &ModuleDescriptor) -> Result<LocalHandle, HostAllocError> {
        self.insert(LocalObject::Module {
            name: descriptor.name().to_string(),
            doc: descriptor.doc().map(str::to_string),
            exports: descriptor
                .registry()
                .names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }

    fn build_value(&self, value: &NativeValue) -> Result<LocalHandle, HostAllocError> {
        self.alloc(value.clone())
    }

    fn extract_args(&self, raw: LocalArgs) -> Result<CallArgs, String> {
        let read = |handle: LocalHandle| {
            self.value(handle)
                .ok_or_else(|| format!("argument handle {} is not a value", handle.0))
        };
        let mut args = CallArgs::none();
        for handle in raw.positional {
            args.positional.push(read(handle)?);
        }
        let mut keywords = BTreeMap::new();
        for (name, handle) in raw.keywords {
            keywords.insert(name, read(handle)?);
        }
        args.keywords = keywords;
        Ok(args)
    }

    fn raise(&self, kind: HostErrorKind, message: &str) {
        self.lock().last_error = Some(HostError {
            kind,
            message: message.to_string(),
        });
    }

    fn error_pending(&self) -> bool {
        self.lock().last_error.is_some()
    }

    fn clear_error(&self) {
        self.lock().last_error = None;
    }
}
