//! Native callable contract.
//!
//! A native callable only sees native data. It never touches a host handle
//! and never reports failure by unwinding: errors are returned as
//! [`CallError`] and the boundary translates them into the host's error
//! channel.

use crate::host::HostErrorKind;
use crate::value::{CallArgs, NativeValue};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result of one native callable invocation.
pub type CallResult = Result<NativeValue, CallError>;

/// Signature every exported native function has.
pub type NativeFn = fn(&mut CallContext<'_>) -> CallResult;

/// Line-oriented diagnostic stream owned by the host.
pub trait DiagnosticSink {
    fn write_line(&self, line: &str);
}

/// Per-invocation view handed to a native callable.
pub struct CallContext<'a> {
    args: &'a CallArgs,
    diagnostics: &'a dyn DiagnosticSink,
}

impl<'a> CallContext<'a> {
    pub fn new(args: &'a CallArgs, diagnostics: &'a dyn DiagnosticSink) -> Self {
        Self { args, diagnostics }
    }

    pub fn args(&self) -> &CallArgs {
        self.args
    }

    /// Writes one diagnostic line. Completes before the callable returns.
    pub fn diagnostic(&mut self, line: &str) {
        self.diagnostics.write_line(line);
    }
}

/// Failures a native callable may report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    InvalidArgument(String),
    Runtime(String),
    OutOfMemory,
}

impl CallError {
    /// Host error class this failure is raised as.
    pub fn host_kind(&self) -> HostErrorKind {
        match self {
            Self::InvalidArgument(_) => HostErrorKind::TypeError,
            Self::Runtime(_) => HostErrorKind::RuntimeError,
            Self::OutOfMemory => HostErrorKind::MemoryError,
        }
    }
}

impl Display for CallError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "{message}"),
            Self::Runtime(message) => write!(f, "{message}"),
            Self::OutOfMemory => write!(f, "out of memory while building result"),
        }
    }
}

impl Error for CallError {}
