//! Boundary choke point between native callables and the host.
//!
//! # Responsibility
//! - Run native work so that no unwind ever leaves this module.
//! - Translate every failure into the host's error channel.
//!
//! # Invariants
//! - A `None` result always comes with a host error raised.
//! - A `Some` result never comes with an error raised by this module.
//! - Callables, the host's value constructors and module construction all
//!   pass through [`guard`].

use crate::export::callable::CallContext;
use crate::export::registry::{FunctionEntry, FunctionRegistry};
use crate::host::{ExportedValue, HostErrorKind, HostRuntime};
use crate::logging::panic_payload_summary;
use crate::value::CallArgs;
use log::{debug, warn};
use std::panic::{self, AssertUnwindSafe};

/// Failure produced inside the boundary, before it reaches the host.
pub type BoundaryError = (HostErrorKind, String);

/// Runs `work`, converting an `Err` or a caught panic into a raised host error.
pub fn guard<H, T>(
    host: &H,
    operation: &str,
    work: impl FnOnce() -> Result<T, BoundaryError>,
) -> Option<T>
where
    H: HostRuntime,
{
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err((kind, message))) => {
            warn!(
                "event=boundary_error module=bridge status=error operation={} kind={} message={}",
                operation, kind, message
            );
            host.raise(kind, &message);
            None
        }
        Err(payload) => {
            let summary = panic_payload_summary(payload.as_ref());
            warn!(
                "event=boundary_panic module=bridge status=error operation={} payload={}",
                operation, summary
            );
            host.raise(
                HostErrorKind::SystemError,
                &format!("{operation} panicked: {summary}"),
            );
            None
        }
    }
}

/// Invokes one export with native arguments.
pub fn invoke<H: HostRuntime>(
    host: &H,
    entry: &FunctionEntry,
    args: &CallArgs,
) -> Option<ExportedValue<H>> {
    guard(host, entry.name, || {
        entry
            .convention
            .check_arity(entry.name, args)
            .map_err(|message| (HostErrorKind::TypeError, message))?;

        let mut ctx = CallContext::new(args, host);
        let value = (entry.callable)(&mut ctx)
            .map_err(|err| (err.host_kind(), format!("{}(): {err}", entry.name)))?;

        let handle = host.build_value(&value).map_err(|err| {
            (
                HostErrorKind::MemoryError,
                format!("{}(): cannot build result: {err}", entry.name),
            )
        })?;
        debug!(
            "event=export_call module=bridge status=ok name={} result_type={}",
            entry.name,
            value.type_name()
        );
        Ok(ExportedValue::new(handle))
    })
}

/// Invokes one export with arguments in the host's representation.
pub fn invoke_raw<H: HostRuntime>(
    host: &H,
    entry: &FunctionEntry,
    raw: H::RawArgs,
) -> Option<ExportedValue<H>> {
    let args = guard(host, entry.name, || {
        host.extract_args(raw)
            .map_err(|message| (HostErrorKind::TypeError, format!("{}(): {message}", entry.name)))
    })?;
    invoke(host, entry, &args)
}

/// Resolves `name` in `registry` and invokes it.
pub fn invoke_by_name<H: HostRuntime>(
    host: &H,
    registry: &FunctionRegistry,
    name: &str,
    raw: H::RawArgs,
) -> Option<ExportedValue<H>> {
    let Some(entry) = registry.get(name) else {
        host.raise(
            HostErrorKind::AttributeError,
            &format!("module has no attribute '{name}'"),
        );
        return None;
    };
    invoke_raw(host, entry, raw)
}
