//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Let a Dart host inspect and call the `test` module's exports via FRB.
//! - Keep error semantics simple: envelopes, never panics.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every call runs against a fresh in-process host, so no handle outlives it.
//! - The module is initialized on that host before any export is resolved.

use hostbridge_core::reference::test_module;
use hostbridge_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, invoke_by_name,
    ping as ping_inner, CallArgs, Initializer, LocalHost, NativeValue,
};

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust logging once per process.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One export as seen by the Dart host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Exported name, as called from the host.
    pub name: String,
    /// Calling convention label (`noargs|o|varargs|varargs_keywords`).
    pub convention: String,
    pub doc: String,
}

/// Result envelope of one export invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeResponse {
    pub ok: bool,
    /// Rendered return value on success.
    pub value: Option<String>,
    /// Host error class on failure (`TypeError`, `MemoryError`, ...).
    pub error_kind: Option<String>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
    /// Diagnostic lines the export wrote during the call.
    pub diagnostics: Vec<String>,
}

impl InvokeResponse {
    fn failure(kind: Option<String>, message: impl Into<String>, diagnostics: Vec<String>) -> Self {
        Self {
            ok: false,
            value: None,
            error_kind: kind,
            message: message.into(),
            diagnostics,
        }
    }
}

/// Lists exports of the `test` module in declaration order.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Returns an empty list when the module cannot be described.
#[flutter_rust_bridge::frb(sync)]
pub fn list_exports() -> Vec<ExportSummary> {
    let Ok(module) = test_module() else {
        return Vec::new();
    };
    module
        .registry()
        .iter()
        .map(|entry| ExportSummary {
            name: entry.name.to_string(),
            convention: entry.convention.as_str().to_string(),
            doc: entry.doc.to_string(),
        })
        .collect()
}

/// Invokes one export by name with string positional arguments.
///
/// # FFI contract
/// - Sync call; runs the export on the calling thread.
/// - Never panics; failures come back as `ok=false` with the host error class.
#[flutter_rust_bridge::frb(sync)]
pub fn invoke_export(name: String, args: Vec<String>) -> InvokeResponse {
    let module = match test_module() {
        Ok(module) => module,
        Err(err) => {
            return InvokeResponse::failure(None, format!("invoke_export failed: {err}"), Vec::new())
        }
    };

    let host = LocalHost::new();
    let Some(instance) = Initializer::new().initialize(&host, module) else {
        return match host.take_error() {
            Some(error) => InvokeResponse::failure(
                Some(error.kind.as_str().to_string()),
                error.message,
                Vec::new(),
            ),
            None => InvokeResponse::failure(None, "module initialization failed", Vec::new()),
        };
    };
    let module_handle = instance.into_raw();

    let call_args = CallArgs::positional(args.into_iter().map(NativeValue::Str).collect());
    let raw = match host.args(&call_args) {
        Ok(raw) => raw,
        Err(err) => {
            return InvokeResponse::failure(
                Some("MemoryError".to_string()),
                format!("invoke_export failed: {err}"),
                Vec::new(),
            )
        }
    };

    let result = invoke_by_name(&host, module.registry(), name.trim(), raw);
    host.release(module_handle);
    let diagnostics = host.diagnostics();
    match result.and_then(|value| host.value(value.into_raw())) {
        Some(value) => InvokeResponse {
            ok: true,
            value: Some(render_value(&value)),
            error_kind: None,
            message: format!("{}() returned {}.", name.trim(), value.type_name()),
            diagnostics,
        },
        None => match host.take_error() {
            Some(error) => InvokeResponse::failure(
                Some(error.kind.as_str().to_string()),
                error.message,
                diagnostics,
            ),
            None => InvokeResponse::failure(None, "export returned no value", diagnostics),
        },
    }
}

fn render_value(value: &NativeValue) -> String {
    match value {
        NativeValue::Str(text) => text.clone(),
        other => other.to_string(),
    }
}
