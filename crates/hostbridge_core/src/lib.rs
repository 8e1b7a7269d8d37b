//! Host-neutral core of the native extension bridge.
//! Declares exports, guards the boundary and initializes module instances.

pub mod boundary;
pub mod config;
pub mod export;
pub mod host;
pub mod init;
pub mod logging;
pub mod reference;
pub mod value;

pub use boundary::{guard, invoke, invoke_by_name, invoke_raw, BoundaryError};
pub use config::{BridgeConfig, ConfigError};
pub use export::callable::{CallContext, CallError, CallResult, DiagnosticSink, NativeFn};
pub use export::convention::{CallingConvention, ConventionError};
pub use export::descriptor::{
    DescriptorError, ExportManifest, InstanceState, ModuleDescriptor, ModuleManifest,
};
pub use export::registry::{FunctionEntry, FunctionRegistry, RegistryError};
pub use host::local::{HostError, LocalArgs, LocalHandle, LocalHost, LocalObject};
pub use host::{ExportedValue, HostAllocError, HostErrorKind, HostRuntime, ModuleInstance};
pub use init::{InitState, Initializer};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use value::{CallArgs, NativeValue};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
