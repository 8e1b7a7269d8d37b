//! Native extension surface of the `test` module.
//!
//! - [`abi`]: sentinel-terminated C tables built from the module descriptor.
//! - [`host`]: host vtable binding and the vtable-backed host runtime.
//! - [`entry`]: exported C symbols (`hostbridge_bind_host`, `hostbridge_init_test`).
//! - [`api`]: FRB use-case API for a Dart host.

pub mod abi;
pub mod api;
pub mod entry;
pub mod host;

#[cfg(test)]
mod test_host;
