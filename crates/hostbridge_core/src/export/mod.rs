//! Export declarations.
//!
//! This module defines the declaration-time side of a native module: the
//! callable contract, calling conventions, the function registry and the
//! module descriptor. Nothing here touches a host handle.

pub mod callable;
pub mod convention;
pub mod descriptor;
pub mod registry;
