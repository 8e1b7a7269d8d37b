//! Module initialization entry point.
//!
//! # Invariants
//! - One `Initializer` admits exactly one initialization attempt.
//! - `Initialized` and `Failed` are terminal.
//! - A failed or rejected attempt returns `None` with a host error raised.

use crate::boundary::{guard, BoundaryError};
use crate::export::descriptor::ModuleDescriptor;
use crate::host::{HostErrorKind, HostRuntime, ModuleInstance};
use log::{error, info};
use std::sync::atomic::{AtomicU8, Ordering};

const STATE_UNINITIALIZED: u8 = 0;
const STATE_INITIALIZING: u8 = 1;
const STATE_INITIALIZED: u8 = 2;
const STATE_FAILED: u8 = 3;

/// Observable initialization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Initialized,
    Failed,
}

/// One-shot module initialization state machine.
#[derive(Debug)]
pub struct Initializer {
    state: AtomicU8,
}

impl Default for Initializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Initializer {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_UNINITIALIZED),
        }
    }

    pub fn state(&self) -> InitState {
        match self.state.load(Ordering::Acquire) {
            STATE_UNINITIALIZED => InitState::Uninitialized,
            STATE_INITIALIZING => InitState::Initializing,
            STATE_INITIALIZED => InitState::Initialized,
            _ => InitState::Failed,
        }
    }

    /// Builds a module instance from `descriptor`.
    ///
    /// On failure the host error channel is set before `None` is returned.
    pub fn initialize<H: HostRuntime>(
        &self,
        host: &H,
        descriptor: &ModuleDescriptor,
    ) -> Option<ModuleInstance<H>> {
        self.initialize_with(host, descriptor.name(), || Ok(descriptor))
    }

    /// Like [`Initializer::initialize`], but resolves the descriptor inside the
    /// guarded section. A resolution failure ends in `Failed` like any other.
    pub fn initialize_with<'d, H, F>(
        &self,
        host: &H,
        name: &str,
        resolve: F,
    ) -> Option<ModuleInstance<H>>
    where
        H: HostRuntime,
        F: FnOnce() -> Result<&'d ModuleDescriptor, BoundaryError>,
    {
        if let Err(previous) = self.state.compare_exchange(
            STATE_UNINITIALIZED,
            STATE_INITIALIZING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            let reason = match previous {
                STATE_INITIALIZING => "initialization is already in progress",
                STATE_INITIALIZED => "module is already initialized",
                _ => "a previous initialization failed",
            };
            error!(
                "event=module_init module=bridge status=error name={} reason=\"{}\"",
                name, reason
            );
            host.raise(
                HostErrorKind::ImportError,
                &format!("cannot init module {name}: {reason}"),
            );
            return None;
        }

        let built = guard(host, "module init", || {
            let descriptor = resolve()?;
            descriptor.validate().map_err(|err| {
                (
                    HostErrorKind::ImportError,
                    format!("cannot init module: {err}"),
                )
            })?;
            let handle = host.create_module(descriptor).map_err(|err| {
                (
                    HostErrorKind::MemoryError,
                    format!("fatal: cannot init module {}: {err}", descriptor.name()),
                )
            })?;
            Ok((handle, descriptor))
        });

        match built {
            Some((handle, descriptor)) => {
                self.state.store(STATE_INITIALIZED, Ordering::Release);
                info!(
                    "event=module_init module=bridge status=ok name={} exports={}",
                    descriptor.name(),
                    descriptor.registry().len()
                );
                Some(ModuleInstance::new(handle, descriptor.name()))
            }
            None => {
                self.state.store(STATE_FAILED, Ordering::Release);
                error!("event=module_init module=bridge status=error name={name}");
                None
            }
        }
    }
}
