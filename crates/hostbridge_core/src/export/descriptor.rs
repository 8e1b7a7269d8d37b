//! Module descriptor: identity, documentation, state size and exports.

use crate::export::registry::{FunctionRegistry, RegistryError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

static MODULE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("module name pattern is a valid regex")
});

/// Prefix of every module initialization symbol.
pub const ENTRY_SYMBOL_PREFIX: &str = "hostbridge_init_";

/// Per-instance state a module asks the host to reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceState {
    /// Stateless module; the host keeps one instance per process.
    #[default]
    NotApplicable,
    Bytes(usize),
}

impl InstanceState {
    /// Value written into the C module definition (`-1` when not applicable).
    ///
    /// `None` when the byte count does not fit the signed size field.
    pub fn abi_size(self) -> Option<isize> {
        match self {
            Self::NotApplicable => Some(-1),
            Self::Bytes(size) => isize::try_from(size).ok(),
        }
    }
}

fn checked_state_size(state: InstanceState) -> Result<isize, DescriptorError> {
    match state {
        InstanceState::NotApplicable => Ok(-1),
        InstanceState::Bytes(size) => {
            isize::try_from(size).map_err(|_| DescriptorError::StateTooLarge(size))
        }
    }
}

/// Static description of one native module.
///
/// Built once, then only read. The host derives the entry point symbol from
/// `name`.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    name: String,
    doc: Option<String>,
    state: InstanceState,
    state_size: isize,
    registry: FunctionRegistry,
}

impl ModuleDescriptor {
    pub fn new(
        name: impl Into<String>,
        doc: Option<String>,
        state: InstanceState,
        registry: FunctionRegistry,
    ) -> Result<Self, DescriptorError> {
        let state_size = checked_state_size(state)?;
        let descriptor = Self {
            name: name.into(),
            doc,
            state,
            state_size,
            registry,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Re-checks identity invariants. Construction already enforces them.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.name.trim().is_empty() {
            return Err(DescriptorError::EmptyName);
        }
        if !MODULE_NAME_PATTERN.is_match(&self.name) {
            return Err(DescriptorError::InvalidName(self.name.clone()));
        }
        checked_state_size(self.state)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last dotted component; the part the entry point symbol is derived from.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Name of the C initialization symbol a host looks up for this module.
    pub fn entry_symbol(&self) -> String {
        format!("{ENTRY_SYMBOL_PREFIX}{}", self.short_name())
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// State size as written into the C module definition.
    pub fn state_size(&self) -> isize {
        self.state_size
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Serializable summary of the module's host-visible surface.
    pub fn manifest(&self) -> ModuleManifest {
        ModuleManifest {
            name: self.name.clone(),
            entry_symbol: self.entry_symbol(),
            doc: self.doc.clone(),
            state_size: self.state_size,
            exports: self
                .registry
                .iter()
                .map(|entry| ExportManifest {
                    name: entry.name.to_string(),
                    convention: entry.convention.as_str().to_string(),
                    flags: entry.convention.flags(),
                    doc: entry.doc.to_string(),
                })
                .collect(),
        }
    }
}

/// Serializable module summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleManifest {
    pub name: String,
    pub entry_symbol: String,
    pub doc: Option<String>,
    pub state_size: isize,
    pub exports: Vec<ExportManifest>,
}

/// Serializable export summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportManifest {
    pub name: String,
    pub convention: String,
    pub flags: u32,
    pub doc: String,
}

/// Descriptor validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    EmptyName,
    InvalidName(String),
    StateTooLarge(usize),
    Registry(RegistryError),
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "module name must not be empty"),
            Self::InvalidName(value) => write!(f, "module name is invalid: {value}"),
            Self::StateTooLarge(size) => {
                write!(f, "instance state of {size} bytes exceeds the host limit")
            }
            Self::Registry(err) => write!(f, "invalid function registry: {err}"),
        }
    }
}

impl Error for DescriptorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            Self::EmptyName | Self::InvalidName(_) | Self::StateTooLarge(_) => None,
        }
    }
}

impl From<RegistryError> for DescriptorError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}
