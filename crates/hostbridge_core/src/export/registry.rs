//! Function registry: exported names mapped to native callables.
//!
//! # Invariants
//! - Exported names are unique within one registry; duplicates are rejected
//!   when the registry is built, never resolved at call time.
//! - The registry is immutable once built and may be shared across threads.
//! - Order is declaration order. The sentinel-terminated C form is produced
//!   only at the ABI boundary.

use crate::export::callable::NativeFn;
use crate::export::convention::CallingConvention;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static EXPORT_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("export name pattern is a valid regex")
});

/// One exported function declaration.
#[derive(Clone, Copy)]
pub struct FunctionEntry {
    /// Name visible to code running inside the host.
    pub name: &'static str,
    pub callable: NativeFn,
    pub convention: CallingConvention,
    pub doc: &'static str,
}

impl FunctionEntry {
    pub const fn new(
        name: &'static str,
        callable: NativeFn,
        convention: CallingConvention,
        doc: &'static str,
    ) -> Self {
        Self {
            name,
            callable,
            convention,
            doc,
        }
    }
}

impl std::fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("name", &self.name)
            .field("convention", &self.convention)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

/// Ordered, validated, immutable set of exported functions.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    entries: Vec<FunctionEntry>,
    index: BTreeMap<&'static str, usize>,
}

impl FunctionRegistry {
    /// Builds a registry from declarations, rejecting invalid or repeated names.
    pub fn new(entries: Vec<FunctionEntry>) -> Result<Self, RegistryError> {
        let mut index = BTreeMap::new();
        for (position, entry) in entries.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if !is_valid_export_name(entry.name) {
                return Err(RegistryError::InvalidName(entry.name.to_string()));
            }
            if index.insert(entry.name, position).is_some() {
                return Err(RegistryError::DuplicateName(entry.name.to_string()));
            }
        }
        Ok(Self { entries, index })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[FunctionEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.entries.iter()
    }

    /// Looks up one entry by exported name.
    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.index.get(name).map(|position| &self.entries[*position])
    }

    /// Exported names in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }
}

/// Returns whether `value` is usable as an exported name.
pub fn is_valid_export_name(value: &str) -> bool {
    EXPORT_NAME_PATTERN.is_match(value)
}

/// Registry construction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    EmptyName,
    InvalidName(String),
    DuplicateName(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "exported name must not be empty"),
            Self::InvalidName(value) => write!(f, "exported name is invalid: {value}"),
            Self::DuplicateName(value) => write!(f, "exported name already registered: {value}"),
        }
    }
}

impl Error for RegistryError {}
