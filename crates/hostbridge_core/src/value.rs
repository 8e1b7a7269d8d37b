//! Native-side values and call arguments.
//!
//! # Responsibility
//! - Describe the data a native callable consumes and produces.
//! - Stay host-neutral: conversion to host handles happens at the boundary.
//!
//! # Invariants
//! - A `NativeValue` never holds a host handle.

use crate::export::callable::CallError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Plain native data that a host runtime knows how to represent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NativeValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<NativeValue>),
}

impl NativeValue {
    /// Stable type label used in argument errors and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl Display for NativeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Arguments handed to one native callable invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<NativeValue>,
    pub keywords: BTreeMap<String, NativeValue>,
}

impl CallArgs {
    /// Empty argument set, the only shape a `NoArgs` callable accepts.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn positional(values: Vec<NativeValue>) -> Self {
        Self {
            positional: values,
            keywords: BTreeMap::new(),
        }
    }

    pub fn with_keyword(mut self, name: impl Into<String>, value: NativeValue) -> Self {
        self.keywords.insert(name.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NativeValue> {
        self.positional.get(index)
    }

    pub fn keyword(&self, name: &str) -> Option<&NativeValue> {
        self.keywords.get(name)
    }

    /// Returns positional argument `index` as a string slice.
    pub fn expect_str(&self, index: usize) -> Result<&str, CallError> {
        let value = self.require(index)?;
        value.as_str().ok_or_else(|| {
            CallError::InvalidArgument(format!(
                "argument {index} must be str, got {}",
                value.type_name()
            ))
        })
    }

    /// Returns positional argument `index` as an integer.
    pub fn expect_int(&self, index: usize) -> Result<i64, CallError> {
        let value = self.require(index)?;
        value.as_int().ok_or_else(|| {
            CallError::InvalidArgument(format!(
                "argument {index} must be int, got {}",
                value.type_name()
            ))
        })
    }

    fn require(&self, index: usize) -> Result<&NativeValue, CallError> {
        self.positional.get(index).ok_or_else(|| {
            CallError::InvalidArgument(format!(
                "missing argument {index} (got {})",
                self.positional.len()
            ))
        })
    }
}
