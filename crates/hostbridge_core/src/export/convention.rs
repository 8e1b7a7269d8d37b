//! Calling-convention declarations for exported functions.

use crate::value::CallArgs;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Flag bit: arguments arrive as one positional sequence.
pub const FLAG_POSITIONAL: u32 = 0x0001;
/// Flag bit: keyword arguments arrive as a mapping. Only valid with `FLAG_POSITIONAL`.
pub const FLAG_KEYWORDS: u32 = 0x0002;
/// Flag bit: the callable takes no arguments.
pub const FLAG_NO_ARGS: u32 = 0x0004;
/// Flag bit: the callable takes exactly one positional argument.
pub const FLAG_SINGLE_ARG: u32 = 0x0008;

/// How a host passes arguments to one native callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallingConvention {
    NoArgs,
    SingleArg,
    Positional,
    PositionalKeywords,
}

impl CallingConvention {
    /// Host flag word written into the C function table.
    pub fn flags(self) -> u32 {
        match self {
            Self::NoArgs => FLAG_NO_ARGS,
            Self::SingleArg => FLAG_SINGLE_ARG,
            Self::Positional => FLAG_POSITIONAL,
            Self::PositionalKeywords => FLAG_POSITIONAL | FLAG_KEYWORDS,
        }
    }

    /// Stable label used in manifests and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoArgs => CONVENTION_NO_ARGS,
            Self::SingleArg => CONVENTION_SINGLE_ARG,
            Self::Positional => CONVENTION_POSITIONAL,
            Self::PositionalKeywords => CONVENTION_POSITIONAL_KEYWORDS,
        }
    }

    pub fn accepts_keywords(self) -> bool {
        matches!(self, Self::PositionalKeywords)
    }

    /// Decodes a host flag word.
    pub fn from_flags(flags: u32) -> Result<Self, ConventionError> {
        match flags {
            0 => Err(ConventionError::EmptyFlags),
            FLAG_NO_ARGS => Ok(Self::NoArgs),
            FLAG_SINGLE_ARG => Ok(Self::SingleArg),
            FLAG_POSITIONAL => Ok(Self::Positional),
            value if value == FLAG_POSITIONAL | FLAG_KEYWORDS => Ok(Self::PositionalKeywords),
            other => Err(ConventionError::UnsupportedFlags(other)),
        }
    }

    /// Parses a stable label.
    pub fn parse(value: &str) -> Result<Self, ConventionError> {
        match value.trim() {
            "" => Err(ConventionError::EmptyLabel),
            CONVENTION_NO_ARGS => Ok(Self::NoArgs),
            CONVENTION_SINGLE_ARG => Ok(Self::SingleArg),
            CONVENTION_POSITIONAL => Ok(Self::Positional),
            CONVENTION_POSITIONAL_KEYWORDS => Ok(Self::PositionalKeywords),
            other => Err(ConventionError::UnsupportedLabel(other.to_string())),
        }
    }

    /// Checks that `args` has the shape this convention promises the callable.
    pub fn check_arity(self, name: &str, args: &CallArgs) -> Result<(), String> {
        if !args.keywords.is_empty() && !self.accepts_keywords() {
            return Err(format!("{name}() takes no keyword arguments"));
        }
        match self {
            Self::NoArgs if !args.positional.is_empty() => Err(format!(
                "{name}() takes no arguments ({} given)",
                args.positional.len()
            )),
            Self::SingleArg if args.positional.len() != 1 => Err(format!(
                "{name}() takes exactly one argument ({} given)",
                args.positional.len()
            )),
            _ => Ok(()),
        }
    }
}

/// Label for [`CallingConvention::NoArgs`].
pub const CONVENTION_NO_ARGS: &str = "noargs";
/// Label for [`CallingConvention::SingleArg`].
pub const CONVENTION_SINGLE_ARG: &str = "o";
/// Label for [`CallingConvention::Positional`].
pub const CONVENTION_POSITIONAL: &str = "varargs";
/// Label for [`CallingConvention::PositionalKeywords`].
pub const CONVENTION_POSITIONAL_KEYWORDS: &str = "varargs_keywords";

/// Calling-convention decode errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConventionError {
    EmptyFlags,
    UnsupportedFlags(u32),
    EmptyLabel,
    UnsupportedLabel(String),
}

impl Display for ConventionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyFlags => write!(f, "calling convention flags must not be zero"),
            Self::UnsupportedFlags(value) => {
                write!(f, "calling convention flags are unsupported: {value:#06x}")
            }
            Self::EmptyLabel => write!(f, "calling convention label must not be empty"),
            Self::UnsupportedLabel(value) => {
                write!(f, "calling convention label is unsupported: {value}")
            }
        }
    }
}

impl Error for ConventionError {}
