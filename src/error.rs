//! Error types for schema parsing, dataset validation, and migration.
//!
//! Validation and migration failures are recoverable values the caller inspects;
//! command handlers wrap them in `anyhow` with context.

use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use crate::{schema::DataType, version::Version};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid schema version '{text}': expected <major>.<minor>.<patch>")]
    Invalid { text: String },
    #[error("Cannot bump the {part} component of version {version}: it is already at its maximum")]
    Overflow { version: Version, part: &'static str },
}

/// Which string length limit a value broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthBound {
    Min(usize),
    Max(usize),
}

impl fmt::Display for LengthBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthBound::Min(limit) => write!(f, "shorter than min_length {limit}"),
            LengthBound::Max(limit) => write!(f, "longer than max_length {limit}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required columns: {}", names.iter().join(", "))]
    MissingColumns { names: Vec<String> },
    #[error("Column '{column}' dtype mismatch: expected {expected}, got {observed}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        observed: DataType,
    },
    #[error("Column '{column}' contains {nulls} null value(s) but allow_nulls is false")]
    UnexpectedNull { column: String, nulls: usize },
    #[error("Column '{column}' has values below minimum {min}")]
    BelowMinimum { column: String, min: f64 },
    #[error("Column '{column}' has values above maximum {max}")]
    AboveMaximum { column: String, max: f64 },
    #[error("Column '{column}' has values outside enum [{}]", allowed.iter().join(", "))]
    EnumViolation { column: String, allowed: Vec<String> },
    #[error("Column '{column}' has strings {bound}")]
    StringLengthViolation { column: String, bound: LengthBound },
    #[error("Column '{column}' has strings not matching pattern {pattern}")]
    PatternViolation { column: String, pattern: String },
    #[error("Target column '{name}' is not present in the dataset")]
    MissingTarget { name: String },
}

impl ValidationError {
    /// Column the violation refers to, if it is about a single column.
    pub fn column(&self) -> Option<&str> {
        match self {
            ValidationError::MissingColumns { .. } => None,
            ValidationError::TypeMismatch { column, .. }
            | ValidationError::UnexpectedNull { column, .. }
            | ValidationError::BelowMinimum { column, .. }
            | ValidationError::AboveMaximum { column, .. }
            | ValidationError::EnumViolation { column, .. }
            | ValidationError::StringLengthViolation { column, .. }
            | ValidationError::PatternViolation { column, .. } => Some(column),
            ValidationError::MissingTarget { name } => Some(name),
        }
    }
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration {from} -> {to} already registered")]
    DuplicateMigration { from: Version, to: Version },
    #[error("No migration step registered from {at} towards {target}")]
    NoPathFound { at: Version, target: Version },
    #[error("Cyclic migration steps detected at {at}")]
    CycleDetected { at: Version },
    #[error("Migration step {version} -> {version} cannot start and end at the same version")]
    SelfLoop { version: Version },
    #[error("Migration step {from} -> {to} failed")]
    StepFailed {
        from: Version,
        to: Version,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error("Column '{column}' has invalid pattern '{pattern}'")]
    InvalidPattern {
        column: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Column '{column}' enum literal {literal} is not a valid {dtype} value")]
    InvalidEnumLiteral {
        column: String,
        dtype: DataType,
        literal: String,
    },
    #[error("Reading schema document")]
    Io(#[from] std::io::Error),
    #[error("Parsing schema JSON")]
    Json(#[from] serde_json::Error),
    #[error("Parsing schema YAML")]
    Yaml(#[from] serde_yaml::Error),
}
