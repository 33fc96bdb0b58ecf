// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the MrTooley tool framework.

use thiserror::Error;

/// The primary error type used across all MrTooley crates.
#[derive(Debug, Error)]
pub enum MrTooleyError {
    /// Configuration errors (invalid TOML, unknown backend, bad log level).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (file access, SQL failure, encoding).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A key was not found, or the key/path itself is malformed.
    #[error("storage key error: {key}")]
    StorageKey { key: String },

    /// A path crossed over a value where a mapping was required.
    #[error("got a value instead of a mapping at '{segment}' for path '{path}'")]
    MappingExpected { path: String, segment: String },

    /// A value type the backend or property cannot handle.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Packing or unpacking of a serialized datatype failed.
    #[error("serializer error: {0}")]
    Serializer(String),

    /// A serialized object refers to a datatype that was never registered.
    #[error("datatype not registered: {0}")]
    ClassNotFound(String),

    /// Property tree misuse (wrong ptype, duplicate key, invalid link).
    #[error("property error: {0}")]
    Property(String),

    /// Requested tool was not found in the registry.
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    /// A tool failed while running.
    #[error("tool error: {message}")]
    Tool {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Network lookups and scanners.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed input data (nmap XML, OUI files, CLI values).
    #[error("parse error: {0}")]
    Parse(String),

    /// Filesystem and process I/O.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MrTooleyError {
    /// Shorthand for a `StorageKey` error.
    pub fn key(key: impl Into<String>) -> Self {
        Self::StorageKey { key: key.into() }
    }

    /// Wraps any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// True for errors that mean "nothing stored here" rather than a backend failure.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, Self::StorageKey { .. })
    }
}
