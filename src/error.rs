//! # Error Types
//!
//! Three families of errors flow through the exporter:
//!
//! - [`ConfigError`]: fatal, raised while loading and validating the
//!   configuration file. The process exits before any network activity.
//! - [`CodecError`]: raised by the register codec when raw words cannot be
//!   turned into a typed value. Absorbed per register by the scheduler.
//! - [`ExporterError`]: the umbrella type returned by transports, the
//!   scheduler and the exposition layer.

use thiserror::Error;

/// Result alias used across the crate.
pub type ExporterResult<T> = Result<T, ExporterError>;

/// Failures of the register codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The caller supplied a different number of words than the type needs.
    #[error("Register count mismatch for {value_type}: expected {expected}, got {actual}")]
    RegisterCountMismatch {
        value_type: String,
        expected: usize,
        actual: usize,
    },

    /// The value type tag is not in the type table.
    #[error("Unsupported value type: {tag}")]
    UnsupportedType { tag: String },

    /// Not enough bytes to reinterpret as the target width.
    #[error("Malformed payload for {value_type}: need {needed} bytes, have {available}")]
    MalformedPayload {
        value_type: String,
        needed: usize,
        available: usize,
    },
}

impl CodecError {
    /// A count mismatch can only happen if configuration validation derived
    /// the wrong register count, so it is logged louder than other failures.
    pub fn is_internal_defect(&self) -> bool {
        matches!(
            self,
            CodecError::RegisterCountMismatch { .. } | CodecError::MalformedPayload { .. }
        )
    }
}

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{group}.{name}: unsupported value type '{tag}'")]
    UnsupportedType {
        group: String,
        name: String,
        tag: String,
    },

    #[error("{group}.{name}: value type '{tag}' not allowed, {group} are always bool")]
    InvalidValueType {
        group: String,
        name: String,
        tag: String,
    },

    #[error("{group}: value_type is required for register '{name}'")]
    MissingValueType { group: String, name: String },

    #[error("{group}: duplicate register name '{name}'")]
    DuplicateName { group: String, name: String },

    #[error("{group}: register name must not be empty")]
    EmptyName { group: String },

    #[error("{group}.{name}: address {address} out of range 0-65535")]
    AddressOutOfRange {
        group: String,
        name: String,
        address: i64,
    },

    #[error("{group}.{name}: {count} registers starting at {address} exceed the address space")]
    AddressSpanOverflow {
        group: String,
        name: String,
        address: u16,
        count: u16,
    },

    #[error("{group}.{name}: invalid size {size} (must be >= 1)")]
    InvalidSize {
        group: String,
        name: String,
        size: i64,
    },

    #[error("{group}.{name}: invalid mock value: {message}")]
    InvalidMockValue {
        group: String,
        name: String,
        message: String,
    },

    #[error("Invalid static label '{label}': {message}")]
    InvalidLabel { label: String, message: String },

    #[error("Invalid {field} port {port} (must be 1-65535)")]
    InvalidPort { field: String, port: i64 },

    #[error("Invalid {field}: {message}")]
    InvalidField { field: String, message: String },
}

/// Runtime errors of the exporter.
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Read error: {message}")]
    Read { message: String },

    #[error("Timeout: {operation} after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Invalid function code: {code:#04x}")]
    InvalidFunction { code: u8 },

    #[error("Modbus exception: function={function:#04x}, code={code:#04x} ({message})")]
    Exception {
        function: u8,
        code: u8,
        message: String,
    },

    #[error("Decode error: {0}")]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ExporterError {
    pub fn connection(message: impl Into<String>) -> Self {
        ExporterError::Connection {
            message: message.into(),
        }
    }

    pub fn read(message: impl Into<String>) -> Self {
        ExporterError::Read {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        ExporterError::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        ExporterError::Protocol {
            message: message.into(),
        }
    }

    /// Whether the underlying link should be considered dead.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            ExporterError::Connection { .. } | ExporterError::Io(_) | ExporterError::Timeout { .. }
        )
    }
}
