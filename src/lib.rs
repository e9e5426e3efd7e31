//! # PLC Exporter - Modbus TCP to Prometheus
//!
//! Periodically polls typed values from a PLC over Modbus TCP and
//! republishes them as Prometheus metrics.
//!
//! ## Pipeline
//!
//! ```text
//! Scheduler --words--> Codec --RegisterValue--> MetricModel --samples--> MetricsSink
//! ```
//!
//! - **Type Table** ([`types`]): value type tag to byte width and register count
//! - **Register Codec** ([`codec`]): raw words to typed values, with independent
//!   byte and word order
//! - **Metric Model** ([`model`]): static or dynamic naming layout
//! - **Scrape Scheduler** ([`scheduler`]): fixed-cadence polling with per-register
//!   fault isolation
//!
//! ## Supported Function Codes
//!
//! | Code | Function |
//! |------|----------|
//! | 0x01 | Read Coils |
//! | 0x02 | Read Discrete Inputs |
//! | 0x03 | Read Holding Registers |
//! | 0x04 | Read Input Registers |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use plc_exporter::{ExporterConfig, MetricModel, PrometheusSink, Scheduler, TcpConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExporterConfig::load("plc.yaml")?;
//!     let sink = Arc::new(PrometheusSink::new(&MetricModel::new(&config.runtime))?);
//!     let mut scheduler = Scheduler::new(&config, TcpConnector::new(config.plc.clone()), sink.clone());
//!
//!     let report = scheduler.run_cycle().await;
//!     println!("{:?}", report);
//!     println!("{}", sink.encode_text()?);
//!     Ok(())
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Error types and result handling
pub mod error;

/// Modbus protocol constants and exporter defaults
pub mod constants;

/// Value type catalog and register tables
pub mod types;

/// Byte order handling for multi-register data types
pub mod bytes;

/// Decoded register values
pub mod value;

/// Encoding and decoding of register words
pub mod codec;

// ============================================================================
// Exporter modules
// ============================================================================

/// Configuration file schema and validation
pub mod config;

/// Metric naming layouts and sample construction
pub mod model;

/// Metric storage
pub mod telemetry;

/// Stack-allocated PDU and read response parsing
pub mod pdu;

/// Modbus TCP transport
pub mod transport;

/// Polling loop
pub mod scheduler;

/// HTTP `/metrics` endpoint
pub mod server;

/// Tracing subscriber setup
pub mod logging;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Error handling ===
pub use error::{CodecError, ConfigError, ExporterError, ExporterResult};

// === Core types ===
pub use crate::bytes::Endianness;
pub use codec::RegisterCodec;
pub use types::{RegisterType, TypeSpec, ValueType};
pub use value::RegisterValue;

// === Exporter ===
pub use config::{ExporterConfig, LayoutKind, RegisterDefinition, RegisterGroups, RuntimeConfig};
pub use model::{MetricLayout, MetricModel, MetricSample};
pub use pdu::{ModbusPdu, PduBuilder};
pub use scheduler::{CycleReport, Scheduler};
pub use telemetry::{MetricsSink, PrometheusSink};
pub use transport::{Connector, RegisterReader, TcpConnector, TcpTransport, TransportStats};

// === Logging ===
pub use logging::LogLevel;
