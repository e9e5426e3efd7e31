//! Modbus protocol constants and exporter defaults
//!
//! Protocol limits are derived from the official Modbus specification:
//! - Maximum PDU size: 253 bytes (inherited from RS485 ADU limit of 256 bytes)
//! - Register/coil read limits are calculated to fit within the PDU size constraint

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Modbus MBAP header length for TCP
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2) = 6 bytes
/// The Unit ID is counted by the Length field and read together with the PDU.
pub const MBAP_HEADER_LEN: usize = 6;

/// Maximum PDU (Protocol Data Unit) size per Modbus specification
/// RS485 ADU (256 bytes) - Slave Address (1 byte) - CRC (2 bytes) = 253 bytes
pub const MAX_PDU_SIZE: usize = 253;

/// Maximum MBAP length field value (Unit ID + PDU)
/// = 1 (Unit ID) + 253 (Max PDU) = 254 bytes
pub const MAX_MBAP_LENGTH: usize = 1 + MAX_PDU_SIZE;

// ============================================================================
// Read Limits
// ============================================================================

/// Maximum number of registers for FC03/FC04 (Read Holding/Input Registers)
///
/// Response PDU: Function Code (1) + Byte Count (1) + N × 2 ≤ 253
/// Therefore: N ≤ (253 - 2) / 2 = 125 registers
pub const MAX_READ_REGISTERS: usize = 125;

/// Maximum number of coils for FC01/FC02 (Read Coils/Discrete Inputs)
///
/// Response PDU: Function Code (1) + Byte Count (1) + ceil(N / 8) ≤ 253
/// The specification rounds the resulting 2008 down to 2000.
pub const MAX_READ_COILS: usize = 2000;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;
pub const EXCEPTION_SERVER_DEVICE_FAILURE: u8 = 0x04;
pub const EXCEPTION_ACKNOWLEDGE: u8 = 0x05;
pub const EXCEPTION_SERVER_DEVICE_BUSY: u8 = 0x06;
pub const EXCEPTION_MEMORY_PARITY_ERROR: u8 = 0x08;
pub const EXCEPTION_GATEWAY_PATH_UNAVAILABLE: u8 = 0x0A;
pub const EXCEPTION_GATEWAY_TARGET_FAILED: u8 = 0x0B;

/// Human-readable description of a Modbus exception code.
pub fn exception_description(code: u8) -> &'static str {
    match code {
        EXCEPTION_ILLEGAL_FUNCTION => "Illegal Function",
        EXCEPTION_ILLEGAL_DATA_ADDRESS => "Illegal Data Address",
        EXCEPTION_ILLEGAL_DATA_VALUE => "Illegal Data Value",
        EXCEPTION_SERVER_DEVICE_FAILURE => "Server Device Failure",
        EXCEPTION_ACKNOWLEDGE => "Acknowledge",
        EXCEPTION_SERVER_DEVICE_BUSY => "Server Device Busy",
        EXCEPTION_MEMORY_PARITY_ERROR => "Memory Parity Error",
        EXCEPTION_GATEWAY_PATH_UNAVAILABLE => "Gateway Path Unavailable",
        EXCEPTION_GATEWAY_TARGET_FAILED => "Gateway Target Device Failed to Respond",
        _ => "Unknown Exception",
    }
}

// ============================================================================
// Metric Names (suffixes, prefixed with the configured namespace)
// ============================================================================

pub const INFO_METRIC_NAME: &str = "info";
pub const CONNECTION_METRIC_NAME: &str = "connection_up";
pub const READ_LATENCY_METRIC_NAME: &str = "read_time_seconds";
pub const ERROR_COUNT_METRIC_NAME: &str = "error_count";
pub const OVERRUN_METRIC_NAME: &str = "scrape_overrun_count";

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_EXPORTER_PORT: u16 = 9075;
pub const DEFAULT_SCRAPE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_NAMESPACE: &str = "plc";
pub const DEFAULT_IDENTIFIER: &str = "master";
pub const DEFAULT_UNIT_ID: u8 = 1;

/// Default timeout for connect and read operations (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Path serving the text exposition format
pub const METRICS_PATH: &str = "/metrics";
