//! # Transport Layer
//!
//! Register reads as the scheduler consumes them, plus a Modbus TCP
//! implementation.
//!
//! - [`Connector`]: opens a connection to the PLC
//! - [`RegisterReader`]: the four read operations on an open connection
//! - [`TcpConnector`] / [`TcpTransport`]: MBAP framing over a tokio
//!   [`TcpStream`]
//!
//! Every connect and request is bounded by the configured timeout. When an
//! I/O error, timeout or framing error leaves the stream in an unknown
//! state it is dropped, and the next request reconnects.

use std::future::Future;
use std::time::Duration;

use ::bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::PlcConnection;
use crate::constants::{
    FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS,
    MAX_MBAP_LENGTH, MBAP_HEADER_LEN,
};
use crate::error::{ExporterError, ExporterResult};
use crate::pdu::{ModbusPdu, PduBuilder};

/// Read access to the four Modbus tables.
pub trait RegisterReader: Send {
    fn read_coils(
        &mut self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = ExporterResult<Vec<bool>>> + Send;

    fn read_discrete_inputs(
        &mut self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = ExporterResult<Vec<bool>>> + Send;

    fn read_input_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = ExporterResult<Vec<u16>>> + Send;

    fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = ExporterResult<Vec<u16>>> + Send;

    /// Whether the link is believed to be up.
    fn is_connected(&self) -> bool;
}

/// Opens connections to the PLC.
pub trait Connector: Send {
    type Connection: RegisterReader;

    fn connect(&mut self) -> impl Future<Output = ExporterResult<Self::Connection>> + Send;
}

/// Transport statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub connects: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

// ============================================================================
// Modbus TCP
// ============================================================================

/// Connects [`TcpTransport`]s to the configured PLC.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    config: PlcConnection,
}

impl TcpConnector {
    pub fn new(config: PlcConnection) -> Self {
        Self { config }
    }
}

impl Connector for TcpConnector {
    type Connection = TcpTransport;

    async fn connect(&mut self) -> ExporterResult<TcpTransport> {
        TcpTransport::connect(&self.config).await
    }
}

/// Modbus TCP client connection.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    address: String,
    unit_id: u8,
    timeout: Duration,
    transaction_id: u16,
    stats: TransportStats,
}

impl TcpTransport {
    pub async fn connect(config: &PlcConnection) -> ExporterResult<Self> {
        let mut transport = Self {
            stream: None,
            address: config.address(),
            unit_id: config.unit_id,
            timeout: config.timeout,
            transaction_id: 0,
            stats: TransportStats::default(),
        };
        transport.ensure_connected().await?;
        Ok(transport)
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    async fn ensure_connected(&mut self) -> ExporterResult<&mut TcpStream> {
        if self.stream.is_none() {
            let stream = match timeout(self.timeout, TcpStream::connect(&self.address)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    return Err(ExporterError::connection(format!(
                        "Failed to connect to {}: {}",
                        self.address, e
                    )))
                }
                Err(_) => {
                    return Err(ExporterError::timeout(
                        format!("connect to {}", self.address),
                        self.timeout_ms(),
                    ))
                }
            };
            stream.set_nodelay(true)?;
            self.stats.connects += 1;
            info!("Connected to PLC at {}", self.address);
            self.stream = Some(stream);
        }

        self.stream
            .as_mut()
            .ok_or_else(|| ExporterError::connection("Not connected"))
    }

    fn next_transaction_id(&mut self) -> u16 {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        self.transaction_id
    }

    /// Send one request PDU and return the response PDU.
    pub async fn request(&mut self, pdu: &ModbusPdu) -> ExporterResult<ModbusPdu> {
        let transaction_id = self.next_transaction_id();
        let frame = encode_frame(transaction_id, self.unit_id, pdu);
        let unit_id = self.unit_id;
        let timeout_ms = self.timeout_ms();
        let limit = self.timeout;

        let stream = self.ensure_connected().await?;
        let result = match timeout(limit, exchange(stream, &frame, transaction_id, unit_id)).await {
            Ok(result) => result,
            Err(_) => Err(ExporterError::timeout(
                format!("request {}", transaction_id),
                timeout_ms,
            )),
        };

        self.stats.requests_sent += 1;
        match result {
            Ok(response) => {
                self.stats.bytes_sent += frame.len() as u64;
                self.stats.bytes_received += (MBAP_HEADER_LEN + 1 + response.len()) as u64;
                self.stats.responses_received += 1;
                ModbusPdu::from_slice(&response)
            }
            Err(e) => {
                self.stats.errors += 1;
                if matches!(e, ExporterError::Timeout { .. }) {
                    self.stats.timeouts += 1;
                }
                warn!("Dropping connection to {} after error: {}", self.address, e);
                self.stream = None;
                Err(e)
            }
        }
    }

    async fn read_words(&mut self, fc: u8, address: u16, count: u16) -> ExporterResult<Vec<u16>> {
        let request = PduBuilder::build_read_request(fc, address, count)?;
        let response = self.request(&request).await?;
        let words = response.parse_registers(fc, count)?;
        debug!("FC{:02X} read {} words at {:#06x}", fc, words.len(), address);
        Ok(words)
    }

    async fn read_bits(&mut self, fc: u8, address: u16, count: u16) -> ExporterResult<Vec<bool>> {
        let request = PduBuilder::build_read_request(fc, address, count)?;
        let response = self.request(&request).await?;
        let bits = response.parse_bits(fc, count)?;
        debug!("FC{:02X} read {} bits at {:#06x}", fc, bits.len(), address);
        Ok(bits)
    }
}

impl RegisterReader for TcpTransport {
    async fn read_coils(&mut self, address: u16, count: u16) -> ExporterResult<Vec<bool>> {
        self.read_bits(FC_READ_COILS, address, count).await
    }

    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> ExporterResult<Vec<bool>> {
        self.read_bits(FC_READ_DISCRETE_INPUTS, address, count).await
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> ExporterResult<Vec<u16>> {
        self.read_words(FC_READ_INPUT_REGISTERS, address, count).await
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ExporterResult<Vec<u16>> {
        self.read_words(FC_READ_HOLDING_REGISTERS, address, count).await
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// MBAP header + unit id + PDU.
pub fn encode_frame(transaction_id: u16, unit_id: u8, pdu: &ModbusPdu) -> BytesMut {
    let mut frame = BytesMut::with_capacity(MBAP_HEADER_LEN + 1 + pdu.len());
    frame.put_u16(transaction_id);
    frame.put_u16(0);
    frame.put_u16((pdu.len() + 1) as u16);
    frame.put_u8(unit_id);
    frame.put_slice(pdu.as_slice());
    frame
}

async fn exchange(
    stream: &mut TcpStream,
    frame: &[u8],
    transaction_id: u16,
    unit_id: u8,
) -> ExporterResult<Vec<u8>> {
    stream.write_all(frame).await?;

    let mut header = [0u8; MBAP_HEADER_LEN + 1];
    stream.read_exact(&mut header).await?;

    let response_tid = u16::from_be_bytes([header[0], header[1]]);
    let protocol_id = u16::from_be_bytes([header[2], header[3]]);
    let length = u16::from_be_bytes([header[4], header[5]]) as usize;

    if protocol_id != 0 {
        return Err(ExporterError::protocol(format!(
            "Invalid protocol id {}",
            protocol_id
        )));
    }
    if length < 2 || length > MAX_MBAP_LENGTH {
        return Err(ExporterError::protocol(format!(
            "Invalid MBAP length {}",
            length
        )));
    }

    let mut pdu = vec![0u8; length - 1];
    stream.read_exact(&mut pdu).await?;

    if response_tid != transaction_id {
        return Err(ExporterError::protocol(format!(
            "Transaction id mismatch: sent {}, received {}",
            transaction_id, response_tid
        )));
    }
    if header[6] != unit_id {
        return Err(ExporterError::protocol(format!(
            "Unit id mismatch: sent {}, received {}",
            unit_id, header[6]
        )));
    }
    Ok(pdu)
}
