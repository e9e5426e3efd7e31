//! Modbus PDU buffer, read request builder and read response parsing
//!
//! Use a fixed-size stack array to avoid heap allocation per request.

use tracing::debug;

use crate::constants::{
    exception_description, FC_READ_COILS, FC_READ_INPUT_REGISTERS, MAX_PDU_SIZE, MAX_READ_COILS,
    MAX_READ_REGISTERS,
};
use crate::error::{ExporterError, ExporterResult};

/// PDU with stack-allocated fixed array
#[derive(Debug, Clone)]
pub struct ModbusPdu {
    data: [u8; MAX_PDU_SIZE],
    len: usize,
}

impl ModbusPdu {
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PDU_SIZE],
            len: 0,
        }
    }

    /// Create a PDU from a received byte slice
    pub fn from_slice(data: &[u8]) -> ExporterResult<Self> {
        if data.len() > MAX_PDU_SIZE {
            return Err(ExporterError::protocol(format!(
                "PDU too large: {} bytes (max {})",
                data.len(),
                MAX_PDU_SIZE
            )));
        }

        let mut pdu = Self::new();
        pdu.data[..data.len()].copy_from_slice(data);
        pdu.len = data.len();

        match pdu.function_code() {
            Some(fc) if pdu.is_exception() => debug!(
                "PDU parsed: FC={:02X} (Exception: {}), exception_code={:02X}",
                fc,
                Self::function_code_description(fc),
                pdu.exception_code().unwrap_or(0)
            ),
            Some(fc) => debug!(
                "PDU parsed: FC={:02X} ({}), data_len={}",
                fc,
                Self::function_code_description(fc),
                pdu.len - 1
            ),
            None => debug!("PDU parsed: empty PDU"),
        }

        Ok(pdu)
    }

    #[inline]
    pub fn push(&mut self, byte: u8) -> ExporterResult<()> {
        if self.len >= MAX_PDU_SIZE {
            return Err(ExporterError::protocol("PDU buffer full"));
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> ExporterResult<()> {
        for byte in value.to_be_bytes() {
            self.push(byte)?;
        }
        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }

    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function_code()
            .map(|fc| fc & 0x80 != 0)
            .unwrap_or(false)
    }

    #[inline]
    pub fn exception_code(&self) -> Option<u8> {
        if self.is_exception() {
            self.as_slice().get(1).copied()
        } else {
            None
        }
    }

    pub fn function_code_description(fc: u8) -> &'static str {
        match fc & 0x7F {
            0x01 => "Read Coils",
            0x02 => "Read Discrete Inputs",
            0x03 => "Read Holding Registers",
            0x04 => "Read Input Registers",
            _ => "Unknown Function",
        }
    }

    /// Data following the function code and byte count of a read response,
    /// after checking both against the request.
    fn read_payload(&self, fc: u8, expected_bytes: usize) -> ExporterResult<&[u8]> {
        let Some(response_fc) = self.function_code() else {
            return Err(ExporterError::protocol("Empty response PDU"));
        };

        if response_fc == fc | 0x80 {
            let code = self.exception_code().unwrap_or(0);
            return Err(ExporterError::Exception {
                function: fc,
                code,
                message: exception_description(code).to_string(),
            });
        }
        if response_fc != fc {
            return Err(ExporterError::protocol(format!(
                "Function code mismatch: expected {:02X}, got {:02X}",
                fc, response_fc
            )));
        }

        let data = &self.as_slice()[1..];
        let Some((&byte_count, payload)) = data.split_first() else {
            return Err(ExporterError::protocol("Missing byte count"));
        };
        if byte_count as usize != expected_bytes || payload.len() != expected_bytes {
            return Err(ExporterError::protocol(format!(
                "Byte count mismatch: expected {}, header {}, payload {}",
                expected_bytes,
                byte_count,
                payload.len()
            )));
        }
        Ok(payload)
    }

    /// Parse an FC03/FC04 response into `quantity` register words.
    pub fn parse_registers(&self, fc: u8, quantity: u16) -> ExporterResult<Vec<u16>> {
        let payload = self.read_payload(fc, quantity as usize * 2)?;
        Ok(payload
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Parse an FC01/FC02 response into `quantity` bits. Bits are packed LSB
    /// first; padding bits of the last byte are dropped.
    pub fn parse_bits(&self, fc: u8, quantity: u16) -> ExporterResult<Vec<bool>> {
        let payload = self.read_payload(fc, (quantity as usize).div_ceil(8))?;
        Ok(payload
            .iter()
            .flat_map(|byte| (0..8).map(move |bit| byte & (1 << bit) != 0))
            .take(quantity as usize)
            .collect())
    }
}

impl Default for ModbusPdu {
    fn default() -> Self {
        Self::new()
    }
}

/// PDU builder - fluent API
pub struct PduBuilder {
    pdu: ModbusPdu,
}

impl Default for PduBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PduBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            pdu: ModbusPdu::new(),
        }
    }

    #[inline]
    pub fn function_code(mut self, fc: u8) -> ExporterResult<Self> {
        self.pdu.push(fc)?;
        Ok(self)
    }

    #[inline]
    pub fn address(mut self, addr: u16) -> ExporterResult<Self> {
        self.pdu.push_u16(addr)?;
        Ok(self)
    }

    #[inline]
    pub fn quantity(mut self, qty: u16) -> ExporterResult<Self> {
        self.pdu.push_u16(qty)?;
        Ok(self)
    }

    #[inline]
    pub fn build(self) -> ModbusPdu {
        if let Some(fc) = self.pdu.function_code() {
            debug!(
                "PDU built: FC={:02X} ({}), total_len={}",
                fc,
                ModbusPdu::function_code_description(fc),
                self.pdu.len()
            );
        }
        self.pdu
    }

    /// Build a read request PDU for FC01-04
    ///
    /// # Arguments
    /// * `fc` - Function code (1, 2, 3, or 4)
    /// * `start_address` - Starting address for the read operation
    /// * `quantity` - Number of coils (FC01/02) or registers (FC03/04) to read
    pub fn build_read_request(fc: u8, start_address: u16, quantity: u16) -> ExporterResult<ModbusPdu> {
        if !(FC_READ_COILS..=FC_READ_INPUT_REGISTERS).contains(&fc) {
            return Err(ExporterError::InvalidFunction { code: fc });
        }
        let limit = if fc <= 0x02 {
            MAX_READ_COILS
        } else {
            MAX_READ_REGISTERS
        };
        if quantity == 0 || quantity as usize > limit {
            return Err(ExporterError::read(format!(
                "Invalid quantity {} for FC{:02X} (1-{})",
                quantity, fc, limit
            )));
        }
        Ok(PduBuilder::new()
            .function_code(fc)?
            .address(start_address)?
            .quantity(quantity)?
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdu(bytes: &[u8]) -> ModbusPdu {
        ModbusPdu::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_pdu_basic_operations() {
        let mut pdu = ModbusPdu::new();
        assert!(pdu.is_empty());

        pdu.push(0x03).unwrap();
        assert_eq!(pdu.function_code(), Some(0x03));
        assert!(!pdu.is_exception());

        pdu.push_u16(0x0100).unwrap();
        pdu.push_u16(0x000A).unwrap();
        assert_eq!(pdu.as_slice(), &[0x03, 0x01, 0x00, 0x00, 0x0A]);
    }

    #[test]
    fn test_pdu_overflow() {
        assert!(ModbusPdu::from_slice(&[0u8; MAX_PDU_SIZE + 1]).is_err());
        let mut pdu = ModbusPdu::from_slice(&[0u8; MAX_PDU_SIZE]).unwrap();
        assert!(pdu.push(1).is_err());
    }

    #[test]
    fn test_build_read_request() {
        let pdu = PduBuilder::build_read_request(0x03, 0x006B, 3).unwrap();
        assert_eq!(pdu.as_slice(), &[0x03, 0x00, 0x6B, 0x00, 0x03]);

        let pdu = PduBuilder::build_read_request(0x01, 0x0013, 19).unwrap();
        assert_eq!(pdu.as_slice(), &[0x01, 0x00, 0x13, 0x00, 0x13]);
    }

    #[test]
    fn test_build_read_request_rejects() {
        assert!(matches!(
            PduBuilder::build_read_request(0x06, 0, 1),
            Err(ExporterError::InvalidFunction { code: 0x06 })
        ));
        assert!(PduBuilder::build_read_request(0x03, 0, 0).is_err());
        assert!(PduBuilder::build_read_request(0x04, 0, 126).is_err());
        assert!(PduBuilder::build_read_request(0x02, 0, 2000).is_ok());
        assert!(PduBuilder::build_read_request(0x02, 0, 2001).is_err());
    }

    #[test]
    fn test_parse_registers() {
        let response = pdu(&[0x03, 0x04, 0x12, 0x34, 0x56, 0x78]);
        assert_eq!(response.parse_registers(0x03, 2).unwrap(), vec![0x1234, 0x5678]);

        // Wrong count
        assert!(response.parse_registers(0x03, 3).is_err());
        // Wrong function
        assert!(matches!(
            response.parse_registers(0x04, 2),
            Err(ExporterError::Protocol { .. })
        ));
    }

    #[test]
    fn test_parse_bits_lsb_first() {
        // 10 coils: 1,0,1,1,0,0,0,0 | 1,1
        let response = pdu(&[0x01, 0x02, 0b0000_1101, 0b0000_0011]);
        let bits = response.parse_bits(0x01, 10).unwrap();
        assert_eq!(
            bits,
            vec![true, false, true, true, false, false, false, false, true, true]
        );

        let response = pdu(&[0x02, 0x01, 0xFF]);
        assert_eq!(response.parse_bits(0x02, 1).unwrap(), vec![true]);
    }

    #[test]
    fn test_exception_response() {
        let response = pdu(&[0x83, 0x02]);
        assert!(response.is_exception());
        assert_eq!(response.exception_code(), Some(0x02));

        match response.parse_registers(0x03, 1) {
            Err(ExporterError::Exception {
                function,
                code,
                message,
            }) => {
                assert_eq!(function, 0x03);
                assert_eq!(code, 0x02);
                assert_eq!(message, "Illegal Data Address");
            }
            other => panic!("expected exception, got {:?}", other),
        }
    }
}
