//! # Byte and Word Order Handling
//!
//! PLCs disagree on two independent axes when laying multi-byte values over
//! 16-bit registers:
//!
//! - **Endianness**: order of the two bytes inside one register
//! - **Word order**: order of registers when several form one value
//!
//! Word order is applied once across the whole value, then each word's
//! bytes are placed according to endianness. Using ABCD notation (A = most
//! significant byte), the four combinations for `0x12345678` stored in
//! registers `[0x1234, 0x5678]` decode as follows:
//!
//! | Endianness | Word order | Register bytes read as | Pattern |
//! |------------|------------|------------------------|---------|
//! | big | big | \[0x12, 0x34, 0x56, 0x78\] | ABCD |
//! | big | little | \[0x56, 0x78, 0x12, 0x34\] | CDAB |
//! | little | big | \[0x34, 0x12, 0x78, 0x56\] | BADC |
//! | little | little | \[0x78, 0x56, 0x34, 0x12\] | DCBA |
//!
//! Text payloads ignore both axes: characters always follow register
//! address order, high byte first.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// One ordering axis: most significant part first (`Big`) or last (`Little`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

impl Endianness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Big => "big",
            Self::Little => "little",
        }
    }
}

impl FromStr for Endianness {
    type Err = String;

    /// Accepts `big`/`little` and the short forms `be`/`le`, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "big" | "be" | "big_endian" => Ok(Self::Big),
            "little" | "le" | "little_endian" => Ok(Self::Little),
            other => Err(format!(
                "unknown byte order '{}' (expected big, little, be or le)",
                other
            )),
        }
    }
}

impl TryFrom<String> for Endianness {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Register to Bytes Conversions
// ============================================================================

/// Bytes of one register in the order given by `endianness`.
#[inline]
pub fn reg_to_bytes_2(reg: u16, endianness: Endianness) -> [u8; 2] {
    match endianness {
        Endianness::Big => reg.to_be_bytes(),
        Endianness::Little => reg.to_le_bytes(),
    }
}

/// Inverse of [`reg_to_bytes_2`].
#[inline]
pub fn bytes_2_to_reg(bytes: [u8; 2], endianness: Endianness) -> u16 {
    match endianness {
        Endianness::Big => u16::from_be_bytes(bytes),
        Endianness::Little => u16::from_le_bytes(bytes),
    }
}

/// Arrange `regs` into most-significant-first value bytes.
///
/// `B` must equal `2 * W`.
#[inline]
fn assemble<const W: usize, const B: usize>(
    regs: &[u16; W],
    endianness: Endianness,
    word_order: Endianness,
) -> [u8; B] {
    debug_assert_eq!(B, W * 2);
    let mut out = [0u8; B];
    for i in 0..W {
        let reg = match word_order {
            Endianness::Big => regs[i],
            Endianness::Little => regs[W - 1 - i],
        };
        out[i * 2..i * 2 + 2].copy_from_slice(&reg_to_bytes_2(reg, endianness));
    }
    out
}

/// Inverse of [`assemble`].
#[inline]
fn disassemble<const W: usize, const B: usize>(
    bytes: &[u8; B],
    endianness: Endianness,
    word_order: Endianness,
) -> [u16; W] {
    debug_assert_eq!(B, W * 2);
    let mut regs = [0u16; W];
    for i in 0..W {
        let reg = bytes_2_to_reg([bytes[i * 2], bytes[i * 2 + 1]], endianness);
        match word_order {
            Endianness::Big => regs[i] = reg,
            Endianness::Little => regs[W - 1 - i] = reg,
        }
    }
    regs
}

/// Convert 2 registers to 4 value bytes (most significant first).
///
/// # Example
///
/// ```rust
/// use plc_exporter::bytes::{regs_to_bytes_4, Endianness};
///
/// let regs = [0x1234, 0x5678];
/// assert_eq!(
///     regs_to_bytes_4(&regs, Endianness::Big, Endianness::Big),
///     [0x12, 0x34, 0x56, 0x78]
/// );
/// assert_eq!(
///     regs_to_bytes_4(&regs, Endianness::Big, Endianness::Little),
///     [0x56, 0x78, 0x12, 0x34]
/// );
/// ```
#[inline]
pub fn regs_to_bytes_4(regs: &[u16; 2], endianness: Endianness, word_order: Endianness) -> [u8; 4] {
    assemble(regs, endianness, word_order)
}

/// Convert 4 registers to 8 value bytes (most significant first).
#[inline]
pub fn regs_to_bytes_8(regs: &[u16; 4], endianness: Endianness, word_order: Endianness) -> [u8; 8] {
    assemble(regs, endianness, word_order)
}

/// Convert 4 value bytes back into 2 registers in address order.
#[inline]
pub fn bytes_4_to_regs(bytes: &[u8; 4], endianness: Endianness, word_order: Endianness) -> [u16; 2] {
    disassemble(bytes, endianness, word_order)
}

/// Convert 8 value bytes back into 4 registers in address order.
#[inline]
pub fn bytes_8_to_regs(bytes: &[u8; 8], endianness: Endianness, word_order: Endianness) -> [u16; 4] {
    disassemble(bytes, endianness, word_order)
}

// ============================================================================
// Text Payloads
// ============================================================================

/// Bytes of `regs` in address order, high byte of each register first.
pub fn regs_to_text_bytes(regs: &[u16]) -> Vec<u8> {
    regs.iter().flat_map(|reg| reg.to_be_bytes()).collect()
}

/// Pack text bytes into registers in address order; an odd trailing byte is
/// padded with zero.
pub fn text_bytes_to_regs(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: [(Endianness, Endianness); 4] = [
        (Endianness::Big, Endianness::Big),
        (Endianness::Big, Endianness::Little),
        (Endianness::Little, Endianness::Big),
        (Endianness::Little, Endianness::Little),
    ];

    #[test]
    fn test_from_str() {
        assert_eq!("big".parse::<Endianness>(), Ok(Endianness::Big));
        assert_eq!("LE".parse::<Endianness>(), Ok(Endianness::Little));
        assert_eq!("Little".parse::<Endianness>(), Ok(Endianness::Little));
        assert!("middle".parse::<Endianness>().is_err());
        assert!("".parse::<Endianness>().is_err());
    }

    #[test]
    fn test_default() {
        assert_eq!(Endianness::default(), Endianness::Big);
    }

    #[test]
    fn test_reg_to_bytes_2() {
        assert_eq!(reg_to_bytes_2(0x1234, Endianness::Big), [0x12, 0x34]);
        assert_eq!(reg_to_bytes_2(0x1234, Endianness::Little), [0x34, 0x12]);
    }

    #[test]
    fn test_regs_to_bytes_4_all_orders() {
        let regs = [0x1234, 0x5678];

        assert_eq!(
            regs_to_bytes_4(&regs, Endianness::Big, Endianness::Big),
            [0x12, 0x34, 0x56, 0x78]
        );
        assert_eq!(
            regs_to_bytes_4(&regs, Endianness::Big, Endianness::Little),
            [0x56, 0x78, 0x12, 0x34]
        );
        assert_eq!(
            regs_to_bytes_4(&regs, Endianness::Little, Endianness::Big),
            [0x34, 0x12, 0x78, 0x56]
        );
        assert_eq!(
            regs_to_bytes_4(&regs, Endianness::Little, Endianness::Little),
            [0x78, 0x56, 0x34, 0x12]
        );
    }

    #[test]
    fn test_regs_to_bytes_8_all_orders() {
        let regs = [0x1234, 0x5678, 0x9ABC, 0xDEF0];

        assert_eq!(
            regs_to_bytes_8(&regs, Endianness::Big, Endianness::Big),
            [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]
        );
        assert_eq!(
            regs_to_bytes_8(&regs, Endianness::Big, Endianness::Little),
            [0xDE, 0xF0, 0x9A, 0xBC, 0x56, 0x78, 0x12, 0x34]
        );
        assert_eq!(
            regs_to_bytes_8(&regs, Endianness::Little, Endianness::Big),
            [0x34, 0x12, 0x78, 0x56, 0xBC, 0x9A, 0xF0, 0xDE]
        );
        assert_eq!(
            regs_to_bytes_8(&regs, Endianness::Little, Endianness::Little),
            [0xF0, 0xDE, 0xBC, 0x9A, 0x78, 0x56, 0x34, 0x12]
        );
    }

    #[test]
    fn test_bytes_to_regs_inverse() {
        let regs4 = [0xCAFE, 0xBABE];
        let regs8 = [0x0102, 0x0304, 0x0506, 0x0708];
        for (endianness, word_order) in ORDERS {
            let bytes = regs_to_bytes_4(&regs4, endianness, word_order);
            assert_eq!(bytes_4_to_regs(&bytes, endianness, word_order), regs4);

            let bytes = regs_to_bytes_8(&regs8, endianness, word_order);
            assert_eq!(bytes_8_to_regs(&bytes, endianness, word_order), regs8);
        }
    }

    #[test]
    fn test_text_bytes() {
        assert_eq!(regs_to_text_bytes(&[0x5445, 0x5354]), b"TEST".to_vec());
        assert_eq!(text_bytes_to_regs(b"TEST"), vec![0x5445, 0x5354]);
        assert_eq!(text_bytes_to_regs(b"ABC"), vec![0x4142, 0x4300]);
        assert!(text_bytes_to_regs(b"").is_empty());
    }
}
