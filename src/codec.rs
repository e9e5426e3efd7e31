//! # Register Codec
//!
//! Pure conversion between raw 16-bit register words and typed values.
//!
//! Decoding steps for numeric types:
//!
//! 1. The caller supplies exactly [`TypeSpec::register_count`] words.
//! 2. Words are ordered most significant first according to `word_order`.
//! 3. Each word's two bytes are ordered according to `endianness`.
//! 4. The concatenated bytes are reinterpreted as two's-complement integers
//!    or IEEE-754 binary16/32/64.
//!
//! `char` and `string` payloads skip steps 2 and 3: character order always
//! follows register address order, high byte first. A string with an odd
//! declared size drops the spare trailing byte of its last register.
//!
//! `bool` passes a single coil/discrete-input bit (or register word) through
//! as `word != 0`.

use crate::bytes::{
    bytes_2_to_reg, bytes_4_to_regs, bytes_8_to_regs, reg_to_bytes_2, regs_to_bytes_4,
    regs_to_bytes_8, regs_to_text_bytes, text_bytes_to_regs, Endianness,
};
use crate::error::CodecError;
use crate::types::{TypeSpec, ValueType};
use crate::value::RegisterValue;

/// Codec bound to the byte/word order of one PLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterCodec {
    pub endianness: Endianness,
    pub word_order: Endianness,
}

impl RegisterCodec {
    pub fn new(endianness: Endianness, word_order: Endianness) -> Self {
        Self {
            endianness,
            word_order,
        }
    }

    /// See [`decode_register_value`].
    #[inline]
    pub fn decode(
        &self,
        words: &[u16],
        value_type: ValueType,
        size: usize,
    ) -> Result<RegisterValue, CodecError> {
        decode_register_value(words, value_type, size, self.endianness, self.word_order)
    }

    /// See [`encode_value`].
    #[inline]
    pub fn encode(&self, value: &RegisterValue, size: usize) -> Result<Vec<u16>, CodecError> {
        encode_value(value, size, self.endianness, self.word_order)
    }
}

// ============================================================================
// Decoding Functions
// ============================================================================

fn fixed_words<const N: usize>(words: &[u16], value_type: ValueType) -> Result<[u16; N], CodecError> {
    <[u16; N]>::try_from(words).map_err(|_| CodecError::MalformedPayload {
        value_type: value_type.to_string(),
        needed: N * 2,
        available: words.len() * 2,
    })
}

/// Decode raw register words into a typed value.
///
/// `size` is the declared character count and only matters for `string`.
///
/// # Example
///
/// ```rust
/// use plc_exporter::bytes::Endianness;
/// use plc_exporter::codec::decode_register_value;
/// use plc_exporter::types::ValueType;
/// use plc_exporter::RegisterValue;
///
/// let words = [0x0001, 0x0002];
/// let big = decode_register_value(&words, ValueType::Uint32, 1, Endianness::Big, Endianness::Big);
/// assert_eq!(big, Ok(RegisterValue::U32(65538)));
///
/// let swapped =
///     decode_register_value(&words, ValueType::Uint32, 1, Endianness::Big, Endianness::Little);
/// assert_eq!(swapped, Ok(RegisterValue::U32(131073)));
/// ```
pub fn decode_register_value(
    words: &[u16],
    value_type: ValueType,
    size: usize,
    endianness: Endianness,
    word_order: Endianness,
) -> Result<RegisterValue, CodecError> {
    let spec = TypeSpec::new(value_type, size);
    if words.len() != spec.register_count {
        return Err(CodecError::RegisterCountMismatch {
            value_type: value_type.to_string(),
            expected: spec.register_count,
            actual: words.len(),
        });
    }

    let value = match value_type {
        ValueType::Bool => {
            let [word] = fixed_words::<1>(words, value_type)?;
            RegisterValue::Bool(word != 0)
        }
        ValueType::Uint8 => {
            let [word] = fixed_words::<1>(words, value_type)?;
            RegisterValue::U8(reg_to_bytes_2(word, endianness)[0])
        }
        ValueType::Int8 => {
            let [word] = fixed_words::<1>(words, value_type)?;
            RegisterValue::I8(reg_to_bytes_2(word, endianness)[0] as i8)
        }
        ValueType::Uint16 => {
            let [word] = fixed_words::<1>(words, value_type)?;
            RegisterValue::U16(u16::from_be_bytes(reg_to_bytes_2(word, endianness)))
        }
        ValueType::Int16 => {
            let [word] = fixed_words::<1>(words, value_type)?;
            RegisterValue::I16(i16::from_be_bytes(reg_to_bytes_2(word, endianness)))
        }
        ValueType::Float16 => {
            let [word] = fixed_words::<1>(words, value_type)?;
            let bits = u16::from_be_bytes(reg_to_bytes_2(word, endianness));
            RegisterValue::F16(f16_bits_to_f32(bits))
        }
        ValueType::Uint32 => {
            let regs = fixed_words::<2>(words, value_type)?;
            RegisterValue::U32(u32::from_be_bytes(regs_to_bytes_4(&regs, endianness, word_order)))
        }
        ValueType::Int32 => {
            let regs = fixed_words::<2>(words, value_type)?;
            RegisterValue::I32(i32::from_be_bytes(regs_to_bytes_4(&regs, endianness, word_order)))
        }
        ValueType::Float32 => {
            let regs = fixed_words::<2>(words, value_type)?;
            RegisterValue::F32(f32::from_be_bytes(regs_to_bytes_4(&regs, endianness, word_order)))
        }
        ValueType::Uint64 => {
            let regs = fixed_words::<4>(words, value_type)?;
            RegisterValue::U64(u64::from_be_bytes(regs_to_bytes_8(&regs, endianness, word_order)))
        }
        ValueType::Int64 => {
            let regs = fixed_words::<4>(words, value_type)?;
            RegisterValue::I64(i64::from_be_bytes(regs_to_bytes_8(&regs, endianness, word_order)))
        }
        ValueType::Float64 => {
            let regs = fixed_words::<4>(words, value_type)?;
            RegisterValue::F64(f64::from_be_bytes(regs_to_bytes_8(&regs, endianness, word_order)))
        }
        ValueType::Char => {
            let [word] = fixed_words::<1>(words, value_type)?;
            RegisterValue::Char(word.to_be_bytes()[0])
        }
        ValueType::String => {
            let mut codes = regs_to_text_bytes(words);
            if codes.len() < size {
                return Err(CodecError::MalformedPayload {
                    value_type: value_type.to_string(),
                    needed: size,
                    available: codes.len(),
                });
            }
            codes.truncate(size);
            RegisterValue::Text(codes)
        }
    };

    Ok(value)
}

/// Widen IEEE-754 binary16 bits to `f32`. Every binary16 value, including
/// subnormals, infinities and NaN payloads, is exactly representable.
pub fn f16_bits_to_f32(bits: u16) -> f32 {
    let sign = u32::from(bits >> 15) << 31;
    let exponent = u32::from((bits >> 10) & 0x1F);
    let mantissa = u32::from(bits & 0x3FF);

    match (exponent, mantissa) {
        (0, 0) => f32::from_bits(sign),
        (0, m) => {
            let magnitude = m as f32 * f32::powi(2.0, -24);
            if sign != 0 {
                -magnitude
            } else {
                magnitude
            }
        }
        (0x1F, m) => f32::from_bits(sign | 0x7F80_0000 | (m << 13)),
        (e, m) => f32::from_bits(sign | ((e + 127 - 15) << 23) | (m << 13)),
    }
}

/// Narrow an `f32` to IEEE-754 binary16 bits, rounding to nearest.
/// Out-of-range magnitudes saturate to infinity.
pub fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xFF) as i32;
    let mantissa = bits & 0x7F_FFFF;

    if exponent == 0xFF {
        let payload = (mantissa >> 13) as u16;
        return match (mantissa, payload) {
            (0, _) => sign | 0x7C00,
            (_, 0) => sign | 0x7E00,
            (_, p) => sign | 0x7C00 | p,
        };
    }

    let half_exponent = exponent - 127 + 15;
    if half_exponent >= 0x1F {
        return sign | 0x7C00;
    }

    if half_exponent <= 0 {
        if half_exponent < -10 {
            return sign;
        }
        let full = mantissa | 0x80_0000;
        let shift = (14 - half_exponent) as u32;
        let round = ((full >> (shift - 1)) & 1) as u16;
        return sign | ((full >> shift) as u16 + round);
    }

    let round = ((mantissa >> 12) & 1) as u16;
    (sign | ((half_exponent as u16) << 10) | (mantissa >> 13) as u16) + round
}

// ============================================================================
// Encoding Functions
// ============================================================================

/// Encode a typed value into register words, the inverse of
/// [`decode_register_value`] for the same orders.
///
/// 8-bit values occupy the first byte of their register and leave the spare
/// byte zero. Text is padded with NUL up to `size` characters.
///
/// # Example
///
/// ```rust
/// use plc_exporter::bytes::Endianness;
/// use plc_exporter::codec::encode_value;
/// use plc_exporter::RegisterValue;
///
/// let words = encode_value(&RegisterValue::U32(0x12345678), 1, Endianness::Big, Endianness::Big);
/// assert_eq!(words, Ok(vec![0x1234, 0x5678]));
/// ```
pub fn encode_value(
    value: &RegisterValue,
    size: usize,
    endianness: Endianness,
    word_order: Endianness,
) -> Result<Vec<u16>, CodecError> {
    let words = match value {
        RegisterValue::Bool(b) => vec![u16::from(*b)],
        RegisterValue::U8(v) => vec![bytes_2_to_reg([*v, 0], endianness)],
        RegisterValue::I8(v) => vec![bytes_2_to_reg([*v as u8, 0], endianness)],
        RegisterValue::U16(v) => vec![bytes_2_to_reg(v.to_be_bytes(), endianness)],
        RegisterValue::I16(v) => vec![bytes_2_to_reg(v.to_be_bytes(), endianness)],
        RegisterValue::F16(v) => {
            vec![bytes_2_to_reg(f32_to_f16_bits(*v).to_be_bytes(), endianness)]
        }
        RegisterValue::U32(v) => bytes_4_to_regs(&v.to_be_bytes(), endianness, word_order).to_vec(),
        RegisterValue::I32(v) => bytes_4_to_regs(&v.to_be_bytes(), endianness, word_order).to_vec(),
        RegisterValue::F32(v) => bytes_4_to_regs(&v.to_be_bytes(), endianness, word_order).to_vec(),
        RegisterValue::U64(v) => bytes_8_to_regs(&v.to_be_bytes(), endianness, word_order).to_vec(),
        RegisterValue::I64(v) => bytes_8_to_regs(&v.to_be_bytes(), endianness, word_order).to_vec(),
        RegisterValue::F64(v) => bytes_8_to_regs(&v.to_be_bytes(), endianness, word_order).to_vec(),
        RegisterValue::Char(c) => vec![u16::from_be_bytes([*c, 0])],
        RegisterValue::Text(codes) => {
            if codes.len() > size {
                return Err(CodecError::MalformedPayload {
                    value_type: ValueType::String.to_string(),
                    needed: codes.len(),
                    available: size,
                });
            }
            let mut padded = codes.clone();
            padded.resize(size, 0);
            text_bytes_to_regs(&padded)
        }
    };

    Ok(words)
}

// ============================================================================
// Tests
// ============================================================================
