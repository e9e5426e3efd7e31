//! # Decoded Register Values
//!
//! Typed result of the register codec. Numeric variants carry a single
//! scalar; text variants carry character codes, one per byte consumed.

use std::fmt;

use crate::types::ValueType;

/// A value decoded from one register definition.
///
/// # Example
///
/// ```rust
/// use plc_exporter::RegisterValue;
/// use plc_exporter::types::ValueType;
///
/// let temp = RegisterValue::F32(25.5);
/// assert_eq!(temp.value_type(), ValueType::Float32);
/// assert_eq!(temp.scalar(), Some(25.5));
///
/// let label = RegisterValue::Text(b"OK".to_vec());
/// assert_eq!(label.characters(), Some(&b"OK"[..]));
/// assert_eq!(label.scalar(), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterValue {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    /// IEEE-754 binary16, widened losslessly to `f32`
    F16(f32),
    F32(f32),
    F64(f64),
    /// Single character code
    Char(u8),
    /// Character codes in register address order
    Text(Vec<u8>),
}

impl RegisterValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            RegisterValue::Bool(_) => ValueType::Bool,
            RegisterValue::U8(_) => ValueType::Uint8,
            RegisterValue::I8(_) => ValueType::Int8,
            RegisterValue::U16(_) => ValueType::Uint16,
            RegisterValue::I16(_) => ValueType::Int16,
            RegisterValue::U32(_) => ValueType::Uint32,
            RegisterValue::I32(_) => ValueType::Int32,
            RegisterValue::U64(_) => ValueType::Uint64,
            RegisterValue::I64(_) => ValueType::Int64,
            RegisterValue::F16(_) => ValueType::Float16,
            RegisterValue::F32(_) => ValueType::Float32,
            RegisterValue::F64(_) => ValueType::Float64,
            RegisterValue::Char(_) => ValueType::Char,
            RegisterValue::Text(_) => ValueType::String,
        }
    }

    /// Numeric value of a scalar; booleans map to 0.0/1.0. `None` for text.
    #[inline]
    pub fn scalar(&self) -> Option<f64> {
        let value = match self {
            RegisterValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            RegisterValue::U8(v) => f64::from(*v),
            RegisterValue::I8(v) => f64::from(*v),
            RegisterValue::U16(v) => f64::from(*v),
            RegisterValue::I16(v) => f64::from(*v),
            RegisterValue::U32(v) => f64::from(*v),
            RegisterValue::I32(v) => f64::from(*v),
            RegisterValue::U64(v) => *v as f64,
            RegisterValue::I64(v) => *v as f64,
            RegisterValue::F16(v) | RegisterValue::F32(v) => f64::from(*v),
            RegisterValue::F64(v) => *v,
            RegisterValue::Char(_) | RegisterValue::Text(_) => return None,
        };
        Some(value)
    }

    /// Character codes of a text value. `None` for scalars.
    #[inline]
    pub fn characters(&self) -> Option<&[u8]> {
        match self {
            RegisterValue::Char(c) => Some(std::slice::from_ref(c)),
            RegisterValue::Text(codes) => Some(codes),
            _ => None,
        }
    }

    /// Zero value of a type. Text types yield `size` NUL codes.
    pub fn zero(value_type: ValueType, size: usize) -> Self {
        match value_type {
            ValueType::Bool => RegisterValue::Bool(false),
            ValueType::Uint8 => RegisterValue::U8(0),
            ValueType::Int8 => RegisterValue::I8(0),
            ValueType::Uint16 => RegisterValue::U16(0),
            ValueType::Int16 => RegisterValue::I16(0),
            ValueType::Uint32 => RegisterValue::U32(0),
            ValueType::Int32 => RegisterValue::I32(0),
            ValueType::Uint64 => RegisterValue::U64(0),
            ValueType::Int64 => RegisterValue::I64(0),
            ValueType::Float16 => RegisterValue::F16(0.0),
            ValueType::Float32 => RegisterValue::F32(0.0),
            ValueType::Float64 => RegisterValue::F64(0.0),
            ValueType::Char => RegisterValue::Char(0),
            ValueType::String => RegisterValue::Text(vec![0; size]),
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::Bool(v) => write!(f, "{}", v),
            RegisterValue::U8(v) => write!(f, "{}", v),
            RegisterValue::I8(v) => write!(f, "{}", v),
            RegisterValue::U16(v) => write!(f, "{}", v),
            RegisterValue::I16(v) => write!(f, "{}", v),
            RegisterValue::U32(v) => write!(f, "{}", v),
            RegisterValue::I32(v) => write!(f, "{}", v),
            RegisterValue::U64(v) => write!(f, "{}", v),
            RegisterValue::I64(v) => write!(f, "{}", v),
            RegisterValue::F16(v) | RegisterValue::F32(v) => write!(f, "{}", v),
            RegisterValue::F64(v) => write!(f, "{}", v),
            RegisterValue::Char(c) => write!(f, "{:?}", char::from(*c)),
            RegisterValue::Text(codes) => write!(f, "{:?}", String::from_utf8_lossy(codes)),
        }
    }
}

// ============================================================================
// From implementations for ergonomic construction
// ============================================================================

impl From<bool> for RegisterValue {
    fn from(v: bool) -> Self {
        RegisterValue::Bool(v)
    }
}

impl From<u16> for RegisterValue {
    fn from(v: u16) -> Self {
        RegisterValue::U16(v)
    }
}

impl From<i16> for RegisterValue {
    fn from(v: i16) -> Self {
        RegisterValue::I16(v)
    }
}

impl From<u32> for RegisterValue {
    fn from(v: u32) -> Self {
        RegisterValue::U32(v)
    }
}

impl From<i32> for RegisterValue {
    fn from(v: i32) -> Self {
        RegisterValue::I32(v)
    }
}

impl From<f32> for RegisterValue {
    fn from(v: f32) -> Self {
        RegisterValue::F32(v)
    }
}

impl From<f64> for RegisterValue {
    fn from(v: f64) -> Self {
        RegisterValue::F64(v)
    }
}

impl From<&str> for RegisterValue {
    fn from(v: &str) -> Self {
        RegisterValue::Text(v.as_bytes().to_vec())
    }
}
