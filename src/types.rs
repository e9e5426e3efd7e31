//! # Type Table
//!
//! Static catalog mapping a value-type tag to its byte width and the number
//! of 16-bit registers it occupies.
//!
//! | Tag | Bytes | Registers |
//! |-----|-------|-----------|
//! | bool | 1 | 1 |
//! | uint8 / int8 / char | 1 | 1 |
//! | uint16 / int16 / float16 | 2 | 1 |
//! | uint32 / int32 / float32 | 4 | 2 |
//! | uint64 / int64 / float64 | 8 | 4 |
//! | string | size | ceil(size / 2) |

use std::fmt;
use std::str::FromStr;

use crate::constants::{
    FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS,
};
use crate::error::CodecError;

/// Value type tag of a register definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Float16,
    Float32,
    Float64,
    Char,
    String,
}

impl ValueType {
    pub const ALL: [ValueType; 14] = [
        ValueType::Bool,
        ValueType::Uint8,
        ValueType::Int8,
        ValueType::Uint16,
        ValueType::Int16,
        ValueType::Uint32,
        ValueType::Int32,
        ValueType::Uint64,
        ValueType::Int64,
        ValueType::Float16,
        ValueType::Float32,
        ValueType::Float64,
        ValueType::Char,
        ValueType::String,
    ];

    /// Parse a configuration tag. Matching is case-insensitive.
    pub fn parse(tag: &str) -> Result<Self, CodecError> {
        let normalized = tag.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| CodecError::UnsupportedType {
                tag: tag.to_string(),
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Uint8 => "uint8",
            ValueType::Int8 => "int8",
            ValueType::Uint16 => "uint16",
            ValueType::Int16 => "int16",
            ValueType::Uint32 => "uint32",
            ValueType::Int32 => "int32",
            ValueType::Uint64 => "uint64",
            ValueType::Int64 => "int64",
            ValueType::Float16 => "float16",
            ValueType::Float32 => "float32",
            ValueType::Float64 => "float64",
            ValueType::Char => "char",
            ValueType::String => "string",
        }
    }

    /// Value of the `value_type` label on data samples.
    pub fn label_value(&self) -> &'static str {
        if self.is_text() {
            "ascii"
        } else {
            self.as_str()
        }
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self, ValueType::Char | ValueType::String)
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(
            self,
            ValueType::Float16 | ValueType::Float32 | ValueType::Float64
        )
    }

    /// Inclusive integer range, or `None` for floats, bool and text.
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        match self {
            ValueType::Uint8 => Some((0, u8::MAX as i128)),
            ValueType::Int8 => Some((i8::MIN as i128, i8::MAX as i128)),
            ValueType::Uint16 => Some((0, u16::MAX as i128)),
            ValueType::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            ValueType::Uint32 => Some((0, u32::MAX as i128)),
            ValueType::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            ValueType::Uint64 => Some((0, u64::MAX as i128)),
            ValueType::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            _ => None,
        }
    }

    /// Fixed width in bytes; `None` for `string`, whose width is its declared size.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            ValueType::Bool | ValueType::Uint8 | ValueType::Int8 | ValueType::Char => Some(1),
            ValueType::Uint16 | ValueType::Int16 | ValueType::Float16 => Some(2),
            ValueType::Uint32 | ValueType::Int32 | ValueType::Float32 => Some(4),
            ValueType::Uint64 | ValueType::Int64 | ValueType::Float64 => Some(8),
            ValueType::String => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Width and register footprint of a value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSpec {
    pub value_type: ValueType,
    pub byte_width: usize,
    pub register_count: usize,
}

impl TypeSpec {
    /// `declared_size` is only consulted for `string`.
    pub fn new(value_type: ValueType, declared_size: usize) -> Self {
        let byte_width = value_type.fixed_width().unwrap_or(declared_size);
        Self {
            value_type,
            byte_width,
            register_count: byte_width.div_ceil(2),
        }
    }

    /// Look up a tag, failing with `UnsupportedType` for unknown tags.
    pub fn lookup(tag: &str, declared_size: usize) -> Result<Self, CodecError> {
        Ok(Self::new(ValueType::parse(tag)?, declared_size))
    }
}

/// The four Modbus data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterType {
    Coils,
    DiscreteInputs,
    InputRegisters,
    HoldingRegisters,
}

impl RegisterType {
    pub const ALL: [RegisterType; 4] = [
        RegisterType::Coils,
        RegisterType::DiscreteInputs,
        RegisterType::InputRegisters,
        RegisterType::HoldingRegisters,
    ];

    /// Plural name used in configuration keys, metric names and labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterType::Coils => "coils",
            RegisterType::DiscreteInputs => "discrete_inputs",
            RegisterType::InputRegisters => "input_registers",
            RegisterType::HoldingRegisters => "holding_registers",
        }
    }

    /// Coils and discrete inputs only carry single bits.
    #[inline]
    pub fn is_bit_table(&self) -> bool {
        matches!(self, RegisterType::Coils | RegisterType::DiscreteInputs)
    }

    pub fn function_code(&self) -> u8 {
        match self {
            RegisterType::Coils => FC_READ_COILS,
            RegisterType::DiscreteInputs => FC_READ_DISCRETE_INPUTS,
            RegisterType::HoldingRegisters => FC_READ_HOLDING_REGISTERS,
            RegisterType::InputRegisters => FC_READ_INPUT_REGISTERS,
        }
    }

    /// Help text of the shared per-group metric in the dynamic layout.
    pub fn description(&self) -> &'static str {
        match self {
            RegisterType::Coils => {
                "Coils represent discrete outputs, which are binary values and are used to \
                 control physical devices like relays, motors, lights, or any output devices \
                 connected to the PLC. They can be read and written to."
            }
            RegisterType::DiscreteInputs => {
                "Discrete inputs are binary values that represent the state of physical devices \
                 like sensors, switches, or any input devices connected to the PLC. They are \
                 read-only and cannot be written to."
            }
            RegisterType::InputRegisters => {
                "Input registers are 16-bit registers that store numeric values. They are \
                 read-only and cannot be written to."
            }
            RegisterType::HoldingRegisters => {
                "Holding registers are 16-bit registers that store numeric values. They can be \
                 read and written to."
            }
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_tags() {
        for value_type in ValueType::ALL {
            assert_eq!(ValueType::parse(value_type.as_str()), Ok(value_type));
        }
        assert_eq!(ValueType::parse("FLOAT32"), Ok(ValueType::Float32));
        assert_eq!(" uint16 ".parse::<ValueType>(), Ok(ValueType::Uint16));
    }

    #[test]
    fn test_parse_unknown_tag() {
        assert_eq!(
            ValueType::parse("uint128"),
            Err(CodecError::UnsupportedType {
                tag: "uint128".to_string()
            })
        );
        assert!(TypeSpec::lookup("double", 1).is_err());
    }

    #[test]
    fn test_fixed_widths() {
        let expect = [
            (ValueType::Bool, 1, 1),
            (ValueType::Uint8, 1, 1),
            (ValueType::Int8, 1, 1),
            (ValueType::Char, 1, 1),
            (ValueType::Uint16, 2, 1),
            (ValueType::Int16, 2, 1),
            (ValueType::Float16, 2, 1),
            (ValueType::Uint32, 4, 2),
            (ValueType::Int32, 4, 2),
            (ValueType::Float32, 4, 2),
            (ValueType::Uint64, 8, 4),
            (ValueType::Int64, 8, 4),
            (ValueType::Float64, 8, 4),
        ];
        for (value_type, width, count) in expect {
            let spec = TypeSpec::new(value_type, 99);
            assert_eq!(spec.byte_width, width, "{}", value_type);
            assert_eq!(spec.register_count, count, "{}", value_type);
        }
    }

    #[test]
    fn test_string_register_count() {
        assert_eq!(TypeSpec::new(ValueType::String, 5).register_count, 3);
        assert_eq!(TypeSpec::new(ValueType::String, 4).register_count, 2);
        assert_eq!(TypeSpec::new(ValueType::String, 4).byte_width, 4);
        assert_eq!(TypeSpec::new(ValueType::String, 0).register_count, 0);
    }

    #[test]
    fn test_multi_word_width_invariant() {
        for value_type in ValueType::ALL {
            let spec = TypeSpec::new(value_type, 1);
            if spec.byte_width >= 2 {
                assert_eq!(spec.byte_width, spec.register_count * 2);
            }
        }
    }

    #[test]
    fn test_label_value() {
        assert_eq!(ValueType::String.label_value(), "ascii");
        assert_eq!(ValueType::Char.label_value(), "ascii");
        assert_eq!(ValueType::Int32.label_value(), "int32");
    }

    #[test]
    fn test_register_type() {
        assert_eq!(RegisterType::DiscreteInputs.as_str(), "discrete_inputs");
        assert!(RegisterType::Coils.is_bit_table());
        assert!(!RegisterType::HoldingRegisters.is_bit_table());
        assert_eq!(RegisterType::InputRegisters.function_code(), 0x04);
        assert_eq!(RegisterType::HoldingRegisters.function_code(), 0x03);
    }
}
