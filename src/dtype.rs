//! Element types, byte order, and the values read from and written to fields.
//!
//! Every element is stored as raw bits in a `u64`, masked to the element width.
//! Signed integers are two's complement, floats are their IEEE 754 bit pattern.

use crate::{bits::sign_extend, errors::FieldError};

/// Concrete element type of a scalar slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ElementType {
    /// Width of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            ElementType::U8 | ElementType::I8 => 1,
            ElementType::U16 | ElementType::I16 => 2,
            ElementType::U32 | ElementType::I32 | ElementType::F32 => 4,
            ElementType::U64 | ElementType::I64 | ElementType::F64 => 8,
        }
    }

    /// Width of one element in bits.
    pub fn bits(self) -> usize {
        self.size() * 8
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ElementType::I8 | ElementType::I16 | ElementType::I32 | ElementType::I64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::U8 => "uint8",
            ElementType::I8 => "int8",
            ElementType::U16 => "uint16",
            ElementType::I16 => "int16",
            ElementType::U32 => "uint32",
            ElementType::I32 => "int32",
            ElementType::U64 => "uint64",
            ElementType::I64 => "int64",
            ElementType::F32 => "float32",
            ElementType::F64 => "float64",
        }
    }

    /// All-ones value covering the element width.
    pub fn max_raw(self) -> u64 {
        u64::MAX >> (64 - self.bits())
    }

    /// Appends `raw` to `out` as `size()` bytes in `order`.
    pub fn encode(self, raw: u64, order: ByteOrder, out: &mut Vec<u8>) {
        let bytes = raw.to_le_bytes();
        let bytes = &bytes[..self.size()];
        match order {
            ByteOrder::Little => out.extend_from_slice(bytes),
            ByteOrder::Big => out.extend(bytes.iter().rev()),
        }
    }

    /// Reads one element from the first `size()` bytes of `data`.
    pub fn decode(self, data: &[u8], order: ByteOrder) -> u64 {
        let mut bytes = [0u8; 8];
        let size = self.size();
        bytes[..size].copy_from_slice(&data[..size]);
        if order == ByteOrder::Big {
            bytes[..size].reverse();
        }

        u64::from_le_bytes(bytes)
    }

    /// Interprets raw bits as a [Value] of this type.
    pub fn to_value(self, raw: u64) -> Value {
        match self {
            ElementType::F32 => Value::F32(f32::from_bits(raw as u32)),
            ElementType::F64 => Value::F64(f64::from_bits(raw)),
            t if t.is_signed() => Value::I64(sign_extend(raw, t.bits())),
            _ => Value::U64(raw),
        }
    }

    /// Converts a scalar [Value] to raw bits, rejecting values this type cannot hold.
    pub fn to_raw(self, field: &str, value: &Value) -> Result<u64, FieldError> {
        let mismatch = || FieldError::TypeMismatch {
            field: field.to_string(),
            dtype: self.name(),
            found: value.kind_name(),
        };

        if self.is_float() {
            let float = match value {
                Value::F32(v) => *v as f64,
                Value::F64(v) => *v,
                Value::U64(v) => *v as f64,
                Value::I64(v) => *v as f64,
                _ => return Err(mismatch()),
            };

            return Ok(match self {
                ElementType::F32 => (float as f32).to_bits() as u64,
                _ => float.to_bits(),
            });
        }

        let int = value.as_i128().ok_or_else(mismatch)?;
        let (min, max) = if self.is_signed() {
            let half = 1i128 << (self.bits() - 1);
            (-half, half - 1)
        } else {
            (0, self.max_raw() as i128)
        };

        if int < min || int > max {
            return Err(FieldError::OutOfRange {
                field: field.to_string(),
                dtype: self.name(),
                value: int,
            });
        }

        Ok(int as u64 & self.max_raw())
    }
}

/// Byte order used for multi-byte elements on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// A field value as read from or assigned to a [crate::record::Record].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    /// Member name of an enum field.
    Symbol(String),
    /// One value per element of a field with more than one element.
    Array(Vec<Value>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::U64(_) => "unsigned integer",
            Value::I64(_) => "signed integer",
            Value::F32(_) => "float32",
            Value::F64(_) => "float64",
            Value::Symbol(_) => "symbol",
            Value::Array(_) => "array",
        }
    }

    /// Integer content, if this is an integer value.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::U64(v) => Some(*v as i128),
            Value::I64(v) => Some(*v as i128),
            _ => None,
        }
    }
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::U64(value as u64)
            }
        })*
    };
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::I64(value as i64)
            }
        })*
    };
}

impl_from_unsigned!(u8, u16, u32, u64);
impl_from_signed!(i8, i16, i32, i64);

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F32(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Symbol(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Symbol(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_little_and_big() {
        let mut out = Vec::new();
        ElementType::U32.encode(0x0102_0304, ByteOrder::Little, &mut out);
        ElementType::U32.encode(0x0102_0304, ByteOrder::Big, &mut out);
        assert_eq!(out, vec![4, 3, 2, 1, 1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_big() {
        let raw = ElementType::U16.decode(&[0x12, 0x34], ByteOrder::Big);
        assert_eq!(raw, 0x1234);
    }

    #[test]
    fn test_signed_to_raw_and_back() {
        let raw = ElementType::I16.to_raw("x", &Value::I64(-2)).unwrap();
        assert_eq!(raw, 0xFFFE);
        assert_eq!(ElementType::I16.to_value(raw), Value::I64(-2));
    }

    #[test]
    fn test_to_raw_out_of_range() {
        assert_eq!(
            ElementType::U8.to_raw("x", &Value::U64(256)).unwrap_err(),
            FieldError::OutOfRange {
                field: "x".to_string(),
                dtype: "uint8",
                value: 256
            }
        );
        assert!(ElementType::I8.to_raw("x", &Value::I64(-129)).is_err());
        assert!(ElementType::I8.to_raw("x", &Value::I64(-128)).is_ok());
    }

    #[test]
    fn test_to_raw_float() {
        let raw = ElementType::F32.to_raw("x", &Value::F64(1.5)).unwrap();
        assert_eq!(ElementType::F32.to_value(raw), Value::F32(1.5));

        let raw = ElementType::F64.to_raw("x", &Value::U64(3)).unwrap();
        assert_eq!(ElementType::F64.to_value(raw), Value::F64(3.0));
    }

    #[test]
    fn test_to_raw_type_mismatch() {
        assert_eq!(
            ElementType::U8.to_raw("x", &Value::F32(1.0)).unwrap_err(),
            FieldError::TypeMismatch {
                field: "x".to_string(),
                dtype: "uint8",
                found: "float32"
            }
        );
    }

    #[test]
    fn test_max_raw() {
        assert_eq!(ElementType::U8.max_raw(), 0xFF);
        assert_eq!(ElementType::I64.max_raw(), u64::MAX);
    }
}
