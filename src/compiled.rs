//! Compiled field metadata and the backing-slot table of a [crate::schema::Schema].

use std::sync::Arc;

use crate::{
    array::Array,
    bits::{sign_extend, truncate},
    dtype::{ElementType, Value},
    enumeration::EnumType,
    errors::FieldError,
    record::Record,
};

/// A field after compilation: its storage template and the backing slot it lives in.
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub name: String,
    /// Index into [crate::schema::Schema::slots].
    pub slot: usize,
    pub kind: CompiledFieldKind,
}

#[derive(Debug, Clone)]
pub enum CompiledFieldKind {
    Scalar(CompiledScalar),
    Composite(Box<Record>),
}

/// Scalar field: element type, default storage and storage role.
#[derive(Debug, Clone)]
pub struct CompiledScalar {
    pub dtype: ElementType,
    pub template: Array,
    pub role: Role,
}

/// How a scalar field maps to its backing slot.
#[derive(Debug, Clone)]
pub enum Role {
    Plain,
    Enum(Arc<EnumType>),
    Bits(BitSlice),
}

/// Bits `stop..=start` of a backing element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSlice {
    pub start: usize,
    pub stop: usize,
}

impl BitSlice {
    pub fn width(&self) -> usize {
        self.start - self.stop + 1
    }
}

/// One entry of the wire layout, in declaration order.
#[derive(Debug, Clone)]
pub enum Slot {
    /// Plain or enum field that owns its storage.
    Plain(usize),
    /// Consecutive same-type bitfields sharing one backing element per position.
    Packed(BitSlot),
    /// Nested record.
    Composite(usize),
}

#[derive(Debug, Clone)]
pub struct BitSlot {
    pub dtype: ElementType,
    /// Field indices in declaration order; their bit ranges are disjoint.
    pub fields: Vec<usize>,
    /// Bits claimed by the fields, counted from bit 0.
    pub used_bits: usize,
}

impl Role {
    /// Converts an assigned value to raw storage bits.
    ///
    /// Bitfields keep only their low `width` bits. Enum fields accept a member
    /// name or any raw integer of the element type; membership is checked at build.
    pub fn encode(
        &self,
        dtype: ElementType,
        field: &str,
        value: &Value,
    ) -> Result<u64, FieldError> {
        match self {
            Role::Plain => dtype.to_raw(field, value),
            Role::Enum(enum_type) => match value {
                Value::Symbol(member) => {
                    let raw = enum_type.value_of(member).ok_or_else(|| {
                        FieldError::UnknownMember {
                            field: field.to_string(),
                            enumeration: enum_type.name().to_string(),
                            member: member.clone(),
                        }
                    })?;
                    dtype.to_raw(field, &Value::I64(raw))
                }
                _ => dtype.to_raw(field, value),
            },
            Role::Bits(slice) => {
                let int = value.as_i128().ok_or_else(|| FieldError::TypeMismatch {
                    field: field.to_string(),
                    dtype: dtype.name(),
                    found: value.kind_name(),
                })?;
                Ok(truncate(int as u64, slice.width()))
            }
        }
    }

    /// Converts raw storage bits to the value returned by field reads.
    pub fn decode(&self, dtype: ElementType, raw: u64) -> Value {
        match self {
            Role::Plain => dtype.to_value(raw),
            Role::Enum(enum_type) => {
                let value = dtype.to_value(raw);
                value
                    .as_i128()
                    .and_then(|int| i64::try_from(int).ok())
                    .and_then(|int| enum_type.member_of(int))
                    .map(|member| Value::Symbol(member.to_string()))
                    .unwrap_or(value)
            }
            Role::Bits(slice) if dtype.is_signed() => {
                Value::I64(sign_extend(raw, slice.width()))
            }
            Role::Bits(_) => Value::U64(raw),
        }
    }

    /// Raw bits of the element type holding the decoded value. Differs from
    /// `raw` only for signed bitfields, which are sign-extended.
    pub fn element_raw(&self, dtype: ElementType, raw: u64) -> u64 {
        match self {
            Role::Bits(slice) if dtype.is_signed() => {
                sign_extend(raw, slice.width()) as u64 & dtype.max_raw()
            }
            _ => raw,
        }
    }
}
