//! Struct declarations loaded from data files.
//!
//! A [StructDef] mirrors a list of [Field]s, with nested structs declared
//! inline. Parse one with any serde format and pass it to [Schema::from_def].
//!
//! ```json
//! {
//!   "name": "Header",
//!   "fields": [
//!     { "name": "lo", "type": "Scalar", "dtype": "u8", "bits": 4 },
//!     { "name": "hi", "type": "Scalar", "dtype": "u8", "bits": 4 },
//!     { "name": "status", "type": "Scalar", "dtype": "u8",
//!       "enum": { "name": "Status", "members": [{ "name": "OK", "value": 0 }] } },
//!     { "name": "inner", "type": "Struct", "def": { "name": "Inner", "fields": [] } }
//!   ]
//! }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    dtype::{ElementType, Value},
    enumeration::EnumType,
    errors::CompileError,
    field::{Annotation, Field, FieldKind, ScalarSpec},
    record::Record,
    schema::Schema,
};

/// Top-level declaration: a named list of fields.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StructDef {
    /// Type name shown in the formatted dump.
    pub name: String,
    /// Fields in wire order.
    pub fields: Vec<FieldDef>,
}

/// Declaration of a single field.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKindDef,
}

/// Kind of field in the declaration.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum FieldKindDef {
    /// Plain, bitfield, or enum scalar field.
    Scalar {
        dtype: ElementType,
        /// Element shape; defaults to the shape of `default`.
        #[serde(default)]
        shape: Option<Vec<usize>>,
        #[serde(default)]
        default: Option<DefaultDef>,
        /// Bit width when the field is a bitfield.
        #[serde(default)]
        bits: Option<usize>,
        /// Symbolic members when the field is an enum.
        #[serde(default, rename = "enum")]
        enumeration: Option<EnumDef>,
    },
    /// Nested record with its own declaration.
    Struct { def: StructDef },
}

/// Default value of a scalar field.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum DefaultDef {
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Enum member name.
    Symbol(String),
    Array(Vec<DefaultDef>),
}

/// Symbolic value set of an enum field.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<EnumMemberDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EnumMemberDef {
    pub name: String,
    pub value: i64,
}

impl From<DefaultDef> for Value {
    fn from(value: DefaultDef) -> Self {
        match value {
            DefaultDef::Int(v) => Value::I64(v),
            DefaultDef::UInt(v) => Value::U64(v),
            DefaultDef::Float(v) => Value::F64(v),
            DefaultDef::Symbol(s) => Value::Symbol(s),
            DefaultDef::Array(values) => Value::Array(values.into_iter().map(Into::into).collect()),
        }
    }
}

impl TryFrom<EnumDef> for Arc<EnumType> {
    type Error = CompileError;

    fn try_from(value: EnumDef) -> Result<Self, Self::Error> {
        EnumType::new(
            value.name,
            value.members.into_iter().map(|m| (m.name, m.value)),
        )
    }
}

impl TryFrom<FieldDef> for Field {
    type Error = CompileError;

    fn try_from(value: FieldDef) -> Result<Self, Self::Error> {
        let kind = match value.kind {
            FieldKindDef::Struct { def } => {
                FieldKind::Composite(Box::new(Record::new(&Schema::from_def(def)?)))
            }
            FieldKindDef::Scalar {
                dtype,
                shape,
                default,
                bits,
                enumeration,
            } => {
                let annotation = match (bits, enumeration) {
                    (Some(_), Some(_)) => {
                        return Err(CompileError::UnsupportedType {
                            field: value.name,
                            dtype: dtype.name(),
                            annotation: "both bitfield and enum",
                        });
                    }
                    (Some(bits), None) => Annotation::Bits(bits),
                    (None, Some(def)) => Annotation::Enum(def.try_into()?),
                    (None, None) => Annotation::Plain,
                };

                FieldKind::Scalar(ScalarSpec {
                    dtype,
                    shape,
                    default: default.map(Into::into).unwrap_or(Value::U64(0)),
                    annotation,
                })
            }
        };

        Ok(Field {
            name: value.name,
            kind,
        })
    }
}

impl Schema {
    /// Compiles a [StructDef], including the declarations of nested records.
    pub fn from_def(def: StructDef) -> Result<Arc<Self>, CompileError> {
        let fields = def
            .fields
            .into_iter()
            .map(Field::try_from)
            .collect::<Result<Vec<Field>, _>>()?;

        Schema::compile(def.name, &fields)
    }
}
