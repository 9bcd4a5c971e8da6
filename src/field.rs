//! Declaration of the fields used to build a [crate::schema::Schema].

use std::sync::Arc;

use crate::{
    dtype::{ElementType, Value},
    enumeration::EnumType,
    record::Record,
};

/// A single named field in a struct declaration.
#[derive(Debug, Clone)]
pub struct Field {
    /// Name used for field access and in the formatted dump.
    pub name: String,
    /// Scalar storage or a nested record.
    pub kind: FieldKind,
}

/// Distinguishes scalar fields from nested records.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Fixed-shape elements of one element type.
    Scalar(ScalarSpec),
    /// A nested record; its current values become the default of every instance.
    Composite(Box<Record>),
}

/// Element type, default value, and annotation of a scalar field.
#[derive(Debug, Clone)]
pub struct ScalarSpec {
    pub dtype: ElementType,
    /// Element shape. When `None`, the shape follows the default: `[1]` for a
    /// single value, `[n]` for an array of `n` values.
    pub shape: Option<Vec<usize>>,
    /// A single value (broadcast over the shape) or a flat array of values.
    pub default: Value,
    pub annotation: Annotation,
}

/// How a scalar field is stored.
#[derive(Debug, Clone)]
pub enum Annotation {
    /// Owns its own backing slot.
    Plain,
    /// Occupies this many bits of a backing slot shared with adjacent bitfields of the same type.
    Bits(usize),
    /// Owns its own backing slot and maps raw values to members of an enum.
    Enum(Arc<EnumType>),
}

impl Field {
    /// Plain scalar field defaulting to zero.
    pub fn scalar(name: impl Into<String>, dtype: ElementType) -> Self {
        Field {
            name: name.into(),
            kind: FieldKind::Scalar(ScalarSpec {
                dtype,
                shape: None,
                default: Value::U64(0),
                annotation: Annotation::Plain,
            }),
        }
    }

    /// Bitfield of `bits` bits backed by `dtype`.
    pub fn bits(name: impl Into<String>, dtype: ElementType, bits: usize) -> Self {
        Field::scalar(name, dtype).with_annotation(Annotation::Bits(bits))
    }

    /// Enum field storing raw values of `dtype`.
    pub fn enumeration(
        name: impl Into<String>,
        dtype: ElementType,
        enum_type: Arc<EnumType>,
    ) -> Self {
        Field::scalar(name, dtype).with_annotation(Annotation::Enum(enum_type))
    }

    /// Nested record field. `record` is copied into every instance.
    pub fn record(name: impl Into<String>, record: Record) -> Self {
        Field {
            name: name.into(),
            kind: FieldKind::Composite(Box::new(record)),
        }
    }

    /// Sets the default value. Ignored for nested records.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        if let FieldKind::Scalar(spec) = &mut self.kind {
            spec.default = default.into();
        }
        self
    }

    /// Sets the element shape. Ignored for nested records.
    pub fn with_shape(mut self, shape: impl Into<Vec<usize>>) -> Self {
        if let FieldKind::Scalar(spec) = &mut self.kind {
            spec.shape = Some(shape.into());
        }
        self
    }

    /// Sets the annotation. Ignored for nested records.
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        if let FieldKind::Scalar(spec) = &mut self.kind {
            spec.annotation = annotation;
        }
        self
    }
}
