//! Error types for schema compilation, record construction, field access and the codec.

use thiserror::Error;

/// Errors produced when compiling [crate::field::Field]s into a [crate::schema::Schema].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Field name collides with the record protocol (`value`, `unpack`, ...) or starts with `_`.
    #[error("protected field name: {0}")]
    ReservedFieldName(String),
    /// The same field name was declared twice.
    #[error("duplicate field name: {0}")]
    DuplicateFieldName(String),
    /// Field name is empty.
    #[error("field name must not be empty")]
    InvalidFieldName,
    /// Bitfield or enum annotation on an element type that cannot carry it.
    #[error("field {field}: {dtype} cannot be declared as {annotation}")]
    UnsupportedType {
        field: String,
        dtype: &'static str,
        annotation: &'static str,
    },
    /// Bit width is zero or wider than the element type.
    #[error("field {field}: bit width {bits} outside 1..={max}")]
    InvalidBitWidth { field: String, bits: usize, max: usize },
    /// Consecutive bitfields need more bits than their backing slot holds.
    #[error("field {field}: bitfields need {used} bits, backing slot holds {capacity}")]
    BitfieldOverflow {
        field: String,
        used: usize,
        capacity: usize,
    },
    /// Bitfields sharing a backing slot have different element counts.
    #[error("field {field}: shape {found:?} differs from backing slot shape {expected:?}")]
    BitfieldShapeMismatch {
        field: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// Default value does not fit the declared element type or shape.
    #[error("field {0}: default value does not fit its element type or shape")]
    InvalidDefault(String),
    /// Enum type has no members, or repeats a name or value.
    #[error("enum {0}: members must be non-empty with unique names and values")]
    InvalidEnum(String),
}

/// Errors produced when instantiating a [crate::record::Record] with options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructError {
    /// Default value cannot be broadcast to the requested shape.
    #[error("field {field}: cannot broadcast shape {from:?} to {to:?}")]
    ShapeMismatch {
        field: String,
        from: Vec<usize>,
        to: Vec<usize>,
    },
    /// Shape override names a field the schema does not declare.
    #[error("no field named {0}")]
    UnknownField(String),
    /// Shape override names a nested record.
    #[error("field {0} is a nested record and has no shape")]
    NotScalar(String),
}

/// Errors produced when reading or assigning a field by name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("no field named {0}")]
    UnknownField(String),
    /// Scalar access on a nested record field.
    #[error("field {0} is a nested record")]
    NotScalar(String),
    /// Record access on a scalar field.
    #[error("field {0} is not a nested record")]
    NotComposite(String),
    /// Value kind cannot be stored in the field (e.g. a float into an integer).
    #[error("field {field}: cannot store {found} in {dtype}")]
    TypeMismatch {
        field: String,
        dtype: &'static str,
        found: &'static str,
    },
    /// Integer does not fit the field's element type.
    #[error("field {field}: {value} out of range for {dtype}")]
    OutOfRange {
        field: String,
        dtype: &'static str,
        value: i128,
    },
    /// Array value length differs from the field's element count.
    #[error("field {field}: expected {expected} elements, got {actual}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    /// Symbolic value is not a member of the bound enum.
    #[error("field {field}: {member} is not a member of {enumeration}")]
    UnknownMember {
        field: String,
        enumeration: String,
        member: String,
    },
    /// Replacement record was compiled from a different schema.
    #[error("field {0}: record has a different schema")]
    SchemaMismatch(String),
}

/// Errors produced when unpacking bytes or slot values into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Input length differs from the record's byte size.
    #[error("expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    /// Slot values do not match the record layout.
    #[error("slot {0} does not match the record layout")]
    SlotMismatch(usize),
}

/// Errors produced when building a record into slot values or bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// Raw value of an enum field is not a member of its enum.
    #[error("field {field}: {value} is not a valid {enumeration} value")]
    InvalidEnumValue {
        field: String,
        enumeration: String,
        value: i128,
    },
}

/// Any error produced by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("construct error: {0}")]
    Construct(#[from] ConstructError),
    #[error("field error: {0}")]
    Field(#[from] FieldError),
    #[error("read error: {0}")]
    Read(#[from] ReadError),
    #[error("write error: {0}")]
    Write(#[from] WriteError),
}

pub type Result<T> = std::result::Result<T, Error>;
