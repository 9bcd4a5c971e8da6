//! Record: a live instance of a [Schema] holding field values.

use std::{
    collections::BTreeMap,
    sync::{Arc, OnceLock},
};

use tracing::debug;

use crate::{
    array::Array,
    bits::{extract_bits, insert_bits},
    compiled::{CompiledFieldKind, CompiledScalar, Role, Slot},
    dtype::{ByteOrder, Value},
    errors::{ConstructError, FieldError},
    schema::Schema,
};

/// Construction options for [Record::with_options].
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub byte_order: ByteOrder,
    /// Per-field shape overrides; the declared default is broadcast to the new shape.
    pub shapes: BTreeMap<String, Vec<usize>>,
}

impl RecordOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_byte_order(&mut self, byte_order: ByteOrder) -> &mut Self {
        self.byte_order = byte_order;
        self
    }

    /// Overrides the shape of a scalar field.
    pub fn set_shape(
        &mut self,
        field: impl Into<String>,
        shape: impl Into<Vec<usize>>,
    ) -> &mut Self {
        self.shapes.insert(field.into(), shape.into());
        self
    }
}

/// Storage of one declared field.
#[derive(Debug, Clone)]
pub(crate) enum Cell {
    Scalar(Array),
    Record(Box<Record>),
}

/// A mutable record bound to a shared [Schema].
///
/// Bitfields keep their own logical values; the backing slot they share is
/// only brought in sync by [Record::build] (pack) and [Record::unpack].
/// Cloning a record copies all storage and shares the schema.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    /// One per field, in declaration order.
    pub(crate) cells: Vec<Cell>,
    /// One per slot; `Some` for packed slots.
    pub(crate) backing: Vec<Option<Array>>,
    byte_order: ByteOrder,
    byte_size: OnceLock<usize>,
}

impl Record {
    /// Creates a little-endian record holding the declared defaults.
    pub fn new(schema: &Arc<Schema>) -> Self {
        let cells = schema
            .fields()
            .iter()
            .map(|field| match &field.kind {
                CompiledFieldKind::Scalar(scalar) => Cell::Scalar(scalar.template.clone()),
                CompiledFieldKind::Composite(record) => Cell::Record(record.clone()),
            })
            .collect();

        Self::assemble(schema, cells, ByteOrder::default())
    }

    /// Creates a record with shape overrides and a byte order.
    pub fn with_options(
        schema: &Arc<Schema>,
        options: &RecordOptions,
    ) -> Result<Self, ConstructError> {
        for name in options.shapes.keys() {
            match schema.field(name).map(|f| &f.kind) {
                None => return Err(ConstructError::UnknownField(name.clone())),
                Some(CompiledFieldKind::Composite(_)) => {
                    return Err(ConstructError::NotScalar(name.clone()));
                }
                Some(CompiledFieldKind::Scalar(_)) => {}
            }
        }

        let mut cells = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let cell = match &field.kind {
                CompiledFieldKind::Composite(record) => Cell::Record(record.clone()),
                CompiledFieldKind::Scalar(scalar) => match options.shapes.get(&field.name) {
                    None => Cell::Scalar(scalar.template.clone()),
                    Some(shape) => {
                        let array = scalar.template.broadcast_to(shape).ok_or_else(|| {
                            ConstructError::ShapeMismatch {
                                field: field.name.clone(),
                                from: scalar.template.shape().to_vec(),
                                to: shape.clone(),
                            }
                        })?;
                        Cell::Scalar(array)
                    }
                },
            };
            cells.push(cell);
        }

        // Bitfields sharing a slot must keep the backing slot's shape.
        for slot in schema.slots() {
            let Slot::Packed(packed) = slot else { continue };
            let Cell::Scalar(first) = &cells[packed.fields[0]] else { continue };
            for &i in &packed.fields[1..] {
                if let Cell::Scalar(array) = &cells[i] {
                    if array.shape() != first.shape() {
                        return Err(ConstructError::ShapeMismatch {
                            field: schema.fields()[i].name.clone(),
                            from: array.shape().to_vec(),
                            to: first.shape().to_vec(),
                        });
                    }
                }
            }
        }

        Ok(Self::assemble(schema, cells, options.byte_order))
    }

    fn assemble(schema: &Arc<Schema>, cells: Vec<Cell>, byte_order: ByteOrder) -> Self {
        // A backing slot starts from its first bitfield's storage; bits no
        // bitfield covers keep that value.
        let backing = schema
            .slots()
            .iter()
            .map(|slot| match slot {
                Slot::Packed(packed) => match &cells[packed.fields[0]] {
                    Cell::Scalar(array) => Some(array.clone()),
                    Cell::Record(_) => None,
                },
                _ => None,
            })
            .collect();

        let mut record = Self {
            schema: schema.clone(),
            cells,
            backing,
            byte_order,
            byte_size: OnceLock::new(),
        };
        record.apply_byte_order(byte_order);
        record
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Name of the schema this record was created from.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.schema.fields().iter().map(|f| f.name.as_str())
    }

    /// Number of backing slots, i.e. entries in [Record::value].
    pub fn len(&self) -> usize {
        self.schema.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schema.slots().is_empty()
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Sets the byte order of this record and every nested record.
    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        debug!(record = %self.name(), ?byte_order, "set byte order");
        self.apply_byte_order(byte_order);
    }

    fn apply_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
        for cell in &mut self.cells {
            if let Cell::Record(record) = cell {
                record.apply_byte_order(byte_order);
            }
        }
    }

    /// Total length of the wire representation. Computed once from the layout.
    pub fn byte_size(&self) -> usize {
        *self.byte_size.get_or_init(|| {
            self.schema
                .slots()
                .iter()
                .enumerate()
                .map(|(s, slot)| match slot {
                    Slot::Plain(i) => match (&self.cells[*i], &self.schema.fields()[*i].kind) {
                        (Cell::Scalar(array), CompiledFieldKind::Scalar(scalar)) => {
                            array.len() * scalar.dtype.size()
                        }
                        _ => 0,
                    },
                    Slot::Packed(packed) => self.backing[s]
                        .as_ref()
                        .map_or(0, |array| array.len() * packed.dtype.size()),
                    Slot::Composite(i) => match &self.cells[*i] {
                        Cell::Record(record) => record.byte_size(),
                        Cell::Scalar(_) => 0,
                    },
                })
                .sum()
        })
    }

    /// Reads a scalar field.
    ///
    /// Enum fields return the member name when the raw value is a member.
    /// Single-valued fields return one value, others a [Value::Array].
    pub fn get(&self, name: &str) -> Result<Value, FieldError> {
        let (scalar, array) = self.scalar(name)?;
        let mut values: Vec<Value> = array
            .raw()
            .iter()
            .map(|&raw| scalar.role.decode(scalar.dtype, raw))
            .collect();

        if array.is_scalar() {
            Ok(values.remove(0))
        } else {
            Ok(Value::Array(values))
        }
    }

    /// Assigns a scalar field.
    ///
    /// A single value is written to every element; a [Value::Array] must match
    /// the element count. Bitfield values are truncated to the field width.
    /// Enum fields accept member names or raw integers; raw integers are
    /// checked against the enum only by [Record::build].
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), FieldError> {
        let value = value.into();
        let index = self.index(name)?;
        let CompiledFieldKind::Scalar(scalar) = &self.schema.fields()[index].kind else {
            return Err(FieldError::NotScalar(name.to_string()));
        };
        let Cell::Scalar(array) = &mut self.cells[index] else {
            return Err(FieldError::NotScalar(name.to_string()));
        };

        match &value {
            Value::Array(values) => {
                if values.len() != array.len() {
                    return Err(FieldError::LengthMismatch {
                        field: name.to_string(),
                        expected: array.len(),
                        actual: values.len(),
                    });
                }

                let raw = values
                    .iter()
                    .map(|v| scalar.role.encode(scalar.dtype, name, v))
                    .collect::<Result<Vec<u64>, _>>()?;
                array.raw_mut().copy_from_slice(&raw);
            }
            single => {
                let raw = scalar.role.encode(scalar.dtype, name, single)?;
                array.raw_mut().fill(raw);
            }
        }

        Ok(())
    }

    /// Shape of a scalar field.
    pub fn shape(&self, name: &str) -> Result<&[usize], FieldError> {
        self.scalar(name).map(|(_, array)| array.shape())
    }

    /// Nested record stored in field `name`.
    pub fn record(&self, name: &str) -> Result<&Record, FieldError> {
        match &self.cells[self.index(name)?] {
            Cell::Record(record) => Ok(record),
            Cell::Scalar(_) => Err(FieldError::NotComposite(name.to_string())),
        }
    }

    /// Mutable access to a nested record.
    ///
    /// The outermost record's byte order governs its bytes and its dump, so
    /// changing the byte order here only affects the nested record on its own.
    pub fn record_mut(&mut self, name: &str) -> Result<&mut Record, FieldError> {
        let index = self.index(name)?;
        match &mut self.cells[index] {
            Cell::Record(record) => Ok(record),
            Cell::Scalar(_) => Err(FieldError::NotComposite(name.to_string())),
        }
    }

    /// Replaces a nested record. The replacement must come from the same schema
    /// and have the same byte size; it takes this record's byte order.
    pub fn set_record(&mut self, name: &str, mut record: Record) -> Result<(), FieldError> {
        let byte_order = self.byte_order;
        let current = self.record_mut(name)?;
        if !Arc::ptr_eq(&current.schema, &record.schema)
            || current.byte_size() != record.byte_size()
        {
            return Err(FieldError::SchemaMismatch(name.to_string()));
        }

        record.apply_byte_order(byte_order);
        *current = record;
        Ok(())
    }

    fn index(&self, name: &str) -> Result<usize, FieldError> {
        self.schema
            .field_index(name)
            .ok_or_else(|| FieldError::UnknownField(name.to_string()))
    }

    pub(crate) fn scalar(&self, name: &str) -> Result<(&CompiledScalar, &Array), FieldError> {
        let index = self.index(name)?;
        match (&self.schema.fields()[index].kind, &self.cells[index]) {
            (CompiledFieldKind::Scalar(scalar), Cell::Scalar(array)) => Ok((scalar, array)),
            _ => Err(FieldError::NotScalar(name.to_string())),
        }
    }

    /// Writes every bitfield's logical value into its backing slot.
    pub(crate) fn pack_bitfields(&mut self) {
        for (s, slot) in self.schema.slots().iter().enumerate() {
            let (Slot::Packed(packed), Some(backing)) = (slot, &mut self.backing[s]) else {
                continue;
            };
            let width = packed.dtype.bits();

            for &i in &packed.fields {
                let (CompiledFieldKind::Scalar(scalar), Cell::Scalar(array)) =
                    (&self.schema.fields()[i].kind, &self.cells[i])
                else {
                    continue;
                };
                let Role::Bits(slice) = scalar.role else { continue };

                for (element, &value) in backing.raw_mut().iter_mut().zip(array.raw()) {
                    *element = insert_bits(*element, value, width, slice.start, slice.stop);
                }
            }
        }
    }

    /// Refreshes every bitfield's logical value from its backing slot.
    pub(crate) fn unpack_bitfields(&mut self) {
        for (s, slot) in self.schema.slots().iter().enumerate() {
            let (Slot::Packed(packed), Some(backing)) = (slot, &self.backing[s]) else {
                continue;
            };
            let width = packed.dtype.bits();

            for &i in &packed.fields {
                let (CompiledFieldKind::Scalar(scalar), Cell::Scalar(array)) =
                    (&self.schema.fields()[i].kind, &mut self.cells[i])
                else {
                    continue;
                };
                let Role::Bits(slice) = scalar.role else { continue };

                for (value, &element) in array.raw_mut().iter_mut().zip(backing.raw()) {
                    *value = extract_bits(element, width, slice.start, slice.stop);
                }
            }
        }
    }
}
