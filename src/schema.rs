//! Schema: the immutable layout derived once from a struct declaration.

use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::{
    array::Array,
    compiled::{BitSlice, BitSlot, CompiledField, CompiledFieldKind, CompiledScalar, Role, Slot},
    dtype::{ElementType, Value},
    errors::CompileError,
    field::{Annotation, Field, FieldKind, ScalarSpec},
    record::Record,
};

/// Names reserved by the record protocol.
pub const RESERVED_NAMES: [&str; 6] = [
    "value",
    "dtype",
    "shape",
    "unpack",
    "byte_order",
    "get_byte_size",
];

/// A compiled struct declaration: fields, the backing-slot table, and defaults.
///
/// Use [Schema::compile] to build from [Field]s, then [Schema::instantiate] or
/// [Record::with_options] to create records. A schema is shared by every record
/// created from it and never changes.
#[derive(Debug)]
pub struct Schema {
    name: String,
    fields: Vec<CompiledField>,
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
    print_width: usize,
}

impl Schema {
    /// Compiles `fields` into a schema named `name`.
    ///
    /// Consecutive bitfields of the same element type share a backing slot,
    /// taking bits upwards from bit 0. Any other field closes the running slot.
    pub fn compile(name: impl Into<String>, fields: &[Field]) -> Result<Arc<Self>, CompileError> {
        let name = name.into();
        let mut compiled_fields: Vec<CompiledField> = Vec::with_capacity(fields.len());
        let mut slots: Vec<Slot> = Vec::new();
        let mut index = HashMap::with_capacity(fields.len());
        // Backing slot still accepting bitfields.
        let mut open: Option<usize> = None;

        for (i, field) in fields.iter().enumerate() {
            check_name(&field.name)?;
            if index.insert(field.name.clone(), i).is_some() {
                return Err(CompileError::DuplicateFieldName(field.name.clone()));
            }

            let spec = match &field.kind {
                FieldKind::Composite(record) => {
                    open = None;
                    compiled_fields.push(CompiledField {
                        name: field.name.clone(),
                        slot: slots.len(),
                        kind: CompiledFieldKind::Composite(record.clone()),
                    });
                    slots.push(Slot::Composite(i));
                    continue;
                }
                FieldKind::Scalar(spec) => spec,
            };

            let (role, slot) = match &spec.annotation {
                Annotation::Plain => {
                    open = None;
                    slots.push(Slot::Plain(i));
                    (Role::Plain, slots.len() - 1)
                }
                Annotation::Enum(enum_type) => {
                    if spec.dtype.is_float() {
                        return Err(unsupported(field, spec.dtype, "enum"));
                    }
                    let fits = enum_type
                        .members()
                        .iter()
                        .all(|(_, raw)| spec.dtype.to_raw(&field.name, &Value::I64(*raw)).is_ok());
                    if !fits {
                        return Err(CompileError::InvalidEnum(enum_type.name().to_string()));
                    }

                    open = None;
                    slots.push(Slot::Plain(i));
                    (Role::Enum(enum_type.clone()), slots.len() - 1)
                }
                Annotation::Bits(bits) => {
                    let bits = *bits;
                    if spec.dtype.is_float() {
                        return Err(unsupported(field, spec.dtype, "bitfield"));
                    }
                    if bits == 0 || bits > spec.dtype.bits() {
                        return Err(CompileError::InvalidBitWidth {
                            field: field.name.clone(),
                            bits,
                            max: spec.dtype.bits(),
                        });
                    }

                    let reuse = open.filter(|&s| {
                        matches!(&slots[s], Slot::Packed(packed) if packed.dtype == spec.dtype)
                    });
                    let slot = match reuse {
                        Some(slot) => slot,
                        None => {
                            slots.push(Slot::Packed(BitSlot {
                                dtype: spec.dtype,
                                fields: Vec::new(),
                                used_bits: 0,
                            }));
                            slots.len() - 1
                        }
                    };
                    open = Some(slot);

                    let Slot::Packed(packed) = &mut slots[slot] else {
                        unreachable!("open slot is always packed");
                    };
                    let stop = packed.used_bits;
                    if stop + bits > spec.dtype.bits() {
                        return Err(CompileError::BitfieldOverflow {
                            field: field.name.clone(),
                            used: stop + bits,
                            capacity: spec.dtype.bits(),
                        });
                    }
                    packed.used_bits += bits;
                    packed.fields.push(i);

                    (
                        Role::Bits(BitSlice {
                            start: stop + bits - 1,
                            stop,
                        }),
                        slot,
                    )
                }
            };

            let template = scalar_template(&field.name, spec, &role)?;

            if let Slot::Packed(packed) = &slots[slot] {
                let first = compiled_fields.get(packed.fields[0]).map(|f| &f.kind);
                if let Some(CompiledFieldKind::Scalar(first)) = first {
                    if first.template.shape() != template.shape() {
                        return Err(CompileError::BitfieldShapeMismatch {
                            field: field.name.clone(),
                            expected: first.template.shape().to_vec(),
                            found: template.shape().to_vec(),
                        });
                    }
                }
            }

            compiled_fields.push(CompiledField {
                name: field.name.clone(),
                slot,
                kind: CompiledFieldKind::Scalar(CompiledScalar {
                    dtype: spec.dtype,
                    template,
                    role,
                }),
            });
        }

        let print_width = fields.iter().map(|f| f.name.len()).max().unwrap_or(0) + 3;

        debug!(
            schema = %name,
            fields = compiled_fields.len(),
            slots = slots.len(),
            packed = slots.iter().filter(|s| matches!(s, Slot::Packed(_))).count(),
            "compiled schema"
        );

        Ok(Arc::new(Self {
            name,
            fields: compiled_fields,
            slots,
            index,
            print_width,
        }))
    }

    /// Creates a little-endian record holding the declared defaults.
    pub fn instantiate(self: &Arc<Self>) -> Record {
        Record::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compiled fields in declaration order.
    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    /// Backing slots in wire order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Index of the field called `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.field_index(name).map(|i| &self.fields[i])
    }

    /// Column width of field names in the formatted dump.
    pub fn print_width(&self) -> usize {
        self.print_width
    }
}

fn check_name(name: &str) -> Result<(), CompileError> {
    if name.is_empty() {
        return Err(CompileError::InvalidFieldName);
    }
    if name.starts_with('_') || RESERVED_NAMES.contains(&name) {
        return Err(CompileError::ReservedFieldName(name.to_string()));
    }

    Ok(())
}

fn unsupported(field: &Field, dtype: ElementType, annotation: &'static str) -> CompileError {
    CompileError::UnsupportedType {
        field: field.name.clone(),
        dtype: dtype.name(),
        annotation,
    }
}

/// Default storage of a scalar field: the default converted to raw bits and
/// broadcast over the declared shape.
fn scalar_template(name: &str, spec: &ScalarSpec, role: &Role) -> Result<Array, CompileError> {
    let invalid = || CompileError::InvalidDefault(name.to_string());

    let values = match &spec.default {
        Value::Array(values) => values.as_slice(),
        value => std::slice::from_ref(value),
    };

    let raw = values
        .iter()
        .map(|value| role.encode(spec.dtype, name, value))
        .collect::<Result<Vec<u64>, _>>()
        .map_err(|_| invalid())?;

    let array = Array::from_raw(raw);
    match &spec.shape {
        Some(shape) => array.broadcast_to(shape).ok_or_else(invalid),
        None => Ok(array),
    }
}

#[cfg(test)]
mod tests {
    use crate::{dtype::ElementType, enumeration::EnumType};

    use super::*;

    #[test]
    fn test_compile_empty() {
        let schema = Schema::compile("Empty", &[]).unwrap();
        assert!(schema.slots().is_empty());
        assert_eq!(schema.print_width(), 3);
    }

    #[test]
    fn test_bitfields_share_slot() {
        let schema = Schema::compile(
            "Flags",
            &[
                Field::bits("lo", ElementType::U8, 4),
                Field::bits("hi", ElementType::U8, 4),
                Field::scalar("count", ElementType::U16),
            ],
        )
        .unwrap();

        assert_eq!(schema.slots().len(), 2);
        let Slot::Packed(packed) = &schema.slots()[0] else {
            panic!("expected packed slot");
        };
        assert_eq!(packed.fields, vec![0, 1]);
        assert_eq!(packed.used_bits, 8);

        let CompiledFieldKind::Scalar(hi) = &schema.fields()[1].kind else {
            panic!("expected scalar");
        };
        assert!(matches!(hi.role, Role::Bits(BitSlice { start: 7, stop: 4 })));
        assert_eq!(schema.fields()[2].slot, 1);
    }

    #[test]
    fn test_type_change_starts_new_slot() {
        let schema = Schema::compile(
            "Mixed",
            &[
                Field::bits("a", ElementType::U8, 3),
                Field::bits("b", ElementType::U16, 3),
                Field::bits("c", ElementType::U16, 3),
            ],
        )
        .unwrap();

        assert_eq!(schema.slots().len(), 2);
        let CompiledFieldKind::Scalar(c) = &schema.fields()[2].kind else {
            panic!("expected scalar");
        };
        assert!(matches!(c.role, Role::Bits(BitSlice { start: 5, stop: 3 })));
    }

    #[test]
    fn test_plain_field_closes_slot() {
        let schema = Schema::compile(
            "Split",
            &[
                Field::bits("a", ElementType::U8, 4),
                Field::scalar("x", ElementType::U8),
                Field::bits("b", ElementType::U8, 4),
            ],
        )
        .unwrap();

        assert_eq!(schema.slots().len(), 3);
    }

    #[test]
    fn test_reserved_names() {
        for name in ["value", "unpack", "_private"] {
            assert_eq!(
                Schema::compile("Bad", &[Field::scalar(name, ElementType::U8)]).unwrap_err(),
                CompileError::ReservedFieldName(name.to_string())
            );
        }
    }

    #[test]
    fn test_duplicate_name() {
        let err = Schema::compile(
            "Bad",
            &[
                Field::scalar("a", ElementType::U8),
                Field::scalar("a", ElementType::U16),
            ],
        )
        .unwrap_err();
        assert_eq!(err, CompileError::DuplicateFieldName("a".to_string()));
    }

    #[test]
    fn test_bitfield_overflow() {
        let err = Schema::compile(
            "Bad",
            &[
                Field::bits("a", ElementType::U8, 5),
                Field::bits("b", ElementType::U8, 4),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::BitfieldOverflow {
                field: "b".to_string(),
                used: 9,
                capacity: 8
            }
        );
    }

    #[test]
    fn test_invalid_bit_width() {
        assert!(matches!(
            Schema::compile("Bad", &[Field::bits("a", ElementType::U8, 0)]),
            Err(CompileError::InvalidBitWidth { .. })
        ));
        assert!(matches!(
            Schema::compile("Bad", &[Field::bits("a", ElementType::U16, 17)]),
            Err(CompileError::InvalidBitWidth { .. })
        ));
    }

    #[test]
    fn test_float_bitfield_unsupported() {
        assert!(matches!(
            Schema::compile("Bad", &[Field::bits("a", ElementType::F32, 4)]),
            Err(CompileError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_enum_member_out_of_range() {
        let wide = EnumType::new("Wide", [("BIG", 300)]).unwrap();
        assert_eq!(
            Schema::compile("Bad", &[Field::enumeration("e", ElementType::U8, wide)]).unwrap_err(),
            CompileError::InvalidEnum("Wide".to_string())
        );
    }

    #[test]
    fn test_default_broadcast_to_shape() {
        let schema = Schema::compile(
            "Arr",
            &[Field::scalar("data", ElementType::U16)
                .with_default(7u16)
                .with_shape([2, 2])],
        )
        .unwrap();

        let CompiledFieldKind::Scalar(data) = &schema.fields()[0].kind else {
            panic!("expected scalar");
        };
        assert_eq!(data.template.raw(), &[7, 7, 7, 7]);
    }

    #[test]
    fn test_invalid_default() {
        assert_eq!(
            Schema::compile(
                "Bad",
                &[Field::scalar("a", ElementType::U8).with_default(1000u16)]
            )
            .unwrap_err(),
            CompileError::InvalidDefault("a".to_string())
        );
        assert!(
            Schema::compile(
                "Bad",
                &[Field::scalar("a", ElementType::U8)
                    .with_default(vec![1u8, 2, 3])
                    .with_shape([2])]
            )
            .is_err()
        );
    }

    #[test]
    fn test_bitfield_shape_mismatch() {
        let err = Schema::compile(
            "Bad",
            &[
                Field::bits("a", ElementType::U8, 4).with_shape([2]),
                Field::bits("b", ElementType::U8, 4),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::BitfieldShapeMismatch {
                field: "b".to_string(),
                expected: vec![2],
                found: vec![1]
            }
        );
    }
}
