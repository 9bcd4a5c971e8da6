//! Serialization of records to and from their wire representation.
//!
//! A record's canonical value is one [SlotValue] per backing slot, in
//! declaration order. The wire bytes are those slot values concatenated, each
//! element written at the record's byte order, with no padding.

use tracing::trace;

use crate::{
    compiled::{CompiledFieldKind, Role, Slot},
    dtype::{ByteOrder, ElementType},
    errors::{ReadError, WriteError},
    record::{Cell, Record},
};

/// Raw contents of one backing slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotValue {
    /// Elements of a plain, enum, or packed bitfield slot, as raw bits.
    Elements { dtype: ElementType, raw: Vec<u64> },
    /// Slot values of a nested record.
    Record(Vec<SlotValue>),
}

impl Record {
    /// Packs bitfields into their backing slots and returns one value per slot.
    ///
    /// Enum slots hold raw integers; a raw value outside the enum fails.
    pub fn value(&mut self) -> Result<Vec<SlotValue>, WriteError> {
        self.pack_bitfields();

        let schema = self.schema().clone();
        let mut values = Vec::with_capacity(schema.slots().len());

        for (s, slot) in schema.slots().iter().enumerate() {
            let value = match slot {
                Slot::Composite(i) => match &mut self.cells[*i] {
                    Cell::Record(record) => SlotValue::Record(record.value()?),
                    Cell::Scalar(_) => continue,
                },
                Slot::Packed(packed) => SlotValue::Elements {
                    dtype: packed.dtype,
                    raw: self.backing[s]
                        .as_ref()
                        .map(|array| array.raw().to_vec())
                        .unwrap_or_default(),
                },
                Slot::Plain(i) => {
                    let field = &schema.fields()[*i];
                    let (CompiledFieldKind::Scalar(scalar), Cell::Scalar(array)) =
                        (&field.kind, &self.cells[*i])
                    else {
                        continue;
                    };

                    if let Role::Enum(enum_type) = &scalar.role {
                        for &raw in array.raw() {
                            let value = scalar.dtype.to_value(raw).as_i128().unwrap_or_default();
                            let member = i64::try_from(value).is_ok_and(|v| enum_type.contains(v));
                            if !member {
                                return Err(WriteError::InvalidEnumValue {
                                    field: field.name.clone(),
                                    enumeration: enum_type.name().to_string(),
                                    value,
                                });
                            }
                        }
                    }

                    SlotValue::Elements {
                        dtype: scalar.dtype,
                        raw: array.raw().to_vec(),
                    }
                }
            };
            values.push(value);
        }

        Ok(values)
    }

    /// Assigns one value per slot, then refreshes every bitfield from its backing slot.
    ///
    /// On error the record is left unchanged.
    pub fn set_value(&mut self, values: Vec<SlotValue>) -> Result<(), ReadError> {
        let mut scratch = self.clone();
        scratch.assign_slots(values)?;
        *self = scratch;
        Ok(())
    }

    fn assign_slots(&mut self, values: Vec<SlotValue>) -> Result<(), ReadError> {
        let schema = self.schema().clone();
        if values.len() != schema.slots().len() {
            return Err(ReadError::SlotMismatch(values.len().min(schema.slots().len())));
        }

        for (s, (slot, value)) in schema.slots().iter().zip(values).enumerate() {
            match (slot, value) {
                (Slot::Composite(i), SlotValue::Record(nested)) => match &mut self.cells[*i] {
                    Cell::Record(record) => record.assign_slots(nested)?,
                    Cell::Scalar(_) => return Err(ReadError::SlotMismatch(s)),
                },
                (Slot::Packed(packed), SlotValue::Elements { dtype, raw }) => {
                    let target = self.backing[s].as_mut().ok_or(ReadError::SlotMismatch(s))?;
                    if dtype != packed.dtype || raw.len() != target.len() {
                        return Err(ReadError::SlotMismatch(s));
                    }
                    copy_masked(target.raw_mut(), &raw, dtype);
                }
                (Slot::Plain(i), SlotValue::Elements { dtype, raw }) => {
                    let CompiledFieldKind::Scalar(scalar) = &schema.fields()[*i].kind else {
                        return Err(ReadError::SlotMismatch(s));
                    };
                    let Cell::Scalar(target) = &mut self.cells[*i] else {
                        return Err(ReadError::SlotMismatch(s));
                    };
                    if dtype != scalar.dtype || raw.len() != target.len() {
                        return Err(ReadError::SlotMismatch(s));
                    }
                    copy_masked(target.raw_mut(), &raw, dtype);
                }
                _ => return Err(ReadError::SlotMismatch(s)),
            }
        }

        self.unpack_bitfields();
        Ok(())
    }

    /// Serializes the record at its byte order. Packs bitfields first.
    pub fn build(&mut self) -> Result<Vec<u8>, WriteError> {
        let values = self.value()?;
        let mut out = Vec::with_capacity(self.byte_size());
        encode_slots(&values, self.byte_order(), &mut out);

        trace!(record = %self.name(), bytes = out.len(), "built record");
        Ok(out)
    }

    /// Overwrites every field from `data`, which must be exactly [Record::byte_size] bytes.
    ///
    /// On error the record is left unchanged.
    pub fn unpack(&mut self, data: &[u8]) -> Result<(), ReadError> {
        let expected = self.byte_size();
        if data.len() != expected {
            return Err(ReadError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }

        let mut pos = 0;
        let values = self.decode_slots(data, &mut pos, self.byte_order());
        self.set_value(values)?;

        trace!(record = %self.name(), bytes = data.len(), "unpacked record");
        Ok(())
    }

    /// Reads slot values following this record's layout. `data` must hold at
    /// least the remaining byte size from `pos`.
    fn decode_slots(&self, data: &[u8], pos: &mut usize, order: ByteOrder) -> Vec<SlotValue> {
        let schema = self.schema();
        let mut values = Vec::with_capacity(schema.slots().len());

        for (s, slot) in schema.slots().iter().enumerate() {
            let (dtype, count) = match slot {
                Slot::Composite(i) => {
                    if let Cell::Record(record) = &self.cells[*i] {
                        values.push(SlotValue::Record(record.decode_slots(data, pos, order)));
                    }
                    continue;
                }
                Slot::Packed(packed) => (
                    packed.dtype,
                    self.backing[s].as_ref().map_or(0, |array| array.len()),
                ),
                Slot::Plain(i) => match (&schema.fields()[*i].kind, &self.cells[*i]) {
                    (CompiledFieldKind::Scalar(scalar), Cell::Scalar(array)) => {
                        (scalar.dtype, array.len())
                    }
                    _ => continue,
                },
            };

            let raw = (0..count)
                .map(|_| {
                    let element = dtype.decode(&data[*pos..], order);
                    *pos += dtype.size();
                    element
                })
                .collect();
            values.push(SlotValue::Elements { dtype, raw });
        }

        values
    }
}

fn copy_masked(target: &mut [u64], raw: &[u64], dtype: ElementType) {
    for (slot, &value) in target.iter_mut().zip(raw) {
        *slot = value & dtype.max_raw();
    }
}

/// Writes slot values in order, each element at `order`.
pub fn encode_slots(values: &[SlotValue], order: ByteOrder, out: &mut Vec<u8>) {
    for value in values {
        match value {
            SlotValue::Elements { dtype, raw } => {
                for &element in raw {
                    dtype.encode(element, order, out);
                }
            }
            SlotValue::Record(nested) => encode_slots(nested, order, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        dtype::Value,
        enumeration::EnumType,
        errors::WriteError,
        field::Field,
        schema::Schema,
    };

    use super::*;

    fn nibbles() -> Arc<Schema> {
        Schema::compile(
            "Nibbles",
            &[
                Field::bits("lo", ElementType::U8, 4),
                Field::bits("hi", ElementType::U8, 4),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_build_packs_bitfields() {
        let mut record = Record::new(&nibbles());
        record.set("lo", 0b1010u8).unwrap();
        record.set("hi", 0b0011u8).unwrap();
        assert_eq!(record.build().unwrap(), vec![0x3A]);
    }

    #[test]
    fn test_value_slots() {
        let schema = Schema::compile(
            "Pair",
            &[
                Field::scalar("a", ElementType::U16).with_default(5u16),
                Field::record("n", Record::new(&nibbles())),
            ],
        )
        .unwrap();
        let mut record = Record::new(&schema);
        record.record_mut("n").unwrap().set("hi", 1u8).unwrap();

        assert_eq!(
            record.value().unwrap(),
            vec![
                SlotValue::Elements {
                    dtype: ElementType::U16,
                    raw: vec![5]
                },
                SlotValue::Record(vec![SlotValue::Elements {
                    dtype: ElementType::U8,
                    raw: vec![0x10]
                }]),
            ]
        );
    }

    #[test]
    fn test_set_value_refreshes_bitfields() {
        let mut record = Record::new(&nibbles());
        record
            .set_value(vec![SlotValue::Elements {
                dtype: ElementType::U8,
                raw: vec![0xC5],
            }])
            .unwrap();
        assert_eq!(record.get("lo").unwrap(), Value::U64(5));
        assert_eq!(record.get("hi").unwrap(), Value::U64(12));
    }

    #[test]
    fn test_set_value_mismatch_leaves_record() {
        let mut record = Record::new(&nibbles());
        record.set("lo", 3u8).unwrap();
        let err = record
            .set_value(vec![SlotValue::Elements {
                dtype: ElementType::U16,
                raw: vec![1],
            }])
            .unwrap_err();
        assert_eq!(err, ReadError::SlotMismatch(0));
        assert_eq!(record.get("lo").unwrap(), Value::U64(3));
    }

    #[test]
    fn test_unpack_length_mismatch() {
        let mut record = Record::new(&nibbles());
        assert_eq!(
            record.unpack(&[1, 2]).unwrap_err(),
            ReadError::LengthMismatch {
                expected: 1,
                actual: 2
            }
        );
        assert!(record.unpack(&[]).is_err());
    }

    #[test]
    fn test_big_endian_elements() {
        let schema = Schema::compile(
            "Words",
            &[
                Field::scalar("a", ElementType::U16).with_default(0x0102u16),
                Field::scalar("b", ElementType::I32).with_default(-2i32),
            ],
        )
        .unwrap();
        let mut record = Record::new(&schema);
        assert_eq!(record.build().unwrap(), vec![0x02, 0x01, 0xFE, 0xFF, 0xFF, 0xFF]);

        record.set_byte_order(ByteOrder::Big);
        let bytes = record.build().unwrap();
        assert_eq!(bytes, vec![0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFE]);

        let mut copy = Record::new(&schema);
        copy.set_byte_order(ByteOrder::Big);
        copy.set("a", 0u16).unwrap();
        copy.unpack(&bytes).unwrap();
        assert_eq!(copy.get("a").unwrap(), Value::U64(0x0102));
        assert_eq!(copy.get("b").unwrap(), Value::I64(-2));
    }

    #[test]
    fn test_floats() {
        let schema = Schema::compile(
            "Floats",
            &[
                Field::scalar("x", ElementType::F32).with_default(1.5f32),
                Field::scalar("y", ElementType::F64).with_default(-0.25f64),
            ],
        )
        .unwrap();
        let mut record = Record::new(&schema);
        let bytes = record.build().unwrap();
        assert_eq!(&bytes[..4], &1.5f32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-0.25f64).to_le_bytes());

        let mut other = Record::new(&schema);
        other.set("x", 0.0f32).unwrap();
        other.unpack(&bytes).unwrap();
        assert_eq!(other.get("x").unwrap(), Value::F32(1.5));
    }

    #[test]
    fn test_invalid_enum_fails_build() {
        let status = EnumType::new("Status", [("OK", 0), ("FAIL", 1)]).unwrap();
        let schema = Schema::compile(
            "Reply",
            &[Field::enumeration("status", ElementType::U8, status)],
        )
        .unwrap();
        let mut record = Record::new(&schema);
        record.set("status", 2u8).unwrap();
        assert_eq!(
            record.build().unwrap_err(),
            WriteError::InvalidEnumValue {
                field: "status".to_string(),
                enumeration: "Status".to_string(),
                value: 2
            }
        );
    }

    #[test]
    fn test_invalid_wide_enum_reports_unsigned_value() {
        let status = EnumType::new("Status", [("OK", 0)]).unwrap();
        let schema = Schema::compile(
            "Reply",
            &[Field::enumeration("status", ElementType::U64, status)],
        )
        .unwrap();
        let mut record = Record::new(&schema);
        record.set("status", u64::MAX).unwrap();
        assert_eq!(record.get("status").unwrap(), Value::U64(u64::MAX));
        assert_eq!(
            record.build().unwrap_err(),
            WriteError::InvalidEnumValue {
                field: "status".to_string(),
                enumeration: "Status".to_string(),
                value: u64::MAX as i128
            }
        );
    }

    #[test]
    fn test_padding_bits_survive_unpack() {
        let schema = Schema::compile(
            "Sparse",
            &[Field::bits("flag", ElementType::U8, 1)],
        )
        .unwrap();
        let mut record = Record::new(&schema);
        record.unpack(&[0xF0]).unwrap();
        assert_eq!(record.get("flag").unwrap(), Value::U64(0));

        record.set("flag", 1u8).unwrap();
        assert_eq!(record.build().unwrap(), vec![0xF1]);
    }
}
