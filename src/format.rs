//! Human-readable dump of a record.
//!
//! ```text
//! Header (x3A0300):
//!     lo:     uint8(3:0)[10] (0x0A)
//!     hi:     uint8(7:4)[3] (0x03)
//!     count:  uint16[3] (0x0300)
//! ```

use std::fmt::{self, Display, Write};

use crate::{
    codec::encode_slots,
    compiled::{CompiledFieldKind, CompiledScalar, Role},
    dtype::{ByteOrder, Value},
    record::{Cell, Record},
};

/// Hex dumps longer than this many characters (8 bytes) are omitted.
const MAX_HEX_LEN: usize = 17;

impl Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_dump(f, "", self.byte_order())
    }
}

impl Record {
    /// Nested records are dumped at `order`, the byte order of the outermost
    /// record, so every hex snippet matches the built bytes.
    fn write_dump(&self, f: &mut impl Write, indent: &str, order: ByteOrder) -> fmt::Result {
        write!(f, "{}", self.name())?;
        // Packing bitfields mutates, so dump a copy.
        if let Ok(values) = self.clone().value() {
            let mut bytes = Vec::with_capacity(self.byte_size());
            encode_slots(&values, order, &mut bytes);
            write_hex(f, "x", &bytes)?;
        }
        write!(f, ":")?;

        let indent = format!("{indent}    ");
        let width = self.schema().print_width();

        for (field, cell) in self.schema().fields().iter().zip(&self.cells) {
            let pad = width - field.name.len() - 1;
            write!(f, "\n{indent}{}:{:pad$}", field.name, "")?;

            match (&field.kind, cell) {
                (CompiledFieldKind::Composite(_), Cell::Record(record)) => {
                    let nested = format!("{indent}{:width$}", "");
                    record.write_dump(f, &nested, order)?;
                }
                (CompiledFieldKind::Scalar(scalar), Cell::Scalar(array)) => {
                    write_scalar(f, scalar, array.raw(), order)?;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn write_scalar(
    f: &mut impl Write,
    scalar: &CompiledScalar,
    raw: &[u64],
    order: ByteOrder,
) -> fmt::Result {
    write!(f, "{}", scalar.dtype.name())?;

    let items: Vec<String> = match &scalar.role {
        Role::Bits(slice) => {
            write!(f, "({}:{})", slice.start, slice.stop)?;
            raw.iter()
                .map(|&r| format_value(&scalar.role.decode(scalar.dtype, r)))
                .collect()
        }
        Role::Enum(enum_type) => raw
            .iter()
            .map(|&r| match scalar.role.decode(scalar.dtype, r) {
                Value::Symbol(member) => format!("{}::{}", enum_type.name(), member),
                other => format!("{}({})", enum_type.name(), format_value(&other)),
            })
            .collect(),
        Role::Plain => raw
            .iter()
            .map(|&r| format_value(&scalar.dtype.to_value(r)))
            .collect(),
    };

    if matches!(scalar.role, Role::Enum(_)) {
        write!(f, "[{}]", items.join(", "))?;
    } else {
        write!(f, "[{}]", items.join(" "))?;
    }

    let mut bytes = Vec::with_capacity(raw.len() * scalar.dtype.size());
    for &r in raw {
        let element = scalar.role.element_raw(scalar.dtype, r);
        scalar.dtype.encode(element, order, &mut bytes);
    }
    write_hex(f, "0x", &bytes)
}

fn format_value(value: &Value) -> String {
    match value {
        Value::U64(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Symbol(s) => s.clone(),
        Value::Array(values) => {
            let items: Vec<String> = values.iter().map(format_value).collect();
            format!("[{}]", items.join(" "))
        }
    }
}

fn write_hex(f: &mut impl Write, prefix: &str, bytes: &[u8]) -> fmt::Result {
    if prefix.len() + bytes.len() * 2 > MAX_HEX_LEN {
        return Ok(());
    }

    write!(f, " ({prefix}")?;
    for byte in bytes {
        write!(f, "{byte:02X}")?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        dtype::{ByteOrder, ElementType},
        enumeration::EnumType,
        field::Field,
        schema::Schema,
    };

    use super::*;

    fn header() -> Arc<Schema> {
        Schema::compile(
            "Header",
            &[
                Field::bits("lo", ElementType::U8, 4).with_default(10u8),
                Field::bits("hi", ElementType::U8, 4).with_default(3u8),
                Field::scalar("count", ElementType::U16).with_default(3u16),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_dump() {
        let record = Record::new(&header());
        let expected = "Header (x3A0300):\n\
                        \x20   lo:     uint8(3:0)[10] (0x0A)\n\
                        \x20   hi:     uint8(7:4)[3] (0x03)\n\
                        \x20   count:  uint16[3] (0x0300)";
        assert_eq!(record.to_string(), expected);
    }

    #[test]
    fn test_dump_big_endian_hex() {
        let mut record = Record::new(&header());
        record.set_byte_order(ByteOrder::Big);
        assert!(record.to_string().contains("uint16[3] (0x0003)"));
    }

    #[test]
    fn test_dump_nested_and_enum() {
        let status = EnumType::new("Status", [("OK", 0), ("FAIL", 1)]).unwrap();
        let schema = Schema::compile(
            "Reply",
            &[
                Field::enumeration("status", ElementType::U8, status).with_default("FAIL"),
                Field::record("hdr", Record::new(&header())),
            ],
        )
        .unwrap();
        let mut record = Record::new(&schema);

        let dump = record.to_string();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], "Reply (x013A0300):");
        assert_eq!(lines[1], "    status:  uint8[Status::FAIL] (0x01)");
        assert_eq!(lines[2], "    hdr:     Header (x3A0300):");
        assert_eq!(
            lines[3],
            format!("{}lo:     uint8(3:0)[10] (0x0A)", " ".repeat(17))
        );

        record.set("status", 7u8).unwrap();
        let dump = record.to_string();
        assert!(dump.starts_with("Reply:"));
        assert!(dump.contains("uint8[Status(7)]"));
    }

    #[test]
    fn test_dump_nested_uses_outer_byte_order() {
        let inner = Schema::compile(
            "Inner",
            &[Field::scalar("w", ElementType::U16).with_default(0x0102u16)],
        )
        .unwrap();
        let outer =
            Schema::compile("Outer", &[Field::record("inner", Record::new(&inner))]).unwrap();
        let mut record = Record::new(&outer);
        record.set_byte_order(ByteOrder::Big);
        record
            .record_mut("inner")
            .unwrap()
            .set_byte_order(ByteOrder::Little);

        assert_eq!(record.build().unwrap(), vec![0x01, 0x02]);
        let dump = record.to_string();
        assert!(dump.starts_with("Outer (x0102):"));
        assert!(dump.contains("Inner (x0102):"));
        assert!(dump.contains("uint16[258] (0x0102)"));

        // Dumped alone, the nested record uses its own order.
        let alone = record.record("inner").unwrap().to_string();
        assert!(alone.starts_with("Inner (x0201):"));
    }

    #[test]
    fn test_dump_omits_long_hex() {
        let schema = Schema::compile(
            "Wide",
            &[Field::scalar("data", ElementType::U32).with_shape([3])],
        )
        .unwrap();
        let dump = Record::new(&schema).to_string();
        assert_eq!(dump, "Wide:\n    data:  uint32[0 0 0]");
    }

    #[test]
    fn test_dump_does_not_pack() {
        let mut record = Record::new(&header());
        record.set("lo", 1u8).unwrap();
        let _ = record.to_string();
        assert_eq!(record.backing[0].as_ref().unwrap().raw(), &[10]);
    }
}
