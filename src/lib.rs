//! # structcraft
//!
//! Declarative fixed-layout binary records.
//!
//! Declare a struct once as a list of [Field]s (scalars and arrays of fixed
//! width, sub-byte bitfields, enum fields, nested records), compile it into a
//! [Schema], then create [Record]s from it. Each record serializes to and from
//! exactly [Record::byte_size] bytes in its [ByteOrder], and prints a
//! readable dump through [std::fmt::Display].
//!
//! Consecutive bitfields of the same element type share one backing element,
//! filled from bit 0 upwards. Their values are written into the backing
//! element when the record is built and read back when it is unpacked.
//!
//! ## Example
//!
//! ```
//! use structcraft::{ByteOrder, ElementType, EnumType, Field, Record, Schema, Value};
//!
//! let status = EnumType::new("Status", [("OK", 0), ("FAIL", 1)]).unwrap();
//! let schema = Schema::compile(
//!     "Header",
//!     &[
//!         Field::bits("lo", ElementType::U8, 4),
//!         Field::bits("hi", ElementType::U8, 4),
//!         Field::enumeration("status", ElementType::U8, status),
//!         Field::scalar("length", ElementType::U16),
//!     ],
//! )
//! .unwrap();
//!
//! let mut header = Record::new(&schema);
//! header.set("lo", 0b1010u8).unwrap();
//! header.set("hi", 0b0011u8).unwrap();
//! header.set("status", "FAIL").unwrap();
//! header.set("length", 0x0102u16).unwrap();
//! header.set_byte_order(ByteOrder::Big);
//!
//! let bytes = header.build().unwrap();
//! assert_eq!(bytes, vec![0x3A, 0x01, 0x01, 0x02]);
//!
//! let mut copy = Record::new(&schema);
//! copy.set_byte_order(ByteOrder::Big);
//! copy.unpack(&bytes).unwrap();
//! assert_eq!(copy.get("hi").unwrap(), Value::U64(3));
//! assert_eq!(copy.get("status").unwrap(), Value::Symbol("FAIL".to_string()));
//! ```

pub mod array;
pub mod bits;
pub mod codec;
pub mod compiled;
pub mod dtype;
pub mod enumeration;
pub mod errors;
pub mod field;
mod format;
pub mod record;
pub mod schema;
#[cfg(feature = "serde")]
pub mod serde;

pub use codec::SlotValue;
pub use dtype::{ByteOrder, ElementType, Value};
pub use enumeration::EnumType;
pub use errors::{CompileError, ConstructError, Error, FieldError, ReadError, Result, WriteError};
pub use field::{Annotation, Field};
pub use record::{Record, RecordOptions};
pub use schema::Schema;
