//! Value encoding.
//!
//! Every value starts with a one-byte tag:
//!
//! | Tag | Value    | Payload                                          |
//! |-----|----------|--------------------------------------------------|
//! | 0   | null     |                                                  |
//! | 1   | false    |                                                  |
//! | 2   | true     |                                                  |
//! | 3   | int      | signed varint                                    |
//! | 4   | float    | f64 little-endian                                |
//! | 5   | char     | varint code point                                |
//! | 6   | text     | varint length + UTF-8                            |
//! | 7   | bytes    | varint length + bytes                            |
//! | 8   | date     | signed varint milliseconds since the Unix epoch  |
//! | 9   | decimal  | signed varint scale + varint length + mantissa   |
//! | 10  | list     | varint count + values                            |
//! | 11  | map      | varint count + key/value pairs                   |
//! | 12  | object   | object payload                                   |
//! | 13  | backref  | varint identity stack position                   |

use crate::codec::object::{ObjectDecoder, ObjectEncoder};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_BYTES_LEN, MAX_COLLECTION_LEN, MAX_STRING_LEN};
use crate::model::{Decimal, Value};

pub(crate) const TAG_NULL: u8 = 0;
pub(crate) const TAG_FALSE: u8 = 1;
pub(crate) const TAG_TRUE: u8 = 2;
pub(crate) const TAG_INT: u8 = 3;
pub(crate) const TAG_FLOAT: u8 = 4;
pub(crate) const TAG_CHAR: u8 = 5;
pub(crate) const TAG_TEXT: u8 = 6;
pub(crate) const TAG_BYTES: u8 = 7;
pub(crate) const TAG_DATE: u8 = 8;
pub(crate) const TAG_DECIMAL: u8 = 9;
pub(crate) const TAG_LIST: u8 = 10;
pub(crate) const TAG_MAP: u8 = 11;
pub(crate) const TAG_OBJECT: u8 = 12;
pub(crate) const TAG_BACKREF: u8 = 13;

fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), EncodeError> {
    if len > max {
        return Err(EncodeError::LengthExceedsLimit { field, len, max });
    }
    Ok(())
}

impl ObjectEncoder<'_> {
    /// Writes one tagged value.
    ///
    /// An object already written in this call becomes a back-reference.
    pub fn write_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Null => self.writer.write_byte(TAG_NULL),
            Value::Bool(false) => self.writer.write_byte(TAG_FALSE),
            Value::Bool(true) => self.writer.write_byte(TAG_TRUE),
            Value::Int(v) => {
                self.writer.write_byte(TAG_INT);
                self.writer.write_signed_varint(*v);
            }
            Value::Float(v) => {
                self.writer.write_byte(TAG_FLOAT);
                self.writer.write_f64(*v);
            }
            Value::Char(c) => {
                self.writer.write_byte(TAG_CHAR);
                self.writer.write_varint(u64::from(*c));
            }
            Value::Text(s) => {
                check_len("text", s.len(), MAX_STRING_LEN)?;
                self.writer.write_byte(TAG_TEXT);
                self.writer.write_string(s);
            }
            Value::Bytes(b) => {
                check_len("bytes", b.len(), MAX_BYTES_LEN)?;
                self.writer.write_byte(TAG_BYTES);
                self.writer.write_bytes_prefixed(b);
            }
            Value::Date(millis) => {
                self.writer.write_byte(TAG_DATE);
                self.writer.write_signed_varint(*millis);
            }
            Value::Decimal(d) => {
                check_len("decimal", d.unscaled.len(), MAX_BYTES_LEN)?;
                self.writer.write_byte(TAG_DECIMAL);
                self.writer.write_signed_varint(i64::from(d.scale));
                self.writer.write_bytes_prefixed(&d.unscaled);
            }
            Value::List(items) => {
                check_len("list", items.len(), MAX_COLLECTION_LEN)?;
                self.writer.write_byte(TAG_LIST);
                self.writer.write_varint(items.len() as u64);
                self.enter()?;
                for item in items {
                    self.write_value(item)?;
                }
                self.depth -= 1;
            }
            Value::Map(entries) => {
                check_len("map", entries.len(), MAX_COLLECTION_LEN)?;
                self.writer.write_byte(TAG_MAP);
                self.writer.write_varint(entries.len() as u64);
                self.enter()?;
                for (key, value) in entries {
                    self.write_value(key)?;
                    self.write_value(value)?;
                }
                self.depth -= 1;
            }
            Value::Object(obj) => match self.stack.position_of(obj) {
                Some(position) => {
                    self.writer.write_byte(TAG_BACKREF);
                    self.writer.write_varint(position as u64);
                }
                None => {
                    self.writer.write_byte(TAG_OBJECT);
                    self.write_object(obj)?;
                }
            },
        }
        Ok(())
    }
}

impl ObjectDecoder<'_, '_> {
    /// Reads one tagged value.
    pub fn read_value(&mut self) -> Result<Value, DecodeError> {
        let tag = self.reader.read_byte("value tag")?;
        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_FALSE => Value::Bool(false),
            TAG_TRUE => Value::Bool(true),
            TAG_INT => Value::Int(self.reader.read_signed_varint("int")?),
            TAG_FLOAT => Value::Float(self.reader.read_f64("float")?),
            TAG_CHAR => {
                let raw = self.reader.read_varint("char")?;
                let c = u32::try_from(raw)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(DecodeError::MalformedEncoding {
                        context: "char is not a Unicode scalar value",
                    })?;
                Value::Char(c)
            }
            TAG_TEXT => Value::Text(self.reader.read_string(MAX_STRING_LEN, "text")?),
            TAG_BYTES => Value::Bytes(self.reader.read_bytes_prefixed(MAX_BYTES_LEN, "bytes")?),
            TAG_DATE => Value::Date(self.reader.read_signed_varint("date")?),
            TAG_DECIMAL => {
                let scale = self.reader.read_signed_varint("decimal scale")?;
                let scale = i32::try_from(scale).map_err(|_| DecodeError::MalformedEncoding {
                    context: "decimal scale out of range",
                })?;
                let unscaled = self.reader.read_bytes_prefixed(MAX_BYTES_LEN, "decimal")?;
                Value::Decimal(Decimal { unscaled, scale })
            }
            TAG_LIST => {
                let len = self.reader.read_len(MAX_COLLECTION_LEN, "list")?;
                self.enter()?;
                // Every element takes at least one byte
                let mut items = Vec::with_capacity(len.min(self.reader.remaining_len()));
                for _ in 0..len {
                    items.push(self.read_value()?);
                }
                self.depth -= 1;
                Value::List(items)
            }
            TAG_MAP => {
                let len = self.reader.read_len(MAX_COLLECTION_LEN, "map")?;
                self.enter()?;
                let mut entries = Vec::with_capacity(len.min(self.reader.remaining_len() / 2));
                for _ in 0..len {
                    let key = self.read_value()?;
                    let value = self.read_value()?;
                    entries.push((key, value));
                }
                self.depth -= 1;
                Value::Map(entries)
            }
            TAG_OBJECT => Value::Object(self.read_object()?),
            TAG_BACKREF => {
                let position = self.reader.read_varint("back-reference")?;
                let obj = usize::try_from(position)
                    .ok()
                    .and_then(|p| self.stack.get(p))
                    .cloned()
                    .ok_or(DecodeError::BackReferenceOutOfRange {
                        position,
                        size: self.stack.len(),
                    })?;
                Value::Object(obj)
            }
            tag => return Err(DecodeError::InvalidTag { tag }),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectRef;
    use crate::schema::ClassRegistry;
    use proptest::prelude::*;

    fn roundtrip(value: &Value) -> Value {
        let registry = ClassRegistry::new();
        let mut encoder = ObjectEncoder::new(&registry);
        encoder.write_value(value).unwrap();
        let bytes = encoder.into_bytes();

        let mut decoder = ObjectDecoder::new(&registry, &bytes);
        let decoded = decoder.read_value().unwrap();
        assert!(decoder.reader().is_empty());
        decoded
    }

    #[test]
    fn test_scalar_tags() {
        let registry = ClassRegistry::new();
        let mut encoder = ObjectEncoder::new(&registry);
        encoder.write_value(&Value::Null).unwrap();
        encoder.write_value(&Value::Bool(true)).unwrap();
        encoder.write_value(&Value::Int(-1)).unwrap();
        encoder.write_value(&Value::Char('A')).unwrap();
        assert_eq!(
            encoder.into_bytes(),
            [TAG_NULL, TAG_TRUE, TAG_INT, 1, TAG_CHAR, 65]
        );
    }

    #[test]
    fn test_nested_collections() {
        let value = Value::Map(vec![
            (
                Value::Text("primes".into()),
                Value::List(vec![Value::Int(2), Value::Int(3), Value::Int(5)]),
            ),
            (Value::Int(7), Value::Decimal(Decimal::from_i128(-12345, 2))),
            (Value::Date(-86_400_000), Value::Bytes(vec![0, 255])),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_repeated_object_becomes_backref() {
        let registry = ClassRegistry::new();
        registry.bind::<crate::fixtures::Person>().unwrap();
        let person = ObjectRef::new(crate::fixtures::Person::default());

        let mut encoder = ObjectEncoder::new(&registry);
        let list = Value::List(vec![Value::Object(person.clone()), Value::Object(person)]);
        encoder.write_value(&list).unwrap();
        let bytes = encoder.into_bytes();
        assert_eq!(&bytes[bytes.len() - 2..], [TAG_BACKREF, 0]);

        let mut decoder = ObjectDecoder::new(&registry, &bytes);
        let Value::List(items) = decoder.read_value().unwrap() else {
            panic!("expected list");
        };
        assert_eq!(items[0], items[1]);
        assert_eq!(decoder.stack().len(), 1);
    }

    #[test]
    fn test_malformed_values() {
        let registry = ClassRegistry::new();
        let cases: [(&[u8], DecodeError); 4] = [
            (&[42], DecodeError::InvalidTag { tag: 42 }),
            (&[TAG_TEXT, 2, 0xC3], DecodeError::UnexpectedEof { context: "text" }),
            (&[TAG_TEXT, 1, 0xFF], DecodeError::InvalidUtf8 { field: "text" }),
            (
                &[TAG_CHAR, 0x80, 0xB0, 0x03],
                DecodeError::MalformedEncoding {
                    context: "char is not a Unicode scalar value",
                },
            ),
        ];
        for (bytes, expected) in cases {
            assert_eq!(ObjectDecoder::new(&registry, bytes).read_value(), Err(expected));
        }
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<f64>()
                .prop_filter("NaN never equals itself", |f| !f.is_nan())
                .prop_map(Value::Float),
            any::<char>().prop_map(Value::Char),
            ".{0,24}".prop_map(Value::Text),
            proptest::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
            any::<i64>().prop_map(Value::Date),
            (any::<i64>(), -20i32..20)
                .prop_map(|(m, s)| Value::Decimal(Decimal::from_i128(i128::from(m), s))),
        ]
    }

    fn any_value() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
                proptest::collection::vec((inner.clone(), inner), 0..4).prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn test_value_roundtrip(value in any_value()) {
            prop_assert_eq!(roundtrip(&value), value);
        }
    }
}
