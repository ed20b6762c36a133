//! Dynamic values carried by the value codec.
//!
//! Every field of a serialized object travels as a [`Value`]; nested
//! user-defined objects appear as [`Value::Object`].

use crate::model::ObjectRef;

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Text(String),
    Bytes(Vec<u8>),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    Decimal(Decimal),
    List(Vec<Value>),
    /// Entries in insertion order.
    Map(Vec<(Value, Value)>),
    Object(ObjectRef),
}

impl Value {
    /// Short label of the variant, used in error messages.
    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Decimal(_) => "decimal",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    /// Returns the object handle if this is an object value.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

/// Arbitrary-precision decimal: `unscaled * 10^-scale`.
///
/// `unscaled` is a big-endian two's-complement integer. Integers of any size
/// are decimals with scale 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub unscaled: Vec<u8>,
    pub scale: i32,
}

impl Decimal {
    /// Creates a decimal from an `i128` mantissa, using the minimal byte form.
    pub fn from_i128(unscaled: i128, scale: i32) -> Self {
        let bytes = unscaled.to_be_bytes();
        // Strip redundant sign-extension bytes
        let mut start = 0;
        while start < bytes.len() - 1 {
            let (b, next) = (bytes[start], bytes[start + 1]);
            if (b == 0x00 && next & 0x80 == 0) || (b == 0xFF && next & 0x80 != 0) {
                start += 1;
            } else {
                break;
            }
        }
        Self {
            unscaled: bytes[start..].to_vec(),
            scale,
        }
    }

    /// Returns the mantissa as an `i128` if it fits.
    pub fn to_i128(&self) -> Option<i128> {
        if self.unscaled.is_empty() {
            return Some(0);
        }
        if self.unscaled.len() > 16 {
            return None;
        }
        let fill = if self.unscaled[0] & 0x80 != 0 { 0xFF } else { 0x00 };
        let mut buf = [fill; 16];
        buf[16 - self.unscaled.len()..].copy_from_slice(&self.unscaled);
        Some(i128::from_be_bytes(buf))
    }
}
