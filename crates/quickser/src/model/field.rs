//! Conversions between typed Rust fields and [`Value`].

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::AccessError;
use crate::model::{Decimal, ObjectRef, Value};

/// A Rust type that can be stored in a serializable field.
///
/// `TYPE_NAME` becomes the declared type name of the field's schema entry,
/// and `PRIMITIVE` its primitive flag.
pub trait FieldValue: Sized + Send + Sync + 'static {
    const TYPE_NAME: &'static str;
    const PRIMITIVE: bool = false;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, AccessError>;
}

fn mismatch(expected: &'static str, found: &Value) -> AccessError {
    AccessError::TypeMismatch {
        expected,
        found: found.type_label(),
    }
}

impl FieldValue for bool {
    const TYPE_NAME: &'static str = "bool";
    const PRIMITIVE: bool = true;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

macro_rules! int_field {
    ($($ty:ty => $name:literal),* $(,)?) => {$(
        impl FieldValue for $ty {
            const TYPE_NAME: &'static str = $name;
            const PRIMITIVE: bool = true;

            fn to_value(&self) -> Value {
                Value::Int(i64::from(*self))
            }

            fn from_value(value: Value) -> Result<Self, AccessError> {
                match value {
                    Value::Int(v) => <$ty>::try_from(v).map_err(|_| AccessError::OutOfRange {
                        value: v.to_string(),
                        target: $name,
                    }),
                    other => Err(mismatch($name, &other)),
                }
            }
        }
    )*};
}

int_field! {
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
}

impl FieldValue for f64 {
    const TYPE_NAME: &'static str = "f64";
    const PRIMITIVE: bool = true;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl FieldValue for f32 {
    const TYPE_NAME: &'static str = "f32";
    const PRIMITIVE: bool = true;

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            #[allow(clippy::cast_possible_truncation)]
            Value::Float(v) => Ok(v as f32),
            other => Err(mismatch("f32", &other)),
        }
    }
}

impl FieldValue for char {
    const TYPE_NAME: &'static str = "char";
    const PRIMITIVE: bool = true;

    fn to_value(&self) -> Value {
        Value::Char(*self)
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Char(c) => Ok(c),
            other => Err(mismatch("char", &other)),
        }
    }
}

impl FieldValue for String {
    const TYPE_NAME: &'static str = "string";

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

/// A byte blob field.
///
/// `Vec<u8>` is a list of integers on the wire; wrap it in `Bytes` to use
/// the byte blob encoding instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FieldValue for Bytes {
    const TYPE_NAME: &'static str = "bytes";

    fn to_value(&self) -> Value {
        Value::Bytes(self.0.clone())
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Bytes(b) => Ok(Self(b)),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl FieldValue for Decimal {
    const TYPE_NAME: &'static str = "decimal";

    fn to_value(&self) -> Value {
        Value::Decimal(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Decimal(d) => Ok(d),
            other => Err(mismatch("decimal", &other)),
        }
    }
}

/// Dates travel as whole milliseconds relative to the Unix epoch.
impl FieldValue for SystemTime {
    const TYPE_NAME: &'static str = "date";

    fn to_value(&self) -> Value {
        let millis = match self.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_millis())
                .map(|m| -m)
                .unwrap_or(i64::MIN),
        };
        Value::Date(millis)
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Date(millis) => {
                let offset = Duration::from_millis(millis.unsigned_abs());
                let time = if millis >= 0 {
                    UNIX_EPOCH.checked_add(offset)
                } else {
                    UNIX_EPOCH.checked_sub(offset)
                };
                time.ok_or_else(|| AccessError::OutOfRange {
                    value: millis.to_string(),
                    target: "date",
                })
            }
            other => Err(mismatch("date", &other)),
        }
    }
}

impl FieldValue for ObjectRef {
    const TYPE_NAME: &'static str = "object";

    fn to_value(&self) -> Value {
        Value::Object(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Object(obj) => Ok(obj),
            other => Err(mismatch("object", &other)),
        }
    }
}

/// Untyped slot: any value is accepted as-is.
impl FieldValue for Value {
    const TYPE_NAME: &'static str = "any";

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        Ok(value)
    }
}

/// `None` travels as null; the declared type is the inner type's.
impl<T: FieldValue> FieldValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    const TYPE_NAME: &'static str = "list";

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<K, V> FieldValue for HashMap<K, V>
where
    K: FieldValue + Eq + Hash,
    V: FieldValue,
{
    const TYPE_NAME: &'static str = "map";

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            other => Err(mismatch("map", &other)),
        }
    }
}

impl<K, V> FieldValue for BTreeMap<K, V>
where
    K: FieldValue + Ord,
    V: FieldValue,
{
    const TYPE_NAME: &'static str = "sorted_map";

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            other => Err(mismatch("sorted_map", &other)),
        }
    }
}
