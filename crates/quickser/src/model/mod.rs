//! Data model types for quickser.
//!
//! - Object handles (shared graph nodes)
//! - Values (what the value codec carries)
//! - Field conversions (typed Rust fields to and from values)

pub mod field;
pub mod object;
pub mod value;

pub use field::{Bytes, FieldValue};
pub use object::ObjectRef;
pub(crate) use object::AnyBox;
pub use value::{Decimal, Value};
