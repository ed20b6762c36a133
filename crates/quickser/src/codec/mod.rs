//! Binary encoding/decoding of object graphs.
//!
//! Objects are written field-by-field against their class schema; field
//! values go through a tagged value codec that recurses into nested objects
//! and emits back-references for objects already written in the same call.

pub mod frame;
pub mod object;
pub mod primitives;
pub mod stack;
pub mod value;

pub use frame::{
    CodecOptions, decode, decode_with_options, decompress, encode, encode_compressed,
    encode_with_options,
};
pub use object::{ObjectDecoder, ObjectEncoder};
pub use primitives::{Reader, Writer, zigzag_decode, zigzag_encode};
pub use stack::IdentityStack;
