//! Error types for encoding, decoding and field access.

use thiserror::Error;

/// Broad error categories with stable codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Q001: Type is not bound as serializable
    NotSerializable,
    /// Q002: Stored type name has no live type
    ClassResolution,
    /// Q003: Class id, field id, ordinal or back-reference out of range
    SchemaCorruption,
    /// Q004: Getter or setter invocation failed
    AccessorFault,
    /// Q005: Blank instance could not be created
    InstantiationFault,
    /// Q006: Malformed varint/length/tag or exceeded limit
    MalformedEncoding,
    /// Q007: Compression or decompression failed
    Compression,
}

impl ErrorKind {
    /// Returns the error code string (e.g., "Q001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotSerializable => "Q001",
            ErrorKind::ClassResolution => "Q002",
            ErrorKind::SchemaCorruption => "Q003",
            ErrorKind::AccessorFault => "Q004",
            ErrorKind::InstantiationFault => "Q005",
            ErrorKind::MalformedEncoding => "Q006",
            ErrorKind::Compression => "Q007",
        }
    }
}

/// Cause of a failed getter or setter invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
    #[error("no getter, setter or field is reachable under this name")]
    Unresolved,

    #[error("receiver is not a {expected}")]
    WrongReceiver { expected: &'static str },

    #[error("expected {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error("{0}")]
    Rejected(String),
}

/// Error during encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    // === Q001 ===
    #[error("[Q001] type {type_name} is not serializable (no binding registered)")]
    NotSerializable { type_name: String },

    #[error("[Q001] type name {name:?} is already bound to a different type")]
    DuplicateTypeName { name: String },

    // === Q003 ===
    #[error("[Q003] {class} conflicts with its stored schema: {reason}")]
    SchemaConflict { class: String, reason: &'static str },

    #[error("[Q003] ordinal of {class} is outside its constant table ({constants} constants)")]
    InvalidOrdinal { class: String, constants: usize },

    // === Q004 ===
    #[error("[Q004] cannot read {class}.{field}: {source}")]
    AccessorFault {
        class: String,
        field: String,
        #[source]
        source: AccessError,
    },

    // === Q006 ===
    #[error("[Q006] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[Q006] object graph nesting exceeds maximum depth {max}")]
    DepthExceeded { max: usize },

    // === Q007 ===
    #[error("[Q007] zstd compression failed: {0}")]
    CompressionFailed(String),
}

impl EncodeError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EncodeError::NotSerializable { .. } | EncodeError::DuplicateTypeName { .. } => {
                ErrorKind::NotSerializable
            }
            EncodeError::SchemaConflict { .. } | EncodeError::InvalidOrdinal { .. } => {
                ErrorKind::SchemaCorruption
            }
            EncodeError::AccessorFault { .. } => ErrorKind::AccessorFault,
            EncodeError::LengthExceedsLimit { .. } | EncodeError::DepthExceeded { .. } => {
                ErrorKind::MalformedEncoding
            }
            EncodeError::CompressionFailed(_) => ErrorKind::Compression,
        }
    }
}

/// Error during decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === Q002: Class resolution ===
    #[error("[Q002] no live type is bound to stored class name {name:?}")]
    ClassResolution { name: String },

    // === Q003: Schema corruption ===
    #[error("[Q003] class id {class_id} out of range (registered: {registered})")]
    UnknownClassId { class_id: u64, registered: usize },

    #[error("[Q003] field id {field_id} out of range for {class} (known fields: {known})")]
    UnknownFieldId {
        class: String,
        field_id: u64,
        known: usize,
    },

    #[error("[Q003] ordinal {ordinal} out of range for enum {class} ({constants} constants)")]
    OrdinalOutOfRange {
        class: String,
        ordinal: u64,
        constants: usize,
    },

    #[error("[Q003] back-reference {position} points past the identity stack (size: {size})")]
    BackReferenceOutOfRange { position: u64, size: usize },

    #[error("[Q003] {class} no longer matches its stored schema: {reason}")]
    SchemaMismatch { class: String, reason: &'static str },

    // === Q004: Accessor fault ===
    #[error("[Q004] cannot set {class}.{field}: {source}")]
    AccessorFault {
        class: String,
        field: String,
        #[source]
        source: AccessError,
    },

    #[error("[Q004] unexpected value for {context}: {source}")]
    UnexpectedValue {
        context: &'static str,
        #[source]
        source: AccessError,
    },

    // === Q005: Instantiation ===
    #[error("[Q005] cannot create a blank {class}: no blank constructor declared")]
    Instantiation { class: String },

    // === Q006: Malformed encoding ===
    #[error("[Q006] invalid magic bytes: expected QSER or QSERZ, found {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("[Q006] unsupported format version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("[Q006] unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("[Q006] varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("[Q006] varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("[Q006] invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("[Q006] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[Q006] invalid value tag: {tag}")]
    InvalidTag { tag: u8 },

    #[error("[Q006] invalid bool value: {value} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8 },

    #[error("[Q006] object graph nesting exceeds maximum depth {max}")]
    DepthExceeded { max: usize },

    #[error("[Q006] {remaining} trailing bytes after the encoded value")]
    TrailingBytes { remaining: usize },

    #[error("[Q006] malformed encoding: {context}")]
    MalformedEncoding { context: &'static str },

    // === Q007: Compression ===
    #[error("[Q007] zstd decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("[Q007] decompressed size {actual} doesn't match declared {declared}")]
    UncompressedSizeMismatch { declared: usize, actual: usize },
}

impl DecodeError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::ClassResolution { .. } => ErrorKind::ClassResolution,
            DecodeError::UnknownClassId { .. }
            | DecodeError::UnknownFieldId { .. }
            | DecodeError::OrdinalOutOfRange { .. }
            | DecodeError::BackReferenceOutOfRange { .. }
            | DecodeError::SchemaMismatch { .. } => ErrorKind::SchemaCorruption,
            DecodeError::AccessorFault { .. } | DecodeError::UnexpectedValue { .. } => {
                ErrorKind::AccessorFault
            }
            DecodeError::Instantiation { .. } => ErrorKind::InstantiationFault,
            DecodeError::DecompressionFailed(_) | DecodeError::UncompressedSizeMismatch { .. } => {
                ErrorKind::Compression
            }
            _ => ErrorKind::MalformedEncoding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_taxonomy() {
        let err = DecodeError::UnknownClassId {
            class_id: 9,
            registered: 2,
        };
        assert_eq!(err.kind(), ErrorKind::SchemaCorruption);
        assert!(err.to_string().starts_with("[Q003]"));

        let err = EncodeError::NotSerializable {
            type_name: "demo::Thing".to_string(),
        };
        assert_eq!(err.kind().code(), "Q001");
    }

    #[test]
    fn test_accessor_fault_keeps_cause() {
        use std::error::Error as _;

        let err = DecodeError::AccessorFault {
            class: "demo.Person".to_string(),
            field: "age".to_string(),
            source: AccessError::TypeMismatch {
                expected: "int",
                found: "text",
            },
        };
        assert_eq!(err.kind(), ErrorKind::AccessorFault);
        assert!(err.to_string().contains("demo.Person.age"));
        assert!(err.source().is_some());
    }
}
